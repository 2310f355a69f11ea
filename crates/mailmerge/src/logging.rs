//! Subscriber setup for the binary.

use crate::error::ConfigError;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter directives for a `-v` count.
#[must_use]
pub fn directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("mailmerge={level},mailmerge_smtp={level}")
}

/// Installs the global subscriber.
///
/// Console output goes to stderr, filtered by `RUST_LOG` when set and by
/// `verbosity` otherwise. With `log_file`, every debug event is also written
/// to that file without ANSI colors.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the log file cannot be created or a
/// subscriber is already installed.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<(), ConfigError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| ConfigError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new(directives(2))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .try_init()
        .map_err(|err| ConfigError::Logging(err.to_string()))
}
