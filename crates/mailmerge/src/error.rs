//! Error types for a mail merge run.
//!
//! [`ConfigError`] and [`InputError`] are fatal and abort the run before any
//! message is sent. [`DeliveryError`] is raised per row and recovered by the
//! driver, except when the single SMTP connection cannot be opened at all.

use std::io;
use std::path::PathBuf;

/// Bad or missing flags and environment values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value is missing.
    #[error("{0}")]
    Missing(&'static str),

    /// A value could not be parsed or is out of range.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        /// Flag or environment key.
        key: &'static str,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },

    /// `SMTP_USE_TLS` and `SMTP_USE_SSL` are both enabled.
    #[error("SMTP_USE_TLS and SMTP_USE_SSL are mutually exclusive; enable at most one")]
    ConflictingSecurity,

    /// The environment file could not be loaded.
    #[error("could not load env file {}: {source}", path.display())]
    EnvFile {
        /// Path of the env file.
        path: PathBuf,
        /// Underlying error.
        source: dotenvy::Error,
    },

    /// The log file could not be created.
    #[error("could not open log file {}: {source}", path.display())]
    LogFile {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The logging subscriber could not be installed.
    #[error("could not initialise logging: {0}")]
    Logging(String),
}

/// Problems with the CSV or template files.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The CSV file could not be opened.
    #[error("could not open CSV file {}: {source}", path.display())]
    Open {
        /// Path of the CSV file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The CSV header row could not be read.
    #[error("could not read CSV header of {}: {source}", path.display())]
    Header {
        /// Path of the CSV file.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// The CSV header has no `email` column.
    #[error("CSV file {} has no 'email' column", path.display())]
    MissingEmailColumn {
        /// Path of the CSV file.
        path: PathBuf,
    },

    /// A CSV record could not be read.
    #[error("invalid CSV record in {} at line {line}: {source}", path.display())]
    Record {
        /// Path of the CSV file.
        path: PathBuf,
        /// Line number of the record, when known.
        line: u64,
        /// Underlying error.
        source: csv::Error,
    },

    /// The template file could not be read.
    #[error("could not read template {}: {source}", path.display())]
    Template {
        /// Path of the template.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// Failure to hand a message to the mail server.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The connection could not be established.
    #[error("could not connect to {server}: {source}")]
    Connect {
        /// `host:port` of the server.
        server: String,
        /// Underlying transport error.
        source: mailmerge_smtp::Error,
    },

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(#[source] mailmerge_smtp::Error),

    /// The server refused the sender, recipient or message.
    #[error("server rejected message to {recipient}: {source}")]
    Rejected {
        /// Recipient address.
        recipient: String,
        /// Underlying transport error.
        source: mailmerge_smtp::Error,
    },

    /// An address is not usable in the SMTP envelope.
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] mailmerge_smtp::Error),

    /// The connection broke while sending.
    #[error("connection to the mail server failed: {0}")]
    Connection(#[source] mailmerge_smtp::Error),

    /// The connection was lost by an earlier failure.
    #[error("connection to the mail server was lost")]
    Disconnected,

    /// Writing a preview failed.
    #[error("could not write preview: {0}")]
    Preview(#[from] io::Error),
}

/// Fatal errors that end a run with a non-zero exit code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// CSV or template problem.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The mail server could not be reached or refused the login.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) | Self::Delivery(_) => 1,
        }
    }
}

/// Result type alias for fatal errors.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_two() {
        let err = Error::from(ConfigError::ConflictingSecurity);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn input_errors_exit_with_one() {
        let err = Error::from(InputError::MissingEmailColumn {
            path: PathBuf::from("contacts.csv"),
        });
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "CSV file contacts.csv has no 'email' column");
    }

    #[test]
    fn invalid_value_message() {
        let err = ConfigError::Invalid {
            key: "SMTP_PORT",
            value: "abc".to_string(),
            reason: "expected a port number",
        };
        assert_eq!(
            err.to_string(),
            "invalid value for SMTP_PORT: \"abc\" (expected a port number)"
        );
    }
}
