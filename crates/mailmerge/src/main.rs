//! `mailmerge` command line entry point.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use clap::Parser;
use mailmerge::{Cli, EnvFile, logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Before logging, so RUST_LOG from the env file applies
    let env_file = match mailmerge::load_env_file(cli.env_file.as_deref()) {
        Ok(env_file) => env_file,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(mailmerge::Error::from(err).exit_code());
        }
    };

    if let Err(err) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: {err}");
        return ExitCode::from(mailmerge::Error::from(err).exit_code());
    }

    match env_file {
        EnvFile::Loaded(path) => tracing::debug!("Loaded environment from {}", path.display()),
        EnvFile::Skipped(err) => tracing::warn!("Could not read .env file: {err}. Skipping."),
        EnvFile::Absent => {}
    }

    match mailmerge::run(&cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("Fatal: {err:?}");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
