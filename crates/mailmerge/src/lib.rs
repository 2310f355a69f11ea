//! # mailmerge
//!
//! Send personalized plain-text emails to every row of a CSV file.
//!
//! This crate provides:
//! - A lazy CSV contact reader
//! - `{{key}}` placeholder templates
//! - An SMTP mailer that reuses one connection for the whole run
//! - A dry-run preview transport
//! - The driver loop with rate and row limits
//!
//! The `mailmerge` binary wires these together from command line flags and
//! `SMTP_*` environment variables.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod contacts;
pub mod driver;
mod error;
pub mod logging;
pub mod mailer;
pub mod message;
pub mod template;

pub use cli::Cli;
pub use config::{EnvFile, Security, Settings, SmtpConfig, load_env_file};
pub use contacts::{ContactReader, Recipient};
pub use driver::{Campaign, Outcome, Summary};
pub use error::{ConfigError, DeliveryError, Error, InputError, Result};
pub use mailer::{Preview, SmtpMailer, Transport};
pub use message::{Draft, OutgoingMessage};
pub use template::{Context, Globals, Template};

/// Runs a merge from parsed command line flags.
///
/// Resolves [`Settings`] from the process environment and calls
/// [`execute`]. Call [`load_env_file`] first so `.env` values, `RUST_LOG`
/// included, are visible before logging starts.
///
/// # Errors
///
/// Returns a fatal [`Error`]; per-row delivery failures are only counted.
pub async fn run(cli: &Cli) -> Result<Summary> {
    let settings = Settings::from_env(cli)?;
    tracing::debug!("Resolved {:?}", settings.smtp);
    execute(&settings).await
}

/// Runs a merge with resolved settings.
///
/// The CSV header is checked and the template read before any connection
/// is opened.
///
/// # Errors
///
/// Returns [`Error::Input`] for CSV or template problems and
/// [`Error::Delivery`] if the mail server cannot be reached or refuses the
/// login.
pub async fn execute(settings: &Settings) -> Result<Summary> {
    let contacts = ContactReader::open(&settings.csv_path)?;
    tracing::debug!(
        "Reading {} with columns {:?}",
        settings.csv_path.display(),
        contacts.headers()
    );
    let body = Template::load(&settings.template_path)?;

    let campaign = Campaign {
        subject: Template::new(settings.subject.as_str()),
        body,
        globals: Globals::new(
            settings.from_name.as_str(),
            settings.from_email.as_str(),
            chrono::Local::now().date_naive(),
        ),
        rate_limit: settings.rate_limit,
        test_limit: settings.test_limit,
    };

    if settings.dry_run {
        tracing::info!("Dry run: nothing will be sent");
        let mut preview = Preview::stdout();
        let summary = campaign.run(contacts, &mut preview).await?;
        preview.close().await;
        return Ok(summary);
    }

    let sender = settings.sender.clone().ok_or(ConfigError::Missing(
        "--from-email or SMTP_FROM_EMAIL/SMTP_USERNAME is required.",
    ))?;
    let mut mailer = SmtpMailer::connect(&settings.smtp, sender).await?;
    let summary = campaign.run(contacts, &mut mailer).await;
    mailer.close().await;
    Ok(summary?)
}
