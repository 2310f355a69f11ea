//! Command line interface.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Send personalized emails to every row of a CSV file.
///
/// SMTP settings are read from the environment or a `.env` file:
/// `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
/// `SMTP_USE_TLS`, `SMTP_USE_SSL`, `SMTP_FROM_NAME`, `SMTP_FROM_EMAIL`.
#[derive(Debug, Clone, Parser)]
#[command(name = "mailmerge", version)]
pub struct Cli {
    /// Path to contacts CSV with an 'email' column
    #[arg(long, value_name = "PATH")]
    pub csv: PathBuf,

    /// Path to email body template file
    #[arg(long, value_name = "PATH")]
    pub template: PathBuf,

    /// Email subject (supports {{placeholders}})
    #[arg(long)]
    pub subject: String,

    /// From display name [default: $SMTP_FROM_NAME]
    #[arg(long)]
    pub from_name: Option<String>,

    /// From email address [default: $SMTP_FROM_EMAIL or $SMTP_USERNAME]
    #[arg(long)]
    pub from_email: Option<String>,

    /// Path to an env file [default: ./.env if present]
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Do not send, just print what would be sent
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds to wait between sends
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub rate_limit: f64,

    /// Limit number of rows to process (0 = all)
    #[arg(long, value_name = "ROWS", default_value_t = 0)]
    pub test_limit: usize,

    /// Also write the log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::try_parse_from([
            "mailmerge",
            "--csv",
            "contacts.csv",
            "--template",
            "body.txt",
            "--subject",
            "Hello {{name}}",
        ])
        .unwrap();
        assert_eq!(cli.csv, PathBuf::from("contacts.csv"));
        assert_eq!(cli.subject, "Hello {{name}}");
        assert!(!cli.dry_run);
        assert!(cli.from_name.is_none());
        assert!(cli.rate_limit.abs() < f64::EPSILON);
        assert_eq!(cli.test_limit, 0);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "mailmerge",
            "--csv",
            "c.csv",
            "--template",
            "t.txt",
            "--subject",
            "s",
            "--from-name",
            "Ada",
            "--from-email",
            "ada@example.com",
            "--env-file",
            "prod.env",
            "--dry-run",
            "--rate-limit",
            "1.5",
            "--test-limit",
            "3",
            "--log-file",
            "run.log",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.from_name.as_deref(), Some("Ada"));
        assert_eq!(cli.from_email.as_deref(), Some("ada@example.com"));
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
        assert!(cli.dry_run);
        assert!((cli.rate_limit - 1.5).abs() < f64::EPSILON);
        assert_eq!(cli.test_limit, 3);
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn requires_csv_template_and_subject() {
        assert!(Cli::try_parse_from(["mailmerge", "--csv", "c.csv"]).is_err());
    }
}
