//! Run configuration resolved from the command line and the environment.

use crate::cli::Cli;
use crate::error::ConfigError;
use mailmerge_smtp::Mailbox;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port used when `SMTP_PORT` is unset.
pub const DEFAULT_PORT: u16 = 587;

/// Name sent with EHLO when `SMTP_HELO_NAME` is unset.
pub const DEFAULT_HELO_NAME: &str = "localhost";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption.
    None,
    /// STARTTLS upgrade after plaintext connect.
    #[default]
    StartTls,
    /// Implicit TLS (connect directly with TLS).
    Tls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "none (insecure)",
            Self::StartTls => "STARTTLS",
            Self::Tls => "SSL/TLS",
        }
    }
}

/// SMTP server configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username, empty for unauthenticated relays.
    pub username: String,
    /// Password, empty for unauthenticated relays.
    pub password: String,
    /// Security mode.
    pub security: Security,
    /// Name announced in EHLO.
    pub helo_name: String,
}

impl SmtpConfig {
    /// Returns the credentials when both username and password are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        (!self.username.is_empty() && !self.password.is_empty())
            .then_some((self.username.as_str(), self.password.as_str()))
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("security", &self.security)
            .field("helo_name", &self.helo_name)
            .finish()
    }
}

/// Everything a run needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Contacts CSV.
    pub csv_path: PathBuf,
    /// Body template.
    pub template_path: PathBuf,
    /// Subject template.
    pub subject: String,
    /// Sender display name, possibly empty.
    pub from_name: String,
    /// Sender address, possibly empty in dry-run mode.
    pub from_email: String,
    /// Sender mailbox; `None` only in dry-run mode without a sender address.
    pub sender: Option<Mailbox>,
    /// Print instead of sending.
    pub dry_run: bool,
    /// Pause between sends.
    pub rate_limit: Option<Duration>,
    /// Maximum number of rows to process.
    pub test_limit: Option<usize>,
    /// SMTP server.
    pub smtp: SmtpConfig,
}

impl Settings {
    /// Resolves settings from the command line and the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing or invalid values.
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolves settings from the command line and an environment lookup.
    ///
    /// Blank environment values count as unset. Command line flags win over
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing or invalid values.
    pub fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let use_ssl = var("SMTP_USE_SSL")
            .map(|v| parse_bool("SMTP_USE_SSL", &v))
            .transpose()?
            .unwrap_or(false);
        let use_tls = var("SMTP_USE_TLS")
            .map(|v| parse_bool("SMTP_USE_TLS", &v))
            .transpose()?
            .unwrap_or(!use_ssl);
        let security = match (use_tls, use_ssl) {
            (true, true) => return Err(ConfigError::ConflictingSecurity),
            (true, false) => Security::StartTls,
            (false, true) => Security::Tls,
            (false, false) => Security::None,
        };

        let port = match var("SMTP_PORT") {
            Some(value) => match value.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SMTP_PORT",
                        value,
                        reason: "expected a port number between 1 and 65535",
                    });
                }
            },
            None => DEFAULT_PORT,
        };

        let username = var("SMTP_USERNAME").unwrap_or_default();
        let smtp = SmtpConfig {
            host: var("SMTP_HOST").unwrap_or_default(),
            port,
            username: username.clone(),
            password: var("SMTP_PASSWORD").unwrap_or_default(),
            security,
            helo_name: var("SMTP_HELO_NAME").unwrap_or_else(|| DEFAULT_HELO_NAME.to_string()),
        };

        let from_name = non_blank(cli.from_name.as_deref())
            .or_else(|| var("SMTP_FROM_NAME"))
            .unwrap_or_default();
        let from_email = non_blank(cli.from_email.as_deref())
            .or_else(|| var("SMTP_FROM_EMAIL"))
            .unwrap_or(username);

        let rate_limit = parse_rate_limit(cli.rate_limit)?;
        let test_limit = (cli.test_limit > 0).then_some(cli.test_limit);

        if !cli.dry_run {
            if smtp.host.is_empty() {
                return Err(ConfigError::Missing(
                    "SMTP_HOST is required. Set it via env or .env file.",
                ));
            }
            if from_email.is_empty() {
                return Err(ConfigError::Missing(
                    "--from-email or SMTP_FROM_EMAIL/SMTP_USERNAME is required.",
                ));
            }
        }

        let sender = if from_email.is_empty() {
            None
        } else {
            Some(
                Mailbox::with_name(&from_name, &from_email).map_err(|_| ConfigError::Invalid {
                    key: "from email",
                    value: from_email.clone(),
                    reason: "expected an address like name@example.com",
                })?,
            )
        };

        Ok(Self {
            csv_path: cli.csv.clone(),
            template_path: cli.template.clone(),
            subject: cli.subject.clone(),
            from_name,
            from_email,
            sender,
            dry_run: cli.dry_run,
            rate_limit,
            test_limit,
            smtp,
        })
    }
}

/// What [`load_env_file`] found.
#[derive(Debug)]
pub enum EnvFile {
    /// Variables were loaded from this file.
    Loaded(PathBuf),
    /// No explicit path was given and there is no `./.env`.
    Absent,
    /// `./.env` exists but could not be read, so it was skipped.
    Skipped(dotenvy::Error),
}

/// Loads an env file into the process environment.
///
/// An explicit path must exist. Without one, `./.env` is loaded when
/// present. Variables already set in the environment are kept. Nothing is
/// logged here so the caller can load the file before logging starts.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFile`] if an explicit env file cannot be read.
pub fn load_env_file(explicit: Option<&Path>) -> Result<EnvFile, ConfigError> {
    if let Some(path) = explicit {
        dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(EnvFile::Loaded(path.to_path_buf()));
    }

    match dotenvy::dotenv() {
        Ok(path) => Ok(EnvFile::Loaded(path)),
        Err(err) if err.not_found() => Ok(EnvFile::Absent),
        Err(err) => Ok(EnvFile::Skipped(err)),
    }
}

/// Parses a bool-like environment value.
fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected true/false, yes/no, on/off or 1/0",
        }),
    }
}

fn parse_rate_limit(seconds: f64) -> Result<Option<Duration>, ConfigError> {
    Duration::try_from_secs_f64(seconds)
        .map(|pause| (!pause.is_zero()).then_some(pause))
        .map_err(|_| ConfigError::Invalid {
            key: "--rate-limit",
            value: seconds.to_string(),
            reason: "expected a non-negative number of seconds",
        })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
