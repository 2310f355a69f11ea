//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected, Ready, SmtpConnection};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// `SIZE 0` means no fixed limit (RFC 1870) and is reported as `None`.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub(crate) fn set_extensions<'a>(&mut self, lines: impl Iterator<Item = &'a String>) {
        self.extensions = lines.map(|line| Extension::parse(line)).collect();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        let lines: Vec<String> = lines.iter().map(ToString::to_string).collect();
        let mut info = ServerInfo::default();
        info.set_extensions(lines.iter());
        info
    }

    #[test]
    fn reports_size_limit() {
        assert_eq!(info(&["SIZE 1000"]).max_message_size(), Some(1000));
        assert_eq!(info(&["SIZE 0"]).max_message_size(), None);
        assert_eq!(info(&["PIPELINING"]).max_message_size(), None);
    }

    #[test]
    fn reports_auth_mechanisms() {
        let info = info(&["AUTH LOGIN PLAIN", "STARTTLS"]);
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
        assert!(info.supports_starttls());
        assert!(!info.supports_8bitmime());
    }

    #[test]
    fn no_auth_advertised() {
        assert!(info(&["8BITMIME"]).auth_mechanisms().is_empty());
    }
}
