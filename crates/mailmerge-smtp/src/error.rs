//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message larger than the server's advertised SIZE.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Limit advertised by the server.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the connection can no longer be used after this error.
    ///
    /// Transport failures and malformed replies leave the stream in an
    /// unknown position. A 421 reply means the server is closing the channel.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(_) | Self::Tls(_) | Self::Protocol(_) => true,
            Self::SmtpError { code, .. } => *code == 421,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reply_codes() {
        let rejected = Error::smtp_error(550, "no such user");
        assert!(rejected.is_permanent());
        assert!(!rejected.is_transient());
        assert!(!rejected.is_connection_error());

        let busy = Error::smtp_error(451, "try later");
        assert!(busy.is_transient());
        assert!(!busy.is_connection_error());
    }

    #[test]
    fn closing_channel_is_connection_error() {
        assert!(Error::smtp_error(421, "shutting down").is_connection_error());
    }

    #[test]
    fn io_and_protocol_are_connection_errors() {
        let io = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_connection_error());
        assert!(Error::Protocol("garbage".into()).is_connection_error());
        assert!(!Error::InvalidAddress("x".into()).is_connection_error());
    }

    #[test]
    fn display_includes_code() {
        let err = Error::smtp_error(535, "bad credentials");
        assert_eq!(err.to_string(), "SMTP error 535: bad credentials");
    }
}
