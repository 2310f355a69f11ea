//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::{BodyType, Command};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;

/// Type-state marker for a session that has not authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for an authenticated session.
#[derive(Debug)]
pub struct Authenticated;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Connected {}
    impl Sealed for super::Authenticated {}
}

/// States in which a mail transaction may be started.
///
/// Unauthenticated relays accept mail straight after EHLO, so both
/// [`Connected`] and [`Authenticated`] qualify.
pub trait Ready: sealed::Sealed {}

impl Ready for Connected {}
impl Ready for Authenticated {}

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            client_hostname: "localhost".to_string(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// Servers that reject EHLO with a permanent error are greeted with HELO
    /// instead and treated as advertising no extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.client_hostname = client_hostname.to_string();
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            // First line is the greeting, the rest are extensions
            self.server_info.set_extensions(reply.message.iter().skip(1));
            return Ok(self);
        }

        if !reply.code.is_permanent() {
            return Err(reply.into_error());
        }

        tracing::debug!("EHLO rejected ({}), falling back to HELO", reply.code);
        let reply = self
            .send_command(Command::Helo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        self.server_info.extensions.clear();
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(Command::StartTls).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.stream = self.stream.upgrade_to_tls(hostname).await?;

        // Capabilities must be discovered again over the encrypted channel
        let reply = self
            .send_command(Command::Ehlo {
                hostname: self.client_hostname.clone(),
            })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        self.server_info.set_extensions(reply.message.iter().skip(1));

        Ok(self)
    }

    /// Authenticates with the best mechanism the server advertises.
    ///
    /// PLAIN is preferred; LOGIN is used when it is the only supported
    /// mechanism. Servers that advertise nothing get PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn login(self, username: &str, password: &str) -> Result<Client<Authenticated>> {
        let mechanisms = self.server_info.auth_mechanisms();
        if !mechanisms.contains(&AuthMechanism::Plain) && mechanisms.contains(&AuthMechanism::Login)
        {
            self.auth_login(username, password).await
        } else {
            self.auth_plain(username, password).await
        }
    }

    /// Authenticates using PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        // \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let encoded = STANDARD.encode(credentials.as_bytes());

        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;

        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(self.into_state())
    }

    /// Authenticates using LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects a step or the credentials.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(reply.into_error());
        }

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(username)))
            .await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(reply.into_error());
        }

        let reply = self
            .send_command(Command::AuthResponse(STANDARD.encode(password)))
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(self.into_state())
    }
}

impl<S: Ready> Client<S> {
    /// Runs one complete mail transaction (MAIL FROM, RCPT TO, DATA).
    ///
    /// Message should be RFC 5322 formatted. Line endings are normalized to
    /// CRLF, lines starting with `.` are dot-stuffed and the terminating `.`
    /// line is added.
    ///
    /// The session stays usable after a rejected sender, recipient or DATA
    /// command: the transaction is reset with RSET before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the server's reply as [`Error::SmtpError`] if any step is
    /// rejected, [`Error::MessageTooLarge`] if the message exceeds the
    /// advertised SIZE, or a transport error.
    pub async fn send_mail(
        &mut self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::InvalidAddress("No recipients specified".into()));
        }

        let limit = self.server_info.max_message_size();
        if let Some(limit) = limit {
            if message.len() > limit {
                return Err(Error::MessageTooLarge {
                    size: message.len(),
                    limit,
                });
            }
        }

        let body = (!message.is_ascii() && self.server_info.supports_8bitmime())
            .then_some(BodyType::EightBitMime);
        let reply = self
            .send_command(Command::MailFrom {
                from: from.clone(),
                body,
                size: limit.map(|_| message.len()),
            })
            .await?;
        if !reply.is_success() {
            return Err(self.abort(reply).await);
        }

        for to in recipients {
            let reply = self.send_command(Command::RcptTo { to: to.clone() }).await?;
            if !reply.is_success() {
                return Err(self.abort(reply).await);
            }
        }

        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(self.abort(reply).await);
        }

        self.stream.write_all(&encode_data(message)).await?;

        // The final reply ends the transaction either way
        let reply = read_reply(&mut self.stream).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(())
    }

    /// Resets the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(&mut self) -> Result<()> {
        let reply = self.send_command(Command::Rset).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    async fn abort(&mut self, reply: Reply) -> Error {
        let err = reply.into_error();
        if !err.is_connection_error() {
            if let Err(reset_err) = self.reset().await {
                tracing::warn!("RSET after rejected transaction failed: {reset_err}");
            }
        }
        err
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.stream.is_tls()
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::trace!("C: {}", cmd.redacted());
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    fn into_state<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }

        Ok(())
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }
        tracing::trace!("S: {line}");

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Prepares message content for the DATA phase.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 5);

    // A trailing line break belongs to the last line, not to an extra empty one
    let body = message
        .strip_suffix(b"\n")
        .map_or(message, |m| m.strip_suffix(b"\r").unwrap_or(m));

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
