//! Message transports: the SMTP mailer and the dry-run preview.

use crate::config::{Security, SmtpConfig};
use crate::error::DeliveryError;
use crate::message::{Draft, OutgoingMessage};
use mailmerge_smtp::connection::{connect, connect_tls};
use mailmerge_smtp::{Address, Authenticated, Client, Connected, Mailbox};
use std::future::Future;
use std::io::{self, Write};

/// Where rendered messages go.
pub trait Transport {
    /// Returns true if delivering reaches a real mail server.
    fn is_live(&self) -> bool;

    /// Delivers one message.
    fn deliver(&mut self, draft: &Draft) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Finishes the session. Errors are logged, not returned.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Open SMTP session in whichever state the server left us.
#[derive(Debug)]
enum Session {
    Anonymous(Client<Connected>),
    Authenticated(Client<Authenticated>),
}

impl Session {
    async fn send_mail(
        &mut self,
        from: &Address,
        to: &Address,
        message: &[u8],
    ) -> mailmerge_smtp::Result<()> {
        let recipients = std::slice::from_ref(to);
        match self {
            Self::Anonymous(client) => client.send_mail(from, recipients, message).await,
            Self::Authenticated(client) => client.send_mail(from, recipients, message).await,
        }
    }

    async fn quit(self) -> mailmerge_smtp::Result<()> {
        match self {
            Self::Anonymous(client) => client.quit().await,
            Self::Authenticated(client) => client.quit().await,
        }
    }
}

/// Sends every message over one SMTP connection.
#[derive(Debug)]
pub struct SmtpMailer {
    session: Option<Session>,
    sender: Mailbox,
    server: String,
}

impl SmtpMailer {
    /// Connects, negotiates security and logs in when credentials are set.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Connect`] if the server cannot be reached or
    /// the TLS negotiation fails, and [`DeliveryError::Auth`] if the login
    /// is refused.
    pub async fn connect(config: &SmtpConfig, sender: Mailbox) -> Result<Self, DeliveryError> {
        let server = config.server();
        let connect_error = |source| DeliveryError::Connect {
            server: server.clone(),
            source,
        };

        tracing::info!(
            "Connecting to {server} ({})",
            config.security.display_name()
        );

        let stream = match config.security {
            Security::Tls => connect_tls(&config.host, config.port).await,
            Security::StartTls | Security::None => connect(&config.host, config.port).await,
        }
        .map_err(connect_error)?;

        let client = Client::from_stream(stream).await.map_err(connect_error)?;
        let mut client = client
            .ehlo(&config.helo_name)
            .await
            .map_err(connect_error)?;

        if config.security == Security::StartTls {
            client = client
                .starttls(&config.host)
                .await
                .map_err(connect_error)?;
        }

        let session = match config.credentials() {
            Some((username, password)) => {
                let client = client
                    .login(username, password)
                    .await
                    .map_err(DeliveryError::Auth)?;
                tracing::debug!("Logged in as {username}");
                Session::Authenticated(client)
            }
            None => Session::Anonymous(client),
        };

        Ok(Self {
            session: Some(session),
            sender,
            server,
        })
    }

    /// Returns true while the connection is usable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl Transport for SmtpMailer {
    fn is_live(&self) -> bool {
        true
    }

    async fn deliver(&mut self, draft: &Draft) -> Result<(), DeliveryError> {
        let Some(session) = self.session.as_mut() else {
            return Err(DeliveryError::Disconnected);
        };

        let message = OutgoingMessage::new(self.sender.clone(), draft.clone());
        let raw = message.to_rfc5322(&chrono::Local::now());

        match session
            .send_mail(&self.sender.address, &draft.to, raw.as_bytes())
            .await
        {
            Ok(()) => Ok(()),
            Err(source) if source.is_connection_error() => {
                tracing::warn!("Lost connection to {}", self.server);
                self.session = None;
                Err(DeliveryError::Connection(source))
            }
            Err(source) => Err(DeliveryError::Rejected {
                recipient: draft.to.as_str().to_string(),
                source,
            }),
        }
    }

    async fn close(mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match session.quit().await {
            Ok(()) => tracing::debug!("Closed connection to {}", self.server),
            Err(err) => tracing::warn!("QUIT failed: {err}"),
        }
    }
}

/// Dry-run transport that prints each message instead of sending it.
#[derive(Debug)]
pub struct Preview<W> {
    out: W,
}

impl Preview<io::Stdout> {
    /// Prints to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Preview<W> {
    /// Prints to `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Transport for Preview<W> {
    fn is_live(&self) -> bool {
        false
    }

    async fn deliver(&mut self, draft: &Draft) -> Result<(), DeliveryError> {
        write!(
            self.out,
            "\n--- DRY RUN ---\nTo: {}\nSubject: {}\n{}\n",
            draft.to.as_str(),
            draft.subject,
            draft.body
        )?;
        self.out.flush()?;
        Ok(())
    }

    async fn close(mut self) {
        if let Err(err) = self.out.flush() {
            tracing::warn!("Could not flush preview output: {err}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn draft(to: &str, subject: &str, body: &str) -> Draft {
        Draft {
            to: Address::new(to).unwrap(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn preview_prints_each_message() {
        let mut preview = Preview::new(Vec::new());
        assert!(!preview.is_live());

        preview
            .deliver(&draft("a@x.com", "Hello Alice", "Hi Alice"))
            .await
            .unwrap();
        preview
            .deliver(&draft("c@x.com", "Hello Carol", "Hi Carol"))
            .await
            .unwrap();

        let out = String::from_utf8(preview.into_inner()).unwrap();
        assert_eq!(
            out,
            "\n--- DRY RUN ---\nTo: a@x.com\nSubject: Hello Alice\nHi Alice\n\
             \n--- DRY RUN ---\nTo: c@x.com\nSubject: Hello Carol\nHi Carol\n"
        );
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port,
            username: String::new(),
            password: String::new(),
            security: Security::None,
            helo_name: "localhost".to_string(),
        };
        let err = SmtpMailer::connect(&config, Mailbox::new("me@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connect { .. }));
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
