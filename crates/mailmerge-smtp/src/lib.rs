//! # mailmerge-smtp
//!
//! An async SMTP client (RFC 5321) built for sending many messages over a
//! single connection.
//!
//! ## Features
//!
//! - **Type-state sessions**: `Connected` until credentials are accepted,
//!   `Authenticated` afterwards
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN and LOGIN
//! - **Reusable transactions**: [`Client::send_mail`] borrows the session and
//!   resets it after a rejected sender or recipient, so the next message can
//!   go out on the same connection
//! - **Extensions**: SIZE, 8BITMIME, STARTTLS, AUTH
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailmerge_smtp::{Address, Client};
//! use mailmerge_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> mailmerge_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client.starttls("smtp.example.com").await?;
//!     let mut client = client.login("user@example.com", "password").await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     client.send_mail(&from, &[to], message).await?;
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── login() / auth_plain() / auth_login() ───→ Authenticated
//! └──────────────┘
//!        │                                                          │
//!        └────────────── send_mail() (repeatable) ──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Response parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Connected, Ready, ServerInfo, SmtpConnection};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Mailbox, Reply, ReplyCode};
