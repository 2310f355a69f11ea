//! The per-row loop: render, deliver, pace, count.

use crate::contacts::Recipient;
use crate::error::{DeliveryError, InputError};
use crate::mailer::Transport;
use crate::message::Draft;
use crate::template::{Context, Globals, Template};
use mailmerge_smtp::Address;
use std::fmt;
use std::time::Duration;

/// Result of processing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the mail server.
    Sent,
    /// Printed by a dry run.
    Previewed,
    /// Row has no email address.
    Skipped,
    /// Delivery failed with this message.
    Failed(String),
}

/// Counts of row outcomes for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Messages accepted by the server.
    pub sent: usize,
    /// Messages printed in dry-run mode.
    pub previewed: usize,
    /// Rows without an email address.
    pub skipped: usize,
    /// Rows whose delivery failed.
    pub failed: usize,
}

impl Summary {
    /// Rows that were not skipped.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.sent + self.previewed + self.failed
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Previewed => self.previewed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent, {} previewed, {} skipped, {} failed",
            self.sent, self.previewed, self.skipped, self.failed
        )
    }
}

/// One mail merge: templates, globals and pacing.
#[derive(Debug, Clone)]
pub struct Campaign {
    /// Subject template.
    pub subject: Template,
    /// Body template.
    pub body: Template,
    /// Values shared by every row.
    pub globals: Globals,
    /// Pause between live delivery attempts.
    pub rate_limit: Option<Duration>,
    /// Stop after this many non-skipped rows.
    pub test_limit: Option<usize>,
}

impl Campaign {
    /// Runs the merge over `rows`, delivering through `transport`.
    ///
    /// Rows are read one at a time and never after the test limit is
    /// reached. Delivery failures are logged and counted; the run goes on.
    ///
    /// # Errors
    ///
    /// Returns the first [`InputError`] produced by `rows`.
    pub async fn run<T: Transport>(
        &self,
        rows: impl IntoIterator<Item = Result<Recipient, InputError>>,
        transport: &mut T,
    ) -> Result<Summary, InputError> {
        let mut summary = Summary::default();
        let mut rows_read = 0_usize;
        let mut attempted = false;

        for row in rows {
            let recipient = row?;
            rows_read += 1;

            let outcome = self.process(&recipient, transport, &mut attempted).await;
            summary.record(&outcome);

            let limit_reached = outcome != Outcome::Skipped
                && self
                    .test_limit
                    .is_some_and(|limit| summary.processed() >= limit);
            if limit_reached {
                tracing::info!("Test limit reached ({}). Stopping.", summary.processed());
                break;
            }
        }

        if rows_read == 0 {
            tracing::warn!("No contacts found in CSV.");
        }
        tracing::info!("Done: {summary}");

        Ok(summary)
    }

    async fn process<T: Transport>(
        &self,
        recipient: &Recipient,
        transport: &mut T,
        attempted: &mut bool,
    ) -> Outcome {
        let email = recipient.email();
        if email.is_empty() {
            tracing::warn!("Skipping row without email: {recipient}");
            return Outcome::Skipped;
        }

        let context = Context::new(&self.globals, &recipient.fields);
        for key in self
            .subject
            .unresolved(&context)
            .into_iter()
            .chain(self.body.unresolved(&context))
        {
            tracing::debug!("No value for {{{{{key}}}}} on line {}", recipient.line);
        }

        let to = match Address::new(email) {
            Ok(to) => to,
            Err(err) => {
                let err = DeliveryError::InvalidAddress(err);
                tracing::error!("Failed to send to {email}: {err}");
                return Outcome::Failed(err.to_string());
            }
        };

        let draft = Draft {
            to,
            subject: self.subject.render(&context),
            body: self.body.render(&context),
        };

        if transport.is_live() {
            if let (true, Some(pause)) = (*attempted, self.rate_limit) {
                tracing::debug!("Waiting {pause:?} before next send");
                tokio::time::sleep(pause).await;
            }
            *attempted = true;
        }

        match transport.deliver(&draft).await {
            Ok(()) if transport.is_live() => {
                tracing::info!("Sent to {email}");
                Outcome::Sent
            }
            Ok(()) => {
                tracing::info!("Previewed message to {email}");
                Outcome::Previewed
            }
            Err(err) => {
                tracing::error!("Failed to send to {email}: {err}");
                Outcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = Summary::default();
        for outcome in [
            Outcome::Sent,
            Outcome::Skipped,
            Outcome::Failed("boom".to_string()),
            Outcome::Sent,
        ] {
            summary.record(&outcome);
        }
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.to_string(), "2 sent, 0 previewed, 1 skipped, 1 failed");
    }
}
