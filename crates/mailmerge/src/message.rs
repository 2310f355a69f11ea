//! Plain-text RFC 5322 messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone};
use mailmerge_smtp::{Address, Mailbox};
use std::fmt::{self, Write as _};

/// Longest UTF-8 chunk per encoded word, keeping each word under 75 chars.
const ENCODED_WORD_CHUNK: usize = 45;

/// Longest body line, in octets, that may be sent unencoded (RFC 5322).
const MAX_LINE_OCTETS: usize = 998;

/// Longest quoted-printable line, soft break included (RFC 2045).
const QP_LINE_LENGTH: usize = 76;

/// A rendered message for one recipient, before the sender is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Recipient address.
    pub to: Address,
    /// Rendered subject.
    pub subject: String,
    /// Rendered body.
    pub body: String,
}

/// A complete message ready for the DATA phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender.
    pub from: Mailbox,
    /// Recipient.
    pub to: Address,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl OutgoingMessage {
    /// Attaches the sender to a draft.
    #[must_use]
    pub fn new(from: Mailbox, draft: Draft) -> Self {
        Self {
            from,
            to: draft.to,
            subject: draft.subject,
            body: draft.body,
        }
    }

    /// Builds the RFC 5322 formatted message dated `date`.
    #[must_use]
    pub fn to_rfc5322<Tz: TimeZone>(&self, date: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", format_mailbox(&self.from));
        let _ = write!(message, "To: {}\r\n", self.to.as_str());
        let _ = write!(
            message,
            "Subject: {}\r\n",
            encode_header(&single_line(&self.subject))
        );
        let _ = write!(message, "Date: {}\r\n", date.to_rfc2822());
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");

        if is_seven_bit_clean(&self.body) {
            message.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
            for line in self.body.lines() {
                message.push_str(line);
                message.push_str("\r\n");
            }
        } else {
            message.push_str("Content-Transfer-Encoding: quoted-printable\r\n\r\n");
            for line in self.body.lines() {
                push_quoted_printable(&mut message, line);
                message.push_str("\r\n");
            }
        }

        message
    }
}

/// True when the body can go out as-is on any server: ASCII only, with no
/// line over the RFC 5322 limit.
fn is_seven_bit_clean(body: &str) -> bool {
    body.is_ascii() && body.lines().all(|line| line.len() <= MAX_LINE_OCTETS)
}

/// Appends one body line encoded as quoted-printable, with soft breaks
/// keeping every output line within [`QP_LINE_LENGTH`].
fn push_quoted_printable(out: &mut String, line: &str) {
    let bytes = line.as_bytes();
    let mut width = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        let last = i + 1 == bytes.len();
        // Trailing whitespace would be stripped in transit
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !last,
            _ => false,
        };
        let len = if literal { 1 } else { 3 };

        // Non-final lines need room for the `=` marker
        let limit = if last { QP_LINE_LENGTH } else { QP_LINE_LENGTH - 1 };
        if width + len > limit {
            out.push_str("=\r\n");
            width = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        width += len;
    }
}

fn format_mailbox(mailbox: &Mailbox) -> String {
    let address = mailbox.address.as_str();
    match mailbox.name.as_deref().map(single_line) {
        Some(name) if needs_encoding(&name) => format!("{} <{address}>", encode_header(&name)),
        Some(name) => format!("\"{}\" <{address}>", name.replace('\\', "\\\\").replace('"', "\\\"")),
        None => address.to_string(),
    }
}

/// Replaces line breaks so a value cannot inject extra headers.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn needs_encoding(text: &str) -> bool {
    !text.is_ascii() || text.contains("=?")
}

/// Encodes a header value as RFC 2047 base64 words when it is not plain
/// ASCII. Long values are split into several folded words.
fn encode_header(text: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + ENCODED_WORD_CHUNK).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        words.push(format!("=?utf-8?B?{}?=", STANDARD.encode(&text[start..end])));
        start = end;
    }
    words.join("\r\n ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 10, 30, 0)
            .unwrap()
    }

    fn message(name: &str, subject: &str, body: &str) -> OutgoingMessage {
        OutgoingMessage::new(
            Mailbox::with_name(name, "ada@example.com").unwrap(),
            Draft {
                to: Address::new("bob@example.org").unwrap(),
                subject: subject.to_string(),
                body: body.to_string(),
            },
        )
    }

    #[test]
    fn builds_plain_message() {
        let raw = message("Ada Lovelace", "Hello Bob", "Hi Bob\nBye\n").to_rfc5322(&date());
        let expected = format!(
            "From: \"Ada Lovelace\" <ada@example.com>\r\n\
             To: bob@example.org\r\n\
             Subject: Hello Bob\r\n\
             Date: {}\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             Hi Bob\r\n\
             Bye\r\n",
            date().to_rfc2822()
        );
        assert_eq!(raw, expected);
        assert!(raw.contains("Date: Sat, 9 Mar 2024 10:30:00 +0100\r\n"));
    }

    #[test]
    fn omits_empty_display_name() {
        let raw = message("", "s", "b").to_rfc5322(&date());
        assert!(raw.starts_with("From: ada@example.com\r\n"));
    }

    #[test]
    fn escapes_quotes_in_display_name() {
        let raw = message("Ada \"The Countess\"", "s", "b").to_rfc5322(&date());
        assert!(raw.starts_with("From: \"Ada \\\"The Countess\\\"\" <ada@example.com>\r\n"));
    }

    #[test]
    fn encodes_non_ascii_headers() {
        let raw = message("Zoë", "Héllo", "b").to_rfc5322(&date());
        assert!(raw.starts_with("From: =?utf-8?B?Wm/Dqw==?= <ada@example.com>\r\n"));
        assert!(raw.contains("\r\nSubject: =?utf-8?B?SMOpbGxv?=\r\n"));
    }

    #[test]
    fn splits_long_encoded_subjects() {
        let subject = "é".repeat(40);
        let encoded = encode_header(&subject);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|w| w.len() <= 75));
    }

    #[test]
    fn strips_line_breaks_from_headers() {
        let raw = message("Ada", "Hi\r\nBcc: evil@example.com", "b").to_rfc5322(&date());
        assert!(raw.contains("\r\nSubject: Hi  Bcc: evil@example.com\r\n"));
        assert!(!raw.contains("\r\nBcc:"));
    }

    fn body_of(raw: &str) -> &str {
        raw.split_once("\r\n\r\n").unwrap().1
    }

    #[test]
    fn encodes_non_ascii_body_as_quoted_printable() {
        let raw = message("Ada", "s", "Grüße\r\nA = B\n").to_rfc5322(&date());
        assert!(raw.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(raw.is_ascii());
        assert_eq!(body_of(&raw), "Gr=C3=BC=C3=9Fe\r\nA =3D B\r\n");
    }

    #[test]
    fn long_body_lines_are_wrapped() {
        let body = "word ".repeat(400);
        let raw = message("Ada", "s", &body).to_rfc5322(&date());

        assert!(raw.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        let longest = raw.split("\r\n").map(str::len).max().unwrap();
        assert!(longest <= QP_LINE_LENGTH, "longest line is {longest} octets");

        let unfolded = body_of(&raw).replace("=\r\n", "");
        let expected = format!("{}=20\r\n", body.trim_end());
        assert_eq!(unfolded, expected);
    }

    #[test]
    fn line_at_the_limit_stays_seven_bit() {
        let body = "a".repeat(MAX_LINE_OCTETS);
        let raw = message("Ada", "s", &body).to_rfc5322(&date());
        assert!(raw.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(raw.ends_with(&format!("\r\n\r\n{body}\r\n")));
    }

    #[test]
    fn encoded_bytes_are_not_split_by_soft_breaks() {
        let body = "é".repeat(60);
        let raw = message("Ada", "s", &body).to_rfc5322(&date());
        for line in body_of(&raw).split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= QP_LINE_LENGTH);
            let content = line.strip_suffix('=').unwrap_or(line);
            assert_eq!(content.len() % 3, 0, "split escape in {line:?}");
        }
    }
}
