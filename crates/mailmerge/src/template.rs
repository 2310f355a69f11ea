//! Literal `{{key}}` placeholder substitution.
//!
//! A placeholder is `{{` followed by one or more ASCII letters, digits or
//! underscores, followed by `}}`. Keys are case-sensitive. Anything else
//! between braces is plain text. Placeholders without a value in the
//! [`Context`] are kept verbatim so they stand out in a dry run.

use crate::error::InputError;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

/// Variables available to every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Globals {
    /// Sender display name.
    pub from_name: String,
    /// Sender address.
    pub from_email: String,
    /// Date of the run, `YYYY-MM-DD`.
    pub today: String,
}

impl Globals {
    /// Creates the globals for a run on `today`.
    #[must_use]
    pub fn new(from_name: impl Into<String>, from_email: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            from_name: from_name.into(),
            from_email: from_email.into(),
            today: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Values used to render one row.
///
/// `from_name` and `from_email` always resolve to the globals. Every other
/// key, `today` included, resolves to the row first.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    globals: &'a Globals,
    row: &'a HashMap<String, String>,
}

impl<'a> Context<'a> {
    /// Combines the globals with one recipient row.
    #[must_use]
    pub const fn new(globals: &'a Globals, row: &'a HashMap<String, String>) -> Self {
        Self { globals, row }
    }

    /// Looks up a placeholder value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a str> {
        match key {
            "from_name" => Some(self.globals.from_name.as_str()),
            "from_email" => Some(self.globals.from_email.as_str()),
            _ => self.row.get(key).map(String::as_str).or_else(|| {
                (key == "today").then_some(self.globals.today.as_str())
            }),
        }
    }
}

/// A subject or body template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// Creates a template from its text.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Reads a UTF-8 template file.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Template`] if the file is missing, unreadable or
    /// not valid UTF-8.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let mut source =
            std::fs::read_to_string(path).map_err(|source| InputError::Template {
                path: path.to_path_buf(),
                source,
            })?;
        if source.starts_with('\u{feff}') {
            source.remove(0);
        }
        Ok(Self { source })
    }

    /// Returns the template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the template against `context`.
    ///
    /// Substituted values are copied as-is and never scanned for further
    /// placeholders.
    #[must_use]
    pub fn render(&self, context: &Context<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            if let Some(key) = placeholder_key(after) {
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[key.len() + 2..];
            } else {
                // Not a placeholder; the second brace may open one
                out.push('{');
                rest = &rest[start + 1..];
            }
        }

        out.push_str(rest);
        out
    }

    /// Returns the distinct placeholder keys in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            if let Some(key) = placeholder_key(after) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
                rest = &after[key.len() + 2..];
            } else {
                rest = &rest[start + 1..];
            }
        }

        keys
    }

    /// Returns the placeholder keys `context` has no value for.
    #[must_use]
    pub fn unresolved(&self, context: &Context<'_>) -> Vec<&str> {
        self.placeholders()
            .into_iter()
            .filter(|key| context.get(key).is_none())
            .collect()
    }
}

const fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns the key if `s` starts with `key}}`.
fn placeholder_key(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_key_char(c)).unwrap_or(s.len());
    (end > 0 && s[end..].starts_with("}}")).then(|| &s[..end])
}
