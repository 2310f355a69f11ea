//! Recipient rows read lazily from a CSV file.

use crate::error::InputError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Column every contacts file must have.
pub const EMAIL_COLUMN: &str = "email";

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Line of the record in the file (1-based, header is line 1).
    pub line: u64,
    /// Column name → trimmed value.
    pub fields: HashMap<String, String>,
}

impl Recipient {
    /// Returns the `email` value, empty when blank.
    #[must_use]
    pub fn email(&self) -> &str {
        self.fields.get(EMAIL_COLUMN).map_or("", |v| v.trim())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted: BTreeMap<_, _> = self.fields.iter().collect();
        write!(f, "line {}: {sorted:?}", self.line)
    }
}

/// Single-pass reader over the rows of a contacts CSV.
///
/// Header names are trimmed and lower-cased so `{{Name}}`-style headers map
/// to predictable `{{name}}` placeholders. Rows shorter than the header get
/// empty values for the missing columns.
pub struct ContactReader {
    path: PathBuf,
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
}

impl ContactReader {
    /// Opens `path` and validates its header.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if the file cannot be opened, the header
    /// cannot be read, or there is no `email` column.
    pub fn open(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| InputError::Header {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(normalize_header)
            .collect();

        if !headers.iter().any(|h| h == EMAIL_COLUMN) {
            return Err(InputError::MissingEmailColumn {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records: reader.into_records(),
        })
    }

    /// Returns the normalized column names.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl fmt::Debug for ContactReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactReader")
            .field("path", &self.path)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Iterator for ContactReader {
    type Item = Result<Recipient, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(source) => {
                let line = source.position().map_or(0, csv::Position::line);
                return Some(Err(InputError::Record {
                    path: self.path.clone(),
                    line,
                    source,
                }));
            }
        };

        let line = record.position().map_or(0, csv::Position::line);
        let fields = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.get(i).unwrap_or("").trim().to_string();
                (header.clone(), value)
            })
            .collect();

        Some(Ok(Recipient { line, fields }))
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn read_all(content: &[u8]) -> Vec<Recipient> {
        let file = csv_file(content);
        ContactReader::open(file.path())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn reads_rows_in_order() {
        let rows = read_all(b"email,name\na@x.com,Alice\n,Bob\nc@x.com,Carol\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].email(), "a@x.com");
        assert_eq!(rows[0].fields["name"], "Alice");
        assert_eq!(rows[1].email(), "");
        assert_eq!(rows[1].fields["name"], "Bob");
        assert_eq!(rows[2].fields["name"], "Carol");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn normalizes_headers_and_values() {
        let rows = read_all("\u{feff} Email , First_Name \n  a@x.com ,  Ann  \n".as_bytes());
        assert_eq!(rows[0].email(), "a@x.com");
        assert_eq!(rows[0].fields["first_name"], "Ann");
    }

    #[test]
    fn exposes_normalized_headers() {
        let file = csv_file(b" Email ,Name,COMPANY\n");
        let reader = ContactReader::open(file.path()).unwrap();
        assert_eq!(reader.headers(), ["email", "name", "company"]);
    }

    #[test]
    fn debug_shows_path_and_headers() {
        let file = csv_file(b"email,name\na@x.com,Alice\n");
        let reader = ContactReader::open(file.path()).unwrap();
        let debug = format!("{reader:?}");
        assert!(debug.starts_with("ContactReader { path: "));
        assert!(debug.contains(r#"headers: ["email", "name"]"#));
        assert!(debug.ends_with(", .. }"));
    }

    #[test]
    fn fills_short_rows() {
        let rows = read_all(b"email,name,company\na@x.com,Alice\n");
        assert_eq!(rows[0].fields["company"], "");
    }

    #[test]
    fn handles_quoted_fields() {
        let rows = read_all(b"email,note\na@x.com,\"Hello, \"\"friend\"\"\"\n");
        assert_eq!(rows[0].fields["note"], "Hello, \"friend\"");
    }

    #[test]
    fn missing_email_column() {
        let file = csv_file(b"name,company\nAlice,ACME\n");
        let err = ContactReader::open(file.path()).unwrap_err();
        assert!(matches!(err, InputError::MissingEmailColumn { .. }));
    }

    #[test]
    fn empty_file_has_no_email_column() {
        let file = csv_file(b"");
        let err = ContactReader::open(file.path()).unwrap_err();
        assert!(matches!(err, InputError::MissingEmailColumn { .. }));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContactReader::open(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, InputError::Open { .. }));
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(read_all(b"email,name\n").is_empty());
    }

    #[test]
    fn invalid_utf8_record_is_an_error() {
        let file = csv_file(b"email,name\na@x.com,\xff\xfe\n");
        let mut reader = ContactReader::open(file.path()).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(InputError::Record { .. }))
        ));
    }

    #[test]
    fn display_is_sorted() {
        let rows = read_all(b"name,email\nBob,\n");
        assert_eq!(rows[0].to_string(), r#"line 2: {"email": "", "name": "Bob"}"#);
    }
}
