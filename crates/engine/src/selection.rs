//! Selection strings
//!
//! A selection names a coverage source: `[record@][type:]URI`.
//!
//! - `record` picks a single record by id; without it every record is read
//! - `type` is `archive`, `json` or `sql`; without it the type is inferred
//!   from the URI's extension
//!
//! A prefix that isn't a known type (e.g. the `C:` of a Windows path) is part
//! of the URI.

use std::fmt;
use std::str::FromStr;

use bucket_core::{Error, Result};

/// Storage backend named by a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Archive,
    Json,
    Sql,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Archive, Backend::Json, Backend::Sql];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Archive => "archive",
            Backend::Json => "json",
            Backend::Sql => "sql",
        }
    }

    /// Backend with the given type name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.name().eq_ignore_ascii_case(name))
    }

    /// Backend implied by a URI's extension
    pub fn infer(uri: &str) -> Option<Self> {
        let lower = uri.to_ascii_lowercase();
        let has = |suffixes: &[&str]| suffixes.iter().any(|suffix| lower.ends_with(suffix));
        if has(&[".bktgz", ".tgz", ".tar.gz", ".bktzst"]) {
            Some(Backend::Archive)
        } else if has(&[".json"]) {
            Some(Backend::Json)
        } else if has(&[".db", ".sqlite", ".sqlite3"]) {
            Some(Backend::Sql)
        } else {
            None
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed selection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub backend: Backend,
    pub record: Option<usize>,
    pub uri: String,
}

impl Selection {
    pub fn new(backend: Backend, uri: impl Into<String>) -> Self {
        Self {
            backend,
            record: None,
            uri: uri.into(),
        }
    }

    pub fn with_record(mut self, record: usize) -> Self {
        self.record = Some(record);
        self
    }

    /// Parse `[record@][type:]URI`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        let (record, rest) = match text.split_once('@') {
            Some((record, rest))
                if !record.is_empty() && record.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let record = record.parse::<usize>().map_err(|e| {
                    Error::InvalidSelection(format!("bad record in '{}': {}", text, e))
                })?;
                (Some(record), rest)
            }
            _ => (None, text),
        };

        let explicit = rest
            .split_once(':')
            .and_then(|(prefix, uri)| Backend::from_name(prefix).map(|backend| (backend, uri)));
        let (backend, uri) = match explicit {
            Some((backend, uri)) => (backend, uri),
            None => {
                let backend = Backend::infer(rest).ok_or_else(|| {
                    Error::InvalidSelection(format!(
                        "cannot infer a backend for '{}'; prefix it with archive:, json: or sql:",
                        rest
                    ))
                })?;
                (backend, rest)
            }
        };

        if uri.is_empty() {
            return Err(Error::InvalidSelection(format!("no URI in '{}'", text)));
        }
        Ok(Self {
            backend,
            record,
            uri: uri.to_string(),
        })
    }
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(record) = self.record {
            write!(f, "{}@", record)?;
        }
        write!(f, "{}:{}", self.backend, self.uri)
    }
}
