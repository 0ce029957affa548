//! Error types for bucket
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Codec and model errors describe data that is either well-formed or not, so
//! nothing here is retried automatically. Every variant names the file, table
//! or record that triggered it.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias for bucket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bucket
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error without a known file (in-memory streams)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// I/O error on a named file
    #[error("I/O error on {path}: {source}")]
    File {
        /// File being read or written
        path: String,
        source: io::Error,
    },

    /// Serialization/deserialization error (JSON documents, manifests)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// One or more required tables are absent from an archive
    #[error("Missing tables in {origin}: {}", .tables.join(", "))]
    MissingTable {
        /// Archive that was being read
        origin: String,
        /// Every missing table name, in canonical table order
        tables: Vec<String>,
    },

    /// Merge inputs do not share a definition
    #[error("Incompatible definition: expected {expected}, found {found}")]
    IncompatibleDefinition {
        /// def_sha of the first input
        expected: String,
        /// def_sha of the mismatching input
        found: String,
    },

    /// Merge inputs do not share a record hash (strict merge policy only)
    #[error("Incompatible record: expected {expected}, found {found}")]
    IncompatibleRecord {
        /// rec_sha of the first input
        expected: String,
        /// rec_sha of the mismatching input
        found: String,
    },

    /// A source produced no coverage records at all
    #[error("No coverage data in {origin}")]
    EmptyReadout {
        /// Source that was loaded
        origin: String,
    },

    /// A table row could not be decoded
    #[error("Malformed table '{table}'{} at byte {offset}: {reason}", in_origin(.origin))]
    MalformedTable {
        /// Archive holding the table; empty until the error is located
        origin: String,
        /// Table name
        table: String,
        /// Byte offset of the offending row or field
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// An archive entry does not match its manifest checksum
    #[error("Checksum mismatch for {entry}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Entry that failed verification
        entry: String,
        /// Checksum recorded in the manifest
        expected: String,
        /// Checksum of the entry bytes
        actual: String,
    },

    /// Archive container operation failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// Compression/decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Definition tables are structurally invalid
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// Bucket coordinates or flat index out of range
    #[error("Invalid bucket: {0}")]
    InvalidBucket(String),

    /// Requested record does not exist
    #[error("Record {record} out of range in {origin} ({count} records)")]
    RecordOutOfRange {
        /// Source being read
        origin: String,
        /// Requested record
        record: usize,
        /// Number of records available
        count: usize,
    },

    /// The reader backing a readout has been closed
    #[error("Reader closed: {origin}")]
    ReaderClosed {
        /// Source the reader was opened on
        origin: String,
    },

    /// Backend exists but is not provided by this crate
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// Reader/writer selection string could not be parsed
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn in_origin(origin: &str) -> String {
    if origin.is_empty() {
        String::new()
    } else {
        format!(" in {}", origin)
    }
}

impl Error {
    /// Create a malformed table error
    pub fn malformed(table: impl Into<String>, offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            origin: String::new(),
            table: table.into(),
            offset,
            reason: reason.into(),
        }
    }

    /// Create a file I/O error naming `path`
    pub fn file(path: &Path, source: io::Error) -> Self {
        Self::File {
            path: path.display().to_string(),
            source,
        }
    }

    /// Name the archive a malformed table error came from
    ///
    /// Other errors, and tables already located, are returned unchanged.
    pub fn located(self, archive: &str) -> Self {
        match self {
            Self::MalformedTable {
                origin,
                table,
                offset,
                reason,
            } if origin.is_empty() => Self::MalformedTable {
                origin: archive.to_string(),
                table,
                offset,
                reason,
            },
            other => other,
        }
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a compression error
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }

    /// Create an invalid definition error
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }

    /// True for errors caused by the data itself rather than the environment
    pub fn is_data_error(&self) -> bool {
        !matches!(
            self,
            Error::Io(_) | Error::File { .. } | Error::ReaderClosed { .. }
        )
    }
}
