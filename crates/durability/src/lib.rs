//! Storage backends for bucket
//!
//! This crate handles everything that touches disk:
//!
//! - Table codec: line-oriented text tables with byte-offset indexes
//! - Archive: tar container of tables, gzip or zstd compressed, with an
//!   optional checksum manifest
//! - JSON: a single human readable document of definitions and records
//!
//! Every backend implements the [`Reader`](bucket_core::Reader) and
//! [`Writer`](bucket_core::Writer) traits from `bucket-core`.

#![warn(clippy::all)]

pub mod archive; // Compressed table archives (.bktgz / .bktzst)
pub mod json; // JSON document backend
pub mod table; // Table codec and row mappings

pub use archive::{
    ArchiveCodec, ArchiveConfig, ArchiveConfigError, ArchiveContents, ArchiveManifest,
    ArchiveReader, ArchiveReadout, ArchiveWriteInfo, ArchiveWriter, Compression, ReadMode,
    TableSet, ARCHIVE_EXTENSION, ARCHIVE_FORMAT_VERSION, ARCHIVE_ZSTD_EXTENSION,
};
pub use json::{JsonDefinition, JsonDocument, JsonReader, JsonRecord, JsonWriter};
pub use table::{ByteSpan, DefinitionEntry, Field, RecordEntry, Table, TableBuffer, TableRow};
