//! Archive core types
//!
//! Types for the coverage archive format (.bktgz)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current archive format version
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// File extension of gzip compressed archives
pub const ARCHIVE_EXTENSION: &str = ".bktgz";

/// File extension of zstd compressed archives
pub const ARCHIVE_ZSTD_EXTENSION: &str = ".bktzst";

/// Entry names within the archive
pub mod paths {
    /// Definition index table
    pub const DEFINITION: &str = "definition";
    /// Record index table
    pub const RECORD: &str = "record";
    pub const POINT: &str = "point";
    pub const AXIS: &str = "axis";
    pub const AXIS_VALUE: &str = "axis_value";
    pub const GOAL: &str = "goal";
    pub const BUCKET_GOAL: &str = "bucket_goal";
    pub const POINT_HIT: &str = "point_hit";
    pub const BUCKET_HIT: &str = "bucket_hit";
    /// Optional manifest with checksums
    pub const MANIFEST: &str = "MANIFEST.json";

    /// Every table, in the order they are written
    pub const TABLES: [&str; 9] = [
        DEFINITION,
        RECORD,
        POINT,
        AXIS,
        AXIS_VALUE,
        GOAL,
        BUCKET_GOAL,
        POINT_HIT,
        BUCKET_HIT,
    ];
}

/// Gzip stream magic
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Zstd frame magic
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

// =============================================================================
// MANIFEST.json
// =============================================================================

/// Archive manifest - format metadata and checksums
///
/// Written last so that it can checksum every table. Archives without a
/// manifest are still valid; they just cannot be verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveManifest {
    /// Format version (currently 1)
    pub format_version: u32,

    /// Version of the crate that wrote the archive
    pub bucket_version: String,

    /// Checksum algorithm used (currently "xxh3")
    pub checksum_algorithm: String,

    /// Checksum per table entry, hex encoded
    pub checksums: BTreeMap<String, String>,

    /// Summary of archive contents
    pub contents: ArchiveContents,
}

impl ArchiveManifest {
    pub fn new(bucket_version: impl Into<String>, contents: ArchiveContents) -> Self {
        Self {
            format_version: ARCHIVE_FORMAT_VERSION,
            bucket_version: bucket_version.into(),
            checksum_algorithm: "xxh3".to_string(),
            checksums: BTreeMap::new(),
            contents,
        }
    }

    /// Add a checksum for an entry
    pub fn add_checksum(&mut self, entry: impl Into<String>, checksum: impl Into<String>) {
        self.checksums.insert(entry.into(), checksum.into());
    }
}

/// Summary of archive contents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ArchiveContents {
    /// Number of distinct definitions
    pub definitions: u64,

    /// Number of records
    pub records: u64,
}

/// Information about a completed archive write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveWriteInfo {
    /// Record ids assigned to the written readouts
    pub records: Vec<usize>,

    /// Definitions added by this write (deduplicated ones are not counted)
    pub new_definitions: usize,

    /// Size of the compressed archive
    pub archive_size_bytes: u64,

    /// xxh3 checksum of the compressed archive
    pub checksum: String,
}

/// Compute xxh3 hash and return as hex string
pub fn xxh3_hex(data: &[u8]) -> String {
    let hash = xxhash_rust::xxh3::xxh3_64(data);
    format!("{:016x}", hash)
}
