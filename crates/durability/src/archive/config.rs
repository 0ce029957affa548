//! Archive configuration.
//!
//! This module provides configuration shared by the archive reader and writer.

use bucket_core::Error;

/// Whole-archive compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip, the canonical `.bktgz` encoding (level 0-9).
    Gzip { level: u32 },
    /// Zstandard (level 1-22).
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Gzip { level: 6 }
    }
}

/// How much an archive reader decodes up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Build row offset indexes only; rows are decoded as they are iterated.
    #[default]
    Windowed,
    /// Decode every row when the archive is opened.
    Materialized,
}

/// Archive configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Codec used when writing (default: gzip level 6).
    ///
    /// Readers detect the codec from the stream magic and ignore this.
    pub compression: Compression,

    /// Reader decoding strategy (default: windowed).
    pub read_mode: ReadMode,

    /// Verify table checksums against the manifest on read (default: true).
    pub verify_checksums: bool,

    /// Write a `MANIFEST.json` entry (default: true).
    pub write_manifest: bool,

    /// Append to an existing archive instead of replacing it (default: true).
    pub append: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            compression: Compression::default(),
            read_mode: ReadMode::Windowed,
            verify_checksums: true,
            write_manifest: true,
            append: true,
        }
    }
}

impl ArchiveConfig {
    /// Create a new archive configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression codec (builder pattern).
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set read mode (builder pattern).
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    /// Enable or disable checksum verification (builder pattern).
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Enable or disable the manifest entry (builder pattern).
    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    /// Enable or disable appending (builder pattern).
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ArchiveConfigError> {
        match self.compression {
            Compression::Gzip { level } if level > 9 => {
                Err(ArchiveConfigError::GzipLevelOutOfRange(level))
            }
            Compression::Zstd { level } if !(1..=22).contains(&level) => {
                Err(ArchiveConfigError::ZstdLevelOutOfRange(level))
            }
            _ => Ok(()),
        }
    }

    /// Create a configuration optimized for testing (fast compression, materialized reads).
    pub fn for_testing() -> Self {
        ArchiveConfig {
            compression: Compression::Gzip { level: 1 },
            read_mode: ReadMode::Materialized,
            verify_checksums: true,
            write_manifest: true,
            append: false,
        }
    }
}

/// Archive configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveConfigError {
    /// Gzip level outside 0-9.
    #[error("Gzip compression level must be 0-9, got {0}")]
    GzipLevelOutOfRange(u32),

    /// Zstd level outside 1-22.
    #[error("Zstd compression level must be 1-22, got {0}")]
    ZstdLevelOutOfRange(i32),
}

impl From<ArchiveConfigError> for Error {
    fn from(err: ArchiveConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
