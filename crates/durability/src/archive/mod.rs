//! Coverage archive format (.bktgz)
//!
//! A portable, compressed container holding any number of definitions and
//! records.
//!
//! ## Archive Structure
//!
//! ```text
//! <name>.bktgz (gzip, or zstd for .bktzst)
//! └── tar
//!     ├── definition      def_sha + byte spans into the five definition tables
//!     ├── record          rec_sha + definition row offset + hit spans + source
//!     ├── point
//!     ├── axis
//!     ├── axis_value
//!     ├── goal
//!     ├── bucket_goal
//!     ├── point_hit
//!     ├── bucket_hit
//!     └── MANIFEST.json   optional: format version, xxh3 checksums, counts
//! ```
//!
//! Every table is Table Codec text. Records sharing a `def_sha` share one
//! definition row and one copy of the definition tables.

pub mod codec;
pub mod config;
pub mod reader;
pub mod types;
pub mod writer;

pub use codec::{ArchiveCodec, TableSet};
pub use config::{ArchiveConfig, ArchiveConfigError, Compression, ReadMode};
pub use reader::{ArchiveReader, ArchiveReadout, ArchiveStore};
pub use types::{
    paths, xxh3_hex, ArchiveContents, ArchiveManifest, ArchiveWriteInfo, ARCHIVE_EXTENSION,
    ARCHIVE_FORMAT_VERSION, ARCHIVE_ZSTD_EXTENSION,
};
pub use writer::ArchiveWriter;
