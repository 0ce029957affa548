//! bucket - functional coverage data model, storage and merging
//!
//! Coverage is described by a tree of coverpoints (axes crossed into buckets,
//! each bucket weighed by a goal) and covergroups. A run's hits against that
//! tree form a record; together with the definition it is exposed as a
//! [`Readout`].
//!
//! # Quick Start
//!
//! ```no_run
//! use bucket::{ArchiveConfig, CoverNode, Coverpoint, MergeConfig, Selection};
//!
//! # fn main() -> bucket::Result<()> {
//! let mut point = Coverpoint::new("sizes", "Packet sizes")
//!     .with_axis("size", "Length class", ["small", "large"]);
//! point.hit(&["small"])?;
//! let readout = CoverNode::from(point).readout("smoke_test", "seed=1")?;
//!
//! let selection = Selection::parse("coverage.bktgz")?;
//! bucket::write_selection(&selection, &ArchiveConfig::default(), &[&readout])?;
//!
//! let (merged, _report) = bucket::merge_sources(
//!     &["coverage.bktgz"],
//!     &ArchiveConfig::default(),
//!     &MergeConfig::default(),
//! )?;
//! # let _ = merged;
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! - `bucket-core`: data model, readout protocol, fingerprints, tree builder
//! - `bucket-durability`: table codec, archive and JSON backends
//! - `bucket-engine`: merge engine, selections, loading

pub use bucket_core::*;
pub use bucket_durability::{
    archive, json, table, ArchiveConfig, ArchiveReader, ArchiveWriter, Compression, JsonReader,
    JsonWriter, ReadMode,
};
pub use bucket_engine::*;
