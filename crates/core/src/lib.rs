//! Core types and traits for bucket
//!
//! This crate defines the coverage data model and the protocol every backend
//! speaks:
//! - Point, Axis, AxisValue, Goal, BucketGoal, PointHit, BucketHit: table rows
//! - Definition / Record: owned tables of one coverage tree and one run
//! - BucketSpace: mixed-radix bucket addressing
//! - FingerprintChain: `def_sha` / `rec_sha` computation
//! - Readout, Reader, Writer: streaming access protocol
//! - MemoryReadout: readout over in-memory tables
//! - hierarchy: lazy navigation of the nested-set tree
//! - tree: coverage tree builder (Coverpoint, Covergroup)
//! - access: ratios and labelled buckets over any readout
//! - Error: error type hierarchy

#![warn(clippy::all)]

pub mod access;
pub mod addressing;
pub mod error;
pub mod fingerprint;
pub mod hierarchy;
pub mod readout;
pub mod tree;
pub mod types;

pub use access::{BucketAccess, CoverageAccess, PointAccess};
pub use addressing::BucketSpace;
pub use error::{Error, Result};
pub use fingerprint::{definition_sha, record_sha, FingerprintChain};
pub use readout::{MemoryReadout, Reader, Readout, RowRange, Rows, Writer};
pub use tree::{CoverNode, Covergroup, Coverpoint};
pub use types::{
    Axis, AxisValue, BucketGoal, BucketHit, BucketTally, Definition, Goal, Point, PointHit,
    Record, DEFAULT_GOAL, DEFAULT_TARGET, IGNORE_TARGET, ILLEGAL_TARGET,
};
