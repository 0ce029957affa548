//! Merge engine and source handling for bucket
//!
//! This crate sits on top of the data model and the storage backends:
//! - Merge: sum readouts that share a definition, recomputing bucket counts
//! - Selection: parse `[record@][type:]URI` source strings
//! - Registry: open the reader or writer a selection names
//! - Loader: load many sources with per-source failure accounting

#![warn(clippy::all)]

pub mod loader;
pub mod merge;
pub mod registry;
pub mod selection;

pub use loader::{load_sources, merge_sources, LoadFailure, LoadReport, LoadedSource};
pub use merge::{merge_readouts, MergeConfig, MergeReadout};
pub use registry::{open_reader, open_writer, read_selection, write_selection};
pub use selection::{Backend, Selection};
