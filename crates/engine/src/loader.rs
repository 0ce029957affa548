//! Multi-source loading
//!
//! Loads every selection it is given and keeps going past failures, so one
//! corrupt or empty file doesn't hide the coverage of the rest. The report
//! accounts for each source individually.

use tracing::{info, warn};

use bucket_core::{Error, MemoryReadout, Readout, Result};
use bucket_durability::ArchiveConfig;

use crate::merge::{merge_readouts, MergeConfig, MergeReadout};
use crate::registry::read_selection;
use crate::selection::Selection;

/// A source that produced at least one record
#[derive(Debug)]
pub struct LoadedSource {
    pub selection: Selection,
    pub readouts: Vec<MemoryReadout>,
}

/// A source that could not be used
#[derive(Debug)]
pub struct LoadFailure {
    /// The selector as given
    pub selector: String,
    pub error: Error,
}

/// Outcome of [`load_sources`]
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedSource>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Every loaded readout, in selector then record order
    pub fn readouts(&self) -> Vec<&MemoryReadout> {
        self.loaded
            .iter()
            .flat_map(|source| source.readouts.iter())
            .collect()
    }

    pub fn readout_count(&self) -> usize {
        self.loaded.iter().map(|source| source.readouts.len()).sum()
    }

    /// True when no source produced a readout
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Merge every loaded readout
    pub fn merge(&self, config: &MergeConfig) -> Result<MergeReadout> {
        if self.is_empty() {
            return Err(Error::EmptyReadout {
                origin: self
                    .failures
                    .iter()
                    .map(|failure| failure.selector.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        let readouts = self.readouts();
        let dyn_readouts: Vec<&dyn Readout> =
            readouts.iter().map(|readout| *readout as &dyn Readout).collect();
        merge_readouts(&dyn_readouts, config)
    }
}

fn load_one(selector: &str, config: &ArchiveConfig) -> Result<LoadedSource> {
    let selection = Selection::parse(selector)?;
    let readouts = read_selection(&selection, config)?;
    if readouts.is_empty() {
        return Err(Error::EmptyReadout {
            origin: selector.to_string(),
        });
    }
    Ok(LoadedSource {
        selection,
        readouts,
    })
}

/// Load every selector, recording per-source success or failure
pub fn load_sources<S: AsRef<str>>(selectors: &[S], config: &ArchiveConfig) -> LoadReport {
    let mut report = LoadReport::default();
    for selector in selectors {
        let selector = selector.as_ref();
        match load_one(selector, config) {
            Ok(source) => report.loaded.push(source),
            Err(error) => {
                warn!(selector = %selector, error = %error, "Failed to load coverage source");
                report.failures.push(LoadFailure {
                    selector: selector.to_string(),
                    error,
                });
            }
        }
    }
    info!(
        sources = selectors.len(),
        loaded = report.loaded.len(),
        failed = report.failures.len(),
        readouts = report.readout_count(),
        "Loaded coverage sources"
    );
    report
}

/// Load every selector and merge whatever loaded
///
/// Failed sources are skipped (and logged). Fails with `EmptyReadout` when
/// nothing loaded.
pub fn merge_sources<S: AsRef<str>>(
    selectors: &[S],
    archive_config: &ArchiveConfig,
    merge_config: &MergeConfig,
) -> Result<(MergeReadout, LoadReport)> {
    let report = load_sources(selectors, archive_config);
    let merged = report.merge(merge_config)?;
    Ok((merged, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucket_core::{CoverNode, Coverpoint, RowRange, Writer};
    use bucket_durability::{ArchiveWriter, JsonWriter};
    use tempfile::tempdir;

    fn run(source: &str, hits: u64) -> MemoryReadout {
        let mut point = Coverpoint::new("opcodes", "")
            .with_axis("op", "", ["add", "sub"])
            .with_default_target(1);
        point.hit_n(&["add"], hits).unwrap();
        CoverNode::from(point).readout(source, "").unwrap()
    }

    #[test]
    fn test_load_with_failures() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("a.json");
        let archive = dir.path().join("b.bktgz");
        let empty = dir.path().join("empty.bktgz");
        JsonWriter::new(&json).write(&run("a", 1)).unwrap();
        ArchiveWriter::new(&archive, ArchiveConfig::for_testing())
            .write_readouts(&[&run("b", 2), &run("c", 3)])
            .unwrap();
        ArchiveWriter::new(&empty, ArchiveConfig::for_testing())
            .write_readouts(&[])
            .unwrap();

        let selectors = vec![
            json.display().to_string(),
            archive.display().to_string(),
            empty.display().to_string(),
            dir.path().join("missing.json").display().to_string(),
            "notes.txt".to_string(),
        ];
        let report = load_sources(&selectors, &ArchiveConfig::default());

        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.readout_count(), 3);
        assert!(!report.is_empty());
        assert_eq!(report.failures.len(), 3);
        assert!(matches!(report.failures[0].error, Error::EmptyReadout { .. }));
        assert!(matches!(
            report.failures[1].error,
            Error::File { ref path, .. } if path.ends_with("missing.json")
        ));
        assert!(matches!(report.failures[2].error, Error::InvalidSelection(_)));

        let merged = report.merge(&MergeConfig::default()).unwrap();
        assert_eq!(merged.input_count(), 3);
        let root = merged
            .iter_point_hits(RowRange::single(0))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(root.hits, 1);
        assert_eq!(root.hit_buckets, 1);
        assert_eq!(root.full_buckets, 1);
    }

    #[test]
    fn test_merge_sources_nothing_loaded() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.bktgz");
        ArchiveWriter::new(&empty, ArchiveConfig::for_testing())
            .write_readouts(&[])
            .unwrap();

        let result = merge_sources(
            &[empty.display().to_string()],
            &ArchiveConfig::default(),
            &MergeConfig::default(),
        );
        assert!(matches!(result, Err(Error::EmptyReadout { .. })));
    }

    #[test]
    fn test_merge_sources() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        JsonWriter::new(&first).write(&run("a", 1)).unwrap();
        JsonWriter::new(&second).write(&run("b", 4)).unwrap();

        let (merged, report) = merge_sources(
            &[first.display().to_string(), second.display().to_string()],
            &ArchiveConfig::default(),
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(!report.has_failures());
        assert_eq!(merged.input_count(), 2);
        assert_eq!(merged.source(), "");
    }
}
