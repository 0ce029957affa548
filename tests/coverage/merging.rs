//! Merge Tests
//!
//! Merging across backends, mismatched definitions and empty sources.

use bucket::{
    load_sources, merge_readouts, merge_sources, write_selection, ArchiveConfig, ArchiveReader,
    ArchiveWriter, CoverNode, CoverageAccess, Coverpoint, Error, MemoryReadout, MergeConfig,
    Reader, Readout, RowRange, Selection,
};
use proptest::prelude::*;
use tempfile::tempdir;

use crate::common::{init_tracing, tree_readout, uri};

#[test]
fn merging_runs_from_two_backends() {
    init_tracing();
    let dir = tempdir().unwrap();
    let archive = uri(dir.path(), "nightly.bktgz");
    let json = uri(dir.path(), "local.json");
    let config = ArchiveConfig::default();
    write_selection(&Selection::parse(&archive).unwrap(), &config, &[&tree_readout("a", 1)])
        .unwrap();
    write_selection(&Selection::parse(&json).unwrap(), &config, &[&tree_readout("b", 1)])
        .unwrap();

    let (merged, report) =
        merge_sources(&[archive.as_str(), json.as_str()], &config, &MergeConfig::default())
            .unwrap();
    assert!(!report.has_failures());
    assert_eq!(merged.input_count(), 2);

    let access = CoverageAccess::new(&merged);
    let top = access.root().unwrap().unwrap();
    assert_eq!(top.hits(), 4);
    assert_eq!(top.buckets_hit(), 3);
    assert_eq!(top.buckets_full(), 3);

    let colors = access.point(1).unwrap().unwrap();
    assert_eq!(colors.hits(), 1);
    let hits: Vec<u64> = merged
        .iter_bucket_hits(RowRange::new(0, 6))
        .map(|hit| hit.unwrap().hits)
        .collect();
    assert_eq!(hits, vec![0, 0, 2, 0, 0, 0]);
}

#[test]
fn merged_readout_can_be_stored() {
    let dir = tempdir().unwrap();
    let a = tree_readout("a", 1);
    let b = tree_readout("b", 2);
    let merged = merge_readouts(&[&a, &b], &MergeConfig::default()).unwrap();

    let path = dir.path().join("merged.bktgz");
    ArchiveWriter::with_defaults(&path)
        .write_readouts(&[&merged])
        .unwrap();
    let reader = ArchiveReader::open(&path, &ArchiveConfig::default()).unwrap();
    let stored = reader.read(0).unwrap();
    assert_eq!(stored.def_sha(), a.def_sha());
    assert_eq!(stored.source(), "");
    let root = stored
        .iter_point_hits(RowRange::single(0))
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(root.hits, 4);
}

#[test]
fn mismatched_definitions_are_rejected() {
    let a = tree_readout("a", 1);
    let mut point = Coverpoint::new("top", "").with_axis("x", "", ["0", "1"]);
    point.hit(&["0"]).unwrap();
    let other = CoverNode::from(point).readout("b", "").unwrap();

    let err = merge_readouts(&[&a, &a, &other], &MergeConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::IncompatibleDefinition { ref expected, ref found }
            if expected == a.def_sha() && found == other.def_sha()
    ));
}

#[test]
fn empty_archive_reports_empty_readout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.bktgz");
    ArchiveWriter::with_defaults(&path)
        .write_readouts(&[])
        .unwrap();

    let reader = ArchiveReader::open(&path, &ArchiveConfig::default()).unwrap();
    assert_eq!(reader.read_all().count(), 0);

    let selector = path.display().to_string();
    let report = load_sources(&[selector.as_str()], &ArchiveConfig::default());
    assert!(report.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        Error::EmptyReadout { .. }
    ));
    assert!(matches!(
        merge_sources(&[selector.as_str()], &ArchiveConfig::default(), &MergeConfig::default()),
        Err(Error::EmptyReadout { .. })
    ));
}

/// `size x color` with target 2, hit `hits[i]` times in bucket `i`
fn run_with_hits(source: &str, hits: &[u64]) -> MemoryReadout {
    let mut point = Coverpoint::new("colors", "")
        .with_axis("size", "", ["small", "large"])
        .with_axis("color", "", ["red", "green", "blue"])
        .with_default_target(2);
    for (index, count) in hits.iter().enumerate() {
        point.hit_index(index, *count).unwrap();
    }
    CoverNode::from(point).readout(source, "").unwrap()
}

proptest! {
    #[test]
    fn prop_merge_commutes_and_caps(
        a in proptest::collection::vec(0u64..5, 6),
        b in proptest::collection::vec(0u64..5, 6),
    ) {
        let left = run_with_hits("a", &a);
        let right = run_with_hits("b", &b);
        let ab = merge_readouts(&[&left, &right], &MergeConfig::default()).unwrap();
        let ba = merge_readouts(&[&right, &left], &MergeConfig::default()).unwrap();
        prop_assert_eq!(ab.as_memory().record(), ba.as_memory().record());

        let sums: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let merged: Vec<u64> = ab
            .iter_bucket_hits(RowRange::ALL)
            .map(|hit| hit.unwrap().hits)
            .collect();
        prop_assert_eq!(&merged, &sums);

        let root = ab
            .iter_point_hits(RowRange::single(0))
            .next()
            .unwrap()
            .unwrap();
        prop_assert_eq!(root.hits, sums.iter().map(|hits| (*hits).min(2)).sum::<u64>());
        prop_assert_eq!(root.hit_buckets, sums.iter().filter(|hits| **hits > 0).count() as u64);
        prop_assert_eq!(root.full_buckets, sums.iter().filter(|hits| **hits >= 2).count() as u64);
        prop_assert!(root.hits <= 12);
    }
}
