//! End-to-end Tests
//!
//! Build a tree, record hits, store it and read it back through the accessor.

use bucket::{
    ArchiveConfig, ArchiveReader, ArchiveWriter, CoverNode, CoverageAccess, Reader, Readout,
    RowRange,
};
use tempfile::tempdir;

use crate::common::{colors, init_tracing, tree_readout};

fn bucket_hits(readout: &dyn Readout) -> Vec<u64> {
    readout
        .iter_bucket_hits(RowRange::ALL)
        .map(|hit| hit.unwrap().hits)
        .collect()
}

#[test]
fn single_hit_lands_in_one_bucket() {
    init_tracing();
    let mut point = colors();
    point.hit(&["small", "blue"]).unwrap();
    let readout = CoverNode::from(point).readout("smoke", "seed=7").unwrap();

    assert_eq!(bucket_hits(&readout), vec![0, 0, 1, 0, 0, 0]);
    let hit = readout
        .iter_point_hits(RowRange::single(0))
        .next()
        .unwrap()
        .unwrap();
    assert_eq!((hit.hits, hit.hit_buckets, hit.full_buckets), (1, 1, 1));

    let access = CoverageAccess::new(&readout);
    let root = access.root().unwrap().unwrap();
    assert_eq!(root.target(), 6);
    assert_eq!(root.buckets_targeted(), 6);
    let hit_bucket = root
        .buckets()
        .unwrap()
        .into_iter()
        .find(|bucket| bucket.hits() > 0)
        .unwrap();
    assert_eq!(hit_bucket.index(), 2);
    assert_eq!(hit_bucket.axis_value("size"), Some("small"));
    assert_eq!(hit_bucket.axis_value("color"), Some("blue"));
}

#[test]
fn tree_survives_an_archive() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.bktgz");
    let readout = tree_readout("regression", 1);
    ArchiveWriter::with_defaults(&path)
        .write_readouts(&[&readout])
        .unwrap();

    let reader = ArchiveReader::open(&path, &ArchiveConfig::default()).unwrap();
    assert_eq!(reader.record_count().unwrap(), 1);
    let stored = reader.read(0).unwrap();
    let access = CoverageAccess::new(stored.as_ref());

    let top = access.root().unwrap().unwrap();
    assert!(top.is_group());
    assert_eq!(top.name(), "top");
    assert_eq!(top.hits(), 4);
    assert_eq!(top.buckets_hit(), 3);
    assert_eq!(top.buckets_full(), 3);
    assert_eq!(top.target(), 21);
    assert_eq!(top.buckets_targeted(), 10);

    let names: Vec<String> = top
        .children()
        .unwrap()
        .iter()
        .map(|child| child.name().to_string())
        .collect();
    assert_eq!(names, vec!["colors", "flags"]);

    let children = top.children().unwrap();
    let flags = &children[1];
    let grandchildren = flags.children().unwrap();
    let width = &grandchildren[1];
    assert_eq!(width.name(), "width");
    assert_eq!(width.description(), "Operand width, with \"wide\" values, quoted");
    let buckets = width.buckets().unwrap();
    assert_eq!(buckets.len(), 3);
    assert!(buckets[1].goal().unwrap().is_illegal());
    assert!(!buckets[1].is_illegal_hit());
    assert_eq!(buckets[2].axis_value("bits"), Some("32,64"));
    assert_eq!(buckets[2].hit_ratio(), 1.0);
}

#[test]
fn lazy_point_access_reads_single_rows() {
    let readout = tree_readout("lazy", 1);
    let access = CoverageAccess::new(&readout);
    let parity = access.point(3).unwrap().unwrap();
    assert_eq!(parity.name(), "parity");
    assert_eq!(parity.hits(), 2);
    assert_eq!(parity.buckets_full(), 1);
    assert!(access.point(5).unwrap().is_none());
}
