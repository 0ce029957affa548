//! Backend Equivalence Tests
//!
//! Archive and JSON storage must hand back the same tables, and fingerprints
//! must not depend on where a readout came from.

use bucket::{
    definition_sha, read_selection, write_selection, ArchiveConfig, Compression, Definition,
    ReadMode, Readout, Record, Selection,
};
use tempfile::tempdir;

use crate::common::{init_tracing, tree_readout, uri};

fn snapshot(readout: &dyn Readout) -> (Definition, Record) {
    (
        Definition::from_readout(readout).unwrap(),
        Record::from_readout(readout).unwrap(),
    )
}

#[test]
fn every_backend_returns_the_same_tables() {
    init_tracing();
    let dir = tempdir().unwrap();
    let first = tree_readout("run_a", 1);
    let second = tree_readout("run_b", 3);
    let expected = vec![snapshot(&first), snapshot(&second)];

    let configs = [
        ("gzip.bktgz", ArchiveConfig::default()),
        (
            "zstd.bktzst",
            ArchiveConfig::default().with_compression(Compression::Zstd { level: 3 }),
        ),
        (
            "materialized.bktgz",
            ArchiveConfig::default().with_read_mode(ReadMode::Materialized),
        ),
        ("plain.json", ArchiveConfig::default()),
    ];
    for (file, config) in configs {
        let selection = Selection::parse(&uri(dir.path(), file)).unwrap();
        write_selection(&selection, &config, &[&first, &second]).unwrap();

        let readouts = read_selection(&selection, &config).unwrap();
        let actual: Vec<_> = readouts.iter().map(|readout| snapshot(readout)).collect();
        assert_eq!(actual, expected, "backend {}", file);
    }
}

#[test]
fn def_sha_is_stable_across_backends() {
    let dir = tempdir().unwrap();
    let readout = tree_readout("stable", 2);
    let def_sha = readout.def_sha().to_string();
    assert_eq!(definition_sha(&readout).unwrap(), def_sha);

    for file in ["cov.bktgz", "cov.json"] {
        let selection = Selection::parse(&uri(dir.path(), file)).unwrap();
        write_selection(&selection, &ArchiveConfig::default(), &[&readout]).unwrap();
        let back = read_selection(&selection, &ArchiveConfig::default()).unwrap();
        assert_eq!(back[0].def_sha(), def_sha);
        assert_eq!(definition_sha(&back[0]).unwrap(), def_sha);
        assert_eq!(back[0].rec_sha(), readout.rec_sha());
    }
}

#[test]
fn appending_shares_definitions() {
    let dir = tempdir().unwrap();
    let selection = Selection::parse(&uri(dir.path(), "append.bktgz")).unwrap();
    let config = ArchiveConfig::default();
    let ids_a = write_selection(&selection, &config, &[&tree_readout("a", 1)]).unwrap();
    let ids_b = write_selection(&selection, &config, &[&tree_readout("b", 1)]).unwrap();
    assert_eq!(ids_a, vec![0]);
    assert_eq!(ids_b, vec![1]);

    let readouts = read_selection(&selection, &config).unwrap();
    assert_eq!(readouts.len(), 2);
    assert_eq!(readouts[0].source(), "a");
    assert_eq!(readouts[1].source(), "b");
    assert_eq!(readouts[0].definition(), readouts[1].definition());
}
