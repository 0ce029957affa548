//! Archive Codec
//!
//! Packs the nine tables (plus an optional manifest) into a tar container
//! and compresses the whole stream. Headers are GNU with mode 0644 and mtime
//! 0, so identical tables always produce identical archives.

use std::collections::HashMap;
use std::io::{Read, Write};

use tar::{Archive, Builder, Header};
use tracing::{debug, warn};

use super::config::{ArchiveConfig, Compression};
use super::types::{
    paths, xxh3_hex, ArchiveContents, ArchiveManifest, ARCHIVE_FORMAT_VERSION, GZIP_MAGIC,
    ZSTD_MAGIC,
};
use crate::table::Table;
use bucket_core::{Error, Result};

/// The nine tables of an archive
#[derive(Debug, Clone)]
pub struct TableSet {
    pub definition: Table,
    pub record: Table,
    pub point: Table,
    pub axis: Table,
    pub axis_value: Table,
    pub goal: Table,
    pub bucket_goal: Table,
    pub point_hit: Table,
    pub bucket_hit: Table,
}

impl Default for TableSet {
    fn default() -> Self {
        Self {
            definition: Table::empty(paths::DEFINITION),
            record: Table::empty(paths::RECORD),
            point: Table::empty(paths::POINT),
            axis: Table::empty(paths::AXIS),
            axis_value: Table::empty(paths::AXIS_VALUE),
            goal: Table::empty(paths::GOAL),
            bucket_goal: Table::empty(paths::BUCKET_GOAL),
            point_hit: Table::empty(paths::POINT_HIT),
            bucket_hit: Table::empty(paths::BUCKET_HIT),
        }
    }
}

impl TableSet {
    /// Table by entry name
    pub fn get(&self, name: &str) -> Option<&Table> {
        match name {
            paths::DEFINITION => Some(&self.definition),
            paths::RECORD => Some(&self.record),
            paths::POINT => Some(&self.point),
            paths::AXIS => Some(&self.axis),
            paths::AXIS_VALUE => Some(&self.axis_value),
            paths::GOAL => Some(&self.goal),
            paths::BUCKET_GOAL => Some(&self.bucket_goal),
            paths::POINT_HIT => Some(&self.point_hit),
            paths::BUCKET_HIT => Some(&self.bucket_hit),
            _ => None,
        }
    }

    /// Every table in write order
    pub fn tables(&self) -> [&Table; 9] {
        [
            &self.definition,
            &self.record,
            &self.point,
            &self.axis,
            &self.axis_value,
            &self.goal,
            &self.bucket_goal,
            &self.point_hit,
            &self.bucket_hit,
        ]
    }

    /// Build a set from raw entry bytes, indexing every table
    fn from_entries(mut entries: HashMap<String, Vec<u8>>) -> Result<Self> {
        let mut take = |name: &'static str| {
            Table::from_bytes(name, entries.remove(name).unwrap_or_default())
        };
        Ok(Self {
            definition: take(paths::DEFINITION)?,
            record: take(paths::RECORD)?,
            point: take(paths::POINT)?,
            axis: take(paths::AXIS)?,
            axis_value: take(paths::AXIS_VALUE)?,
            goal: take(paths::GOAL)?,
            bucket_goal: take(paths::BUCKET_GOAL)?,
            point_hit: take(paths::POINT_HIT)?,
            bucket_hit: take(paths::BUCKET_HIT)?,
        })
    }
}

/// Encodes and decodes whole archives
pub struct ArchiveCodec;

impl ArchiveCodec {
    /// Encode a table set into compressed archive bytes
    pub fn encode(tables: &TableSet, config: &ArchiveConfig) -> Result<Vec<u8>> {
        config.validate()?;

        let mut builder = Builder::new(Vec::new());
        for table in tables.tables() {
            Self::add_file(&mut builder, table.name(), table.bytes())?;
        }

        if config.write_manifest {
            let mut manifest = ArchiveManifest::new(
                env!("CARGO_PKG_VERSION"),
                ArchiveContents {
                    definitions: tables.definition.len() as u64,
                    records: tables.record.len() as u64,
                },
            );
            for table in tables.tables() {
                manifest.add_checksum(table.name(), xxh3_hex(table.bytes()));
            }
            let manifest_json = serde_json::to_vec_pretty(&manifest)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            Self::add_file(&mut builder, paths::MANIFEST, &manifest_json)?;
        }

        let tar_bytes = builder
            .into_inner()
            .map_err(|e| Error::archive(format!("tar finish: {}", e)))?;
        let compressed = Self::compress(&tar_bytes, config.compression)?;

        debug!(
            tar_bytes = tar_bytes.len(),
            compressed_bytes = compressed.len(),
            records = tables.record.len(),
            "Packed archive"
        );
        Ok(compressed)
    }

    /// Decode compressed archive bytes into a table set
    ///
    /// `origin` names the archive in errors. Fails with `MissingTable` listing
    /// every absent table; unknown entries are ignored.
    pub fn decode(bytes: &[u8], origin: &str, verify_checksums: bool) -> Result<TableSet> {
        let tar_bytes = Self::decompress(bytes)?;
        let entries = Self::extract_all_files(&tar_bytes)?;

        let missing: Vec<String> = paths::TABLES
            .iter()
            .filter(|name| !entries.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingTable {
                origin: origin.to_string(),
                tables: missing,
            });
        }

        match entries.get(paths::MANIFEST) {
            Some(manifest_data) => {
                let manifest: ArchiveManifest = serde_json::from_slice(manifest_data)
                    .map_err(|e| Error::Serialization(format!("{}: {}", origin, e)))?;
                if manifest.format_version != ARCHIVE_FORMAT_VERSION {
                    return Err(Error::archive(format!(
                        "{}: unsupported format version {}",
                        origin, manifest.format_version
                    )));
                }
                if verify_checksums {
                    Self::verify(&manifest, &entries)?;
                }
            }
            None if verify_checksums => {
                warn!(origin = %origin, "Archive has no manifest, checksums not verified");
            }
            None => {}
        }

        TableSet::from_entries(entries).map_err(|e| e.located(origin))
    }

    fn verify(manifest: &ArchiveManifest, entries: &HashMap<String, Vec<u8>>) -> Result<()> {
        for name in paths::TABLES {
            let (Some(expected), Some(data)) = (manifest.checksums.get(name), entries.get(name))
            else {
                continue;
            };
            let actual = xxh3_hex(data);
            if expected != &actual {
                return Err(Error::ChecksumMismatch {
                    entry: name.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Add a file to the tar archive
    fn add_file<W: Write>(builder: &mut Builder<W>, path: &str, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header
            .set_path(path)
            .map_err(|e| Error::archive(format!("set path '{}': {}", path, e)))?;
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0); // Reproducible output: zero mtime
        header.set_cksum();

        builder
            .append(&header, data)
            .map_err(|e| Error::archive(format!("append '{}': {}", path, e)))?;
        Ok(())
    }

    /// Extract all files from the tar stream into a HashMap
    fn extract_all_files(tar_bytes: &[u8]) -> Result<HashMap<String, Vec<u8>>> {
        let mut archive = Archive::new(tar_bytes);
        let mut files = HashMap::new();

        for entry in archive
            .entries()
            .map_err(|e| Error::archive(e.to_string()))?
        {
            let mut entry = entry.map_err(|e| Error::archive(e.to_string()))?;
            let name = entry
                .path()
                .map_err(|e| Error::archive(e.to_string()))?
                .to_string_lossy()
                .to_string();

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::archive(format!("read {}: {}", name, e)))?;
            files.insert(name, data);
        }

        Ok(files)
    }

    fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
        match compression {
            Compression::Gzip { level } => {
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(level),
                );
                encoder
                    .write_all(data)
                    .map_err(|e| Error::compression(format!("gzip encode: {}", e)))?;
                encoder
                    .finish()
                    .map_err(|e| Error::compression(format!("gzip finish: {}", e)))
            }
            Compression::Zstd { level } => zstd::encode_all(data, level)
                .map_err(|e| Error::compression(format!("zstd encode: {}", e))),
        }
    }

    fn decompress(data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if data.starts_with(&GZIP_MAGIC) {
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::compression(format!("gzip decode: {}", e)))?;
        } else if data.starts_with(&ZSTD_MAGIC) {
            zstd::Decoder::new(data)
                .and_then(|mut decoder| decoder.read_to_end(&mut out))
                .map_err(|e| Error::compression(format!("zstd decode: {}", e)))?;
        } else {
            return Err(Error::compression(
                "unrecognised stream (expected gzip or zstd)",
            ));
        }
        Ok(out)
    }
}
