//! Archive writer
//!
//! Streams readouts into per-table buffers, deduplicating definitions by
//! `def_sha`, and writes the packed archive atomically (temp file + rename).
//! When the target exists and `append` is enabled the existing tables are
//! loaded first and new records are added after them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::codec::{ArchiveCodec, TableSet};
use super::config::ArchiveConfig;
use super::types::{paths, xxh3_hex, ArchiveWriteInfo};
use crate::table::{DefinitionEntry, RecordEntry, Table, TableBuffer};
use bucket_core::{Error, Readout, Result, RowRange, Writer};

/// Per-table buffers of an archive under construction
struct ArchiveBuffers {
    definition: TableBuffer,
    record: TableBuffer,
    point: TableBuffer,
    axis: TableBuffer,
    axis_value: TableBuffer,
    goal: TableBuffer,
    bucket_goal: TableBuffer,
    point_hit: TableBuffer,
    bucket_hit: TableBuffer,
    /// def_sha -> byte offset of its definition row
    definitions: HashMap<String, u64>,
}

impl ArchiveBuffers {
    fn new() -> Self {
        Self {
            definition: TableBuffer::new(paths::DEFINITION),
            record: TableBuffer::new(paths::RECORD),
            point: TableBuffer::new(paths::POINT),
            axis: TableBuffer::new(paths::AXIS),
            axis_value: TableBuffer::new(paths::AXIS_VALUE),
            goal: TableBuffer::new(paths::GOAL),
            bucket_goal: TableBuffer::new(paths::BUCKET_GOAL),
            point_hit: TableBuffer::new(paths::POINT_HIT),
            bucket_hit: TableBuffer::new(paths::BUCKET_HIT),
            definitions: HashMap::new(),
        }
    }

    /// Continue after the tables of an existing archive
    fn from_tables(tables: TableSet) -> Result<Self> {
        let mut definitions = HashMap::new();
        for row in 0..tables.definition.len() {
            let entry: DefinitionEntry = tables.definition.decode_typed(row, row)?;
            definitions
                .entry(entry.def_sha)
                .or_insert(tables.definition.offsets()[row]);
        }
        Ok(Self {
            definition: TableBuffer::from_table(tables.definition),
            record: TableBuffer::from_table(tables.record),
            point: TableBuffer::from_table(tables.point),
            axis: TableBuffer::from_table(tables.axis),
            axis_value: TableBuffer::from_table(tables.axis_value),
            goal: TableBuffer::from_table(tables.goal),
            bucket_goal: TableBuffer::from_table(tables.bucket_goal),
            point_hit: TableBuffer::from_table(tables.point_hit),
            bucket_hit: TableBuffer::from_table(tables.bucket_hit),
            definitions,
        })
    }

    /// Add one readout, returning its record id and whether its definition was new
    fn add(&mut self, readout: &dyn Readout) -> Result<(usize, bool)> {
        let def_sha = readout.def_sha();
        let (definition, is_new) = match self.definitions.get(def_sha) {
            Some(&offset) => (offset, false),
            None => {
                let entry = DefinitionEntry {
                    def_sha: def_sha.to_string(),
                    point: self.point.append(readout.iter_points(RowRange::ALL))?,
                    axis: self.axis.append(readout.iter_axes(RowRange::ALL))?,
                    axis_value: self
                        .axis_value
                        .append(readout.iter_axis_values(RowRange::ALL))?,
                    goal: self.goal.append(readout.iter_goals(RowRange::ALL))?,
                    bucket_goal: self
                        .bucket_goal
                        .append(readout.iter_bucket_goals(RowRange::ALL))?,
                };
                let offset = self.definition.push(&entry);
                self.definitions.insert(entry.def_sha, offset);
                (offset, true)
            }
        };

        let entry = RecordEntry {
            rec_sha: readout.rec_sha().to_string(),
            definition,
            point_hit: self.point_hit.append(readout.iter_point_hits(RowRange::ALL))?,
            bucket_hit: self
                .bucket_hit
                .append(readout.iter_bucket_hits(RowRange::ALL))?,
            source: readout.source().to_string(),
            source_key: readout.source_key().to_string(),
        };
        let record = self.record.row_count();
        self.record.push(&entry);
        debug!(
            record,
            rec_sha = %entry.rec_sha,
            def_sha = %def_sha,
            new_definition = is_new,
            "Packed record"
        );
        Ok((record, is_new))
    }

    fn finish(self) -> Result<TableSet> {
        let table = |buffer: TableBuffer| Table::from_bytes(buffer.name(), buffer.into_bytes());
        Ok(TableSet {
            definition: table(self.definition)?,
            record: table(self.record)?,
            point: table(self.point)?,
            axis: table(self.axis)?,
            axis_value: table(self.axis_value)?,
            goal: table(self.goal)?,
            bucket_goal: table(self.bucket_goal)?,
            point_hit: table(self.point_hit)?,
            bucket_hit: table(self.bucket_hit)?,
        })
    }
}

/// Writer for coverage archives
///
/// Creates .bktgz files with atomic write semantics.
pub struct ArchiveWriter {
    path: PathBuf,
    config: ArchiveConfig,
}

impl ArchiveWriter {
    /// Create a new writer for the given path
    pub fn new(path: impl Into<PathBuf>, config: ArchiveConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Create a new writer with default configuration
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ArchiveConfig::default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Write readouts to the archive file
    ///
    /// This is an atomic operation - either the complete archive is written
    /// or the previous file (if any) is left untouched.
    pub fn write_readouts(&self, readouts: &[&dyn Readout]) -> Result<ArchiveWriteInfo> {
        self.config.validate()?;

        let buffers = if self.config.append && self.path.exists() {
            let existing = fs::read(&self.path).map_err(|e| Error::file(&self.path, e))?;
            let origin = self.path.display().to_string();
            let tables = ArchiveCodec::decode(&existing, &origin, self.config.verify_checksums)?;
            ArchiveBuffers::from_tables(tables)?
        } else {
            ArchiveBuffers::new()
        };
        let (bytes, info) = Self::pack(buffers, readouts, &self.config)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        match fs::write(&temp_path, &bytes).and_then(|_| fs::rename(&temp_path, &self.path)) {
            Ok(()) => {}
            Err(e) => {
                // Clean up temp file
                let _ = fs::remove_file(&temp_path);
                return Err(Error::file(&self.path, e));
            }
        }

        info!(
            path = %self.path.display(),
            records = info.records.len(),
            new_definitions = info.new_definitions,
            bytes = info.archive_size_bytes,
            "Wrote archive"
        );
        Ok(info)
    }

    /// Write readouts into a fresh archive in memory
    pub fn write_to_vec(&self, readouts: &[&dyn Readout]) -> Result<(Vec<u8>, ArchiveWriteInfo)> {
        self.config.validate()?;
        Self::pack(ArchiveBuffers::new(), readouts, &self.config)
    }

    fn pack(
        mut buffers: ArchiveBuffers,
        readouts: &[&dyn Readout],
        config: &ArchiveConfig,
    ) -> Result<(Vec<u8>, ArchiveWriteInfo)> {
        let mut records = Vec::with_capacity(readouts.len());
        let mut new_definitions = 0;
        for readout in readouts {
            let (record, is_new) = buffers.add(*readout)?;
            records.push(record);
            new_definitions += usize::from(is_new);
        }

        let tables = buffers.finish()?;
        let bytes = ArchiveCodec::encode(&tables, config)?;
        let info = ArchiveWriteInfo {
            records,
            new_definitions,
            archive_size_bytes: bytes.len() as u64,
            checksum: xxh3_hex(&bytes),
        };
        Ok((bytes, info))
    }
}

impl Writer for ArchiveWriter {
    fn write_all(&mut self, readouts: &[&dyn Readout]) -> Result<Vec<usize>> {
        Ok(self.write_readouts(readouts)?.records)
    }
}
