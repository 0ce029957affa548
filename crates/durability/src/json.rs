//! JSON backend
//!
//! A single human readable document holding definitions and records:
//!
//! ```json
//! {
//!   "definitions": [{ "sha": "...", "point": [...], "axis": [...], "axis_value": [...],
//!                     "goal": [...], "bucket_goal": [...] }],
//!   "records": [{ "def": 0, "sha": "...", "source": "", "source_key": "",
//!                 "point_hit": [...], "bucket_hit": [...] }]
//! }
//! ```
//!
//! Records reference definitions by position. Definitions are deduplicated by
//! `sha` when written.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bucket_core::types::{Axis, AxisValue, BucketGoal, BucketHit, Goal, Point, PointHit};
use bucket_core::{
    Definition, Error, MemoryReadout, Reader, Readout, Record, Result, RowRange, Writer,
};

/// One definition entry of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDefinition {
    pub sha: String,
    pub point: Vec<Point>,
    pub axis: Vec<Axis>,
    pub axis_value: Vec<AxisValue>,
    pub goal: Vec<Goal>,
    pub bucket_goal: Vec<BucketGoal>,
}

/// One record entry of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRecord {
    /// Position of the definition in `definitions`
    pub def: usize,
    pub sha: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_key: String,
    pub point_hit: Vec<PointHit>,
    pub bucket_hit: Vec<BucketHit>,
}

/// Whole JSON document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsonDocument {
    #[serde(default)]
    pub definitions: Vec<JsonDefinition>,
    #[serde(default)]
    pub records: Vec<JsonRecord>,
}

impl JsonDocument {
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Serialization(format!("{}: {}", origin, e)))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Append a readout, reusing an existing definition with the same sha
    ///
    /// Returns the record id.
    pub fn push(&mut self, readout: &dyn Readout) -> Result<usize> {
        let def = match self
            .definitions
            .iter()
            .position(|definition| definition.sha == readout.def_sha())
        {
            Some(def) => def,
            None => {
                let definition = Definition::from_readout(readout)?;
                self.definitions.push(JsonDefinition {
                    sha: definition.def_sha,
                    point: definition.points,
                    axis: definition.axes,
                    axis_value: definition.axis_values,
                    goal: definition.goals,
                    bucket_goal: definition.bucket_goals,
                });
                self.definitions.len() - 1
            }
        };

        self.records.push(JsonRecord {
            def,
            sha: readout.rec_sha().to_string(),
            source: readout.source().to_string(),
            source_key: readout.source_key().to_string(),
            point_hit: readout
                .iter_point_hits(RowRange::ALL)
                .collect::<Result<_>>()?,
            bucket_hit: readout
                .iter_bucket_hits(RowRange::ALL)
                .collect::<Result<_>>()?,
        });
        Ok(self.records.len() - 1)
    }
}

// =============================================================================
// JsonReader
// =============================================================================

/// Reader for JSON documents
pub struct JsonReader {
    origin: String,
    definitions: Vec<Arc<Definition>>,
    records: Option<Vec<JsonRecord>>,
}

impl JsonReader {
    /// Open and parse a JSON document
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::file(path, e))?;
        Self::from_slice(&bytes, &path.display().to_string())
    }

    /// Parse a JSON document held in memory
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        let document = JsonDocument::from_slice(bytes, origin)?;
        let definitions = document
            .definitions
            .into_iter()
            .map(|definition| {
                Arc::new(Definition {
                    def_sha: definition.sha,
                    points: definition.point,
                    axes: definition.axis,
                    axis_values: definition.axis_value,
                    goals: definition.goal,
                    bucket_goals: definition.bucket_goal,
                })
            })
            .collect::<Vec<_>>();
        info!(
            origin = %origin,
            definitions = definitions.len(),
            records = document.records.len(),
            "Opened JSON document"
        );
        Ok(Self {
            origin: origin.to_string(),
            definitions,
            records: Some(document.records),
        })
    }

    fn records(&self) -> Result<&[JsonRecord]> {
        self.records.as_deref().ok_or_else(|| Error::ReaderClosed {
            origin: self.origin.clone(),
        })
    }

    /// In-memory readout of one record
    pub fn read_memory(&self, record: usize) -> Result<MemoryReadout> {
        let records = self.records()?;
        let entry = records.get(record).ok_or_else(|| Error::RecordOutOfRange {
            origin: self.origin.clone(),
            record,
            count: records.len(),
        })?;
        let definition = self.definitions.get(entry.def).ok_or_else(|| {
            Error::invalid_definition(format!(
                "{}: record {} references missing definition {}",
                self.origin, record, entry.def
            ))
        })?;
        MemoryReadout::new(
            Arc::clone(definition),
            Record {
                rec_sha: entry.sha.clone(),
                source: entry.source.clone(),
                source_key: entry.source_key.clone(),
                point_hits: entry.point_hit.clone(),
                bucket_hits: entry.bucket_hit.clone(),
            },
        )
    }
}

impl Reader for JsonReader {
    fn record_count(&self) -> Result<usize> {
        Ok(self.records()?.len())
    }

    fn read(&self, record: usize) -> Result<Box<dyn Readout>> {
        Ok(Box::new(self.read_memory(record)?))
    }

    fn close(&mut self) {
        self.records = None;
        self.definitions.clear();
    }
}

// =============================================================================
// JsonWriter
// =============================================================================

/// Writer for JSON documents; appends to an existing document
pub struct JsonWriter {
    path: PathBuf,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Writer for JsonWriter {
    fn write_all(&mut self, readouts: &[&dyn Readout]) -> Result<Vec<usize>> {
        let origin = self.path.display().to_string();
        let mut document = if self.path.exists() {
            let bytes = fs::read(&self.path).map_err(|e| Error::file(&self.path, e))?;
            JsonDocument::from_slice(&bytes, &origin)?
        } else {
            JsonDocument::default()
        };

        let ids = readouts
            .iter()
            .map(|readout| document.push(*readout))
            .collect::<Result<Vec<_>>>()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        let bytes = document.to_vec()?;
        let written =
            fs::write(&temp_path, &bytes).and_then(|_| fs::rename(&temp_path, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::file(&self.path, e));
        }

        debug!(
            path = %origin,
            written = ids.len(),
            records = document.records.len(),
            definitions = document.definitions.len(),
            "Wrote JSON document"
        );
        Ok(ids)
    }
}
