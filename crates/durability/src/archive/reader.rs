//! Archive reader
//!
//! Decompresses an archive once and serves readouts from the indexed tables.
//! Readouts only hold a `Weak` handle on the decoded store: closing the
//! reader frees the bytes and any readout (or iterator) still around reports
//! `ReaderClosed` from then on.

use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use super::codec::{ArchiveCodec, TableSet};
use super::config::{ArchiveConfig, ReadMode};
use crate::table::{typed_row, ByteSpan, DefinitionEntry, Field, RecordEntry, TableRow};
use bucket_core::readout::failed_rows;
use bucket_core::types::{Axis, AxisValue, BucketGoal, BucketHit, Goal, Point, PointHit};
use bucket_core::{Error, Reader, Readout, Result, RowRange, Rows};

/// Decoded archive contents shared by a reader and its readouts
#[derive(Debug)]
pub struct ArchiveStore {
    origin: String,
    tables: TableSet,
    /// Every row decoded up front (materialized mode only)
    rows: Option<HashMap<&'static str, Vec<Vec<Field>>>>,
}

impl ArchiveStore {
    fn new(origin: String, tables: TableSet, mode: ReadMode) -> Result<Self> {
        let rows = match mode {
            ReadMode::Windowed => None,
            ReadMode::Materialized => {
                let mut rows = HashMap::new();
                for table in tables.tables() {
                    let decoded = (0..table.len())
                        .map(|row| table.decode_row(row))
                        .collect::<Result<Vec<_>>>()
                        .map_err(|e| e.located(&origin))?;
                    rows.insert(table.name(), decoded);
                }
                Some(rows)
            }
        };
        Ok(Self {
            origin,
            tables,
            rows,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    fn table(&self, name: &'static str) -> Result<&crate::table::Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::archive(format!("{}: no table named '{}'", self.origin, name)))
    }

    /// Typed row at table position `row`, reported with readout index `index`
    fn decode<T: TableRow>(&self, row: usize, index: usize) -> Result<T> {
        self.decode_unlocated(row, index).map_err(|e| e.located(&self.origin))
    }

    fn decode_unlocated<T: TableRow>(&self, row: usize, index: usize) -> Result<T> {
        let table = self.table(T::TABLE)?;
        let offset = table.offsets().get(row).copied().unwrap_or(0);
        let fields = match self.rows.as_ref().and_then(|rows| rows.get(T::TABLE)) {
            Some(rows) => rows.get(row).cloned().ok_or_else(|| {
                Error::malformed(T::TABLE, offset, format!("row {} out of range", row))
            })?,
            None => table.decode_row(row)?,
        };
        typed_row(index, offset, fields)
    }

    /// Record row `record` and the definition row it points at
    fn entries(&self, record: usize) -> Result<(RecordEntry, DefinitionEntry)> {
        let count = self.tables.record.len();
        if record >= count {
            return Err(Error::RecordOutOfRange {
                origin: self.origin.clone(),
                record,
                count,
            });
        }
        let record_entry: RecordEntry = self.decode(record, record)?;
        let definition_row = self
            .tables
            .definition
            .row_at_offset(record_entry.definition)
            .ok_or_else(|| {
                Error::malformed(
                    RecordEntry::TABLE,
                    self.tables.record.offsets()[record],
                    format!(
                        "definition offset {} does not start a row",
                        record_entry.definition
                    ),
                )
                .located(&self.origin)
            })?;
        let definition_entry: DefinitionEntry = self.decode(definition_row, definition_row)?;
        Ok((record_entry, definition_entry))
    }
}

// =============================================================================
// ArchiveReader
// =============================================================================

/// Reader for coverage archives
pub struct ArchiveReader {
    origin: String,
    store: Option<Arc<ArchiveStore>>,
}

impl ArchiveReader {
    /// Open and index an archive file
    pub fn open(path: &Path, config: &ArchiveConfig) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::file(path, e))?;
        Self::from_bytes(&bytes, &path.display().to_string(), config)
    }

    /// Index archive bytes held in memory
    pub fn from_bytes(bytes: &[u8], origin: &str, config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;
        let tables = ArchiveCodec::decode(bytes, origin, config.verify_checksums)?;
        for table in tables.tables() {
            debug!(
                origin = %origin,
                table = table.name(),
                rows = table.len(),
                bytes = table.bytes().len(),
                "Indexed table"
            );
        }
        let store = ArchiveStore::new(origin.to_string(), tables, config.read_mode)?;
        info!(
            origin = %origin,
            records = store.tables.record.len(),
            definitions = store.tables.definition.len(),
            mode = ?config.read_mode,
            "Opened archive"
        );
        Ok(Self {
            origin: origin.to_string(),
            store: Some(Arc::new(store)),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    fn store(&self) -> Result<&Arc<ArchiveStore>> {
        self.store.as_ref().ok_or_else(|| Error::ReaderClosed {
            origin: self.origin.clone(),
        })
    }

    /// Readout of one record
    pub fn read_archive(&self, record: usize) -> Result<ArchiveReadout> {
        let store = self.store()?;
        let (record_entry, definition_entry) = store.entries(record)?;
        Ok(ArchiveReadout {
            origin: self.origin.clone(),
            store: Arc::downgrade(store),
            record: record_entry,
            definition: definition_entry,
        })
    }
}

impl Reader for ArchiveReader {
    fn record_count(&self) -> Result<usize> {
        Ok(self.store()?.tables.record.len())
    }

    fn read(&self, record: usize) -> Result<Box<dyn Readout>> {
        Ok(Box::new(self.read_archive(record)?))
    }

    fn close(&mut self) {
        if self.store.take().is_some() {
            debug!(origin = %self.origin, "Closed archive");
        }
    }
}

// =============================================================================
// ArchiveReadout
// =============================================================================

/// Readout of one archive record
#[derive(Debug, Clone)]
pub struct ArchiveReadout {
    origin: String,
    store: Weak<ArchiveStore>,
    record: RecordEntry,
    definition: DefinitionEntry,
}

impl ArchiveReadout {
    pub fn record_entry(&self) -> &RecordEntry {
        &self.record
    }

    pub fn definition_entry(&self) -> &DefinitionEntry {
        &self.definition
    }

    fn rows<T: TableRow + 'static>(&self, span: ByteSpan, range: RowRange) -> Rows<'_, T> {
        let Some(store) = self.store.upgrade() else {
            return failed_rows(Error::ReaderClosed {
                origin: self.origin.clone(),
            });
        };
        let table = match store.table(T::TABLE) {
            Ok(table) => table,
            Err(e) => return failed_rows(e),
        };
        let base = table.locate(span).start;
        let window = table.window(span, range);
        Box::new(WindowRows::<T> {
            origin: self.origin.clone(),
            store: self.store.clone(),
            rows: window,
            base,
            _row: PhantomData,
        })
    }
}

impl Readout for ArchiveReadout {
    fn def_sha(&self) -> &str {
        &self.definition.def_sha
    }
    fn rec_sha(&self) -> &str {
        &self.record.rec_sha
    }
    fn source(&self) -> &str {
        &self.record.source
    }
    fn source_key(&self) -> &str {
        &self.record.source_key
    }
    fn iter_points(&self, range: RowRange) -> Rows<'_, Point> {
        self.rows(self.definition.point, range)
    }
    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis> {
        self.rows(self.definition.axis, range)
    }
    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue> {
        self.rows(self.definition.axis_value, range)
    }
    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal> {
        self.rows(self.definition.goal, range)
    }
    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal> {
        self.rows(self.definition.bucket_goal, range)
    }
    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit> {
        self.rows(self.record.point_hit, range)
    }
    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit> {
        self.rows(self.record.bucket_hit, range)
    }
}

/// Lazy iterator decoding one row per `next()`
struct WindowRows<T> {
    origin: String,
    store: Weak<ArchiveStore>,
    rows: Range<usize>,
    base: usize,
    _row: PhantomData<T>,
}

impl<T: TableRow> Iterator for WindowRows<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let Some(store) = self.store.upgrade() else {
            self.rows = 0..0;
            return Some(Err(Error::ReaderClosed {
                origin: self.origin.clone(),
            }));
        };
        let result = store.decode(row, row - self.base);
        if result.is_err() {
            self.rows = 0..0;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
