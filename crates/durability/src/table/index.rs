//! Offset-indexed tables

use std::ops::Range;

use super::codec::{build_offsets, decode_row, encode_row};
use super::{typed_row, Field, TableRow};
use bucket_core::{Error, Result, RowRange};

/// Half-open byte range of a run of rows inside a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// =============================================================================
// Table
// =============================================================================

/// Encoded table bytes plus the start offset of every row
#[derive(Debug, Clone)]
pub struct Table {
    name: &'static str,
    bytes: Vec<u8>,
    offsets: Vec<u64>,
}

impl Table {
    /// Index a table's bytes
    pub fn from_bytes(name: &'static str, bytes: Vec<u8>) -> Result<Self> {
        let offsets = build_offsets(name, &bytes)?;
        Ok(Self {
            name,
            bytes,
            offsets,
        })
    }

    /// An empty table
    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            bytes: Vec::new(),
            offsets: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Decode the row at position `row`
    pub fn decode_row(&self, row: usize) -> Result<Vec<Field>> {
        let offset = *self.offsets.get(row).ok_or_else(|| {
            Error::malformed(
                self.name,
                self.bytes.len() as u64,
                format!("row {} out of range ({} rows)", row, self.offsets.len()),
            )
        })?;
        let (fields, _) = decode_row(self.name, &self.bytes, offset as usize)?;
        Ok(fields)
    }

    /// Decode the row at position `row` as a typed row with the given index
    pub fn decode_typed<T: TableRow>(&self, row: usize, index: usize) -> Result<T> {
        let fields = self.decode_row(row)?;
        typed_row(index, self.offsets[row], fields)
    }

    /// Row starting exactly at byte `offset`
    pub fn row_at_offset(&self, offset: u64) -> Option<usize> {
        self.offsets.binary_search(&offset).ok()
    }

    /// Rows whose start offset lies within `span`
    pub fn locate(&self, span: ByteSpan) -> Range<usize> {
        let start = self.offsets.partition_point(|&offset| offset < span.start);
        let end = self.offsets.partition_point(|&offset| offset < span.end);
        start..end.max(start)
    }

    /// Resolve a readout-relative row range inside `span` to table rows
    pub fn window(&self, span: ByteSpan, range: RowRange) -> Range<usize> {
        let rows = self.locate(span);
        let relative = range.resolve(rows.len());
        rows.start + relative.start..rows.start + relative.end
    }

    /// Decode the rows of `range` inside `span`
    pub fn slice(&self, span: ByteSpan, range: RowRange) -> Result<Vec<Vec<Field>>> {
        self.window(span, range)
            .map(|row| self.decode_row(row))
            .collect()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// =============================================================================
// TableBuffer
// =============================================================================

/// Append-only table encoder
#[derive(Debug, Clone)]
pub struct TableBuffer {
    name: &'static str,
    bytes: Vec<u8>,
    rows: usize,
}

impl TableBuffer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bytes: Vec::new(),
            rows: 0,
        }
    }

    /// Continue appending after an existing table
    pub fn from_table(table: Table) -> Self {
        let rows = table.len();
        let name = table.name();
        let mut bytes = table.into_bytes();
        // A final row without terminator would merge with the next append
        if bytes.last().is_some_and(|&byte| byte != b'\n') {
            bytes.push(b'\n');
        }
        Self { name, bytes, rows }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current end offset (where the next row will start)
    pub fn position(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Append one typed row, returning its start offset
    pub fn push<T: TableRow>(&mut self, row: &T) -> u64 {
        let offset = self.position();
        encode_row(&mut self.bytes, &row.to_fields());
        self.rows += 1;
        offset
    }

    /// Append a stream of typed rows, returning the span they occupy
    pub fn append<T, I>(&mut self, rows: I) -> Result<ByteSpan>
    where
        T: TableRow,
        I: IntoIterator<Item = Result<T>>,
    {
        let start = self.position();
        for row in rows {
            self.push(&row?);
        }
        Ok(ByteSpan::new(start, self.position()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
