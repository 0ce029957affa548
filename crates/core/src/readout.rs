//! Readout protocol
//!
//! A [`Readout`] is the read-only, backend independent view of one Definition
//! and one Record. Every `iter_*` call builds a fresh lazy iterator over a
//! row range, so callers can request the same or overlapping ranges as often
//! as they like. Rows are always yielded in stored order.
//!
//! [`Reader`]s open a backend and hand out readouts; [`Writer`]s consume
//! readouts and populate a backend.

use std::ops::{Range, RangeFrom, RangeFull};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{
    Axis, AxisValue, BucketGoal, BucketHit, Definition, Goal, Point, PointHit, Record,
};

/// Lazy sequence of rows produced by a readout
pub type Rows<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Sequence that yields a single error, for backends that fail before the first row
pub fn failed_rows<'a, T: 'a>(err: Error) -> Rows<'a, T> {
    Box::new(std::iter::once(Err(err)))
}

// =============================================================================
// RowRange
// =============================================================================

/// Half-open row range relative to a readout's own table
///
/// `end == None` means "to the end of the table". Out of range bounds are
/// clamped, so a range never fails on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl RowRange {
    /// The readout's whole table
    pub const ALL: RowRange = RowRange {
        start: 0,
        end: None,
    };

    /// Rows `start..end`
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Rows from `start` to the end of the table
    pub fn from(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Exactly one row
    pub fn single(index: usize) -> Self {
        Self::new(index, index + 1)
    }

    /// Concrete bounds for a table of `len` rows
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let end = self.end.map_or(len, |end| end.min(len));
        let start = self.start.min(end);
        start..end
    }
}

impl Default for RowRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<Range<usize>> for RowRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<RangeFrom<usize>> for RowRange {
    fn from(range: RangeFrom<usize>) -> Self {
        Self::from(range.start)
    }
}

impl From<RangeFull> for RowRange {
    fn from(_: RangeFull) -> Self {
        Self::ALL
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Streaming read-only view of a Definition + Record pair
pub trait Readout {
    /// Fingerprint of the definition
    fn def_sha(&self) -> &str;

    /// Fingerprint of the record
    fn rec_sha(&self) -> &str;

    /// Where the record came from (empty when unknown)
    fn source(&self) -> &str;

    /// Key identifying the record within its source (empty when unknown)
    fn source_key(&self) -> &str;

    /// Points in pre-order; `RowRange::ALL` yields the whole tree
    fn iter_points(&self, range: RowRange) -> Rows<'_, Point>;

    /// Axes of every coverpoint; a point's own axes are `axis_start..axis_end`
    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis>;

    /// Axis labels, grouped by axis in declaration order
    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue>;

    /// Goals of every coverpoint; a point's own goals are `goal_start..goal_end`
    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal>;

    /// The goal of each bucket, as an absolute index into `iter_goals`
    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal>;

    /// Point hits, aligned row for row with `iter_points`
    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit>;

    /// Bucket hits, aligned row for row with `iter_bucket_goals`
    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit>;
}

impl<R: Readout + ?Sized> Readout for &R {
    fn def_sha(&self) -> &str {
        (**self).def_sha()
    }
    fn rec_sha(&self) -> &str {
        (**self).rec_sha()
    }
    fn source(&self) -> &str {
        (**self).source()
    }
    fn source_key(&self) -> &str {
        (**self).source_key()
    }
    fn iter_points(&self, range: RowRange) -> Rows<'_, Point> {
        (**self).iter_points(range)
    }
    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis> {
        (**self).iter_axes(range)
    }
    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue> {
        (**self).iter_axis_values(range)
    }
    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal> {
        (**self).iter_goals(range)
    }
    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal> {
        (**self).iter_bucket_goals(range)
    }
    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit> {
        (**self).iter_point_hits(range)
    }
    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit> {
        (**self).iter_bucket_hits(range)
    }
}

impl<R: Readout + ?Sized> Readout for Box<R> {
    fn def_sha(&self) -> &str {
        (**self).def_sha()
    }
    fn rec_sha(&self) -> &str {
        (**self).rec_sha()
    }
    fn source(&self) -> &str {
        (**self).source()
    }
    fn source_key(&self) -> &str {
        (**self).source_key()
    }
    fn iter_points(&self, range: RowRange) -> Rows<'_, Point> {
        (**self).iter_points(range)
    }
    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis> {
        (**self).iter_axes(range)
    }
    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue> {
        (**self).iter_axis_values(range)
    }
    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal> {
        (**self).iter_goals(range)
    }
    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal> {
        (**self).iter_bucket_goals(range)
    }
    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit> {
        (**self).iter_point_hits(range)
    }
    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit> {
        (**self).iter_bucket_hits(range)
    }
}

/// Opens a backend and produces readouts
pub trait Reader {
    /// Number of records available
    fn record_count(&self) -> Result<usize>;

    /// Readout of one record, by position in storage order
    fn read(&self, record: usize) -> Result<Box<dyn Readout>>;

    /// One readout per record, in storage order
    fn read_all(&self) -> Box<dyn Iterator<Item = Result<Box<dyn Readout>>> + '_> {
        match self.record_count() {
            Ok(count) => Box::new((0..count).map(move |record| self.read(record))),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    /// Release backend resources; readouts already handed out stop working
    fn close(&mut self) {}
}

/// Consumes readouts and populates a backend
pub trait Writer {
    /// Write every readout, returning the record id assigned to each
    fn write_all(&mut self, readouts: &[&dyn Readout]) -> Result<Vec<usize>>;

    /// Write a single readout
    fn write(&mut self, readout: &dyn Readout) -> Result<usize> {
        self.write_all(&[readout])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::archive("writer returned no record id"))
    }
}

// =============================================================================
// Materialisation helpers
// =============================================================================

impl Definition {
    /// Collect every definition table of a readout
    pub fn from_readout(readout: &dyn Readout) -> Result<Self> {
        Ok(Self {
            def_sha: readout.def_sha().to_string(),
            points: readout.iter_points(RowRange::ALL).collect::<Result<_>>()?,
            axes: readout.iter_axes(RowRange::ALL).collect::<Result<_>>()?,
            axis_values: readout
                .iter_axis_values(RowRange::ALL)
                .collect::<Result<_>>()?,
            goals: readout.iter_goals(RowRange::ALL).collect::<Result<_>>()?,
            bucket_goals: readout
                .iter_bucket_goals(RowRange::ALL)
                .collect::<Result<_>>()?,
        })
    }
}

impl Record {
    /// Collect every record table of a readout
    pub fn from_readout(readout: &dyn Readout) -> Result<Self> {
        Ok(Self {
            rec_sha: readout.rec_sha().to_string(),
            source: readout.source().to_string(),
            source_key: readout.source_key().to_string(),
            point_hits: readout
                .iter_point_hits(RowRange::ALL)
                .collect::<Result<_>>()?,
            bucket_hits: readout
                .iter_bucket_hits(RowRange::ALL)
                .collect::<Result<_>>()?,
        })
    }
}

// =============================================================================
// MemoryReadout
// =============================================================================

/// Readout over fully materialised tables
///
/// Several readouts may share one definition (e.g. all records of a JSON
/// document that were produced against the same tree).
#[derive(Debug, Clone)]
pub struct MemoryReadout {
    definition: Arc<Definition>,
    record: Record,
}

impl MemoryReadout {
    /// Pair a definition with a record, checking table correspondence
    pub fn new(definition: Arc<Definition>, record: Record) -> Result<Self> {
        if record.point_hits.len() != definition.points.len() {
            return Err(Error::invalid_definition(format!(
                "record {} has {} point hits for {} points",
                record.rec_sha,
                record.point_hits.len(),
                definition.points.len()
            )));
        }
        if record.bucket_hits.len() != definition.bucket_goals.len() {
            return Err(Error::invalid_definition(format!(
                "record {} has {} bucket hits for {} buckets",
                record.rec_sha,
                record.bucket_hits.len(),
                definition.bucket_goals.len()
            )));
        }
        Ok(Self { definition, record })
    }

    /// Snapshot any readout into memory
    pub fn from_readout(readout: &dyn Readout) -> Result<Self> {
        let definition = Arc::new(Definition::from_readout(readout)?);
        let record = Record::from_readout(readout)?;
        Self::new(definition, record)
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Replace the record fingerprint (used by builders once hashing is done)
    pub fn set_rec_sha(&mut self, rec_sha: impl Into<String>) {
        self.record.rec_sha = rec_sha.into();
    }

    pub fn into_parts(self) -> (Arc<Definition>, Record) {
        (self.definition, self.record)
    }
}

fn slice_rows<T: Clone>(rows: &[T], range: RowRange) -> Rows<'_, T> {
    Box::new(rows[range.resolve(rows.len())].iter().cloned().map(Ok))
}

impl Readout for MemoryReadout {
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
        slice_rows(&self.definition.points, range)
    }
    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis> {
        slice_rows(&self.definition.axes, range)
    }
    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue> {
        slice_rows(&self.definition.axis_values, range)
    }
    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal> {
        slice_rows(&self.definition.goals, range)
    }
    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal> {
        slice_rows(&self.definition.bucket_goals, range)
    }
    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit> {
        slice_rows(&self.record.point_hits, range)
    }
    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit> {
        slice_rows(&self.record.bucket_hits, range)
    }
}
