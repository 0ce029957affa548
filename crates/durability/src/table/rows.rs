//! Typed rows of the nine archive tables
//!
//! Row indexes are never stored: they are the row's position within its
//! readout and are passed back in on decode. The point table is the one
//! exception since `Point::start` is part of the nested-set layout.

use super::{ByteSpan, Field, FieldCursor, TableRow};
use bucket_core::types::{Axis, AxisValue, BucketGoal, BucketHit, Goal, Point, PointHit};
use bucket_core::Result;

impl TableRow for Point {
    const TABLE: &'static str = "point";
    const ARITY: usize = 15;

    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.start.into(),
            self.depth.into(),
            self.end.into(),
            self.axis_start.into(),
            self.axis_end.into(),
            self.axis_value_start.into(),
            self.axis_value_end.into(),
            self.goal_start.into(),
            self.goal_end.into(),
            self.bucket_start.into(),
            self.bucket_end.into(),
            self.target.into(),
            self.target_buckets.into(),
            self.name.as_str().into(),
            self.description.as_str().into(),
        ]
    }

    fn from_fields(_index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(Point {
            start: fields.index()?,
            depth: fields.index()?,
            end: fields.index()?,
            axis_start: fields.index()?,
            axis_end: fields.index()?,
            axis_value_start: fields.index()?,
            axis_value_end: fields.index()?,
            goal_start: fields.index()?,
            goal_end: fields.index()?,
            bucket_start: fields.index()?,
            bucket_end: fields.index()?,
            target: fields.uint()?,
            target_buckets: fields.uint()?,
            name: fields.string()?,
            description: fields.string()?,
        })
    }
}

impl TableRow for Axis {
    const TABLE: &'static str = "axis";
    const ARITY: usize = 4;

    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.value_start.into(),
            self.value_end.into(),
            self.name.as_str().into(),
            self.description.as_str().into(),
        ]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(Axis {
            index,
            value_start: fields.index()?,
            value_end: fields.index()?,
            name: fields.string()?,
            description: fields.string()?,
        })
    }
}

impl TableRow for AxisValue {
    const TABLE: &'static str = "axis_value";
    const ARITY: usize = 1;

    fn to_fields(&self) -> Vec<Field> {
        vec![self.value.as_str().into()]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(AxisValue {
            index,
            value: fields.string()?,
        })
    }
}

impl TableRow for Goal {
    const TABLE: &'static str = "goal";
    const ARITY: usize = 3;

    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.target.into(),
            self.name.as_str().into(),
            self.description.as_str().into(),
        ]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(Goal {
            index,
            target: fields.int()?,
            name: fields.string()?,
            description: fields.string()?,
        })
    }
}

impl TableRow for BucketGoal {
    const TABLE: &'static str = "bucket_goal";
    const ARITY: usize = 1;

    fn to_fields(&self) -> Vec<Field> {
        vec![self.goal.into()]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(BucketGoal {
            index,
            goal: fields.index()?,
        })
    }
}

impl TableRow for PointHit {
    const TABLE: &'static str = "point_hit";
    const ARITY: usize = 3;

    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.hits.into(),
            self.hit_buckets.into(),
            self.full_buckets.into(),
        ]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(PointHit {
            index,
            hits: fields.uint()?,
            hit_buckets: fields.uint()?,
            full_buckets: fields.uint()?,
        })
    }
}

impl TableRow for BucketHit {
    const TABLE: &'static str = "bucket_hit";
    const ARITY: usize = 1;

    fn to_fields(&self) -> Vec<Field> {
        vec![self.hits.into()]
    }

    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(BucketHit {
            index,
            hits: fields.uint()?,
        })
    }
}

// =============================================================================
// Index rows
// =============================================================================

/// Row of the `definition` table: a def_sha and where its rows live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefinitionEntry {
    pub def_sha: String,
    pub point: ByteSpan,
    pub axis: ByteSpan,
    pub axis_value: ByteSpan,
    pub goal: ByteSpan,
    pub bucket_goal: ByteSpan,
}

impl TableRow for DefinitionEntry {
    const TABLE: &'static str = "definition";
    const ARITY: usize = 11;

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![self.def_sha.as_str().into()];
        for span in [
            self.point,
            self.axis,
            self.axis_value,
            self.goal,
            self.bucket_goal,
        ] {
            fields.push(span.start.into());
            fields.push(span.end.into());
        }
        fields
    }

    fn from_fields(_index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(DefinitionEntry {
            def_sha: fields.string()?,
            point: fields.span()?,
            axis: fields.span()?,
            axis_value: fields.span()?,
            goal: fields.span()?,
            bucket_goal: fields.span()?,
        })
    }
}

/// Row of the `record` table: a rec_sha, its definition row and where its rows live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordEntry {
    pub rec_sha: String,
    /// Byte offset of the definition row in the `definition` table
    pub definition: u64,
    pub point_hit: ByteSpan,
    pub bucket_hit: ByteSpan,
    pub source: String,
    pub source_key: String,
}

impl TableRow for RecordEntry {
    const TABLE: &'static str = "record";
    const ARITY: usize = 8;

    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.rec_sha.as_str().into(),
            self.definition.into(),
            self.point_hit.start.into(),
            self.point_hit.end.into(),
            self.bucket_hit.start.into(),
            self.bucket_hit.end.into(),
            self.source.as_str().into(),
            self.source_key.as_str().into(),
        ]
    }

    fn from_fields(_index: usize, fields: &mut FieldCursor) -> Result<Self> {
        Ok(RecordEntry {
            rec_sha: fields.string()?,
            definition: fields.uint()?,
            point_hit: fields.span()?,
            bucket_hit: fields.span()?,
            source: fields.string()?,
            source_key: fields.string()?,
        })
    }
}
