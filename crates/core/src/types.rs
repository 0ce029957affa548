//! Coverage data model
//!
//! A [`Definition`] describes the structure of a coverage tree and owns five
//! parallel tables (points, axes, axis values, goals, bucket goals). A
//! [`Record`] holds one run's hit counts against a definition in two tables
//! (point hits, bucket hits). Tables reference each other with half-open
//! `[start, end)` row ranges.
//!
//! ## Nested-set layout
//!
//! Points are stored in pre-order. `Point::start` is the point's own row index
//! and `Point::end` is one past its last descendant, so `[start, end)` is the
//! point followed by its whole subtree. There is no depth offset: row `i` of the
//! point table always has `start == i`.

use serde::{Deserialize, Serialize};

/// Goal target meaning "any hit is a defect"
pub const ILLEGAL_TARGET: i64 = -1;

/// Goal target meaning "don't care"
pub const IGNORE_TARGET: i64 = 0;

/// Target of the implicit `DEFAULT` goal
pub const DEFAULT_TARGET: i64 = 10;

/// Name of the goal every coverpoint starts with
pub const DEFAULT_GOAL: &str = "DEFAULT";

// =============================================================================
// Definition rows
// =============================================================================

/// One node of the coverage tree (coverpoint or covergroup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Row index of this point (pre-order position)
    pub start: usize,
    /// Nesting level, root = 0
    pub depth: usize,
    /// One past the last descendant
    pub end: usize,
    pub axis_start: usize,
    pub axis_end: usize,
    pub axis_value_start: usize,
    pub axis_value_end: usize,
    pub goal_start: usize,
    pub goal_end: usize,
    pub bucket_start: usize,
    pub bucket_end: usize,
    /// Sum of positive goal targets over the bucket range
    pub target: u64,
    /// Number of buckets in range with a positive target
    pub target_buckets: u64,
    pub name: String,
    pub description: String,
}

impl Point {
    /// True for covergroups, including empty ones
    ///
    /// Every coverpoint owns at least one goal, so a single-row subtree with
    /// no goals can only be an empty covergroup.
    pub fn is_group(&self) -> bool {
        self.end != self.start + 1 || self.goal_start == self.goal_end
    }

    /// Number of rows in this point's subtree, itself included
    pub fn subtree_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of buckets covered by this point
    pub fn bucket_count(&self) -> usize {
        self.bucket_end - self.bucket_start
    }

    /// True if `other` lies inside this point's subtree (or is this point)
    pub fn contains(&self, other: &Point) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// One coverage dimension of a coverpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub index: usize,
    pub value_start: usize,
    pub value_end: usize,
    pub name: String,
    pub description: String,
}

impl Axis {
    /// Number of values on this axis
    pub fn size(&self) -> usize {
        self.value_end - self.value_start
    }
}

/// A bucketable value (or range label) of an axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisValue {
    pub index: usize,
    pub value: String,
}

/// A hit quota shared by one or more buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub index: usize,
    /// `> 0` quota, `< 0` illegal, `== 0` ignored
    pub target: i64,
    pub name: String,
    pub description: String,
}

impl Goal {
    /// Buckets with this goal count towards coverage
    pub fn is_targeted(&self) -> bool {
        self.target > 0
    }

    /// Any hit on a bucket with this goal is a defect
    pub fn is_illegal(&self) -> bool {
        self.target < 0
    }

    /// Buckets with this goal are not tracked
    pub fn is_ignored(&self) -> bool {
        self.target == 0
    }
}

/// Maps one bucket (by flat index) to its goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketGoal {
    pub index: usize,
    /// Absolute row index into the goal table
    pub goal: usize,
}

// =============================================================================
// Record rows
// =============================================================================

/// Aggregate hit counts of one point, aligned with the point table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointHit {
    pub index: usize,
    pub hits: u64,
    pub hit_buckets: u64,
    pub full_buckets: u64,
}

/// Hit count of one bucket, aligned with the bucket goal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketHit {
    pub index: usize,
    pub hits: u64,
}

/// Per-bucket contribution to a point's hit summary
///
/// Only buckets with a positive target contribute, and a bucket contributes
/// at most its target to `hits`. Shared by the tree builder and the merge
/// engine so that both derive identical summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketTally {
    pub hits: u64,
    pub hit_buckets: u64,
    pub full_buckets: u64,
}

impl BucketTally {
    /// Tally a single bucket
    pub fn of(hits: u64, target: i64) -> Self {
        if target <= 0 {
            return Self::default();
        }
        let target = target as u64;
        Self {
            hits: hits.min(target),
            hit_buckets: u64::from(hits > 0),
            full_buckets: u64::from(hits >= target),
        }
    }

    /// Accumulate another tally
    pub fn add(&mut self, other: BucketTally) {
        self.hits += other.hits;
        self.hit_buckets += other.hit_buckets;
        self.full_buckets += other.full_buckets;
    }
}

// =============================================================================
// Definition / Record
// =============================================================================

/// Structural description of a coverage tree, identified by `def_sha`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Definition {
    pub def_sha: String,
    pub points: Vec<Point>,
    pub axes: Vec<Axis>,
    pub axis_values: Vec<AxisValue>,
    pub goals: Vec<Goal>,
    pub bucket_goals: Vec<BucketGoal>,
}

/// One run's (or one merge's) hit counts, identified by `rec_sha`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    pub rec_sha: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_key: String,
    pub point_hits: Vec<PointHit>,
    pub bucket_hits: Vec<BucketHit>,
}
