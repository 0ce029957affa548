//! Accessor
//!
//! Read-only projection of a [`Readout`] into per-point and per-bucket views
//! with derived ratios. Accessors hold no state of their own beyond the rows
//! they were built from; every navigation call goes back to the readout.

use crate::error::Result;
use crate::hierarchy;
use crate::readout::{Readout, RowRange};
use crate::types::{Axis, AxisValue, Goal, Point, PointHit};

/// Entry point over a readout
#[derive(Clone, Copy)]
pub struct CoverageAccess<'a> {
    readout: &'a dyn Readout,
}

impl<'a> CoverageAccess<'a> {
    pub fn new(readout: &'a dyn Readout) -> Self {
        Self { readout }
    }

    pub fn readout(&self) -> &'a dyn Readout {
        self.readout
    }

    /// The root point, if the tree is not empty
    pub fn root(&self) -> Result<Option<PointAccess<'a>>> {
        self.point(0)
    }

    /// The point at row `index`
    pub fn point(&self, index: usize) -> Result<Option<PointAccess<'a>>> {
        let Some(point) = hierarchy::point_at(self.readout, index)? else {
            return Ok(None);
        };
        let hit = hierarchy::point_hit_at(self.readout, index)?.unwrap_or(PointHit {
            index,
            ..Default::default()
        });
        Ok(Some(PointAccess::new(self.readout, point, hit)))
    }

    /// Every point in pre-order
    pub fn points(&self) -> Result<Vec<PointAccess<'a>>> {
        self.readout
            .iter_points(RowRange::ALL)
            .zip(self.readout.iter_point_hits(RowRange::ALL))
            .map(|(point, hit)| Ok(PointAccess::new(self.readout, point?, hit?)))
            .collect()
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

// =============================================================================
// PointAccess
// =============================================================================

/// One coverpoint or covergroup with its hit summary
#[derive(Clone)]
pub struct PointAccess<'a> {
    readout: &'a dyn Readout,
    point: Point,
    hit: PointHit,
}

impl<'a> PointAccess<'a> {
    fn new(readout: &'a dyn Readout, point: Point, hit: PointHit) -> Self {
        Self {
            readout,
            point,
            hit,
        }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn name(&self) -> &str {
        &self.point.name
    }

    pub fn description(&self) -> &str {
        &self.point.description
    }

    pub fn is_group(&self) -> bool {
        self.point.is_group()
    }

    pub fn hits(&self) -> u64 {
        self.hit.hits
    }

    pub fn target(&self) -> u64 {
        self.point.target
    }

    /// Hits over target (may exceed 1); 1.0 when nothing is targeted
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits(), self.target())
    }

    pub fn hit_percent(&self) -> String {
        percent(self.hit_ratio())
    }

    pub fn buckets_hit(&self) -> u64 {
        self.hit.hit_buckets
    }

    pub fn buckets_targeted(&self) -> u64 {
        self.point.target_buckets
    }

    pub fn buckets_full(&self) -> u64 {
        self.hit.full_buckets
    }

    pub fn bucket_hit_ratio(&self) -> f64 {
        ratio(self.buckets_hit(), self.buckets_targeted())
    }

    pub fn bucket_full_ratio(&self) -> f64 {
        ratio(self.buckets_full(), self.buckets_targeted())
    }

    pub fn buckets_hit_percent(&self) -> String {
        percent(self.bucket_hit_ratio())
    }

    pub fn buckets_full_percent(&self) -> String {
        percent(self.bucket_full_ratio())
    }

    /// Direct children, one row read per child
    pub fn children(&self) -> Result<Vec<PointAccess<'a>>> {
        hierarchy::children(self.readout, &self.point)?
            .into_iter()
            .map(|child| {
                let hit = hierarchy::point_hit_at(self.readout, child.start)?.unwrap_or(
                    PointHit {
                        index: child.start,
                        ..Default::default()
                    },
                );
                Ok(PointAccess::new(self.readout, child, hit))
            })
            .collect()
    }

    pub fn axes(&self) -> Result<Vec<Axis>> {
        self.readout
            .iter_axes(RowRange::new(self.point.axis_start, self.point.axis_end))
            .collect()
    }

    pub fn goals(&self) -> Result<Vec<Goal>> {
        self.readout
            .iter_goals(RowRange::new(self.point.goal_start, self.point.goal_end))
            .collect()
    }

    /// Buckets of a coverpoint with their axis labels resolved
    ///
    /// For a covergroup this yields the buckets of every descendant, but axis
    /// labels are only resolved against the point's own axes.
    pub fn buckets(&self) -> Result<Vec<BucketAccess>> {
        let goals = self.goals()?;
        let axes = self.axes()?;
        let values: Vec<AxisValue> = self
            .readout
            .iter_axis_values(RowRange::new(
                self.point.axis_value_start,
                self.point.axis_value_end,
            ))
            .collect::<Result<_>>()?;

        let range = RowRange::new(self.point.bucket_start, self.point.bucket_end);
        self.readout
            .iter_bucket_goals(range)
            .zip(self.readout.iter_bucket_hits(range))
            .enumerate()
            .map(|(offset, (bucket_goal, bucket_hit))| {
                let bucket_goal = bucket_goal?;
                let bucket_hit = bucket_hit?;

                // Last axis varies fastest
                let mut rest = offset;
                let mut labels = vec![(String::new(), String::new()); axes.len()];
                for (slot, axis) in labels.iter_mut().zip(&axes).rev() {
                    let size = axis.size().max(1);
                    let position = axis.value_start.saturating_sub(self.point.axis_value_start)
                        + rest % size;
                    let value = values
                        .get(position)
                        .map(|value| value.value.clone())
                        .unwrap_or_default();
                    *slot = (axis.name.clone(), value);
                    rest /= size;
                }

                let goal = goals
                    .get(bucket_goal.goal.wrapping_sub(self.point.goal_start))
                    .cloned();
                Ok(BucketAccess {
                    index: offset,
                    axis_values: labels,
                    goal,
                    hits: bucket_hit.hits,
                })
            })
            .collect()
    }
}

// =============================================================================
// BucketAccess
// =============================================================================

/// One bucket of a coverpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BucketAccess {
    index: usize,
    axis_values: Vec<(String, String)>,
    goal: Option<Goal>,
    hits: u64,
}

impl BucketAccess {
    /// Flat index within the owning coverpoint
    pub fn index(&self) -> usize {
        self.index
    }

    /// Label of this bucket on the named axis
    pub fn axis_value(&self, name: &str) -> Option<&str> {
        self.axis_values
            .iter()
            .find(|(axis, _)| axis == name)
            .map(|(_, value)| value.as_str())
    }

    /// `(axis name, label)` pairs in axis declaration order
    pub fn axis_values(&self) -> &[(String, String)] {
        &self.axis_values
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn target(&self) -> i64 {
        self.goal.as_ref().map_or(0, |goal| goal.target)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Fraction of the target reached, capped at 1; 0 for untargeted buckets
    pub fn hit_ratio(&self) -> f64 {
        let target = self.target();
        if target > 0 {
            self.hits.min(target as u64) as f64 / target as f64
        } else {
            0.0
        }
    }

    /// `"-"` for ignored buckets, `"!"` for illegal buckets that were hit
    pub fn hit_percent(&self) -> String {
        match self.target() {
            target if target > 0 => percent(self.hit_ratio()),
            0 => "-".to_string(),
            _ if self.hits > 0 => "!".to_string(),
            _ => "-".to_string(),
        }
    }

    pub fn is_legal(&self) -> bool {
        self.target() >= 0
    }

    /// An illegal bucket was hit
    pub fn is_illegal_hit(&self) -> bool {
        !self.is_legal() && self.hits > 0
    }
}
