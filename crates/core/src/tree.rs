//! Coverage tree builder
//!
//! Declares coverpoints (axes, goals, per-bucket goal assignment), records hits
//! against them and groups them into covergroups. [`CoverNode::readout`] lays
//! the tree out in the nested-set tables and computes the aggregates and
//! fingerprints, producing a [`MemoryReadout`] that any writer can persist.
//!
//! ```ignore
//! let mut point = Coverpoint::new("colors", "Sizes and colours seen")
//!     .with_axis("size", "", ["small", "large"])
//!     .with_axis("color", "", ["red", "green", "blue"])
//!     .with_default_target(1);
//! point.hit(&["small", "blue"])?;
//! let readout = CoverNode::from(point).readout("regression", "seed=1")?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::addressing::BucketSpace;
use crate::error::{Error, Result};
use crate::fingerprint::{definition_sha, record_sha};
use crate::hierarchy::validate_nested_set;
use crate::readout::MemoryReadout;
use crate::types::{
    Axis, AxisValue, BucketGoal, BucketHit, BucketTally, Definition, Goal, Point, PointHit,
    Record, DEFAULT_GOAL, DEFAULT_TARGET,
};

#[derive(Debug, Clone)]
struct AxisSpec {
    name: String,
    description: String,
    values: Vec<String>,
}

#[derive(Debug, Clone)]
struct GoalSpec {
    name: String,
    description: String,
    target: i64,
}

// =============================================================================
// Coverpoint
// =============================================================================

/// Leaf of the coverage tree: a bucket space with goals and hit counts
#[derive(Debug, Clone)]
pub struct Coverpoint {
    name: String,
    description: String,
    axes: Vec<AxisSpec>,
    goals: Vec<GoalSpec>,
    /// Goal name per bucket; `None` means every bucket uses DEFAULT
    assigned: Option<Vec<Option<String>>>,
    hits: Vec<u64>,
}

impl Coverpoint {
    /// New coverpoint with a single `DEFAULT` goal of target 10
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            axes: Vec::new(),
            goals: vec![GoalSpec {
                name: DEFAULT_GOAL.to_string(),
                description: String::new(),
                target: DEFAULT_TARGET,
            }],
            assigned: None,
            hits: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an axis; values keep their declaration order
    pub fn with_axis<I, S>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.axes.push(AxisSpec {
            name: name.into(),
            description: description.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Override the target of the `DEFAULT` goal
    pub fn with_default_target(mut self, target: i64) -> Self {
        if let Some(default) = self.goals.first_mut() {
            default.target = target;
        }
        self
    }

    /// Add a named goal (`target > 0` quota, `< 0` illegal, `0` ignore)
    pub fn with_goal(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        target: i64,
    ) -> Self {
        self.goals.push(GoalSpec {
            name: name.into(),
            description: description.into(),
            target,
        });
        self
    }

    /// Assign a goal to every bucket
    ///
    /// The closure receives the bucket's axis labels in declaration order and
    /// returns a goal name, or `None` for `DEFAULT`. Axes must be declared first.
    pub fn assign_goals<F>(mut self, mut assign: F) -> Self
    where
        F: FnMut(&[&str]) -> Option<String>,
    {
        let space = self.bucket_space();
        let assigned = space
            .iter()
            .map(|values| {
                let labels: Vec<&str> = values
                    .iter()
                    .zip(&self.axes)
                    .map(|(&value, axis)| axis.values[value].as_str())
                    .collect();
                assign(&labels)
            })
            .collect();
        self.assigned = Some(assigned);
        self
    }

    /// Bucket space of the declared axes
    pub fn bucket_space(&self) -> BucketSpace {
        BucketSpace::new(self.axes.iter().map(|axis| axis.values.len()).collect::<Vec<_>>())
    }

    /// Flat bucket index of a combination of axis labels
    pub fn bucket_index(&self, labels: &[&str]) -> Result<usize> {
        if labels.len() != self.axes.len() {
            return Err(Error::InvalidBucket(format!(
                "coverpoint '{}' has {} axes, got {} labels",
                self.name,
                self.axes.len(),
                labels.len()
            )));
        }
        let mut values = Vec::with_capacity(labels.len());
        for (label, axis) in labels.iter().zip(&self.axes) {
            let value = axis
                .values
                .iter()
                .position(|candidate| candidate == label)
                .ok_or_else(|| {
                    Error::InvalidBucket(format!(
                        "unrecognised value '{}' for axis '{}'",
                        label, axis.name
                    ))
                })?;
            values.push(value);
        }
        self.bucket_space().encode(&values)
    }

    /// Axis labels of a flat bucket index
    pub fn bucket_labels(&self, index: usize) -> Result<Vec<&str>> {
        let values = self.bucket_space().decode(index)?;
        Ok(values
            .iter()
            .zip(&self.axes)
            .map(|(&value, axis)| axis.values[value].as_str())
            .collect())
    }

    /// Record one hit on the bucket with these axis labels
    pub fn hit(&mut self, labels: &[&str]) -> Result<usize> {
        self.hit_n(labels, 1)
    }

    /// Record `count` hits on the bucket with these axis labels
    pub fn hit_n(&mut self, labels: &[&str], count: u64) -> Result<usize> {
        let index = self.bucket_index(labels)?;
        self.hit_index(index, count)?;
        Ok(index)
    }

    /// Record `count` hits on a flat bucket index
    pub fn hit_index(&mut self, index: usize, count: u64) -> Result<()> {
        let len = self.bucket_space().len();
        if index >= len {
            return Err(Error::InvalidBucket(format!(
                "index {} out of range for coverpoint '{}' with {} buckets",
                index, self.name, len
            )));
        }
        if self.hits.len() < len {
            self.hits.resize(len, 0);
        }
        self.hits[index] += count;
        Ok(())
    }

    /// Hits recorded so far on a flat bucket index
    pub fn hits_at(&self, index: usize) -> u64 {
        self.hits.get(index).copied().unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        let mut axis_names = HashSet::new();
        for axis in &self.axes {
            if !axis_names.insert(axis.name.as_str()) {
                return Err(Error::invalid_definition(format!(
                    "coverpoint '{}' declares axis '{}' twice",
                    self.name, axis.name
                )));
            }
            if axis.values.is_empty() {
                return Err(Error::invalid_definition(format!(
                    "axis '{}' of coverpoint '{}' has no values",
                    axis.name, self.name
                )));
            }
            let mut labels = HashSet::new();
            for value in &axis.values {
                if !labels.insert(value.as_str()) {
                    return Err(Error::invalid_definition(format!(
                        "axis '{}' of coverpoint '{}' repeats value '{}'",
                        axis.name, self.name, value
                    )));
                }
            }
        }
        let mut goal_names = HashSet::new();
        for goal in &self.goals {
            if !goal_names.insert(goal.name.as_str()) {
                return Err(Error::invalid_definition(format!(
                    "coverpoint '{}' declares goal '{}' twice",
                    self.name, goal.name
                )));
            }
        }
        Ok(())
    }

    /// Goal offset (within this point's goals) of every bucket
    fn goal_offsets(&self) -> Result<Vec<usize>> {
        let len = self.bucket_space().len();
        let Some(assigned) = &self.assigned else {
            return Ok(vec![0; len]);
        };
        if assigned.len() != len {
            return Err(Error::invalid_definition(format!(
                "coverpoint '{}' assigned goals to {} buckets but has {}",
                self.name,
                assigned.len(),
                len
            )));
        }
        assigned
            .iter()
            .map(|name| match name {
                None => Ok(0),
                Some(name) => self
                    .goals
                    .iter()
                    .position(|goal| &goal.name == name)
                    .ok_or_else(|| {
                        Error::invalid_definition(format!(
                            "coverpoint '{}' assigns unknown goal '{}'",
                            self.name, name
                        ))
                    }),
            })
            .collect()
    }
}

// =============================================================================
// Covergroup / CoverNode
// =============================================================================

/// Organisational node grouping coverpoints and covergroups
#[derive(Debug, Clone)]
pub struct Covergroup {
    name: String,
    description: String,
    children: Vec<CoverNode>,
}

impl Covergroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a child (builder pattern)
    pub fn with_child(mut self, child: impl Into<CoverNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Add a child
    pub fn add(&mut self, child: impl Into<CoverNode>) {
        self.children.push(child.into());
    }

    pub fn children(&self) -> &[CoverNode] {
        &self.children
    }
}

/// A node of the coverage tree
#[derive(Debug, Clone)]
pub enum CoverNode {
    Point(Coverpoint),
    Group(Covergroup),
}

impl From<Coverpoint> for CoverNode {
    fn from(point: Coverpoint) -> Self {
        CoverNode::Point(point)
    }
}

impl From<Covergroup> for CoverNode {
    fn from(group: Covergroup) -> Self {
        CoverNode::Group(group)
    }
}

/// Tables being laid out, in pre-order
#[derive(Default)]
struct Layout {
    points: Vec<Point>,
    axes: Vec<Axis>,
    axis_values: Vec<AxisValue>,
    goals: Vec<Goal>,
    bucket_goals: Vec<BucketGoal>,
    point_hits: Vec<PointHit>,
    bucket_hits: Vec<BucketHit>,
}

/// Target totals of a subtree
#[derive(Default, Clone, Copy)]
struct Targets {
    target: u64,
    target_buckets: u64,
}

impl CoverNode {
    pub fn name(&self) -> &str {
        match self {
            CoverNode::Point(point) => point.name(),
            CoverNode::Group(group) => group.name(),
        }
    }

    /// Find a coverpoint by its path of names below this node
    pub fn find_point_mut(&mut self, path: &[&str]) -> Option<&mut Coverpoint> {
        match (self, path.split_first()) {
            (CoverNode::Point(point), None) => Some(point),
            (CoverNode::Group(group), Some((first, rest))) => group
                .children
                .iter_mut()
                .find(|child| child.name() == *first)
                .and_then(|child| child.find_point_mut(rest)),
            _ => None,
        }
    }

    /// Lay the tree out as a Definition + Record readout
    pub fn readout(
        &self,
        source: impl Into<String>,
        source_key: impl Into<String>,
    ) -> Result<MemoryReadout> {
        let mut layout = Layout::default();
        self.emit(0, &mut layout)?;
        validate_nested_set(&layout.points)?;

        let definition = Definition {
            def_sha: String::new(),
            points: layout.points,
            axes: layout.axes,
            axis_values: layout.axis_values,
            goals: layout.goals,
            bucket_goals: layout.bucket_goals,
        };
        let source = source.into();
        let source_key = source_key.into();
        let record = Record {
            rec_sha: String::new(),
            source,
            source_key,
            point_hits: layout.point_hits,
            bucket_hits: layout.bucket_hits,
        };

        let unsigned = MemoryReadout::new(Arc::new(definition), record)?;
        let def_sha = definition_sha(&unsigned)?;
        let (definition, mut record) = unsigned.into_parts();
        let mut definition =
            Arc::try_unwrap(definition).unwrap_or_else(|shared| (*shared).clone());
        definition.def_sha = def_sha;
        record.rec_sha = record_sha(&definition.def_sha, &record.source, &record.source_key);

        debug!(
            root = %self.name(),
            points = definition.points.len(),
            buckets = definition.bucket_goals.len(),
            def_sha = %definition.def_sha,
            "Laid out coverage tree"
        );
        MemoryReadout::new(Arc::new(definition), record)
    }

    fn emit(&self, depth: usize, layout: &mut Layout) -> Result<(Targets, BucketTally)> {
        let start = layout.points.len();
        let axis_start = layout.axes.len();
        let axis_value_start = layout.axis_values.len();
        let goal_start = layout.goals.len();
        let bucket_start = layout.bucket_goals.len();

        // Reserve this node's row so it precedes its descendants
        layout.points.push(Point {
            start,
            depth,
            end: start + 1,
            axis_start,
            axis_end: axis_start,
            axis_value_start,
            axis_value_end: axis_value_start,
            goal_start,
            goal_end: goal_start,
            bucket_start,
            bucket_end: bucket_start,
            target: 0,
            target_buckets: 0,
            name: self.name().to_string(),
            description: match self {
                CoverNode::Point(point) => point.description.clone(),
                CoverNode::Group(group) => group.description.clone(),
            },
        });
        layout.point_hits.push(PointHit {
            index: start,
            ..Default::default()
        });

        let (targets, tally) = match self {
            CoverNode::Point(point) => emit_point(point, layout)?,
            CoverNode::Group(group) => {
                let mut names = HashSet::new();
                let mut targets = Targets::default();
                let mut tally = BucketTally::default();
                for child in &group.children {
                    if !names.insert(child.name()) {
                        return Err(Error::invalid_definition(format!(
                            "covergroup '{}' has two children named '{}'",
                            group.name,
                            child.name()
                        )));
                    }
                    let (child_targets, child_tally) = child.emit(depth + 1, layout)?;
                    targets.target += child_targets.target;
                    targets.target_buckets += child_targets.target_buckets;
                    tally.add(child_tally);
                }
                (targets, tally)
            }
        };

        let end = layout.points.len();
        let axis_end = layout.axes.len();
        let axis_value_end = layout.axis_values.len();
        let goal_end = layout.goals.len();
        let bucket_end = layout.bucket_goals.len();
        let row = &mut layout.points[start];
        row.end = end;
        row.axis_end = axis_end;
        row.axis_value_end = axis_value_end;
        row.goal_end = goal_end;
        row.bucket_end = bucket_end;
        row.target = targets.target;
        row.target_buckets = targets.target_buckets;

        let hit = &mut layout.point_hits[start];
        hit.hits = tally.hits;
        hit.hit_buckets = tally.hit_buckets;
        hit.full_buckets = tally.full_buckets;

        Ok((targets, tally))
    }
}

fn emit_point(point: &Coverpoint, layout: &mut Layout) -> Result<(Targets, BucketTally)> {
    point.validate()?;
    let offsets = point.goal_offsets()?;

    for axis in &point.axes {
        let value_start = layout.axis_values.len();
        for value in &axis.values {
            layout.axis_values.push(AxisValue {
                index: layout.axis_values.len(),
                value: value.clone(),
            });
        }
        layout.axes.push(Axis {
            index: layout.axes.len(),
            value_start,
            value_end: layout.axis_values.len(),
            name: axis.name.clone(),
            description: axis.description.clone(),
        });
    }

    let goal_start = layout.goals.len();
    for goal in &point.goals {
        layout.goals.push(Goal {
            index: layout.goals.len(),
            target: goal.target,
            name: goal.name.clone(),
            description: goal.description.clone(),
        });
    }

    let mut targets = Targets::default();
    let mut tally = BucketTally::default();
    for (bucket, &offset) in offsets.iter().enumerate() {
        let target = point.goals[offset].target;
        let hits = point.hits_at(bucket);
        if target > 0 {
            targets.target += target as u64;
            targets.target_buckets += 1;
        }
        tally.add(BucketTally::of(hits, target));
        layout.bucket_goals.push(BucketGoal {
            index: layout.bucket_goals.len(),
            goal: goal_start + offset,
        });
        layout.bucket_hits.push(BucketHit {
            index: layout.bucket_hits.len(),
            hits,
        });
    }

    Ok((targets, tally))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readout::{Readout, RowRange};

    fn colors() -> Coverpoint {
        Coverpoint::new("colors", "Sizes and colours")
            .with_axis("size", "Object size", ["small", "large"])
            .with_axis("color", "Object colour", ["red", "green", "blue"])
            .with_default_target(1)
    }

    #[test]
    fn test_single_coverpoint_scenario() {
        let mut point = colors();
        assert_eq!(point.hit(&["small", "blue"]).unwrap(), 2);
        let readout = CoverNode::from(point).readout("", "").unwrap();

        let hits: Vec<_> = readout
            .iter_bucket_hits(RowRange::ALL)
            .map(|h| h.unwrap().hits)
            .collect();
        assert_eq!(hits, vec![0, 0, 1, 0, 0, 0]);

        let point_hit = readout.record().point_hits[0];
        assert_eq!(point_hit.hits, 1);
        assert_eq!(point_hit.hit_buckets, 1);
        assert_eq!(point_hit.full_buckets, 1);

        let point = &readout.definition().points[0];
        assert_eq!(point.target, 6);
        assert_eq!(point.target_buckets, 6);
        assert_eq!(point.bucket_count(), 6);
        assert!(!point.is_group());
    }

    #[test]
    fn test_labels_round_trip() {
        let point = colors();
        for index in 0..6 {
            let labels = point.bucket_labels(index).unwrap();
            assert_eq!(point.bucket_index(&labels).unwrap(), index);
        }
    }

    #[test]
    fn test_unknown_label() {
        let mut point = colors();
        assert!(matches!(
            point.hit(&["small", "purple"]),
            Err(Error::InvalidBucket(_))
        ));
        assert!(point.hit(&["small"]).is_err());
    }

    #[test]
    fn test_group_aggregates() {
        let mut a = colors();
        a.hit_n(&["large", "red"], 3).unwrap();
        let b = Coverpoint::new("flags", "")
            .with_axis("flag", "", ["on", "off"])
            .with_goal("RARE", "", 2)
            .with_goal("NEVER", "", -1)
            .assign_goals(|labels| match labels {
                ["on"] => Some("RARE".to_string()),
                _ => Some("NEVER".to_string()),
            });
        let top = Covergroup::new("top", "")
            .with_child(Covergroup::new("inner", "").with_child(a))
            .with_child(b);
        let readout = CoverNode::from(top).readout("src", "key").unwrap();
        let def = readout.definition();

        let names: Vec<_> = def.points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["top", "inner", "colors", "flags"]);
        assert_eq!(def.points[0].end, 4);
        assert_eq!(def.points[1].end, 3);
        assert_eq!(def.points[2].depth, 2);
        assert_eq!(def.points[3].depth, 1);

        // 6 buckets of target 1 plus one bucket of target 2; the illegal bucket is untargeted
        assert_eq!(def.points[0].target, 8);
        assert_eq!(def.points[0].target_buckets, 7);
        assert_eq!(def.points[0].bucket_count(), 8);
        assert_eq!(def.bucket_goals[6].goal, def.points[3].goal_start + 1);
        assert_eq!(def.bucket_goals[7].goal, def.points[3].goal_start + 2);

        let top_hit = readout.record().point_hits[0];
        assert_eq!(top_hit.hits, 1);
        assert_eq!(top_hit.hit_buckets, 1);
        assert_eq!(top_hit.full_buckets, 1);
        assert_eq!(readout.source(), "src");
        assert_eq!(readout.source_key(), "key");
    }

    #[test]
    fn test_empty_covergroup() {
        let top = Covergroup::new("top", "")
            .with_child(Covergroup::new("empty", ""))
            .with_child(colors());
        let readout = CoverNode::from(top).readout("", "").unwrap();
        let empty = &readout.definition().points[1];
        assert!(empty.is_group());
        assert_eq!(empty.end, empty.start + 1);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let top = Covergroup::new("top", "")
            .with_child(colors())
            .with_child(colors());
        assert!(matches!(
            CoverNode::from(top).readout("", ""),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_unknown_goal_rejected() {
        let point = colors().assign_goals(|_| Some("MISSING".to_string()));
        assert!(matches!(
            CoverNode::from(point).readout("", ""),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_def_sha_ignores_hits_and_source() {
        let mut hit = colors();
        hit.hit(&["large", "green"]).unwrap();
        let a = CoverNode::from(colors()).readout("a", "1").unwrap();
        let b = CoverNode::from(hit).readout("b", "2").unwrap();
        assert_eq!(a.def_sha(), b.def_sha());
        assert_ne!(a.rec_sha(), b.rec_sha());
    }

    #[test]
    fn test_def_sha_sensitive_to_goal_target() {
        let a = CoverNode::from(colors()).readout("", "").unwrap();
        let b = CoverNode::from(colors().with_default_target(2))
            .readout("", "")
            .unwrap();
        assert_ne!(a.def_sha(), b.def_sha());
    }

    #[test]
    fn test_def_sha_sensitive_to_structure() {
        let flat = Covergroup::new("top", "")
            .with_child(colors())
            .with_child(Coverpoint::new("other", "").with_axis("x", "", ["1"]));
        let nested = Covergroup::new("top", "").with_child(
            Covergroup::new("colors", "")
                .with_child(Coverpoint::new("other", "").with_axis("x", "", ["1"])),
        );
        let renamed = Covergroup::new("top", "")
            .with_child(colors())
            .with_child(Coverpoint::new("renamed", "").with_axis("x", "", ["1"]));
        let a = CoverNode::from(flat).readout("", "").unwrap();
        let b = CoverNode::from(nested).readout("", "").unwrap();
        let c = CoverNode::from(renamed).readout("", "").unwrap();
        assert_ne!(a.def_sha(), b.def_sha());
        assert_ne!(a.def_sha(), c.def_sha());
    }

    #[test]
    fn test_find_point_mut() {
        let mut top = CoverNode::from(Covergroup::new("top", "").with_child(colors()));
        let point = top.find_point_mut(&["colors"]).unwrap();
        point.hit(&["large", "blue"]).unwrap();
        assert!(top.find_point_mut(&["missing"]).is_none());
        let readout = top.readout("", "").unwrap();
        assert_eq!(readout.record().bucket_hits[5].hits, 1);
    }
}
