//! Merge Engine
//!
//! Combines readouts that share a definition into one readout whose bucket
//! hits are the element-wise sums of the inputs. Point summaries can't be
//! summed (a bucket hit by two runs is still one hit bucket, and its
//! contribution stays capped at its target), so they are recomputed from the
//! summed bucket hits and each bucket's goal target.
//!
//! Recomputation uses one prefix sum over the bucket table. Every point, group
//! or coverpoint, owns a contiguous bucket range, so each point's summary is
//! the difference of two prefix entries.
//!
//! All inputs are checked before anything is summed. A failed merge never
//! leaves a partially merged readout behind.

use std::sync::Arc;

use tracing::{debug, info};

use bucket_core::{
    record_sha, Axis, AxisValue, BucketGoal, BucketHit, BucketTally, Definition, Error, Goal,
    MemoryReadout, Point, PointHit, Readout, Record, Result, RowRange, Rows,
};

// =============================================================================
// MergeConfig
// =============================================================================

/// Merge policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeConfig {
    /// Reject inputs whose `rec_sha` differs from the first input's
    ///
    /// Off by default: `rec_sha` covers the source and source key, which
    /// differ for every run.
    pub require_matching_rec_sha: bool,
}

impl MergeConfig {
    /// Create a MergeConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that also requires matching record hashes
    pub fn strict() -> Self {
        Self {
            require_matching_rec_sha: true,
        }
    }

    /// Set whether record hashes must match
    pub fn with_require_matching_rec_sha(mut self, require: bool) -> Self {
        self.require_matching_rec_sha = require;
        self
    }
}

// =============================================================================
// MergeReadout
// =============================================================================

/// The sum of one or more readouts sharing a definition
#[derive(Debug, Clone)]
pub struct MergeReadout {
    config: MergeConfig,
    /// rec_sha of the first input, for the strict policy
    input_rec_sha: String,
    /// Goal target of every bucket row
    targets: Vec<i64>,
    inputs: usize,
    readout: MemoryReadout,
}

impl MergeReadout {
    /// Start a merge from a single readout
    pub fn new(first: &dyn Readout, config: MergeConfig) -> Result<Self> {
        Self::from_definition(Arc::new(Definition::from_readout(first)?), first, config)
    }

    /// Start a merge from an in-memory readout, sharing its definition
    pub fn from_memory(first: &MemoryReadout, config: MergeConfig) -> Result<Self> {
        Self::from_definition(Arc::clone(first.definition()), first, config)
    }

    fn from_definition(
        definition: Arc<Definition>,
        first: &dyn Readout,
        config: MergeConfig,
    ) -> Result<Self> {
        let targets = bucket_targets(&definition)?;
        let point_hits = collect_point_hits(first, definition.points.len())?;
        let bucket_hits = collect_bucket_hits(first, targets.len())?;
        let readout = summarize(&definition, &targets, point_hits, bucket_hits)?;
        Ok(Self {
            config,
            input_rec_sha: first.rec_sha().to_string(),
            targets,
            inputs: 1,
            readout,
        })
    }

    /// Number of readouts merged so far
    pub fn input_count(&self) -> usize {
        self.inputs
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn definition(&self) -> &Arc<Definition> {
        self.readout.definition()
    }

    /// Check that `other` may be merged into this readout
    pub fn check(&self, other: &dyn Readout) -> Result<()> {
        self.check_hashes(other.def_sha(), other.rec_sha())
    }

    fn check_hashes(&self, def_sha: &str, rec_sha: &str) -> Result<()> {
        if def_sha != self.readout.def_sha() {
            return Err(Error::IncompatibleDefinition {
                expected: self.readout.def_sha().to_string(),
                found: def_sha.to_string(),
            });
        }
        if self.config.require_matching_rec_sha && rec_sha != self.input_rec_sha {
            return Err(Error::IncompatibleRecord {
                expected: self.input_rec_sha.clone(),
                found: rec_sha.to_string(),
            });
        }
        Ok(())
    }

    /// Add one readout
    pub fn merge(&mut self, other: &dyn Readout) -> Result<()> {
        self.merge_all(&[other])
    }

    /// Add several readouts; nothing is summed unless all of them are compatible
    pub fn merge_all(&mut self, others: &[&dyn Readout]) -> Result<()> {
        for other in others {
            self.check(*other)?;
        }

        let definition = Arc::clone(self.readout.definition());
        let record = self.readout.record();
        let point_hits = record.point_hits.clone();
        let mut bucket_hits = record.bucket_hits.clone();
        for other in others {
            collect_point_hits(*other, point_hits.len())?;
            let other_buckets = collect_bucket_hits(*other, bucket_hits.len())?;
            for (sum, hit) in bucket_hits.iter_mut().zip(&other_buckets) {
                sum.hits += hit.hits;
            }
        }

        self.readout = summarize(&definition, &self.targets, point_hits, bucket_hits)?;
        self.inputs += others.len();
        debug!(
            def_sha = %definition.def_sha,
            added = others.len(),
            inputs = self.inputs,
            "Merged readouts"
        );
        Ok(())
    }

    /// Combine with another partial merge
    ///
    /// The strict policy compares the record hash of `other`'s first input,
    /// since a merged readout carries its own.
    pub fn merge_readout(&mut self, other: &MergeReadout) -> Result<()> {
        self.check_hashes(other.def_sha(), &other.input_rec_sha)?;
        let inputs = self.inputs + other.inputs;
        let point_hits = self.readout.record().point_hits.clone();
        let mut bucket_hits = self.readout.record().bucket_hits.clone();
        let theirs = other.readout.record();
        for (sum, hit) in bucket_hits.iter_mut().zip(&theirs.bucket_hits) {
            sum.hits += hit.hits;
        }
        let definition = Arc::clone(self.readout.definition());
        self.readout = summarize(&definition, &self.targets, point_hits, bucket_hits)?;
        self.inputs = inputs;
        Ok(())
    }

    /// The merged tables as a plain in-memory readout
    pub fn as_memory(&self) -> &MemoryReadout {
        &self.readout
    }

    pub fn into_memory(self) -> MemoryReadout {
        self.readout
    }
}

impl Readout for MergeReadout {
    fn def_sha(&self) -> &str {
        self.readout.def_sha()
    }

    fn rec_sha(&self) -> &str {
        self.readout.rec_sha()
    }

    fn source(&self) -> &str {
        self.readout.source()
    }

    fn source_key(&self) -> &str {
        self.readout.source_key()
    }

    fn iter_points(&self, range: RowRange) -> Rows<'_, Point> {
        self.readout.iter_points(range)
    }

    fn iter_axes(&self, range: RowRange) -> Rows<'_, Axis> {
        self.readout.iter_axes(range)
    }

    fn iter_axis_values(&self, range: RowRange) -> Rows<'_, AxisValue> {
        self.readout.iter_axis_values(range)
    }

    fn iter_goals(&self, range: RowRange) -> Rows<'_, Goal> {
        self.readout.iter_goals(range)
    }

    fn iter_bucket_goals(&self, range: RowRange) -> Rows<'_, BucketGoal> {
        self.readout.iter_bucket_goals(range)
    }

    fn iter_point_hits(&self, range: RowRange) -> Rows<'_, PointHit> {
        self.readout.iter_point_hits(range)
    }

    fn iter_bucket_hits(&self, range: RowRange) -> Rows<'_, BucketHit> {
        self.readout.iter_bucket_hits(range)
    }
}

/// Merge a non-empty list of readouts
pub fn merge_readouts(readouts: &[&dyn Readout], config: &MergeConfig) -> Result<MergeReadout> {
    let (first, rest) = readouts.split_first().ok_or_else(|| Error::EmptyReadout {
        origin: "merge".to_string(),
    })?;

    // Validate everything against the first input before reading any hits
    for other in rest {
        if other.def_sha() != first.def_sha() {
            return Err(Error::IncompatibleDefinition {
                expected: first.def_sha().to_string(),
                found: other.def_sha().to_string(),
            });
        }
    }

    let mut merged = MergeReadout::new(*first, *config)?;
    merged.merge_all(rest)?;

    let root = merged.readout.record().point_hits.first().copied().unwrap_or_default();
    info!(
        def_sha = %merged.def_sha(),
        inputs = merged.inputs,
        hits = root.hits,
        hit_buckets = root.hit_buckets,
        full_buckets = root.full_buckets,
        "Merge complete"
    );
    Ok(merged)
}

// =============================================================================
// Helpers
// =============================================================================

fn bucket_targets(definition: &Definition) -> Result<Vec<i64>> {
    definition
        .bucket_goals
        .iter()
        .map(|bucket_goal| {
            definition
                .goals
                .get(bucket_goal.goal)
                .map(|goal| goal.target)
                .ok_or_else(|| {
                    Error::invalid_definition(format!(
                        "bucket {} references missing goal {}",
                        bucket_goal.index, bucket_goal.goal
                    ))
                })
        })
        .collect()
}

fn collect_point_hits(readout: &dyn Readout, expected: usize) -> Result<Vec<PointHit>> {
    let hits = readout
        .iter_point_hits(RowRange::ALL)
        .collect::<Result<Vec<_>>>()?;
    if hits.len() != expected {
        return Err(Error::invalid_definition(format!(
            "record {} has {} point hits, expected {}",
            readout.rec_sha(),
            hits.len(),
            expected
        )));
    }
    Ok(hits)
}

fn collect_bucket_hits(readout: &dyn Readout, expected: usize) -> Result<Vec<BucketHit>> {
    let hits = readout
        .iter_bucket_hits(RowRange::ALL)
        .collect::<Result<Vec<_>>>()?;
    if hits.len() != expected {
        return Err(Error::invalid_definition(format!(
            "record {} has {} bucket hits, expected {}",
            readout.rec_sha(),
            hits.len(),
            expected
        )));
    }
    Ok(hits)
}

/// Recompute per-point bucket counts and assemble the merged readout
fn summarize(
    definition: &Arc<Definition>,
    targets: &[i64],
    mut point_hits: Vec<PointHit>,
    bucket_hits: Vec<BucketHit>,
) -> Result<MemoryReadout> {
    // prefix[i] tallies buckets [0, i)
    let mut prefix = Vec::with_capacity(bucket_hits.len() + 1);
    let mut running = BucketTally::default();
    prefix.push(running);
    for (hit, target) in bucket_hits.iter().zip(targets) {
        running.add(BucketTally::of(hit.hits, *target));
        prefix.push(running);
    }

    for (point, point_hit) in definition.points.iter().zip(point_hits.iter_mut()) {
        let (low, high) = match (prefix.get(point.bucket_start), prefix.get(point.bucket_end)) {
            (Some(low), Some(high)) if point.bucket_start <= point.bucket_end => (low, high),
            _ => {
                return Err(Error::invalid_definition(format!(
                    "point '{}' has bucket range {}..{} outside {} buckets",
                    point.name,
                    point.bucket_start,
                    point.bucket_end,
                    bucket_hits.len()
                )))
            }
        };
        point_hit.hits = high.hits - low.hits;
        point_hit.hit_buckets = high.hit_buckets - low.hit_buckets;
        point_hit.full_buckets = high.full_buckets - low.full_buckets;
    }

    let record = Record {
        rec_sha: record_sha(&definition.def_sha, "", ""),
        source: String::new(),
        source_key: String::new(),
        point_hits,
        bucket_hits,
    };
    MemoryReadout::new(Arc::clone(definition), record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucket_core::{CoverNode, CoverageAccess, Covergroup, Coverpoint};

    fn colors(hits: &[(&str, &str, u64)], source: &str) -> MemoryReadout {
        let mut point = Coverpoint::new("colors", "")
            .with_axis("size", "", ["small", "large"])
            .with_axis("color", "", ["red", "blue"])
            .with_default_target(2);
        for (size, color, count) in hits {
            point.hit_n(&[*size, *color], *count).unwrap();
        }
        CoverNode::from(point).readout(source, "1").unwrap()
    }

    fn root_hit(readout: &dyn Readout) -> PointHit {
        readout
            .iter_point_hits(RowRange::single(0))
            .next()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_merge_with_itself_doubles_hits() {
        let run = colors(&[("small", "red", 1), ("large", "blue", 3)], "run");
        assert_eq!(
            root_hit(&run),
            PointHit {
                index: 0,
                hits: 3,
                hit_buckets: 2,
                full_buckets: 1
            }
        );

        let merged = merge_readouts(&[&run, &run], &MergeConfig::default()).unwrap();
        assert_eq!(merged.input_count(), 2);
        assert_eq!(
            root_hit(&merged),
            PointHit {
                index: 0,
                hits: 4,
                hit_buckets: 2,
                full_buckets: 2
            }
        );
        let buckets: Vec<u64> = merged
            .iter_bucket_hits(RowRange::ALL)
            .map(|hit| hit.unwrap().hits)
            .collect();
        assert_eq!(buckets, vec![2, 0, 0, 6]);
    }

    #[test]
    fn test_merged_point_hits_capped_per_bucket() {
        let run = colors(&[("small", "red", 50)], "run");
        assert_eq!(root_hit(&run).hits, 2);

        let merged = merge_readouts(&[&run, &run], &MergeConfig::default()).unwrap();
        let root = root_hit(&merged);
        assert_eq!(root.hits, 2);
        assert_eq!(root.full_buckets, 1);
        let buckets: Vec<u64> = merged
            .iter_bucket_hits(RowRange::ALL)
            .map(|hit| hit.unwrap().hits)
            .collect();
        assert_eq!(buckets, vec![100, 0, 0, 0]);
    }

    #[test]
    fn test_merged_identity() {
        let a = colors(&[("small", "red", 1)], "a");
        let b = colors(&[("large", "red", 1)], "b");
        let merged = merge_readouts(&[&a, &b], &MergeConfig::default()).unwrap();

        assert_eq!(merged.def_sha(), a.def_sha());
        assert_eq!(merged.source(), "");
        assert_eq!(merged.source_key(), "");
        assert_eq!(merged.rec_sha(), record_sha(a.def_sha(), "", ""));
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = colors(&[("small", "red", 1)], "a");
        let b = colors(&[("small", "red", 1), ("small", "blue", 2)], "b");
        let ab = merge_readouts(&[&a, &b], &MergeConfig::default()).unwrap();
        let ba = merge_readouts(&[&b, &a], &MergeConfig::default()).unwrap();
        assert_eq!(ab.as_memory().record(), ba.as_memory().record());
    }

    #[test]
    fn test_incremental_matches_batch() {
        let runs = [
            colors(&[("small", "red", 1)], "a"),
            colors(&[("large", "red", 2)], "b"),
            colors(&[("large", "blue", 1)], "c"),
        ];
        let batch =
            merge_readouts(&[&runs[0], &runs[1], &runs[2]], &MergeConfig::default()).unwrap();

        let mut left = MergeReadout::from_memory(&runs[0], MergeConfig::default()).unwrap();
        left.merge(&runs[1]).unwrap();
        let right = MergeReadout::from_memory(&runs[2], MergeConfig::default()).unwrap();
        left.merge_readout(&right).unwrap();

        assert_eq!(left.input_count(), 3);
        assert_eq!(left.as_memory().record(), batch.as_memory().record());
        assert!(Arc::ptr_eq(left.definition(), runs[0].definition()));
    }

    #[test]
    fn test_mismatched_definition_rejected() {
        let a = colors(&[("small", "red", 1)], "a");
        let other = CoverNode::from(
            Coverpoint::new("colors", "")
                .with_axis("size", "", ["small", "large"])
                .with_axis("color", "", ["red", "blue"])
                .with_default_target(3),
        )
        .readout("b", "1")
        .unwrap();

        let err = merge_readouts(&[&a, &other], &MergeConfig::default()).unwrap_err();
        match err {
            Error::IncompatibleDefinition { expected, found } => {
                assert_eq!(expected, a.def_sha());
                assert_eq!(found, other.def_sha());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_merge_leaves_readout_unchanged() {
        let a = colors(&[("small", "red", 1)], "a");
        let b = colors(&[("small", "red", 1)], "b");
        let other = CoverNode::from(Coverpoint::new("other", "").with_axis("x", "", ["0"]))
            .readout("c", "1")
            .unwrap();

        let mut merged = MergeReadout::new(&a, MergeConfig::default()).unwrap();
        let before = merged.as_memory().record().clone();
        assert!(merged.merge_all(&[&b, &other]).is_err());
        assert_eq!(merged.as_memory().record(), &before);
        assert_eq!(merged.input_count(), 1);
    }

    #[test]
    fn test_rec_sha_policy() {
        let a = colors(&[("small", "red", 1)], "a");
        let b = colors(&[("small", "red", 1)], "b");
        assert_ne!(a.rec_sha(), b.rec_sha());

        assert!(merge_readouts(&[&a, &b], &MergeConfig::default()).is_ok());
        assert!(matches!(
            merge_readouts(&[&a, &b], &MergeConfig::strict()),
            Err(Error::IncompatibleRecord { .. })
        ));

        let same = colors(&[("large", "blue", 1)], "a");
        let merged = merge_readouts(&[&a, &same], &MergeConfig::strict()).unwrap();
        assert_eq!(root_hit(&merged).hits, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            merge_readouts(&[], &MergeConfig::default()),
            Err(Error::EmptyReadout { .. })
        ));
    }

    #[test]
    fn test_group_summaries_recomputed() {
        let build = |small: u64, odd: u64| {
            let mut sizes = Coverpoint::new("sizes", "")
                .with_axis("size", "", ["small", "large"])
                .with_default_target(2);
            sizes.hit_n(&["small"], small).unwrap();
            let mut parity = Coverpoint::new("parity", "")
                .with_axis("parity", "", ["odd", "even"])
                .with_default_target(1);
            parity.hit_n(&["odd"], odd).unwrap();
            CoverNode::from(Covergroup::new("top", "").with_child(sizes).with_child(parity))
                .readout("run", "")
                .unwrap()
        };
        let a = build(1, 1);
        let b = build(1, 0);
        let merged = merge_readouts(&[&a, &b], &MergeConfig::default()).unwrap();

        let access = CoverageAccess::new(&merged);
        let top = access.root().unwrap().unwrap();
        assert_eq!(top.hits(), 3);
        assert_eq!(top.buckets_hit(), 2);
        assert_eq!(top.buckets_full(), 2);

        let children = top.children().unwrap();
        assert_eq!(children[0].name(), "sizes");
        assert_eq!(children[0].hits(), 2);
        assert_eq!(children[0].buckets_full(), 1);
        assert_eq!(children[1].name(), "parity");
        assert_eq!(children[1].hits(), 1);
        assert_eq!(children[1].buckets_full(), 1);
    }
}
