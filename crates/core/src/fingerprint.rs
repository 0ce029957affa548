//! Fingerprint chain
//!
//! Structural hashing used for `def_sha` and `rec_sha`.
//!
//! ## Chain
//!
//! Uses SHA-256 for deterministic cross-platform hashing. Each link computes:
//! SHA256(state || digest), starting from an all-zero state. The chain is a
//! plain fold, so a chain can be resumed from any intermediate state:
//! `chain(a ++ b) == FingerprintChain::resume(chain(a)).link_all(b).finish()`.
//!
//! ## Descriptors
//!
//! Descriptors are hashed with length-prefixed fields (4 byte little-endian
//! length + content, 8 byte little-endian integers) so that field boundaries
//! can never be confused. Definition descriptors are linked in pre-order:
//!
//! - point: depth, subtree size, name, description
//! - then, for coverpoints only: each axis (name, description, value labels),
//!   each goal (name, description, target) and one digest over the goal offset
//!   of every bucket.
//!
//! Hit counts never enter a fingerprint.

use sha2::{Digest as _, Sha256};

use crate::error::Result;
use crate::readout::{Readout, RowRange};
use crate::types::{Axis, AxisValue, Goal, Point};

/// A 32 byte SHA-256 digest
pub type Digest = [u8; 32];

/// Initial state of every chain
pub const CHAIN_INITIAL: Digest = [0u8; 32];

/// Explicit accumulator for a chain of digests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintChain {
    state: Digest,
}

impl Default for FingerprintChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintChain {
    /// Start a new chain from the fixed initial value
    pub fn new() -> Self {
        Self {
            state: CHAIN_INITIAL,
        }
    }

    /// Continue a chain from a previously finished state
    pub fn resume(state: Digest) -> Self {
        Self { state }
    }

    /// Link one digest onto the chain
    pub fn link(mut self, digest: &Digest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(self.state);
        hasher.update(digest);
        self.state = hasher.finalize().into();
        self
    }

    /// Link a sequence of digests in order
    pub fn link_all<'a>(self, digests: impl IntoIterator<Item = &'a Digest>) -> Self {
        digests.into_iter().fold(self, |chain, digest| chain.link(digest))
    }

    /// Current state of the chain
    pub fn finish(self) -> Digest {
        self.state
    }

    /// Current state as lowercase hex
    pub fn hex(self) -> String {
        to_hex(&self.state)
    }
}

/// Chain a sequence of digests from the initial value
pub fn chain<'a>(digests: impl IntoIterator<Item = &'a Digest>) -> Digest {
    FingerprintChain::new().link_all(digests).finish()
}

/// Lowercase hex encoding of a digest
pub fn to_hex(digest: &Digest) -> String {
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// SHA-256 over length-prefixed descriptor fields
pub struct DescriptorHasher {
    hasher: Sha256,
}

impl DescriptorHasher {
    /// Start a descriptor with a kind tag
    pub fn new(kind: &str) -> Self {
        let mut hasher = Self {
            hasher: Sha256::new(),
        };
        hasher.str(kind);
        hasher
    }

    /// Add a string field
    pub fn str(&mut self, value: &str) -> &mut Self {
        self.hasher.update((value.len() as u32).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Add an integer field
    pub fn int(&mut self, value: i64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn finish(self) -> Digest {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// Descriptors
// =============================================================================

fn point_digest(point: &Point) -> Digest {
    let mut hasher = DescriptorHasher::new("point");
    hasher
        .int(point.depth as i64)
        .int(point.subtree_len() as i64)
        .str(&point.name)
        .str(&point.description);
    hasher.finish()
}

fn axis_digest(axis: &Axis, values: &[AxisValue]) -> Digest {
    let mut hasher = DescriptorHasher::new("axis");
    hasher.str(&axis.name).str(&axis.description);
    hasher.int(values.len() as i64);
    for value in values {
        hasher.str(&value.value);
    }
    hasher.finish()
}

fn goal_digest(goal: &Goal) -> Digest {
    let mut hasher = DescriptorHasher::new("goal");
    hasher
        .str(&goal.name)
        .str(&goal.description)
        .int(goal.target);
    hasher.finish()
}

/// Fingerprint of a readout's definition tables
///
/// Streams the tables: only one coverpoint's axes, goals and bucket goals are
/// held at a time.
pub fn definition_sha(readout: &dyn Readout) -> Result<String> {
    let mut chain = FingerprintChain::new();

    for point in readout.iter_points(RowRange::ALL) {
        let point = point?;
        chain = chain.link(&point_digest(&point));
        if point.is_group() {
            continue;
        }

        let values: Vec<AxisValue> = readout
            .iter_axis_values(RowRange::new(point.axis_value_start, point.axis_value_end))
            .collect::<Result<_>>()?;
        for axis in readout.iter_axes(RowRange::new(point.axis_start, point.axis_end)) {
            let axis = axis?;
            let from = axis.value_start.saturating_sub(point.axis_value_start);
            let to = axis.value_end.saturating_sub(point.axis_value_start);
            let own = values.get(from..to).unwrap_or(&[]);
            chain = chain.link(&axis_digest(&axis, own));
        }

        for goal in readout.iter_goals(RowRange::new(point.goal_start, point.goal_end)) {
            chain = chain.link(&goal_digest(&goal?));
        }

        let mut buckets = DescriptorHasher::new("buckets");
        for bucket_goal in
            readout.iter_bucket_goals(RowRange::new(point.bucket_start, point.bucket_end))
        {
            let bucket_goal = bucket_goal?;
            buckets.int(bucket_goal.goal as i64 - point.goal_start as i64);
        }
        chain = chain.link(&buckets.finish());
    }

    Ok(chain.hex())
}

/// Fingerprint of a record's declared context
///
/// Depends on the definition and on `source`/`source_key`, never on hit counts.
pub fn record_sha(def_sha: &str, source: &str, source_key: &str) -> String {
    let mut hasher = DescriptorHasher::new("record");
    hasher.str(def_sha).str(source).str(source_key);
    FingerprintChain::new().link(&hasher.finish()).hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(byte: u8) -> Digest {
        [byte; 32]
    }

    #[test]
    fn test_chain_determinism() {
        let digests = [digest(1), digest(2), digest(3)];
        assert_eq!(chain(&digests), chain(&digests));
    }

    #[test]
    fn test_chain_is_resumable() {
        let digests = [digest(1), digest(2), digest(3), digest(4)];
        let whole = chain(&digests);
        let head = chain(&digests[..2]);
        let resumed = FingerprintChain::resume(head)
            .link_all(&digests[2..])
            .finish();
        assert_eq!(whole, resumed);
    }

    #[test]
    fn test_chain_is_order_sensitive() {
        assert_ne!(chain(&[digest(1), digest(2)]), chain(&[digest(2), digest(1)]));
    }

    #[test]
    fn test_empty_chain_is_initial() {
        assert_eq!(chain(std::iter::empty()), CHAIN_INITIAL);
    }

    #[test]
    fn test_descriptor_fields_are_length_prefixed() {
        let mut a = DescriptorHasher::new("x");
        a.str("ab").str("c");
        let mut b = DescriptorHasher::new("x");
        b.str("a").str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_hex_is_64_chars() {
        let hex = FingerprintChain::new().link(&digest(9)).hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_record_sha_depends_on_context() {
        let base = record_sha("def", "", "");
        assert_eq!(base, record_sha("def", "", ""));
        assert_ne!(base, record_sha("def", "regress", ""));
        assert_ne!(base, record_sha("def", "", "42"));
        assert_ne!(base, record_sha("other", "", ""));
    }
}
