//! Mixed-radix bucket addressing
//!
//! A coverpoint with axes of sizes `s0..sk-1` has `s0 * s1 * ... * sk-1`
//! buckets. Buckets are laid out row-major with the last declared axis varying
//! fastest:
//!
//! ```text
//! index = (((v0 * s1 + v1) * s2 + v2) ...) * sk-1 + vk-1
//! ```
//!
//! Decoding walks the axes from last to first, taking `index % si` and then
//! dividing by `si`.

use crate::error::{Error, Result};

/// Bucket space of a coverpoint, described by its axis sizes in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpace {
    sizes: Vec<usize>,
}

impl BucketSpace {
    /// Create a bucket space from axis sizes
    pub fn new(sizes: impl Into<Vec<usize>>) -> Self {
        Self {
            sizes: sizes.into(),
        }
    }

    /// Axis sizes in declaration order
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Total number of buckets (1 for a point with no axes)
    pub fn len(&self) -> usize {
        self.sizes.iter().product()
    }

    /// True if some axis has no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of the bucket at the given per-axis value offsets
    pub fn encode(&self, values: &[usize]) -> Result<usize> {
        if values.len() != self.sizes.len() {
            return Err(Error::InvalidBucket(format!(
                "expected {} axis values, got {}",
                self.sizes.len(),
                values.len()
            )));
        }
        let mut index = 0;
        for (axis, (&value, &size)) in values.iter().zip(&self.sizes).enumerate() {
            if value >= size {
                return Err(Error::InvalidBucket(format!(
                    "value {} out of range for axis {} of size {}",
                    value, axis, size
                )));
            }
            index = index * size + value;
        }
        Ok(index)
    }

    /// Per-axis value offsets of the bucket at a flat index
    pub fn decode(&self, index: usize) -> Result<Vec<usize>> {
        let len = self.len();
        if index >= len {
            return Err(Error::InvalidBucket(format!(
                "index {} out of range for {} buckets",
                index, len
            )));
        }
        let mut values = vec![0; self.sizes.len()];
        let mut rest = index;
        for (slot, &size) in values.iter_mut().zip(&self.sizes).rev() {
            *slot = rest % size;
            rest /= size;
        }
        Ok(values)
    }

    /// All value combinations in flat index order
    pub fn iter(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.len()).map(move |index| {
            let mut values = vec![0; self.sizes.len()];
            let mut rest = index;
            for (slot, &size) in values.iter_mut().zip(&self.sizes).rev() {
                *slot = rest % size;
                rest /= size;
            }
            values
        })
    }
}
