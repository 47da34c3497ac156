//! Fixed-shape feature vectors
//!
//! Every vector in a run has exactly `FEATURE_DIMENSIONS` finite values, so
//! the extractor and solver can never disagree about shape.

use serde::{Deserialize, Serialize};
use std::ops::Index;
use yseg_common::{Error, Result};

/// Number of dimensions per youth
pub const FEATURE_DIMENSIONS: usize = 4;

/// Dimension names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSIONS] =
    ["age", "education_level", "employment", "civic_engagement"];

/// Normalized numeric representation of one youth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_DIMENSIONS],
}

impl FeatureVector {
    /// Build from a slice, validating dimensionality and finiteness
    pub fn new(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_DIMENSIONS {
            return Err(Error::InvalidInput(format!(
                "feature vector must have {} dimensions, got {}",
                FEATURE_DIMENSIONS,
                values.len()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "feature '{}' is not finite: {}",
                FEATURE_NAMES[pos], values[pos]
            )));
        }

        let mut array = [0.0; FEATURE_DIMENSIONS];
        array.copy_from_slice(values);
        Ok(Self { values: array })
    }

    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_DIMENSIONS],
        }
    }

    pub fn as_array(&self) -> &[f64; FEATURE_DIMENSIONS] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    pub fn distance(&self, other: &FeatureVector) -> f64 {
        self.squared_distance(other).sqrt()
    }

    /// Component-wise mean of `vectors`; zeros for an empty slice
    pub fn mean<'a>(vectors: impl IntoIterator<Item = &'a FeatureVector>) -> FeatureVector {
        let mut sum = [0.0; FEATURE_DIMENSIONS];
        let mut count = 0usize;
        for vector in vectors {
            for (acc, v) in sum.iter_mut().zip(vector.values.iter()) {
                *acc += v;
            }
            count += 1;
        }
        if count > 0 {
            for acc in sum.iter_mut() {
                *acc /= count as f64;
            }
        }
        FeatureVector { values: sum }
    }
}

impl Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}
