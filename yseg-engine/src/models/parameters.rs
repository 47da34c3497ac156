//! Clustering parameters
//!
//! Runtime settings, persisted in the `settings` table (see `db::parameters`).

use serde::{Deserialize, Serialize};
use yseg_common::{Error, Result};

/// Solver and extractor tuning for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParameters {
    /// Smallest candidate cluster count (default: 2)
    #[serde(default = "default_k_min")]
    pub k_min: usize,

    /// Largest candidate cluster count, further bounded by population (default: 8)
    #[serde(default = "default_k_max")]
    pub k_max: usize,

    /// Assign/update iteration cap per attempt (default: 300)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Max centroid shift that counts as converged (default: 1e-6)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Seed for k-means++ initialization (default: 42)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Restarts per candidate k; the lowest-inertia converged restart wins (default: 4)
    #[serde(default = "default_n_init")]
    pub n_init: usize,

    /// Minimum population for a clusterable run (default: 10)
    #[serde(default = "default_min_population")]
    pub min_population: usize,

    /// Mean per-dimension variance below which the data is degenerate (default: 1e-9)
    #[serde(default = "default_min_variance")]
    pub min_variance: f64,

    /// Silhouette gain a larger k needs over the best smaller k (default: 1e-6)
    #[serde(default = "default_selection_epsilon")]
    pub selection_epsilon: f64,
}

fn default_k_min() -> usize {
    2
}

fn default_k_max() -> usize {
    8
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_seed() -> u64 {
    42
}

fn default_n_init() -> usize {
    4
}

fn default_min_population() -> usize {
    10
}

fn default_min_variance() -> f64 {
    1e-9
}

fn default_selection_epsilon() -> f64 {
    1e-6
}

impl Default for ClusteringParameters {
    fn default() -> Self {
        Self {
            k_min: default_k_min(),
            k_max: default_k_max(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            seed: default_seed(),
            n_init: default_n_init(),
            min_population: default_min_population(),
            min_variance: default_min_variance(),
            selection_epsilon: default_selection_epsilon(),
        }
    }
}

impl ClusteringParameters {
    /// Smallest population the extractor accepts
    pub fn required_population(&self) -> usize {
        self.min_population.max(self.k_min + 1)
    }

    /// Reject settings the solver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.k_min < 2 {
            return Err(Error::Config(format!("k_min must be at least 2, got {}", self.k_min)));
        }
        if self.k_max < self.k_min {
            return Err(Error::Config(format!(
                "k_max ({}) must be >= k_min ({})",
                self.k_max, self.k_min
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be positive".to_string()));
        }
        if self.n_init == 0 {
            return Err(Error::Config("n_init must be positive".to_string()));
        }
        if !(self.tolerance >= 0.0 && self.tolerance.is_finite()) {
            return Err(Error::Config(format!("invalid tolerance {}", self.tolerance)));
        }
        if !(self.min_variance >= 0.0 && self.min_variance.is_finite()) {
            return Err(Error::Config(format!("invalid min_variance {}", self.min_variance)));
        }
        if !(self.selection_epsilon >= 0.0 && self.selection_epsilon.is_finite()) {
            return Err(Error::Config(format!(
                "invalid selection_epsilon {}",
                self.selection_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ClusteringParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.required_population(), 10);
    }

    #[test]
    fn test_required_population_respects_k_min() {
        let params = ClusteringParameters {
            k_min: 12,
            k_max: 14,
            min_population: 5,
            ..Default::default()
        };
        assert_eq!(params.required_population(), 13);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let params = ClusteringParameters {
            k_min: 5,
            k_max: 3,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ClusteringParameters {
            k_min: 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: ClusteringParameters = serde_json::from_str(r#"{"k_max": 5, "seed": 7}"#).unwrap();
        assert_eq!(params.k_max, 5);
        assert_eq!(params.seed, 7);
        assert_eq!(params.k_min, 2);
        assert_eq!(params.n_init, 4);
    }
}
