//! Cluster Solver
//!
//! Partitions the normalized feature matrix with k-means (Lloyd iterations,
//! k-means++ seeding) and picks the cluster count by silhouette.
//!
//! # Determinism
//! Every attempt draws from a `StdRng` seeded with the configured seed, the
//! candidate k and the restart index. Cluster indices are renumbered by first
//! appearance in row order, so identical input and parameters always give
//! identical labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{ClusteringParameters, FeatureVector, FEATURE_DIMENSIONS};
use crate::services::quality_evaluator::{inertia, silhouette_score};

/// Converged clustering of the matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cluster index per row, canonicalized (first row is cluster 0)
    pub labels: Vec<usize>,
    pub centroids: Vec<FeatureVector>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
    /// Lloyd iterations used
    pub iterations: usize,
}

impl Partition {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Number of rows in each cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Result of one k-means attempt
#[derive(Debug, Clone, PartialEq)]
pub enum KMeansOutcome {
    Converged(Partition),
    /// Iteration cap reached before the convergence predicate held
    NonConverged { iterations: usize },
}

/// Model-selection record for one candidate k
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvaluation {
    pub k: usize,
    pub converged: bool,
    pub silhouette: Option<f64>,
    pub inertia: Option<f64>,
}

/// Selected partition
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub k: usize,
    pub partition: Partition,
    /// Silhouette of the selected partition; 0.0 when degenerate
    pub quality_score: f64,
    /// True when the input had no usable spread and k fell back to 1
    pub degenerate: bool,
    pub candidates: Vec<CandidateEvaluation>,
}

/// Cluster Solver
pub struct ClusterSolver {
    params: ClusteringParameters,
}

impl ClusterSolver {
    pub fn new(params: ClusteringParameters) -> Self {
        Self { params }
    }

    /// Partition `vectors`, choosing k in the configured range
    pub fn solve(&self, vectors: &[FeatureVector]) -> EngineResult<SolverOutput> {
        if vectors.is_empty() {
            return Err(EngineError::InsufficientData {
                found: 0,
                required: self.params.required_population(),
            });
        }

        let distinct = distinct_count(vectors);
        let variance = mean_dimension_variance(vectors);
        if distinct < 2 || variance < self.params.min_variance {
            info!(
                distinct,
                variance, "Feature matrix has no usable spread, using a single segment"
            );
            return Ok(self.single_cluster(vectors));
        }

        let n = vectors.len();
        let upper = self.params.k_max.min(n - 1).min(distinct);
        let k_min = if upper < self.params.k_min {
            if upper < 2 {
                return Ok(self.single_cluster(vectors));
            }
            warn!(
                k_min = self.params.k_min,
                upper, "Population too small for the configured k range, only trying k={}", upper
            );
            upper
        } else {
            self.params.k_min
        };

        let mut candidates = Vec::new();
        let mut best: Option<(Partition, f64)> = None;

        for k in k_min..=upper {
            match self.best_of_restarts(vectors, k) {
                KMeansOutcome::Converged(partition) => {
                    let silhouette = silhouette_score(vectors, &partition.labels, k);
                    debug!(
                        k,
                        silhouette,
                        inertia = partition.inertia,
                        iterations = partition.iterations,
                        "Candidate evaluated"
                    );
                    candidates.push(CandidateEvaluation {
                        k,
                        converged: true,
                        silhouette: Some(silhouette),
                        inertia: Some(partition.inertia),
                    });

                    // A larger k has to clearly beat the incumbent
                    let better = match &best {
                        None => true,
                        Some((_, score)) => silhouette > score + self.params.selection_epsilon,
                    };
                    if better {
                        best = Some((partition, silhouette));
                    }
                }
                KMeansOutcome::NonConverged { iterations } => {
                    warn!(k, iterations, "k-means did not converge, candidate excluded");
                    candidates.push(CandidateEvaluation {
                        k,
                        converged: false,
                        silhouette: None,
                        inertia: None,
                    });
                }
            }
        }

        let (partition, quality_score) = best.ok_or_else(|| {
            EngineError::SolverFailure(format!(
                "no candidate k in {}..={} converged within {} iterations",
                k_min, upper, self.params.max_iterations
            ))
        })?;

        info!(k = partition.k(), silhouette = quality_score, "Selected cluster count");

        Ok(SolverOutput {
            k: partition.k(),
            partition,
            quality_score,
            degenerate: false,
            candidates,
        })
    }

    /// Best converged attempt over `n_init` seeded restarts (lowest inertia)
    pub fn best_of_restarts(&self, vectors: &[FeatureVector], k: usize) -> KMeansOutcome {
        let mut best: Option<Partition> = None;
        let mut last_iterations = 0;

        for restart in 0..self.params.n_init {
            match self.kmeans(vectors, k, restart) {
                KMeansOutcome::Converged(partition) => {
                    let improves = best
                        .as_ref()
                        .map_or(true, |b| partition.inertia < b.inertia);
                    if improves {
                        best = Some(partition);
                    }
                }
                KMeansOutcome::NonConverged { iterations } => last_iterations = iterations,
            }
        }

        match best {
            Some(partition) => KMeansOutcome::Converged(partition),
            None => KMeansOutcome::NonConverged {
                iterations: last_iterations,
            },
        }
    }

    /// One seeded k-means attempt
    pub fn kmeans(&self, vectors: &[FeatureVector], k: usize, restart: usize) -> KMeansOutcome {
        let mut rng = StdRng::seed_from_u64(attempt_seed(self.params.seed, k, restart));
        let mut centroids = kmeans_plus_plus(vectors, k, &mut rng);
        let mut labels = vec![0usize; vectors.len()];

        for iteration in 1..=self.params.max_iterations {
            for (label, vector) in labels.iter_mut().zip(vectors) {
                *label = nearest_centroid(vector, &centroids);
            }

            let reseeded = reseed_empty_clusters(vectors, &mut labels, &centroids);
            let updated = recompute_centroids(vectors, &labels, k);

            let max_shift = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| old.distance(new))
                .fold(0.0, f64::max);
            centroids = updated;

            if !reseeded && max_shift <= self.params.tolerance {
                let (labels, centroids) = canonicalize(&labels, centroids);
                let inertia = inertia(vectors, &labels, &centroids);
                return KMeansOutcome::Converged(Partition {
                    labels,
                    centroids,
                    inertia,
                    iterations: iteration,
                });
            }
        }

        KMeansOutcome::NonConverged {
            iterations: self.params.max_iterations,
        }
    }

    fn single_cluster(&self, vectors: &[FeatureVector]) -> SolverOutput {
        let labels = vec![0; vectors.len()];
        let centroids = vec![FeatureVector::mean(vectors)];
        let inertia = inertia(vectors, &labels, &centroids);
        SolverOutput {
            k: 1,
            partition: Partition {
                labels,
                centroids,
                inertia,
                iterations: 0,
            },
            quality_score: 0.0,
            degenerate: true,
            candidates: Vec::new(),
        }
    }
}

fn attempt_seed(seed: u64, k: usize, restart: usize) -> u64 {
    seed.wrapping_add((k as u64) << 32).wrapping_add(restart as u64)
}

/// k-means++: first center uniform, the rest with probability ∝ D²
fn kmeans_plus_plus(vectors: &[FeatureVector], k: usize, rng: &mut StdRng) -> Vec<FeatureVector> {
    let n = vectors.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(vectors[rng.gen_range(0..n)]);

    let mut closest: Vec<f64> = vectors
        .iter()
        .map(|v| v.squared_distance(&centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let index = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n - 1;
            for (i, d) in closest.iter().enumerate() {
                cumulative += d;
                if cumulative > target {
                    chosen = i;
                    break;
                }
            }
            chosen
        };

        let center = vectors[index];
        for (d, v) in closest.iter_mut().zip(vectors) {
            *d = d.min(v.squared_distance(&center));
        }
        centroids.push(center);
    }

    centroids
}

/// Index of the closest centroid; ties go to the lower index
fn nearest_centroid(vector: &FeatureVector, centroids: &[FeatureVector]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let d = vector.squared_distance(centroid);
        if d < best_distance {
            best = index;
            best_distance = d;
        }
    }
    best
}

/// Move the farthest point of a multi-member cluster into each empty cluster
///
/// Returns true if any cluster was reseeded.
fn reseed_empty_clusters(
    vectors: &[FeatureVector],
    labels: &mut [usize],
    centroids: &[FeatureVector],
) -> bool {
    let k = centroids.len();
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    let mut reseeded = false;
    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }
        let farthest = (0..vectors.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .map(|i| (i, vectors[i].squared_distance(&centroids[labels[i]])))
            .fold(None, |acc: Option<(usize, f64)>, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });

        if let Some((i, _)) = farthest {
            sizes[labels[i]] -= 1;
            labels[i] = empty;
            sizes[empty] = 1;
            reseeded = true;
        }
    }
    reseeded
}

fn recompute_centroids(vectors: &[FeatureVector], labels: &[usize], k: usize) -> Vec<FeatureVector> {
    (0..k)
        .map(|cluster| {
            FeatureVector::mean(
                vectors
                    .iter()
                    .zip(labels)
                    .filter(|(_, label)| **label == cluster)
                    .map(|(v, _)| v),
            )
        })
        .collect()
}

/// Renumber clusters by first appearance in row order
fn canonicalize(labels: &[usize], centroids: Vec<FeatureVector>) -> (Vec<usize>, Vec<FeatureVector>) {
    let mut mapping = vec![usize::MAX; centroids.len()];
    let mut order = Vec::with_capacity(centroids.len());
    for &label in labels {
        if mapping[label] == usize::MAX {
            mapping[label] = order.len();
            order.push(label);
        }
    }

    let relabeled = labels.iter().map(|&label| mapping[label]).collect();
    let reordered = order.into_iter().map(|old| centroids[old]).collect();
    (relabeled, reordered)
}

fn distinct_count(vectors: &[FeatureVector]) -> usize {
    vectors
        .iter()
        .map(|v| {
            let values = *v.as_array();
            values.map(f64::to_bits)
        })
        .collect::<BTreeSet<[u64; FEATURE_DIMENSIONS]>>()
        .len()
}

/// Mean over dimensions of the population variance
fn mean_dimension_variance(vectors: &[FeatureVector]) -> f64 {
    let mean = FeatureVector::mean(vectors);
    let n = vectors.len() as f64;
    let total: f64 = (0..FEATURE_DIMENSIONS)
        .map(|dim| vectors.iter().map(|v| (v[dim] - mean[dim]).powi(2)).sum::<f64>() / n)
        .sum();
    total / FEATURE_DIMENSIONS as f64
}
