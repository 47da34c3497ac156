//! Quality Evaluator
//!
//! Partition quality (silhouette, used for model selection and persisted as
//! the run's overall score) and data quality (completeness of the survey
//! input, reported for operators). Everything here is a pure function of its
//! inputs.
//!
//! # Silhouette
//! For youth `i` in cluster `A`:
//! - `a(i)` mean distance to the other members of `A`
//! - `b(i)` smallest mean distance to the members of any other cluster
//! - `s(i) = (b - a) / max(a, b)`, and 0 when `A` is a singleton
//!
//! The score is the mean of `s(i)` and lies in [-1, 1]. A partition with a
//! single cluster scores 0.0. Cost is O(n² · d) per partition.

use crate::models::{FeatureVector, SurveyResponse};

/// Quality figures of one partition
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionQuality {
    /// Mean silhouette over all youths, in [-1, 1]
    pub overall: f64,
    /// Mean silhouette per cluster index
    pub per_cluster: Vec<f64>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
}

/// Evaluate a partition given its labels and centroids
pub fn evaluate_partition(
    vectors: &[FeatureVector],
    labels: &[usize],
    centroids: &[FeatureVector],
) -> PartitionQuality {
    let k = centroids.len();
    let samples = silhouette_samples(vectors, labels, k);
    PartitionQuality {
        overall: mean_or_zero(&samples),
        per_cluster: cluster_silhouettes(&samples, labels, k),
        inertia: inertia(vectors, labels, centroids),
    }
}

/// Mean silhouette coefficient, clamped to [-1, 1]
pub fn silhouette_score(vectors: &[FeatureVector], labels: &[usize], k: usize) -> f64 {
    mean_or_zero(&silhouette_samples(vectors, labels, k)).clamp(-1.0, 1.0)
}

/// Silhouette coefficient of every youth
pub fn silhouette_samples(vectors: &[FeatureVector], labels: &[usize], k: usize) -> Vec<f64> {
    let n = vectors.len();
    if k < 2 || n == 0 {
        return vec![0.0; n];
    }

    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }

    let mut samples = Vec::with_capacity(n);
    let mut distance_sums = vec![0.0; k];
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            samples.push(0.0);
            continue;
        }

        distance_sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                distance_sums[labels[j]] += vectors[i].distance(&vectors[j]);
            }
        }

        let a = distance_sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| distance_sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let s = if !b.is_finite() {
            0.0
        } else {
            let denom = a.max(b);
            if denom <= 0.0 {
                0.0
            } else {
                (b - a) / denom
            }
        };
        samples.push(s.clamp(-1.0, 1.0));
    }
    samples
}

/// Mean silhouette per cluster; 0.0 for an empty cluster
pub fn cluster_silhouettes(samples: &[f64], labels: &[usize], k: usize) -> Vec<f64> {
    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (s, &label) in samples.iter().zip(labels) {
        sums[label] += s;
        counts[label] += 1;
    }
    sums.iter()
        .zip(&counts)
        .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect()
}

/// Within-cluster sum of squared distances to the centroid
pub fn inertia(vectors: &[FeatureVector], labels: &[usize], centroids: &[FeatureVector]) -> f64 {
    vectors
        .iter()
        .zip(labels)
        .map(|(v, &label)| v.squared_distance(&centroids[label]))
        .sum()
}

/// Completeness ratio of required survey fields across the population
///
/// Independent of clustering. Returns a value in [0, 1]; 0.0 for no input.
pub fn data_quality_score(responses: &[SurveyResponse]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    let present: usize = responses.iter().map(|r| r.completed_required_fields()).sum();
    let expected = responses.len() * SurveyResponse::REQUIRED_FIELDS;
    present as f64 / expected as f64
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkStatus;

    fn v(values: [f64; 4]) -> FeatureVector {
        FeatureVector::new(&values).unwrap()
    }

    fn two_blobs() -> (Vec<FeatureVector>, Vec<usize>) {
        let vectors = vec![
            v([0.0, 0.0, 0.0, 0.0]),
            v([0.02, 0.0, 0.0, 0.01]),
            v([0.01, 0.01, 0.0, 0.0]),
            v([1.0, 1.0, 1.0, 1.0]),
            v([0.98, 1.0, 1.0, 0.99]),
            v([0.99, 0.99, 1.0, 1.0]),
        ];
        (vectors, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_well_separated_clusters_score_high() {
        let (vectors, labels) = two_blobs();
        let score = silhouette_score(&vectors, &labels, 2);
        assert!(score > 0.9, "silhouette {} should be > 0.9", score);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_bad_partition_scores_lower_and_stays_bounded() {
        let (vectors, labels) = two_blobs();
        let mixed = vec![0, 1, 0, 1, 0, 1];
        let score = silhouette_score(&vectors, &mixed, 2);
        assert!((-1.0..=1.0).contains(&score));
        assert!(score < silhouette_score(&vectors, &labels, 2) - 0.5);
    }

    #[test]
    fn test_single_cluster_and_singletons_score_zero() {
        let (vectors, _) = two_blobs();
        assert_eq!(silhouette_score(&vectors, &[0; 6], 1), 0.0);

        let samples = silhouette_samples(&vectors, &[0, 1, 1, 1, 1, 1], 2);
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn test_silhouette_deterministic() {
        let (vectors, labels) = two_blobs();
        assert_eq!(
            silhouette_score(&vectors, &labels, 2),
            silhouette_score(&vectors, &labels, 2)
        );
    }

    #[test]
    fn test_evaluate_partition_reports_per_cluster_and_inertia() {
        let (vectors, labels) = two_blobs();
        let centroids = vec![
            FeatureVector::mean(&vectors[0..3]),
            FeatureVector::mean(&vectors[3..6]),
        ];
        let quality = evaluate_partition(&vectors, &labels, &centroids);

        assert_eq!(quality.per_cluster.len(), 2);
        assert!(quality.per_cluster.iter().all(|s| *s > 0.9));
        assert!(quality.inertia > 0.0 && quality.inertia < 0.01);
    }

    #[test]
    fn test_data_quality_score_is_completeness_ratio() {
        assert_eq!(data_quality_score(&[]), 0.0);

        let mut complete = SurveyResponse::new("r1", "y1", "BAR001");
        complete.age = Some(20);
        complete.education_level = Some(crate::models::EducationLevel::CollegeLevel);
        complete.work_status = Some(WorkStatus::Employed);
        complete.registered_sk_voter = Some(true);
        complete.voted_last_sk_election = Some(false);
        complete.attended_kk_assembly = Some(true);

        let empty = SurveyResponse::new("r2", "y2", "BAR001");
        assert_eq!(data_quality_score(&[complete.clone()]), 1.0);
        assert_eq!(data_quality_score(&[complete, empty]), 0.5);
    }
}
