//! Feature Extractor
//!
//! Turns the validated survey responses of one selector into a normalized
//! feature matrix.
//!
//! # Dimensions
//! 1. **age** in years
//! 2. **education_level** ordinal (0 = elementary level .. 10 = doctorate graduate)
//! 3. **employment** indicator (1.0 employed / self-employed, else 0.0)
//! 4. **civic_engagement** fraction of known civic indicators that are true
//!
//! # Normalization
//! Missing raw values are imputed with the population mean of that dimension,
//! then every dimension is min-max scaled to [0, 1]. Both the means and the
//! min/max bounds are computed once over the whole run population, never per
//! youth, so distances between youths stay comparable. A dimension with no
//! spread scales to 0.0.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    ClusteringParameters, EducationLevel, FeatureVector, RunSelector, SurveyResponse,
    FEATURE_DIMENSIONS,
};

/// Upstream collaborator: read-only access to validated survey responses
#[async_trait]
pub trait SurveyResponseSource: Send + Sync {
    /// All responses with validation status `validated` matching the selector
    ///
    /// When a youth has several matching responses, the first one returned
    /// is the one clustered.
    async fn fetch_validated(&self, selector: &RunSelector) -> EngineResult<Vec<SurveyResponse>>;
}

/// Per-run normalization parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    /// Population mean of each raw dimension (used for imputation)
    pub means: [f64; FEATURE_DIMENSIONS],
    pub min: [f64; FEATURE_DIMENSIONS],
    pub max: [f64; FEATURE_DIMENSIONS],
}

impl Normalization {
    fn scale(&self, dim: usize, value: f64) -> f64 {
        let range = self.max[dim] - self.min[dim];
        if range <= f64::EPSILON {
            0.0
        } else {
            ((value - self.min[dim]) / range).clamp(0.0, 1.0)
        }
    }
}

/// Normalized feature matrix, one row per included youth
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub vectors: Vec<FeatureVector>,
    pub normalization: Normalization,
    /// Number of raw values filled in by mean imputation
    pub imputed_values: usize,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Responses included in a run and their feature matrix
///
/// `responses[i]` is the youth behind `matrix.vectors[i]`.
#[derive(Debug, Clone)]
pub struct ExtractedPopulation {
    pub responses: Vec<SurveyResponse>,
    pub matrix: FeatureMatrix,
    /// Responses dropped because the youth already had an included response
    pub duplicates_dropped: usize,
}

/// Feature Extractor
pub struct FeatureExtractor {
    required_population: usize,
}

impl FeatureExtractor {
    pub fn new(params: &ClusteringParameters) -> Self {
        Self {
            required_population: params.required_population(),
        }
    }

    /// Fetch validated responses for the selector (pure read)
    pub async fn fetch(
        &self,
        source: &dyn SurveyResponseSource,
        selector: &RunSelector,
    ) -> EngineResult<Vec<SurveyResponse>> {
        let responses = source.fetch_validated(selector).await?;
        debug!(
            scope_key = %selector.scope_key,
            fetched = responses.len(),
            "Fetched validated survey responses"
        );
        Ok(responses)
    }

    /// Build the normalized feature matrix
    ///
    /// Rows are ordered by youth id so the matrix is identical for identical
    /// input regardless of source ordering.
    pub fn extract(&self, responses: Vec<SurveyResponse>) -> EngineResult<ExtractedPopulation> {
        let fetched = responses.len();
        let responses = deduplicate_by_youth(responses);
        let duplicates_dropped = fetched - responses.len();

        if responses.len() < self.required_population {
            return Err(EngineError::InsufficientData {
                found: responses.len(),
                required: self.required_population,
            });
        }

        let raw: Vec<[Option<f64>; FEATURE_DIMENSIONS]> =
            responses.iter().map(raw_features).collect();

        let means = column_means(&raw);
        let mut imputed_values = 0;
        let filled: Vec<[f64; FEATURE_DIMENSIONS]> = raw
            .iter()
            .map(|row| {
                let mut values = [0.0; FEATURE_DIMENSIONS];
                for dim in 0..FEATURE_DIMENSIONS {
                    values[dim] = match row[dim] {
                        Some(v) => v,
                        None => {
                            imputed_values += 1;
                            means[dim]
                        }
                    };
                }
                values
            })
            .collect();

        let mut min = [f64::INFINITY; FEATURE_DIMENSIONS];
        let mut max = [f64::NEG_INFINITY; FEATURE_DIMENSIONS];
        for row in &filled {
            for dim in 0..FEATURE_DIMENSIONS {
                min[dim] = min[dim].min(row[dim]);
                max[dim] = max[dim].max(row[dim]);
            }
        }
        let normalization = Normalization { means, min, max };

        let vectors = filled
            .iter()
            .map(|row| {
                let scaled: Vec<f64> = row
                    .iter()
                    .enumerate()
                    .map(|(dim, value)| normalization.scale(dim, *value))
                    .collect();
                FeatureVector::new(&scaled)
            })
            .collect::<yseg_common::Result<Vec<_>>>()?;

        info!(
            youths = vectors.len(),
            duplicates_dropped,
            imputed_values,
            "Feature matrix extracted"
        );

        Ok(ExtractedPopulation {
            responses,
            matrix: FeatureMatrix {
                vectors,
                normalization,
                imputed_values,
            },
            duplicates_dropped,
        })
    }
}

/// Keep one response per youth (the first seen), ordered by youth id
fn deduplicate_by_youth(mut responses: Vec<SurveyResponse>) -> Vec<SurveyResponse> {
    // Stable sort keeps the source's preference order within each youth
    responses.sort_by(|a, b| a.youth_id.cmp(&b.youth_id));
    responses.dedup_by(|later, earlier| later.youth_id == earlier.youth_id);
    responses
}

fn raw_features(response: &SurveyResponse) -> [Option<f64>; FEATURE_DIMENSIONS] {
    [
        response.age.map(f64::from),
        response
            .education_level
            .map(|level: EducationLevel| f64::from(level.ordinal())),
        response.employment_indicator(),
        response.civic_engagement_score(),
    ]
}

/// Mean of the known values per dimension; 0.0 when a dimension is entirely unknown
fn column_means(raw: &[[Option<f64>; FEATURE_DIMENSIONS]]) -> [f64; FEATURE_DIMENSIONS] {
    let mut means = [0.0; FEATURE_DIMENSIONS];
    for (dim, mean) in means.iter_mut().enumerate() {
        let known: Vec<f64> = raw.iter().filter_map(|row| row[dim]).collect();
        if !known.is_empty() {
            *mean = known.iter().sum::<f64>() / known.len() as f64;
        }
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkStatus;

    fn response(youth: &str, age: u32, employed: bool, civic: bool) -> SurveyResponse {
        let mut r = SurveyResponse::new(format!("resp-{}", youth), youth, "BAR001");
        r.age = Some(age);
        r.education_level = Some(EducationLevel::HighSchoolGraduate);
        r.work_status = Some(if employed {
            WorkStatus::Employed
        } else {
            WorkStatus::Unemployed
        });
        r.registered_sk_voter = Some(civic);
        r.voted_last_sk_election = Some(civic);
        r.attended_kk_assembly = Some(civic);
        r
    }

    fn extractor(min_population: usize) -> FeatureExtractor {
        FeatureExtractor::new(&ClusteringParameters {
            min_population,
            ..Default::default()
        })
    }

    #[test]
    fn test_insufficient_population() {
        let responses = vec![response("y1", 18, true, true), response("y2", 20, false, false)];
        let err = extractor(3).extract(responses).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { found: 2, required: 3 }));
    }

    #[test]
    fn test_min_max_normalization_per_population() {
        let responses = vec![
            response("y1", 15, true, true),
            response("y2", 30, false, false),
            response("y3", 20, true, false),
        ];
        let population = extractor(3).extract(responses).unwrap();
        let vectors = &population.matrix.vectors;

        assert_eq!(vectors[0][0], 0.0);
        assert_eq!(vectors[1][0], 1.0);
        assert!((vectors[2][0] - 5.0 / 15.0).abs() < 1e-12);

        // Education is constant across the population
        assert!(vectors.iter().all(|v| v[1] == 0.0));

        for v in vectors {
            assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn test_missing_values_imputed_with_population_mean() {
        let mut incomplete = response("y3", 0, true, true);
        incomplete.age = None;
        let responses = vec![
            response("y1", 16, true, true),
            response("y2", 24, false, false),
            incomplete,
        ];
        let population = extractor(3).extract(responses).unwrap();

        assert_eq!(population.matrix.imputed_values, 1);
        assert_eq!(population.matrix.normalization.means[0], 20.0);
        assert!((population.matrix.vectors[2][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rows_sorted_and_deduplicated_by_youth() {
        let mut newer = response("y1", 25, true, true);
        newer.response_id = "resp-y1-newer".to_string();
        let responses = vec![
            response("y3", 18, true, true),
            newer,
            response("y2", 20, false, false),
            response("y1", 19, false, false),
        ];
        let population = extractor(3).extract(responses).unwrap();

        let ids: Vec<&str> = population.responses.iter().map(|r| r.youth_id.as_str()).collect();
        assert_eq!(ids, vec!["y1", "y2", "y3"]);
        assert_eq!(population.responses[0].response_id, "resp-y1-newer");
        assert_eq!(population.duplicates_dropped, 1);
        assert_eq!(population.matrix.len(), 3);
    }
}
