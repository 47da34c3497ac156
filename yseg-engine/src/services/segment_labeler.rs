//! Segment Labeler
//!
//! Turns a partition into named, described and prioritized segments.
//! Statistics are computed over the raw survey attributes of each cluster's
//! members (known values only), not over the normalized vectors.

use tracing::debug;
use yseg_common::db::{Level, PriorityLevel, SegmentCharacteristics};

use crate::error::{EngineError, EngineResult};
use crate::models::{EducationLevel, FeatureVector, SurveyResponse};
use crate::services::cluster_solver::SolverOutput;
use crate::services::feature_extractor::ExtractedPopulation;
use crate::services::quality_evaluator::PartitionQuality;

/// Name given to the single segment of a degenerate partition
pub const UNDIFFERENTIATED_NAME: &str = "Undifferentiated Youth Population";

/// Education ordinal regarded as the baseline (high school graduate)
pub const EDUCATION_BASELINE: f64 = 3.0;

/// Descriptive statistics of one cluster
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub avg_age: f64,
    /// Mean education ordinal (see `EducationLevel::ordinal`)
    pub avg_education_level: f64,
    pub employment_rate: f64,
    pub civic_engagement_rate: f64,
    pub in_school_rate: f64,
    pub data_completeness: f64,
}

impl SegmentStats {
    /// Shortfall of education below the baseline, in [0, 1]
    pub fn education_gap(&self) -> f64 {
        ((EDUCATION_BASELINE - self.avg_education_level) / EDUCATION_BASELINE).clamp(0.0, 1.0)
    }

    /// Composite need used for priority ranking
    pub fn need_score(&self) -> f64 {
        (1.0 - self.employment_rate) + (1.0 - self.civic_engagement_rate) + self.education_gap()
    }
}

/// One member of a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMember {
    /// Row in the extracted population
    pub row: usize,
    pub distance_to_centroid: f64,
}

/// Labeled cluster ready for persistence
#[derive(Debug, Clone)]
pub struct LabeledSegment {
    pub cluster_index: usize,
    pub name: String,
    pub description: String,
    pub stats: SegmentStats,
    pub characteristics: SegmentCharacteristics,
    pub members: Vec<SegmentMember>,
    pub percentage: f64,
    pub priority: PriorityLevel,
    pub quality_score: f64,
}

impl LabeledSegment {
    pub fn youth_count(&self) -> usize {
        self.members.len()
    }
}

/// Segment Labeler
#[derive(Debug, Default)]
pub struct SegmentLabeler;

impl SegmentLabeler {
    pub fn new() -> Self {
        Self
    }

    /// Label every cluster of `solution`
    ///
    /// Every row of `population` appears in exactly one returned segment.
    pub fn label(
        &self,
        population: &ExtractedPopulation,
        solution: &SolverOutput,
        quality: &PartitionQuality,
    ) -> EngineResult<Vec<LabeledSegment>> {
        let vectors = &population.matrix.vectors;
        let labels = &solution.partition.labels;
        let centroids = &solution.partition.centroids;
        let total = labels.len();

        if total != population.responses.len() || total != vectors.len() {
            return Err(EngineError::Internal(format!(
                "partition covers {} rows but population has {}",
                total,
                population.responses.len()
            )));
        }

        let mut members: Vec<Vec<SegmentMember>> = vec![Vec::new(); solution.k];
        for (row, &label) in labels.iter().enumerate() {
            let centroid = centroids.get(label).ok_or_else(|| {
                EngineError::Internal(format!("row {} labeled with unknown cluster {}", row, label))
            })?;
            members[label].push(SegmentMember {
                row,
                distance_to_centroid: vectors[row].distance(centroid),
            });
        }

        let fallback_age = population.matrix.normalization.means[0];
        let fallback_education = population.matrix.normalization.means[1];

        let mut segments = Vec::with_capacity(solution.k);
        for (cluster_index, cluster_members) in members.into_iter().enumerate() {
            if cluster_members.is_empty() {
                return Err(EngineError::Internal(format!(
                    "cluster {} has no members",
                    cluster_index
                )));
            }

            let responses: Vec<&SurveyResponse> = cluster_members
                .iter()
                .map(|m| &population.responses[m.row])
                .collect();
            let stats = cluster_stats(&responses, fallback_age, fallback_education);
            let characteristics =
                characterize(&stats, &centroids[cluster_index], solution.degenerate);
            let percentage = round2(cluster_members.len() as f64 / total as f64 * 100.0);
            let quality_score = if solution.degenerate {
                0.0
            } else {
                quality.per_cluster.get(cluster_index).copied().unwrap_or(0.0)
            };

            let name = if solution.degenerate {
                UNDIFFERENTIATED_NAME.to_string()
            } else {
                base_name(&stats, &characteristics)
            };
            let description = describe(&stats, &characteristics, cluster_members.len(), percentage);

            segments.push(LabeledSegment {
                cluster_index,
                name,
                description,
                stats,
                characteristics,
                members: cluster_members,
                percentage,
                priority: PriorityLevel::Low,
                quality_score,
            });
        }

        disambiguate_names(&mut segments);
        assign_priorities(&mut segments);

        for segment in &segments {
            debug!(
                cluster = segment.cluster_index,
                name = %segment.name,
                youths = segment.youth_count(),
                priority = %segment.priority,
                "Segment labeled"
            );
        }

        Ok(segments)
    }
}

fn cluster_stats(responses: &[&SurveyResponse], fallback_age: f64, fallback_education: f64) -> SegmentStats {
    let ages = responses.iter().filter_map(|r| r.age.map(f64::from));
    let education = responses
        .iter()
        .filter_map(|r| r.education_level.map(|l| f64::from(l.ordinal())));
    let employment = responses.iter().filter_map(|r| r.employment_indicator());
    let civic = responses.iter().filter_map(|r| r.civic_engagement_score());
    let in_school = responses
        .iter()
        .filter_map(|r| r.in_school.map(|v| if v { 1.0 } else { 0.0 }));
    let completeness = responses
        .iter()
        .map(|r| r.completed_required_fields() as f64 / SurveyResponse::REQUIRED_FIELDS as f64);

    SegmentStats {
        avg_age: mean(ages).unwrap_or(fallback_age),
        avg_education_level: mean(education).unwrap_or(fallback_education),
        employment_rate: mean(employment).unwrap_or(0.0),
        civic_engagement_rate: mean(civic).unwrap_or(0.0),
        in_school_rate: mean(in_school).unwrap_or(0.0),
        data_completeness: mean(completeness).unwrap_or(0.0),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn level(rate: f64) -> Level {
    if rate >= 0.6 {
        Level::High
    } else if rate >= 0.3 {
        Level::Moderate
    } else {
        Level::Low
    }
}

/// (display word, band label) for an average age
fn age_band(avg_age: f64) -> (&'static str, &'static str) {
    if avg_age < 18.0 {
        ("Adolescents", "15-17")
    } else if avg_age < 25.0 {
        ("Young Adults", "18-24")
    } else {
        ("Adults", "25-30")
    }
}

fn characterize(stats: &SegmentStats, centroid: &FeatureVector, degenerate: bool) -> SegmentCharacteristics {
    let employment_level = level(stats.employment_rate);
    let civic_engagement_level = level(stats.civic_engagement_rate);
    let education = EducationLevel::nearest(stats.avg_education_level);

    let mut dominant_traits = Vec::new();
    match employment_level {
        Level::High => dominant_traits.push("mostly employed".to_string()),
        Level::Low => dominant_traits.push("mostly without work".to_string()),
        Level::Moderate => {}
    }
    match civic_engagement_level {
        Level::High => dominant_traits.push("high civic engagement".to_string()),
        Level::Low => dominant_traits.push("low civic engagement".to_string()),
        Level::Moderate => {}
    }
    if stats.in_school_rate >= 0.5 {
        dominant_traits.push("mostly in school".to_string());
    }
    if stats.education_gap() > 0.0 {
        dominant_traits.push("below high school graduate".to_string());
    }

    SegmentCharacteristics {
        age_band: age_band(stats.avg_age).1.to_string(),
        employment_level,
        civic_engagement_level,
        education_label: education.label().to_string(),
        in_school_rate: round2(stats.in_school_rate),
        dominant_traits,
        data_completeness: round2(stats.data_completeness),
        low_variance: degenerate,
        centroid: centroid.iter().copied().collect(),
    }
}

fn base_name(stats: &SegmentStats, characteristics: &SegmentCharacteristics) -> String {
    let employment = match characteristics.employment_level {
        Level::Low if stats.in_school_rate >= 0.5 => "Student",
        Level::High => "Employed",
        Level::Moderate => "Partly-Employed",
        Level::Low => "Unemployed",
    };
    let civic = match characteristics.civic_engagement_level {
        Level::High => "Civically-Active",
        Level::Moderate => "Moderately-Engaged",
        Level::Low => "Civically-Disengaged",
    };
    format!("{} {} {}", employment, civic, age_band(stats.avg_age).0)
}

fn describe(
    stats: &SegmentStats,
    characteristics: &SegmentCharacteristics,
    count: usize,
    percentage: f64,
) -> String {
    format!(
        "{} youths ({:.2}% of the population), average age {:.1}, {:.0}% employed, \
         {:.0}% civic engagement, typical education {}",
        count,
        percentage,
        stats.avg_age,
        stats.employment_rate * 100.0,
        stats.civic_engagement_rate * 100.0,
        characteristics.education_label
    )
}

/// Suffix " (Group n)" onto names shared by several segments
fn disambiguate_names(segments: &mut [LabeledSegment]) {
    let names: Vec<String> = segments.iter().map(|s| s.name.clone()).collect();
    let mut seen: Vec<(String, usize)> = Vec::new();

    for segment in segments.iter_mut() {
        let shared = names.iter().filter(|n| **n == segment.name).count() > 1;
        if !shared {
            continue;
        }
        let ordinal = match seen.iter_mut().find(|(name, _)| *name == segment.name) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                seen.push((segment.name.clone(), 1));
                1
            }
        };
        segment.name = format!("{} (Group {})", segment.name, ordinal);
    }
}

/// Terciles of need: highest need first, ties to the larger then earlier segment
fn assign_priorities(segments: &mut [LabeledSegment]) {
    let n = segments.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (&segments[a], &segments[b]);
        sb.stats
            .need_score()
            .total_cmp(&sa.stats.need_score())
            .then(sb.youth_count().cmp(&sa.youth_count()))
            .then(sa.cluster_index.cmp(&sb.cluster_index))
    });

    let high = n.div_ceil(3);
    let medium = (2 * n).div_ceil(3);
    for (position, index) in order.into_iter().enumerate() {
        segments[index].priority = if position < high {
            PriorityLevel::High
        } else if position < medium {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        };
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusteringParameters, WorkStatus};
    use crate::services::cluster_solver::ClusterSolver;
    use crate::services::feature_extractor::FeatureExtractor;
    use crate::services::quality_evaluator::evaluate_partition;

    fn response(i: usize, employed: bool, civic: bool, age: u32) -> SurveyResponse {
        let mut r = SurveyResponse::new(format!("r{:03}", i), format!("y{:03}", i), "BAR001");
        r.age = Some(age);
        r.education_level = Some(if employed {
            EducationLevel::CollegeGraduate
        } else {
            EducationLevel::HighSchoolLevel
        });
        r.work_status = Some(if employed {
            WorkStatus::Employed
        } else {
            WorkStatus::Unemployed
        });
        r.registered_sk_voter = Some(civic);
        r.voted_last_sk_election = Some(civic);
        r.attended_kk_assembly = Some(civic);
        r.in_school = Some(false);
        r
    }

    fn labeled(responses: Vec<SurveyResponse>) -> Vec<LabeledSegment> {
        let params = ClusteringParameters::default();
        let population = FeatureExtractor::new(&params).extract(responses).unwrap();
        let solution = ClusterSolver::new(params).solve(&population.matrix.vectors).unwrap();
        let quality = evaluate_partition(
            &population.matrix.vectors,
            &solution.partition.labels,
            &solution.partition.centroids,
        );
        SegmentLabeler::new().label(&population, &solution, &quality).unwrap()
    }

    /// 10 out-of-work disengaged teens and 20 employed active adults
    fn two_group_population() -> Vec<SurveyResponse> {
        (0..30)
            .map(|i| {
                if i % 3 == 0 {
                    response(i, false, false, 17)
                } else {
                    response(i, true, true, 25)
                }
            })
            .collect()
    }

    #[test]
    fn test_every_youth_in_exactly_one_segment() {
        let segments = labeled(two_group_population());
        let mut rows: Vec<usize> = segments
            .iter()
            .flat_map(|s| s.members.iter().map(|m| m.row))
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let segments = labeled(two_group_population());
        let total: f64 = segments.iter().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() <= 0.5, "percentages sum to {}", total);
    }

    #[test]
    fn test_needier_segment_gets_higher_priority() {
        let segments = labeled(two_group_population());
        assert_eq!(segments.len(), 2);

        let needy = segments
            .iter()
            .find(|s| s.stats.employment_rate < 0.5)
            .unwrap();
        let thriving = segments
            .iter()
            .find(|s| s.stats.employment_rate >= 0.5)
            .unwrap();
        assert_eq!(needy.priority, PriorityLevel::High);
        assert_eq!(thriving.priority, PriorityLevel::Medium);
        assert!(thriving.name.starts_with("Employed Civically-Active"));
        assert_eq!(needy.characteristics.employment_level, Level::Low);
    }

    #[test]
    fn test_identical_population_is_undifferentiated() {
        let responses = (0..40).map(|i| response(i, true, false, 20)).collect();
        let segments = labeled(responses);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].name, UNDIFFERENTIATED_NAME);
        assert!(segments[0].characteristics.low_variance);
        assert_eq!(segments[0].percentage, 100.0);
        assert_eq!(segments[0].quality_score, 0.0);
    }

    #[test]
    fn test_duplicate_names_get_group_suffix() {
        let stats = SegmentStats {
            avg_age: 20.0,
            avg_education_level: 5.0,
            employment_rate: 1.0,
            civic_engagement_rate: 1.0,
            in_school_rate: 0.0,
            data_completeness: 1.0,
        };
        let centroid = FeatureVector::zeros();
        let make = |index: usize| LabeledSegment {
            cluster_index: index,
            name: "Employed Civically-Active Young Adults".to_string(),
            description: String::new(),
            stats: stats.clone(),
            characteristics: characterize(&stats, &centroid, false),
            members: vec![SegmentMember {
                row: index,
                distance_to_centroid: 0.0,
            }],
            percentage: 50.0,
            priority: PriorityLevel::Low,
            quality_score: 0.0,
        };
        let mut segments = vec![make(0), make(1)];
        disambiguate_names(&mut segments);

        assert_eq!(segments[0].name, "Employed Civically-Active Young Adults (Group 1)");
        assert_eq!(segments[1].name, "Employed Civically-Active Young Adults (Group 2)");
    }

    #[test]
    fn test_priority_terciles() {
        let stats = |employment: f64| SegmentStats {
            avg_age: 20.0,
            avg_education_level: 5.0,
            employment_rate: employment,
            civic_engagement_rate: 0.5,
            in_school_rate: 0.0,
            data_completeness: 1.0,
        };
        let centroid = FeatureVector::zeros();
        let mut segments: Vec<LabeledSegment> = [0.9, 0.1, 0.5, 0.7]
            .iter()
            .enumerate()
            .map(|(i, &e)| LabeledSegment {
                cluster_index: i,
                name: format!("s{}", i),
                description: String::new(),
                stats: stats(e),
                characteristics: characterize(&stats(e), &centroid, false),
                members: vec![SegmentMember {
                    row: i,
                    distance_to_centroid: 0.0,
                }],
                percentage: 25.0,
                priority: PriorityLevel::Low,
                quality_score: 0.0,
            })
            .collect();
        assign_priorities(&mut segments);

        // n = 4: two high, one medium, one low
        let priorities: Vec<PriorityLevel> = segments.iter().map(|s| s.priority).collect();
        assert_eq!(
            priorities,
            vec![
                PriorityLevel::Low,
                PriorityLevel::High,
                PriorityLevel::High,
                PriorityLevel::Medium
            ]
        );
    }
}
