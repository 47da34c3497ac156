//! CPU-bound analysis stages
//!
//! Extract → solve → evaluate → label → recommend. Runs on the blocking
//! pool; touches no shared state.

use std::time::Instant;
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::models::{ClusteringParameters, SurveyResponse};
use crate::services::cluster_solver::{ClusterSolver, SolverOutput};
use crate::services::feature_extractor::{ExtractedPopulation, FeatureExtractor};
use crate::services::quality_evaluator::{data_quality_score, evaluate_partition, PartitionQuality};
use crate::services::recommendation_generator::{RecommendationDraft, RecommendationGenerator};
use crate::services::segment_labeler::{LabeledSegment, SegmentLabeler};

/// Everything a run computes before persistence
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    pub population: ExtractedPopulation,
    pub solution: SolverOutput,
    pub quality: PartitionQuality,
    pub data_quality: f64,
    pub segments: Vec<LabeledSegment>,
    /// Drafts per segment, parallel to `segments`
    pub recommendations: Vec<Vec<RecommendationDraft>>,
}

impl RunAnalysis {
    pub fn total_responses(&self) -> usize {
        self.population.responses.len()
    }
}

/// Run every analysis stage over the fetched responses
pub fn analyze(
    responses: Vec<SurveyResponse>,
    params: &ClusteringParameters,
) -> EngineResult<RunAnalysis> {
    let start = Instant::now();

    let population = FeatureExtractor::new(params).extract(responses)?;
    let data_quality = data_quality_score(&population.responses);

    let solution = ClusterSolver::new(params.clone()).solve(&population.matrix.vectors)?;
    let quality = evaluate_partition(
        &population.matrix.vectors,
        &solution.partition.labels,
        &solution.partition.centroids,
    );
    debug!(
        k = solution.k,
        silhouette = solution.quality_score,
        inertia = quality.inertia,
        degenerate = solution.degenerate,
        "Partition evaluated"
    );

    let segments = SegmentLabeler::new().label(&population, &solution, &quality)?;

    let generator = RecommendationGenerator::new();
    let recommendations: Vec<Vec<RecommendationDraft>> =
        segments.iter().map(|segment| generator.recommend(segment)).collect();

    info!(
        youths = population.responses.len(),
        k = solution.k,
        silhouette = solution.quality_score,
        data_quality,
        recommendations = recommendations.iter().map(Vec::len).sum::<usize>(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Analysis complete"
    );

    Ok(RunAnalysis {
        population,
        solution,
        quality,
        data_quality,
        segments,
        recommendations,
    })
}
