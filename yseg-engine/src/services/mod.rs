//! Segmentation services
//!
//! Pipeline stages in run order, and the orchestrator that drives them:
//! feature extraction → cluster solving → quality evaluation → segment
//! labeling → recommendation generation.

pub mod cluster_solver;
pub mod feature_extractor;
pub mod quality_evaluator;
pub mod recommendation_generator;
pub mod run_orchestrator;
pub mod segment_labeler;

pub use cluster_solver::{CandidateEvaluation, ClusterSolver, Partition, SolverOutput};
pub use feature_extractor::{ExtractedPopulation, FeatureExtractor, FeatureMatrix, SurveyResponseSource};
pub use quality_evaluator::{data_quality_score, evaluate_partition, PartitionQuality};
pub use recommendation_generator::{RecommendationDraft, RecommendationGenerator, PROGRAM_CATALOG};
pub use run_orchestrator::{RunHandle, RunOrchestrator};
pub use segment_labeler::{LabeledSegment, SegmentLabeler, SegmentStats};
