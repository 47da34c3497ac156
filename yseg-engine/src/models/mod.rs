//! Data models for the segmentation engine
//!
//! - Survey input records and their typed attributes
//! - Fixed-shape feature vectors
//! - Clustering parameters
//! - Run request / result contracts

pub mod feature_vector;
pub mod parameters;
pub mod run_request;
pub mod survey;

pub use feature_vector::{FeatureVector, FEATURE_DIMENSIONS, FEATURE_NAMES};
pub use parameters::ClusteringParameters;
pub use run_request::{RunMetrics, RunOutcome, RunRequest, RunResult, RunSelector, SegmentSummary};
pub use survey::{EducationLevel, SurveyResponse, WorkStatus};
