//! yseg-engine library interface
//!
//! Clusters validated youth survey responses into labeled segments with
//! ranked program recommendations, and persists each run atomically.

pub mod audit;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::audit::{EventBusAuditSink, MultiAuditSink, RunAuditSink, TracingAuditSink};
pub use crate::error::{EngineError, EngineResult};
pub use crate::services::{RunHandle, RunOrchestrator};
