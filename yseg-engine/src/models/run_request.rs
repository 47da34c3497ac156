//! Run request and run result contracts
//!
//! JSON shapes exchanged with the surrounding controller use camelCase keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use yseg_common::db::{PriorityLevel, RunType, Scope, ScopeKey};

use crate::error::{EngineError, EngineResult};

/// Request to cluster one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub scope: Scope,
    /// Required iff scope == barangay
    #[serde(default)]
    pub barangay_id: Option<String>,
    /// Optional survey batch filter
    #[serde(default)]
    pub batch_id: Option<String>,
    /// User id recorded for audit
    pub triggered_by: String,
    pub run_type: RunType,
}

impl RunRequest {
    pub fn municipality(triggered_by: impl Into<String>) -> Self {
        Self {
            scope: Scope::Municipality,
            barangay_id: None,
            batch_id: None,
            triggered_by: triggered_by.into(),
            run_type: RunType::Manual,
        }
    }

    pub fn barangay(barangay_id: impl Into<String>, triggered_by: impl Into<String>) -> Self {
        Self {
            scope: Scope::Barangay,
            barangay_id: Some(barangay_id.into()),
            batch_id: None,
            triggered_by: triggered_by.into(),
            run_type: RunType::Manual,
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_run_type(mut self, run_type: RunType) -> Self {
        self.run_type = run_type;
        self
    }

    /// Check the scope/barangay combination and normalize blank ids
    ///
    /// Blank strings count as absent, so `barangayId: ""` on a barangay
    /// run is rejected just like `null`.
    pub fn validate(&self) -> EngineResult<RunSelector> {
        let barangay_id = normalize(&self.barangay_id);
        let batch_id = normalize(&self.batch_id);
        let triggered_by = self.triggered_by.trim();

        if triggered_by.is_empty() {
            return Err(EngineError::InvalidSelector(
                "triggeredBy must identify the requesting user".to_string(),
            ));
        }

        let scope_key = match (self.scope, barangay_id) {
            (Scope::Barangay, Some(barangay)) => ScopeKey::barangay(barangay, batch_id),
            (Scope::Barangay, None) => {
                return Err(EngineError::InvalidSelector(
                    "scope 'barangay' requires a barangayId".to_string(),
                ))
            }
            (Scope::Municipality, None) => ScopeKey::municipality(batch_id),
            (Scope::Municipality, Some(barangay)) => {
                return Err(EngineError::InvalidSelector(format!(
                    "scope 'municipality' must not specify a barangayId (got '{}')",
                    barangay
                )))
            }
        };

        Ok(RunSelector {
            scope_key,
            triggered_by: triggered_by.to_string(),
            run_type: self.run_type,
        })
    }
}

fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A validated run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSelector {
    pub scope_key: ScopeKey,
    pub triggered_by: String,
    pub run_type: RunType,
}

/// Segment entry of a run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub segment_id: Uuid,
    pub name: String,
    pub description: String,
    pub youth_count: usize,
    pub priority: PriorityLevel,
}

/// Metrics of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub overall_quality_score: f64,
    pub data_quality_score: f64,
    pub total_responses: usize,
    pub segments_created: usize,
    pub duration_seconds: f64,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: Uuid,
    pub segments: Vec<SegmentSummary>,
    pub metrics: RunMetrics,
}

/// Terminal outcome of a run
///
/// A caller never sees a partially populated result: either the run
/// completed with all of its segments, or it failed with a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    Completed(RunResult),
    #[serde(rename_all = "camelCase")]
    Failed {
        run_id: Uuid,
        error_code: String,
        error_message: String,
    },
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunOutcome::Completed(result) => result.run_id,
            RunOutcome::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// The completed result, if any
    pub fn completed(&self) -> Option<&RunResult> {
        match self {
            RunOutcome::Completed(result) => Some(result),
            RunOutcome::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barangay_scope_requires_barangay_id() {
        let mut request = RunRequest::barangay("BAR001", "admin");
        request.barangay_id = None;
        assert!(matches!(request.validate(), Err(EngineError::InvalidSelector(_))));

        request.barangay_id = Some("   ".to_string());
        assert!(matches!(request.validate(), Err(EngineError::InvalidSelector(_))));
    }

    #[test]
    fn test_municipality_scope_forbids_barangay_id() {
        let mut request = RunRequest::municipality("admin");
        request.barangay_id = Some("BAR001".to_string());
        assert!(matches!(request.validate(), Err(EngineError::InvalidSelector(_))));
    }

    #[test]
    fn test_triggered_by_required() {
        let request = RunRequest::municipality("  ");
        assert!(request.validate().unwrap_err().is_client_error());
    }

    #[test]
    fn test_valid_selector_normalizes_ids() {
        let request = RunRequest::barangay(" BAR001 ", "admin").with_batch("");
        let selector = request.validate().unwrap();
        assert_eq!(selector.scope_key, ScopeKey::barangay("BAR001", None));
        assert_eq!(selector.run_type, RunType::Manual);
    }

    #[test]
    fn test_request_json_shape() {
        let request: RunRequest = serde_json::from_str(
            r#"{"scope":"barangay","barangayId":"BAR002","batchId":null,"triggeredBy":"u-1","runType":"scheduled"}"#,
        )
        .unwrap();
        assert_eq!(request.scope, Scope::Barangay);
        assert_eq!(request.barangay_id.as_deref(), Some("BAR002"));
        assert_eq!(request.run_type, RunType::Scheduled);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = RunOutcome::Failed {
            run_id: Uuid::nil(),
            error_code: "INSUFFICIENT_DATA".to_string(),
            error_message: "too few".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["errorCode"], "INSUFFICIENT_DATA");
        assert!(!outcome.is_completed());
    }
}
