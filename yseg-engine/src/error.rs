//! Error types for the segmentation engine
//!
//! Only `InvalidSelector` is rejected before a run row exists. Every other
//! variant is captured on the failed run's `error_message`.

use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed scope/barangay combination or missing request field
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Matching population is below the minimum clusterable size
    #[error("Insufficient data: found {found} validated responses, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    /// No candidate cluster count converged within the iteration cap
    #[error("Solver failure: {0}")]
    SolverFailure(String),

    /// The atomic write transaction failed and was rolled back
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// An enclosing limit expired before the run finished
    #[error("Run timed out after {0} seconds")]
    Timeout(u64),

    /// The survey response source could not be read
    #[error("Survey source error: {0}")]
    Source(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),

    /// yseg-common error
    #[error(transparent)]
    Common(#[from] yseg_common::Error),
}

impl EngineError {
    /// True for errors caused by the caller's request
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::InvalidSelector(_))
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidSelector(_) => "INVALID_SELECTOR",
            EngineError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            EngineError::SolverFailure(_) => "SOLVER_FAILURE",
            EngineError::Persistence(_) => "PERSISTENCE_FAILURE",
            EngineError::Timeout(_) => "TIMEOUT",
            EngineError::Source(_) => "SOURCE_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
            EngineError::Common(_) => "COMMON_ERROR",
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invalid_selector_is_client_error() {
        assert!(EngineError::InvalidSelector("x".into()).is_client_error());
        assert!(!EngineError::InsufficientData { found: 3, required: 10 }.is_client_error());
        assert!(!EngineError::Persistence("disk".into()).is_client_error());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = EngineError::InsufficientData { found: 3, required: 10 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: found 3 validated responses, at least 10 required"
        );
        assert_eq!(err.code(), "INSUFFICIENT_DATA");
    }
}
