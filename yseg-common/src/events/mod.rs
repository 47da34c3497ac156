//! Run event types and the broadcast EventBus
//!
//! The engine emits one event when a run starts and one when it reaches a
//! terminal state. Audit and notification collaborators subscribe; emission
//! never blocks or fails a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::{RunType, ScopeKey};

/// Run lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// Run row created in `running` state
    RunStarted {
        run_id: Uuid,
        scope_key: ScopeKey,
        run_type: RunType,
        triggered_by: String,
        timestamp: DateTime<Utc>,
    },

    /// Run committed its segments and became the active partition
    RunCompleted {
        run_id: Uuid,
        scope_key: ScopeKey,
        triggered_by: String,
        total_responses: usize,
        segments_created: usize,
        segments_deactivated: usize,
        overall_quality_score: f64,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Run failed; no artifacts were persisted
    RunFailed {
        run_id: Uuid,
        scope_key: ScopeKey,
        triggered_by: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// Short event name used as the audit action
    pub fn action(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "clustering_run_started",
            RunEvent::RunCompleted { .. } => "clustering_run_completed",
            RunEvent::RunFailed { .. } => "clustering_run_failed",
        }
    }
}

/// Broadcast bus for run events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start losing the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RunEvent) -> Result<usize, broadcast::error::SendError<RunEvent>> {
        self.tx.send(event)
    }
}
