//! Run audit sinks
//!
//! The orchestrator reports run lifecycle events to a `RunAuditSink`. Audit
//! storage itself belongs to another subsystem; a failing sink is logged and
//! never changes a run's outcome.
//!
//! Events reach the sink through a forwarder task, so a slow or stalled sink
//! never holds up a run. Per-orchestrator event order is preserved.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use yseg_common::events::{EventBus, RunEvent};
use yseg_common::Result;

/// Downstream collaborator notified of run lifecycle events
#[async_trait]
pub trait RunAuditSink: Send + Sync {
    async fn record_run_event(&self, event: &RunEvent) -> Result<()>;
}

/// Writes audit records to the structured log
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl RunAuditSink for TracingAuditSink {
    async fn record_run_event(&self, event: &RunEvent) -> Result<()> {
        match event {
            RunEvent::RunStarted {
                run_id,
                scope_key,
                run_type,
                triggered_by,
                ..
            } => info!(
                action = event.action(),
                run_id = %run_id,
                scope_key = %scope_key,
                run_type = %run_type,
                triggered_by = %triggered_by,
                "audit"
            ),
            RunEvent::RunCompleted {
                run_id,
                scope_key,
                triggered_by,
                segments_created,
                segments_deactivated,
                overall_quality_score,
                ..
            } => info!(
                action = event.action(),
                run_id = %run_id,
                scope_key = %scope_key,
                triggered_by = %triggered_by,
                segments_created,
                segments_deactivated,
                overall_quality_score,
                "audit"
            ),
            RunEvent::RunFailed {
                run_id,
                scope_key,
                triggered_by,
                error,
                ..
            } => info!(
                action = event.action(),
                run_id = %run_id,
                scope_key = %scope_key,
                triggered_by = %triggered_by,
                error = %error,
                "audit"
            ),
        }
        Ok(())
    }
}

/// Broadcasts run events on the shared EventBus
#[derive(Debug, Clone)]
pub struct EventBusAuditSink {
    event_bus: EventBus,
}

impl EventBusAuditSink {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl RunAuditSink for EventBusAuditSink {
    async fn record_run_event(&self, event: &RunEvent) -> Result<()> {
        // No subscribers is not a failure; the event is simply not observed
        if self.event_bus.emit(event.clone()).is_err() {
            debug!(action = event.action(), "No event bus subscribers for run event");
        }
        Ok(())
    }
}

/// Fans one event out to several sinks
///
/// Every sink is tried; the first error is returned after all have run.
#[derive(Clone, Default)]
pub struct MultiAuditSink {
    sinks: Vec<Arc<dyn RunAuditSink>>,
}

impl MultiAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn RunAuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl RunAuditSink for MultiAuditSink {
    async fn record_run_event(&self, event: &RunEvent) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_run_event(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Start the forwarder task and return the queue feeding it
///
/// Must be called from within a Tokio runtime. The task stops once every
/// sender is dropped and the queue is drained.
pub fn spawn_audit_forwarder(
    sink: Arc<dyn RunAuditSink>,
) -> (mpsc::UnboundedSender<RunEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_audit_forwarder(rx, sink));
    (tx, task)
}

/// Deliver queued events to `sink` one at a time
///
/// # Behavior
/// - Sink errors are logged at warn and the event is dropped
/// - Runs until the sending side is dropped
pub async fn run_audit_forwarder(
    mut rx: mpsc::UnboundedReceiver<RunEvent>,
    sink: Arc<dyn RunAuditSink>,
) {
    debug!("Audit forwarder started");

    while let Some(event) = rx.recv().await {
        if let Err(e) = sink.record_run_event(&event).await {
            warn!(
                run_id = %event.run_id(),
                action = event.action(),
                error = %e,
                "Audit sink rejected run event"
            );
        }
    }

    debug!("Audit forwarder stopped");
}
