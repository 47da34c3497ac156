//! Audit sinks for observing orchestrator events

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use yseg_common::events::RunEvent;
use yseg_common::{Error, Result};
use yseg_engine::RunAuditSink;

/// Keeps every event it receives
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingAuditSink {
    pub fn actions(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(RunEvent::action).collect()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events are delivered by a background task; wait until `count` arrived
    pub async fn wait_for_events(&self, count: usize) -> Vec<RunEvent> {
        for _ in 0..500 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} audit events, got {:?}", count, self.actions());
    }
}

#[async_trait]
impl RunAuditSink for RecordingAuditSink {
    async fn record_run_event(&self, event: &RunEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Never finishes recording
pub struct StalledAuditSink;

#[async_trait]
impl RunAuditSink for StalledAuditSink {
    async fn record_run_event(&self, _event: &RunEvent) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Rejects every event
pub struct FailingAuditSink;

#[async_trait]
impl RunAuditSink for FailingAuditSink {
    async fn record_run_event(&self, _event: &RunEvent) -> Result<()> {
        Err(Error::Internal("audit store unavailable".to_string()))
    }
}
