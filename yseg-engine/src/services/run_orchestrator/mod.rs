//! Clustering run orchestrator
//!
//! Coordinates one run from request to terminal state.
//!
//! # State Progression
//! (validate) → RUNNING → {COMPLETED, FAILED}
//!
//! A rejected request creates no run row. Once the row exists, every error
//! ends in FAILED with an error message and no persisted artifacts; success
//! commits all artifacts and the COMPLETED status in one transaction.
//!
//! # Phases
//! - **analysis** (`phase_analysis`): extract, solve, evaluate, label,
//!   recommend. CPU-bound, runs on the blocking pool.
//! - **persistence** (`phase_persistence`): assemble rows, atomic commit with
//!   supersession of the scope key's active segments.
//!
//! The run timeout bounds fetch and analysis only. A commit that has been
//! sent may still be applied after its future is dropped, so the commit is
//! never cut short; lock waits inside it are bounded separately.
//!
//! Audit events are queued to a forwarder task and never awaited by a run.
//!
//! Runs share no in-memory state. Runs for different scope keys proceed in
//! parallel; runs for the same key serialize at the write transaction and
//! the last commit wins.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use yseg_common::db::{ClusteringRun, RunStatus};
use yseg_common::events::RunEvent;

use crate::audit::{spawn_audit_forwarder, RunAuditSink};
use crate::db::responses::SqliteResponseSource;
use crate::db::{parameters, runs, settings};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ClusteringParameters, RunMetrics, RunOutcome, RunRequest, RunResult, RunSelector,
    SegmentSummary,
};
use crate::services::feature_extractor::{FeatureExtractor, SurveyResponseSource};

mod phase_analysis;
mod phase_persistence;

pub use phase_analysis::{analyze, RunAnalysis};
pub use phase_persistence::{assemble, RunArtifacts};

/// Handle of a run submitted in asynchronous mode
#[derive(Debug)]
pub struct RunHandle {
    /// Id of the run row, already in `running` state
    pub run_id: Uuid,
    /// Resolves to the terminal outcome
    pub outcome: JoinHandle<EngineResult<RunOutcome>>,
}

impl RunHandle {
    /// Wait for the run to reach a terminal state
    pub async fn wait(self) -> EngineResult<RunOutcome> {
        let run_id = self.run_id;
        self.outcome
            .await
            .map_err(|e| EngineError::Internal(format!("run task {} aborted: {}", run_id, e)))?
    }
}

/// Successful processing, ready to report
struct CompletedRun {
    run: ClusteringRun,
    artifacts: RunArtifacts,
    data_quality: f64,
    segments_deactivated: u64,
}

/// Run orchestrator service
pub struct RunOrchestrator {
    db: SqlitePool,
    source: Arc<dyn SurveyResponseSource>,
    audit_tx: mpsc::UnboundedSender<RunEvent>,
    audit_task: JoinHandle<()>,
    params: ClusteringParameters,
    run_timeout: Option<Duration>,
}

impl RunOrchestrator {
    /// Create a run orchestrator
    ///
    /// # Arguments
    /// * `db` - Pool of the segmentation database (run history and artifacts)
    /// * `source` - Validated survey responses
    /// * `audit` - Receives run lifecycle events
    /// * `params` - Clustering parameters applied to every run
    ///
    /// Rejects parameters that fail validation. Must be called from within a
    /// Tokio runtime, which hosts the audit forwarder.
    pub fn new(
        db: SqlitePool,
        source: Arc<dyn SurveyResponseSource>,
        audit: Arc<dyn RunAuditSink>,
        params: ClusteringParameters,
    ) -> EngineResult<Self> {
        params.validate()?;
        let (audit_tx, audit_task) = spawn_audit_forwarder(audit);

        Ok(Self {
            db,
            source,
            audit_tx,
            audit_task,
            params,
            run_timeout: None,
        })
    }

    /// Orchestrator reading responses and parameters from the same database
    pub async fn from_database(db: SqlitePool, audit: Arc<dyn RunAuditSink>) -> EngineResult<Self> {
        let params = parameters::load_clustering_parameters(&db).await?;
        let source = Arc::new(SqliteResponseSource::new(db.clone()));
        Self::new(db, source, audit, params)
    }

    /// Fail runs whose fetch and analysis take longer than `limit`
    pub fn with_run_timeout(mut self, limit: Duration) -> Self {
        self.run_timeout = Some(limit);
        self
    }

    /// Stop accepting audit events and wait until queued ones are delivered
    ///
    /// Runs still holding an `Arc` of this orchestrator keep the queue open,
    /// so call this once they are done.
    pub async fn close(self) {
        let Self {
            audit_tx, audit_task, ..
        } = self;
        drop(audit_tx);
        if let Err(e) = audit_task.await {
            warn!(error = %e, "Audit forwarder ended abnormally");
        }
    }

    pub fn params(&self) -> &ClusteringParameters {
        &self.params
    }

    /// Check a request without side effects
    pub fn validate_request(&self, request: &RunRequest) -> EngineResult<RunSelector> {
        request.validate()
    }

    /// Execute a run and wait for its terminal outcome
    ///
    /// Returns `Err` only when no run row could be created (invalid request
    /// or the run history is unwritable) or the failure itself could not be
    /// recorded. Every processing error yields `Ok(RunOutcome::Failed)`.
    pub async fn execute_run(&self, request: &RunRequest) -> EngineResult<RunOutcome> {
        let (run, selector) = self.start(request).await?;
        self.drive(run, selector).await
    }

    /// Start a run and return its id without waiting for the outcome
    pub async fn submit_run(self: &Arc<Self>, request: &RunRequest) -> EngineResult<RunHandle> {
        let (run, selector) = self.start(request).await?;
        let run_id = run.run_id;

        let orchestrator = Arc::clone(self);
        let outcome = tokio::spawn(async move { orchestrator.drive(run, selector).await });

        Ok(RunHandle { run_id, outcome })
    }

    /// Validate, insert the `running` row, announce the start
    async fn start(&self, request: &RunRequest) -> EngineResult<(ClusteringRun, RunSelector)> {
        let selector = self.validate_request(request).map_err(|e| {
            warn!(error = %e, "Run request rejected");
            e
        })?;

        let run = ClusteringRun::start(
            selector.scope_key.clone(),
            selector.run_type,
            selector.triggered_by.clone(),
        );
        runs::insert_run(&self.db, &run)
            .await
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        info!(
            run_id = %run.run_id,
            scope_key = %run.scope_key,
            run_type = %run.run_type,
            triggered_by = %run.triggered_by,
            "Clustering run started"
        );

        self.record(RunEvent::RunStarted {
            run_id: run.run_id,
            scope_key: run.scope_key.clone(),
            run_type: run.run_type,
            triggered_by: run.triggered_by.clone(),
            timestamp: run.started_at,
        });

        Ok((run, selector))
    }

    /// Take a `running` run to its terminal state
    async fn drive(&self, run: ClusteringRun, selector: RunSelector) -> EngineResult<RunOutcome> {
        let analysis = match self.analyze_within_limit(&selector).await {
            Ok(analysis) => analysis,
            Err(e) => return self.fail(run, e).await,
        };

        match self.persist(&run, analysis).await {
            Ok(completed) => Ok(self.complete(completed)),
            Err(e) => self.fail(run, e).await,
        }
    }

    /// Fetch and analyze, bounded by the run timeout
    async fn analyze_within_limit(&self, selector: &RunSelector) -> EngineResult<RunAnalysis> {
        let analysis = self.fetch_and_analyze(selector);
        match self.run_timeout {
            Some(limit) => tokio::time::timeout(limit, analysis)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_secs()))?,
            None => analysis.await,
        }
    }

    async fn fetch_and_analyze(&self, selector: &RunSelector) -> EngineResult<RunAnalysis> {
        let extractor = FeatureExtractor::new(&self.params);
        let responses = extractor.fetch(self.source.as_ref(), selector).await?;

        let params = self.params.clone();
        tokio::task::spawn_blocking(move || analyze(responses, &params))
            .await
            .map_err(|e| EngineError::Internal(format!("analysis task failed: {}", e)))?
    }

    /// Assemble rows and commit them with the COMPLETED status
    async fn persist(
        &self,
        run: &ClusteringRun,
        analysis: RunAnalysis,
    ) -> EngineResult<CompletedRun> {
        let artifacts = assemble(run, &analysis);

        let mut completed = run.clone();
        completed.total_responses = analysis.total_responses() as i64;
        completed.segments_created = artifacts.segments.len() as i64;
        completed.overall_quality_score = Some(analysis.solution.quality_score);
        completed.data_quality_score = Some(analysis.data_quality);
        completed.selected_k = Some(analysis.solution.k as i64);
        completed.transition_to(RunStatus::Completed)?;

        let max_wait_ms = self.max_lock_wait_ms().await;
        let segments_deactivated =
            phase_persistence::commit(&self.db, &completed, &artifacts, max_wait_ms).await?;

        Ok(CompletedRun {
            run: completed,
            artifacts,
            data_quality: analysis.data_quality,
            segments_deactivated,
        })
    }

    fn complete(&self, completed: CompletedRun) -> RunOutcome {
        let CompletedRun {
            run,
            artifacts,
            data_quality,
            segments_deactivated,
        } = completed;

        let overall_quality_score = run.overall_quality_score.unwrap_or(0.0);
        let duration_seconds = run.duration_seconds.unwrap_or(0.0);
        let total_responses = run.total_responses as usize;
        let segments_created = artifacts.segments.len();

        info!(
            run_id = %run.run_id,
            scope_key = %run.scope_key,
            total_responses,
            segments_created,
            segments_deactivated,
            overall_quality_score,
            duration_seconds,
            "Clustering run completed"
        );

        self.record(RunEvent::RunCompleted {
            run_id: run.run_id,
            scope_key: run.scope_key.clone(),
            triggered_by: run.triggered_by.clone(),
            total_responses,
            segments_created,
            segments_deactivated: segments_deactivated as usize,
            overall_quality_score,
            duration_seconds,
            timestamp: run.completed_at.unwrap_or(run.started_at),
        });

        let segments = artifacts
            .segments
            .iter()
            .map(|segment| SegmentSummary {
                segment_id: segment.segment_id,
                name: segment.name.clone(),
                description: segment.description.clone(),
                youth_count: segment.youth_count as usize,
                priority: segment.priority,
            })
            .collect();

        RunOutcome::Completed(RunResult {
            run_id: run.run_id,
            segments,
            metrics: RunMetrics {
                overall_quality_score,
                data_quality_score: data_quality,
                total_responses,
                segments_created,
                duration_seconds,
            },
        })
    }

    /// Record the failure on the run row and report it
    async fn fail(&self, mut run: ClusteringRun, cause: EngineError) -> EngineResult<RunOutcome> {
        let error_code = cause.code();
        let error_message = cause.to_string();

        if let EngineError::InsufficientData { found, .. } = &cause {
            run.total_responses = *found as i64;
        }
        run.error_message = Some(error_message.clone());
        run.transition_to(RunStatus::Failed)?;

        match runs::mark_failed(&self.db, &run).await {
            Ok(true) => {}
            Ok(false) => warn!(run_id = %run.run_id, "Run was no longer running when marked failed"),
            Err(e) => {
                error!(run_id = %run.run_id, error = %e, "Failed to record run failure");
                return Err(EngineError::Persistence(e.to_string()));
            }
        }

        warn!(
            run_id = %run.run_id,
            scope_key = %run.scope_key,
            error_code,
            error = %error_message,
            "Clustering run failed"
        );

        self.record(RunEvent::RunFailed {
            run_id: run.run_id,
            scope_key: run.scope_key.clone(),
            triggered_by: run.triggered_by.clone(),
            error: error_message.clone(),
            timestamp: run.completed_at.unwrap_or(run.started_at),
        });

        Ok(RunOutcome::Failed {
            run_id: run.run_id,
            error_code: error_code.to_string(),
            error_message,
        })
    }

    /// Queue an audit event; delivery never blocks or fails the run
    fn record(&self, event: RunEvent) {
        if let Err(mpsc::error::SendError(event)) = self.audit_tx.send(event) {
            warn!(
                run_id = %event.run_id(),
                action = event.action(),
                "Audit forwarder stopped, run event dropped"
            );
        }
    }

    async fn max_lock_wait_ms(&self) -> u64 {
        settings::get_max_lock_wait_ms(&self.db)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default lock wait");
                settings::DEFAULT_MAX_LOCK_WAIT_MS
            })
    }
}
