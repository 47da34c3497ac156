//! Clustering run history
//!
//! A run row is inserted in `running` state before any work starts and is
//! updated exactly once to a terminal state. Terminal updates carry a
//! `status = 'running'` guard so a finished run can never be rewritten.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use yseg_common::db::{ClusteringRun, Scope, ScopeKey};
use yseg_common::Result;

use super::{format_timestamp, parse_text, parse_timestamp, parse_uuid};
use crate::db::settings::get_max_lock_wait_ms;
use crate::utils::retry_on_lock;

const RUN_COLUMNS: &str = "run_id, run_type, scope, barangay_id, batch_id, status, \
     total_responses, segments_created, overall_quality_score, data_quality_score, \
     selected_k, started_at, completed_at, duration_seconds, triggered_by, error_message";

/// Insert a new run row
///
/// Uses retry_on_lock since concurrent runs may be committing.
pub async fn insert_run(pool: &SqlitePool, run: &ClusteringRun) -> Result<()> {
    // Prepare all data before acquiring a connection
    let run_id = run.run_id.to_string();
    let started_at = format_timestamp(&run.started_at);
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    retry_on_lock("insert_run", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO clustering_runs (
                run_id, run_type, scope, barangay_id, batch_id, status,
                total_responses, segments_created, started_at, triggered_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run_id)
        .bind(run.run_type.as_str())
        .bind(run.scope_key.scope.as_str())
        .bind(&run.scope_key.barangay_id)
        .bind(&run.scope_key.batch_id)
        .bind(run.status.as_str())
        .bind(run.total_responses)
        .bind(run.segments_created)
        .bind(&started_at)
        .bind(&run.triggered_by)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

/// Record a completed run's metrics (inside the commit transaction)
///
/// Returns false when the row was no longer `running`.
pub async fn mark_completed(conn: &mut SqliteConnection, run: &ClusteringRun) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE clustering_runs
        SET status = 'completed',
            total_responses = ?,
            segments_created = ?,
            overall_quality_score = ?,
            data_quality_score = ?,
            selected_k = ?,
            completed_at = ?,
            duration_seconds = ?
        WHERE run_id = ? AND status = 'running'
        "#,
    )
    .bind(run.total_responses)
    .bind(run.segments_created)
    .bind(run.overall_quality_score)
    .bind(run.data_quality_score)
    .bind(run.selected_k)
    .bind(run.completed_at.as_ref().map(format_timestamp))
    .bind(run.duration_seconds)
    .bind(run.run_id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a run failed with its error message
///
/// Returns false when the row was no longer `running`.
pub async fn mark_failed(pool: &SqlitePool, run: &ClusteringRun) -> Result<bool> {
    let run_id = run.run_id.to_string();
    let completed_at = run.completed_at.as_ref().map(format_timestamp);
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    retry_on_lock("mark_run_failed", max_wait_ms, || async {
        let result = sqlx::query(
            r#"
            UPDATE clustering_runs
            SET status = 'failed',
                total_responses = ?,
                data_quality_score = ?,
                error_message = ?,
                completed_at = ?,
                duration_seconds = ?
            WHERE run_id = ? AND status = 'running'
            "#,
        )
        .bind(run.total_responses)
        .bind(run.data_quality_score)
        .bind(&run.error_message)
        .bind(&completed_at)
        .bind(run.duration_seconds)
        .bind(&run_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    })
    .await
}

/// Load a run by id
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<ClusteringRun>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM clustering_runs WHERE run_id = ?",
        RUN_COLUMNS
    ))
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(run_from_row).transpose()
}

/// Run history for a scope key, newest first
pub async fn list_runs(pool: &SqlitePool, scope_key: &ScopeKey, limit: u32) -> Result<Vec<ClusteringRun>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM clustering_runs
         WHERE scope = ? AND barangay_id IS ? AND batch_id IS ?
         ORDER BY started_at DESC, run_id
         LIMIT ?",
        RUN_COLUMNS
    ))
    .bind(scope_key.scope.as_str())
    .bind(&scope_key.barangay_id)
    .bind(&scope_key.batch_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

fn run_from_row(row: &SqliteRow) -> Result<ClusteringRun> {
    let run_id: String = row.try_get("run_id")?;
    let scope: String = row.try_get("scope")?;
    let run_type: String = row.try_get("run_type")?;
    let status: String = row.try_get("status")?;
    let started_at: String = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(ClusteringRun {
        run_id: parse_uuid("run_id", &run_id)?,
        run_type: parse_text(&run_type)?,
        scope_key: ScopeKey {
            scope: parse_text::<Scope>(&scope)?,
            barangay_id: row.try_get("barangay_id")?,
            batch_id: row.try_get("batch_id")?,
        },
        status: parse_text(&status)?,
        total_responses: row.try_get("total_responses")?,
        segments_created: row.try_get("segments_created")?,
        overall_quality_score: row.try_get("overall_quality_score")?,
        data_quality_score: row.try_get("data_quality_score")?,
        selected_k: row.try_get("selected_k")?,
        started_at: parse_timestamp("started_at", &started_at)?,
        completed_at: completed_at
            .map(|s| parse_timestamp("completed_at", &s))
            .transpose()?,
        duration_seconds: row.try_get("duration_seconds")?,
        triggered_by: row.try_get("triggered_by")?,
        error_message: row.try_get("error_message")?,
    })
}
