//! Database initialization
//!
//! Creates the SQLite database on first use and brings the schema up to date.
//! Every statement is idempotent, so opening an existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite busy_timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection options: every pooled connection gets the same pragmas.
    // WAL lets report readers proceed while a run commits.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    // Concurrent runs for different scope keys share this pool
    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by the engine
///
/// Exposed separately so tests can build the schema on a pool they own.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_survey_responses_table(pool).await?;
    create_clustering_runs_table(pool).await?;
    create_youth_segments_table(pool).await?;
    create_cluster_assignments_table(pool).await?;
    create_program_recommendations_table(pool).await?;

    debug!("Schema verified");
    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the survey_responses table
///
/// Owned by the survey-intake subsystem; the engine only reads rows whose
/// `validation_status` is `validated`.
pub async fn create_survey_responses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_responses (
            response_id TEXT PRIMARY KEY,
            youth_id TEXT NOT NULL,
            barangay_id TEXT NOT NULL,
            batch_id TEXT,
            validation_status TEXT NOT NULL DEFAULT 'pending',
            age INTEGER,
            education_level TEXT,
            work_status TEXT,
            registered_sk_voter INTEGER,
            registered_national_voter INTEGER,
            voted_last_sk_election INTEGER,
            attended_kk_assembly INTEGER,
            youth_org_member INTEGER,
            in_school INTEGER,
            submitted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_survey_responses_selector
         ON survey_responses (validation_status, barangay_id, batch_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_clustering_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clustering_runs (
            run_id TEXT PRIMARY KEY,
            run_type TEXT NOT NULL CHECK (run_type IN ('manual', 'scheduled')),
            scope TEXT NOT NULL CHECK (scope IN ('municipality', 'barangay')),
            barangay_id TEXT,
            batch_id TEXT,
            status TEXT NOT NULL CHECK (status IN ('running', 'completed', 'failed')),
            total_responses INTEGER NOT NULL DEFAULT 0,
            segments_created INTEGER NOT NULL DEFAULT 0,
            overall_quality_score REAL,
            data_quality_score REAL,
            selected_k INTEGER,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            duration_seconds REAL,
            triggered_by TEXT NOT NULL,
            error_message TEXT,
            CHECK ((scope = 'barangay') = (barangay_id IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_clustering_runs_scope
         ON clustering_runs (scope, barangay_id, batch_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_youth_segments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS youth_segments (
            segment_id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES clustering_runs(run_id),
            scope TEXT NOT NULL,
            barangay_id TEXT,
            batch_id TEXT,
            cluster_index INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            avg_age REAL NOT NULL,
            avg_education_level REAL NOT NULL,
            employment_rate REAL NOT NULL,
            civic_engagement_rate REAL NOT NULL,
            characteristics TEXT NOT NULL,
            youth_count INTEGER NOT NULL,
            percentage REAL NOT NULL,
            priority TEXT NOT NULL CHECK (priority IN ('high', 'medium', 'low')),
            cluster_quality_score REAL NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (run_id, cluster_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_youth_segments_active
         ON youth_segments (scope, barangay_id, batch_id, is_active)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cluster_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cluster_assignments (
            run_id TEXT NOT NULL REFERENCES clustering_runs(run_id),
            segment_id TEXT NOT NULL REFERENCES youth_segments(segment_id),
            youth_id TEXT NOT NULL,
            response_id TEXT NOT NULL,
            cluster_index INTEGER NOT NULL,
            distance_to_centroid REAL NOT NULL,
            PRIMARY KEY (run_id, youth_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cluster_assignments_segment
         ON cluster_assignments (segment_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_program_recommendations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS program_recommendations (
            recommendation_id TEXT PRIMARY KEY,
            segment_id TEXT NOT NULL REFERENCES youth_segments(segment_id),
            run_id TEXT NOT NULL REFERENCES clustering_runs(run_id),
            program_code TEXT NOT NULL,
            program_name TEXT NOT NULL,
            description TEXT NOT NULL,
            target_need TEXT NOT NULL,
            priority_rank INTEGER NOT NULL,
            expected_impact REAL NOT NULL,
            duration_weeks INTEGER NOT NULL,
            target_youth_count INTEGER NOT NULL,
            primary_sdg TEXT NOT NULL,
            sdg_alignment_score REAL NOT NULL,
            UNIQUE (segment_id, priority_rank)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures database-level settings exist; NULL values are reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "database_max_lock_wait_ms", "5000").await?;
    Ok(())
}

/// Insert a setting with its default value, or reset it if the stored value is NULL
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE tolerates concurrent initialization
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query(
                "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            )
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

            info!("Reset NULL setting '{}' to default value: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
