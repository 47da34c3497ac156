//! Database access for the segmentation engine
//!
//! Repositories over the shared SQLite database. Write helpers that take a
//! `&mut SqliteConnection` are meant to run inside the orchestrator's commit
//! transaction; the rest are standalone reads for reporting collaborators.

pub mod assignments;
pub mod parameters;
pub mod recommendations;
pub mod responses;
pub mod runs;
pub mod segments;
pub mod settings;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;
use yseg_common::{Error, Result};

/// Open (creating if needed) the database and ensure engine defaults
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = yseg_common::db::init_database(db_path).await?;
    parameters::init_parameter_defaults(&pool).await?;
    tracing::debug!("Engine settings initialized");
    Ok(pool)
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {} '{}': {}", column, value, e)))
}

/// Fixed-width RFC 3339 text, so stored timestamps sort chronologically
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_text<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    value.parse::<T>()
}
