//! Youth segment persistence
//!
//! Segments are never deleted. Supersession flips `is_active` off for the
//! previous run of the same scope key inside the commit transaction.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use yseg_common::db::{Scope, ScopeKey, SegmentCharacteristics, YouthSegment};
use yseg_common::Result;

use super::{format_timestamp, parse_text, parse_timestamp, parse_uuid};

const SEGMENT_COLUMNS: &str = "segment_id, run_id, scope, barangay_id, batch_id, cluster_index, \
     name, description, avg_age, avg_education_level, employment_rate, civic_engagement_rate, \
     characteristics, youth_count, percentage, priority, cluster_quality_score, is_active, created_at";

/// Deactivate every active segment of `scope_key`
///
/// NULL-safe on barangay and batch, so a municipality key never touches
/// barangay segments and vice versa. Returns the number of rows deactivated.
pub async fn deactivate_active(conn: &mut SqliteConnection, scope_key: &ScopeKey) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE youth_segments
        SET is_active = 0
        WHERE is_active = 1 AND scope = ? AND barangay_id IS ? AND batch_id IS ?
        "#,
    )
    .bind(scope_key.scope.as_str())
    .bind(&scope_key.barangay_id)
    .bind(&scope_key.batch_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Insert one segment
pub async fn insert_segment(conn: &mut SqliteConnection, segment: &YouthSegment) -> Result<()> {
    let characteristics = serde_json::to_string(&segment.characteristics)?;

    sqlx::query(
        r#"
        INSERT INTO youth_segments (
            segment_id, run_id, scope, barangay_id, batch_id, cluster_index,
            name, description, avg_age, avg_education_level, employment_rate,
            civic_engagement_rate, characteristics, youth_count, percentage,
            priority, cluster_quality_score, is_active, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(segment.segment_id.to_string())
    .bind(segment.run_id.to_string())
    .bind(segment.scope_key.scope.as_str())
    .bind(&segment.scope_key.barangay_id)
    .bind(&segment.scope_key.batch_id)
    .bind(segment.cluster_index)
    .bind(&segment.name)
    .bind(&segment.description)
    .bind(segment.avg_age)
    .bind(segment.avg_education_level)
    .bind(segment.employment_rate)
    .bind(segment.civic_engagement_rate)
    .bind(characteristics)
    .bind(segment.youth_count)
    .bind(segment.percentage)
    .bind(segment.priority.as_str())
    .bind(segment.cluster_quality_score)
    .bind(segment.is_active)
    .bind(format_timestamp(&segment.created_at))
    .execute(conn)
    .await?;

    Ok(())
}

/// Active segments of a scope key, by cluster index
pub async fn active_segments(pool: &SqlitePool, scope_key: &ScopeKey) -> Result<Vec<YouthSegment>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM youth_segments
         WHERE is_active = 1 AND scope = ? AND barangay_id IS ? AND batch_id IS ?
         ORDER BY cluster_index",
        SEGMENT_COLUMNS
    ))
    .bind(scope_key.scope.as_str())
    .bind(&scope_key.barangay_id)
    .bind(&scope_key.batch_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(segment_from_row).collect()
}

/// All segments a run produced, active or not
pub async fn segments_for_run(pool: &SqlitePool, run_id: Uuid) -> Result<Vec<YouthSegment>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM youth_segments WHERE run_id = ? ORDER BY cluster_index",
        SEGMENT_COLUMNS
    ))
    .bind(run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(segment_from_row).collect()
}

fn segment_from_row(row: &SqliteRow) -> Result<YouthSegment> {
    let segment_id: String = row.try_get("segment_id")?;
    let run_id: String = row.try_get("run_id")?;
    let scope: String = row.try_get("scope")?;
    let priority: String = row.try_get("priority")?;
    let characteristics: String = row.try_get("characteristics")?;
    let characteristics: SegmentCharacteristics = serde_json::from_str(&characteristics)?;
    let created_at: String = row.try_get("created_at")?;

    Ok(YouthSegment {
        segment_id: parse_uuid("segment_id", &segment_id)?,
        run_id: parse_uuid("run_id", &run_id)?,
        scope_key: ScopeKey {
            scope: parse_text::<Scope>(&scope)?,
            barangay_id: row.try_get("barangay_id")?,
            batch_id: row.try_get("batch_id")?,
        },
        cluster_index: row.try_get("cluster_index")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        avg_age: row.try_get("avg_age")?,
        avg_education_level: row.try_get("avg_education_level")?,
        employment_rate: row.try_get("employment_rate")?,
        civic_engagement_rate: row.try_get("civic_engagement_rate")?,
        characteristics,
        youth_count: row.try_get("youth_count")?,
        percentage: row.try_get("percentage")?,
        priority: parse_text(&priority)?,
        cluster_quality_score: row.try_get("cluster_quality_score")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
