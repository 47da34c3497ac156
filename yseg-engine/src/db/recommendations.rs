//! Program recommendation persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use yseg_common::db::ProgramRecommendation;
use yseg_common::Result;

use super::{parse_text, parse_uuid};

/// Insert the recommendations of one run
pub async fn insert_recommendations(
    conn: &mut SqliteConnection,
    recommendations: &[ProgramRecommendation],
) -> Result<()> {
    for rec in recommendations {
        sqlx::query(
            r#"
            INSERT INTO program_recommendations (
                recommendation_id, segment_id, run_id, program_code, program_name,
                description, target_need, priority_rank, expected_impact, duration_weeks,
                target_youth_count, primary_sdg, sdg_alignment_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rec.recommendation_id.to_string())
        .bind(rec.segment_id.to_string())
        .bind(rec.run_id.to_string())
        .bind(&rec.program_code)
        .bind(&rec.program_name)
        .bind(&rec.description)
        .bind(rec.target_need.as_str())
        .bind(rec.priority_rank)
        .bind(rec.expected_impact)
        .bind(rec.duration_weeks)
        .bind(rec.target_youth_count)
        .bind(rec.primary_sdg.as_str())
        .bind(rec.sdg_alignment_score)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Recommendations of a segment ordered by rank
pub async fn recommendations_for_segment(
    pool: &SqlitePool,
    segment_id: Uuid,
) -> Result<Vec<ProgramRecommendation>> {
    let rows = sqlx::query(
        r#"
        SELECT recommendation_id, segment_id, run_id, program_code, program_name,
               description, target_need, priority_rank, expected_impact, duration_weeks,
               target_youth_count, primary_sdg, sdg_alignment_score
        FROM program_recommendations
        WHERE segment_id = ?
        ORDER BY priority_rank
        "#,
    )
    .bind(segment_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(recommendation_from_row).collect()
}

/// Number of recommendations a run produced
pub async fn count_for_run(pool: &SqlitePool, run_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM program_recommendations WHERE run_id = ?")
            .bind(run_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn recommendation_from_row(row: &SqliteRow) -> Result<ProgramRecommendation> {
    let recommendation_id: String = row.try_get("recommendation_id")?;
    let segment_id: String = row.try_get("segment_id")?;
    let run_id: String = row.try_get("run_id")?;
    let target_need: String = row.try_get("target_need")?;
    let primary_sdg: String = row.try_get("primary_sdg")?;

    Ok(ProgramRecommendation {
        recommendation_id: parse_uuid("recommendation_id", &recommendation_id)?,
        segment_id: parse_uuid("segment_id", &segment_id)?,
        run_id: parse_uuid("run_id", &run_id)?,
        program_code: row.try_get("program_code")?,
        program_name: row.try_get("program_name")?,
        description: row.try_get("description")?,
        target_need: parse_text(&target_need)?,
        priority_rank: row.try_get("priority_rank")?,
        expected_impact: row.try_get("expected_impact")?,
        duration_weeks: row.try_get("duration_weeks")?,
        target_youth_count: row.try_get("target_youth_count")?,
        primary_sdg: parse_text(&primary_sdg)?,
        sdg_alignment_score: row.try_get("sdg_alignment_score")?,
    })
}
