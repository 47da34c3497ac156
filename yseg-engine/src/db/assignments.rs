//! Cluster assignment persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use yseg_common::db::ClusterAssignment;
use yseg_common::Result;

use super::parse_uuid;

/// Insert the assignments of one run
pub async fn insert_assignments(
    conn: &mut SqliteConnection,
    assignments: &[ClusterAssignment],
) -> Result<()> {
    for assignment in assignments {
        sqlx::query(
            r#"
            INSERT INTO cluster_assignments (
                run_id, segment_id, youth_id, response_id, cluster_index, distance_to_centroid
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.run_id.to_string())
        .bind(assignment.segment_id.to_string())
        .bind(&assignment.youth_id)
        .bind(&assignment.response_id)
        .bind(assignment.cluster_index)
        .bind(assignment.distance_to_centroid)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Assignments of a run, by youth id
pub async fn assignments_for_run(pool: &SqlitePool, run_id: Uuid) -> Result<Vec<ClusterAssignment>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, segment_id, youth_id, response_id, cluster_index, distance_to_centroid
        FROM cluster_assignments
        WHERE run_id = ?
        ORDER BY youth_id
        "#,
    )
    .bind(run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(assignment_from_row).collect()
}

/// Youth ids assigned to one segment
pub async fn youth_ids_for_segment(pool: &SqlitePool, segment_id: Uuid) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT youth_id FROM cluster_assignments WHERE segment_id = ? ORDER BY youth_id",
    )
    .bind(segment_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

fn assignment_from_row(row: &SqliteRow) -> Result<ClusterAssignment> {
    let run_id: String = row.try_get("run_id")?;
    let segment_id: String = row.try_get("segment_id")?;
    Ok(ClusterAssignment {
        run_id: parse_uuid("run_id", &run_id)?,
        segment_id: parse_uuid("segment_id", &segment_id)?,
        youth_id: row.try_get("youth_id")?,
        response_id: row.try_get("response_id")?,
        cluster_index: row.try_get("cluster_index")?,
        distance_to_centroid: row.try_get("distance_to_centroid")?,
    })
}
