//! Artifact assembly and the atomic commit
//!
//! One transaction deactivates the scope key's active segments, inserts the
//! new segments, assignments and recommendations, and marks the run
//! completed. Any failure rolls the whole transaction back, leaving the
//! previous active set in place.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use yseg_common::db::{ClusterAssignment, ClusteringRun, ProgramRecommendation, YouthSegment};
use yseg_common::Error;

use super::phase_analysis::RunAnalysis;
use crate::db::{assignments, recommendations, runs, segments};
use crate::error::{EngineError, EngineResult};
use crate::utils::retry_on_lock;

/// Rows to be written for a completed run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub segments: Vec<YouthSegment>,
    pub assignments: Vec<ClusterAssignment>,
    pub recommendations: Vec<ProgramRecommendation>,
}

/// Turn the analysis into persistable rows with fresh ids
pub fn assemble(run: &ClusteringRun, analysis: &RunAnalysis) -> RunArtifacts {
    let created_at = Utc::now();
    let mut segment_rows = Vec::with_capacity(analysis.segments.len());
    let mut assignment_rows = Vec::with_capacity(analysis.total_responses());
    let mut recommendation_rows = Vec::new();

    for (segment, drafts) in analysis.segments.iter().zip(&analysis.recommendations) {
        let segment_id = Uuid::new_v4();

        segment_rows.push(YouthSegment {
            segment_id,
            run_id: run.run_id,
            scope_key: run.scope_key.clone(),
            cluster_index: segment.cluster_index as i64,
            name: segment.name.clone(),
            description: segment.description.clone(),
            avg_age: segment.stats.avg_age,
            avg_education_level: segment.stats.avg_education_level,
            employment_rate: segment.stats.employment_rate,
            civic_engagement_rate: segment.stats.civic_engagement_rate,
            characteristics: segment.characteristics.clone(),
            youth_count: segment.youth_count() as i64,
            percentage: segment.percentage,
            priority: segment.priority,
            cluster_quality_score: segment.quality_score,
            is_active: true,
            created_at,
        });

        for member in &segment.members {
            let response = &analysis.population.responses[member.row];
            assignment_rows.push(ClusterAssignment {
                run_id: run.run_id,
                segment_id,
                youth_id: response.youth_id.clone(),
                response_id: response.response_id.clone(),
                cluster_index: segment.cluster_index as i64,
                distance_to_centroid: member.distance_to_centroid,
            });
        }

        for draft in drafts {
            recommendation_rows.push(ProgramRecommendation {
                recommendation_id: Uuid::new_v4(),
                segment_id,
                run_id: run.run_id,
                program_code: draft.program_code.clone(),
                program_name: draft.program_name.clone(),
                description: draft.description.clone(),
                target_need: draft.target_need,
                priority_rank: draft.priority_rank as i64,
                expected_impact: draft.expected_impact,
                duration_weeks: i64::from(draft.duration_weeks),
                target_youth_count: draft.target_youth_count as i64,
                primary_sdg: draft.primary_sdg,
                sdg_alignment_score: draft.sdg_alignment_score,
            });
        }
    }

    RunArtifacts {
        segments: segment_rows,
        assignments: assignment_rows,
        recommendations: recommendation_rows,
    }
}

/// Commit a completed run and supersede the scope key's active segments
///
/// `run` must already be in the `completed` state with its metrics set.
/// Returns the number of segments deactivated.
pub async fn commit(
    pool: &SqlitePool,
    run: &ClusteringRun,
    artifacts: &RunArtifacts,
    max_wait_ms: u64,
) -> EngineResult<u64> {
    retry_on_lock("commit_run", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        let deactivated = segments::deactivate_active(&mut tx, &run.scope_key).await?;
        for segment in &artifacts.segments {
            segments::insert_segment(&mut tx, segment).await?;
        }
        assignments::insert_assignments(&mut tx, &artifacts.assignments).await?;
        recommendations::insert_recommendations(&mut tx, &artifacts.recommendations).await?;

        if !runs::mark_completed(&mut tx, run).await? {
            // Dropping the transaction rolls it back
            return Err(Error::Internal(format!(
                "run {} is no longer running",
                run.run_id
            )));
        }

        tx.commit().await?;
        Ok(deactivated)
    })
    .await
    .map_err(|e| EngineError::Persistence(e.to_string()))
}
