//! Database Test Utilities
//!
//! Temporary segmentation databases and survey fixtures

use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;
use yseg_engine::db::assignments::assignments_for_run;
use yseg_engine::db::parameters::load_clustering_parameters;
use yseg_engine::db::responses::{insert_response, SqliteResponseSource, VALIDATED};
use yseg_engine::models::{EducationLevel, SurveyResponse, WorkStatus};
use yseg_engine::{RunAuditSink, RunOrchestrator};

/// Create temporary test database with the full schema and default settings
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_segments.db");
    let pool = yseg_engine::db::init_database_pool(&db_path).await.unwrap();
    (temp_dir, pool)
}

/// Orchestrator over the test database with its stored parameters
pub async fn test_orchestrator(pool: &SqlitePool, audit: Arc<dyn RunAuditSink>) -> RunOrchestrator {
    let params = load_clustering_parameters(pool).await.unwrap();
    RunOrchestrator::new(
        pool.clone(),
        Arc::new(SqliteResponseSource::new(pool.clone())),
        audit,
        params,
    )
    .unwrap()
}

/// Out-of-school, unemployed, civically disengaged teenager
pub fn young_disengaged(response_id: &str, youth_id: &str, barangay: &str, age: u32) -> SurveyResponse {
    let mut r = SurveyResponse::new(response_id, youth_id, barangay);
    r.age = Some(age);
    r.education_level = Some(EducationLevel::HighSchoolLevel);
    r.work_status = Some(WorkStatus::Unemployed);
    r.registered_sk_voter = Some(false);
    r.registered_national_voter = Some(false);
    r.voted_last_sk_election = Some(false);
    r.attended_kk_assembly = Some(false);
    r.youth_org_member = Some(false);
    r.in_school = Some(false);
    r
}

/// Employed college graduate active in every civic indicator
fn employed_engaged(response_id: &str, youth_id: &str, barangay: &str, age: u32) -> SurveyResponse {
    let mut r = SurveyResponse::new(response_id, youth_id, barangay);
    r.age = Some(age);
    r.education_level = Some(EducationLevel::CollegeGraduate);
    r.work_status = Some(WorkStatus::Employed);
    r.registered_sk_voter = Some(true);
    r.registered_national_voter = Some(true);
    r.voted_last_sk_election = Some(true);
    r.attended_kk_assembly = Some(true);
    r.youth_org_member = Some(true);
    r.in_school = Some(false);
    r
}

/// Seed `per_group` disengaged 17-year-olds and `per_group` engaged 25-year-olds
///
/// Each group shares one profile, so the population has exactly two
/// distinct feature vectors. Ids are prefixed with the barangay so several
/// barangays can share a database.
pub async fn seed_two_groups(pool: &SqlitePool, barangay: &str, per_group: usize) {
    for i in 0..per_group {
        let id = format!("{}-a{:03}", barangay, i);
        insert_response(pool, &young_disengaged(&format!("r-{}", id), &format!("y-{}", id), barangay, 17), VALIDATED)
            .await
            .unwrap();
    }
    for i in 0..per_group {
        let id = format!("{}-b{:03}", barangay, i);
        insert_response(pool, &employed_engaged(&format!("r-{}", id), &format!("y-{}", id), barangay, 25), VALIDATED)
            .await
            .unwrap();
    }
}

/// Seed three well-separated profiles with small per-youth variation
///
/// Ages vary by up to two years and one civic indicator flips within each
/// profile, so every blob holds several distinct feature vectors. Returns
/// the youth ids of each blob.
pub async fn seed_three_blobs(pool: &SqlitePool, barangay: &str, per_blob: usize) -> BTreeSet<BTreeSet<String>> {
    let mut blobs = BTreeSet::new();

    let mut teens = BTreeSet::new();
    for i in 0..per_blob {
        let id = format!("{}-t{:03}", barangay, i);
        let mut r = young_disengaged(&format!("r-{}", id), &format!("y-{}", id), barangay, 15 + (i % 3) as u32);
        r.youth_org_member = Some(i % 2 == 0);
        insert_response(pool, &r, VALIDATED).await.unwrap();
        teens.insert(r.youth_id);
    }
    blobs.insert(teens);

    let mut students = BTreeSet::new();
    for i in 0..per_blob {
        let id = format!("{}-s{:03}", barangay, i);
        let mut r = SurveyResponse::new(format!("r-{}", id), format!("y-{}", id), barangay);
        r.age = Some(19 + (i % 3) as u32);
        r.education_level = Some(EducationLevel::CollegeLevel);
        r.work_status = Some(WorkStatus::CurrentlyLookingForJob);
        r.registered_sk_voter = Some(true);
        r.registered_national_voter = Some(true);
        r.voted_last_sk_election = Some(true);
        r.attended_kk_assembly = Some(false);
        r.youth_org_member = Some(i % 2 == 0);
        r.in_school = Some(true);
        insert_response(pool, &r, VALIDATED).await.unwrap();
        students.insert(r.youth_id);
    }
    blobs.insert(students);

    let mut professionals = BTreeSet::new();
    for i in 0..per_blob {
        let id = format!("{}-p{:03}", barangay, i);
        let mut r = employed_engaged(&format!("r-{}", id), &format!("y-{}", id), barangay, 26 + (i % 3) as u32);
        r.education_level = Some(EducationLevel::MastersGraduate);
        r.attended_kk_assembly = Some(i % 2 == 0);
        insert_response(pool, &r, VALIDATED).await.unwrap();
        professionals.insert(r.youth_id);
    }
    blobs.insert(professionals);

    blobs
}

/// Seed `count` responses with identical attributes
pub async fn seed_identical(pool: &SqlitePool, barangay: &str, count: usize) {
    for i in 0..count {
        let id = format!("{}-same{:03}", barangay, i);
        insert_response(pool, &young_disengaged(&format!("r-{}", id), &format!("y-{}", id), barangay, 20), VALIDATED)
            .await
            .unwrap();
    }
}

/// Partition of a run as sets of youth ids, independent of segment ids
pub async fn grouping(pool: &SqlitePool, run_id: Uuid) -> BTreeSet<BTreeSet<String>> {
    let mut by_segment: std::collections::HashMap<Uuid, BTreeSet<String>> = Default::default();
    for assignment in assignments_for_run(pool, run_id).await.unwrap() {
        by_segment
            .entry(assignment.segment_id)
            .or_default()
            .insert(assignment.youth_id);
    }
    by_segment.into_values().collect()
}
