//! SQLite survey response source
//!
//! Reads the `survey_responses` table owned by the survey-intake subsystem.
//! Only rows with `validation_status = 'validated'` are ever returned.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::models::{EducationLevel, RunSelector, SurveyResponse, WorkStatus};
use crate::services::feature_extractor::SurveyResponseSource;

/// Validation status visible to the engine
pub const VALIDATED: &str = "validated";

/// `SurveyResponseSource` over the shared database
#[derive(Debug, Clone)]
pub struct SqliteResponseSource {
    pool: SqlitePool,
}

impl SqliteResponseSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SurveyResponseSource for SqliteResponseSource {
    async fn fetch_validated(&self, selector: &RunSelector) -> EngineResult<Vec<SurveyResponse>> {
        let key = &selector.scope_key;

        // Latest submission first within a youth
        let rows = sqlx::query(
            r#"
            SELECT response_id, youth_id, barangay_id, batch_id, age, education_level,
                   work_status, registered_sk_voter, registered_national_voter,
                   voted_last_sk_election, attended_kk_assembly, youth_org_member, in_school
            FROM survey_responses
            WHERE validation_status = ?
              AND (? IS NULL OR barangay_id = ?)
              AND (? IS NULL OR batch_id = ?)
            ORDER BY youth_id, submitted_at DESC, response_id DESC
            "#,
        )
        .bind(VALIDATED)
        .bind(&key.barangay_id)
        .bind(&key.barangay_id)
        .bind(&key.batch_id)
        .bind(&key.batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Source(format!("Failed to read survey responses: {}", e)))?;

        rows.iter()
            .map(|row| {
                response_from_row(row)
                    .map_err(|e| EngineError::Source(format!("Malformed survey response row: {}", e)))
            })
            .collect()
    }
}

fn response_from_row(row: &SqliteRow) -> Result<SurveyResponse, sqlx::Error> {
    let response_id: String = row.try_get("response_id")?;

    let age: Option<i64> = row.try_get("age")?;
    let age = age.and_then(|a| u32::try_from(a).ok());

    let education: Option<String> = row.try_get("education_level")?;
    let education_level = education.and_then(|raw| match raw.parse::<EducationLevel>() {
        Ok(level) => Some(level),
        Err(e) => {
            warn!(response_id = %response_id, "Treating education level as missing: {}", e);
            None
        }
    });

    let work: Option<String> = row.try_get("work_status")?;
    let work_status = work.and_then(|raw| match raw.parse::<WorkStatus>() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(response_id = %response_id, "Treating work status as missing: {}", e);
            None
        }
    });

    Ok(SurveyResponse {
        youth_id: row.try_get("youth_id")?,
        barangay_id: row.try_get("barangay_id")?,
        batch_id: row.try_get("batch_id")?,
        age,
        education_level,
        work_status,
        registered_sk_voter: row.try_get("registered_sk_voter")?,
        registered_national_voter: row.try_get("registered_national_voter")?,
        voted_last_sk_election: row.try_get("voted_last_sk_election")?,
        attended_kk_assembly: row.try_get("attended_kk_assembly")?,
        youth_org_member: row.try_get("youth_org_member")?,
        in_school: row.try_get("in_school")?,
        response_id,
    })
}

/// Insert a survey response row with the given validation status
///
/// The engine never writes survey data during a run; this is the intake
/// subsystem's entry point and the fixture loader for tests.
pub async fn insert_response(
    pool: &SqlitePool,
    response: &SurveyResponse,
    validation_status: &str,
) -> yseg_common::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO survey_responses (
            response_id, youth_id, barangay_id, batch_id, validation_status, age,
            education_level, work_status, registered_sk_voter, registered_national_voter,
            voted_last_sk_election, attended_kk_assembly, youth_org_member, in_school
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&response.response_id)
    .bind(&response.youth_id)
    .bind(&response.barangay_id)
    .bind(&response.batch_id)
    .bind(validation_status)
    .bind(response.age.map(i64::from))
    .bind(response.education_level.map(|l| l.as_str()))
    .bind(response.work_status.map(|w| w.as_str()))
    .bind(response.registered_sk_voter)
    .bind(response.registered_national_voter)
    .bind(response.voted_last_sk_election)
    .bind(response.attended_kk_assembly)
    .bind(response.youth_org_member)
    .bind(response.in_school)
    .execute(pool)
    .await?;

    Ok(())
}
