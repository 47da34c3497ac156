//! Database models
//!
//! Persisted run artifacts. Reporting collaborators read these rows; only the
//! engine's run orchestrator writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Implements `as_str`, `Display` and `FromStr` for a unit enum stored as TEXT
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Population boundary for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Municipality,
    Barangay,
}

text_enum!(Scope {
    Municipality => "municipality",
    Barangay => "barangay",
});

/// How a run was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Manual,
    Scheduled,
}

text_enum!(RunType {
    Manual => "manual",
    Scheduled => "scheduled",
});

/// Clustering run lifecycle: `running` → {`completed`, `failed`}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

text_enum!(RunStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Operational urgency of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

text_enum!(PriorityLevel {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Need a recommended program addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedTag {
    Livelihood,
    CivicParticipation,
    Education,
    SchoolReintegration,
    Leadership,
}

text_enum!(NeedTag {
    Livelihood => "livelihood",
    CivicParticipation => "civic_participation",
    Education => "education",
    SchoolReintegration => "school_reintegration",
    Leadership => "leadership",
});

/// Sustainable Development Goals referenced by the program catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sdg {
    NoPoverty,
    QualityEducation,
    DecentWork,
    ReducedInequalities,
    StrongInstitutions,
    Partnerships,
}

text_enum!(Sdg {
    NoPoverty => "sdg1_no_poverty",
    QualityEducation => "sdg4_quality_education",
    DecentWork => "sdg8_decent_work",
    ReducedInequalities => "sdg10_reduced_inequalities",
    StrongInstitutions => "sdg16_strong_institutions",
    Partnerships => "sdg17_partnerships",
});

impl Sdg {
    /// Goal number as published by the UN
    pub fn number(&self) -> u8 {
        match self {
            Sdg::NoPoverty => 1,
            Sdg::QualityEducation => 4,
            Sdg::DecentWork => 8,
            Sdg::ReducedInequalities => 10,
            Sdg::StrongInstitutions => 16,
            Sdg::Partnerships => 17,
        }
    }
}

/// Selector that identifies the "current" partition: scope + barangay + batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub scope: Scope,
    pub barangay_id: Option<String>,
    pub batch_id: Option<String>,
}

impl ScopeKey {
    pub fn municipality(batch_id: Option<String>) -> Self {
        Self {
            scope: Scope::Municipality,
            barangay_id: None,
            batch_id,
        }
    }

    pub fn barangay(barangay_id: impl Into<String>, batch_id: Option<String>) -> Self {
        Self {
            scope: Scope::Barangay,
            barangay_id: Some(barangay_id.into()),
            batch_id,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope)?;
        if let Some(barangay) = &self.barangay_id {
            write!(f, "/{}", barangay)?;
        }
        if let Some(batch) = &self.batch_id {
            write!(f, "@{}", batch)?;
        }
        Ok(())
    }
}

/// One clustering run (run history row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringRun {
    pub run_id: Uuid,
    pub run_type: RunType,
    pub scope_key: ScopeKey,
    pub status: RunStatus,
    pub total_responses: i64,
    pub segments_created: i64,
    pub overall_quality_score: Option<f64>,
    pub data_quality_score: Option<f64>,
    pub selected_k: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub triggered_by: String,
    pub error_message: Option<String>,
}

impl ClusteringRun {
    /// New run in the `running` state
    pub fn start(scope_key: ScopeKey, run_type: RunType, triggered_by: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_type,
            scope_key,
            status: RunStatus::Running,
            total_responses: 0,
            segments_created: 0,
            overall_quality_score: None,
            data_quality_score: None,
            selected_k: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            triggered_by: triggered_by.into(),
            error_message: None,
        }
    }

    /// Move to a terminal state. Terminal runs are immutable.
    pub fn transition_to(&mut self, new_status: RunStatus) -> crate::Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "run {} is already {} and cannot become {}",
                self.run_id, self.status, new_status
            )));
        }
        if !new_status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "run {} can only transition to a terminal state, not {}",
                self.run_id, new_status
            )));
        }

        let now = Utc::now();
        self.status = new_status;
        self.completed_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Three-way classification used in segment characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Moderate,
    High,
}

/// Structured description of a segment's dominant traits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCharacteristics {
    pub age_band: String,
    pub employment_level: Level,
    pub civic_engagement_level: Level,
    pub education_label: String,
    pub in_school_rate: f64,
    pub dominant_traits: Vec<String>,
    /// Mean attribute completeness of the members (0.0 - 1.0)
    pub data_completeness: f64,
    /// Set when the solver fell back to a single segment on near-constant data
    pub low_variance: bool,
    /// Normalized centroid (age, education, employment, civic engagement)
    pub centroid: Vec<f64>,
}

/// One labeled cluster of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouthSegment {
    pub segment_id: Uuid,
    pub run_id: Uuid,
    pub scope_key: ScopeKey,
    pub cluster_index: i64,
    pub name: String,
    pub description: String,
    pub avg_age: f64,
    pub avg_education_level: f64,
    pub employment_rate: f64,
    pub civic_engagement_rate: f64,
    pub characteristics: SegmentCharacteristics,
    pub youth_count: i64,
    pub percentage: f64,
    pub priority: PriorityLevel,
    pub cluster_quality_score: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Membership of one youth in one segment of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub run_id: Uuid,
    pub segment_id: Uuid,
    pub youth_id: String,
    pub response_id: String,
    pub cluster_index: i64,
    pub distance_to_centroid: f64,
}

/// Ranked program suggestion for a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRecommendation {
    pub recommendation_id: Uuid,
    pub segment_id: Uuid,
    pub run_id: Uuid,
    pub program_code: String,
    pub program_name: String,
    pub description: String,
    pub target_need: NeedTag,
    pub priority_rank: i64,
    pub expected_impact: f64,
    pub duration_weeks: i64,
    pub target_youth_count: i64,
    pub primary_sdg: Sdg,
    pub sdg_alignment_score: f64,
}
