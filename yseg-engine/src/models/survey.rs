//! Validated survey responses (read-only input)

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use yseg_common::Error;

/// Highest educational attainment, ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    ElementaryLevel,
    ElementaryGraduate,
    HighSchoolLevel,
    HighSchoolGraduate,
    VocationalGraduate,
    CollegeLevel,
    CollegeGraduate,
    MastersLevel,
    MastersGraduate,
    DoctorateLevel,
    DoctorateGraduate,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 11] = [
        EducationLevel::ElementaryLevel,
        EducationLevel::ElementaryGraduate,
        EducationLevel::HighSchoolLevel,
        EducationLevel::HighSchoolGraduate,
        EducationLevel::VocationalGraduate,
        EducationLevel::CollegeLevel,
        EducationLevel::CollegeGraduate,
        EducationLevel::MastersLevel,
        EducationLevel::MastersGraduate,
        EducationLevel::DoctorateLevel,
        EducationLevel::DoctorateGraduate,
    ];

    /// Largest ordinal value
    pub const MAX_ORDINAL: f64 = 10.0;

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Level whose ordinal is closest to `value`
    pub fn nearest(value: f64) -> EducationLevel {
        let index = value.round().clamp(0.0, Self::MAX_ORDINAL) as usize;
        Self::ALL[index]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::ElementaryLevel => "elementary_level",
            EducationLevel::ElementaryGraduate => "elementary_graduate",
            EducationLevel::HighSchoolLevel => "high_school_level",
            EducationLevel::HighSchoolGraduate => "high_school_graduate",
            EducationLevel::VocationalGraduate => "vocational_graduate",
            EducationLevel::CollegeLevel => "college_level",
            EducationLevel::CollegeGraduate => "college_graduate",
            EducationLevel::MastersLevel => "masters_level",
            EducationLevel::MastersGraduate => "masters_graduate",
            EducationLevel::DoctorateLevel => "doctorate_level",
            EducationLevel::DoctorateGraduate => "doctorate_graduate",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            EducationLevel::ElementaryLevel => "Elementary Level",
            EducationLevel::ElementaryGraduate => "Elementary Graduate",
            EducationLevel::HighSchoolLevel => "High School Level",
            EducationLevel::HighSchoolGraduate => "High School Graduate",
            EducationLevel::VocationalGraduate => "Vocational Graduate",
            EducationLevel::CollegeLevel => "College Level",
            EducationLevel::CollegeGraduate => "College Graduate",
            EducationLevel::MastersLevel => "Masters Level",
            EducationLevel::MastersGraduate => "Masters Graduate",
            EducationLevel::DoctorateLevel => "Doctorate Level",
            EducationLevel::DoctorateGraduate => "Doctorate Graduate",
        }
    }
}

impl FromStr for EducationLevel {
    type Err = Error;

    /// Accepts the stored snake_case form as well as survey labels
    /// ("High School Graduate", "high-school-graduate").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("unknown education level '{}'", s)))
    }
}

/// Work status as captured by the KK survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Employed,
    SelfEmployed,
    Unemployed,
    CurrentlyLookingForJob,
    NotInterestedLookingForJob,
}

impl WorkStatus {
    const ALL: [WorkStatus; 5] = [
        WorkStatus::Employed,
        WorkStatus::SelfEmployed,
        WorkStatus::Unemployed,
        WorkStatus::CurrentlyLookingForJob,
        WorkStatus::NotInterestedLookingForJob,
    ];

    pub fn is_employed(&self) -> bool {
        matches!(self, WorkStatus::Employed | WorkStatus::SelfEmployed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Employed => "employed",
            WorkStatus::SelfEmployed => "self_employed",
            WorkStatus::Unemployed => "unemployed",
            WorkStatus::CurrentlyLookingForJob => "currently_looking_for_job",
            WorkStatus::NotInterestedLookingForJob => "not_interested_looking_for_job",
        }
    }
}

impl FromStr for WorkStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("unknown work status '{}'", s)))
    }
}

/// One validated survey response
///
/// Raw attributes are optional: incomplete responses are still clustered
/// (with imputation) and lower the run's data-quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub response_id: String,
    pub youth_id: String,
    pub barangay_id: String,
    pub batch_id: Option<String>,
    pub age: Option<u32>,
    pub education_level: Option<EducationLevel>,
    pub work_status: Option<WorkStatus>,
    pub registered_sk_voter: Option<bool>,
    pub registered_national_voter: Option<bool>,
    pub voted_last_sk_election: Option<bool>,
    pub attended_kk_assembly: Option<bool>,
    pub youth_org_member: Option<bool>,
    pub in_school: Option<bool>,
}

impl SurveyResponse {
    /// Number of required fields counted by the data-quality score
    pub const REQUIRED_FIELDS: usize = 6;

    /// Response with only identifiers set
    pub fn new(
        response_id: impl Into<String>,
        youth_id: impl Into<String>,
        barangay_id: impl Into<String>,
    ) -> Self {
        Self {
            response_id: response_id.into(),
            youth_id: youth_id.into(),
            barangay_id: barangay_id.into(),
            batch_id: None,
            age: None,
            education_level: None,
            work_status: None,
            registered_sk_voter: None,
            registered_national_voter: None,
            voted_last_sk_election: None,
            attended_kk_assembly: None,
            youth_org_member: None,
            in_school: None,
        }
    }

    fn civic_indicators(&self) -> [Option<bool>; 5] {
        [
            self.registered_sk_voter,
            self.registered_national_voter,
            self.voted_last_sk_election,
            self.attended_kk_assembly,
            self.youth_org_member,
        ]
    }

    /// Fraction of known civic indicators that are true; None if none are known
    pub fn civic_engagement_score(&self) -> Option<f64> {
        let known: Vec<bool> = self.civic_indicators().into_iter().flatten().collect();
        if known.is_empty() {
            return None;
        }
        let engaged = known.iter().filter(|v| **v).count();
        Some(engaged as f64 / known.len() as f64)
    }

    /// 1.0 if employed or self-employed, 0.0 otherwise; None if unknown
    pub fn employment_indicator(&self) -> Option<f64> {
        self.work_status
            .map(|status| if status.is_employed() { 1.0 } else { 0.0 })
    }

    /// Count of required fields present
    pub fn completed_required_fields(&self) -> usize {
        [
            self.age.is_some(),
            self.education_level.is_some(),
            self.work_status.is_some(),
            self.registered_sk_voter.is_some(),
            self.voted_last_sk_election.is_some(),
            self.attended_kk_assembly.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
