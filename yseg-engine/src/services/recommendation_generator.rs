//! Recommendation Generator
//!
//! Matches each labeled segment's needs against a static program catalog and
//! returns ranked program drafts. A segment with no recognizable need gets an
//! empty list.
//!
//! # Scoring
//! `expected_impact = clamp(base_impact × (0.5 + 0.5 × severity) × priority_weight, 0, 1)`
//! where `severity` in [0, 1] measures how far the segment is from the need
//! threshold. `target_youth_count = clamp(ceil(size × reach), 1, size)`.

use yseg_common::db::{NeedTag, PriorityLevel, Sdg};

use crate::services::segment_labeler::{LabeledSegment, SegmentStats, EDUCATION_BASELINE};

/// Employment rate below which a segment needs livelihood support
pub const EMPLOYMENT_THRESHOLD: f64 = 0.5;
/// Civic engagement rate below which a segment needs participation programs
pub const CIVIC_THRESHOLD: f64 = 0.5;
/// Civic engagement rate from which a segment is offered leadership programs
pub const LEADERSHIP_THRESHOLD: f64 = 0.7;
/// In-school rate below which young segments need reintegration
pub const IN_SCHOOL_THRESHOLD: f64 = 0.5;
/// Average age under which school reintegration applies
pub const SCHOOL_AGE_LIMIT: f64 = 22.0;

/// One program in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub need: NeedTag,
    pub primary_sdg: Sdg,
    pub sdg_alignment: f64,
    pub base_impact: f64,
    /// Share of the segment the program is sized for
    pub reach: f64,
    pub duration_weeks: u32,
}

/// Built-in program catalog
pub const PROGRAM_CATALOG: &[ProgramTemplate] = &[
    ProgramTemplate {
        code: "LIV-SKILLS",
        name: "Technical-Vocational Skills Training",
        description: "TESDA-accredited short courses matched to local employer demand",
        need: NeedTag::Livelihood,
        primary_sdg: Sdg::DecentWork,
        sdg_alignment: 0.95,
        base_impact: 0.85,
        reach: 0.6,
        duration_weeks: 12,
    },
    ProgramTemplate {
        code: "LIV-ENTRE",
        name: "Youth Micro-Enterprise Starter Program",
        description: "Business planning mentorship with seed capital for small ventures",
        need: NeedTag::Livelihood,
        primary_sdg: Sdg::NoPoverty,
        sdg_alignment: 0.85,
        base_impact: 0.75,
        reach: 0.3,
        duration_weeks: 16,
    },
    ProgramTemplate {
        code: "LIV-JOBFAIR",
        name: "Job Placement and Career Fair",
        description: "Barangay job fair with resume clinics and interview coaching",
        need: NeedTag::Livelihood,
        primary_sdg: Sdg::DecentWork,
        sdg_alignment: 0.8,
        base_impact: 0.65,
        reach: 0.9,
        duration_weeks: 2,
    },
    ProgramTemplate {
        code: "CIV-VOTER",
        name: "SK Voter Registration Drive",
        description: "Registration assistance and voter education ahead of SK elections",
        need: NeedTag::CivicParticipation,
        primary_sdg: Sdg::StrongInstitutions,
        sdg_alignment: 0.9,
        base_impact: 0.7,
        reach: 0.8,
        duration_weeks: 4,
    },
    ProgramTemplate {
        code: "CIV-ASSEMBLY",
        name: "Katipunan ng Kabataan Assembly Outreach",
        description: "House-to-house invitations and youth-friendly KK assembly sessions",
        need: NeedTag::CivicParticipation,
        primary_sdg: Sdg::StrongInstitutions,
        sdg_alignment: 0.85,
        base_impact: 0.6,
        reach: 0.7,
        duration_weeks: 6,
    },
    ProgramTemplate {
        code: "EDU-ALS",
        name: "Alternative Learning System Enrollment",
        description: "ALS enrollment support toward elementary and high school equivalency",
        need: NeedTag::Education,
        primary_sdg: Sdg::QualityEducation,
        sdg_alignment: 0.95,
        base_impact: 0.8,
        reach: 0.5,
        duration_weeks: 40,
    },
    ProgramTemplate {
        code: "EDU-TUTOR",
        name: "Peer Tutoring and Study Hubs",
        description: "Community study spaces with volunteer tutors in core subjects",
        need: NeedTag::Education,
        primary_sdg: Sdg::QualityEducation,
        sdg_alignment: 0.85,
        base_impact: 0.6,
        reach: 0.6,
        duration_weeks: 20,
    },
    ProgramTemplate {
        code: "SCH-RETURN",
        name: "Back-to-School Assistance",
        description: "School supplies, transport allowance and counseling for out-of-school youth",
        need: NeedTag::SchoolReintegration,
        primary_sdg: Sdg::QualityEducation,
        sdg_alignment: 0.9,
        base_impact: 0.75,
        reach: 0.5,
        duration_weeks: 8,
    },
    ProgramTemplate {
        code: "SCH-SCHOLAR",
        name: "Municipal Scholarship Grants",
        description: "Tuition and stipend grants for returning and continuing students",
        need: NeedTag::SchoolReintegration,
        primary_sdg: Sdg::ReducedInequalities,
        sdg_alignment: 0.8,
        base_impact: 0.7,
        reach: 0.25,
        duration_weeks: 36,
    },
    ProgramTemplate {
        code: "LEAD-ACADEMY",
        name: "Youth Leadership Academy",
        description: "Governance, budgeting and project management training for youth leaders",
        need: NeedTag::Leadership,
        primary_sdg: Sdg::StrongInstitutions,
        sdg_alignment: 0.85,
        base_impact: 0.65,
        reach: 0.4,
        duration_weeks: 10,
    },
    ProgramTemplate {
        code: "LEAD-VOLUNTEER",
        name: "Community Volunteer Corps",
        description: "Youth-led service projects in partnership with local organizations",
        need: NeedTag::Leadership,
        primary_sdg: Sdg::Partnerships,
        sdg_alignment: 0.75,
        base_impact: 0.55,
        reach: 0.7,
        duration_weeks: 12,
    },
];

/// Need detected in a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeedAssessment {
    pub need: NeedTag,
    /// Distance past the threshold, in [0, 1]
    pub severity: f64,
}

/// Needs of a segment, derived from its weakest (and strongest) characteristics
pub fn assess_needs(stats: &SegmentStats) -> Vec<NeedAssessment> {
    let mut needs = Vec::new();

    if stats.employment_rate < EMPLOYMENT_THRESHOLD {
        needs.push(NeedAssessment {
            need: NeedTag::Livelihood,
            severity: gap_below(stats.employment_rate, EMPLOYMENT_THRESHOLD),
        });
    }
    if stats.civic_engagement_rate < CIVIC_THRESHOLD {
        needs.push(NeedAssessment {
            need: NeedTag::CivicParticipation,
            severity: gap_below(stats.civic_engagement_rate, CIVIC_THRESHOLD),
        });
    }
    if stats.avg_education_level < EDUCATION_BASELINE {
        needs.push(NeedAssessment {
            need: NeedTag::Education,
            severity: stats.education_gap(),
        });
    }
    if stats.in_school_rate < IN_SCHOOL_THRESHOLD && stats.avg_age < SCHOOL_AGE_LIMIT {
        needs.push(NeedAssessment {
            need: NeedTag::SchoolReintegration,
            severity: gap_below(stats.in_school_rate, IN_SCHOOL_THRESHOLD),
        });
    }
    if stats.civic_engagement_rate >= LEADERSHIP_THRESHOLD {
        needs.push(NeedAssessment {
            need: NeedTag::Leadership,
            severity: ((stats.civic_engagement_rate - LEADERSHIP_THRESHOLD)
                / (1.0 - LEADERSHIP_THRESHOLD))
                .clamp(0.0, 1.0),
        });
    }

    needs
}

fn gap_below(value: f64, threshold: f64) -> f64 {
    ((threshold - value) / threshold).clamp(0.0, 1.0)
}

/// Impact multiplier by segment priority
pub fn priority_weight(priority: PriorityLevel) -> f64 {
    match priority {
        PriorityLevel::High => 1.0,
        PriorityLevel::Medium => 0.85,
        PriorityLevel::Low => 0.7,
    }
}

/// Ranked recommendation before ids are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationDraft {
    pub program_code: String,
    pub program_name: String,
    pub description: String,
    pub target_need: NeedTag,
    /// 1-based, contiguous within a segment
    pub priority_rank: usize,
    pub expected_impact: f64,
    pub duration_weeks: u32,
    pub target_youth_count: usize,
    pub primary_sdg: Sdg,
    pub sdg_alignment_score: f64,
}

/// Recommendation Generator
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    catalog: &'static [ProgramTemplate],
}

impl Default for RecommendationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationGenerator {
    /// Generator over the built-in catalog
    pub fn new() -> Self {
        Self {
            catalog: PROGRAM_CATALOG,
        }
    }

    pub fn with_catalog(catalog: &'static [ProgramTemplate]) -> Self {
        Self { catalog }
    }

    /// Ranked programs for one segment; empty when no need matches
    pub fn recommend(&self, segment: &LabeledSegment) -> Vec<RecommendationDraft> {
        let needs = assess_needs(&segment.stats);
        let size = segment.youth_count();
        let weight = priority_weight(segment.priority);

        let mut drafts: Vec<RecommendationDraft> = self
            .catalog
            .iter()
            .filter_map(|template| {
                let assessment = needs.iter().find(|n| n.need == template.need)?;
                let expected_impact = (template.base_impact
                    * (0.5 + 0.5 * assessment.severity)
                    * weight)
                    .clamp(0.0, 1.0);
                Some(RecommendationDraft {
                    program_code: template.code.to_string(),
                    program_name: template.name.to_string(),
                    description: template.description.to_string(),
                    target_need: template.need,
                    priority_rank: 0,
                    expected_impact,
                    duration_weeks: template.duration_weeks,
                    target_youth_count: target_count(size, template.reach),
                    primary_sdg: template.primary_sdg,
                    sdg_alignment_score: template.sdg_alignment,
                })
            })
            .collect();

        drafts.sort_by(|a, b| {
            b.expected_impact
                .total_cmp(&a.expected_impact)
                .then_with(|| a.program_code.cmp(&b.program_code))
        });
        for (index, draft) in drafts.iter_mut().enumerate() {
            draft.priority_rank = index + 1;
        }
        drafts
    }
}

fn target_count(size: usize, reach: f64) -> usize {
    if size == 0 {
        return 0;
    }
    ((size as f64 * reach).ceil() as usize).clamp(1, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::segment_labeler::SegmentMember;
    use yseg_common::db::{Level, SegmentCharacteristics};

    fn segment(stats: SegmentStats, size: usize, priority: PriorityLevel) -> LabeledSegment {
        LabeledSegment {
            cluster_index: 0,
            name: "test".to_string(),
            description: String::new(),
            stats,
            characteristics: SegmentCharacteristics {
                age_band: "18-24".to_string(),
                employment_level: Level::Moderate,
                civic_engagement_level: Level::Moderate,
                education_label: "College Level".to_string(),
                in_school_rate: 0.0,
                dominant_traits: Vec::new(),
                data_completeness: 1.0,
                low_variance: false,
                centroid: vec![0.0; 4],
            },
            members: (0..size)
                .map(|row| SegmentMember {
                    row,
                    distance_to_centroid: 0.0,
                })
                .collect(),
            percentage: 100.0,
            priority,
            quality_score: 0.5,
        }
    }

    fn stats(employment: f64, civic: f64, education: f64, in_school: f64, age: f64) -> SegmentStats {
        SegmentStats {
            avg_age: age,
            avg_education_level: education,
            employment_rate: employment,
            civic_engagement_rate: civic,
            in_school_rate: in_school,
            data_completeness: 1.0,
        }
    }

    #[test]
    fn test_unemployed_disengaged_segment_gets_livelihood_and_civic_programs() {
        let generator = RecommendationGenerator::new();
        let drafts = generator.recommend(&segment(stats(0.0, 0.0, 5.0, 0.0, 26.0), 20, PriorityLevel::High));

        let needs: Vec<NeedTag> = drafts.iter().map(|d| d.target_need).collect();
        assert!(needs.contains(&NeedTag::Livelihood));
        assert!(needs.contains(&NeedTag::CivicParticipation));
        assert!(!needs.contains(&NeedTag::Leadership));

        // Full severity, high priority: impact equals base impact
        let skills = drafts.iter().find(|d| d.program_code == "LIV-SKILLS").unwrap();
        assert!((skills.expected_impact - 0.85).abs() < 1e-12);
        assert_eq!(skills.priority_rank, 1);
        assert_eq!(skills.target_youth_count, 12);
    }

    #[test]
    fn test_ranks_are_contiguous_and_ordered() {
        let generator = RecommendationGenerator::new();
        let drafts = generator.recommend(&segment(stats(0.2, 0.1, 1.0, 0.1, 17.0), 7, PriorityLevel::Medium));

        let ranks: Vec<usize> = drafts.iter().map(|d| d.priority_rank).collect();
        assert_eq!(ranks, (1..=drafts.len()).collect::<Vec<_>>());
        for pair in drafts.windows(2) {
            assert!(pair[0].expected_impact >= pair[1].expected_impact);
        }
        for draft in &drafts {
            assert!((0.0..=1.0).contains(&draft.expected_impact));
            assert!(draft.target_youth_count >= 1 && draft.target_youth_count <= 7);
        }
    }

    #[test]
    fn test_active_segment_gets_leadership_programs() {
        let generator = RecommendationGenerator::new();
        let drafts = generator.recommend(&segment(stats(1.0, 1.0, 6.0, 0.0, 25.0), 10, PriorityLevel::Low));

        assert!(!drafts.is_empty());
        assert!(drafts.iter().all(|d| d.target_need == NeedTag::Leadership));
        assert_eq!(drafts[0].program_code, "LEAD-ACADEMY");
    }

    #[test]
    fn test_no_matching_need_yields_empty_list() {
        let generator = RecommendationGenerator::new();
        let drafts = generator.recommend(&segment(stats(0.8, 0.6, 6.0, 0.0, 26.0), 10, PriorityLevel::Low));
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_equal_impact_ties_break_by_code() {
        static CATALOG: &[ProgramTemplate] = &[
            ProgramTemplate {
                code: "B",
                name: "b",
                description: "",
                need: NeedTag::Livelihood,
                primary_sdg: Sdg::DecentWork,
                sdg_alignment: 0.5,
                base_impact: 0.5,
                reach: 1.0,
                duration_weeks: 1,
            },
            ProgramTemplate {
                code: "A",
                name: "a",
                description: "",
                need: NeedTag::Livelihood,
                primary_sdg: Sdg::DecentWork,
                sdg_alignment: 0.5,
                base_impact: 0.5,
                reach: 1.0,
                duration_weeks: 1,
            },
        ];
        let generator = RecommendationGenerator::with_catalog(CATALOG);
        let drafts = generator.recommend(&segment(stats(0.0, 0.6, 6.0, 1.0, 26.0), 3, PriorityLevel::High));
        let codes: Vec<&str> = drafts.iter().map(|d| d.program_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);
    }

    #[test]
    fn test_target_count_bounds() {
        assert_eq!(target_count(1, 0.1), 1);
        assert_eq!(target_count(10, 0.25), 3);
        assert_eq!(target_count(10, 1.5), 10);
    }
}
