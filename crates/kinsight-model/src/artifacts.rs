//! Evidence artifacts: interview summary and per-video analyses.

use serde::{Deserialize, Serialize};

use crate::ids::GuidelineId;

/// One developmental area the pipeline reasons about.
///
/// Domains are the join key for everything downstream: observations are
/// grouped into patterns by domain, interview claims are matched to video
/// evidence by domain, and clarification priority depends on whether the
/// domain carries diagnostic weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    SocialCommunication,
    Attention,
    Sensory,
    Language,
    Motor,
    Play,
    Regulation,
    EyeContact,
    PeerInteraction,
    Other(String),
}

impl Domain {
    /// Domains that carry diagnostic weight for pervasiveness questions.
    ///
    /// An undetermined pervasiveness classification in one of these domains
    /// is a high-priority clarification candidate; in other domains it is
    /// only medium.
    #[must_use]
    pub const fn is_diagnostically_weighted(&self) -> bool {
        matches!(
            self,
            Self::SocialCommunication | Self::EyeContact | Self::PeerInteraction | Self::Sensory
        )
    }
}

/// Filming context in which a video was captured.
///
/// Pervasiveness is computed over distinct contexts, never over video
/// counts: two home videos are one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationContext {
    Home,
    Peers,
    Mealtime,
    Outdoor,
    Structured,
    Other(String),
}

/// Whether an observation describes a strength or a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Strength,
    Challenge,
}

/// Frequency descriptor attached to claims and observations, ordered from
/// `Never` to `Always`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Never,
    Rarely,
    Sometimes,
    Often,
    Always,
}

impl Frequency {
    /// Whether two frequency descriptors are far enough apart to count as a
    /// discrepancy: one on the `Never`/`Rarely` end, the other on the
    /// `Often`/`Always` end. `Sometimes` never conflicts with anything.
    #[must_use]
    pub const fn conflicts_with(&self, other: &Self) -> bool {
        const fn low(f: &Frequency) -> bool {
            matches!(f, Frequency::Never | Frequency::Rarely)
        }
        const fn high(f: &Frequency) -> bool {
            matches!(f, Frequency::Often | Frequency::Always)
        }
        (low(self) && high(other)) || (high(self) && low(other))
    }
}

/// A concern the parent reported during the interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedConcern {
    pub domain: Domain,
    pub description: String,
    /// How often the parent says the behavior occurs, if they said.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    /// Whether the parent framed this as a strength or a challenge.
    pub polarity: Polarity,
}

/// A parent-facing filming instruction tied to a diagnostic rationale.
///
/// One guideline maps to exactly one video analysis once fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGuideline {
    pub id: GuidelineId,
    pub rationale: String,
    pub instruction: String,
    pub expected_indicators: Vec<String>,
    pub context: ObservationContext,
}

/// Immutable artifact produced by the interview stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSummary {
    /// Schema version for this artifact format
    pub schema_version: String,
    pub concerns: Vec<ReportedConcern>,
    pub strengths: Vec<String>,
    pub video_guidelines: Vec<VideoGuideline>,
}

impl InterviewSummary {
    pub const SCHEMA_VERSION: &'static str = "interview.v1";

    #[must_use]
    pub fn new(
        concerns: Vec<ReportedConcern>,
        strengths: Vec<String>,
        video_guidelines: Vec<VideoGuideline>,
    ) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION.to_string(),
            concerns,
            strengths,
            video_guidelines,
        }
    }
}

/// A single observation extracted from a video by the Oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub text: String,
    pub domain: Domain,
    pub polarity: Polarity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    /// Pointer into the source footage (e.g. "segment 3, 02:10-02:40").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
}

/// Whether a video actually captured what its guideline asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageVerdict {
    Captured,
    PartiallyCaptured,
    NotCaptured,
}

/// Immutable artifact holding the Oracle's analysis of one video.
///
/// The ≥2 strengths floor is a generation-time contract (enforced by the
/// oracle output schema), not a storage invariant: replayed historical
/// artifacts are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualVideoAnalysis {
    /// Schema version for this artifact format
    pub schema_version: String,
    pub guideline_id: GuidelineId,
    pub context: ObservationContext,
    pub observations: Vec<Observation>,
    pub strengths: Vec<String>,
    pub coverage: CoverageVerdict,
}

impl IndividualVideoAnalysis {
    pub const SCHEMA_VERSION: &'static str = "video-analysis.v1";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_conflict_needs_opposite_extremes() {
        assert!(Frequency::Never.conflicts_with(&Frequency::Often));
        assert!(Frequency::Always.conflicts_with(&Frequency::Rarely));
        assert!(!Frequency::Never.conflicts_with(&Frequency::Rarely));
        assert!(!Frequency::Sometimes.conflicts_with(&Frequency::Always));
        assert!(!Frequency::Sometimes.conflicts_with(&Frequency::Never));
    }

    #[test]
    fn weighted_domains() {
        assert!(Domain::EyeContact.is_diagnostically_weighted());
        assert!(Domain::PeerInteraction.is_diagnostically_weighted());
        assert!(!Domain::Motor.is_diagnostically_weighted());
        assert!(!Domain::Other("handedness".into()).is_diagnostically_weighted());
    }

    #[test]
    fn interview_round_trips() {
        let interview = InterviewSummary::new(
            vec![ReportedConcern {
                domain: Domain::EyeContact,
                description: "never makes eye contact".into(),
                frequency: Some(Frequency::Never),
                polarity: Polarity::Challenge,
            }],
            vec!["strong visual memory".into()],
            vec![VideoGuideline {
                id: GuidelineId("g-1".into()),
                rationale: "eye contact varies by partner".into(),
                instruction: "film a play session at home".into(),
                expected_indicators: vec!["gaze to caregiver".into()],
                context: ObservationContext::Home,
            }],
        );
        let json = serde_json::to_string(&interview).unwrap();
        let back: InterviewSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(interview, back);
    }
}
