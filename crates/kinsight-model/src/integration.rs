//! Integration artifacts: patterns, discrepancies, and the versioned
//! integration analysis the gate rules on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::artifacts::{Domain, ObservationContext, Polarity};
use crate::ids::ArtifactId;

/// Cross-context pervasiveness classification of a behavioral pattern.
///
/// Pervasiveness across contexts is itself a clinical signal, so the
/// classification is computed deterministically (see the integrator), never
/// left to free-text Oracle judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pervasiveness {
    Pervasive,
    ContextSpecific,
    Minimal,
    NotObserved,
}

/// A behavioral pattern merged across video analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub description: String,
    pub domain: Domain,
    pub pervasiveness: Pervasiveness,
    /// Video analyses supporting this pattern, in creation order.
    pub supporting_analyses: BTreeSet<ArtifactId>,
    /// Distinct contexts in which the pattern was observed.
    pub contexts: BTreeSet<ObservationContext>,
    pub polarity: Polarity,
    /// Set when a parent answer explicitly confirmed the pattern holds
    /// across contexts; the only way a lone context can count as pervasive.
    pub parent_confirmed: bool,
}

impl Pattern {
    /// Invariant check: `Pervasive` requires covering all but at most one of
    /// the analyzed contexts (and more than a single context), unless a
    /// parent confirmation backs the claim.
    #[must_use]
    pub fn pervasiveness_supported(&self, total_contexts: usize) -> bool {
        match self.pervasiveness {
            Pervasiveness::Pervasive => {
                self.parent_confirmed
                    || (self.contexts.len() + 1 >= total_contexts && self.contexts.len() >= 2)
            }
            _ => true,
        }
    }
}

/// Resolution state of an interview-vs-evidence divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Unresolved,
    ResolvedContextDifference,
    ResolvedParentConfirmed,
    /// The parent's answer did not explain the gap. Never silently dropped:
    /// it is surfaced verbatim as a report limitation.
    ResolvedContradictionUnexplained,
}

impl ResolutionState {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// A divergence between what the interview claimed and what the evidence
/// shows, plus how (or whether) it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    pub id: String,
    pub domain: Domain,
    /// The interview claim; empty for new findings with no interview claim.
    pub source_claim: String,
    pub observed_claim: String,
    pub resolution: ResolutionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_text: Option<String>,
}

impl DiscrepancyRecord {
    /// A finding that appeared in video evidence with no corresponding
    /// interview claim.
    #[must_use]
    pub fn is_new_finding(&self) -> bool {
        self.source_claim.is_empty()
    }
}

/// Confidence the pipeline has in the current integration analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Moderate,
    High,
}

impl Confidence {
    /// Next level up; `High` saturates.
    #[must_use]
    pub const fn raised(self) -> Self {
        match self {
            Self::Low => Self::Moderate,
            Self::Moderate | Self::High => Self::High,
        }
    }

    /// Next level down; `Low` saturates.
    #[must_use]
    pub const fn lowered(self) -> Self {
        match self {
            Self::High => Self::Moderate,
            Self::Moderate | Self::Low => Self::Low,
        }
    }
}

/// Whether the evidence plan was actually fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Full,
    Partial,
}

/// Sufficiency gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    ReportReady,
    ClarificationPending,
    AwaitingMoreVideo,
    AwaitingMoreClarification,
}

/// Derived strength/challenge summary. Reporting only: never feeds back
/// into pervasiveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrengthChallengeBalance {
    pub pervasive_challenges: usize,
    pub core_strengths: usize,
}

/// Versioned integration artifact (v1, v2, ...).
///
/// Each re-integration writes a new analysis naming its exact predecessor;
/// the store rejects writes whose predecessor is no longer the head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationAnalysis {
    /// Schema version for this artifact format
    pub schema_version: String,
    /// 1-based analysis version within the case.
    pub version: u32,
    /// Artifact ID of the integration analysis this one supersedes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<ArtifactId>,
    pub patterns: Vec<Pattern>,
    pub discrepancies: Vec<DiscrepancyRecord>,
    pub confidence: Confidence,
    pub coverage: Coverage,
    /// Gate verdict, recorded once the gate has ruled on this version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sufficiency: Option<GateVerdict>,
    pub balance: StrengthChallengeBalance,
    /// Parent-readable synthesis drafted by the Oracle. Prose only; every
    /// classification in this artifact is computed, not narrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Unresolved or unexplained items carried into the report verbatim.
    pub limitations: Vec<String>,
}

impl IntegrationAnalysis {
    pub const SCHEMA_VERSION: &'static str = "integration.v1";

    /// Count of discrepancies still unresolved or unexplained.
    ///
    /// `ResolvedContradictionUnexplained` counts here: an answer that fails
    /// to explain the gap leaves it open for gating purposes.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| {
                matches!(
                    d.resolution,
                    ResolutionState::Unresolved | ResolutionState::ResolvedContradictionUnexplained
                )
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(contexts: &[ObservationContext], pervasiveness: Pervasiveness) -> Pattern {
        Pattern {
            description: "limited peer initiation".into(),
            domain: Domain::PeerInteraction,
            pervasiveness,
            supporting_analyses: BTreeSet::new(),
            contexts: contexts.iter().cloned().collect(),
            polarity: Polarity::Challenge,
            parent_confirmed: false,
        }
    }

    #[test]
    fn pervasive_needs_all_but_one_context() {
        use ObservationContext::{Home, Outdoor, Peers};
        let p = pattern(&[Home, Peers], Pervasiveness::Pervasive);
        assert!(p.pervasiveness_supported(3));
        assert!(!p.pervasiveness_supported(4));

        let all = pattern(&[Home, Peers, Outdoor], Pervasiveness::Pervasive);
        assert!(all.pervasiveness_supported(3));
    }

    #[test]
    fn lone_context_never_pervasive_without_confirmation() {
        let p = pattern(&[ObservationContext::Home], Pervasiveness::Pervasive);
        assert!(!p.pervasiveness_supported(1));
        assert!(!p.pervasiveness_supported(2));

        let mut confirmed = p;
        confirmed.parent_confirmed = true;
        assert!(confirmed.pervasiveness_supported(2));
    }

    #[test]
    fn confidence_saturates() {
        assert_eq!(Confidence::Low.raised(), Confidence::Moderate);
        assert_eq!(Confidence::High.raised(), Confidence::High);
        assert_eq!(Confidence::Low.lowered(), Confidence::Low);
        assert_eq!(Confidence::High.lowered(), Confidence::Moderate);
    }

    #[test]
    fn unexplained_contradictions_count_as_unresolved() {
        let analysis = IntegrationAnalysis {
            schema_version: IntegrationAnalysis::SCHEMA_VERSION.to_string(),
            version: 2,
            predecessor: Some(ArtifactId::new(crate::ids::ArtifactKind::Integration, 3)),
            patterns: vec![],
            discrepancies: vec![
                DiscrepancyRecord {
                    id: "d-1".into(),
                    domain: Domain::EyeContact,
                    source_claim: "never".into(),
                    observed_claim: "often at home".into(),
                    resolution: ResolutionState::ResolvedContextDifference,
                    resolution_text: Some("only hard with peers".into()),
                },
                DiscrepancyRecord {
                    id: "d-2".into(),
                    domain: Domain::Sensory,
                    source_claim: "no sensitivities".into(),
                    observed_claim: "covers ears at mealtime".into(),
                    resolution: ResolutionState::ResolvedContradictionUnexplained,
                    resolution_text: Some("parent did not address noise".into()),
                },
            ],
            confidence: Confidence::Moderate,
            coverage: Coverage::Full,
            sufficiency: None,
            balance: StrengthChallengeBalance::default(),
            narrative: None,
            limitations: vec![],
        };
        assert_eq!(analysis.unresolved_count(), 1);
    }

    #[test]
    fn integration_analysis_round_trips() {
        let analysis = IntegrationAnalysis {
            schema_version: IntegrationAnalysis::SCHEMA_VERSION.to_string(),
            version: 1,
            predecessor: None,
            patterns: vec![pattern(
                &[ObservationContext::Home, ObservationContext::Peers],
                Pervasiveness::ContextSpecific,
            )],
            discrepancies: vec![],
            confidence: Confidence::Low,
            coverage: Coverage::Partial,
            sufficiency: Some(GateVerdict::AwaitingMoreVideo),
            balance: StrengthChallengeBalance {
                pervasive_challenges: 0,
                core_strengths: 2,
            },
            narrative: Some("Eye contact comes easily at home and is harder with peers.".into()),
            limitations: vec!["playground guideline unfulfilled".into()],
        };
        let json = serde_json::to_string_pretty(&analysis).unwrap();
        let back: IntegrationAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(analysis, back);
    }
}
