//! Interview-versus-evidence discrepancy detection and resolution.
//!
//! Pass 1 runs before clarification and only ever produces `Unresolved`
//! records. Pass 2 runs after the clarification round, touches only
//! previously unresolved records, and applies Oracle-proposed
//! interpretations under deterministic merge rules: a record changes state
//! only when a matching question exists and its answer was actually given.
//! Skipped and timed-out answers are indistinguishable here.

use kinsight_model::{
    ClarificationAnswer, ClarificationQuestion, DiscrepancyRecord, IndividualVideoAnalysis,
    InterviewSummary, Polarity, ResolutionState,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Resolution the Oracle proposes for one record after reading the parent's
/// answer. Free-text interpretation lives behind the Oracle contract; this
/// crate only decides whether the proposal may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposedResolution {
    ContextDifference,
    ParentConfirmed,
    /// The answer was given but does not explain the gap.
    ContradictionUnexplained,
}

/// One Oracle-produced interpretation of a clarification answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerInterpretation {
    /// `DiscrepancyRecord::id` this interpretation targets.
    pub record_id: String,
    pub resolution: ProposedResolution,
    pub text: String,
}

/// Pass 1: match interview claims to video observations by domain and flag
/// divergence.
///
/// A record is produced when a claim and an observation in the same domain
/// disagree on polarity, or carry conflicting frequency descriptors
/// ("never" against observed-repeatedly). Observation domains with no
/// interview claim at all become new-finding records (empty `source_claim`)
/// when the evidence shows a challenge. Record ids are assigned in
/// deterministic order.
pub fn resolve_discrepancies(
    interview: &InterviewSummary,
    analyses: &[&IndividualVideoAnalysis],
) -> Vec<DiscrepancyRecord> {
    let mut records = Vec::new();
    let mut next_id = {
        let mut n = 0u32;
        move || {
            n += 1;
            format!("d-{n}")
        }
    };

    for concern in &interview.concerns {
        for analysis in analyses {
            let conflicting = analysis.observations.iter().find(|obs| {
                if obs.domain != concern.domain {
                    return false;
                }
                let polarity_conflict = obs.polarity != concern.polarity;
                let frequency_conflict = match (concern.frequency, obs.frequency) {
                    (Some(claimed), Some(observed)) => claimed.conflicts_with(&observed),
                    _ => false,
                };
                polarity_conflict || frequency_conflict
            });
            if let Some(obs) = conflicting {
                debug!(domain = ?concern.domain, "flagged interview/evidence divergence");
                records.push(DiscrepancyRecord {
                    id: next_id(),
                    domain: concern.domain.clone(),
                    source_claim: concern.description.clone(),
                    observed_claim: obs.text.clone(),
                    resolution: ResolutionState::Unresolved,
                    resolution_text: None,
                });
                break; // one record per claim; further videos add no new state
            }
        }
    }

    // New findings: challenge evidence in domains the interview never named.
    for analysis in analyses {
        for obs in &analysis.observations {
            if obs.polarity != Polarity::Challenge {
                continue;
            }
            let claimed = interview.concerns.iter().any(|c| c.domain == obs.domain);
            let already = records.iter().any(|r| r.domain == obs.domain && r.is_new_finding());
            if !claimed && !already {
                records.push(DiscrepancyRecord {
                    id: next_id(),
                    domain: obs.domain.clone(),
                    source_claim: String::new(),
                    observed_claim: obs.text.clone(),
                    resolution: ResolutionState::Unresolved,
                    resolution_text: None,
                });
            }
        }
    }

    records
}

/// Pass 2: re-resolve previously unresolved records against clarification
/// answers.
///
/// Merge rules, in order:
/// - already-resolved records pass through untouched;
/// - no question targets the record, or its answer was skipped or never
///   given: the record stays `Unresolved`;
/// - otherwise the Oracle's interpretation applies, mapping to
///   `ResolvedContextDifference`, `ResolvedParentConfirmed`, or
///   `ResolvedContradictionUnexplained`; the last is never dropped and is
///   surfaced verbatim in the final report.
pub fn resolve_with_answers(
    records: &[DiscrepancyRecord],
    questions: &[ClarificationQuestion],
    answers: &[ClarificationAnswer],
    interpretations: &[AnswerInterpretation],
) -> Vec<DiscrepancyRecord> {
    records
        .iter()
        .map(|record| {
            if record.resolution.is_resolved() {
                return record.clone();
            }

            let question = questions
                .iter()
                .find(|q| q.record_ref.as_deref() == Some(record.id.as_str()));
            let Some(question) = question else {
                return record.clone();
            };

            let answered = answers
                .iter()
                .find(|a| a.question_id == question.id && !a.is_skipped());
            let Some(_) = answered else {
                // Skipped and unanswered are treated identically.
                return record.clone();
            };

            let Some(interp) = interpretations.iter().find(|i| i.record_id == record.id) else {
                return record.clone();
            };

            let resolution = match interp.resolution {
                ProposedResolution::ContextDifference => ResolutionState::ResolvedContextDifference,
                ProposedResolution::ParentConfirmed => ResolutionState::ResolvedParentConfirmed,
                ProposedResolution::ContradictionUnexplained => {
                    ResolutionState::ResolvedContradictionUnexplained
                }
            };
            debug!(record = %record.id, resolution = ?resolution, "applied answer interpretation");
            DiscrepancyRecord {
                resolution,
                resolution_text: Some(interp.text.clone()),
                ..record.clone()
            }
        })
        .collect()
}
