//! Clarification question selection: scoring, budget, and ordering.
//!
//! The selector owns everything the Oracle must not: which candidates make
//! the cut, the budget cap, and a reproducible order. The Oracle only
//! drafts the parent-facing wording afterwards.

use kinsight_model::{
    AnswerType, ArtifactId, ClarificationQuestion, Priority, QuestionCategory, QuestionId,
};
use tracing::debug;

/// Hard cap on questions per clarification round.
const MAX_QUESTIONS: usize = 7;

/// A candidate question before selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub category: QuestionCategory,
    /// Artifact whose content raised the candidate.
    pub trigger: ArtifactId,
    /// Discrepancy record id or pattern description the question targets.
    pub record_ref: Option<String>,
    /// Seed wording; replaced by Oracle-drafted text before the round opens.
    pub text: String,
    pub answer_type: AnswerType,
    /// True when the candidate sits in a diagnostically weighted domain.
    pub weighted_domain: bool,
}

impl Candidate {
    /// Bucket assignment per the selection policy.
    ///
    /// High: unresolved discrepancies, clinically relevant new findings,
    /// pervasiveness gaps in weighted domains. Medium: context and frequency
    /// calibration (plus unweighted pervasiveness gaps). Low:
    /// interpretation-only and history questions.
    #[must_use]
    pub fn priority(&self) -> Priority {
        match self.category {
            QuestionCategory::Discrepancy | QuestionCategory::NewFinding => Priority::High,
            QuestionCategory::Pervasiveness => {
                if self.weighted_domain {
                    Priority::High
                } else {
                    Priority::Medium
                }
            }
            QuestionCategory::Context | QuestionCategory::Frequency => Priority::Medium,
            QuestionCategory::Interpretation | QuestionCategory::History => Priority::Low,
        }
    }
}

/// Select and order clarification questions from candidates.
///
/// Fills from the high bucket, then medium, then low, until the cap of 7.
/// With zero candidates the output is exactly empty; otherwise every
/// candidate up to the cap is kept, so three or more candidates always
/// yield at least three questions. Within a bucket, order is stable by the
/// trigger artifact's creation order, then by input order. Question ids are
/// assigned after ordering, so identical inputs produce identical output.
#[must_use]
pub fn select_questions(candidates: &[Candidate]) -> Vec<ClarificationQuestion> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut indexed: Vec<(usize, &Candidate, Priority)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c, c.priority()))
        .collect();
    indexed.sort_by(|a, b| {
        a.2.cmp(&b.2)
            .then_with(|| a.1.trigger.seq().cmp(&b.1.trigger.seq()))
            .then_with(|| a.0.cmp(&b.0))
    });

    let selected: Vec<ClarificationQuestion> = indexed
        .into_iter()
        .take(MAX_QUESTIONS)
        .enumerate()
        .map(|(n, (_, candidate, priority))| ClarificationQuestion {
            id: QuestionId(format!("q-{}", n + 1)),
            category: candidate.category,
            priority,
            trigger: candidate.trigger.clone(),
            record_ref: candidate.record_ref.clone(),
            text: candidate.text.clone(),
            answer_type: candidate.answer_type,
        })
        .collect();

    debug!(
        candidates = candidates.len(),
        selected = selected.len(),
        "selected clarification questions"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsight_model::ArtifactKind;

    fn candidate(category: QuestionCategory, seq: u32, weighted: bool) -> Candidate {
        Candidate {
            category,
            trigger: ArtifactId::new(ArtifactKind::Integration, seq),
            record_ref: Some(format!("d-{seq}")),
            text: "placeholder".into(),
            answer_type: AnswerType::OpenText,
            weighted_domain: weighted,
        }
    }

    #[test]
    fn empty_candidates_empty_output() {
        assert!(select_questions(&[]).is_empty());
    }

    #[test]
    fn budget_cap_is_seven() {
        let candidates: Vec<_> = (0..12)
            .map(|i| candidate(QuestionCategory::Discrepancy, i, false))
            .collect();
        let questions = select_questions(&candidates);
        assert_eq!(questions.len(), 7);
    }

    #[test]
    fn three_or_more_candidates_yield_at_least_three() {
        let candidates = vec![
            candidate(QuestionCategory::Discrepancy, 1, false),
            candidate(QuestionCategory::Frequency, 2, false),
            candidate(QuestionCategory::Interpretation, 3, false),
        ];
        let questions = select_questions(&candidates);
        assert_eq!(questions.len(), 3);
    }

    #[test]
    fn high_bucket_fills_first() {
        let candidates = vec![
            candidate(QuestionCategory::Interpretation, 1, false),
            candidate(QuestionCategory::Discrepancy, 2, false),
            candidate(QuestionCategory::Frequency, 3, false),
            candidate(QuestionCategory::NewFinding, 4, false),
        ];
        let questions = select_questions(&candidates);
        assert_eq!(questions[0].category, QuestionCategory::Discrepancy);
        assert_eq!(questions[1].category, QuestionCategory::NewFinding);
        assert_eq!(questions[2].category, QuestionCategory::Frequency);
        assert_eq!(questions[3].category, QuestionCategory::Interpretation);
    }

    #[test]
    fn pervasiveness_priority_depends_on_domain_weight() {
        assert_eq!(
            candidate(QuestionCategory::Pervasiveness, 1, true).priority(),
            Priority::High
        );
        assert_eq!(
            candidate(QuestionCategory::Pervasiveness, 1, false).priority(),
            Priority::Medium
        );
    }

    #[test]
    fn within_bucket_order_follows_trigger_creation_order() {
        let candidates = vec![
            candidate(QuestionCategory::Discrepancy, 9, false),
            candidate(QuestionCategory::Discrepancy, 2, false),
            candidate(QuestionCategory::Discrepancy, 5, false),
        ];
        let questions = select_questions(&candidates);
        let seqs: Vec<u32> = questions.iter().map(|q| q.trigger.seq()).collect();
        assert_eq!(seqs, vec![2, 5, 9]);
    }

    #[test]
    fn selection_is_reproducible() {
        let candidates: Vec<_> = (0..10)
            .map(|i| {
                candidate(
                    if i % 2 == 0 {
                        QuestionCategory::Discrepancy
                    } else {
                        QuestionCategory::Context
                    },
                    i,
                    i % 3 == 0,
                )
            })
            .collect();
        assert_eq!(select_questions(&candidates), select_questions(&candidates));
    }
}
