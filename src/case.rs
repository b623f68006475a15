//! The case aggregate: mutable stage head plus an index of immutable
//! artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kinsight_model::{ArtifactId, ArtifactKind, CaseId, GuidelineId, Stage};

/// Index entry for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    /// First 8 characters of the BLAKE3 hash of the stored payload.
    pub blake3_first8: String,
    /// Path relative to the case directory.
    pub path: String,
    /// Guideline id, for video-analysis artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Root aggregate for one child's assessment cycle.
///
/// `current_stage` is the only field later stages mutate; artifacts are
/// append-only and the index preserves creation order, so the full history
/// replays from the artifact list alone. `declined_guidelines` records the
/// parent's explicit skip signal, which produces no artifact of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Schema version for the case head format
    pub schema_version: String,
    pub case_id: CaseId,
    pub child_ref: String,
    pub current_stage: Stage,
    pub created_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactRecord>,
    pub declined_guidelines: Vec<GuidelineId>,
    next_seq: u32,
}

impl Case {
    pub const SCHEMA_VERSION: &'static str = "case.v1";

    #[must_use]
    pub fn new(case_id: CaseId, child_ref: impl Into<String>) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION.to_string(),
            case_id,
            child_ref: child_ref.into(),
            current_stage: Stage::AwaitingInterview,
            created_at: Utc::now(),
            artifacts: Vec::new(),
            declined_guidelines: Vec::new(),
            next_seq: 1,
        }
    }

    /// Allocate the next artifact sequence number.
    pub(crate) fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Latest artifact of a kind, by creation order.
    #[must_use]
    pub fn latest(&self, kind: ArtifactKind) -> Option<&ArtifactRecord> {
        self.artifacts.iter().rev().find(|a| a.kind == kind)
    }

    /// All artifacts of a kind, in creation order.
    #[must_use]
    pub fn all_of(&self, kind: ArtifactKind) -> Vec<&ArtifactRecord> {
        self.artifacts.iter().filter(|a| a.kind == kind).collect()
    }

    /// Guideline ids with a completed video analysis.
    #[must_use]
    pub fn fulfilled_guidelines(&self) -> Vec<GuidelineId> {
        self.all_of(ArtifactKind::VideoAnalysis)
            .iter()
            .filter_map(|a| a.label.clone().map(GuidelineId))
            .collect()
    }

    /// Completed clarification rounds, derived rather than tracked: a round
    /// counts once its question set has at least one answer batch after it.
    #[must_use]
    pub fn rounds_done(&self) -> u32 {
        self.all_of(ArtifactKind::ClarificationQuestions)
            .iter()
            .filter(|q| {
                self.all_of(ArtifactKind::ClarificationAnswers)
                    .iter()
                    .any(|a| a.id.seq() > q.id.seq())
            })
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_case_awaits_interview() {
        let case = Case::new(CaseId::new("case-1").unwrap(), "child-a");
        assert_eq!(case.current_stage, Stage::AwaitingInterview);
        assert!(case.artifacts.is_empty());
        assert_eq!(case.rounds_done(), 0);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut case = Case::new(CaseId::new("case-1").unwrap(), "child-a");
        assert_eq!(case.take_seq(), 1);
        assert_eq!(case.take_seq(), 2);
        assert_eq!(case.take_seq(), 3);
    }
}
