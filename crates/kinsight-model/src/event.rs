use serde::{Deserialize, Serialize};

use crate::ids::CaseId;
use crate::stage::Stage;

/// Notification emitted on every stage transition, consumed by the chat and
/// notification layer to render messages and action cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub case_id: CaseId,
    pub new_stage: Stage,
    pub summary: String,
    /// Whether the parent (or an operator) must act for the case to move.
    pub action_required: bool,
}

impl StageEvent {
    #[must_use]
    pub fn new(case_id: CaseId, new_stage: Stage, summary: impl Into<String>) -> Self {
        let action_required = matches!(
            new_stage,
            Stage::AwaitingInterview
                | Stage::AwaitingVideos
                | Stage::ClarificationPending
                | Stage::ClarificationAnswering
                | Stage::AwaitingMoreVideo
                | Stage::AwaitingMoreClarification
        );
        Self {
            case_id,
            new_stage,
            summary: summary.into(),
            action_required,
        }
    }
}
