use serde::{Deserialize, Serialize};

/// Stages a case moves through, from first interview to report handoff.
///
/// `current_stage` is the only mutable field on a case; everything else is
/// reconstructible by replaying artifacts in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(test, derive(strum::VariantNames))]
pub enum Stage {
    AwaitingInterview,
    AwaitingVideos,
    AnalyzingVideos,
    Integrating,
    ClarificationPending,
    ClarificationAnswering,
    ReIntegrating,
    Gated,
    ReportReady,
    AwaitingMoreVideo,
    AwaitingMoreClarification,
}

impl Stage {
    /// Returns the string representation of the stage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingInterview => "awaiting_interview",
            Self::AwaitingVideos => "awaiting_videos",
            Self::AnalyzingVideos => "analyzing_videos",
            Self::Integrating => "integrating",
            Self::ClarificationPending => "clarification_pending",
            Self::ClarificationAnswering => "clarification_answering",
            Self::ReIntegrating => "re_integrating",
            Self::Gated => "gated",
            Self::ReportReady => "report_ready",
            Self::AwaitingMoreVideo => "awaiting_more_video",
            Self::AwaitingMoreClarification => "awaiting_more_clarification",
        }
    }

    /// Whether the stage is a terminal or explicit-wait state.
    ///
    /// `AwaitingMoreVideo` and `AwaitingMoreClarification` are re-entrant:
    /// new evidence moves the case back into the pipeline.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ReportReady | Self::AwaitingMoreVideo | Self::AwaitingMoreClarification
        )
    }

    /// Whether parent answers may be ingested in this stage.
    ///
    /// `ClarificationPending` opens the round implicitly on first submission;
    /// `ReIntegrating` accepts a resubmission after an interrupted round.
    #[must_use]
    pub const fn accepts_answers(&self) -> bool {
        matches!(
            self,
            Self::ClarificationPending | Self::ClarificationAnswering | Self::ReIntegrating
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
