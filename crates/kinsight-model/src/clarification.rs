//! Clarification round artifacts: questions, answers, confidence ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtifactId, QuestionId};
use crate::integration::Confidence;

/// What triggered a clarification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Discrepancy,
    NewFinding,
    Pervasiveness,
    Context,
    Frequency,
    Interpretation,
    History,
}

/// Selection priority bucket for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Shape of answer the question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    OpenText,
    MultipleChoice,
    Rating,
    YesNo,
}

/// A question put to the parent during the single clarification round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: QuestionId,
    pub category: QuestionCategory,
    pub priority: Priority,
    /// The artifact whose content triggered this question.
    pub trigger: ArtifactId,
    /// Discrepancy record id or pattern description this question targets,
    /// so pass-2 resolution can match answers back deterministically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_ref: Option<String>,
    pub text: String,
    pub answer_type: AnswerType,
}

/// A parent's answer to (or skip of) one clarification question.
///
/// Exactly one of `answered_at` / `skipped_at` is set; the constructors are
/// the only way to build one, so the invariant holds everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<DateTime<Utc>>,
}

impl ClarificationAnswer {
    /// An answered question.
    #[must_use]
    pub fn answered(
        question_id: QuestionId,
        raw_text: impl Into<String>,
        structured_choice: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id,
            raw_text: Some(raw_text.into()),
            structured_choice,
            answered_at: Some(at),
            skipped_at: None,
        }
    }

    /// An explicitly skipped question. Timed-out questions use the same
    /// representation; downstream resolution treats both identically.
    #[must_use]
    pub fn skipped(question_id: QuestionId, at: DateTime<Utc>) -> Self {
        Self {
            question_id,
            raw_text: None,
            structured_choice: None,
            answered_at: None,
            skipped_at: Some(at),
        }
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skipped_at.is_some()
    }

    /// Answer text, if the question was actually answered.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if self.is_skipped() {
            None
        } else {
            self.raw_text.as_deref()
        }
    }
}

/// One entry in the per-case confidence ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Integration analysis version this entry was computed for.
    pub version: u32,
    pub confidence: Confidence,
    pub delta_reason: String,
    pub contributing_answers: Vec<QuestionId>,
}

/// Append-only record of how confidence moved across integration rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceLedger {
    /// Schema version for this artifact format
    pub schema_version: String,
    pub entries: Vec<LedgerEntry>,
}

impl ConfidenceLedger {
    pub const SCHEMA_VERSION: &'static str = "confidence-ledger.v1";

    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION.to_string(),
            entries: Vec::new(),
        }
    }

    /// Latest recorded confidence, defaulting to `Low` before any entry.
    #[must_use]
    pub fn current(&self) -> Confidence {
        self.entries.last().map_or(Confidence::Low, |e| e.confidence)
    }
}

impl Default for ConfidenceLedger {
    fn default() -> Self {
        Self::new()
    }
}
