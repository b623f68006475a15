//! Identifier newtypes for cases, artifacts, guidelines, and questions.
//!
//! Case IDs double as directory names in the store, so they are validated
//! on construction instead of sanitized on use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for case ID validation failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CaseIdError {
    #[error("case ID is empty")]
    Empty,

    #[error("case ID contains invalid character '{0}' (allowed: lowercase alphanumeric and '-')")]
    InvalidCharacter(char),

    #[error("case ID must not start or end with '-'")]
    BadHyphen,
}

/// Validated case identifier, safe for use as a directory name.
///
/// Accepts only lowercase ASCII alphanumerics and interior dashes, which
/// rules out path traversal and platform-specific filename surprises.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Validate and construct a case ID.
    ///
    /// # Errors
    ///
    /// Returns `CaseIdError` if the input is empty, contains characters
    /// outside `[a-z0-9-]`, or has a leading/trailing dash.
    pub fn new(id: &str) -> Result<Self, CaseIdError> {
        if id.is_empty() {
            return Err(CaseIdError::Empty);
        }
        if let Some(c) = id.chars().find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-') {
            return Err(CaseIdError::InvalidCharacter(c));
        }
        if id.starts_with('-') || id.ends_with('-') {
            return Err(CaseIdError::BadHyphen);
        }
        Ok(Self(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of artifacts the pipeline appends to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(test, derive(strum::VariantNames))]
pub enum ArtifactKind {
    Interview,
    VideoAnalysis,
    Integration,
    ClarificationQuestions,
    ClarificationAnswers,
    ConfidenceLedger,
}

impl ArtifactKind {
    /// Returns the string representation used in artifact filenames.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::VideoAnalysis => "video-analysis",
            Self::Integration => "integration",
            Self::ClarificationQuestions => "clarification-questions",
            Self::ClarificationAnswers => "clarification-answers",
            Self::ConfidenceLedger => "confidence-ledger",
        }
    }
}

/// Store-assigned artifact identifier: `{kind}-{seq:04}`.
///
/// The sequence number is global per case and assigned in creation order,
/// so lexicographic comparison of the numeric suffix reproduces the total
/// artifact order the orchestrator relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    #[must_use]
    pub fn new(kind: ArtifactKind, seq: u32) -> Self {
        Self(format!("{}-{seq:04}", kind.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation sequence number encoded in the ID.
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.0
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a filming guideline issued by the interview stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidelineId(pub String);

impl fmt::Display for GuidelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a clarification question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
