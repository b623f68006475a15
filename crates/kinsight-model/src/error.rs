//! Library-level error type with exit-code mapping.

use thiserror::Error;

use crate::ids::ArtifactId;
use crate::stage::Stage;

/// Primary error type returned by kinsight library operations.
///
/// Recoverable clinical conditions are deliberately *not* errors: an
/// insufficient-evidence outcome is a gate verdict, a skipped clarification
/// is data on the answer artifact, and an unexplained contradiction is a
/// resolution state carried into the report. Only contract and state
/// violations surface here.
#[derive(Debug, Error)]
pub enum KinsightError {
    /// Oracle output failed schema validation or was empty/truncated.
    /// Retried with identical inputs up to a fixed bound; on exhaustion the
    /// case stage is frozen and surfaced as an operator-visible fault.
    #[error("oracle contract violation for template '{template}': {reason}")]
    OracleContractViolation { template: String, reason: String },

    /// Oracle transport failure (network, process, timeout).
    #[error("oracle invocation failed: {0}")]
    OracleUnavailable(String),

    /// A stage attempted to build on a superseded artifact version.
    #[error("stale artifact reference: expected head {expected}, found {found}")]
    StaleArtifactReference {
        expected: ArtifactId,
        found: ArtifactId,
    },

    /// Answer submission referenced an unknown or expired question id.
    /// Rejected with no state mutation.
    #[error("malformed clarification submission: {0}")]
    MalformedSubmission(String),

    /// Operation not valid for the case's current stage.
    #[error("invalid transition: operation '{operation}' not allowed in stage '{from}'")]
    InvalidTransition { from: Stage, operation: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl KinsightError {
    /// Map the error to a CLI exit code.
    #[must_use]
    pub const fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidTransition { .. } => ExitCode::InvalidTransition,
            Self::MalformedSubmission(_) => ExitCode::MalformedSubmission,
            Self::StaleArtifactReference { .. } => ExitCode::StaleArtifact,
            Self::OracleContractViolation { .. } | Self::OracleUnavailable(_) => {
                ExitCode::OracleFailure
            }
            Self::Store(_) | Self::Io(_) | Self::Serde(_) => ExitCode::Generic,
        }
    }
}

/// CLI exit codes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Generic,
    Usage,
    InvalidTransition,
    MalformedSubmission,
    StaleArtifact,
    OracleFailure,
}

impl ExitCode {
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Generic => 1,
            Self::Usage => 2,
            Self::InvalidTransition => 3,
            Self::MalformedSubmission => 4,
            Self::StaleArtifact => 5,
            Self::OracleFailure => 70,
        }
    }
}
