//! Core types for the Oracle boundary.

use async_trait::async_trait;
use kinsight_model::{CaseId, KinsightError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prompt templates the pipeline may invoke. Each has a declared output
/// schema in [`crate::schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    /// Read one video (via evidence references) and emit structured
    /// observations, strengths, and a coverage verdict.
    VideoAnalysis,
    /// Draft the parent-readable narrative for an integration analysis.
    Integration,
    /// Word the already-selected clarification questions for the parent.
    ClarificationDrafting,
    /// Interpret parent answers against unresolved discrepancy records.
    ClarificationIntegration,
    /// Final report synthesis, invoked by the external report collaborator.
    Report,
}

impl TemplateId {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VideoAnalysis => "video-analysis",
            Self::Integration => "integration",
            Self::ClarificationDrafting => "clarification-drafting",
            Self::ClarificationIntegration => "clarification-integration",
            Self::Report => "report",
        }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to an Oracle invocation. Inputs are structured JSON assembled from
/// artifact data, so re-invoking with the same request is always possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub case_id: CaseId,
    pub template: TemplateId,
    pub inputs: serde_json::Value,
}

impl OracleRequest {
    #[must_use]
    pub fn new(case_id: CaseId, template: TemplateId, inputs: serde_json::Value) -> Self {
        Self {
            case_id,
            template,
            inputs,
        }
    }
}

/// Schema-validated output of an Oracle invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    /// The structured output, already validated against the template schema.
    pub raw: serde_json::Value,
    pub provider: String,
    pub model: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

/// Errors crossing the Oracle boundary.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Output failed schema validation or was empty/truncated.
    #[error("contract violation for template '{template}': {reason}")]
    ContractViolation { template: TemplateId, reason: String },

    /// Network, process, or timeout failure. Retryable.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Backend cannot be constructed or used as configured.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// Retry bound exhausted; the case stage must be frozen and surfaced as
    /// an operator-visible fault.
    #[error("retries exhausted for template '{template}' after {attempts} attempts: {last}")]
    Exhausted {
        template: TemplateId,
        attempts: u32,
        last: String,
    },
}

impl OracleError {
    /// Whether a retry with identical inputs can possibly help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ContractViolation { .. } | Self::Transport(_))
    }
}

impl From<OracleError> for KinsightError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::ContractViolation { template, reason } => {
                KinsightError::OracleContractViolation {
                    template: template.as_str().to_string(),
                    reason,
                }
            }
            other => KinsightError::OracleUnavailable(other.to_string()),
        }
    }
}

/// The reasoning boundary. Stateless: all context arrives in the request.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Invoke the Oracle with the given template and structured inputs.
    ///
    /// Implementations must validate their output against the template's
    /// schema (see [`crate::schema::validate_output`]) before returning it.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` for transport failures, misconfiguration, and
    /// schema-invalid output.
    async fn invoke(&self, req: OracleRequest) -> Result<OracleResponse, OracleError>;
}
