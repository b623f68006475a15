//! HTTP Oracle backend for the Anthropic Messages API.
//!
//! The prompt template and structured inputs are rendered into a single
//! user message; the model is instructed to answer with bare JSON, which is
//! then schema-validated before acceptance.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::validate_output;
use crate::types::{Oracle, OracleError, OracleRequest, OracleResponse, TemplateId};

/// Default Anthropic API endpoint
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key. Keys never appear in config
/// files or artifacts.
pub const API_KEY_ENV: &str = "KINSIGHT_API_KEY";

/// HTTP-backed Oracle speaking the Anthropic Messages API.
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl HttpOracle {
    /// Construct a backend, reading the API key from [`API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Misconfiguration` if the key is unset or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: Option<String>,
        model: String,
        timeout: Duration,
        max_tokens: u32,
    ) -> Result<Self, OracleError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            OracleError::Misconfiguration(format!(
                "API key not found in environment variable '{API_KEY_ENV}'"
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Misconfiguration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model,
            max_tokens,
        })
    }

    /// System prompt selecting the reasoning task for a template. The full
    /// clinical instruction text lives server-side with the template; this
    /// names the contract.
    fn system_prompt(template: TemplateId) -> String {
        format!(
            "You are the reasoning component of a developmental-assessment pipeline. \
             Execute the '{template}' task over the JSON inputs provided. \
             Respond with a single JSON object matching the declared output schema \
             for '{template}', with no surrounding prose or markdown fences."
        )
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn invoke(&self, req: OracleRequest) -> Result<OracleResponse, OracleError> {
        debug!(
            template = %req.template,
            case = %req.case_id,
            model = %self.model,
            "invoking HTTP oracle"
        );

        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Self::system_prompt(req.template),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: req.inputs.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "API returned status {status}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(format!("malformed API response: {e}")))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(OracleError::ContractViolation {
                template: req.template,
                reason: "response carried no text content".to_string(),
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(text.trim()).map_err(|e| OracleError::ContractViolation {
                template: req.template,
                reason: format!("output is not valid JSON: {e}"),
            })?;

        validate_output(req.template, &raw)?;

        Ok(OracleResponse {
            raw,
            provider: "anthropic".to_string(),
            model: self.model.clone(),
            tokens_input: parsed.usage.as_ref().map(|u| u.input_tokens),
            tokens_output: parsed.usage.as_ref().map(|u| u.output_tokens),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
