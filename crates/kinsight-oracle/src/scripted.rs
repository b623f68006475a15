//! Scripted Oracle backend for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::schema::validate_output;
use crate::types::{Oracle, OracleError, OracleRequest, OracleResponse, TemplateId};

/// Serves canned responses from per-template queues, validating each against
/// the template schema exactly like a real backend. An empty queue is a
/// transport failure, which exercises the retry and freeze paths.
#[derive(Default)]
pub struct ScriptedOracle {
    responses: Mutex<HashMap<TemplateId, Vec<Value>>>,
}

impl ScriptedOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a template. Responses are served in FIFO order.
    pub fn push(&self, template: TemplateId, response: Value) {
        self.responses
            .lock()
            .expect("scripted oracle lock poisoned")
            .entry(template)
            .or_default()
            .push(response);
    }

    /// Builder-style variant of [`push`](Self::push) for test setup.
    #[must_use]
    pub fn with_response(self, template: TemplateId, response: Value) -> Self {
        self.push(template, response);
        self
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn invoke(&self, req: OracleRequest) -> Result<OracleResponse, OracleError> {
        let raw = {
            let mut responses = self
                .responses
                .lock()
                .expect("scripted oracle lock poisoned");
            let queue = responses.entry(req.template).or_default();
            if queue.is_empty() {
                return Err(OracleError::Transport(format!(
                    "no scripted response queued for template '{}'",
                    req.template
                )));
            }
            queue.remove(0)
        };

        debug!(template = %req.template, case = %req.case_id, "serving scripted response");
        validate_output(req.template, &raw)?;
        Ok(OracleResponse {
            raw,
            provider: "scripted".to_string(),
            model: "scripted".to_string(),
            tokens_input: None,
            tokens_output: None,
        })
    }
}
