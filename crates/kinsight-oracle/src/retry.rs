//! Bounded-retry decorator over any Oracle backend.

use async_trait::async_trait;
use tracing::warn;

use crate::types::{Oracle, OracleError, OracleRequest, OracleResponse};

/// Retries failed invocations with identical inputs up to a fixed bound.
///
/// Safe because requests are assembled purely from immutable artifact data.
/// Non-retryable errors (misconfiguration) pass through immediately; on
/// exhaustion the caller freezes the case stage.
pub struct RetryingOracle {
    inner: Box<dyn Oracle>,
    max_retries: u32,
}

impl RetryingOracle {
    /// Wrap a backend with `max_retries` additional attempts after the
    /// first failure.
    #[must_use]
    pub fn new(inner: Box<dyn Oracle>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl Oracle for RetryingOracle {
    async fn invoke(&self, req: OracleRequest) -> Result<OracleResponse, OracleError> {
        let mut last: Option<OracleError> = None;

        for attempt in 0..=self.max_retries {
            match self.inner.invoke(req.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    warn!(
                        template = %req.template,
                        attempt = attempt + 1,
                        max = self.max_retries + 1,
                        error = %err,
                        "oracle invocation failed, retrying with identical inputs"
                    );
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(OracleError::Exhausted {
            template: req.template,
            attempts: self.max_retries + 1,
            last: last.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TemplateId;
    use kinsight_model::CaseId;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyOracle {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl Oracle for FlakyOracle {
        async fn invoke(&self, _req: OracleRequest) -> Result<OracleResponse, OracleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(OracleResponse {
                    raw: json!({"narrative": "ok"}),
                    provider: "flaky".into(),
                    model: "test".into(),
                    tokens_input: None,
                    tokens_output: None,
                })
            } else {
                Err(OracleError::Transport("connection reset".into()))
            }
        }
    }

    fn request() -> OracleRequest {
        OracleRequest::new(
            CaseId::new("case-1").unwrap(),
            TemplateId::Integration,
            json!({}),
        )
    }

    #[tokio::test]
    async fn retries_until_success_within_bound() {
        let oracle = RetryingOracle::new(
            Box::new(FlakyOracle {
                calls: AtomicU32::new(0),
                succeed_on: 3,
            }),
            2,
        );
        assert!(oracle.invoke(request()).await.is_ok());
    }

    #[tokio::test]
    async fn exhaustion_reports_attempt_count() {
        let oracle = RetryingOracle::new(
            Box::new(FlakyOracle {
                calls: AtomicU32::new(0),
                succeed_on: 10,
            }),
            2,
        );
        let err = oracle.invoke(request()).await.unwrap_err();
        match err {
            OracleError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn misconfiguration_is_not_retried() {
        use std::sync::Arc;

        struct Misconfigured(Arc<AtomicU32>);

        #[async_trait]
        impl Oracle for Misconfigured {
            async fn invoke(&self, _req: OracleRequest) -> Result<OracleResponse, OracleError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Misconfiguration("no api key".into()))
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let oracle = RetryingOracle::new(Box::new(Misconfigured(Arc::clone(&calls))), 5);
        let err = oracle.invoke(request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Misconfiguration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
