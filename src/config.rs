//! Configuration: defaults, then `kinsight.toml`, then CLI flags.
//!
//! The API key is deliberately absent here; `HttpOracle` reads it from the
//! environment so it can never end up in a config file or artifact.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use kinsight_model::KinsightError;
use kinsight_oracle::{HttpOracle, Oracle, RetryingOracle, ScriptedOracle};

pub const CONFIG_FILE: &str = "kinsight.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory for case storage.
    pub store_root: Utf8PathBuf,
    pub oracle: OracleConfig,
    /// Hours without parent action before a case is flagged as stalled.
    pub deadman_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: Utf8PathBuf::from(".kinsight"),
            oracle: OracleConfig::default(),
            deadman_hours: 72,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub model: String,
    /// Override for the API endpoint; the provider default applies if unset.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Retries after the first attempt, with identical inputs.
    pub max_retries: u32,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            timeout_secs: 120,
            max_retries: 2,
            max_tokens: 8192,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleProvider {
    Anthropic,
    /// Canned responses only; for tests and dry runs.
    Scripted,
}

impl Config {
    /// Load configuration, layering `kinsight.toml` (if present) over the
    /// defaults. An explicit path that does not exist is an error; the
    /// implicit one is not.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, KinsightError> {
        let (path, required) = match path {
            Some(p) => (p.to_owned(), true),
            None => (Utf8PathBuf::from(CONFIG_FILE), false),
        };
        if !path.is_file() {
            if required {
                return Err(KinsightError::Store(format!(
                    "config file {path} not found"
                )));
            }
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| KinsightError::Store(format!("invalid config {path}: {e}")))?;
        debug!(%path, "loaded configuration");
        Ok(config)
    }

    /// Build the configured Oracle backend, wrapped in the retry bound.
    pub fn build_oracle(&self) -> Result<Arc<dyn Oracle>, KinsightError> {
        let inner: Box<dyn Oracle> = match self.oracle.provider {
            OracleProvider::Scripted => Box::new(ScriptedOracle::new()),
            OracleProvider::Anthropic => Box::new(
                HttpOracle::new(
                    self.oracle.base_url.clone(),
                    self.oracle.model.clone(),
                    Duration::from_secs(self.oracle.timeout_secs),
                    self.oracle.max_tokens,
                )
                .map_err(KinsightError::from)?,
            ),
        };
        Ok(Arc::new(RetryingOracle::new(inner, self.oracle.max_retries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let config = Config::default();
        assert_eq!(config.store_root, Utf8PathBuf::from(".kinsight"));
        assert_eq!(config.oracle.provider, OracleProvider::Anthropic);
        assert_eq!(config.oracle.max_retries, 2);
        assert_eq!(config.deadman_hours, 72);
    }

    #[test]
    fn partial_config_file_layers_over_defaults() {
        let config: Config = toml::from_str(
            r#"
            store_root = "/var/lib/kinsight"

            [oracle]
            provider = "scripted"
            "#,
        )
        .unwrap();
        assert_eq!(config.store_root, Utf8PathBuf::from("/var/lib/kinsight"));
        assert_eq!(config.oracle.provider, OracleProvider::Scripted);
        assert_eq!(config.oracle.timeout_secs, 120);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str("api_key = \"sk-123\"\n");
        assert!(result.is_err());
    }
}
