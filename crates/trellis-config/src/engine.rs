//! Engine configuration.
//!
//! Bounds that apply to every run (timeouts, the delay cap) and the
//! locations of the external services node effects talk to. Loaded from a
//! JSON file; every field has a default so an empty object is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Wall-clock budget for a whole run. `None` disables the limit.
  pub run_timeout_ms: Option<u64>,
  /// Budget for a single node dispatch. `None` disables the limit.
  pub node_timeout_ms: Option<u64>,
  /// Upper bound for delay nodes.
  pub max_delay_ms: u64,
  /// Variable agent nodes read their input from when they name none.
  pub default_input_key: String,
  pub agent_service: AgentServiceConfig,
  /// Incoming-webhook URL for chat notifications.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notification_webhook_url: Option<String>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      run_timeout_ms: Some(30 * 60 * 1_000),
      node_timeout_ms: Some(5 * 60 * 1_000),
      max_delay_ms: 60 * 60 * 1_000,
      default_input_key: "input".to_string(),
      agent_service: AgentServiceConfig::default(),
      notification_webhook_url: None,
    }
  }
}

impl EngineConfig {
  /// Load configuration from a JSON file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    let config: EngineConfig =
      serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
      })?;
    config.validate()?;
    Ok(config)
  }

  /// Check values that serde cannot reject on its own.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.default_input_key.trim().is_empty() {
      return Err(ConfigError::Invalid(
        "default_input_key must not be empty".to_string(),
      ));
    }
    if self.agent_service.base_url.trim().is_empty() {
      return Err(ConfigError::Invalid(
        "agent_service.base_url must not be empty".to_string(),
      ));
    }
    if self.agent_service.retry.initial_backoff_ms > self.agent_service.retry.max_backoff_ms {
      return Err(ConfigError::Invalid(
        "agent_service.retry.initial_backoff_ms exceeds max_backoff_ms".to_string(),
      ));
    }
    Ok(())
  }
}

/// Where the agent runtime lives and how hard to try reaching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentServiceConfig {
  pub base_url: String,
  pub request_timeout_ms: u64,
  pub retry: RetryPolicy,
}

impl Default for AgentServiceConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8001".to_string(),
      request_timeout_ms: 30_000,
      retry: RetryPolicy::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Attempts after the first one.
  pub max_retries: u32,
  pub initial_backoff_ms: u64,
  pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_backoff_ms: 250,
      max_backoff_ms: 5_000,
    }
  }
}

impl RetryPolicy {
  /// Backoff before retry number `attempt` (zero-based), doubling each time.
  pub fn backoff_ms(&self, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt);
    self
      .initial_backoff_ms
      .saturating_mul(factor)
      .min(self.max_backoff_ms)
  }
}
