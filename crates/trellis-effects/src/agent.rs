//! Agent runtime invocation.
//!
//! [`AgentInvoker`] is the seam between the engine and whatever hosts the
//! agents. [`HttpAgentClient`] talks to the agent service over HTTP and
//! [`RetryingInvoker`] wraps any invoker with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use trellis_config::{AgentServiceConfig, RetryPolicy};

/// A request to run an agent once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRequest {
  #[serde(skip)]
  pub agent_id: String,
  pub input: String,
  pub context: Map<String, Value>,
}

/// The agent runtime's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
  #[serde(default)]
  pub output: Value,
  #[serde(default)]
  pub chain_of_thought: Option<Value>,
  #[serde(default = "default_status")]
  pub status: String,
}

fn default_status() -> String {
  "completed".to_string()
}

impl AgentResponse {
  pub fn completed(output: impl Into<Value>) -> Self {
    Self {
      output: output.into(),
      chain_of_thought: None,
      status: default_status(),
    }
  }
}

/// Errors from a single agent invocation attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
  #[error("connection failed: {0}")]
  Connection(String),

  #[error("request timed out")]
  Timeout,

  #[error("agent service returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("invalid response: {0}")]
  InvalidResponse(String),
}

impl AgentError {
  /// Connection failures, timeouts, 429 and 5xx are worth another attempt.
  pub fn is_retryable(&self) -> bool {
    match self {
      AgentError::Connection(_) | AgentError::Timeout => true,
      AgentError::Status { status, .. } => *status == 429 || *status >= 500,
      AgentError::InvalidResponse(_) => false,
    }
  }
}

impl From<reqwest::Error> for AgentError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      AgentError::Timeout
    } else if err.is_decode() {
      AgentError::InvalidResponse(err.to_string())
    } else {
      AgentError::Connection(err.to_string())
    }
  }
}

/// Runs agents on behalf of agent nodes.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
  async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// Calls `POST {base_url}/agent/{agent_id}/execute` on the agent service.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
  client: Client,
  base_url: String,
}

impl HttpAgentClient {
  pub fn new(client: Client, base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { client, base_url }
  }

  pub fn from_config(config: &AgentServiceConfig) -> Result<Self, reqwest::Error> {
    let client = Client::builder()
      .timeout(Duration::from_millis(config.request_timeout_ms))
      .build()?;
    Ok(Self::new(client, config.base_url.clone()))
  }

  pub fn endpoint(&self, agent_id: &str) -> String {
    format!("{}/agent/{}/execute", self.base_url, agent_id)
  }
}

#[async_trait]
impl AgentInvoker for HttpAgentClient {
  async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
    let url = self.endpoint(&request.agent_id);
    debug!(agent_id = %request.agent_id, %url, "invoking agent");

    let response = self.client.post(&url).json(request).send().await?;
    let status = response.status();

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(AgentError::Status {
        status: status.as_u16(),
        body,
      });
    }

    if status == StatusCode::NO_CONTENT {
      return Err(AgentError::InvalidResponse("empty response body".to_string()));
    }

    Ok(response.json::<AgentResponse>().await?)
  }
}

/// Retries retryable failures of an inner invoker with exponential backoff.
pub struct RetryingInvoker {
  inner: Arc<dyn AgentInvoker>,
  policy: RetryPolicy,
}

impl RetryingInvoker {
  pub fn new(inner: Arc<dyn AgentInvoker>, policy: RetryPolicy) -> Self {
    Self { inner, policy }
  }
}

#[async_trait]
impl AgentInvoker for RetryingInvoker {
  async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
    let max_retries = self.policy.max_retries;
    let mut attempt = 0;

    loop {
      match self.inner.invoke(request).await {
        Ok(response) => return Ok(response),
        Err(e) if e.is_retryable() && attempt < max_retries => {
          let backoff_ms = self.policy.backoff_ms(attempt);
          warn!(
            agent_id = %request.agent_id,
            attempt = attempt + 1,
            max_retries,
            backoff_ms,
            error = %e,
            "retrying agent invocation"
          );
          tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  struct Scripted {
    replies: Mutex<Vec<Result<AgentResponse, AgentError>>>,
    calls: Mutex<u32>,
  }

  impl Scripted {
    fn new(mut replies: Vec<Result<AgentResponse, AgentError>>) -> Arc<Self> {
      replies.reverse();
      Arc::new(Self {
        replies: Mutex::new(replies),
        calls: Mutex::new(0),
      })
    }

    fn calls(&self) -> u32 {
      *self.calls.lock().unwrap()
    }
  }

  #[async_trait]
  impl AgentInvoker for Scripted {
    async fn invoke(&self, _request: &AgentRequest) -> Result<AgentResponse, AgentError> {
      *self.calls.lock().unwrap() += 1;
      self
        .replies
        .lock()
        .unwrap()
        .pop()
        .unwrap_or(Err(AgentError::Connection("script exhausted".to_string())))
    }
  }

  fn request() -> AgentRequest {
    AgentRequest {
      agent_id: "writer".to_string(),
      input: "hello".to_string(),
      context: Map::new(),
    }
  }

  fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
      max_retries,
      initial_backoff_ms: 100,
      max_backoff_ms: 1_000,
    }
  }

  #[test]
  fn test_retryable_classification() {
    assert!(AgentError::Timeout.is_retryable());
    assert!(AgentError::Connection("refused".into()).is_retryable());
    assert!(AgentError::Status { status: 429, body: String::new() }.is_retryable());
    assert!(AgentError::Status { status: 503, body: String::new() }.is_retryable());
    assert!(!AgentError::Status { status: 404, body: String::new() }.is_retryable());
    assert!(!AgentError::InvalidResponse("bad".into()).is_retryable());
  }

  #[test]
  fn test_endpoint_trims_trailing_slash() {
    let client = HttpAgentClient::new(Client::new(), "http://localhost:8001/");
    assert_eq!(
      client.endpoint("summarizer"),
      "http://localhost:8001/agent/summarizer/execute"
    );
  }

  #[test]
  fn test_request_body_shape() {
    let mut context = Map::new();
    context.insert("executionId".to_string(), Value::from("run-1"));
    let body = serde_json::to_value(AgentRequest {
      agent_id: "a".to_string(),
      input: "hi".to_string(),
      context,
    })
    .unwrap();
    assert_eq!(
      body,
      serde_json::json!({ "input": "hi", "context": { "executionId": "run-1" } })
    );
  }

  #[test]
  fn test_response_defaults() {
    let response: AgentResponse = serde_json::from_str(r#"{"output":"done"}"#).unwrap();
    assert_eq!(response.output, Value::from("done"));
    assert_eq!(response.chain_of_thought, None);
    assert_eq!(response.status, "completed");
  }

  #[tokio::test(start_paused = true)]
  async fn test_retries_transient_failures() {
    let inner = Scripted::new(vec![
      Err(AgentError::Timeout),
      Err(AgentError::Status { status: 502, body: String::new() }),
      Ok(AgentResponse::completed("ok")),
    ]);
    let invoker = RetryingInvoker::new(inner.clone(), policy(2));

    let response = invoker.invoke(&request()).await.unwrap();
    assert_eq!(response.output, Value::from("ok"));
    assert_eq!(inner.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_gives_up_after_max_retries() {
    let inner = Scripted::new(vec![
      Err(AgentError::Timeout),
      Err(AgentError::Timeout),
      Err(AgentError::Timeout),
      Ok(AgentResponse::completed("too late")),
    ]);
    let invoker = RetryingInvoker::new(inner.clone(), policy(2));

    assert_eq!(invoker.invoke(&request()).await, Err(AgentError::Timeout));
    assert_eq!(inner.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_client_errors_fail_fast() {
    let inner = Scripted::new(vec![
      Err(AgentError::Status { status: 400, body: "bad input".into() }),
      Ok(AgentResponse::completed("unused")),
    ]);
    let invoker = RetryingInvoker::new(inner.clone(), policy(5));

    assert!(matches!(
      invoker.invoke(&request()).await,
      Err(AgentError::Status { status: 400, .. })
    ));
    assert_eq!(inner.calls(), 1);
  }
}
