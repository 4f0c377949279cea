use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Context provided to an effect during execution.
#[derive(Debug, Clone)]
pub struct NodeContext {
  /// Run (execution) ID.
  pub execution_id: String,

  /// Node ID within the workflow.
  pub node_id: String,

  /// Read-only snapshot of run variables taken when the node was admitted.
  pub variables: Arc<Map<String, Value>>,

  /// Cancelled when the run is cancelled or the node is interrupted.
  pub cancel: CancellationToken,
}

impl NodeContext {
  pub fn new(
    execution_id: impl Into<String>,
    node_id: impl Into<String>,
    variables: Map<String, Value>,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      node_id: node_id.into(),
      variables: Arc::new(variables),
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }
}

/// Output produced by an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectOutput {
  /// The full output object, bound to the node's id in run variables.
  pub data: Value,

  /// The kind's primary value, bound to the node's `output_key` if set.
  pub result: Value,
}

impl EffectOutput {
  pub fn new(data: Value, result: Value) -> Self {
    Self { data, result }
  }
}
