//! Per-run execution state.
//!
//! An [`ExecutionContext`] is owned by the scheduler task driving its run.
//! Everyone else sees clones published after each state change. Once the run
//! reaches a terminal status every further transition is ignored, so a
//! terminal snapshot is final.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use trellis_effects::EffectOutput;
use trellis_workflow::Workflow;

use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Initializing,
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, RunStatus::Completed | RunStatus::Failed)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Skipped,
}

impl NodeStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
  pub status: NodeStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  pub output: Option<Value>,
  pub error: Option<String>,
}

impl NodeState {
  fn pending() -> Self {
    Self {
      status: NodeStatus::Pending,
      started_at: None,
      ended_at: None,
      output: None,
      error: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Debug,
  Info,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  NodeFailed,
  GraphStalled,
  Cancelled,
  Timeout,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
  pub kind: FailureKind,
  pub message: String,
  pub node_id: Option<String>,
}

impl From<&SchedulerError> for RunFailure {
  fn from(err: &SchedulerError) -> Self {
    let kind = match err {
      SchedulerError::GraphStalled { .. } => FailureKind::GraphStalled,
      SchedulerError::Cancelled => FailureKind::Cancelled,
      SchedulerError::Timeout { .. } => FailureKind::Timeout,
      SchedulerError::NodeFailed { .. } => FailureKind::NodeFailed,
    };
    Self {
      kind,
      message: err.to_string(),
      node_id: err.node_id().map(String::from),
    }
  }
}

/// State of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
  pub nodes: BTreeMap<String, NodeState>,
  pub variables: Map<String, Value>,
  pub log: Vec<LogEntry>,
  /// Most recently dispatched node. Diagnostic only.
  pub current_node: Option<String>,
  pub failure: Option<RunFailure>,
}

impl ExecutionContext {
  pub fn new(
    execution_id: impl Into<String>,
    workflow: &Workflow,
    variables: Map<String, Value>,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      workflow_id: workflow.workflow_id.clone(),
      status: RunStatus::Initializing,
      started_at: Utc::now(),
      ended_at: None,
      nodes: workflow
        .nodes
        .keys()
        .map(|id| (id.clone(), NodeState::pending()))
        .collect(),
      variables,
      log: Vec::new(),
      current_node: None,
      failure: None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  pub fn node(&self, node_id: &str) -> Option<&NodeState> {
    self.nodes.get(node_id)
  }

  pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
    self.nodes.get(node_id).map(|n| n.status)
  }

  /// Ids of nodes currently in `status`, in id order.
  pub fn nodes_with_status(&self, status: NodeStatus) -> Vec<String> {
    self
      .nodes
      .iter()
      .filter(|(_, n)| n.status == status)
      .map(|(id, _)| id.clone())
      .collect()
  }

  pub(crate) fn start(&mut self) {
    if self.status != RunStatus::Initializing {
      return;
    }
    self.status = RunStatus::Running;
    self.log(LogLevel::Info, "run started", None, None);
  }

  /// Pending → Running. Returns false if the node was not admitted.
  pub(crate) fn node_started(&mut self, node_id: &str) -> bool {
    if !self.transition(node_id, NodeStatus::Pending, NodeStatus::Running) {
      return false;
    }
    self.current_node = Some(node_id.to_string());
    self.log(LogLevel::Info, "node started", Some(node_id), None);
    true
  }

  /// Running → Completed, binding the node's output into the variables.
  pub(crate) fn node_completed(
    &mut self,
    node_id: &str,
    output: &EffectOutput,
    output_key: Option<&str>,
  ) -> bool {
    if !self.transition(node_id, NodeStatus::Running, NodeStatus::Completed) {
      return false;
    }
    if let Some(state) = self.nodes.get_mut(node_id) {
      state.output = Some(output.data.clone());
    }
    self
      .variables
      .insert(node_id.to_string(), output.data.clone());
    if let Some(key) = output_key {
      self.variables.insert(key.to_string(), output.result.clone());
    }
    self.log(LogLevel::Info, "node completed", Some(node_id), None);
    true
  }

  /// Running → Failed. Non-fatal failures are logged as warnings.
  pub(crate) fn node_failed(&mut self, node_id: &str, error: &str, fatal: bool) -> bool {
    if !self.transition(node_id, NodeStatus::Running, NodeStatus::Failed) {
      return false;
    }
    if let Some(state) = self.nodes.get_mut(node_id) {
      state.error = Some(error.to_string());
    }
    let level = if fatal { LogLevel::Error } else { LogLevel::Warning };
    self.log(
      level,
      "node failed",
      Some(node_id),
      Some(serde_json::json!({ "error": error, "fatal": fatal })),
    );
    true
  }

  /// Pending → Skipped.
  pub(crate) fn node_skipped(&mut self, node_id: &str) -> bool {
    if !self.transition(node_id, NodeStatus::Pending, NodeStatus::Skipped) {
      return false;
    }
    self.log(LogLevel::Info, "node skipped", Some(node_id), None);
    true
  }

  pub(crate) fn complete(&mut self) {
    if self.status != RunStatus::Running {
      return;
    }
    self.log(LogLevel::Info, "run completed", None, None);
    self.status = RunStatus::Completed;
    self.ended_at = Some(Utc::now());
  }

  pub(crate) fn fail(&mut self, err: &SchedulerError) {
    if self.is_terminal() {
      return;
    }
    let failure = RunFailure::from(err);
    self.log(
      LogLevel::Error,
      "run failed",
      failure.node_id.as_deref(),
      Some(serde_json::json!({ "reason": failure.message })),
    );
    self.failure = Some(failure);
    self.status = RunStatus::Failed;
    self.ended_at = Some(Utc::now());
  }

  /// Append a log entry and mirror it as a tracing event.
  pub(crate) fn log(
    &mut self,
    level: LogLevel,
    message: &str,
    node_id: Option<&str>,
    details: Option<Value>,
  ) {
    if self.is_terminal() {
      return;
    }

    let execution_id = self.execution_id.as_str();
    let node = node_id.unwrap_or("");
    let detail = details.as_ref().map(Value::to_string).unwrap_or_default();
    match level {
      LogLevel::Debug => debug!(execution_id, node_id = node, details = %detail, "{}", message),
      LogLevel::Info => info!(execution_id, node_id = node, details = %detail, "{}", message),
      LogLevel::Warning => warn!(execution_id, node_id = node, details = %detail, "{}", message),
      LogLevel::Error => error!(execution_id, node_id = node, details = %detail, "{}", message),
    }

    self.log.push(LogEntry {
      timestamp: Utc::now(),
      level,
      message: message.to_string(),
      node_id: node_id.map(String::from),
      details,
    });
  }

  fn transition(&mut self, node_id: &str, from: NodeStatus, to: NodeStatus) -> bool {
    if self.is_terminal() {
      return false;
    }
    let Some(state) = self.nodes.get_mut(node_id) else {
      return false;
    };
    if state.status != from {
      return false;
    }
    let now = Utc::now();
    match to {
      NodeStatus::Running => state.started_at = Some(now),
      _ => state.ended_at = Some(now),
    }
    state.status = to;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use trellis_workflow::{Edge, Node, NodeKind, TriggerConfig};

  fn workflow() -> Workflow {
    let trigger = || NodeKind::Trigger(TriggerConfig::default());
    Workflow {
      workflow_id: "wf".to_string(),
      name: "wf".to_string(),
      nodes: [
        ("a".to_string(), Node::new("a", trigger())),
        ("b".to_string(), Node::new("b", trigger())),
      ]
      .into_iter()
      .collect(),
      edges: vec![Edge::new("a", "b")],
      timeout_ms: None,
    }
  }

  #[test]
  fn test_new_context_is_pending() {
    let ctx = ExecutionContext::new("run", &workflow(), Map::new());
    assert_eq!(ctx.status, RunStatus::Initializing);
    assert_eq!(ctx.nodes_with_status(NodeStatus::Pending), vec!["a", "b"]);
    assert!(ctx.log.is_empty());
  }

  #[test]
  fn test_node_lifecycle_and_variables() {
    let mut ctx = ExecutionContext::new("run", &workflow(), Map::new());
    ctx.start();

    assert!(ctx.node_started("a"));
    assert!(!ctx.node_started("a"));
    assert_eq!(ctx.current_node.as_deref(), Some("a"));

    let output = EffectOutput::new(json!({ "value": 1 }), json!(1));
    assert!(ctx.node_completed("a", &output, Some("count")));
    assert_eq!(ctx.variables["a"], json!({ "value": 1 }));
    assert_eq!(ctx.variables["count"], json!(1));
    assert_eq!(ctx.node("a").unwrap().output, Some(json!({ "value": 1 })));

    // Completed nodes cannot fail afterwards.
    assert!(!ctx.node_failed("a", "late", true));
    assert!(ctx.node_skipped("b"));
    assert_eq!(ctx.node_status("b"), Some(NodeStatus::Skipped));
  }

  #[test]
  fn test_terminal_context_is_frozen() {
    let mut ctx = ExecutionContext::new("run", &workflow(), Map::new());
    ctx.start();
    ctx.node_started("a");
    ctx.fail(&SchedulerError::Cancelled);

    let frozen = ctx.clone();
    let output = EffectOutput::new(json!(1), json!(1));
    assert!(!ctx.node_completed("a", &output, None));
    assert!(!ctx.node_skipped("b"));
    ctx.complete();
    ctx.fail(&SchedulerError::Timeout { node_id: None });
    ctx.log(LogLevel::Info, "ignored", None, None);

    assert_eq!(ctx, frozen);
    assert_eq!(ctx.status, RunStatus::Failed);
    let failure = ctx.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.message, "run cancelled");
  }

  #[test]
  fn test_log_order_and_levels() {
    let mut ctx = ExecutionContext::new("run", &workflow(), Map::new());
    ctx.start();
    ctx.node_started("a");
    ctx.node_failed("a", "boom", false);
    ctx.complete();

    let messages: Vec<(&str, LogLevel)> = ctx
      .log
      .iter()
      .map(|e| (e.message.as_str(), e.level))
      .collect();
    assert_eq!(
      messages,
      vec![
        ("run started", LogLevel::Info),
        ("node started", LogLevel::Info),
        ("node failed", LogLevel::Warning),
        ("run completed", LogLevel::Info),
      ]
    );
    assert!(ctx.ended_at.is_some());
  }

  #[test]
  fn test_serialized_shape() {
    let mut ctx = ExecutionContext::new("run", &workflow(), Map::new());
    ctx.start();
    ctx.fail(&SchedulerError::GraphStalled {
      pending: vec!["a".to_string(), "b".to_string()],
    });

    let value = serde_json::to_value(&ctx).unwrap();
    assert_eq!(value["status"], json!("failed"));
    assert_eq!(value["nodes"]["a"]["status"], json!("pending"));
    assert_eq!(value["failure"]["kind"], json!("graph_stalled"));
    assert_eq!(
      value["failure"]["message"],
      json!("run stalled with pending nodes: a, b")
    );
    assert_eq!(value["log"][0]["level"], json!("info"));
    assert!(value["log"][0].get("node_id").is_none());
  }
}
