use thiserror::Error;

/// Reasons a run terminates in the failed state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
  /// Nothing is ready to run but some nodes never became reachable.
  #[error("run stalled with pending nodes: {}", .pending.join(", "))]
  GraphStalled { pending: Vec<String> },

  /// The run was cancelled by its caller.
  #[error("run cancelled")]
  Cancelled,

  /// The run deadline, or a fatal node's deadline, elapsed.
  #[error("{}", timeout_message(.node_id))]
  Timeout { node_id: Option<String> },

  /// A node with `fail_workflow` set failed.
  #[error("node '{node_id}' failed: {message}")]
  NodeFailed { node_id: String, message: String },
}

fn timeout_message(node_id: &Option<String>) -> String {
  match node_id {
    Some(id) => format!("node '{}' timed out", id),
    None => "run timed out".to_string(),
  }
}

impl SchedulerError {
  pub fn node_id(&self) -> Option<&str> {
    match self {
      SchedulerError::Timeout { node_id } => node_id.as_deref(),
      SchedulerError::NodeFailed { node_id, .. } => Some(node_id),
      _ => None,
    }
  }
}
