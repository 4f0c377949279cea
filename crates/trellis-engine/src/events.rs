//! Execution events and notifiers for observability.
//!
//! Events are emitted while a run progresses so hosts can stream progress,
//! persist history or drive a UI without polling snapshots.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  RunStarted {
    execution_id: String,
    workflow_id: String,
  },

  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  NodeCompleted {
    execution_id: String,
    node_id: String,
    data: serde_json::Value,
  },

  /// A node failed, fatally or not, or was interrupted.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// A node was skipped because every path into it was pruned.
  NodeSkipped {
    execution_id: String,
    node_id: String,
  },

  RunCompleted { execution_id: String },

  RunFailed { execution_id: String, error: String },
}

/// Receives execution events.
///
/// The scheduler calls `notify` inline, so implementations should hand the
/// event off rather than block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run; volume is a handful of
  // events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
