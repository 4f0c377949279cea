use thiserror::Error;

/// Errors produced while performing a node's effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
  /// The agent runtime could not be reached or rejected the call.
  #[error("agent '{agent_id}' unavailable: {message}")]
  AgentUnavailable { agent_id: String, message: String },

  /// An action handler failed or none was registered for the subtype.
  #[error("{subtype} action failed: {detail}")]
  ActionFailed { subtype: String, detail: String },

  /// A condition expression could not be evaluated to a boolean.
  #[error("condition evaluation failed: {message}")]
  ConditionEval { message: String },

  /// The node's configuration is unusable (e.g. an unparseable delay).
  #[error("invalid node configuration: {message}")]
  InvalidConfig { message: String },

  /// The effect was interrupted by cancellation.
  #[error("cancelled")]
  Cancelled,
}

impl From<crate::condition::ConditionError> for EffectError {
  fn from(err: crate::condition::ConditionError) -> Self {
    EffectError::ConditionEval {
      message: err.to_string(),
    }
  }
}
