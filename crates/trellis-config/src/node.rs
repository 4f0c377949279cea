use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, DelayUnit, TriggerType};
use crate::input::Template;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Whether a failure of this node fails the whole run. Defaults to `true`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fail_workflow: Option<bool>,
  /// Extra variable name the node's primary result is bound to.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
  /// Entry point of a workflow.
  Trigger(TriggerConfig),
  /// Hands text to an external agent runtime.
  Agent(AgentConfig),
  /// Performs a side effect (HTTP call, email, datastore write, ...).
  Action(ActionConfig),
  /// Evaluates a boolean expression and selects outgoing branches.
  Condition(ConditionConfig),
  /// Waits for a fixed duration.
  Delay(DelayConfig),
}

impl NodeKind {
  pub fn name(&self) -> &'static str {
    match self {
      NodeKind::Trigger(_) => "trigger",
      NodeKind::Agent(_) => "agent",
      NodeKind::Action(_) => "action",
      NodeKind::Condition(_) => "condition",
      NodeKind::Delay(_) => "delay",
    }
  }

  pub fn is_trigger(&self) -> bool {
    matches!(self, NodeKind::Trigger(_))
  }

  pub fn is_condition(&self) -> bool {
    matches!(self, NodeKind::Condition(_))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
  #[serde(default)]
  pub trigger_type: TriggerType,
  /// Static trigger settings (schedule expression, webhook path, ...).
  #[serde(default)]
  pub settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
  pub agent_id: String,
  /// Input text template. Takes precedence over `input_key`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<Template>,
  /// Variable to read the input text from when `input` is not set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_key: Option<String>,
  /// Extra context forwarded to the agent runtime.
  #[serde(default)]
  pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
  pub action_type: ActionType,
  /// Parameters handed to the action handler, e.g. `url`, `method`, `body`.
  #[serde(default)]
  pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
  /// Boolean expression over run variables, e.g. `score >= 0.8 && approved`.
  /// Variables whose names are not identifiers are read as `vars["name"]`.
  pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
  /// A number, or a string such as `"90"`, `"5m"` or `"2 hours"`.
  pub value: serde_json::Value,
  #[serde(default)]
  pub unit: DelayUnit,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_agent_node_from_json() {
    let node: NodeDef = serde_json::from_value(json!({
      "node_id": "summarize",
      "type": "agent",
      "agent_id": "writer",
      "input": "Summarize {{ trigger.config.topic }}",
      "output_key": "summary"
    }))
    .unwrap();

    assert_eq!(node.node_id, "summarize");
    assert_eq!(node.output_key.as_deref(), Some("summary"));
    assert_eq!(node.fail_workflow, None);
    match node.kind {
      NodeKind::Agent(agent) => {
        assert_eq!(agent.agent_id, "writer");
        assert_eq!(
          agent.input.as_deref(),
          Some("Summarize {{ trigger.config.topic }}")
        );
        assert!(agent.context.is_empty());
      }
      other => panic!("expected agent node, got {:?}", other),
    }
  }

  #[test]
  fn test_trigger_defaults() {
    let node: NodeDef = serde_json::from_value(json!({
      "node_id": "start",
      "type": "trigger"
    }))
    .unwrap();

    assert_eq!(
      node.kind,
      NodeKind::Trigger(TriggerConfig {
        trigger_type: TriggerType::Manual,
        settings: Default::default(),
      })
    );
    assert!(node.kind.is_trigger());
  }

  #[test]
  fn test_action_and_delay_nodes() {
    let action: NodeDef = serde_json::from_value(json!({
      "node_id": "notify",
      "type": "action",
      "action_type": "webhook",
      "params": { "url": "https://example.com/hook" },
      "fail_workflow": false
    }))
    .unwrap();
    assert_eq!(action.fail_workflow, Some(false));
    assert!(matches!(
      action.kind,
      NodeKind::Action(ActionConfig {
        action_type: ActionType::Webhook,
        ..
      })
    ));

    let delay: NodeDef = serde_json::from_value(json!({
      "node_id": "wait",
      "type": "delay",
      "value": 5,
      "unit": "minutes"
    }))
    .unwrap();
    match delay.kind {
      NodeKind::Delay(config) => {
        assert_eq!(config.value, json!(5));
        assert_eq!(config.unit, DelayUnit::Minutes);
      }
      other => panic!("expected delay node, got {:?}", other),
    }
  }

  #[test]
  fn test_unknown_kind_rejected() {
    let result: Result<NodeDef, _> = serde_json::from_value(json!({
      "node_id": "x",
      "type": "script",
      "code": "rm -rf /"
    }));
    assert!(result.is_err());
  }
}
