use serde::{Deserialize, Serialize};

use crate::edge::EdgeDef;
use crate::node::NodeDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
  /// Wall-clock budget for one run, overriding the engine default.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl WorkflowDef {
  /// Parse a workflow definition from JSON text.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_branching_workflow() {
    let def = WorkflowDef::from_json(
      r#"{
        "workflow_id": "wf-1",
        "name": "Lead triage",
        "nodes": [
          { "node_id": "start", "type": "trigger", "trigger_type": "webhook" },
          { "node_id": "check", "type": "condition", "expression": "lead.score > 50" },
          { "node_id": "hot", "type": "action", "action_type": "notification",
            "params": { "message": "hot lead" } },
          { "node_id": "cold", "type": "delay", "value": "1h" }
        ],
        "edges": [
          { "from": "start", "to": "check" },
          { "source": "check", "target": "hot", "branch": "true" },
          { "from": "check", "to": "cold", "branch": "false" }
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(def.nodes.len(), 4);
    assert_eq!(def.edges.len(), 3);
    assert_eq!(def.edges[1], EdgeDef::branch("check", "hot", "true"));
    assert_eq!(def.timeout_ms, None);
  }

  #[test]
  fn test_edges_default_to_empty() {
    let def = WorkflowDef::from_json(
      r#"{ "workflow_id": "wf", "name": "solo",
           "nodes": [ { "node_id": "t", "type": "trigger" } ] }"#,
    )
    .unwrap();
    assert!(def.edges.is_empty());
  }
}
