use serde::{Deserialize, Serialize};
use trellis_config::{EdgeDef, NodeDef, NodeKind};

/// A validated workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub name: String,
  pub kind: NodeKind,
  pub timeout_ms: Option<u64>,
  pub fail_workflow: bool,
  pub output_key: Option<String>,
}

impl Node {
  /// Create a node with default scheduling attributes.
  pub fn new(node_id: impl Into<String>, kind: NodeKind) -> Self {
    let node_id = node_id.into();
    Self {
      name: node_id.clone(),
      node_id,
      kind,
      timeout_ms: None,
      fail_workflow: true,
      output_key: None,
    }
  }
}

impl From<NodeDef> for Node {
  fn from(def: NodeDef) -> Self {
    Self {
      name: def.name.unwrap_or_else(|| def.node_id.clone()),
      node_id: def.node_id,
      kind: def.kind,
      timeout_ms: def.timeout_ms,
      fail_workflow: def.fail_workflow.unwrap_or(true),
      output_key: def.output_key,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
  pub branch: Option<String>,
}

impl Edge {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      branch: None,
    }
  }

  pub fn branch(from: impl Into<String>, to: impl Into<String>, branch: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      branch: Some(branch.into()),
    }
  }
}

impl From<EdgeDef> for Edge {
  fn from(def: EdgeDef) -> Self {
    Self {
      from: def.from,
      to: def.to,
      branch: def.branch,
    }
  }
}
