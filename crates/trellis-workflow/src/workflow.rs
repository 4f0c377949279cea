use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_config::WorkflowDef;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{Edge, Node};

/// A validated workflow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub nodes: HashMap<String, Node>,
  pub edges: Vec<Edge>,
  pub timeout_ms: Option<u64>,
}

impl Workflow {
  /// Build and validate a workflow from its definition.
  pub fn from_def(def: WorkflowDef) -> Result<Self, GraphError> {
    let mut nodes = HashMap::with_capacity(def.nodes.len());
    for node_def in def.nodes {
      let node = Node::from(node_def);
      if nodes.contains_key(&node.node_id) {
        return Err(GraphError::DuplicateNode(node.node_id));
      }
      nodes.insert(node.node_id.clone(), node);
    }

    let workflow = Self {
      workflow_id: def.workflow_id,
      name: def.name,
      nodes,
      edges: def.edges.into_iter().map(Edge::from).collect(),
      timeout_ms: def.timeout_ms,
    };
    validate(&workflow)?;
    Ok(workflow)
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes, &self.edges)
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }
}

/// Check the structural invariants of a workflow.
///
/// Cycles are not rejected: a cycle without an outside entry simply never
/// becomes ready, which the scheduler reports as a stalled run.
pub fn validate(workflow: &Workflow) -> Result<(), GraphError> {
  for edge in &workflow.edges {
    let Some(source) = workflow.nodes.get(&edge.from) else {
      return Err(GraphError::DanglingEdge {
        from: edge.from.clone(),
        to: edge.to.clone(),
      });
    };
    if !workflow.nodes.contains_key(&edge.to) {
      return Err(GraphError::DanglingEdge {
        from: edge.from.clone(),
        to: edge.to.clone(),
      });
    }

    if let Some(branch) = &edge.branch {
      let valid = source.kind.is_condition() && (branch == "true" || branch == "false");
      if !valid {
        return Err(GraphError::InvalidBranch {
          from: edge.from.clone(),
          to: edge.to.clone(),
          branch: branch.clone(),
        });
      }
    }
  }

  if workflow.graph().entry_points().is_empty() {
    return Err(GraphError::NoEntryPoint);
  }

  Ok(())
}
