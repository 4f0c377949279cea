use std::collections::HashMap;

use crate::node::{Edge, Node};

/// Graph structure for traversal and analysis.
///
/// Edges are referenced by their index in the workflow's edge list so the
/// scheduler can track per-edge state alongside it.
#[derive(Debug, Clone)]
pub struct Graph {
  /// node_id -> indices of edges leaving the node.
  outgoing: HashMap<String, Vec<usize>>,
  /// node_id -> indices of edges entering the node.
  incoming: HashMap<String, Vec<usize>>,
  /// Nodes with no incoming edges, plus every trigger node.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  ///
  /// Edges whose endpoints are not in `nodes` are indexed anyway; validation
  /// is responsible for rejecting them.
  pub fn new(nodes: &HashMap<String, Node>, edges: &[Edge]) -> Self {
    let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();

    for node_id in nodes.keys() {
      outgoing.entry(node_id.clone()).or_default();
      incoming.entry(node_id.clone()).or_default();
    }

    for (index, edge) in edges.iter().enumerate() {
      outgoing.entry(edge.from.clone()).or_default().push(index);
      incoming.entry(edge.to.clone()).or_default().push(index);
    }

    let mut entry_points: Vec<String> = nodes
      .values()
      .filter(|node| {
        node.kind.is_trigger() || incoming.get(&node.node_id).is_none_or(|v| v.is_empty())
      })
      .map(|node| node.node_id.clone())
      .collect();
    entry_points.sort();

    Self {
      outgoing,
      incoming,
      entry_points,
    }
  }

  /// Get entry points (no incoming edges, or trigger kind), sorted by id.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Check whether a node is an entry point.
  pub fn is_entry_point(&self, node_id: &str) -> bool {
    self.entry_points.iter().any(|id| id == node_id)
  }

  /// Indices of edges leaving a node.
  pub fn outgoing(&self, node_id: &str) -> &[usize] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Indices of edges entering a node.
  pub fn incoming(&self, node_id: &str) -> &[usize] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use trellis_config::{ConditionConfig, NodeKind, TriggerConfig};

  fn trigger(id: &str) -> Node {
    Node::new(id, NodeKind::Trigger(TriggerConfig::default()))
  }

  fn condition(id: &str) -> Node {
    Node::new(
      id,
      NodeKind::Condition(ConditionConfig {
        expression: "true".to_string(),
      }),
    )
  }

  fn node_map(nodes: Vec<Node>) -> HashMap<String, Node> {
    nodes.into_iter().map(|n| (n.node_id.clone(), n)).collect()
  }

  #[test]
  fn test_diamond_indices() {
    let nodes = node_map(vec![trigger("t"), condition("a"), condition("b"), condition("j")]);
    let edges = vec![
      Edge::new("t", "a"),
      Edge::new("t", "b"),
      Edge::new("a", "j"),
      Edge::new("b", "j"),
    ];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.entry_points(), &["t".to_string()]);
    assert_eq!(graph.outgoing("t"), &[0, 1]);
    assert_eq!(graph.incoming("j"), &[2, 3]);
    assert_eq!(graph.outgoing("a"), &[2]);
    assert!(graph.outgoing("j").is_empty());
  }

  #[test]
  fn test_trigger_with_incoming_edge_is_entry() {
    let nodes = node_map(vec![trigger("t"), condition("loop")]);
    let edges = vec![Edge::new("t", "loop"), Edge::new("loop", "t")];
    let graph = Graph::new(&nodes, &edges);

    assert!(graph.is_entry_point("t"));
    assert!(!graph.is_entry_point("loop"));
  }

  #[test]
  fn test_unknown_node_has_no_edges() {
    let graph = Graph::new(&HashMap::new(), &[]);
    assert!(graph.outgoing("missing").is_empty());
    assert!(graph.incoming("missing").is_empty());
    assert!(graph.entry_points().is_empty());
  }
}
