use thiserror::Error;

/// Structural problems that reject a workflow before any run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("edge references unknown node: from={from}, to={to}")]
  DanglingEdge { from: String, to: String },

  #[error("no entry point found (every node has incoming edges and none is a trigger)")]
  NoEntryPoint,

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("invalid branch '{branch}' on edge {from} -> {to}")]
  InvalidBranch {
    from: String,
    to: String,
    branch: String,
  },
}
