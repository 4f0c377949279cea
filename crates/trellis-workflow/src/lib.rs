//! Trellis Workflow
//!
//! This crate provides the validated workflow representation for trellis.
//! A [`Workflow`] is built from a `trellis-config` [`WorkflowDef`] and is the
//! immutable input of every run.
//!
//! Key differences from `trellis-config`:
//! - Node ids are unique and every edge endpoint exists
//! - At least one start node exists
//! - Branch labels only appear on edges leaving condition nodes
//! - A [`Graph`] index gives incoming/outgoing edges per node
//!
//! Cycles are accepted here; the scheduler detects runs that can no longer
//! make progress.
//!
//! [`WorkflowDef`]: trellis_config::WorkflowDef

mod error;
mod graph;
mod node;
mod workflow;

pub use error::GraphError;
pub use graph::Graph;
pub use node::{Edge, Node};
pub use trellis_config::{
  ActionConfig, ActionType, AgentConfig, ConditionConfig, DelayConfig, DelayUnit, NodeKind,
  TriggerConfig, TriggerType,
};
pub use workflow::{Workflow, validate};
