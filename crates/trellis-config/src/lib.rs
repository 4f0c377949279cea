//! Trellis Config
//!
//! This crate contains the serializable types for trellis: workflow
//! definitions as they are written by a builder UI or by hand, and the
//! engine configuration that bounds how runs execute.
//!
//! Workflow definitions are loaded from:
//! - JSON files (via CLI with `trellis run workflow.json`)
//! - Any other serde source a host process chooses
//!
//! Definitions are unvalidated. `trellis-workflow` turns a [`WorkflowDef`]
//! into a checked `Workflow` before anything is scheduled.

mod edge;
mod engine;
mod enums;
mod input;
mod node;
mod workflow;

pub use edge::EdgeDef;
pub use engine::{AgentServiceConfig, ConfigError, EngineConfig, RetryPolicy};
pub use enums::{ActionType, DelayUnit, TriggerType};
pub use input::Template;
pub use node::{
  ActionConfig, AgentConfig, ConditionConfig, DelayConfig, NodeDef, NodeKind, TriggerConfig,
};
pub use workflow::WorkflowDef;
