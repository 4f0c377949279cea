//! Trellis Engine
//!
//! Runs validated workflows. The [`Scheduler`] walks the graph in wavefronts,
//! hands ready nodes to an [`EffectDispatcher`](trellis_effects::EffectDispatcher)
//! and records everything in an [`ExecutionContext`]. The [`RunRegistry`]
//! spawns runs on their own tasks and answers queries with snapshots.
//!
//! ```ignore
//! let dispatcher = Arc::new(StandardDispatcher::from_config(&config)?);
//! let registry = RunRegistry::new(Scheduler::new(dispatcher).with_config(&config));
//!
//! let run_id = registry.submit(workflow, variables).await?;
//! let finished = registry.wait(&run_id).await;
//! ```

mod context;
mod error;
mod events;
mod input;
mod registry;
mod scheduler;

pub use context::{
  ExecutionContext, FailureKind, LogEntry, LogLevel, NodeState, NodeStatus, RunFailure, RunStatus,
};
pub use error::SchedulerError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use input::TemplateResolver;
pub use registry::{RunId, RunRegistry};
pub use scheduler::Scheduler;
