//! Trellis Effects
//!
//! Performs the externally-visible work of each node kind. The scheduler hands
//! a [`Node`](trellis_workflow::Node) and a [`NodeContext`] to an
//! [`EffectDispatcher`] and folds the returned [`EffectOutput`] back into the
//! run.
//!
//! Collaborators sit behind trait seams:
//! - [`AgentInvoker`] runs agents ([`HttpAgentClient`] by default)
//! - [`ActionHandler`] performs action subtypes, looked up in an
//!   [`ActionRegistry`]
//!
//! Conditions are evaluated by a small sandboxed grammar (see [`condition`]);
//! nothing in a workflow definition is ever executed as code.

mod action;
mod agent;
pub mod condition;
mod datastore;
mod delay;
mod dispatcher;
mod error;
mod http;
mod notify;
mod types;

pub use action::{ActionError, ActionHandler, ActionRegistry};
pub use agent::{
  AgentError, AgentInvoker, AgentRequest, AgentResponse, HttpAgentClient, RetryingInvoker,
};
pub use datastore::InMemoryDatastore;
pub use delay::parse_delay;
pub use dispatcher::{EffectDispatcher, StandardDispatcher};
pub use error::EffectError;
pub use http::HttpActionHandler;
pub use notify::WebhookNotifier;
pub use types::{EffectOutput, NodeContext};
