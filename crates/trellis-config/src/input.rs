//! Template strings in node configuration.
//!
//! Any string field of a node's configuration may contain `{{ expr }}`
//! placeholders. They are resolved against the run's variables right before
//! the node is dispatched.
//!
//! # Examples
//!
//! ```json
//! {
//!   "type": "agent",
//!   "agent_id": "support",
//!   "input": "Customer {{ trigger.config.customer }} wrote: {{ message | trim }}"
//! }
//! ```
//!
//! - A placeholder whose expression resolves is replaced by its value.
//! - A field that is exactly one placeholder keeps the JSON type of the value
//!   (`"{{ wait_seconds }}"` can become the number `30`).
//! - A placeholder that does not resolve is left in place verbatim.

/// A string that may contain `{{ expr }}` placeholders.
pub type Template = String;
