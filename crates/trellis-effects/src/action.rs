//! Action handlers and their registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use trellis_config::{ActionType, EngineConfig};

use crate::datastore::InMemoryDatastore;
use crate::http::HttpActionHandler;
use crate::notify::WebhookNotifier;
use crate::types::NodeContext;

/// Errors from an action handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
  #[error("invalid params: {0}")]
  InvalidParams(String),

  #[error("request failed: {0}")]
  Request(String),

  #[error("endpoint returned status {status}")]
  Status { status: u16, body: Value },

  #[error("{0}")]
  Failed(String),
}

impl From<reqwest::Error> for ActionError {
  fn from(err: reqwest::Error) -> Self {
    ActionError::Request(err.to_string())
  }
}

/// Performs one or more action subtypes.
///
/// Handlers receive already-resolved params; template placeholders have been
/// substituted by the time `execute` is called.
#[async_trait]
pub trait ActionHandler: Send + Sync {
  async fn execute(
    &self,
    action_type: ActionType,
    params: &Value,
    ctx: &NodeContext,
  ) -> Result<Value, ActionError>;
}

/// Maps action subtypes to their handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
  handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
  /// An empty registry; every action fails until a handler is registered.
  pub fn new() -> Self {
    Self::default()
  }

  /// Register the built-in handlers: HTTP for `api_call` and `webhook`, an
  /// in-memory datastore for `database`, and the chat webhook for
  /// `notification` when `notification_webhook_url` is configured.
  ///
  /// `email` has no built-in handler.
  pub fn with_defaults(config: &EngineConfig) -> Self {
    let http = Arc::new(HttpActionHandler::default());
    let mut registry = Self::new()
      .with_handler(ActionType::ApiCall, http.clone())
      .with_handler(ActionType::Webhook, http)
      .with_handler(ActionType::Database, Arc::new(InMemoryDatastore::new()));

    if let Some(url) = &config.notification_webhook_url {
      registry.register(ActionType::Notification, Arc::new(WebhookNotifier::new(url)));
    }

    registry
  }

  /// Register a handler, returning the one it replaced.
  pub fn register(
    &mut self,
    action_type: ActionType,
    handler: Arc<dyn ActionHandler>,
  ) -> Option<Arc<dyn ActionHandler>> {
    self.handlers.insert(action_type, handler)
  }

  pub fn with_handler(mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) -> Self {
    self.register(action_type, handler);
    self
  }

  pub fn get(&self, action_type: ActionType) -> Option<&Arc<dyn ActionHandler>> {
    self.handlers.get(&action_type)
  }

  pub fn contains(&self, action_type: ActionType) -> bool {
    self.handlers.contains_key(&action_type)
  }
}

impl fmt::Debug for ActionRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
    kinds.sort_unstable();
    f.debug_struct("ActionRegistry").field("handlers", &kinds).finish()
  }
}
