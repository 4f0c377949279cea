use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use trellis_config::ActionType;

use crate::action::{ActionError, ActionHandler};
use crate::types::NodeContext;

#[derive(Debug, Deserialize)]
struct WriteParams {
  collection: String,
  #[serde(default)]
  key: Option<String>,
  data: Value,
}

/// In-memory datastore backing `database` actions.
///
/// Records are grouped by collection and keyed by the `key` param, or a fresh
/// uuid when none is given. Writes to an existing key replace the record.
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
  collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryDatastore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn get(&self, collection: &str, key: &str) -> Option<Value> {
    let collections = self.collections.read().await;
    collections.get(collection)?.get(key).cloned()
  }

  pub async fn len(&self, collection: &str) -> usize {
    let collections = self.collections.read().await;
    collections.get(collection).map_or(0, HashMap::len)
  }
}

#[async_trait]
impl ActionHandler for InMemoryDatastore {
  async fn execute(
    &self,
    _action_type: ActionType,
    params: &Value,
    _ctx: &NodeContext,
  ) -> Result<Value, ActionError> {
    let input: WriteParams = serde_json::from_value(params.clone())
      .map_err(|e| ActionError::InvalidParams(e.to_string()))?;

    if input.collection.is_empty() {
      return Err(ActionError::InvalidParams("collection must not be empty".to_string()));
    }

    let key = input
      .key
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut collections = self.collections.write().await;
    let replaced = collections
      .entry(input.collection.clone())
      .or_default()
      .insert(key.clone(), input.data)
      .is_some();

    Ok(serde_json::json!({
      "collection": input.collection,
      "key": key,
      "replaced": replaced,
    }))
  }
}
