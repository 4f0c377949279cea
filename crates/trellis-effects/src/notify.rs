use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use trellis_config::ActionType;

use crate::action::{ActionError, ActionHandler};
use crate::types::NodeContext;

#[derive(Debug, Deserialize)]
struct NotifyParams {
  #[serde(alias = "message")]
  text: String,
  #[serde(default)]
  channel: Option<String>,
}

/// Posts `notification` actions to a chat webhook as `{ text, channel? }`.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: Client,
  url: String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      client: Client::new(),
      url: url.into(),
    }
  }
}

fn payload(params: &Value) -> Result<Value, ActionError> {
  let input: NotifyParams = serde_json::from_value(params.clone())
    .map_err(|e| ActionError::InvalidParams(e.to_string()))?;

  let mut body = serde_json::json!({ "text": input.text });
  if let Some(channel) = input.channel {
    body["channel"] = Value::String(channel);
  }
  Ok(body)
}

#[async_trait]
impl ActionHandler for WebhookNotifier {
  async fn execute(
    &self,
    _action_type: ActionType,
    params: &Value,
    ctx: &NodeContext,
  ) -> Result<Value, ActionError> {
    let body = payload(params)?;
    debug!(execution_id = %ctx.execution_id, node_id = %ctx.node_id, "posting notification");

    let response = self.client.post(&self.url).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(ActionError::Status {
        status: status.as_u16(),
        body: Value::String(text),
      });
    }

    Ok(serde_json::json!({ "delivered": true, "status": status.as_u16() }))
  }
}
