use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use trellis_config::ActionType;

use crate::action::{ActionError, ActionHandler};
use crate::types::NodeContext;

/// Expected params for `api_call` and `webhook` actions.
#[derive(Debug, Deserialize)]
struct HttpParams {
  #[serde(default)]
  method: Option<String>,
  url: String,
  #[serde(default)]
  headers: HashMap<String, String>,
  #[serde(default)]
  body: Option<Value>,
}

/// Sends HTTP requests for `api_call` (default `GET`) and `webhook`
/// (default `POST`) actions.
#[derive(Debug, Clone, Default)]
pub struct HttpActionHandler {
  client: Client,
}

impl HttpActionHandler {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ActionHandler for HttpActionHandler {
  async fn execute(
    &self,
    action_type: ActionType,
    params: &Value,
    ctx: &NodeContext,
  ) -> Result<Value, ActionError> {
    let default_method = match action_type {
      ActionType::ApiCall => "GET",
      ActionType::Webhook => "POST",
      other => {
        return Err(ActionError::InvalidParams(format!(
          "http handler does not serve {} actions",
          other
        )));
      }
    };

    let input: HttpParams = serde_json::from_value(params.clone())
      .map_err(|e| ActionError::InvalidParams(e.to_string()))?;

    let method = parse_method(input.method.as_deref().unwrap_or(default_method))?;
    debug!(
      execution_id = %ctx.execution_id,
      node_id = %ctx.node_id,
      %method,
      url = %input.url,
      "sending http action"
    );

    let mut request = self.client.request(method, &input.url);
    for (key, value) in &input.headers {
      request = request.header(key, value);
    }
    if let Some(body) = &input.body {
      request = request.json(body);
    }

    let response = request.send().await?;

    let status = response.status();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), val.to_string()))
      })
      .collect();

    let body = response.text().await?;
    // JSON when it parses, raw text otherwise
    let body = serde_json::from_str(&body).unwrap_or(Value::String(body));

    if !status.is_success() {
      return Err(ActionError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(serde_json::json!({
      "status": status.as_u16(),
      "headers": headers,
      "body": body,
    }))
  }
}

fn parse_method(method: &str) -> Result<Method, ActionError> {
  match method.to_uppercase().as_str() {
    "GET" => Ok(Method::GET),
    "POST" => Ok(Method::POST),
    "PUT" => Ok(Method::PUT),
    "DELETE" => Ok(Method::DELETE),
    "PATCH" => Ok(Method::PATCH),
    "HEAD" => Ok(Method::HEAD),
    "OPTIONS" => Ok(Method::OPTIONS),
    _ => Err(ActionError::InvalidParams(format!(
      "unsupported HTTP method: {}",
      method
    ))),
  }
}
