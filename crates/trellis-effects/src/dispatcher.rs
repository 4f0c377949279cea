use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{instrument, warn};
use trellis_config::EngineConfig;
use trellis_workflow::{
  ActionConfig, AgentConfig, ConditionConfig, DelayConfig, Node, NodeKind, TriggerConfig,
};

use crate::action::ActionRegistry;
use crate::agent::{AgentInvoker, AgentRequest, HttpAgentClient, RetryingInvoker};
use crate::condition;
use crate::delay::parse_delay;
use crate::error::EffectError;
use crate::types::{EffectOutput, NodeContext};

/// Performs the effect of a single node.
///
/// Implementations must not mutate run state; the scheduler folds the
/// returned output into the execution context.
#[async_trait]
pub trait EffectDispatcher: Send + Sync {
  async fn execute(&self, node: &Node, ctx: &NodeContext) -> Result<EffectOutput, EffectError>;
}

/// Dispatches every node kind to its built-in effect.
pub struct StandardDispatcher {
  agents: Arc<dyn AgentInvoker>,
  actions: ActionRegistry,
  max_delay_ms: u64,
  default_input_key: String,
}

impl StandardDispatcher {
  pub fn new(agents: Arc<dyn AgentInvoker>, actions: ActionRegistry) -> Self {
    let defaults = EngineConfig::default();
    Self {
      agents,
      actions,
      max_delay_ms: defaults.max_delay_ms,
      default_input_key: defaults.default_input_key,
    }
  }

  /// Build a dispatcher backed by the HTTP agent service and the default
  /// action handlers.
  pub fn from_config(config: &EngineConfig) -> Result<Self, reqwest::Error> {
    let client = HttpAgentClient::from_config(&config.agent_service)?;
    let agents = RetryingInvoker::new(Arc::new(client), config.agent_service.retry);
    Ok(
      Self::new(Arc::new(agents), ActionRegistry::with_defaults(config))
        .with_max_delay_ms(config.max_delay_ms)
        .with_default_input_key(config.default_input_key.clone()),
    )
  }

  pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
    self.max_delay_ms = max_delay_ms;
    self
  }

  pub fn with_default_input_key(mut self, key: impl Into<String>) -> Self {
    self.default_input_key = key.into();
    self
  }

  pub fn actions(&self) -> &ActionRegistry {
    &self.actions
  }

  async fn agent(&self, config: &AgentConfig, ctx: &NodeContext) -> Result<EffectOutput, EffectError> {
    let input = config
      .input
      .clone()
      .or_else(|| {
        config
          .input_key
          .as_deref()
          .and_then(|key| ctx.variables.get(key))
          .map(as_text)
      })
      .or_else(|| ctx.variables.get(&self.default_input_key).map(as_text))
      .unwrap_or_default();

    let mut context: Map<String, Value> = (*ctx.variables).clone();
    context.extend(config.context.clone());
    context.insert("executionId".to_string(), Value::String(ctx.execution_id.clone()));

    let request = AgentRequest {
      agent_id: config.agent_id.clone(),
      input,
      context,
    };

    let response = tokio::select! {
      _ = ctx.cancel.cancelled() => return Err(EffectError::Cancelled),
      response = self.agents.invoke(&request) => response,
    };

    let response = response.map_err(|e| EffectError::AgentUnavailable {
      agent_id: config.agent_id.clone(),
      message: e.to_string(),
    })?;

    if matches!(response.status.as_str(), "failed" | "error") {
      return Err(EffectError::AgentUnavailable {
        agent_id: config.agent_id.clone(),
        message: format!("agent reported status '{}': {}", response.status, response.output),
      });
    }

    let data = json!({
      "output": response.output.clone(),
      "chain_of_thought": response.chain_of_thought,
      "agent_id": config.agent_id,
      "status": response.status,
    });
    Ok(EffectOutput::new(data, response.output))
  }

  async fn action(
    &self,
    config: &ActionConfig,
    ctx: &NodeContext,
  ) -> Result<EffectOutput, EffectError> {
    let subtype = config.action_type.as_str().to_string();
    let handler = self
      .actions
      .get(config.action_type)
      .ok_or_else(|| EffectError::ActionFailed {
        subtype: subtype.clone(),
        detail: format!("no handler registered for {}", subtype),
      })?;

    let response = tokio::select! {
      _ = ctx.cancel.cancelled() => return Err(EffectError::Cancelled),
      response = handler.execute(config.action_type, &config.params, ctx) => response,
    };

    let response = response.map_err(|e| EffectError::ActionFailed {
      subtype: subtype.clone(),
      detail: e.to_string(),
    })?;

    let data = json!({ "action_type": subtype, "response": response.clone() });
    Ok(EffectOutput::new(data, response))
  }

  async fn delay(&self, config: &DelayConfig, ctx: &NodeContext) -> Result<EffectOutput, EffectError> {
    let requested_ms =
      parse_delay(&config.value, config.unit).map_err(|message| EffectError::InvalidConfig { message })?;

    let capped = requested_ms > self.max_delay_ms;
    let waited_ms = requested_ms.min(self.max_delay_ms);
    if capped {
      warn!(
        node_id = %ctx.node_id,
        requested_ms,
        max_delay_ms = self.max_delay_ms,
        "delay capped"
      );
    }

    tokio::select! {
      _ = ctx.cancel.cancelled() => return Err(EffectError::Cancelled),
      _ = tokio::time::sleep(Duration::from_millis(waited_ms)) => {}
    }

    let data = json!({
      "requested_ms": requested_ms,
      "waited_ms": waited_ms,
      "capped": capped,
    });
    Ok(EffectOutput::new(data, Value::from(waited_ms)))
  }
}

#[async_trait]
impl EffectDispatcher for StandardDispatcher {
  #[instrument(
    name = "effect",
    skip_all,
    fields(execution_id = %ctx.execution_id, node_id = %node.node_id, kind = node.kind.name())
  )]
  async fn execute(&self, node: &Node, ctx: &NodeContext) -> Result<EffectOutput, EffectError> {
    if ctx.cancel.is_cancelled() {
      return Err(EffectError::Cancelled);
    }

    match &node.kind {
      NodeKind::Trigger(config) => Ok(fire_trigger(config)),
      NodeKind::Agent(config) => self.agent(config, ctx).await,
      NodeKind::Action(config) => self.action(config, ctx).await,
      NodeKind::Condition(config) => evaluate_condition(config, ctx),
      NodeKind::Delay(config) => self.delay(config, ctx).await,
    }
  }
}

fn fire_trigger(config: &TriggerConfig) -> EffectOutput {
  let settings = Value::Object(config.settings.clone());
  let data = json!({
    "triggered_at": chrono::Utc::now().to_rfc3339(),
    "trigger_type": config.trigger_type.as_str(),
    "config": settings.clone(),
  });
  EffectOutput::new(data, settings)
}

fn evaluate_condition(config: &ConditionConfig, ctx: &NodeContext) -> Result<EffectOutput, EffectError> {
  let result = condition::evaluate(&config.expression, &ctx.variables)?;
  Ok(EffectOutput::new(json!({ "result": result }), Value::Bool(result)))
}

/// Strings pass through; anything else is sent as its JSON text.
fn as_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
