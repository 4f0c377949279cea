//! Template resolution for node configuration.
//!
//! Before a node is dispatched every string in its configuration is scanned for
//! `{{ expr }}` placeholders. Each placeholder is a minijinja expression
//! evaluated against the run variables, so dotted paths and filters work:
//!
//! ```json
//! { "input": "Summarise {{ fetch.response.body | truncate(200) }}" }
//! ```
//!
//! A string that is exactly one placeholder takes the JSON type of its value:
//! `"{{ classify.output }}"` can become an object or a number. Placeholders
//! that fail to evaluate, or evaluate to an undefined value, are left as
//! written.
//!
//! Condition expressions are never resolved; they read variables directly.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Value};
use trellis_workflow::NodeKind;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub struct TemplateResolver {
  env: Environment<'static>,
}

impl Default for TemplateResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl TemplateResolver {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Self { env }
  }

  /// Resolve every placeholder in a node's configuration.
  ///
  /// When a type-preserving substitution no longer fits the configuration's
  /// shape (an object landing in a string field, say), the configuration is
  /// resolved again with every placeholder rendered as text.
  pub fn resolve_kind(
    &self,
    kind: &NodeKind,
    variables: &Map<String, Value>,
  ) -> Result<NodeKind, serde_json::Error> {
    if kind.is_condition() {
      return Ok(kind.clone());
    }

    let raw = serde_json::to_value(kind)?;
    let ctx = minijinja::Value::from_serialize(variables);

    let typed = self.resolve_value(&raw, &ctx, true);
    match serde_json::from_value(typed) {
      Ok(kind) => Ok(kind),
      Err(_) => serde_json::from_value(self.resolve_value(&raw, &ctx, false)),
    }
  }

  /// Resolve placeholders in every string nested inside `value`.
  pub fn resolve_value(&self, value: &Value, ctx: &minijinja::Value, preserve_types: bool) -> Value {
    match value {
      Value::String(s) => self.resolve_str(s, ctx, preserve_types),
      Value::Array(items) => Value::Array(
        items
          .iter()
          .map(|item| self.resolve_value(item, ctx, preserve_types))
          .collect(),
      ),
      Value::Object(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), self.resolve_value(v, ctx, preserve_types)))
          .collect(),
      ),
      other => other.clone(),
    }
  }

  fn resolve_str(&self, template: &str, ctx: &minijinja::Value, preserve_types: bool) -> Value {
    if !template.contains(OPEN) {
      return Value::String(template.to_string());
    }

    if preserve_types {
      if let Some(expr) = single_placeholder(template) {
        return match self.eval(expr, ctx) {
          Some(value) => value,
          None => Value::String(template.to_string()),
        };
      }
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
      let Some(len) = rest[start + OPEN.len()..].find(CLOSE) else {
        break;
      };
      let end = start + OPEN.len() + len + CLOSE.len();
      let expr = &rest[start + OPEN.len()..start + OPEN.len() + len];

      out.push_str(&rest[..start]);
      match self.eval(expr.trim(), ctx) {
        Some(Value::String(s)) => out.push_str(&s),
        Some(value) => out.push_str(&value.to_string()),
        None => out.push_str(&rest[start..end]),
      }
      rest = &rest[end..];
    }
    out.push_str(rest);

    Value::String(out)
  }

  /// Evaluate one placeholder body. `None` when it cannot be resolved.
  fn eval(&self, expr: &str, ctx: &minijinja::Value) -> Option<Value> {
    if expr.is_empty() {
      return None;
    }
    let compiled = self.env.compile_expression(expr).ok()?;
    let value = compiled.eval(ctx).ok()?;
    if value.is_undefined() {
      return None;
    }
    serde_json::to_value(&value).ok()
  }
}

/// The trimmed body of `template` if it is a single `{{ ... }}` and nothing else.
fn single_placeholder(template: &str) -> Option<&str> {
  let inner = template
    .trim()
    .strip_prefix(OPEN)?
    .strip_suffix(CLOSE)?;
  if inner.contains(OPEN) || inner.contains(CLOSE) {
    return None;
  }
  Some(inner.trim())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use trellis_workflow::{
    ActionConfig, ActionType, AgentConfig, ConditionConfig, DelayConfig, DelayUnit,
  };

  fn vars(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      _ => panic!("variables must be an object"),
    }
  }

  fn resolve(template: &str, variables: Value) -> Value {
    let resolver = TemplateResolver::new();
    let ctx = minijinja::Value::from_serialize(vars(variables));
    resolver.resolve_value(&json!(template), &ctx, true)
  }

  #[test]
  fn test_paths_and_filters() {
    let v = json!({ "fetch_user": { "email": "a@b.c", "name": "john doe" } });
    assert_eq!(resolve("{{ fetch_user.email }}", v.clone()), json!("a@b.c"));
    assert_eq!(
      resolve("Hello {{ fetch_user.name | title }}!", v.clone()),
      json!("Hello John Doe!")
    );
    assert_eq!(resolve("{{ fetch_user.name | upper }}", v), json!("JOHN DOE"));
  }

  #[test]
  fn test_single_placeholder_keeps_type() {
    let v = json!({ "score": { "value": 42, "tags": ["a", "b"], "ok": true } });
    assert_eq!(resolve("{{ score.value }}", v.clone()), json!(42));
    assert_eq!(resolve("  {{score.tags}} ", v.clone()), json!(["a", "b"]));
    assert_eq!(resolve("{{ score }}", v.clone()), json!({ "value": 42, "tags": ["a", "b"], "ok": true }));
    assert_eq!(resolve("{{ score.ok }}", v), json!(true));
  }

  #[test]
  fn test_mixed_text_renders_strings() {
    let v = json!({ "user": { "name": "Alice" }, "count": 5, "meta": { "k": 1 } });
    assert_eq!(
      resolve("Hello {{ user.name }}, you have {{ count }} messages", v.clone()),
      json!("Hello Alice, you have 5 messages")
    );
    assert_eq!(resolve("meta={{ meta }}", v), json!(r#"meta={"k":1}"#));
  }

  #[test]
  fn test_unresolved_left_verbatim() {
    let v = json!({ "user": { "name": "Alice" } });
    assert_eq!(resolve("{{ missing }}", v.clone()), json!("{{ missing }}"));
    assert_eq!(resolve("{{ user.age }}", v.clone()), json!("{{ user.age }}"));
    assert_eq!(resolve("{{ missing.deeper.path }}", v.clone()), json!("{{ missing.deeper.path }}"));
    assert_eq!(resolve("x {{ (( }} y", v.clone()), json!("x {{ (( }} y"));
    assert_eq!(resolve("open {{ user.name", v.clone()), json!("open {{ user.name"));
    assert_eq!(resolve("{{}}", v.clone()), json!("{{}}"));
    // Filters and concatenation do not swallow a missing value.
    assert_eq!(resolve("{{ missing | upper }}", v.clone()), json!("{{ missing | upper }}"));
    assert_eq!(resolve("Hi {{ missing | title }}!", v.clone()), json!("Hi {{ missing | title }}!"));
    assert_eq!(resolve("{{ missing ~ 'x' }}", v.clone()), json!("{{ missing ~ 'x' }}"));
    assert_eq!(resolve("{{ user.age | upper }}", v.clone()), json!("{{ user.age | upper }}"));
    assert_eq!(resolve("{{ missing | default('anon') }}", v.clone()), json!("anon"));
    assert_eq!(resolve("{{ missing is defined }}", v.clone()), json!(false));
    assert_eq!(resolve("plain", v), json!("plain"));
  }

  #[test]
  fn test_nested_structures() {
    let resolver = TemplateResolver::new();
    let ctx = minijinja::Value::from_serialize(vars(json!({ "id": 7, "name": "n" })));
    let resolved = resolver.resolve_value(
      &json!({ "body": { "id": "{{ id }}", "list": ["{{ name }}", 1] }, "n": null }),
      &ctx,
      true,
    );
    assert_eq!(
      resolved,
      json!({ "body": { "id": 7, "list": ["n", 1] }, "n": null })
    );
  }

  #[test]
  fn test_resolve_kind_agent_and_action() {
    let resolver = TemplateResolver::new();
    let variables = vars(json!({
      "classify": { "output": { "label": "refund" } },
      "ticket": { "id": 99, "text": "I want my money back" }
    }));

    let agent = NodeKind::Agent(AgentConfig {
      agent_id: "responder".to_string(),
      input: Some("{{ ticket.text }}".to_string()),
      input_key: None,
      context: Map::new(),
    });
    match resolver.resolve_kind(&agent, &variables).unwrap() {
      NodeKind::Agent(config) => assert_eq!(config.input.as_deref(), Some("I want my money back")),
      other => panic!("unexpected kind {:?}", other),
    }

    // An object placeholder in a string field falls back to its JSON text.
    let agent = NodeKind::Agent(AgentConfig {
      agent_id: "responder".to_string(),
      input: Some("{{ classify.output }}".to_string()),
      input_key: None,
      context: Map::new(),
    });
    match resolver.resolve_kind(&agent, &variables).unwrap() {
      NodeKind::Agent(config) => {
        assert_eq!(config.input.as_deref(), Some(r#"{"label":"refund"}"#))
      }
      other => panic!("unexpected kind {:?}", other),
    }

    let action = NodeKind::Action(ActionConfig {
      action_type: ActionType::Database,
      params: json!({ "collection": "tickets", "key": "t-{{ ticket.id }}", "data": "{{ classify.output }}" }),
    });
    match resolver.resolve_kind(&action, &variables).unwrap() {
      NodeKind::Action(config) => assert_eq!(
        config.params,
        json!({ "collection": "tickets", "key": "t-99", "data": { "label": "refund" } })
      ),
      other => panic!("unexpected kind {:?}", other),
    }
  }

  #[test]
  fn test_resolve_kind_delay_value() {
    let resolver = TemplateResolver::new();
    let variables = vars(json!({ "plan": { "wait": 3 } }));
    let delay = NodeKind::Delay(DelayConfig {
      value: json!("{{ plan.wait }}"),
      unit: DelayUnit::Minutes,
    });
    match resolver.resolve_kind(&delay, &variables).unwrap() {
      NodeKind::Delay(config) => assert_eq!(config.value, json!(3)),
      other => panic!("unexpected kind {:?}", other),
    }
  }

  #[test]
  fn test_condition_expressions_untouched() {
    let resolver = TemplateResolver::new();
    let variables = vars(json!({ "evil": "true || true" }));
    let condition = NodeKind::Condition(ConditionConfig {
      expression: "{{ evil }}".to_string(),
    });
    assert_eq!(resolver.resolve_kind(&condition, &variables).unwrap(), condition);
  }
}
