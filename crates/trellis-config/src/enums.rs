use std::fmt;

use serde::{Deserialize, Serialize};

/// How a trigger node is fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
  #[default]
  Manual,
  Schedule,
  Webhook,
  Event,
}

impl TriggerType {
  pub fn as_str(&self) -> &'static str {
    match self {
      TriggerType::Manual => "manual",
      TriggerType::Schedule => "schedule",
      TriggerType::Webhook => "webhook",
      TriggerType::Event => "event",
    }
  }
}

/// The sub-effect an action node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
  ApiCall,
  Email,
  Database,
  Webhook,
  Notification,
}

impl ActionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ActionType::ApiCall => "api_call",
      ActionType::Email => "email",
      ActionType::Database => "database",
      ActionType::Webhook => "webhook",
      ActionType::Notification => "notification",
    }
  }
}

impl fmt::Display for ActionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Unit of a delay node's duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
  #[default]
  #[serde(alias = "s", alias = "second", alias = "secs")]
  Seconds,
  #[serde(alias = "m", alias = "minute", alias = "mins")]
  Minutes,
  #[serde(alias = "h", alias = "hour")]
  Hours,
}

impl DelayUnit {
  /// Number of milliseconds in one unit.
  pub fn millis(&self) -> u64 {
    match self {
      DelayUnit::Seconds => 1_000,
      DelayUnit::Minutes => 60_000,
      DelayUnit::Hours => 3_600_000,
    }
  }

  /// Parse a unit suffix such as `s`, `min` or `hours`.
  pub fn parse(suffix: &str) -> Option<Self> {
    match suffix.trim().to_ascii_lowercase().as_str() {
      "s" | "sec" | "secs" | "second" | "seconds" => Some(DelayUnit::Seconds),
      "m" | "min" | "mins" | "minute" | "minutes" => Some(DelayUnit::Minutes),
      "h" | "hr" | "hrs" | "hour" | "hours" => Some(DelayUnit::Hours),
      _ => None,
    }
  }
}
