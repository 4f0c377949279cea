//! Delay duration parsing.

use serde_json::Value;
use trellis_config::DelayUnit;

/// Turn a delay node's `value` and `unit` into milliseconds.
///
/// Numbers are read in `unit`. Strings may carry their own unit suffix
/// (`"5m"`, `"2 hours"`, `"90"`), which overrides `unit`. Negative, fractional
/// overflow and non-numeric values are rejected.
pub fn parse_delay(value: &Value, unit: DelayUnit) -> Result<u64, String> {
  match value {
    Value::Number(n) => {
      let amount = n
        .as_f64()
        .ok_or_else(|| format!("delay value {} is not a finite number", n))?;
      to_millis(amount, unit)
    }
    Value::String(s) => parse_delay_str(s, unit),
    other => Err(format!("delay value must be a number or string, got {}", other)),
  }
}

fn parse_delay_str(raw: &str, default_unit: DelayUnit) -> Result<u64, String> {
  let trimmed = raw.trim();
  let split = trimmed
    .find(|c: char| !(c.is_ascii_digit() || c == '.'))
    .unwrap_or(trimmed.len());
  let (number, suffix) = trimmed.split_at(split);

  if number.is_empty() {
    return Err(format!("delay '{}' does not start with a number", raw));
  }

  let amount: f64 = number
    .parse()
    .map_err(|_| format!("delay '{}' has an invalid number", raw))?;

  let suffix = suffix.trim();
  let unit = if suffix.is_empty() {
    default_unit
  } else {
    DelayUnit::parse(suffix).ok_or_else(|| format!("delay '{}' has an unknown unit '{}'", raw, suffix))?
  };

  to_millis(amount, unit)
}

fn to_millis(amount: f64, unit: DelayUnit) -> Result<u64, String> {
  if !amount.is_finite() || amount < 0.0 {
    return Err(format!("delay must be a non-negative number, got {}", amount));
  }
  let millis = amount * unit.millis() as f64;
  if millis > u64::MAX as f64 {
    return Err("delay is too large".to_string());
  }
  Ok(millis.round() as u64)
}
