use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
  #[serde(alias = "source")]
  pub from: String,
  #[serde(alias = "target")]
  pub to: String,
  /// Branch label for edges leaving a condition node (`"true"` / `"false"`).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
}

impl EdgeDef {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      branch: None,
    }
  }

  pub fn branch(from: impl Into<String>, to: impl Into<String>, branch: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      branch: Some(branch.into()),
    }
  }
}
