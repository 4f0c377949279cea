//! Boolean expressions for condition nodes.
//!
//! A deliberately small grammar: literals, variable paths, comparisons and
//! boolean connectives. There are no function calls, no assignment and no
//! access to anything outside the variable map handed to [`evaluate`].
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | compare
//! compare := operand (("==" | "!=" | "<" | "<=" | ">" | ">=" | "contains") operand)?
//! operand := number | string | true | false | null | path | "(" expr ")"
//! path    := root ("." ident | "[" integer "]" | "[" string "]")*
//! root    := ident | "vars" "[" string "]"
//! ```
//!
//! `vars["..."]` names a top-level variable that is not a valid identifier,
//! such as the output of a node whose id starts with a digit:
//! `vars["3f2a-node"].status == "completed"`.
//!
//! Evaluation is strict: a missing variable, a connective applied to a
//! non-boolean, an ordering between mismatched types, or a non-boolean final
//! result is an error, never `false`.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

/// Nesting limit for parentheses and `not` chains.
const MAX_DEPTH: usize = 64;

/// Identifier that indexes the variable map itself when followed by `[`.
const ROOT: &str = "vars";

/// Errors from parsing or evaluating a condition expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
  #[error("syntax error at offset {offset}: {message}")]
  Syntax { offset: usize, message: String },

  #[error("unknown variable '{0}'")]
  MissingVariable(String),

  #[error("type error: {0}")]
  Type(String),
}

/// Parse and evaluate `expression` against `variables`.
pub fn evaluate(expression: &str, variables: &Map<String, Value>) -> Result<bool, ConditionError> {
  Expression::parse(expression)?.evaluate(variables)
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
  root: Expr,
}

impl Expression {
  pub fn parse(source: &str) -> Result<Self, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
      tokens,
      pos: 0,
      depth: 0,
      end: source.len(),
    };
    let root = parser.parse_or()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
      return Err(ConditionError::Syntax {
        offset: *offset,
        message: format!("unexpected {}", token),
      });
    }
    Ok(Self { root })
  }

  pub fn evaluate(&self, variables: &Map<String, Value>) -> Result<bool, ConditionError> {
    match eval(&self.root, variables)? {
      Value::Bool(b) => Ok(b),
      other => Err(ConditionError::Type(format!(
        "expression evaluated to {}, expected a boolean",
        kind_of(&other)
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Number(f64),
  Str(String),
  Ident(String),
  True,
  False,
  Null,
  And,
  Or,
  Not,
  Contains,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Dot,
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Number(n) => write!(f, "number {}", n),
      Token::Str(s) => write!(f, "string {:?}", s),
      Token::Ident(name) => write!(f, "identifier '{}'", name),
      Token::True => f.write_str("'true'"),
      Token::False => f.write_str("'false'"),
      Token::Null => f.write_str("'null'"),
      Token::And => f.write_str("'&&'"),
      Token::Or => f.write_str("'||'"),
      Token::Not => f.write_str("'!'"),
      Token::Contains => f.write_str("'contains'"),
      Token::Eq => f.write_str("'=='"),
      Token::Ne => f.write_str("'!='"),
      Token::Lt => f.write_str("'<'"),
      Token::Le => f.write_str("'<='"),
      Token::Gt => f.write_str("'>'"),
      Token::Ge => f.write_str("'>='"),
      Token::LParen => f.write_str("'('"),
      Token::RParen => f.write_str("')'"),
      Token::LBracket => f.write_str("'['"),
      Token::RBracket => f.write_str("']'"),
      Token::Dot => f.write_str("'.'"),
    }
  }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
  let bytes = source.as_bytes();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    let start = i;

    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    let two = bytes.get(i + 1).copied();
    let token = match (c, two) {
      (b'=', Some(b'=')) => {
        i += 2;
        Token::Eq
      }
      (b'!', Some(b'=')) => {
        i += 2;
        Token::Ne
      }
      (b'<', Some(b'=')) => {
        i += 2;
        Token::Le
      }
      (b'>', Some(b'=')) => {
        i += 2;
        Token::Ge
      }
      (b'&', Some(b'&')) => {
        i += 2;
        Token::And
      }
      (b'|', Some(b'|')) => {
        i += 2;
        Token::Or
      }
      (b'=', _) => {
        return Err(ConditionError::Syntax {
          offset: start,
          message: "'=' is not an operator, use '=='".to_string(),
        });
      }
      (b'!', _) => {
        i += 1;
        Token::Not
      }
      (b'<', _) => {
        i += 1;
        Token::Lt
      }
      (b'>', _) => {
        i += 1;
        Token::Gt
      }
      (b'(', _) => {
        i += 1;
        Token::LParen
      }
      (b')', _) => {
        i += 1;
        Token::RParen
      }
      (b'[', _) => {
        i += 1;
        Token::LBracket
      }
      (b']', _) => {
        i += 1;
        Token::RBracket
      }
      (b'.', _) => {
        i += 1;
        Token::Dot
      }
      (b'"' | b'\'', _) => {
        let (text, next) = lex_string(source, start, c)?;
        i = next;
        Token::Str(text)
      }
      (b'0'..=b'9', _) | (b'-', Some(b'0'..=b'9')) => {
        i += 1;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
          i += 1;
        }
        let text = &source[start..i];
        let number = text.parse::<f64>().map_err(|_| ConditionError::Syntax {
          offset: start,
          message: format!("invalid number '{}'", text),
        })?;
        Token::Number(number)
      }
      (c, _) if c.is_ascii_alphabetic() || c == b'_' => {
        i += 1;
        while i < bytes.len()
          && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
        {
          i += 1;
        }
        match &source[start..i] {
          "true" => Token::True,
          "false" => Token::False,
          "null" => Token::Null,
          "and" => Token::And,
          "or" => Token::Or,
          "not" => Token::Not,
          "contains" => Token::Contains,
          ident => Token::Ident(ident.to_string()),
        }
      }
      _ => {
        let ch = source[start..].chars().next().unwrap_or('?');
        return Err(ConditionError::Syntax {
          offset: start,
          message: format!("unexpected character '{}'", ch),
        });
      }
    };

    tokens.push((start, token));
  }

  Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the text and the offset
/// just past the closing quote.
fn lex_string(source: &str, start: usize, quote: u8) -> Result<(String, usize), ConditionError> {
  let mut out = String::new();
  let mut chars = source[start + 1..].char_indices();

  while let Some((offset, ch)) = chars.next() {
    match ch {
      '\\' => match chars.next() {
        Some((_, 'n')) => out.push('\n'),
        Some((_, 't')) => out.push('\t'),
        Some((_, escaped)) => out.push(escaped),
        None => break,
      },
      c if c as u32 == quote as u32 => return Ok((out, start + 1 + offset + 1)),
      c => out.push(c),
    }
  }

  Err(ConditionError::Syntax {
    offset: start,
    message: "unterminated string".to_string(),
  })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
  Key(String),
  Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
  Literal(Value),
  Path(Vec<Segment>),
  Not(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Compare(CmpOp, Box<Expr>, Box<Expr>),
}

struct Parser {
  tokens: Vec<(usize, Token)>,
  pos: usize,
  depth: usize,
  end: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos).map(|(_, t)| t)
  }

  fn offset(&self) -> usize {
    self
      .tokens
      .get(self.pos)
      .map(|(offset, _)| *offset)
      .unwrap_or(self.end)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn error(&self, message: impl Into<String>) -> ConditionError {
    ConditionError::Syntax {
      offset: self.offset(),
      message: message.into(),
    }
  }

  fn enter(&mut self) -> Result<(), ConditionError> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      return Err(self.error("expression nested too deeply"));
    }
    Ok(())
  }

  fn parse_or(&mut self) -> Result<Expr, ConditionError> {
    let mut left = self.parse_and()?;
    while self.peek() == Some(&Token::Or) {
      self.pos += 1;
      let right = self.parse_and()?;
      left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn parse_and(&mut self) -> Result<Expr, ConditionError> {
    let mut left = self.parse_unary()?;
    while self.peek() == Some(&Token::And) {
      self.pos += 1;
      let right = self.parse_unary()?;
      left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
    if self.peek() == Some(&Token::Not) {
      self.pos += 1;
      self.enter()?;
      let inner = self.parse_unary()?;
      self.depth -= 1;
      return Ok(Expr::Not(Box::new(inner)));
    }
    self.parse_compare()
  }

  fn parse_compare(&mut self) -> Result<Expr, ConditionError> {
    let left = self.parse_operand()?;
    let op = match self.peek() {
      Some(Token::Eq) => CmpOp::Eq,
      Some(Token::Ne) => CmpOp::Ne,
      Some(Token::Lt) => CmpOp::Lt,
      Some(Token::Le) => CmpOp::Le,
      Some(Token::Gt) => CmpOp::Gt,
      Some(Token::Ge) => CmpOp::Ge,
      Some(Token::Contains) => CmpOp::Contains,
      _ => return Ok(left),
    };
    self.pos += 1;
    let right = self.parse_operand()?;
    Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
  }

  fn parse_operand(&mut self) -> Result<Expr, ConditionError> {
    let offset = self.offset();
    match self.next() {
      Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
      Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
      Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
      Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
      Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
      Some(Token::Ident(name)) if name == ROOT && self.peek() == Some(&Token::LBracket) => {
        self.pos += 1;
        let key = match self.next() {
          Some(Token::Str(key)) => key,
          _ => return Err(self.error("expected a quoted variable name inside 'vars[ ]'")),
        };
        if self.next() != Some(Token::RBracket) {
          return Err(self.error("expected ']'"));
        }
        self.parse_path(key)
      }
      Some(Token::Ident(name)) => self.parse_path(name),
      Some(Token::LParen) => {
        self.enter()?;
        let inner = self.parse_or()?;
        self.depth -= 1;
        match self.next() {
          Some(Token::RParen) => Ok(inner),
          _ => Err(ConditionError::Syntax {
            offset,
            message: "unclosed '('".to_string(),
          }),
        }
      }
      Some(token) => Err(ConditionError::Syntax {
        offset,
        message: format!("expected a value, found {}", token),
      }),
      None => Err(ConditionError::Syntax {
        offset,
        message: "unexpected end of expression".to_string(),
      }),
    }
  }

  fn parse_path(&mut self, root: String) -> Result<Expr, ConditionError> {
    let mut segments = vec![Segment::Key(root)];
    loop {
      match self.peek() {
        Some(Token::Dot) => {
          self.pos += 1;
          match self.next() {
            Some(Token::Ident(name)) => segments.push(Segment::Key(name)),
            _ => return Err(self.error("expected a field name after '.'")),
          }
        }
        Some(Token::LBracket) => {
          self.pos += 1;
          let segment = match self.next() {
            Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => Segment::Index(n as usize),
            Some(Token::Str(key)) => Segment::Key(key),
            _ => return Err(self.error("expected an index or quoted key inside '[ ]'")),
          };
          if self.next() != Some(Token::RBracket) {
            return Err(self.error("expected ']'"));
          }
          segments.push(segment);
        }
        _ => return Ok(Expr::Path(segments)),
      }
    }
  }
}

fn number_value(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
    Value::from(n as i64)
  } else {
    serde_json::Number::from_f64(n)
      .map(Value::Number)
      .unwrap_or(Value::Null)
  }
}

fn path_display(segments: &[Segment]) -> String {
  let mut out = String::new();
  for (i, segment) in segments.iter().enumerate() {
    match segment {
      Segment::Key(key) if i == 0 => out.push_str(key),
      Segment::Key(key) => {
        out.push('.');
        out.push_str(key);
      }
      Segment::Index(index) => out.push_str(&format!("[{}]", index)),
    }
  }
  out
}

fn lookup(segments: &[Segment], variables: &Map<String, Value>) -> Result<Value, ConditionError> {
  let missing = || ConditionError::MissingVariable(path_display(segments));

  let mut current = match segments.first() {
    Some(Segment::Key(root)) => variables.get(root).ok_or_else(missing)?,
    _ => return Err(missing()),
  };

  for segment in &segments[1..] {
    current = match (segment, current) {
      (Segment::Key(key), Value::Object(map)) => map.get(key).ok_or_else(missing)?,
      (Segment::Index(index), Value::Array(items)) => items.get(*index).ok_or_else(missing)?,
      _ => return Err(missing()),
    };
  }

  Ok(current.clone())
}

fn eval(expr: &Expr, variables: &Map<String, Value>) -> Result<Value, ConditionError> {
  match expr {
    Expr::Literal(value) => Ok(value.clone()),
    Expr::Path(segments) => lookup(segments, variables),
    Expr::Not(inner) => Ok(Value::Bool(!eval_bool(inner, variables, "not")?)),
    Expr::And(left, right) => {
      if !eval_bool(left, variables, "and")? {
        return Ok(Value::Bool(false));
      }
      Ok(Value::Bool(eval_bool(right, variables, "and")?))
    }
    Expr::Or(left, right) => {
      if eval_bool(left, variables, "or")? {
        return Ok(Value::Bool(true));
      }
      Ok(Value::Bool(eval_bool(right, variables, "or")?))
    }
    Expr::Compare(op, left, right) => {
      let left = eval(left, variables)?;
      let right = eval(right, variables)?;
      compare(*op, &left, &right).map(Value::Bool)
    }
  }
}

fn eval_bool(
  expr: &Expr,
  variables: &Map<String, Value>,
  operator: &str,
) -> Result<bool, ConditionError> {
  match eval(expr, variables)? {
    Value::Bool(b) => Ok(b),
    other => Err(ConditionError::Type(format!(
      "'{}' needs boolean operands, got {}",
      operator,
      kind_of(&other)
    ))),
  }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
  match op {
    CmpOp::Eq => Ok(values_equal(left, right)),
    CmpOp::Ne => Ok(!values_equal(left, right)),
    CmpOp::Contains => contains(left, right),
    CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
      let ordering = order(left, right)?;
      Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
      })
    }
  }
}

fn values_equal(left: &Value, right: &Value) -> bool {
  match (left, right) {
    (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
    _ => left == right,
  }
}

fn order(left: &Value, right: &Value) -> Result<Ordering, ConditionError> {
  match (left, right) {
    (Value::Number(a), Value::Number(b)) => {
      let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
      a.partial_cmp(&b)
        .ok_or_else(|| ConditionError::Type("cannot order NaN".to_string()))
    }
    (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
    _ => Err(ConditionError::Type(format!(
      "cannot order {} against {}",
      kind_of(left),
      kind_of(right)
    ))),
  }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, ConditionError> {
  match (haystack, needle) {
    (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
    (Value::Array(items), needle) => Ok(items.iter().any(|item| values_equal(item, needle))),
    (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
    _ => Err(ConditionError::Type(format!(
      "'contains' is not defined for {} and {}",
      kind_of(haystack),
      kind_of(needle)
    ))),
  }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn vars(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      _ => panic!("variables must be an object"),
    }
  }

  #[test]
  fn test_comparisons() {
    let v = vars(json!({ "score": 72, "status": "approved", "ratio": 0.5 }));

    assert!(evaluate("score > 50", &v).unwrap());
    assert!(evaluate("score >= 72", &v).unwrap());
    assert!(!evaluate("score < 72", &v).unwrap());
    assert!(evaluate("score <= 72.0", &v).unwrap());
    assert!(evaluate("score == 72.0", &v).unwrap());
    assert!(evaluate(r#"status == "approved""#, &v).unwrap());
    assert!(evaluate("status != 'rejected'", &v).unwrap());
    assert!(evaluate("ratio < 1", &v).unwrap());
    assert!(evaluate(r#""abc" < "abd""#, &v).unwrap());
  }

  #[test]
  fn test_connectives_and_precedence() {
    let v = vars(json!({ "a": true, "b": false, "n": 3 }));

    assert!(evaluate("a && !b", &v).unwrap());
    assert!(evaluate("a and not b", &v).unwrap());
    assert!(evaluate("b || a", &v).unwrap());
    assert!(!evaluate("b or b", &v).unwrap());
    // && binds tighter than ||
    assert!(evaluate("a || b && b", &v).unwrap());
    assert!(!evaluate("(a || b) && b", &v).unwrap());
    assert!(evaluate("!(n > 5) && n > 1", &v).unwrap());
  }

  #[test]
  fn test_paths() {
    let v = vars(json!({
      "classify": { "output": "refund request", "labels": ["billing", "urgent"] },
      "agent-1": { "status": "completed" }
    }));

    assert!(evaluate(r#"classify.output contains "refund""#, &v).unwrap());
    assert!(evaluate(r#"classify.labels contains "urgent""#, &v).unwrap());
    assert!(evaluate(r#"classify.labels[0] == "billing""#, &v).unwrap());
    assert!(evaluate(r#"classify["output"] != """#, &v).unwrap());
    assert!(evaluate(r#"classify contains "labels""#, &v).unwrap());
    assert!(evaluate(r#"agent-1.status == "completed""#, &v).unwrap());
  }

  #[test]
  fn test_vars_root_reaches_any_variable() {
    let v = vars(json!({
      "3f2a-9c1e": { "status": "completed", "scores": [4, 9] },
      "has space": true,
      "vars": { "plain": 1 }
    }));

    assert!(evaluate(r#"vars["3f2a-9c1e"].status == "completed""#, &v).unwrap());
    assert!(evaluate(r#"vars['3f2a-9c1e'].scores[1] > 5"#, &v).unwrap());
    assert!(evaluate(r#"vars["has space"]"#, &v).unwrap());
    // Without brackets `vars` is an ordinary variable name.
    assert!(evaluate("vars.plain == 1", &v).unwrap());
    assert_eq!(
      evaluate(r#"vars["absent"].x == 1"#, &v),
      Err(ConditionError::MissingVariable("absent.x".to_string()))
    );
    assert!(matches!(
      evaluate("vars[0] == 1", &v),
      Err(ConditionError::Syntax { .. })
    ));
    // A bare leading digit still lexes as a number.
    assert!(matches!(
      evaluate("3f2a.status == 1", &v),
      Err(ConditionError::Syntax { .. })
    ));
  }

  #[test]
  fn test_null_and_literals() {
    let v = vars(json!({ "maybe": null }));
    assert!(evaluate("maybe == null", &v).unwrap());
    assert!(evaluate("true", &v).unwrap());
    assert!(!evaluate("false", &v).unwrap());
    assert!(evaluate("-1 < 0", &v).unwrap());
  }

  #[test]
  fn test_short_circuit_skips_right_side() {
    let v = vars(json!({ "ready": false }));
    assert!(!evaluate("ready && missing > 1", &v).unwrap());
  }

  #[test]
  fn test_missing_variable_is_error() {
    let v = vars(json!({ "user": { "name": "ada" } }));

    assert_eq!(
      evaluate("missing == 1", &v),
      Err(ConditionError::MissingVariable("missing".to_string()))
    );
    assert_eq!(
      evaluate("user.age > 30", &v),
      Err(ConditionError::MissingVariable("user.age".to_string()))
    );
    assert_eq!(
      evaluate("user.name[2] == 1", &v),
      Err(ConditionError::MissingVariable("user.name[2]".to_string()))
    );
  }

  #[test]
  fn test_type_errors() {
    let v = vars(json!({ "count": 3, "name": "x" }));

    assert!(matches!(
      evaluate("count > name", &v),
      Err(ConditionError::Type(_))
    ));
    assert!(matches!(
      evaluate("count && true", &v),
      Err(ConditionError::Type(_))
    ));
    // A non-boolean result is not silently truthy.
    assert!(matches!(evaluate("count", &v), Err(ConditionError::Type(_))));
    assert!(matches!(evaluate("name", &v), Err(ConditionError::Type(_))));
  }

  #[test]
  fn test_syntax_errors() {
    let v = Map::new();

    for source in [
      "",
      "a ==",
      "a = 1",
      "(a == 1",
      "a == 1)",
      "\"open",
      "a.",
      "a[x]",
      "score > 5; drop()",
      "len(items) > 0",
    ] {
      assert!(
        matches!(evaluate(source, &v), Err(ConditionError::Syntax { .. })),
        "expected syntax error for {:?}",
        source
      );
    }
  }

  #[test]
  fn test_injection_attempts_do_not_execute() {
    let v = vars(json!({ "input": "x" }));
    for source in [
      "process.exit(1)",
      "constructor.constructor('return 1')()",
      "input == 'x' || require('fs')",
    ] {
      assert!(evaluate(source, &v).is_err(), "{:?} should fail", source);
    }
  }

  #[test]
  fn test_nesting_limit() {
    let deep = format!("{}true{}", "(".repeat(100), ")".repeat(100));
    assert!(matches!(
      evaluate(&deep, &Map::new()),
      Err(ConditionError::Syntax { .. })
    ));

    let fine = format!("{}true{}", "(".repeat(10), ")".repeat(10));
    assert!(evaluate(&fine, &Map::new()).unwrap());
  }

  #[test]
  fn test_string_escapes() {
    let v = vars(json!({ "quote": "say \"hi\"" }));
    assert!(evaluate(r#"quote == "say \"hi\"""#, &v).unwrap());
  }
}
