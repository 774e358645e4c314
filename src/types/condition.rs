//! Declarative guard expressions over the run state.
//!
//! Grammar: `key`, `!key`, or `key OP rhs` with `OP` one of `== = != < <= > >=`.
//! `rhs` is a JSON literal when it parses as one (numbers, `true`, `false`, `null`,
//! double-quoted strings; single quotes are accepted too) and a state key otherwise.

use std::fmt;

use serde_json::Value;
use tracing::instrument;

use super::StateMap;
use crate::error::{EngineError, Result};

/// Comparison operator in a [Condition].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl Comparison {
  fn symbol(&self) -> &'static str {
    match self {
      Comparison::Eq => "==",
      Comparison::Ne => "!=",
      Comparison::Lt => "<",
      Comparison::Le => "<=",
      Comparison::Gt => ">",
      Comparison::Ge => ">=",
    }
  }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
  /// Value read from the state at evaluation time.
  Key(String),
  /// Constant parsed from the expression.
  Literal(Value),
}

impl Operand {
  fn resolve<'a>(&'a self, state: &'a StateMap) -> Option<&'a Value> {
    match self {
      Operand::Key(k) => state.get(k),
      Operand::Literal(v) => Some(v),
    }
  }
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
  Truthy(String),
  Falsy(String),
  Compare {
    key: String,
    op: Comparison,
    rhs: Operand,
  },
}

impl Condition {
  /// Parses a guard expression.
  #[instrument(level = "trace")]
  pub fn parse(expr: &str) -> Result<Self> {
    let expr = expr.trim();
    if expr.is_empty() {
      return Err(EngineError::InvalidCondition(
        "empty expression".to_string(),
      ));
    }

    let Some((idx, op, op_len)) = find_operator(expr) else {
      return match expr.strip_prefix('!') {
        Some(key) => Ok(Condition::Falsy(parse_key(key, expr)?)),
        None => Ok(Condition::Truthy(parse_key(expr, expr)?)),
      };
    };

    let key = parse_key(&expr[..idx], expr)?;
    let rhs = expr[idx + op_len..].trim();
    if rhs.is_empty() {
      return Err(EngineError::InvalidCondition(format!(
        "missing right-hand side in '{}'",
        expr
      )));
    }
    Ok(Condition::Compare {
      key,
      op,
      rhs: parse_operand(rhs, expr)?,
    })
  }

  /// Evaluates the expression against `state`. Missing keys never satisfy an
  /// ordering comparison.
  pub fn evaluate(&self, state: &StateMap) -> bool {
    match self {
      Condition::Truthy(key) => state.get(key).is_some_and(is_truthy),
      Condition::Falsy(key) => !state.get(key).is_some_and(is_truthy),
      Condition::Compare { key, op, rhs } => {
        let lhs = state.get(key);
        let rhs = rhs.resolve(state);
        match op {
          Comparison::Eq => values_equal(lhs, rhs),
          Comparison::Ne => !values_equal(lhs, rhs),
          Comparison::Lt => compare_numbers(lhs, rhs, |a, b| a < b),
          Comparison::Le => compare_numbers(lhs, rhs, |a, b| a <= b),
          Comparison::Gt => compare_numbers(lhs, rhs, |a, b| a > b),
          Comparison::Ge => compare_numbers(lhs, rhs, |a, b| a >= b),
        }
      }
    }
  }
}

impl fmt::Display for Condition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Condition::Truthy(key) => write!(f, "{}", key),
      Condition::Falsy(key) => write!(f, "!{}", key),
      Condition::Compare { key, op, rhs } => match rhs {
        Operand::Key(k) => write!(f, "{} {} {}", key, op.symbol(), k),
        Operand::Literal(v) => write!(f, "{} {} {}", key, op.symbol(), v),
      },
    }
  }
}

/// Locates the first comparison operator; two-character operators win over their prefixes.
fn find_operator(expr: &str) -> Option<(usize, Comparison, usize)> {
  let bytes = expr.as_bytes();
  for i in 0..bytes.len() {
    let next = bytes.get(i + 1).copied();
    let found = match (bytes[i], next) {
      (b'=', Some(b'=')) => Some((Comparison::Eq, 2)),
      (b'!', Some(b'=')) => Some((Comparison::Ne, 2)),
      (b'<', Some(b'=')) => Some((Comparison::Le, 2)),
      (b'>', Some(b'=')) => Some((Comparison::Ge, 2)),
      (b'<', _) => Some((Comparison::Lt, 1)),
      (b'>', _) => Some((Comparison::Gt, 1)),
      (b'=', _) => Some((Comparison::Eq, 1)),
      _ => None,
    };
    if let Some((op, len)) = found {
      return Some((i, op, len));
    }
  }
  None
}

fn parse_key(raw: &str, expr: &str) -> Result<String> {
  let key = raw.trim();
  if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c == '!') {
    return Err(EngineError::InvalidCondition(format!(
      "invalid state key '{}' in '{}'",
      key, expr
    )));
  }
  Ok(key.to_string())
}

fn parse_operand(raw: &str, expr: &str) -> Result<Operand> {
  if let Ok(v) = serde_json::from_str::<Value>(raw) {
    return Ok(Operand::Literal(v));
  }
  if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
    return Ok(Operand::Literal(Value::String(raw[1..raw.len() - 1].to_string())));
  }
  Ok(Operand::Key(parse_key(raw, expr)?))
}

fn is_truthy(v: &Value) -> bool {
  match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

fn values_equal(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
  match (lhs, rhs) {
    (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
    (Some(a), Some(b)) => a == b,
    _ => false,
  }
}

fn compare_numbers(lhs: Option<&Value>, rhs: Option<&Value>, cmp: fn(f64, f64) -> bool) -> bool {
  match (lhs.and_then(Value::as_f64), rhs.and_then(Value::as_f64)) {
    (Some(a), Some(b)) => cmp(a, b),
    _ => false,
  }
}
