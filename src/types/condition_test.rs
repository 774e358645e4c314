//! Tests for `Condition`.

use serde_json::json;

use super::{Comparison, Condition, Operand, StateMap};
use crate::error::EngineError;

fn state(v: serde_json::Value) -> StateMap {
  v.as_object().cloned().unwrap()
}

#[test]
fn parses_key_to_key_comparison() {
  let c = Condition::parse("quality_score < threshold").unwrap();
  assert_eq!(
    c,
    Condition::Compare {
      key: "quality_score".to_string(),
      op: Comparison::Lt,
      rhs: Operand::Key("threshold".to_string()),
    }
  );
  assert_eq!(c.to_string(), "quality_score < threshold");
}

#[test]
fn parses_literal_operands() {
  let c = Condition::parse("status == \"done\"").unwrap();
  assert!(c.evaluate(&state(json!({"status": "done"}))));
  let c = Condition::parse("status = 'done'").unwrap();
  assert!(c.evaluate(&state(json!({"status": "done"}))));
  let c = Condition::parse("count>=3").unwrap();
  assert!(c.evaluate(&state(json!({"count": 3}))));
  assert!(!c.evaluate(&state(json!({"count": 2}))));
}

#[test]
fn two_char_operators_take_precedence() {
  let c = Condition::parse("a <= 1").unwrap();
  assert!(matches!(c, Condition::Compare { op: Comparison::Le, .. }));
  let c = Condition::parse("a != 1").unwrap();
  assert!(matches!(c, Condition::Compare { op: Comparison::Ne, .. }));
}

#[test]
fn score_below_threshold() {
  let c = Condition::parse("quality_score < threshold").unwrap();
  assert!(c.evaluate(&state(json!({"quality_score": 60, "threshold": 80}))));
  assert!(!c.evaluate(&state(json!({"quality_score": 95, "threshold": 80}))));
}

#[test]
fn ordering_with_missing_key_is_false() {
  let c = Condition::parse("quality_score < threshold").unwrap();
  assert!(!c.evaluate(&state(json!({"threshold": 80}))));
  assert!(!c.evaluate(&state(json!({"quality_score": "low", "threshold": 80}))));
}

#[test]
fn truthiness() {
  let c = Condition::parse("ok").unwrap();
  assert!(c.evaluate(&state(json!({"ok": true}))));
  assert!(!c.evaluate(&state(json!({"ok": 0}))));
  assert!(!c.evaluate(&state(json!({}))));
  let c = Condition::parse("!ok").unwrap();
  assert!(c.evaluate(&state(json!({}))));
  assert!(!c.evaluate(&state(json!({"ok": "yes"}))));
}

#[test]
fn integer_and_float_compare_equal() {
  let c = Condition::parse("n == 2.0").unwrap();
  assert!(c.evaluate(&state(json!({"n": 2}))));
}

#[test]
fn not_equal_on_missing_key_holds() {
  let c = Condition::parse("mode != \"fast\"").unwrap();
  assert!(c.evaluate(&state(json!({}))));
}

#[test]
fn rejects_malformed_expressions() {
  for expr in ["", "   ", "a <", "< 3", "two words", "a == b c"] {
    let err = Condition::parse(expr).unwrap_err();
    assert!(matches!(err, EngineError::InvalidCondition(_)), "{expr}");
  }
}
