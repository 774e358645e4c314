//! Tests for `RunState`.

use serde_json::{Value, json};

use super::{RunState, RunStatus, StateMap};
use crate::error::EngineError;

fn state(v: Value) -> StateMap {
  v.as_object().cloned().unwrap()
}

#[test]
fn new_run_copies_initial_state() {
  let initial = state(json!({"code": "def f(): pass"}));
  let run = RunState::new("g1", &initial);
  assert_eq!(run.state(), &initial);
  assert_eq!(run.status(), RunStatus::Running);
  assert_eq!(run.graph_id(), "g1");
  assert!(run.run_id().starts_with("run_"));
  assert_eq!(run.run_id().len(), "run_".len() + 8);
  assert!(run.execution_log().is_empty());
  assert!(run.current_node().is_none());
}

#[test]
fn log_snapshot_is_independent_of_later_mutation() {
  let mut run = RunState::new("g", &StateMap::new());
  run.merge_state(state(json!({"count": 1})));
  run.log_current("a", "first");
  run.merge_state(state(json!({"count": 2})));
  assert_eq!(run.execution_log()[0].state_snapshot["count"], json!(1));
  assert_eq!(run.state()["count"], json!(2));
}

#[test]
fn append_log_keeps_order_and_message() {
  let mut run = RunState::new("g", &StateMap::new());
  run.append_log("a", &StateMap::new(), None);
  run.append_log("b", &StateMap::new(), Some("hello".to_string()));
  let nodes: Vec<&str> = run.execution_log().iter().map(|e| e.node.as_str()).collect();
  assert_eq!(nodes, vec!["a", "b"]);
  assert_eq!(run.execution_log()[1].message.as_deref(), Some("hello"));
  assert!(run.updated_at() >= run.created_at());
}

#[test]
fn merge_overwrites_and_keeps_other_keys() {
  let mut run = RunState::new("g", &state(json!({"a": 1, "b": 2})));
  run.merge_state(state(json!({"b": 3, "c": 4})));
  assert_eq!(Value::Object(run.state().clone()), json!({"a": 1, "b": 3, "c": 4}));
}

#[test]
fn terminal_status_is_final() {
  let mut run = RunState::new("g", &StateMap::new());
  run.set_status(RunStatus::Failed).unwrap();
  let err = run.set_status(RunStatus::Completed).unwrap_err();
  assert!(matches!(
    err,
    EngineError::InvalidTransition {
      from: RunStatus::Failed,
      to: RunStatus::Completed
    }
  ));
  assert_eq!(run.status(), RunStatus::Failed);
  assert!(run.set_status(RunStatus::Running).is_err());
}

#[test]
fn serializes_with_status_and_log() {
  let mut run = RunState::new("g", &StateMap::new());
  run.log_current("a", "done");
  run.set_status(RunStatus::Completed).unwrap();
  let v = serde_json::to_value(&run).unwrap();
  assert_eq!(v["status"], "completed");
  assert_eq!(v["execution_log"][0]["node"], "a");
  let back: RunState = serde_json::from_value(v).unwrap();
  assert_eq!(back, run);
}
