//! Tests for `GraphDefinition`.

use serde_json::json;

use super::{GraphDefinition, NodeKind, StateMap};
use crate::error::EngineError;

fn definition(v: serde_json::Value) -> GraphDefinition {
  serde_json::from_value(v).unwrap()
}

#[test]
fn deserializes_minimal_definition() {
  let def = definition(json!({
    "name": "review",
    "nodes": {"extract": {"function": "extract"}, "review": {}},
    "edges": {"extract": "review"},
    "entry_node": "extract"
  }));
  assert_eq!(def.nodes["review"].kind, "function");
  assert!(def.conditions.is_empty());

  let graph = def.build().unwrap();
  assert_eq!(graph.node("review").unwrap().capability, "review");
  assert_eq!(graph.next_node("extract", &StateMap::new()), Some("review"));
}

#[test]
fn non_function_type_becomes_passthrough() {
  let def = definition(json!({
    "name": "g",
    "nodes": {"marker": {"type": "note"}},
    "entry_node": "marker"
  }));
  let graph = def.build().unwrap();
  assert_eq!(
    graph.node("marker").unwrap().kind,
    NodeKind::Passthrough("note".to_string())
  );
}

#[test]
fn conditions_and_loop_edges_compile() {
  let def = definition(json!({
    "name": "g",
    "nodes": {"a": {}, "b": {}},
    "edges": {"a": "b"},
    "conditions": {"a": "ready"},
    "loop_edges": {"b": {"target": "a", "when": "score < 10"}},
    "entry_node": "a"
  }));
  let graph = def.build().unwrap();
  let state = json!({"ready": true, "score": 3}).as_object().cloned().unwrap();
  assert_eq!(graph.next_node("a", &state), Some("b"));
  assert_eq!(graph.loop_back("b", &state), Some("a"));
}

#[test]
fn bad_condition_is_invalid_graph() {
  let def = definition(json!({
    "name": "g",
    "nodes": {"a": {}, "b": {}},
    "edges": {"a": "b"},
    "conditions": {"a": "score <"},
    "entry_node": "a"
  }));
  assert!(matches!(def.build(), Err(EngineError::InvalidGraph(_))));
}

#[test]
fn condition_without_edge_is_invalid_graph() {
  let def = definition(json!({
    "name": "g",
    "nodes": {"a": {}},
    "conditions": {"a": "ready"},
    "entry_node": "a"
  }));
  let err = def.build().unwrap_err();
  assert!(err.to_string().contains("has no edge"));
}

#[test]
fn export_round_trips_declarative_graph() {
  let def = definition(json!({
    "name": "g",
    "nodes": {"a": {"function": "a"}, "b": {"function": "b"}},
    "edges": {"a": "b"},
    "loop_edges": {"b": {"target": "a", "when": "score < 10"}},
    "entry_node": "a"
  }));
  let exported = def.build().unwrap().to_definition();
  assert_eq!(exported, def);
}
