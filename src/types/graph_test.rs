//! Tests for `Graph` and `GraphBuilder`.

use serde_json::json;

use super::{Graph, Guard, Node, StateMap};
use crate::error::EngineError;

fn state(v: serde_json::Value) -> StateMap {
  v.as_object().cloned().unwrap()
}

fn invalid_reason(result: crate::error::Result<Graph>) -> String {
  match result {
    Err(EngineError::InvalidGraph(reason)) => reason,
    other => panic!("expected InvalidGraph, got {:?}", other.map(|g| g.name().to_string())),
  }
}

#[test]
fn builds_linear_graph() {
  let g = Graph::builder("review")
    .node(Node::function("extract"))
    .node(Node::function("review"))
    .edge("extract", "review")
    .entry("extract")
    .build()
    .unwrap();
  assert_eq!(g.name(), "review");
  assert_eq!(g.entry_node(), "extract");
  assert_eq!(g.nodes().len(), 2);
  assert!(!g.id().is_empty());
  assert_eq!(g.next_node("extract", &StateMap::new()), Some("review"));
  assert_eq!(g.next_node("review", &StateMap::new()), None);
}

#[test]
fn each_build_gets_a_fresh_id() {
  let build = || {
    Graph::builder("g")
      .node(Node::function("a"))
      .entry("a")
      .build()
      .unwrap()
  };
  assert_ne!(build().id(), build().id());
}

#[test]
fn missing_entry_is_invalid() {
  let reason = invalid_reason(Graph::builder("g").node(Node::function("a")).build());
  assert_eq!(reason, "Entry node is required");

  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .entry("b")
      .build(),
  );
  assert!(reason.contains("'b' not found"));
}

#[test]
fn dangling_edges_are_invalid() {
  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .edge("a", "ghost")
      .entry("a")
      .build(),
  );
  assert_eq!(reason, "Edge to 'ghost' references non-existent node");

  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .edge("ghost", "a")
      .entry("a")
      .build(),
  );
  assert_eq!(reason, "Edge from 'ghost' references non-existent node");
}

#[test]
fn dangling_loop_edge_is_invalid() {
  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .loop_edge("a", "ghost", Guard::parse("retry").unwrap())
      .entry("a")
      .build(),
  );
  assert!(reason.starts_with("Loop edge to 'ghost'"));
}

#[test]
fn second_successor_is_invalid() {
  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .node(Node::function("b"))
      .node(Node::function("c"))
      .edge("a", "b")
      .edge("a", "c")
      .entry("a")
      .build(),
  );
  assert!(reason.contains("more than one successor"));
}

#[test]
fn duplicate_node_is_invalid() {
  let reason = invalid_reason(
    Graph::builder("g")
      .node(Node::function("a"))
      .node(Node::with_capability("a", "other"))
      .entry("a")
      .build(),
  );
  assert!(reason.contains("more than once"));
}

#[test]
fn guarded_edge_returns_none_when_guard_fails() {
  let g = Graph::builder("g")
    .node(Node::function("a"))
    .node(Node::function("b"))
    .guarded_edge("a", "b", Guard::parse("go").unwrap())
    .entry("a")
    .build()
    .unwrap();
  assert_eq!(g.next_node("a", &state(json!({"go": true}))), Some("b"));
  assert_eq!(g.next_node("a", &state(json!({"go": false}))), None);
}

#[test]
fn loop_back_follows_its_guard() {
  let g = Graph::builder("g")
    .node(Node::function("check"))
    .node(Node::function("score"))
    .edge("check", "score")
    .loop_edge("score", "check", Guard::parse("quality_score < threshold").unwrap())
    .entry("check")
    .build()
    .unwrap();
  let low = state(json!({"quality_score": 50, "threshold": 80}));
  let high = state(json!({"quality_score": 90, "threshold": 80}));
  assert_eq!(g.next_node("score", &low), None);
  assert_eq!(g.loop_back("score", &low), Some("check"));
  assert_eq!(g.loop_back("score", &high), None);
  assert_eq!(g.loop_back("check", &low), None);
}

#[test]
fn to_definition_exports_guards_and_loops() {
  let g = Graph::builder("g")
    .node(Node::function("a"))
    .node(Node::with_capability("b", "bee"))
    .guarded_edge("a", "b", Guard::predicate("custom check", |_| true))
    .loop_edge("b", "a", Guard::parse("again").unwrap())
    .entry("a")
    .build()
    .unwrap();
  let def = g.to_definition();
  assert_eq!(def.entry_node, "a");
  assert_eq!(def.edges.get("a").map(String::as_str), Some("b"));
  assert_eq!(def.conditions.get("a").map(String::as_str), Some("custom check"));
  assert_eq!(def.nodes["b"].function.as_deref(), Some("bee"));
  assert_eq!(def.loop_edges["b"].target, "a");
  assert_eq!(def.loop_edges["b"].when, "again");
}

mod closure {
  use proptest::prelude::*;
  use serde_json::Value;

  use super::super::{Graph, Guard, Node, StateMap};

  proptest! {
    #[test]
    fn next_node_stays_inside_node_set(
      node_count in 1usize..8,
      raw_edges in proptest::collection::vec((0usize..8, 0usize..8, any::<bool>()), 0..12),
      flag in any::<bool>(),
    ) {
      let names: Vec<String> = (0..node_count).map(|i| format!("n{}", i)).collect();
      let mut builder = Graph::builder("prop").entry(&names[0]);
      for n in &names {
        builder = builder.node(Node::function(n));
      }
      let mut seen = std::collections::HashSet::new();
      for (from, to, guarded) in raw_edges {
        let (from, to) = (from % node_count, to % node_count);
        if !seen.insert(from) {
          continue;
        }
        builder = if guarded {
          builder.guarded_edge(&names[from], &names[to], Guard::parse("flag").unwrap())
        } else {
          builder.edge(&names[from], &names[to])
        };
      }
      let graph = builder.build().unwrap();
      let mut state = StateMap::new();
      state.insert("flag".to_string(), Value::Bool(flag));
      for n in &names {
        if let Some(next) = graph.next_node(n, &state) {
          prop_assert!(graph.node(next).is_some());
        }
      }
    }
  }
}
