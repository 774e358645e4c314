//! Validated workflow graph: nodes, single-successor edges, loop edges and an entry node.

use std::collections::HashMap;

use tracing::instrument;

use super::{Edge, GraphDefinition, Guard, LoopEdge, LoopEdgeDefinition, Node, NodeDefinition, StateMap};
use crate::error::{EngineError, Result};

/// A validated workflow graph. Immutable once built; runs share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Graph {
  id: String,
  name: String,
  nodes: HashMap<String, Node>,
  edges: HashMap<String, Edge>,
  loop_edges: HashMap<String, LoopEdge>,
  entry_node: String,
}

impl Graph {
  pub fn builder(name: impl Into<String>) -> GraphBuilder {
    GraphBuilder::new(name)
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn entry_node(&self) -> &str {
    &self.entry_node
  }

  pub fn node(&self, name: &str) -> Option<&Node> {
    self.nodes.get(name)
  }

  pub fn nodes(&self) -> &HashMap<String, Node> {
    &self.nodes
  }

  pub fn edges(&self) -> &HashMap<String, Edge> {
    &self.edges
  }

  pub fn loop_edges(&self) -> &HashMap<String, LoopEdge> {
    &self.loop_edges
  }

  /// Returns the declared successor of `current` when its guard (if any) holds.
  #[instrument(level = "trace", skip(self, state))]
  pub fn next_node(&self, current: &str, state: &StateMap) -> Option<&str> {
    let edge = self.edges.get(current)?;
    edge
      .should_traverse(state)
      .then_some(edge.to_node.as_str())
  }

  /// Returns the loop-back target of `current` when its loop edge guard holds.
  #[instrument(level = "trace", skip(self, state))]
  pub fn loop_back(&self, current: &str, state: &StateMap) -> Option<&str> {
    let edge = self.loop_edges.get(current)?;
    edge.guard.holds(state).then_some(edge.to_node.as_str())
  }

  /// Exports the graph in its declarative form. Predicate guards export their description.
  pub fn to_definition(&self) -> GraphDefinition {
    let nodes = self
      .nodes
      .values()
      .map(|n| {
        (
          n.name.clone(),
          NodeDefinition {
            function: Some(n.capability.clone()),
            kind: n.kind.to_string(),
          },
        )
      })
      .collect();
    let edges = self
      .edges
      .values()
      .map(|e| (e.from_node.clone(), e.to_node.clone()))
      .collect();
    let conditions = self
      .edges
      .values()
      .filter_map(|e| {
        e.guard
          .as_ref()
          .map(|g| (e.from_node.clone(), g.description().to_string()))
      })
      .collect();
    let loop_edges = self
      .loop_edges
      .values()
      .map(|e| {
        (
          e.from_node.clone(),
          LoopEdgeDefinition {
            target: e.to_node.clone(),
            when: e.guard.description().to_string(),
          },
        )
      })
      .collect();
    GraphDefinition {
      name: self.name.clone(),
      nodes,
      edges,
      conditions,
      loop_edges,
      entry_node: self.entry_node.clone(),
    }
  }
}

/// Collects nodes and edges and validates them into a [Graph].
#[derive(Debug, Default)]
pub struct GraphBuilder {
  name: String,
  nodes: HashMap<String, Node>,
  edges: HashMap<String, Edge>,
  loop_edges: HashMap<String, LoopEdge>,
  entry_node: Option<String>,
  problems: Vec<String>,
}

impl GraphBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn node(mut self, node: Node) -> Self {
    if self.nodes.contains_key(&node.name) {
      self
        .problems
        .push(format!("Node '{}' is declared more than once", node.name));
    } else {
      self.nodes.insert(node.name.clone(), node);
    }
    self
  }

  pub fn edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
    self.add_edge(Edge::new(from, to))
  }

  pub fn guarded_edge(self, from: impl Into<String>, to: impl Into<String>, guard: Guard) -> Self {
    self.add_edge(Edge::guarded(from, to, guard))
  }

  pub fn loop_edge(mut self, from: impl Into<String>, to: impl Into<String>, guard: Guard) -> Self {
    let edge = LoopEdge::new(from, to, guard);
    if self.loop_edges.contains_key(&edge.from_node) {
      self.problems.push(format!(
        "Node '{}' declares more than one loop edge",
        edge.from_node
      ));
    } else {
      self.loop_edges.insert(edge.from_node.clone(), edge);
    }
    self
  }

  pub fn entry(mut self, name: impl Into<String>) -> Self {
    self.entry_node = Some(name.into());
    self
  }

  fn add_edge(mut self, edge: Edge) -> Self {
    if self.edges.contains_key(&edge.from_node) {
      self.problems.push(format!(
        "Node '{}' declares more than one successor",
        edge.from_node
      ));
    } else {
      self.edges.insert(edge.from_node.clone(), edge);
    }
    self
  }

  /// Validates the collected definition and assigns a fresh graph id.
  #[instrument(level = "trace", skip(self), fields(name = %self.name))]
  pub fn build(self) -> Result<Graph> {
    self.validate()?;
    let entry_node = self.entry_node.unwrap_or_default();
    Ok(Graph {
      id: uuid::Uuid::new_v4().to_string(),
      name: self.name,
      nodes: self.nodes,
      edges: self.edges,
      loop_edges: self.loop_edges,
      entry_node,
    })
  }

  fn validate(&self) -> Result<()> {
    if let Some(problem) = self.problems.first() {
      return Err(EngineError::InvalidGraph(problem.clone()));
    }

    let entry = self.entry_node.as_deref().unwrap_or("");
    if entry.is_empty() {
      return Err(EngineError::InvalidGraph("Entry node is required".to_string()));
    }
    if !self.nodes.contains_key(entry) {
      return Err(EngineError::InvalidGraph(format!(
        "Entry node '{}' not found in nodes",
        entry
      )));
    }

    let mut endpoints: Vec<(&str, &str, &str)> = self
      .edges
      .values()
      .map(|e| ("Edge", e.from_node.as_str(), e.to_node.as_str()))
      .chain(
        self
          .loop_edges
          .values()
          .map(|e| ("Loop edge", e.from_node.as_str(), e.to_node.as_str())),
      )
      .collect();
    endpoints.sort();

    for (label, from, to) in endpoints {
      if !self.nodes.contains_key(from) {
        return Err(EngineError::InvalidGraph(format!(
          "{} from '{}' references non-existent node",
          label, from
        )));
      }
      if !self.nodes.contains_key(to) {
        return Err(EngineError::InvalidGraph(format!(
          "{} to '{}' references non-existent node",
          label, to
        )));
      }
    }
    Ok(())
  }
}
