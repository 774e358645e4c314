//! Declarative (JSON) form of a workflow graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Graph, GraphBuilder, Guard, Node, NodeKind};
use crate::error::{EngineError, Result};

fn default_kind() -> String {
  "function".to_string()
}

/// One node entry: `{"function": "extract", "type": "function"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
  /// Capability name; defaults to the node name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function: Option<String>,
  #[serde(rename = "type", default = "default_kind")]
  pub kind: String,
}

impl Default for NodeDefinition {
  fn default() -> Self {
    Self {
      function: None,
      kind: default_kind(),
    }
  }
}

/// `{"target": "check", "when": "quality_score < threshold"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEdgeDefinition {
  pub target: String,
  pub when: String,
}

/// A graph as submitted by callers: nodes, `from -> to` edges, optional edge
/// conditions keyed by source node, optional loop edges, and the entry node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
  pub name: String,
  pub nodes: BTreeMap<String, NodeDefinition>,
  #[serde(default)]
  pub edges: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub conditions: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub loop_edges: BTreeMap<String, LoopEdgeDefinition>,
  pub entry_node: String,
}

impl GraphDefinition {
  /// Turns the definition into a builder, compiling every condition string.
  pub fn to_builder(&self) -> Result<GraphBuilder> {
    let mut builder = Graph::builder(&self.name).entry(&self.entry_node);

    for (name, def) in &self.nodes {
      builder = builder.node(Node {
        name: name.clone(),
        capability: def.function.clone().unwrap_or_else(|| name.clone()),
        kind: NodeKind::parse(&def.kind),
      });
    }

    if let Some(source) = self.conditions.keys().find(|s| !self.edges.contains_key(*s)) {
      return Err(EngineError::InvalidGraph(format!(
        "Condition declared for '{}' which has no edge",
        source
      )));
    }

    for (from, to) in &self.edges {
      builder = match self.conditions.get(from) {
        Some(expr) => builder.guarded_edge(from, to, compile_guard(from, expr)?),
        None => builder.edge(from, to),
      };
    }

    for (from, def) in &self.loop_edges {
      builder = builder.loop_edge(from, &def.target, compile_guard(from, &def.when)?);
    }

    Ok(builder)
  }

  pub fn build(&self) -> Result<Graph> {
    self.to_builder()?.build()
  }
}

fn compile_guard(source: &str, expr: &str) -> Result<Guard> {
  Guard::parse(expr)
    .map_err(|e| EngineError::InvalidGraph(format!("guard on edge from '{}': {}", source, e)))
}
