//! A named step in a workflow graph.

use std::fmt;

/// What a node does when the run reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  /// Invokes the node's capability and merges its result.
  Function,
  /// Any other declared kind. Passes the state through unchanged.
  Passthrough(String),
}

impl NodeKind {
  pub fn parse(kind: &str) -> Self {
    if kind.eq_ignore_ascii_case("function") {
      NodeKind::Function
    } else {
      NodeKind::Passthrough(kind.to_string())
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      NodeKind::Function => "function",
      NodeKind::Passthrough(kind) => kind,
    }
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A named step bound to a capability by name. The capability is resolved when
/// the node runs, so re-registering it changes what later runs execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  pub name: String,
  pub capability: String,
  pub kind: NodeKind,
}

impl Node {
  /// A function node whose capability has the same name as the node.
  pub fn function(name: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      capability: name.clone(),
      name,
      kind: NodeKind::Function,
    }
  }

  pub fn with_capability(name: impl Into<String>, capability: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      capability: capability.into(),
      kind: NodeKind::Function,
    }
  }

  pub fn passthrough(name: impl Into<String>, kind: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      capability: name.clone(),
      name,
      kind: NodeKind::Passthrough(kind.into()),
    }
  }

  pub fn is_function(&self) -> bool {
    self.kind == NodeKind::Function
  }
}
