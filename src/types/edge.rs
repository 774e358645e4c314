//! Directed edges and the guards that gate them.

use std::fmt;
use std::sync::Arc;

use super::{Condition, StateMap};
use crate::error::Result;

/// Predicate over the run state.
pub type StatePredicate = dyn Fn(&StateMap) -> bool + Send + Sync;

/// A guard gating an edge: a parsed [Condition] or an arbitrary predicate.
#[derive(Clone)]
pub struct Guard {
  description: String,
  condition: Option<Condition>,
  predicate: Arc<StatePredicate>,
}

impl Guard {
  /// Builds a guard from a condition expression such as `quality_score < threshold`.
  pub fn parse(expr: &str) -> Result<Self> {
    Ok(Self::from_condition(Condition::parse(expr)?))
  }

  pub fn from_condition(condition: Condition) -> Self {
    let eval = condition.clone();
    Self {
      description: condition.to_string(),
      condition: Some(condition),
      predicate: Arc::new(move |state: &StateMap| eval.evaluate(state)),
    }
  }

  /// Wraps a Rust predicate. `description` is what the guard exports as.
  pub fn predicate<F>(description: impl Into<String>, f: F) -> Self
  where
    F: Fn(&StateMap) -> bool + Send + Sync + 'static,
  {
    Self {
      description: description.into(),
      condition: None,
      predicate: Arc::new(f),
    }
  }

  pub fn holds(&self, state: &StateMap) -> bool {
    (self.predicate)(state)
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  /// The parsed condition, when the guard is declarative.
  pub fn condition(&self) -> Option<&Condition> {
    self.condition.as_ref()
  }
}

impl fmt::Debug for Guard {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Guard").field(&self.description).finish()
  }
}

/// The single declared successor of a node.
#[derive(Debug, Clone)]
pub struct Edge {
  pub from_node: String,
  pub to_node: String,
  /// `None` means the edge is always traversed.
  pub guard: Option<Guard>,
}

impl Edge {
  pub fn new(from_node: impl Into<String>, to_node: impl Into<String>) -> Self {
    Self {
      from_node: from_node.into(),
      to_node: to_node.into(),
      guard: None,
    }
  }

  pub fn guarded(from_node: impl Into<String>, to_node: impl Into<String>, guard: Guard) -> Self {
    Self {
      from_node: from_node.into(),
      to_node: to_node.into(),
      guard: Some(guard),
    }
  }

  pub fn should_traverse(&self, state: &StateMap) -> bool {
    self.guard.as_ref().is_none_or(|g| g.holds(state))
  }
}

/// A loop-back edge: consulted only when the static edge yields no successor.
#[derive(Debug, Clone)]
pub struct LoopEdge {
  pub from_node: String,
  pub to_node: String,
  pub guard: Guard,
}

impl LoopEdge {
  pub fn new(from_node: impl Into<String>, to_node: impl Into<String>, guard: Guard) -> Self {
    Self {
      from_node: from_node.into(),
      to_node: to_node.into(),
      guard,
    }
  }
}
