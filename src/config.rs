//! Engine limits and where they come from.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [EngineConfig::max_iterations].
pub const MAX_ITERATIONS_ENV: &str = "WORKFLOW_MAX_ITERATIONS";
/// Environment variable overriding [EngineConfig::max_cycle_iterations].
pub const MAX_CYCLE_ITERATIONS_ENV: &str = "WORKFLOW_MAX_CYCLE_ITERATIONS";

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_MAX_CYCLE_ITERATIONS: usize = 10;

/// Safety bounds applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Hard cap on node executions in one run.
  pub max_iterations: usize,
  /// Consecutive revisits of already-visited nodes allowed before the run is stopped.
  pub max_cycle_iterations: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_iterations: DEFAULT_MAX_ITERATIONS,
      max_cycle_iterations: DEFAULT_MAX_CYCLE_ITERATIONS,
    }
  }
}

impl EngineConfig {
  /// Defaults overridden by the environment.
  pub fn from_env() -> Self {
    Self::default().with_overrides(|key| std::env::var(key).ok())
  }

  /// Applies overrides looked up through `lookup`; unparsable or zero values are skipped.
  pub fn with_overrides<F>(mut self, lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(v) = parse_limit(MAX_ITERATIONS_ENV, lookup(MAX_ITERATIONS_ENV)) {
      self.max_iterations = v;
    }
    if let Some(v) = parse_limit(MAX_CYCLE_ITERATIONS_ENV, lookup(MAX_CYCLE_ITERATIONS_ENV)) {
      self.max_cycle_iterations = v;
    }
    self
  }
}

fn parse_limit(key: &str, raw: Option<String>) -> Option<usize> {
  let raw = raw?;
  match raw.trim().parse::<usize>() {
    Ok(v) if v > 0 => Some(v),
    _ => {
      warn!(key, value = %raw, "ignoring invalid limit");
      None
    }
  }
}
