//! Lifecycle status of a workflow run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a workflow run.
///
/// `Running` is the only non-terminal status; a run never leaves
/// `Completed`, `Failed` or `Stopped` once it reaches one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Running,
  Completed,
  Failed,
  Stopped,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, RunStatus::Running)
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunStatus::Running => write!(f, "running"),
      RunStatus::Completed => write!(f, "completed"),
      RunStatus::Failed => write!(f, "failed"),
      RunStatus::Stopped => write!(f, "stopped"),
    }
  }
}
