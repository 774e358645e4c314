//! Events emitted to run observers while a run executes.

use serde::{Deserialize, Serialize};

use super::{ExecutionLogEntry, RunStatus, StateMap};

/// One notification about a run. Every run emits its `Step` events in log
/// order followed by exactly one `Finished`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
  Step {
    run_id: String,
    entry: ExecutionLogEntry,
  },
  Finished {
    run_id: String,
    status: RunStatus,
    final_state: StateMap,
  },
}

impl RunEvent {
  pub fn run_id(&self) -> &str {
    match self {
      RunEvent::Step { run_id, .. } | RunEvent::Finished { run_id, .. } => run_id,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, RunEvent::Finished { .. })
  }
}
