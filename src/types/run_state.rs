//! The mutable record of one workflow run and its execution log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RunStatus, StateMap};
use crate::error::{EngineError, Result};

/// One step recorded in a run's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
  pub node: String,
  pub timestamp: DateTime<Utc>,
  /// Full copy of the state at the time of logging.
  pub state_snapshot: StateMap,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

/// State of one run. Only the mutators below change it, and each refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
  run_id: String,
  graph_id: String,
  state: StateMap,
  execution_log: Vec<ExecutionLogEntry>,
  current_node: Option<String>,
  status: RunStatus,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl RunState {
  /// A new `running` record owning its own copy of `initial_state`.
  pub fn new(graph_id: impl Into<String>, initial_state: &StateMap) -> Self {
    let now = Utc::now();
    Self {
      run_id: new_run_id(),
      graph_id: graph_id.into(),
      state: initial_state.clone(),
      execution_log: Vec::new(),
      current_node: None,
      status: RunStatus::Running,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn graph_id(&self) -> &str {
    &self.graph_id
  }

  pub fn state(&self) -> &StateMap {
    &self.state
  }

  pub fn execution_log(&self) -> &[ExecutionLogEntry] {
    &self.execution_log
  }

  pub fn current_node(&self) -> Option<&str> {
    self.current_node.as_deref()
  }

  pub fn status(&self) -> RunStatus {
    self.status
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  /// Appends a log entry holding an independent copy of `state_snapshot`.
  pub fn append_log(
    &mut self,
    node: impl Into<String>,
    state_snapshot: &StateMap,
    message: Option<String>,
  ) -> &ExecutionLogEntry {
    let now = Utc::now();
    self.execution_log.push(ExecutionLogEntry {
      node: node.into(),
      timestamp: now,
      state_snapshot: state_snapshot.clone(),
      message,
    });
    self.updated_at = now;
    &self.execution_log[self.execution_log.len() - 1]
  }

  /// Appends a log entry snapshotting the run's current state.
  pub fn log_current(&mut self, node: impl Into<String>, message: impl Into<String>) -> &ExecutionLogEntry {
    let snapshot = self.state.clone();
    self.append_log(node, &snapshot, Some(message.into()))
  }

  /// Shallow-merges `updates` into the state; existing keys are overwritten, none removed.
  pub fn merge_state(&mut self, updates: StateMap) {
    self.state.extend(updates);
    self.updated_at = Utc::now();
  }

  /// Moves the run to `status`. Terminal statuses are final.
  pub fn set_status(&mut self, status: RunStatus) -> Result<()> {
    if self.status.is_terminal() && self.status != status {
      return Err(EngineError::InvalidTransition {
        from: self.status,
        to: status,
      });
    }
    self.status = status;
    self.updated_at = Utc::now();
    Ok(())
  }

  pub(crate) fn set_current_node(&mut self, node: &str) {
    self.current_node = Some(node.to_string());
    self.updated_at = Utc::now();
  }
}

fn new_run_id() -> String {
  let hex = uuid::Uuid::new_v4().simple().to_string();
  format!("run_{}", &hex[..8])
}
