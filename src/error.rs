//! Errors returned by graph construction, capability registration and lookups.
//!
//! Capability failures during a run are not surfaced here: the engine records them
//! in the execution log and finishes the run as `failed`.

use thiserror::Error;

use crate::types::RunStatus;

/// Boxed error a capability may return from its body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("Invalid graph: {0}")]
  InvalidGraph(String),

  #[error("Graph '{0}' not found")]
  UnknownGraph(String),

  #[error("Capability '{0}' not found in registry")]
  UnknownCapability(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Invalid capability: {0}")]
  InvalidCapability(String),

  #[error("Capability '{capability}' failed: {message}")]
  CapabilityExecution { capability: String, message: String },

  #[error("Invalid status transition: {from} -> {to}")]
  InvalidTransition { from: RunStatus, to: RunStatus },

  #[error("Invalid condition: {0}")]
  InvalidCondition(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}
