//! Save/load a finished run as JSON under a run directory.

use std::path::Path;

use tracing::instrument;

use crate::error::Result;
use crate::types::RunState;

/// Default filename for a run record under a run directory.
pub const RUN_FILENAME: &str = "run.json";

/// Saves `run` to `path` as pretty JSON, creating the parent directory if needed.
#[instrument(level = "trace", skip(path, run))]
pub fn save_run(path: &Path, run: &RunState) -> Result<()> {
  let json = serde_json::to_string_pretty(run)?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)?;
  Ok(())
}

/// Loads a run from `path`. Fails if the file is missing or not a run record.
#[instrument(level = "trace", skip(path))]
pub fn load_run(path: &Path) -> Result<RunState> {
  let bytes = std::fs::read(path)?;
  Ok(serde_json::from_slice(&bytes)?)
}
