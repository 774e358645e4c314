//! Capability registry: resolves a node's capability name to the transformation it runs.
//!
//! The registry is an ordinary value; callers build one, register capabilities and hand
//! it to the [Engine](crate::Engine) behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{BoxError, EngineError, Result};
use crate::types::StateMap;

/// A state transformation. The returned value is merged into the state when it is a
/// JSON object and ignored otherwise.
pub trait Capability: Send + Sync {
  fn call(&self, state: &StateMap) -> std::result::Result<Value, BoxError>;
}

impl<F> Capability for F
where
  F: Fn(&StateMap) -> std::result::Result<Value, BoxError> + Send + Sync,
{
  fn call(&self, state: &StateMap) -> std::result::Result<Value, BoxError> {
    self(state)
  }
}

/// Shared handle to a registered capability.
pub type CapabilityHandle = Arc<dyn Capability>;

struct Registration {
  handle: CapabilityHandle,
  description: String,
}

/// Name → capability table guarded by a read/write lock.
#[derive(Default)]
pub struct CapabilityRegistry {
  entries: RwLock<HashMap<String, Registration>>,
}

impl CapabilityRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `capability` under `name`, replacing any previous registration.
  #[instrument(level = "trace", skip(self, capability, description))]
  pub fn register<C>(&self, name: &str, capability: C, description: Option<&str>) -> Result<()>
  where
    C: Capability + 'static,
  {
    self.register_handle(name, Arc::new(capability), description)
  }

  pub fn register_handle(
    &self,
    name: &str,
    handle: CapabilityHandle,
    description: Option<&str>,
  ) -> Result<()> {
    if name.trim().is_empty() {
      return Err(EngineError::InvalidCapability(
        "capability name must not be empty".to_string(),
      ));
    }
    if name.trim() != name {
      return Err(EngineError::InvalidCapability(format!(
        "capability name '{}' has surrounding whitespace",
        name
      )));
    }
    let description = description
      .map(str::to_string)
      .unwrap_or_else(|| format!("Capability: {}", name));
    let replaced = self
      .entries
      .write()
      .insert(name.to_string(), Registration { handle, description })
      .is_some();
    debug!(capability = name, replaced, "capability registered");
    Ok(())
  }

  pub fn resolve(&self, name: &str) -> Option<CapabilityHandle> {
    self.entries.read().get(name).map(|r| r.handle.clone())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.read().contains_key(name)
  }

  /// Removes `name`. Returns whether it was registered.
  pub fn unregister(&self, name: &str) -> bool {
    self.entries.write().remove(name).is_some()
  }

  /// Registered names with their descriptions, sorted by name.
  pub fn list(&self) -> BTreeMap<String, String> {
    self
      .entries
      .read()
      .iter()
      .map(|(name, r)| (name.clone(), r.description.clone()))
      .collect()
  }

  /// Runs `name` against `state` and returns only its partial update.
  ///
  /// The lock is released before the capability runs. Errors and panics raised by the
  /// capability come back as [EngineError::CapabilityExecution].
  #[instrument(level = "trace", skip(self, state))]
  pub fn call(&self, name: &str, state: &StateMap) -> Result<StateMap> {
    let handle = self
      .resolve(name)
      .ok_or_else(|| EngineError::UnknownCapability(name.to_string()))?;

    let outcome = catch_unwind(AssertUnwindSafe(|| handle.call(state)));
    match outcome {
      Ok(Ok(Value::Object(updates))) => Ok(updates),
      Ok(Ok(_)) => Ok(StateMap::new()),
      Ok(Err(e)) => Err(EngineError::CapabilityExecution {
        capability: name.to_string(),
        message: e.to_string(),
      }),
      Err(panic) => Err(EngineError::CapabilityExecution {
        capability: name.to_string(),
        message: panic_message(panic.as_ref()),
      }),
    }
  }

  /// Runs `name` and merges its result into `state`, returning the updated state.
  pub fn invoke(&self, name: &str, mut state: StateMap) -> Result<StateMap> {
    let updates = self.call(name, &state)?;
    state.extend(updates);
    Ok(state)
  }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    format!("panicked: {}", s)
  } else if let Some(s) = panic.downcast_ref::<String>() {
    format!("panicked: {}", s)
  } else {
    "panicked".to_string()
  }
}
