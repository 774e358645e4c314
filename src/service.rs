//! Async facade over [Engine] and a [Store]: runs on the blocking pool, persists what
//! finishes and streams run progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, instrument, warn};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::registry::Capability;
use crate::store::{GraphRecord, RunRecord, Store};
use crate::types::{
  ExecutionLogEntry, Graph, GraphDefinition, RunEvent, RunState, RunStatus, StateMap,
  StatePredicate,
};

/// What a caller gets back from [WorkflowService::run].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
  pub run_id: String,
  pub status: RunStatus,
  pub final_state: StateMap,
  pub execution_log: Vec<ExecutionLogEntry>,
}

impl From<&RunState> for RunOutcome {
  fn from(run: &RunState) -> Self {
    Self {
      run_id: run.run_id().to_string(),
      status: run.status(),
      final_state: run.state().clone(),
      execution_log: run.execution_log().to_vec(),
    }
  }
}

pub struct WorkflowService<S> {
  engine: Arc<Engine>,
  store: Arc<S>,
  loop_predicate: Option<Arc<StatePredicate>>,
}

impl<S: Store + 'static> WorkflowService<S> {
  pub fn new(engine: Arc<Engine>, store: Arc<S>) -> Self {
    Self {
      engine,
      store,
      loop_predicate: None,
    }
  }

  /// Gates every loop-back taken by runs started through this service.
  pub fn with_loop_predicate<F>(mut self, predicate: F) -> Self
  where
    F: Fn(&StateMap) -> bool + Send + Sync + 'static,
  {
    self.loop_predicate = Some(Arc::new(predicate));
    self
  }

  pub fn engine(&self) -> &Arc<Engine> {
    &self.engine
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  pub fn register_capability<C>(
    &self,
    name: &str,
    capability: C,
    description: Option<&str>,
  ) -> Result<()>
  where
    C: Capability + 'static,
  {
    self.engine.registry().register(name, capability, description)
  }

  pub fn list_capabilities(&self) -> BTreeMap<String, String> {
    self.engine.registry().list()
  }

  /// Registers `definition` with the engine and records it in the store.
  #[instrument(level = "trace", skip(self, definition, metadata), fields(graph = %definition.name))]
  pub async fn create_graph(
    &self,
    definition: &GraphDefinition,
    metadata: StateMap,
  ) -> Result<String> {
    let graph_id = self.engine.create_graph(definition)?;
    if let Some(graph) = self.engine.get_graph(&graph_id) {
      self.store.save_graph(graph, metadata).await;
    }
    Ok(graph_id)
  }

  /// Engine first, then the store.
  pub async fn get_graph(&self, graph_id: &str) -> Result<Arc<Graph>> {
    if let Some(graph) = self.engine.get_graph(graph_id) {
      return Ok(graph);
    }
    self
      .store
      .get_graph(graph_id)
      .await
      .ok_or_else(|| EngineError::NotFound(format!("graph '{}'", graph_id)))
  }

  pub async fn list_graphs(&self) -> Vec<GraphRecord> {
    self.store.list_graphs().await
  }

  /// Runs to completion on the blocking pool and moves the finished run into the store.
  #[instrument(level = "trace", skip(self, initial_state))]
  pub async fn run(&self, graph_id: &str, initial_state: StateMap) -> Result<RunOutcome> {
    let engine = self.engine.clone();
    let predicate = self.loop_predicate.clone();
    let graph = graph_id.to_string();
    let run_id = tokio::task::spawn_blocking(move || {
      engine.run(&graph, &initial_state, predicate.as_deref())
    })
    .await??;

    let run = self
      .engine
      .get_run(&run_id)
      .ok_or_else(|| EngineError::NotFound(format!("run '{}'", run_id)))?;
    let outcome = RunOutcome::from(&run);
    self.store.save_run(run, StateMap::new()).await;
    self.engine.take_run(&run_id);
    info!(run_id = %outcome.run_id, status = %outcome.status, "run stored");
    Ok(outcome)
  }

  /// Starts a run in the background and streams its log entries, then its final status.
  ///
  /// The stream ends after the run has been stored. An unknown graph is reported here
  /// rather than through the stream.
  #[instrument(level = "trace", skip(self, initial_state))]
  pub async fn run_streaming(
    &self,
    graph_id: &str,
    initial_state: StateMap,
  ) -> Result<UnboundedReceiverStream<RunEvent>> {
    if self.engine.get_graph(graph_id).is_none() {
      return Err(EngineError::UnknownGraph(graph_id.to_string()));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let engine = self.engine.clone();
    let store = self.store.clone();
    let predicate = self.loop_predicate.clone();
    let graph = graph_id.to_string();

    tokio::spawn(async move {
      let blocking_engine = engine.clone();
      let outcome = tokio::task::spawn_blocking(move || {
        let result =
          blocking_engine.run_with_observer(&graph, &initial_state, predicate.as_deref(), Some(&tx));
        (result, tx)
      })
      .await;

      match outcome {
        Ok((Ok(run_id), tx)) => {
          if let Some(run) = engine.get_run(&run_id) {
            store.save_run(run, StateMap::new()).await;
            engine.take_run(&run_id);
          }
          drop(tx);
        }
        Ok((Err(e), _)) => warn!(error = %e, "streaming run did not start"),
        Err(e) => warn!(error = %e, "streaming run task failed"),
      }
    });

    Ok(UnboundedReceiverStream::new(rx))
  }

  /// Engine first, then the store.
  pub async fn get_run_state(&self, run_id: &str) -> Result<RunState> {
    if let Some(run) = self.engine.get_run(run_id) {
      return Ok(run);
    }
    self
      .store
      .get_run(run_id)
      .await
      .ok_or_else(|| EngineError::NotFound(format!("run '{}'", run_id)))
  }

  pub async fn list_runs(&self, graph_id: Option<&str>) -> Vec<RunRecord> {
    self.store.list_runs(graph_id).await
  }
}
