//! Execution engine: graph registration and run orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution_loop::{LoopContext, RunObserver, run_execution_loop};
use crate::registry::CapabilityRegistry;
use crate::types::{Graph, GraphDefinition, RunEvent, RunState, StateMap, StatePredicate};

/// Owns registered graphs and finished runs; drives runs against an injected registry.
pub struct Engine {
  registry: Arc<CapabilityRegistry>,
  config: EngineConfig,
  graphs: RwLock<HashMap<String, Arc<Graph>>>,
  runs: RwLock<HashMap<String, RunState>>,
}

impl Engine {
  pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
    Self::with_config(registry, EngineConfig::default())
  }

  pub fn with_config(registry: Arc<CapabilityRegistry>, config: EngineConfig) -> Self {
    Self {
      registry,
      config,
      graphs: RwLock::new(HashMap::new()),
      runs: RwLock::new(HashMap::new()),
    }
  }

  pub fn registry(&self) -> &Arc<CapabilityRegistry> {
    &self.registry
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Builds, validates and registers a graph from its declarative form.
  pub fn create_graph(&self, definition: &GraphDefinition) -> Result<String> {
    self.register_graph(definition.build()?)
  }

  /// Registers an already built graph once every function node's capability is known.
  #[instrument(level = "trace", skip(self, graph), fields(graph = %graph.name()))]
  pub fn register_graph(&self, graph: Graph) -> Result<String> {
    let mut missing: Vec<(&str, &str)> = graph
      .nodes()
      .values()
      .filter(|n| n.is_function() && !self.registry.contains(&n.capability))
      .map(|n| (n.name.as_str(), n.capability.as_str()))
      .collect();
    missing.sort();
    if let Some((node, capability)) = missing.first() {
      return Err(EngineError::InvalidGraph(format!(
        "Node '{}' references unregistered capability '{}'",
        node, capability
      )));
    }

    let id = graph.id().to_string();
    info!(
      graph_id = %id,
      name = graph.name(),
      node_count = graph.nodes().len(),
      edge_count = graph.edges().len(),
      "graph registered"
    );
    self.graphs.write().insert(id.clone(), Arc::new(graph));
    Ok(id)
  }

  pub fn get_graph(&self, graph_id: &str) -> Option<Arc<Graph>> {
    self.graphs.read().get(graph_id).cloned()
  }

  pub fn list_graphs(&self) -> Vec<Arc<Graph>> {
    let mut graphs: Vec<_> = self.graphs.read().values().cloned().collect();
    graphs.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
    graphs
  }

  pub fn remove_graph(&self, graph_id: &str) -> bool {
    self.graphs.write().remove(graph_id).is_some()
  }

  /// Runs `graph_id` from a copy of `initial_state` and returns the run id.
  ///
  /// A node failure or a safety cap does not make this return an error; check the
  /// run's status through [Engine::get_run].
  pub fn run(
    &self,
    graph_id: &str,
    initial_state: &StateMap,
    loop_predicate: Option<&StatePredicate>,
  ) -> Result<String> {
    self.run_with_observer(graph_id, initial_state, loop_predicate, None)
  }

  /// Like [Engine::run], also reporting every log entry and the final status to `observer`.
  /// `Finished` is sent once the run is readable through [Engine::get_run].
  #[instrument(level = "trace", skip(self, initial_state, loop_predicate, observer))]
  pub fn run_with_observer(
    &self,
    graph_id: &str,
    initial_state: &StateMap,
    loop_predicate: Option<&StatePredicate>,
    observer: Option<&dyn RunObserver>,
  ) -> Result<String> {
    let graph = self
      .get_graph(graph_id)
      .ok_or_else(|| EngineError::UnknownGraph(graph_id.to_string()))?;

    let mut run = RunState::new(graph_id, initial_state);
    info!(run_id = run.run_id(), graph_id, graph = graph.name(), "run started");

    let ctx = LoopContext {
      graph: &graph,
      registry: &self.registry,
      config: &self.config,
      loop_predicate,
      observer,
    };
    run_execution_loop(&ctx, &mut run);

    info!(
      run_id = run.run_id(),
      status = %run.status(),
      steps = run.execution_log().len(),
      "run finished"
    );
    let finished = RunEvent::Finished {
      run_id: run.run_id().to_string(),
      status: run.status(),
      final_state: run.state().clone(),
    };
    let run_id = run.run_id().to_string();
    self.runs.write().insert(run_id.clone(), run);
    if let Some(observer) = observer {
      observer.notify(finished);
    }
    Ok(run_id)
  }

  pub fn get_run(&self, run_id: &str) -> Option<RunState> {
    self.runs.read().get(run_id).cloned()
  }

  /// Drops a finished run from the engine's table, returning it.
  pub fn take_run(&self, run_id: &str) -> Option<RunState> {
    self.runs.write().remove(run_id)
  }
}
