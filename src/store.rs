//! Storage collaborator for graphs and finished runs, keyed by id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::{Graph, RunState, RunStatus, StateMap};

/// Summary stored next to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
  pub graph_id: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
  pub node_count: usize,
  pub edge_count: usize,
  /// Caller-supplied extras.
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub metadata: StateMap,
}

/// Summary stored next to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id: String,
  pub graph_id: String,
  pub status: RunStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub log_entry_count: usize,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub metadata: StateMap,
}

impl GraphRecord {
  pub fn describe(graph: &Graph, metadata: StateMap) -> Self {
    Self {
      graph_id: graph.id().to_string(),
      name: graph.name().to_string(),
      created_at: Utc::now(),
      node_count: graph.nodes().len(),
      edge_count: graph.edges().len(),
      metadata,
    }
  }
}

impl RunRecord {
  pub fn describe(run: &RunState, metadata: StateMap) -> Self {
    Self {
      run_id: run.run_id().to_string(),
      graph_id: run.graph_id().to_string(),
      status: run.status(),
      created_at: run.created_at(),
      updated_at: run.updated_at(),
      log_entry_count: run.execution_log().len(),
      metadata,
    }
  }
}

/// Where graphs and runs go once the engine is done with them. Implementations decide
/// retention; the engine never relies on it.
#[async_trait]
pub trait Store: Send + Sync {
  async fn save_graph(&self, graph: Arc<Graph>, metadata: StateMap);
  async fn get_graph(&self, graph_id: &str) -> Option<Arc<Graph>>;
  async fn list_graphs(&self) -> Vec<GraphRecord>;
  async fn delete_graph(&self, graph_id: &str) -> bool;

  async fn save_run(&self, run: RunState, metadata: StateMap);
  async fn get_run(&self, run_id: &str) -> Option<RunState>;
  /// Runs, optionally only those of `graph_id`.
  async fn list_runs(&self, graph_id: Option<&str>) -> Vec<RunRecord>;
  async fn delete_run(&self, run_id: &str) -> bool;
}

#[derive(Default)]
struct Tables {
  graphs: HashMap<String, (Arc<Graph>, GraphRecord)>,
  runs: HashMap<String, (RunState, RunRecord)>,
}

/// Process-local [Store].
#[derive(Default)]
pub struct InMemoryStore {
  tables: RwLock<Tables>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for InMemoryStore {
  async fn save_graph(&self, graph: Arc<Graph>, metadata: StateMap) {
    let record = GraphRecord::describe(&graph, metadata);
    self
      .tables
      .write()
      .await
      .graphs
      .insert(record.graph_id.clone(), (graph, record));
  }

  async fn get_graph(&self, graph_id: &str) -> Option<Arc<Graph>> {
    self
      .tables
      .read()
      .await
      .graphs
      .get(graph_id)
      .map(|(g, _)| g.clone())
  }

  async fn list_graphs(&self) -> Vec<GraphRecord> {
    let mut records: Vec<GraphRecord> = self
      .tables
      .read()
      .await
      .graphs
      .values()
      .map(|(_, r)| r.clone())
      .collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.graph_id.cmp(&b.graph_id)));
    records
  }

  async fn delete_graph(&self, graph_id: &str) -> bool {
    self.tables.write().await.graphs.remove(graph_id).is_some()
  }

  async fn save_run(&self, run: RunState, metadata: StateMap) {
    let record = RunRecord::describe(&run, metadata);
    self
      .tables
      .write()
      .await
      .runs
      .insert(record.run_id.clone(), (run, record));
  }

  async fn get_run(&self, run_id: &str) -> Option<RunState> {
    self
      .tables
      .read()
      .await
      .runs
      .get(run_id)
      .map(|(r, _)| r.clone())
  }

  async fn list_runs(&self, graph_id: Option<&str>) -> Vec<RunRecord> {
    let mut records: Vec<RunRecord> = self
      .tables
      .read()
      .await
      .runs
      .values()
      .filter(|(_, r)| graph_id.is_none_or(|g| r.graph_id == g))
      .map(|(_, r)| r.clone())
      .collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.run_id.cmp(&b.run_id)));
    records
  }

  async fn delete_run(&self, run_id: &str) -> bool {
    self.tables.write().await.runs.remove(run_id).is_some()
  }
}
