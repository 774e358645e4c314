//! CLI: run a workflow graph from a JSON definition.
//!
//! Without a definition file the built-in code-review graph runs.
//!
//! Usage: `run_graph [OPTIONS] [path-to-graph-json]`
//! Example: run_graph --code tests/integration/sample.py --state '{"threshold": 80}'
//!
//! Set RUST_LOG=workflow_engine=trace for TRACE-level span enter/exit and events.

use clap::Parser;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};
use workflow_engine::capabilities::{code_review_definition, register_code_review};
use workflow_engine::{
  CapabilityRegistry, Engine, EngineConfig, GraphDefinition, InMemoryStore, RunStatus, StateMap,
  WorkflowService, run_io,
};

/// Run a workflow graph and print its final state.
#[derive(Parser, Debug)]
#[command(name = "run_graph")]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  WORKFLOW_MAX_ITERATIONS         Hard cap on node executions per run (default: 1000).
  WORKFLOW_MAX_CYCLE_ITERATIONS   Consecutive revisits allowed before a run is stopped (default: 10).

Exit status: 0 completed, 1 failed or unusable input, 2 stopped by a limit.

Examples:
  run_graph --code tests/integration/sample.py --state '{"threshold": 80}'
  run_graph --out .workflow --state-file tests/integration/state.json tests/integration/code_review.json"#
)]
struct Args {
  /// Initial state as a JSON object.
  #[arg(long, value_name = "JSON", conflicts_with = "state_file")]
  state: Option<String>,

  /// File holding the initial state as a JSON object.
  #[arg(long, value_name = "FILE")]
  state_file: Option<PathBuf>,

  /// Source file whose contents are bound to the `code` state key.
  #[arg(long, value_name = "FILE")]
  code: Option<PathBuf>,

  /// Directory to write run.json into.
  #[arg(long, value_name = "DIR")]
  out: Option<PathBuf>,

  /// At least 1. Overridden by WORKFLOW_MAX_ITERATIONS if set.
  #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
  max_iterations: Option<u64>,

  /// At least 1. Overridden by WORKFLOW_MAX_CYCLE_ITERATIONS if set.
  #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
  max_cycle_iterations: Option<u64>,

  /// Path to a JSON graph definition.
  #[arg(value_name = "path-to-graph-json")]
  graph_path: Option<PathBuf>,
}

fn fail(message: String) -> ! {
  eprintln!("{}", message);
  process::exit(1);
}

fn read_file(path: &PathBuf) -> String {
  fs::read_to_string(path)
    .unwrap_or_else(|e| fail(format!("Error reading {}: {}", path.display(), e)))
}

fn limit(n: u64, flag: &str) -> usize {
  usize::try_from(n).unwrap_or_else(|_| fail(format!("{} is too large: {}", flag, n)))
}

fn parse_state(raw: &str, origin: &str) -> StateMap {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => map,
    Ok(_) => fail(format!("Initial state from {} must be a JSON object", origin)),
    Err(e) => fail(format!("Error parsing initial state from {}: {}", origin, e)),
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  info!("run_graph starting");
  let args = Args::parse();

  // Env vars override flags.
  let mut config = EngineConfig::default();
  if let Some(n) = args.max_iterations {
    config.max_iterations = limit(n, "--max-iterations");
  }
  if let Some(n) = args.max_cycle_iterations {
    config.max_cycle_iterations = limit(n, "--max-cycle-iterations");
  }
  let config = config.with_overrides(|key| std::env::var(key).ok());
  info!(
    max_iterations = config.max_iterations,
    max_cycle_iterations = config.max_cycle_iterations,
    "limits (env or flags)"
  );

  let definition: GraphDefinition = match &args.graph_path {
    Some(path) => serde_json::from_str(&read_file(path))
      .unwrap_or_else(|e| fail(format!("Error parsing {}: {}", path.display(), e))),
    None => code_review_definition(),
  };

  let mut initial_state = match (&args.state, &args.state_file) {
    (Some(raw), _) => parse_state(raw, "--state"),
    (None, Some(path)) => parse_state(&read_file(path), &path.display().to_string()),
    (None, None) => StateMap::new(),
  };
  if let Some(path) = &args.code {
    initial_state.insert("code".to_string(), Value::String(read_file(path)));
  }

  let registry = Arc::new(CapabilityRegistry::new());
  if let Err(e) = register_code_review(&registry) {
    fail(format!("Error registering capabilities: {}", e));
  }
  let engine = Arc::new(Engine::with_config(registry, config));
  let service = WorkflowService::new(engine, Arc::new(InMemoryStore::new()));

  let graph_id = service
    .create_graph(&definition, StateMap::new())
    .await
    .unwrap_or_else(|e| fail(format!("Graph error: {}", e)));
  let outcome = service
    .run(&graph_id, initial_state)
    .await
    .unwrap_or_else(|e| fail(format!("Run error: {}", e)));

  if let Some(dir) = &args.out {
    let path = dir.join(run_io::RUN_FILENAME);
    let saved = match service.get_run_state(&outcome.run_id).await {
      Ok(run) => run_io::save_run(&path, &run),
      Err(e) => Err(e),
    };
    if let Err(e) = saved {
      fail(format!("Error writing {}: {}", path.display(), e));
    }
    info!(path = %path.display(), "run saved");
  }

  info!(run_id = %outcome.run_id, status = %outcome.status, "run finished");
  println!("Run {} {}.", outcome.run_id, outcome.status);
  println!("  Steps: {}", outcome.execution_log.len());
  if let Some(message) = outcome.execution_log.last().and_then(|e| e.message.as_deref()) {
    println!("  Last: {}", message);
  }
  match serde_json::to_string_pretty(&outcome.final_state) {
    Ok(json) => println!("{}", json),
    Err(e) => fail(format!("Error printing final state: {}", e)),
  }

  match outcome.status {
    RunStatus::Completed => {}
    RunStatus::Stopped => process::exit(2),
    _ => process::exit(1),
  }
}
