//! # workflow-engine
//!
//! Minimal graph workflow runtime. A graph is a set of named nodes, `from -> to` edges
//! (optionally guarded by a condition on the state) and loop edges. Function nodes call a
//! capability resolved by name from a [CapabilityRegistry]; the value it returns is merged
//! into the run's state.
//!
//! ## Architecture
//!
//! - `types`: graph model, declarative definitions, run state and events.
//! - `registry`: capability name → transformation.
//! - `engine` / `execution_loop`: graph registration and the bounded run loop.
//! - `store` / `service`: async persistence collaborator and the facade over both.
//! - `capabilities`: the built-in code-review capabilities and graph.
//!
//! Every run ends `completed`, `failed` (a node errored or was missing) or `stopped` (an
//! iteration limit was hit), with one log entry per executed node.

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub(crate) mod execution_loop;
pub mod registry;
pub mod run_io;
pub mod service;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{BoxError, EngineError, Result};
pub use execution_loop::RunObserver;
pub use registry::{Capability, CapabilityHandle, CapabilityRegistry};
pub use service::{RunOutcome, WorkflowService};
pub use store::{GraphRecord, InMemoryStore, RunRecord, Store};
pub use types::{
  Edge, ExecutionLogEntry, Graph, GraphBuilder, GraphDefinition, Guard, LoopEdge, Node,
  NodeKind, RunEvent, RunState, RunStatus, StateMap, StatePredicate,
};
