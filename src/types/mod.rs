//! Graph, node, edge and run-state types shared by the registry and the engine.

mod condition;
#[cfg(test)]
mod condition_test;
mod edge;
mod graph;
mod graph_definition;
#[cfg(test)]
mod graph_definition_test;
#[cfg(test)]
mod graph_test;
mod node;
mod run_event;
mod run_state;
#[cfg(test)]
mod run_state_test;
mod run_status;

pub use condition::{Comparison, Condition, Operand};
pub use edge::{Edge, Guard, LoopEdge, StatePredicate};
pub use graph::{Graph, GraphBuilder};
pub use graph_definition::{GraphDefinition, LoopEdgeDefinition, NodeDefinition};
pub use node::{Node, NodeKind};
pub use run_event::RunEvent;
pub use run_state::{ExecutionLogEntry, RunState};
pub use run_status::RunStatus;

/// Key-value state threaded through a run. Capabilities define the keys.
pub type StateMap = serde_json::Map<String, serde_json::Value>;
