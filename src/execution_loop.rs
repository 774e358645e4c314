//! The run loop: walks a graph node by node, bounded by the iteration and cycle caps.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::registry::CapabilityRegistry;
use crate::types::{Graph, Node, RunEvent, RunState, RunStatus, StateMap, StatePredicate};

/// Receives run events as they happen. Delivery is best effort.
pub trait RunObserver: Send + Sync {
  fn notify(&self, event: RunEvent);
}

impl RunObserver for tokio::sync::mpsc::UnboundedSender<RunEvent> {
  fn notify(&self, event: RunEvent) {
    // A dropped receiver only means nobody is listening any more.
    let _ = self.send(event);
  }
}

/// Everything one pass of the loop needs besides the run itself.
pub(crate) struct LoopContext<'a> {
  pub graph: &'a Graph,
  pub registry: &'a CapabilityRegistry,
  pub config: &'a EngineConfig,
  pub loop_predicate: Option<&'a StatePredicate>,
  pub observer: Option<&'a dyn RunObserver>,
}

impl LoopContext<'_> {
  fn log(&self, run: &mut RunState, node: &str, message: String) {
    let entry = run.log_current(node, message).clone();
    if let Some(observer) = self.observer {
      observer.notify(RunEvent::Step {
        run_id: run.run_id().to_string(),
        entry,
      });
    }
  }

  fn finish(&self, run: &mut RunState, status: RunStatus) {
    // `run` only ever leaves `Running` here, so the transition cannot fail.
    if run.status() == RunStatus::Running {
      let _ = run.set_status(status);
    }
  }
}

/// Drives `run` from the graph's entry node until it completes, fails or is stopped.
#[instrument(level = "trace", skip(ctx, run), fields(run_id = %run.run_id()))]
pub(crate) fn run_execution_loop(ctx: &LoopContext<'_>, run: &mut RunState) {
  let max_iterations = ctx.config.max_iterations;
  let max_cycle = ctx.config.max_cycle_iterations;

  let mut visited: HashSet<String> = HashSet::new();
  let mut iterations = 0usize;
  let mut cycle_iterations = 0usize;
  let mut current = Some(ctx.graph.entry_node().to_string());

  while let Some(name) = current.take() {
    if iterations >= max_iterations {
      warn!(node = %name, iterations, "maximum iterations reached");
      let at = run.current_node().unwrap_or(&name).to_string();
      ctx.log(run, &at, format!("Maximum iterations reached ({})", max_iterations));
      ctx.finish(run, RunStatus::Stopped);
      break;
    }
    iterations += 1;

    if visited.contains(&name) {
      cycle_iterations += 1;
      // Stops on reaching the cap, unlike the global limit, which stops only once exceeded.
      if cycle_iterations >= max_cycle {
        warn!(node = %name, cycle_iterations, "loop iteration limit reached");
        ctx.log(run, &name, format!("Loop iteration limit reached ({})", max_cycle));
        ctx.finish(run, RunStatus::Stopped);
        break;
      }
    } else {
      cycle_iterations = 0;
      visited.insert(name.clone());
    }

    let Some(node) = ctx.graph.node(&name) else {
      ctx.log(
        run,
        &name,
        format!("Workflow execution failed: node '{}' not found", name),
      );
      ctx.finish(run, RunStatus::Failed);
      break;
    };

    run.set_current_node(&name);
    debug!(node = %name, iteration = iterations, "executing node");
    match execute_node(ctx.registry, node, run.state()) {
      Ok(updates) => {
        run.merge_state(updates);
        ctx.log(run, &name, format!("Node '{}' executed successfully", name));
      }
      Err(e) => {
        warn!(node = %name, error = %e, "node failed");
        ctx.log(run, &name, format!("Error in node '{}': {}", name, e));
        ctx.finish(run, RunStatus::Failed);
        break;
      }
    }

    current = match ctx.graph.next_node(&name, run.state()) {
      Some(next) => Some(next.to_string()),
      None => loop_back(ctx, &name, run.state()),
    };
  }

  ctx.finish(run, RunStatus::Completed);
}

/// Runs one node: function nodes call their capability, every other kind passes through.
pub(crate) fn execute_node(
  registry: &CapabilityRegistry,
  node: &Node,
  state: &StateMap,
) -> Result<StateMap> {
  if node.is_function() {
    registry.call(&node.capability, state)
  } else {
    Ok(StateMap::new())
  }
}

/// The loop edge target of `node`, if its guard holds and the caller's predicate agrees.
fn loop_back(ctx: &LoopContext<'_>, node: &str, state: &StateMap) -> Option<String> {
  let target = ctx.graph.loop_back(node, state)?;
  if ctx.loop_predicate.is_some_and(|allow| !allow(state)) {
    debug!(node, target, "loop-back vetoed by loop predicate");
    return None;
  }
  debug!(node, target, "looping back");
  Some(target.to_string())
}
