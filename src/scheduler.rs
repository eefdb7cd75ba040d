//! Topological run scheduler.
//!
//! Performs a Kahn traversal over the [`GraphIndex`], dispatching each ready
//! node to its registered handler and forwarding the handler's delta stream
//! upward as run events. Scheduling is single-flight: the next ready node is
//! dispatched only after the previous handler has fully completed, while the
//! handler itself is free to suspend on I/O. Ties among simultaneously ready
//! nodes break by discovery order (FIFO ready queue).

use crate::error::{HandlerError, RunError};
use crate::event::{NodeState, RunEvent};
use crate::flow::{FlowDefinition, FlowNode, NodeConfig};
use crate::graph::GraphIndex;
use crate::handler::{DeltaSink, HandlerRegistry, ResolvedInputs};
use crate::store::{VariableStore, VariableValueMap};
use itertools::Itertools;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Terminal outcome of a completed (non-aborted) run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Surfaced results: for every output node, the value of each declared
    /// input keyed by its input-port id.
    pub outputs: VariableValueMap,
    /// Final contents of the run's variable store.
    pub values: VariableValueMap,
    /// Number of nodes that were dispatched.
    pub visited: usize,
    /// Nodes whose in-degree never reached zero (members of a cycle fed by
    /// stale data). They stay pending; the run still terminates.
    pub skipped: usize,
}

/// Executes one flow definition, any number of times. Each call to
/// [`Scheduler::run`] owns a fresh variable store and graph index, so a
/// scheduler can be shared freely across concurrent replays.
pub struct Scheduler {
    flow: Arc<FlowDefinition>,
    registry: Arc<HandlerRegistry>,
}

impl Scheduler {
    pub fn new(flow: Arc<FlowDefinition>, registry: Arc<HandlerRegistry>) -> Self {
        Self { flow, registry }
    }

    /// Runs the flow once against the given seed values.
    ///
    /// Events are pushed to `events` in the documented order. On the first
    /// handler failure the node's terminal event carries `has_error: true`,
    /// no further nodes are dispatched, and the run aborts. Cancellation is
    /// observed between dispatches; in-flight handler work is not stopped
    /// synchronously, but nothing runs after it.
    pub async fn run(
        &self,
        seed: VariableValueMap,
        events: mpsc::UnboundedSender<RunEvent>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let index = GraphIndex::build(&self.flow);
        let mut store = VariableStore::new(seed);
        let mut states = vec![NodeState::Pending; index.len()];
        let mut in_degree: Vec<usize> = (0..index.len()).map(|i| index.in_degree(i)).collect();

        let mut ready: VecDeque<usize> = VecDeque::new();
        for (i, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                states[i] = NodeState::Ready;
                ready.push_back(i);
            }
        }

        let mut outputs = VariableValueMap::new();
        let mut visited = 0usize;

        while let Some(i) = ready.pop_front() {
            if cancel.is_cancelled() {
                debug!(node_id = %index.node_id(i), "run cancelled before dispatch");
                return Err(RunError::Cancelled);
            }

            let node = &self.flow.nodes[i];
            states[i] = NodeState::Running;
            let _ = events.send(RunEvent::NodeRunStateChanged {
                node_id: node.id.clone(),
                is_running: true,
                has_error: false,
            });
            debug!(node_id = %node.id, kind = %node.config.kind(), "dispatching node");

            match self.dispatch(node, &index, &mut store, &events).await {
                Ok(()) => {
                    states[i] = NodeState::Succeeded;
                    visited += 1;
                    let _ = events.send(RunEvent::NodeRunStateChanged {
                        node_id: node.id.clone(),
                        is_running: false,
                        has_error: false,
                    });

                    if let NodeConfig::Output(cfg) = &node.config {
                        for port in &cfg.inputs {
                            let value =
                                store.get(&port.id).cloned().unwrap_or(Value::Null);
                            outputs.insert(port.id.clone(), value);
                        }
                    }

                    for &succ in index.successors(i) {
                        in_degree[succ] -= 1;
                        if in_degree[succ] == 0 {
                            states[succ] = NodeState::Ready;
                            ready.push_back(succ);
                        }
                    }
                }
                Err(source) => {
                    states[i] = NodeState::Failed;
                    let _ = events.send(RunEvent::NodeRunStateChanged {
                        node_id: node.id.clone(),
                        is_running: false,
                        has_error: true,
                    });
                    warn!(node_id = %node.id, error = %source, "node failed, aborting run");
                    return Err(RunError::NodeFailed {
                        node_id: node.id.clone(),
                        source,
                    });
                }
            }
        }

        let skipped = states
            .iter()
            .filter(|s| **s == NodeState::Pending)
            .count();
        if skipped > 0 {
            let stuck = states
                .iter()
                .enumerate()
                .filter(|(_, s)| **s == NodeState::Pending)
                .map(|(i, _)| index.node_id(i).as_str())
                .join(", ");
            warn!(skipped, nodes = %stuck, "nodes never became ready (cycle?), leaving them pending");
        }
        debug!(visited, skipped, "run completed");

        Ok(RunSummary {
            outputs,
            values: store.into_values(),
            visited,
            skipped,
        })
    }

    /// Convenience wrapper for callers that want the full event history
    /// after the fact rather than a live subscription.
    pub async fn run_collect(
        &self,
        seed: VariableValueMap,
    ) -> (Vec<RunEvent>, Result<RunSummary, RunError>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = self.run(seed, tx, CancellationToken::new()).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (events, result)
    }

    /// Dispatches one node: resolves its inputs from the store, spawns the
    /// handler as its own task, and drains the handler's delta channel live,
    /// merging each delta into the store and forwarding it as an event.
    async fn dispatch(
        &self,
        node: &FlowNode,
        index: &GraphIndex,
        store: &mut VariableStore,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> Result<(), HandlerError> {
        let kind = node.config.kind();
        let handler = self
            .registry
            .get(kind)
            .ok_or(HandlerError::Unregistered(kind))?;

        let inputs = resolve_inputs(node, index, store);
        let (tx, mut rx) = mpsc::unbounded_channel::<VariableValueMap>();
        let sink = DeltaSink::new(tx);

        let task_node = node.clone();
        let task =
            tokio::spawn(async move { handler.run(task_node, inputs, sink).await });

        // The channel closes once the handler (the only sender) finishes.
        while let Some(delta) = rx.recv().await {
            store.apply(&delta);
            let _ = events.send(RunEvent::VariableValueChanged { changes: delta });
        }

        match task.await {
            Ok(result) => result,
            Err(join_error) => Err(HandlerError::Panicked(join_error.to_string())),
        }
    }
}

/// Builds the resolved-input map the handler contract expects: input-port id
/// to connected upstream value (`null` when unconnected). Input nodes have
/// no input ports; for them the seeded values of their own output ports are
/// resolved instead.
fn resolve_inputs(node: &FlowNode, index: &GraphIndex, store: &VariableStore) -> ResolvedInputs {
    let mut values = VariableValueMap::new();
    match &node.config {
        NodeConfig::Input(cfg) => {
            for port in &cfg.outputs {
                if let Some(value) = store.get(&port.id) {
                    values.insert(port.id.clone(), value.clone());
                }
            }
        }
        _ => {
            for port in node.config.input_ports() {
                let value = index
                    .source_of_input(&port.id)
                    .and_then(|source| store.get(source))
                    .cloned()
                    .unwrap_or(Value::Null);
                values.insert(port.id.clone(), value);
            }
        }
    }
    ResolvedInputs::new(values)
}
