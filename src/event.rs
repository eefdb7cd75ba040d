use crate::flow::NodeId;
use crate::store::VariableValueMap;
use ahash::AHashMap;
use serde::Serialize;

/// One entry in the ordered, typed event stream a run emits to its caller.
///
/// Ordering invariant: for a given node, its `NodeRunStateChanged` with
/// `is_running: true` precedes all `VariableValueChanged` events produced by
/// that node, which precede its terminal `NodeRunStateChanged` with
/// `is_running: false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    VariableValueChanged {
        changes: VariableValueMap,
    },
    #[serde(rename_all = "camelCase")]
    NodeRunStateChanged {
        node_id: NodeId,
        is_running: bool,
        has_error: bool,
    },
}

/// Per-node state machine within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
}

/// Ephemeral per-node UI-facing state, derived entirely from
/// `NodeRunStateChanged` events. Not persisted with the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeAugment {
    pub is_running: bool,
    pub has_error: bool,
}

impl NodeAugment {
    /// Folds an event history into the latest augment per node.
    pub fn fold(events: &[RunEvent]) -> AHashMap<NodeId, NodeAugment> {
        let mut augments: AHashMap<NodeId, NodeAugment> = AHashMap::new();
        for event in events {
            if let RunEvent::NodeRunStateChanged {
                node_id,
                is_running,
                has_error,
            } = event
            {
                augments.insert(
                    node_id.clone(),
                    NodeAugment {
                        is_running: *is_running,
                        has_error: *has_error,
                    },
                );
            }
        }
        augments
    }
}
