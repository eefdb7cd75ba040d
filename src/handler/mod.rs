//! Node handler registry: one async handler per node kind.
//!
//! Each handler reads its resolved input values, performs its computation,
//! and emits one or more partial value-map deltas through a [`DeltaSink`]
//! (streaming handlers emit many). Handlers never touch the variable store
//! directly; the scheduler applies the deltas it drains from the sink, which
//! keeps data flow auditable and handlers testable in isolation.

use crate::client::{ChatModelClient, CredentialStore, InferenceClient};
use crate::error::HandlerError;
use crate::flow::{FlowNode, NodeConfig, Port, VariableId};
use crate::store::VariableValueMap;
use ahash::AHashMap;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

mod chat;
mod inference;
mod io;
mod script;
pub mod template;

pub use chat::{ChatCompletionHandler, ChatMessageHandler};
pub use inference::InferenceHandler;
pub use io::{InputHandler, OutputHandler};
pub use script::ScriptFunctionHandler;
pub use template::TextTemplateHandler;

/// The node kinds the executor can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Output,
    ScriptFunction,
    TextTemplate,
    ChatMessage,
    ChatCompletion,
    Inference,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Input => "InputNode",
            NodeKind::Output => "OutputNode",
            NodeKind::ScriptFunction => "ScriptFunctionNode",
            NodeKind::TextTemplate => "TextTemplateNode",
            NodeKind::ChatMessage => "ChatMessageNode",
            NodeKind::ChatCompletion => "ChatCompletionNode",
            NodeKind::Inference => "InferenceNode",
        };
        write!(f, "{}", name)
    }
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Input(_) => NodeKind::Input,
            NodeConfig::Output(_) => NodeKind::Output,
            NodeConfig::ScriptFunction(_) => NodeKind::ScriptFunction,
            NodeConfig::TextTemplate(_) => NodeKind::TextTemplate,
            NodeConfig::ChatMessage(_) => NodeKind::ChatMessage,
            NodeConfig::ChatCompletion(_) => NodeKind::ChatCompletion,
            NodeConfig::Inference(_) => NodeKind::Inference,
        }
    }
}

static NULL: Value = Value::Null;

/// Input values resolved by the scheduler before dispatch, keyed by port id.
///
/// For ordinary nodes the keys are the node's input-port ids, each carrying
/// the connected upstream value (unconnected resolves to `null`). For input
/// nodes the keys are the node's own output-port ids, carrying the seeded
/// run inputs.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInputs {
    values: VariableValueMap,
}

impl ResolvedInputs {
    pub fn new(values: VariableValueMap) -> Self {
        Self { values }
    }

    /// The resolved value for a port id; `null` when absent.
    pub fn value(&self, port_id: &str) -> &Value {
        self.values.get(port_id).unwrap_or(&NULL)
    }

    /// A rendering scope keyed by port display name, as the template-driven
    /// handlers consume it.
    pub fn scope(&self, ports: &[Port]) -> AHashMap<String, Value> {
        ports
            .iter()
            .map(|port| (port.name.clone(), self.value(&port.id).clone()))
            .collect()
    }
}

/// Where handlers emit their produced deltas. Each delta is forwarded to the
/// run's event stream as a `VariableValueChanged` and merged into the store.
#[derive(Debug, Clone)]
pub struct DeltaSink {
    tx: mpsc::UnboundedSender<VariableValueMap>,
}

impl DeltaSink {
    pub fn new(tx: mpsc::UnboundedSender<VariableValueMap>) -> Self {
        Self { tx }
    }

    /// Emits a partial value-map update. Send failures are ignored: the
    /// receiver only disappears when the run is being torn down.
    pub fn send(&self, delta: VariableValueMap) {
        let _ = self.tx.send(delta);
    }

    pub fn send_one(&self, id: impl Into<VariableId>, value: Value) {
        let mut delta = VariableValueMap::new();
        delta.insert(id.into(), value);
        self.send(delta);
    }
}

/// The type-specific async computation behind one node kind.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError>;
}

/// Dispatch table from node kind to handler.
pub struct HandlerRegistry {
    handlers: AHashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

/// Builds a [`HandlerRegistry`] with the default handlers, wiring in the
/// external collaborators the remote-call handlers need. The chat-completion
/// and inference handlers are only registered when their client collaborator
/// is supplied; dispatching an unregistered kind fails that node.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    credentials: Option<Arc<dyn CredentialStore>>,
    chat_client: Option<Arc<dyn ChatModelClient>>,
    inference_client: Option<Arc<dyn InferenceClient>>,
    overrides: Vec<(NodeKind, Arc<dyn NodeHandler>)>,
}

impl HandlerRegistryBuilder {
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_chat_client(mut self, client: Arc<dyn ChatModelClient>) -> Self {
        self.chat_client = Some(client);
        self
    }

    pub fn with_inference_client(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.inference_client = Some(client);
        self
    }

    /// Replaces (or adds) the handler for one node kind.
    pub fn with_handler(mut self, kind: NodeKind, handler: Arc<dyn NodeHandler>) -> Self {
        self.overrides.push((kind, handler));
        self
    }

    pub fn build(self) -> HandlerRegistry {
        let mut handlers: AHashMap<NodeKind, Arc<dyn NodeHandler>> = AHashMap::new();
        handlers.insert(NodeKind::Input, Arc::new(InputHandler));
        handlers.insert(NodeKind::Output, Arc::new(OutputHandler));
        handlers.insert(NodeKind::ScriptFunction, Arc::new(ScriptFunctionHandler));
        handlers.insert(NodeKind::TextTemplate, Arc::new(TextTemplateHandler));
        handlers.insert(NodeKind::ChatMessage, Arc::new(ChatMessageHandler));

        if let (Some(credentials), Some(client)) = (&self.credentials, &self.chat_client) {
            handlers.insert(
                NodeKind::ChatCompletion,
                Arc::new(ChatCompletionHandler::new(
                    credentials.clone(),
                    client.clone(),
                )),
            );
        }
        if let (Some(credentials), Some(client)) = (&self.credentials, &self.inference_client) {
            handlers.insert(
                NodeKind::Inference,
                Arc::new(InferenceHandler::new(credentials.clone(), client.clone())),
            );
        }

        for (kind, handler) in self.overrides {
            handlers.insert(kind, handler);
        }

        HandlerRegistry { handlers }
    }
}

/// Parses an accumulated message-list value; `null` or malformed lists
/// resolve to an empty history rather than failing the node.
pub(crate) fn message_list(value: &Value) -> Vec<crate::flow::ChatMessage> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}
