//! Prelude module for convenient imports
//!
//! Re-exports the most commonly used types from the nagare crate: the flow
//! definition model, the scheduler and batch runner, the handler registry,
//! and the collaborator traits.

// Flow definition model
pub use crate::flow::{
    ChatCompletionNodeConfig, ChatMessage, ChatMessageNodeConfig, EdgeId, FlowDefinition,
    FlowEdge, FlowNode, InferenceNodeConfig, InputNodeConfig, IntoFlow, NodeConfig, NodeId,
    OutputNodeConfig, Port, SamplingParams, ScriptFunctionNodeConfig, TextTemplateNodeConfig,
    ValueType, VariableId,
};

// Execution
pub use crate::batch::{BatchCellResult, BatchCellStatus, BatchOptions, BatchRunner, ColumnBindings};
pub use crate::event::{NodeAugment, NodeState, RunEvent};
pub use crate::graph::GraphIndex;
pub use crate::scheduler::{RunSummary, Scheduler};
pub use crate::store::{VariableStore, VariableValueMap};

// Handlers and collaborators
pub use crate::client::{
    ChatChunk, ChatChunkStream, ChatModelClient, ChatRequest, CredentialStore, InferenceClient,
    InferenceRequest, StaticCredentialStore,
};
pub use crate::handler::{
    DeltaSink, HandlerRegistry, HandlerRegistryBuilder, NodeHandler, NodeKind, ResolvedInputs,
};

// Error types
pub use crate::error::{FlowConversionError, HandlerError, RunError};
