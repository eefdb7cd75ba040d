use crate::flow::NodeId;
use crate::handler::NodeKind;
use thiserror::Error;

/// Errors that can occur when converting a custom editor format into a
/// `FlowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum FlowConversionError {
    #[error("Invalid flow data: {0}")]
    ValidationError(String),
}

/// Errors produced by a single node handler invocation.
///
/// Any of these aborts the enclosing run; configuration problems (stale
/// edges, unconnected inputs) are never surfaced here — they resolve to
/// dropped edges or `null` inputs instead.
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("No credential configured for '{kind}'")]
    MissingCredential { kind: String },

    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error("No handler registered for node kind '{0}'")]
    Unregistered(NodeKind),

    #[error("Handler received a mismatched config for node '{0}'")]
    ConfigMismatch(NodeId),

    #[error("Handler task panicked: {0}")]
    Panicked(String),
}

/// Errors that terminate a whole scheduler run.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("Node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: NodeId,
        #[source]
        source: HandlerError,
    },

    #[error("Run was cancelled")]
    Cancelled,
}
