//! Interfaces to the external collaborators the executor depends on:
//! credential storage and the remote model APIs. Request and response shapes
//! are opaque to the scheduler and interpreted only inside the corresponding
//! node handlers.

use crate::error::HandlerError;
use crate::flow::{ChatMessage, SamplingParams};
use ahash::AHashMap;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Local credential storage. `notify_missing` lets the UI prompt the user
/// when a handler fails with a missing-credential condition.
pub trait CredentialStore: Send + Sync {
    fn credential(&self, kind: &str) -> Option<String>;
    fn notify_missing(&self, kind: &str);
}

/// A fixed in-memory credential store, mainly for tests and the CLI.
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    values: AHashMap<String, String>,
}

impl StaticCredentialStore {
    pub fn new(values: AHashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn single(kind: impl Into<String>, secret: impl Into<String>) -> Self {
        let mut values = AHashMap::new();
        values.insert(kind.into(), secret.into());
        Self { values }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credential(&self, kind: &str) -> Option<String> {
        self.values.get(kind).cloned()
    }

    fn notify_missing(&self, _kind: &str) {}
}

/// Request for a streaming chat call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub params: SamplingParams,
    pub credential: String,
}

/// One incremental piece of a streamed chat response.
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    /// Replaces the accumulated role when present (roles arrive partially).
    pub role_delta: Option<String>,
    /// Appended to the accumulated content.
    pub content_delta: String,
}

/// Stream of chat chunks; a mid-stream `Err` is a transport failure.
pub type ChatChunkStream = BoxStream<'static, Result<ChatChunk, HandlerError>>;

/// Remote model collaborator with a streaming call contract.
#[async_trait]
pub trait ChatModelClient: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatChunkStream, HandlerError>;
}

/// Request for a single-shot inference call.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    pub params: SamplingParams,
    pub credential: String,
}

/// Remote model collaborator with a single-shot call contract.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, request: InferenceRequest) -> Result<Value, HandlerError>;
}
