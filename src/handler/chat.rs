use super::{DeltaSink, NodeHandler, ResolvedInputs, message_list};
use crate::client::{ChatModelClient, ChatRequest, CredentialStore};
use crate::error::HandlerError;
use crate::flow::{ChatCompletionNodeConfig, ChatMessage, FlowNode, NodeConfig};
use crate::handler::template::render_template;
use crate::store::VariableValueMap;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_ROLE: &str = "assistant";

/// Appends a role-tagged message (rendered from the node's template) to the
/// accumulated message list, emitting both the new message and the updated
/// list.
pub struct ChatMessageHandler;

#[async_trait]
impl NodeHandler for ChatMessageHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::ChatMessage(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let mut messages = cfg
            .messages_input
            .as_ref()
            .map(|port| message_list(inputs.value(&port.id)))
            .unwrap_or_default();

        let scope = inputs.scope(&cfg.template_inputs);
        let content = render_template(&cfg.template, &scope)?;
        let message = ChatMessage {
            role: cfg.role.clone(),
            content,
        };
        messages.push(message.clone());

        let mut delta = VariableValueMap::new();
        delta.insert(cfg.message_output.id.clone(), json!(message));
        delta.insert(cfg.messages_output.id.clone(), json!(messages));
        sink.send(delta);
        Ok(())
    }
}

/// Streaming chat call. Requires a credential from the credential
/// collaborator; without one the handler fails immediately and signals the
/// collaborator so the UI can prompt the user. On success it emits one
/// partial update per incoming chunk as a continuously revised
/// `{content, message, messages}` triple, then a final update in which the
/// accumulated message has been appended to the message list.
pub struct ChatCompletionHandler {
    credentials: Arc<dyn CredentialStore>,
    client: Arc<dyn ChatModelClient>,
}

impl ChatCompletionHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>, client: Arc<dyn ChatModelClient>) -> Self {
        Self {
            credentials,
            client,
        }
    }

    fn triple(
        cfg: &ChatCompletionNodeConfig,
        content: &str,
        message: &ChatMessage,
        messages: &[ChatMessage],
    ) -> VariableValueMap {
        let mut delta = VariableValueMap::new();
        delta.insert(cfg.content_output.id.clone(), json!(content));
        delta.insert(cfg.message_output.id.clone(), json!(message));
        delta.insert(cfg.messages_output.id.clone(), json!(messages));
        delta
    }
}

#[async_trait]
impl NodeHandler for ChatCompletionHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::ChatCompletion(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let Some(credential) = self.credentials.credential(&cfg.credential) else {
            self.credentials.notify_missing(&cfg.credential);
            return Err(HandlerError::MissingCredential {
                kind: cfg.credential.clone(),
            });
        };

        let history = cfg
            .messages_input
            .as_ref()
            .map(|port| message_list(inputs.value(&port.id)))
            .unwrap_or_default();

        let request = ChatRequest {
            model: cfg.model.clone(),
            messages: history.clone(),
            params: cfg.params.clone(),
            credential,
        };
        let mut stream = self.client.stream_chat(request).await?;

        let mut role = String::new();
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let role_changed = chunk.role_delta.is_some();
            if let Some(partial_role) = chunk.role_delta {
                role = partial_role;
            }
            // A chunk carrying neither content nor a role revises nothing;
            // partials stay non-decreasing in content length either way.
            if chunk.content_delta.is_empty() && !role_changed {
                continue;
            }
            content.push_str(&chunk.content_delta);

            let message = ChatMessage {
                role: effective_role(&role),
                content: content.clone(),
            };
            sink.send(Self::triple(cfg, &content, &message, &history));
        }

        let message = ChatMessage {
            role: effective_role(&role),
            content: content.clone(),
        };
        let mut messages = history;
        messages.push(message.clone());
        sink.send(Self::triple(cfg, &content, &message, &messages));
        Ok(())
    }
}

fn effective_role(role: &str) -> String {
    if role.is_empty() {
        DEFAULT_ROLE.to_string()
    } else {
        role.to_string()
    }
}
