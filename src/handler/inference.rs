use super::{DeltaSink, NodeHandler, ResolvedInputs};
use crate::client::{CredentialStore, InferenceClient, InferenceRequest};
use crate::error::HandlerError;
use crate::flow::{FlowNode, NodeConfig};
use crate::handler::template::render_template;
use async_trait::async_trait;
use std::sync::Arc;

/// Single-shot remote model call. Shares the missing-credential behavior of
/// the chat-completion handler; a non-success response fails the node.
pub struct InferenceHandler {
    credentials: Arc<dyn CredentialStore>,
    client: Arc<dyn InferenceClient>,
}

impl InferenceHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>, client: Arc<dyn InferenceClient>) -> Self {
        Self {
            credentials,
            client,
        }
    }
}

#[async_trait]
impl NodeHandler for InferenceHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::Inference(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let Some(credential) = self.credentials.credential(&cfg.credential) else {
            self.credentials.notify_missing(&cfg.credential);
            return Err(HandlerError::MissingCredential {
                kind: cfg.credential.clone(),
            });
        };

        let scope = inputs.scope(&cfg.inputs);
        let prompt = render_template(&cfg.template, &scope)?;
        let request = InferenceRequest {
            model: cfg.model.clone(),
            prompt,
            params: cfg.params.clone(),
            credential,
        };

        let response = self.client.infer(request).await?;
        sink.send_one(cfg.output.id.clone(), response);
        Ok(())
    }
}
