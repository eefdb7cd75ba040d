use super::{DeltaSink, NodeHandler, ResolvedInputs};
use crate::error::HandlerError;
use crate::flow::{FlowNode, NodeConfig};
use crate::store::VariableValueMap;
use async_trait::async_trait;
use serde_json::Value;

/// Emits the node's declared output values: the seeded run inputs when
/// present, otherwise the editor-declared defaults. Never fails.
pub struct InputHandler;

#[async_trait]
impl NodeHandler for InputHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::Input(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let mut delta = VariableValueMap::new();
        for port in &cfg.outputs {
            let seeded = inputs.value(&port.id);
            let value = if seeded.is_null() {
                cfg.values.get(&port.id).cloned().unwrap_or(Value::Null)
            } else {
                seeded.clone()
            };
            delta.insert(port.id.clone(), value);
        }
        sink.send(delta);
        Ok(())
    }
}

/// Copies each connected upstream value (or `null` when unconnected) into a
/// result keyed by the input-port id. This is how run results are surfaced
/// to the caller. Never fails on its own.
pub struct OutputHandler;

#[async_trait]
impl NodeHandler for OutputHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::Output(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let mut delta = VariableValueMap::new();
        for port in &cfg.inputs {
            delta.insert(port.id.clone(), inputs.value(&port.id).clone());
        }
        sink.send(delta);
        Ok(())
    }
}
