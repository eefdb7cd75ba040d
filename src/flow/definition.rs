use crate::store::VariableValueMap;
use serde::{Deserialize, Serialize};

/// Opaque node identifier, unique within a flow.
pub type NodeId = String;
/// Opaque edge identifier, unique within a flow.
pub type EdgeId = String;
/// Opaque port identifier. A `VariableId` is either an input-port id or an
/// output-port id; port ids are unique across the whole flow.
pub type VariableId = String;

/// The complete, canonical definition of a flow graph, as exchanged with the
/// persistence collaborator. This is the target structure for any custom
/// editor-format conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowDefinition {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A single node in the flow graph: an identifier plus its kind-specific
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub config: NodeConfig,
}

/// A directed connection from one node's output port to another node's
/// input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: EdgeId,
    pub source_node_id: NodeId,
    pub source_output_port_id: VariableId,
    pub target_node_id: NodeId,
    pub target_input_port_id: VariableId,
}

/// A named input or output slot on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: VariableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
}

/// Declared value type of a port. Advisory only; the executor never coerces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    List,
    Object,
    Unknown,
}

/// A role-tagged chat message, as accumulated by the chat node handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Sampling parameters forwarded opaquely to the remote model collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Kind-specific node configuration. Node kinds share only the common
/// port-list shape, so this is a sum type rather than a trait hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeConfig {
    #[serde(rename = "InputNode")]
    Input(InputNodeConfig),
    #[serde(rename = "OutputNode")]
    Output(OutputNodeConfig),
    #[serde(rename = "ScriptFunctionNode")]
    ScriptFunction(ScriptFunctionNodeConfig),
    #[serde(rename = "TextTemplateNode")]
    TextTemplate(TextTemplateNodeConfig),
    #[serde(rename = "ChatMessageNode")]
    ChatMessage(ChatMessageNodeConfig),
    #[serde(rename = "ChatCompletionNode")]
    ChatCompletion(ChatCompletionNodeConfig),
    #[serde(rename = "InferenceNode")]
    Inference(InferenceNodeConfig),
}

/// Source of externally supplied run inputs. `values` holds the editor's
/// current values keyed by output-port id; a run seed overrides them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputNodeConfig {
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub values: VariableValueMap,
}

/// Sink node. For each declared input, the upstream value (or `null` when
/// unconnected) is surfaced as a run result keyed by the input-port id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputNodeConfig {
    pub inputs: Vec<Port>,
}

/// Evaluates a user-supplied script against the connected input values and
/// emits its single declared output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFunctionNodeConfig {
    pub inputs: Vec<Port>,
    pub output: Port,
    pub code: String,
}

/// Renders a `{{name}}`-style string template against the connected input
/// values and emits the rendered string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTemplateNodeConfig {
    pub inputs: Vec<Port>,
    pub output: Port,
    pub template: String,
}

/// Appends one role-tagged message (rendered from a template) to an
/// accumulated message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageNodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_input: Option<Port>,
    #[serde(default)]
    pub template_inputs: Vec<Port>,
    pub role: String,
    pub template: String,
    pub message_output: Port,
    pub messages_output: Port,
}

/// Streaming chat call against a remote model. Emits a continuously revised
/// `{content, message, messages}` triple, one partial update per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionNodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_input: Option<Port>,
    pub model: String,
    /// Credential kind resolved through the credential collaborator.
    pub credential: String,
    #[serde(default)]
    pub params: SamplingParams,
    pub content_output: Port,
    pub message_output: Port,
    pub messages_output: Port,
}

/// Single-shot (non-streaming) remote model call; the prompt is rendered
/// from a template over the connected inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceNodeConfig {
    #[serde(default)]
    pub inputs: Vec<Port>,
    pub template: String,
    pub model: String,
    pub credential: String,
    #[serde(default)]
    pub params: SamplingParams,
    pub output: Port,
}

impl NodeConfig {
    /// Declared input ports, in declaration order.
    pub fn input_ports(&self) -> Vec<&Port> {
        match self {
            NodeConfig::Input(_) => Vec::new(),
            NodeConfig::Output(cfg) => cfg.inputs.iter().collect(),
            NodeConfig::ScriptFunction(cfg) => cfg.inputs.iter().collect(),
            NodeConfig::TextTemplate(cfg) => cfg.inputs.iter().collect(),
            NodeConfig::ChatMessage(cfg) => {
                let mut ports: Vec<&Port> = cfg.messages_input.iter().collect();
                ports.extend(cfg.template_inputs.iter());
                ports
            }
            NodeConfig::ChatCompletion(cfg) => cfg.messages_input.iter().collect(),
            NodeConfig::Inference(cfg) => cfg.inputs.iter().collect(),
        }
    }

    /// Declared output ports, in declaration order.
    pub fn output_ports(&self) -> Vec<&Port> {
        match self {
            NodeConfig::Input(cfg) => cfg.outputs.iter().collect(),
            NodeConfig::Output(_) => Vec::new(),
            NodeConfig::ScriptFunction(cfg) => vec![&cfg.output],
            NodeConfig::TextTemplate(cfg) => vec![&cfg.output],
            NodeConfig::ChatMessage(cfg) => vec![&cfg.message_output, &cfg.messages_output],
            NodeConfig::ChatCompletion(cfg) => {
                vec![&cfg.content_output, &cfg.message_output, &cfg.messages_output]
            }
            NodeConfig::Inference(cfg) => vec![&cfg.output],
        }
    }
}
