//! Common test utilities: flow builders and fake collaborators.
#![allow(dead_code)]
use async_trait::async_trait;
use futures::StreamExt;
use nagare::prelude::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn port(id: &str, name: &str) -> Port {
    Port {
        id: id.to_string(),
        name: name.to_string(),
        value_type: None,
    }
}

pub fn edge(id: &str, source: &str, out: &str, target: &str, inp: &str) -> FlowEdge {
    FlowEdge {
        id: id.to_string(),
        source_node_id: source.to_string(),
        source_output_port_id: out.to_string(),
        target_node_id: target.to_string(),
        target_input_port_id: inp.to_string(),
    }
}

fn input_node(id: &str, port_id: &str, name: &str) -> FlowNode {
    FlowNode {
        id: id.to_string(),
        config: NodeConfig::Input(InputNodeConfig {
            outputs: vec![port(port_id, name)],
            values: VariableValueMap::new(),
        }),
    }
}

fn output_node(id: &str, ports: Vec<Port>) -> FlowNode {
    FlowNode {
        id: id.to_string(),
        config: NodeConfig::Output(OutputNodeConfig { inputs: ports }),
    }
}

fn script_node(id: &str, inputs: Vec<Port>, output: Port, code: &str) -> FlowNode {
    FlowNode {
        id: id.to_string(),
        config: NodeConfig::ScriptFunction(ScriptFunctionNodeConfig {
            inputs,
            output,
            code: code.to_string(),
        }),
    }
}

/// `Input(x) -> Output` with no transform.
pub fn identity_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-x", "x"),
            output_node("out", vec![port("out-x", "x")]),
        ],
        edges: vec![edge("e1", "in", "in-x", "out", "out-x")],
    }
}

/// `Input(x) -> ScriptFunction(code) -> Output`.
pub fn script_flow(code: &str) -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-x", "x"),
            script_node(
                "fn",
                vec![port("fn-x", "x")],
                port("fn-out", "result"),
                code,
            ),
            output_node("out", vec![port("out-result", "result")]),
        ],
        edges: vec![
            edge("e1", "in", "in-x", "fn", "fn-x"),
            edge("e2", "fn", "fn-out", "out", "out-result"),
        ],
    }
}

/// `Input(topic) -> TextTemplate("I like {{topic}}") -> Output`.
pub fn template_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-topic", "topic"),
            FlowNode {
                id: "tpl".to_string(),
                config: NodeConfig::TextTemplate(TextTemplateNodeConfig {
                    inputs: vec![port("tpl-topic", "topic")],
                    output: port("tpl-out", "text"),
                    template: "I like {{topic}}".to_string(),
                }),
            },
            output_node("out", vec![port("out-text", "text")]),
        ],
        edges: vec![
            edge("e1", "in", "in-topic", "tpl", "tpl-topic"),
            edge("e2", "tpl", "tpl-out", "out", "out-text"),
        ],
    }
}

/// Diamond: `Input -> {A, B} -> C -> Output`.
pub fn diamond_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-x", "x"),
            script_node("a", vec![port("a-x", "x")], port("a-out", "a"), "x + 1"),
            script_node("b", vec![port("b-x", "x")], port("b-out", "b"), "x + 2"),
            script_node(
                "c",
                vec![port("c-a", "a"), port("c-b", "b")],
                port("c-out", "sum"),
                "a + b",
            ),
            output_node("out", vec![port("out-sum", "sum")]),
        ],
        edges: vec![
            edge("e1", "in", "in-x", "a", "a-x"),
            edge("e2", "in", "in-x", "b", "b-x"),
            edge("e3", "a", "a-out", "c", "c-a"),
            edge("e4", "b", "b-out", "c", "c-b"),
            edge("e5", "c", "c-out", "out", "out-sum"),
        ],
    }
}

/// An `Input -> Output` pair next to a two-node cycle that can never become
/// ready.
pub fn partially_cyclic_flow() -> FlowDefinition {
    let mut flow = identity_flow();
    flow.nodes.push(script_node(
        "loop-a",
        vec![port("la-in", "v")],
        port("la-out", "v"),
        "v",
    ));
    flow.nodes.push(script_node(
        "loop-b",
        vec![port("lb-in", "v")],
        port("lb-out", "v"),
        "v",
    ));
    flow.edges.push(edge("c1", "loop-a", "la-out", "loop-b", "lb-in"));
    flow.edges.push(edge("c2", "loop-b", "lb-out", "loop-a", "la-in"));
    flow
}

/// `ChatCompletion -> Output(content, messages)`, no upstream history.
pub fn chat_completion_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            FlowNode {
                id: "chat".to_string(),
                config: NodeConfig::ChatCompletion(ChatCompletionNodeConfig {
                    messages_input: None,
                    model: "test-model".to_string(),
                    credential: "test-api".to_string(),
                    params: SamplingParams::default(),
                    content_output: port("chat-content", "content"),
                    message_output: port("chat-message", "message"),
                    messages_output: port("chat-messages", "messages"),
                }),
            },
            output_node(
                "out",
                vec![port("out-content", "content"), port("out-messages", "messages")],
            ),
        ],
        edges: vec![
            edge("e1", "chat", "chat-content", "out", "out-content"),
            edge("e2", "chat", "chat-messages", "out", "out-messages"),
        ],
    }
}

/// `Input(name) -> ChatMessage("Hi {{name}}") -> Output(messages)`.
pub fn chat_message_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-name", "name"),
            FlowNode {
                id: "cm".to_string(),
                config: NodeConfig::ChatMessage(ChatMessageNodeConfig {
                    messages_input: None,
                    template_inputs: vec![port("cm-name", "name")],
                    role: "user".to_string(),
                    template: "Hi {{name}}".to_string(),
                    message_output: port("cm-message", "message"),
                    messages_output: port("cm-messages", "messages"),
                }),
            },
            output_node("out", vec![port("out-messages", "messages")]),
        ],
        edges: vec![
            edge("e1", "in", "in-name", "cm", "cm-name"),
            edge("e2", "cm", "cm-messages", "out", "out-messages"),
        ],
    }
}

/// `Input(x) -> Inference("{{x}}") -> Output`.
pub fn inference_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            input_node("in", "in-x", "x"),
            FlowNode {
                id: "inf".to_string(),
                config: NodeConfig::Inference(InferenceNodeConfig {
                    inputs: vec![port("inf-x", "x")],
                    template: "{{x}}".to_string(),
                    model: "test-model".to_string(),
                    credential: "test-api".to_string(),
                    params: SamplingParams::default(),
                    output: port("inf-out", "result"),
                }),
            },
            output_node("out", vec![port("out-result", "result")]),
        ],
        edges: vec![
            edge("e1", "in", "in-x", "inf", "inf-x"),
            edge("e2", "inf", "inf-out", "out", "out-result"),
        ],
    }
}

pub fn seed(pairs: &[(&str, Value)]) -> VariableValueMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// --- Fake collaborators ---

/// Credential store that records missing-credential notifications.
#[derive(Default)]
pub struct RecordingCredentials {
    pub secret: Option<String>,
    pub missing: AtomicUsize,
}

impl RecordingCredentials {
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Some(secret.to_string()),
            missing: AtomicUsize::new(0),
        }
    }
}

impl CredentialStore for RecordingCredentials {
    fn credential(&self, _kind: &str) -> Option<String> {
        self.secret.clone()
    }

    fn notify_missing(&self, _kind: &str) {
        self.missing.fetch_add(1, Ordering::SeqCst);
    }
}

/// Chat client that replays a fixed chunk script, optionally failing the
/// stream after the scripted chunks.
pub struct ScriptedChatClient {
    pub chunks: Vec<ChatChunk>,
    pub fail_after: bool,
    pub calls: AtomicUsize,
}

impl ScriptedChatClient {
    pub fn new(parts: &[&str]) -> Self {
        let chunks = parts
            .iter()
            .enumerate()
            .map(|(i, part)| ChatChunk {
                role_delta: (i == 0).then(|| "assistant".to_string()),
                content_delta: part.to_string(),
            })
            .collect();
        Self {
            chunks,
            fail_after: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_after(parts: &[&str]) -> Self {
        let mut client = Self::new(parts);
        client.fail_after = true;
        client
    }

    /// For chunk shapes `new` cannot express, e.g. role-only chunks.
    pub fn from_chunks(chunks: Vec<ChatChunk>) -> Self {
        Self {
            chunks,
            fail_after: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatModelClient for ScriptedChatClient {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<ChatChunkStream, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Result<ChatChunk, HandlerError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if self.fail_after {
            items.push(Err(HandlerError::Transport("connection dropped".to_string())));
        }
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Tracks how many inference calls overlap, to observe concurrency caps.
#[derive(Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Inference client that echoes the prompt back, with an optional pause and
/// a poison prompt that fails the call. Records the prompts in the order
/// calls entered `infer`.
pub struct EchoInferenceClient {
    pub gauge: Arc<ConcurrencyGauge>,
    pub pause: Option<Duration>,
    pub poison: Option<String>,
    entries: Mutex<Vec<String>>,
}

impl EchoInferenceClient {
    pub fn new() -> Self {
        Self {
            gauge: Arc::new(ConcurrencyGauge::default()),
            pause: None,
            poison: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entry_order(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn paused(pause: Duration) -> Self {
        Self {
            pause: Some(pause),
            ..Self::new()
        }
    }

    pub fn poisoned(poison: &str) -> Self {
        Self {
            poison: Some(poison.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl InferenceClient for EchoInferenceClient {
    async fn infer(&self, request: InferenceRequest) -> Result<Value, HandlerError> {
        self.entries.lock().unwrap().push(request.prompt.clone());
        self.gauge.enter();
        if let Some(pause) = self.pause {
            tokio::time::sleep(pause).await;
        }
        self.gauge.exit();
        if self.poison.as_deref() == Some(request.prompt.as_str()) {
            return Err(HandlerError::RemoteCall("bad prompt".to_string()));
        }
        Ok(json!(request.prompt))
    }
}

// --- Event helpers ---

/// Node ids of `NodeRunStateChanged { is_running: true }` events, in order.
pub fn dispatch_order(events: &[RunEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::NodeRunStateChanged {
                node_id,
                is_running: true,
                ..
            } => Some(node_id.clone()),
            _ => None,
        })
        .collect()
}

/// All value-change deltas, in emission order.
pub fn value_changes(events: &[RunEvent]) -> Vec<VariableValueMap> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::VariableValueChanged { changes } => Some(changes.clone()),
            _ => None,
        })
        .collect()
}
