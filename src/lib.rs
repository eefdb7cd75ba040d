//! # Nagare - Flow Execution Engine
//!
//! **Nagare** executes "flows": directed graphs of typed nodes (inputs, text
//! templates, sandboxed script functions, chat and inference calls, outputs)
//! whose edges carry named values between node ports — the graphs a visual
//! flow editor produces. The engine determines a valid execution order,
//! dispatches each node to a kind-specific async handler, propagates values
//! along edges, and reports incremental progress (including token-by-token
//! streaming from model calls) to subscribers as an ordered event stream.
//!
//! ## Core Workflow
//!
//! 1. **Load your data**: parse whatever shape your editor saves, and
//!    implement [`flow::IntoFlow`] to translate it into the canonical
//!    [`flow::FlowDefinition`] (or build one directly).
//! 2. **Wire collaborators**: build a [`handler::HandlerRegistry`] with the
//!    credential store and remote model clients your flow needs.
//! 3. **Run**: create a [`scheduler::Scheduler`] and run it against a seed
//!    of input values, subscribing to its [`event::RunEvent`] stream.
//! 4. **Replay in batch**: wrap the scheduler in a [`batch::BatchRunner`]
//!    to evaluate the same flow over many dataset rows under a concurrency
//!    cap.
//!
//! ## Quick Start
//!
//! ```rust
//! use nagare::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn port(id: &str, name: &str) -> Port {
//!     Port { id: id.to_string(), name: name.to_string(), value_type: None }
//! }
//!
//! // Input("topic") -> TextTemplate("I like {{topic}}") -> Output
//! let flow = FlowDefinition {
//!     nodes: vec![
//!         FlowNode {
//!             id: "in".to_string(),
//!             config: NodeConfig::Input(nagare::flow::InputNodeConfig {
//!                 outputs: vec![port("in-topic", "topic")],
//!                 values: VariableValueMap::new(),
//!             }),
//!         },
//!         FlowNode {
//!             id: "tpl".to_string(),
//!             config: NodeConfig::TextTemplate(nagare::flow::TextTemplateNodeConfig {
//!                 inputs: vec![port("tpl-topic", "topic")],
//!                 output: port("tpl-out", "text"),
//!                 template: "I like {{topic}}".to_string(),
//!             }),
//!         },
//!         FlowNode {
//!             id: "out".to_string(),
//!             config: NodeConfig::Output(nagare::flow::OutputNodeConfig {
//!                 inputs: vec![port("out-text", "text")],
//!             }),
//!         },
//!     ],
//!     edges: vec![
//!         FlowEdge {
//!             id: "e1".to_string(),
//!             source_node_id: "in".to_string(),
//!             source_output_port_id: "in-topic".to_string(),
//!             target_node_id: "tpl".to_string(),
//!             target_input_port_id: "tpl-topic".to_string(),
//!         },
//!         FlowEdge {
//!             id: "e2".to_string(),
//!             source_node_id: "tpl".to_string(),
//!             source_output_port_id: "tpl-out".to_string(),
//!             target_node_id: "out".to_string(),
//!             target_input_port_id: "out-text".to_string(),
//!         },
//!     ],
//! };
//!
//! let registry = Arc::new(HandlerRegistry::builder().build());
//! let scheduler = Scheduler::new(Arc::new(flow), registry);
//!
//! let mut seed = VariableValueMap::new();
//! seed.insert("in-topic".to_string(), json!("cats"));
//!
//! let (_events, result) = tokio_test::block_on(scheduler.run_collect(seed));
//! let summary = result.unwrap();
//! assert_eq!(summary.outputs["out-text"], json!("I like cats"));
//! ```

pub mod batch;
pub mod client;
pub mod error;
pub mod event;
pub mod flow;
pub mod graph;
pub mod handler;
pub mod prelude;
pub mod scheduler;
pub mod store;
