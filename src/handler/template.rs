//! `{{name}}`-style template rendering over a dictionary of input values.

use super::{DeltaSink, NodeHandler, ResolvedInputs};
use crate::error::HandlerError;
use crate::flow::{FlowNode, NodeConfig};
use ahash::AHashMap;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Renders the node's template against its connected input values (keyed by
/// port display name) and emits the rendered string as its single output.
pub struct TextTemplateHandler;

#[async_trait]
impl NodeHandler for TextTemplateHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::TextTemplate(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let scope = inputs.scope(&cfg.inputs);
        let rendered = render_template(&cfg.template, &scope)?;
        sink.send_one(cfg.output.id.clone(), json!(rendered));
        Ok(())
    }
}

/// Interpolates `{{name}}` placeholders from the scope. Missing names and
/// `null` values resolve to the empty string; only a malformed template (an
/// unterminated placeholder) is an error.
pub fn render_template(
    template: &str,
    scope: &AHashMap<String, Value>,
) -> Result<String, HandlerError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or_else(|| {
            HandlerError::Template(format!(
                "unterminated placeholder at byte {}",
                template.len() - rest.len() + open
            ))
        })?;
        let name = after_open[..close].trim();
        if let Some(value) = scope.get(name) {
            rendered.push_str(&value_to_text(value));
        }
        rest = &after_open[close + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

/// Textual form of a value for interpolation: strings render bare, `null`
/// renders empty, everything else renders as JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
