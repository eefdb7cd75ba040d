//! Sandboxed script evaluation for `ScriptFunctionNode`.
//!
//! User-supplied code runs in an embedded rhai engine with a bounded
//! capability surface: no ambient I/O, capped operation count, capped call
//! depth. The connected input values are bound into the scope under their
//! port display names.

use super::{DeltaSink, NodeHandler, ResolvedInputs};
use crate::error::HandlerError;
use crate::flow::{FlowNode, NodeConfig};
use async_trait::async_trait;
use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

const MAX_OPERATIONS: u64 = 100_000;
const MAX_CALL_LEVELS: usize = 32;

pub struct ScriptFunctionHandler;

#[async_trait]
impl NodeHandler for ScriptFunctionHandler {
    async fn run(
        &self,
        node: FlowNode,
        inputs: ResolvedInputs,
        sink: DeltaSink,
    ) -> Result<(), HandlerError> {
        let NodeConfig::ScriptFunction(cfg) = &node.config else {
            return Err(HandlerError::ConfigMismatch(node.id));
        };

        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_LEVELS);

        let mut scope = Scope::new();
        for port in &cfg.inputs {
            scope.push_dynamic(port.name.clone(), json_to_dynamic(inputs.value(&port.id)));
        }

        let result = engine
            .eval_with_scope::<Dynamic>(&mut scope, &cfg.code)
            .map_err(|e| HandlerError::Script(e.to_string()))?;

        sink.send_one(cfg.output.id.clone(), dynamic_to_json(&result));
        Ok(())
    }
}

pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => {
            let array: rhai::Array = items.iter().map(json_to_dynamic).collect();
            Dynamic::from(array)
        }
        Value::Object(fields) => {
            let mut map = rhai::Map::new();
            for (k, v) in fields {
                map.insert(k.clone().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

pub(crate) fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return serde_json::json!(b);
    }
    if let Some(i) = value.clone().try_cast::<i64>() {
        return serde_json::json!(i);
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return serde_json::json!(f);
    }
    if let Some(s) = value.clone().try_cast::<String>() {
        return serde_json::json!(s);
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        let items: Vec<Value> = array.iter().map(dynamic_to_json).collect();
        return Value::Array(items);
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let mut fields = serde_json::Map::new();
        for (k, v) in map.iter() {
            fields.insert(k.to_string(), dynamic_to_json(v));
        }
        return Value::Object(fields);
    }
    // Fallback to the display form for exotic rhai types.
    serde_json::json!(value.to_string())
}
