use crate::flow::VariableId;
use ahash::AHashMap;
use serde_json::Value;

/// Mapping from port id to a JSON-compatible value. Used both for the full
/// store contents and for the partial deltas handlers emit.
pub type VariableValueMap = AHashMap<VariableId, Value>;

/// The mutable value map for one run.
///
/// Seeded with caller-supplied inputs at creation, written to by the
/// scheduler as handlers produce deltas, and discarded at run end. A store
/// is exclusively owned by one scheduler invocation; batch replays each
/// allocate their own.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: VariableValueMap,
}

impl VariableStore {
    pub fn new(seed: VariableValueMap) -> Self {
        Self { values: seed }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// Merges a handler-produced delta into the store, overwriting any
    /// previous value per id.
    pub fn apply(&mut self, delta: &VariableValueMap) {
        for (id, value) in delta {
            self.values.insert(id.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> VariableValueMap {
        self.values
    }
}
