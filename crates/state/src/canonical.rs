//! Canonical JSON encoding for content addressing.
//!
//! Two rules make the encoding insertion-order independent: object keys are
//! emitted sorted (serde_json's default `Map` is a `BTreeMap`, which the
//! build relies on), and arrays whose elements are objects carrying an `id`
//! field are sorted by that id before serialization.

use serde_json::Value;

use crate::error::{StateError, StateResult};

/// Serializes a JSON value canonically: sorted object keys, entity arrays
/// sorted by `id`, compact separators. Byte-identical output for logically
/// equal inputs regardless of construction order.
pub fn canonical_json_bytes(value: &Value) -> StateResult<Vec<u8>> {
    let normalized = normalize(value.clone());
    serde_json::to_vec(&normalized).map_err(StateError::serialization)
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            // Re-inserting into serde_json::Map sorts by key.
            let map = map
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect();
            Value::Object(map)
        }
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize).collect();
            if items.iter().all(is_entity_ref) {
                items.sort_by(|a, b| entity_id(a).cmp(&entity_id(b)));
            }
            Value::Array(items)
        }
        other => other,
    }
}

fn is_entity_ref(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("id"))
}

fn entity_id(value: &Value) -> String {
    value
        .get("id")
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
