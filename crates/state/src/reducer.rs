use std::collections::BTreeMap;

use serde_json::{json, Value};
use tidewatch_primitives::{EventRecord, WatchedContract};

use crate::error::StateResult;

/// Aggregated entity state of one contract.
///
/// Owned by a single processor worker; there is no shared ambient state.
/// Flushing to a diff happens through an explicit snapshot of the entities a
/// block touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractState {
    entities: BTreeMap<String, Value>,
}

impl ContractState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from a full-aggregate payload (init or checkpoint).
    pub fn from_entities(entities: BTreeMap<String, Value>) -> Self {
        Self { entities }
    }

    pub fn entity(&self, id: &str) -> Option<&Value> {
        self.entities.get(id)
    }

    pub fn upsert(&mut self, id: impl Into<String>, value: Value) {
        self.entities.insert(id.into(), value);
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.entities.remove(id)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &BTreeMap<String, Value> {
        &self.entities
    }

    /// Applies a diff payload on top of this state. `null` entries delete.
    pub fn apply_diff(&mut self, changes: &BTreeMap<String, Value>) {
        for (id, value) in changes {
            if value.is_null() {
                self.entities.remove(id);
            } else {
                self.entities.insert(id.clone(), value.clone());
            }
        }
    }

    /// Snapshot of the named entities, with `null` marking deletions.
    pub fn collect_changes<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a String>,
    ) -> BTreeMap<String, Value> {
        ids.into_iter()
            .map(|id| {
                let value = self.entities.get(id).cloned().unwrap_or(Value::Null);
                (id.clone(), value)
            })
            .collect()
    }
}

/// Turns parsed events into entity updates.
///
/// Implementations come from watcher code generation; the pipeline only
/// needs the touched entity ids to know what a block changed.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait EventReducer: Send + Sync + 'static {
    /// Applies one event to the contract's state, returning the ids of the
    /// entities it touched.
    fn apply(
        &self,
        contract: &WatchedContract,
        event: &EventRecord,
        state: &mut ContractState,
    ) -> StateResult<Vec<String>>;
}

/// Fallback reducer keeping one tally entity per event name.
///
/// Useful for generic watchers and tests; generated watchers replace it.
#[derive(Debug, Clone, Default)]
pub struct EventTallyReducer;

impl EventReducer for EventTallyReducer {
    fn apply(
        &self,
        _contract: &WatchedContract,
        event: &EventRecord,
        state: &mut ContractState,
    ) -> StateResult<Vec<String>> {
        let id = event.event_name.clone();
        let count = state
            .entity(&id)
            .and_then(|entity| entity.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        state.upsert(
            id.clone(),
            json!({
                "id": id.clone(),
                "count": count + 1,
                "latest": event.event_info.clone(),
            }),
        );
        Ok(vec![id])
    }
}
