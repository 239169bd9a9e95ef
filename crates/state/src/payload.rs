use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewatch_primitives::{StateKind, StateRecord};

use crate::error::{StateError, StateResult};

/// The `data` payload of a state record, in canonical JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub meta: PayloadMeta,
    /// Entity states keyed by entity id: the full aggregate for init and
    /// checkpoint records, only the changed entities for diffs.
    pub state: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub block: PayloadBlockRef,
    /// Checksummed contract address.
    pub contract: String,
    pub kind: StateKind,
    /// CID of the previous record of this contract; empty for init.
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadBlockRef {
    pub cid: String,
    pub hash: String,
    pub number: u64,
}

impl StatePayload {
    /// Parses a stored record's payload back.
    pub fn parse(record: &StateRecord) -> StateResult<Self> {
        serde_json::from_slice(&record.data)
            .map_err(|err| StateError::InvalidPayload(err.to_string()))
    }
}
