use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Opaque contract kind tag used to select an ABI parser.
///
/// The indexing core never inspects the tag beyond equality; the ABI oracle
/// owns its meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractKind(String);

impl ContractKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContractKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contract whose events the pipeline tracks.
///
/// The watched set is add-only during operation; removal requires an
/// administrative reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedContract {
    pub address: Address,
    /// First block at which state is materialized for this contract.
    pub starting_block: u64,
    pub kind: ContractKind,
    /// Whether automatic checkpointing applies to this contract.
    pub checkpoint: bool,
}
