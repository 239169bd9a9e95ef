use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::block::BlockHash;

/// Content identifier of a state record.
///
/// A deterministic hash over the record's kind, parentage, block, contract,
/// and canonicalized payload. The empty CID is the parent sentinel of `init`
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    pub fn new(inner: impl Into<String>) -> Self {
        Self(inner.into())
    }

    /// The parent sentinel used by `init` records.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a materialized state record.
///
/// Closed set: every consumer (materializer, promoter, CID parenting) matches
/// exhaustively so a new kind is a compile-time obligation across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// First record for a contract at its starting block.
    Init,
    /// Incremental changes, still in the unpruned region.
    DiffStaged,
    /// Incremental changes whose block has entered the pruned region.
    Diff,
    /// Full aggregated state, compacting the diff chain.
    Checkpoint,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Init => "init",
            StateKind::DiffStaged => "diff_staged",
            StateKind::Diff => "diff",
            StateKind::Checkpoint => "checkpoint",
        }
    }

    /// Kinds deleted when rewinding past their block during a reorg.
    pub fn is_rewindable(&self) -> bool {
        match self {
            StateKind::Diff | StateKind::DiffStaged => true,
            StateKind::Init | StateKind::Checkpoint => false,
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contract-scoped state snapshot keyed by (contract, block).
///
/// Append-only, except for the `DiffStaged -> Diff` promotion which changes
/// the kind and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub block_hash: BlockHash,
    pub block_number: u64,
    pub contract: Address,
    pub cid: Cid,
    pub kind: StateKind,
    /// Canonical JSON payload (see the state crate for the canonical form).
    pub data: Vec<u8>,
}
