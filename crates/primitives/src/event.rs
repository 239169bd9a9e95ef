use alloy_primitives::{Address, B256};

use crate::block::BlockHash;

/// A contract event observed in a block.
///
/// Events are write-once: `(block_hash, index)` is unique and rows are never
/// updated after insertion. `index` is the chain-assigned log index.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub block_hash: BlockHash,
    pub index: u64,
    pub tx_hash: B256,
    pub contract: Address,
    pub event_name: String,
    /// Decoded event arguments as produced by the ABI oracle.
    pub event_info: serde_json::Value,
    /// Raw log context (topics, data, receipt info) kept for audit.
    pub extra_info: serde_json::Value,
    /// Optional opaque inclusion proof.
    pub proof: Option<serde_json::Value>,
}
