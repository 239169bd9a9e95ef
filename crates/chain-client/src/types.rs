use alloy_primitives::{B256, U256};

/// Normalized block header fields the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHeader {
    pub hash: B256,
    pub parent_hash: B256,
    pub number: u64,
    pub timestamp: u64,
}

/// A header together with its byte-exact consensus RLP encoding.
///
/// The RLP is what content addressing hashes; it must match the upstream
/// chain's encoding byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullBlock {
    pub header: ChainHeader,
    pub header_rlp: Vec<u8>,
}

/// Result of a storage query: the value plus an opaque proof blob when the
/// adapter supports proofs.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSlot {
    pub value: U256,
    pub proof: Option<serde_json::Value>,
}
