use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Hash identifying a block on the upstream chain.
pub type BlockHash = B256;

/// A block identifier combining hash and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNumHash {
    /// Block hash
    pub hash: BlockHash,
    /// Block number
    pub number: u64,
}

impl BlockNumHash {
    pub fn new(hash: BlockHash, number: u64) -> Self {
        Self { hash, number }
    }
}

/// A block as tracked by the indexing pipeline.
///
/// Created by the indexer with `num_processed_events = 0`; the processor is
/// the only mutator of the progress fields, and the reorg handler the only
/// mutator of `is_pruned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub block_hash: BlockHash,
    pub parent_hash: BlockHash,
    pub block_number: u64,
    pub block_timestamp: u64,
    /// Total events fetched for this block at indexing time.
    pub num_events: u64,
    /// Events applied to derived state so far.
    pub num_processed_events: u64,
    /// Chain-assigned log index of the last applied event, if any.
    pub last_processed_event_index: Option<u64>,
    pub is_complete: bool,
    pub is_pruned: bool,
    /// Unix timestamp (seconds) at which the row was created.
    pub created_at: u64,
}

impl BlockRecord {
    /// A freshly indexed block with no processing progress.
    pub fn new_indexed(
        block_hash: BlockHash,
        parent_hash: BlockHash,
        block_number: u64,
        block_timestamp: u64,
        num_events: u64,
        created_at: u64,
    ) -> Self {
        Self {
            block_hash,
            parent_hash,
            block_number,
            block_timestamp,
            num_events,
            num_processed_events: 0,
            last_processed_event_index: None,
            is_complete: false,
            is_pruned: false,
            created_at,
        }
    }

    pub fn num_hash(&self) -> BlockNumHash {
        BlockNumHash::new(self.block_hash, self.block_number)
    }

    /// Whether every fetched event has been applied.
    pub fn all_events_processed(&self) -> bool {
        self.num_processed_events == self.num_events
    }
}
