use alloy_primitives::B256;

/// The two durable queues of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    /// One job per block discovered upstream; drives the indexer.
    Block,
    /// One job per unprocessed block; drives the processor.
    Events,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Block => "block",
            QueueName::Events => "events",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage key of a queued job.
///
/// Jobs are scanned in `(priority, seq)` key order; higher priority first,
/// FIFO within a priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub priority: u8,
    pub seq: u64,
}

/// A durable queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub block_hash: B256,
    pub block_number: u64,
    pub priority: u8,
    /// Completed delivery attempts.
    pub attempts: u32,
    /// Unix ms before which the job must not be delivered again.
    pub next_retry_at_ms: u64,
    pub enqueued_at_ms: u64,
}

impl JobRecord {
    pub fn new(block_hash: B256, block_number: u64, priority: u8, enqueued_at_ms: u64) -> Self {
        Self {
            block_hash,
            block_number,
            priority,
            attempts: 0,
            next_retry_at_ms: 0,
            enqueued_at_ms,
        }
    }
}
