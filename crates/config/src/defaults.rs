//! Default tuning values, overridable through the config toml.

/// Upstream RPC request timeout.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

/// Entries kept in the chain-client read cache.
pub const DEFAULT_RPC_CACHE_CAPACITY: usize = 4_096;

/// Ms to wait between upstream head polls.
pub const DEFAULT_POLL_WAIT_MS: u64 = 2_000;

/// Number of upstream blocks to pull per head-follower cycle.
pub const DEFAULT_MAX_BLOCKS_FETCH: u64 = 16;

/// Walking back further than this during reorg resolution is fatal.
pub const DEFAULT_MAX_REORG_DEPTH: u64 = 64;

/// Parent backfill gives up after this many missing ancestors.
pub const DEFAULT_MAX_BACKFILL_DEPTH: u64 = 128;

/// Heights at or below `chain_head - prune_depth` are considered final.
pub const DEFAULT_PRUNE_DEPTH: u64 = 32;

/// Automatic checkpoint cadence in blocks; 0 disables.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 2_000;

/// Worker pool sizes. The `events` pool defaults to 1 to preserve
/// per-chain-tip ordering.
pub const DEFAULT_EVENTS_WORKERS: usize = 1;
pub const DEFAULT_BLOCK_WORKERS: usize = 2;

/// Enqueues wait while queue depth exceeds this.
pub const DEFAULT_QUEUE_HIGH_WATER: u64 = 512;

/// Attempts before a job is poisoned.
pub const DEFAULT_JOB_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential job retry backoff.
pub const DEFAULT_JOB_RETRY_BASE_MS: u64 = 500;
