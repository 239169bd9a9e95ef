use std::path::PathBuf;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::defaults::*;

/// Top-level daemon configuration, loaded from toml.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Watched contracts seeded at startup. The set in the database is
    /// add-only; entries present there but absent here are kept.
    #[serde(default)]
    pub contracts: Vec<ContractConfig>,
}

/// Upstream chain RPC settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// HTTP endpoint of the upstream chain client.
    pub url: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_rpc_cache_capacity")]
    pub cache_capacity: usize,
    /// Fetch storage proofs via `eth_getProof` alongside `eth_getStorageAt`.
    #[serde(default)]
    pub fetch_proofs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// Data directory; the sled store lives under `<datadir>/sled`.
    pub datadir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_wait_ms: u64,
    pub max_blocks_fetch: u64,
    pub max_reorg_depth: u64,
    pub max_backfill_depth: u64,
    pub prune_depth: u64,
    /// Blocks between automatic checkpoints; 0 disables the cadence.
    pub checkpoint_interval: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_wait_ms: DEFAULT_POLL_WAIT_MS,
            max_blocks_fetch: DEFAULT_MAX_BLOCKS_FETCH,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            max_backfill_depth: DEFAULT_MAX_BACKFILL_DEPTH,
            prune_depth: DEFAULT_PRUNE_DEPTH,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub events_workers: usize,
    pub block_workers: usize,
    pub high_water_mark: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            events_workers: DEFAULT_EVENTS_WORKERS,
            block_workers: DEFAULT_BLOCK_WORKERS,
            high_water_mark: DEFAULT_QUEUE_HIGH_WATER,
            max_attempts: DEFAULT_JOB_MAX_ATTEMPTS,
            retry_base_ms: DEFAULT_JOB_RETRY_BASE_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter directive; falls back to `RUST_LOG`, then `info`.
    pub filter: Option<String>,
    pub json_format: bool,
}

/// A watched contract as declared in the config toml.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub address: Address,
    pub kind: String,
    pub starting_block: u64,
    #[serde(default)]
    pub checkpoint: bool,
}

fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_rpc_cache_capacity() -> usize {
    DEFAULT_RPC_CACHE_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let raw = r#"
            [rpc]
            url = "http://localhost:8545"

            [db]
            datadir = "/tmp/tidewatch"
        "#;

        let config: Config = toml::from_str(raw).expect("minimal config parses");
        assert_eq!(config.rpc.request_timeout_ms, DEFAULT_RPC_TIMEOUT_MS);
        assert_eq!(config.sync.prune_depth, DEFAULT_PRUNE_DEPTH);
        assert_eq!(config.queue.events_workers, DEFAULT_EVENTS_WORKERS);
        assert!(config.contracts.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let raw = r#"
            [rpc]
            url = "http://localhost:8545"
            request_timeout_ms = 5000
            fetch_proofs = true

            [db]
            datadir = "/var/lib/tidewatch"

            [sync]
            poll_wait_ms = 1000
            max_blocks_fetch = 8
            max_reorg_depth = 16
            max_backfill_depth = 32
            prune_depth = 12
            checkpoint_interval = 500

            [queue]
            events_workers = 1
            block_workers = 4
            high_water_mark = 128
            max_attempts = 3
            retry_base_ms = 250

            [logging]
            filter = "tidewatch=debug"
            json_format = true

            [[contracts]]
            address = "0x00000000000000000000000000000000000000aa"
            kind = "erc20"
            starting_block = 100
            checkpoint = true
        "#;

        let config: Config = toml::from_str(raw).expect("full config parses");
        assert!(config.rpc.fetch_proofs);
        assert_eq!(config.sync.checkpoint_interval, 500);
        assert_eq!(config.contracts.len(), 1);
        assert_eq!(config.contracts[0].starting_block, 100);
        assert!(config.contracts[0].checkpoint);
    }
}
