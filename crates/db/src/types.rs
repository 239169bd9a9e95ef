//! Borsh serialization mirrors of the core types.
//!
//! The mirrors keep the database encoding independent of the in-memory
//! types: hashes and addresses become fixed byte arrays, JSON payloads are
//! stored as strings, and `StateKind` becomes a tagged byte.

use alloy_primitives::{Address, B256};
use borsh::{BorshDeserialize, BorshSerialize};
use tidewatch_primitives::{
    BlockNumHash, BlockRecord, Cid, ContractKind, EventRecord, StateKind, StateRecord,
    StateSyncStatus, SyncStatus, WatchedContract,
};

use crate::{jobs::JobRecord, DbError};

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbBlockRecord {
    pub(crate) block_hash: [u8; 32],
    pub(crate) parent_hash: [u8; 32],
    pub(crate) block_number: u64,
    pub(crate) block_timestamp: u64,
    pub(crate) num_events: u64,
    pub(crate) num_processed_events: u64,
    pub(crate) last_processed_event_index: Option<u64>,
    pub(crate) is_complete: bool,
    pub(crate) is_pruned: bool,
    pub(crate) created_at: u64,
}

impl From<&BlockRecord> for DbBlockRecord {
    fn from(value: &BlockRecord) -> Self {
        Self {
            block_hash: value.block_hash.0,
            parent_hash: value.parent_hash.0,
            block_number: value.block_number,
            block_timestamp: value.block_timestamp,
            num_events: value.num_events,
            num_processed_events: value.num_processed_events,
            last_processed_event_index: value.last_processed_event_index,
            is_complete: value.is_complete,
            is_pruned: value.is_pruned,
            created_at: value.created_at,
        }
    }
}

impl From<DbBlockRecord> for BlockRecord {
    fn from(value: DbBlockRecord) -> Self {
        Self {
            block_hash: B256::new(value.block_hash),
            parent_hash: B256::new(value.parent_hash),
            block_number: value.block_number,
            block_timestamp: value.block_timestamp,
            num_events: value.num_events,
            num_processed_events: value.num_processed_events,
            last_processed_event_index: value.last_processed_event_index,
            is_complete: value.is_complete,
            is_pruned: value.is_pruned,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbEventRecord {
    pub(crate) block_hash: [u8; 32],
    pub(crate) index: u64,
    pub(crate) tx_hash: [u8; 32],
    pub(crate) contract: [u8; 20],
    pub(crate) event_name: String,
    /// JSON, serialized to text for Borsh.
    pub(crate) event_info: String,
    pub(crate) extra_info: String,
    pub(crate) proof: Option<String>,
}

impl TryFrom<&EventRecord> for DbEventRecord {
    type Error = DbError;

    fn try_from(value: &EventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            block_hash: value.block_hash.0,
            index: value.index,
            tx_hash: value.tx_hash.0,
            contract: value.contract.0 .0,
            event_name: value.event_name.clone(),
            event_info: serde_json::to_string(&value.event_info).map_err(DbError::codec)?,
            extra_info: serde_json::to_string(&value.extra_info).map_err(DbError::codec)?,
            proof: value
                .proof
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(DbError::codec)?,
        })
    }
}

impl TryFrom<DbEventRecord> for EventRecord {
    type Error = DbError;

    fn try_from(value: DbEventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            block_hash: B256::new(value.block_hash),
            index: value.index,
            tx_hash: B256::new(value.tx_hash),
            contract: Address::new(value.contract),
            event_name: value.event_name,
            event_info: serde_json::from_str(&value.event_info).map_err(DbError::codec)?,
            extra_info: serde_json::from_str(&value.extra_info).map_err(DbError::codec)?,
            proof: value
                .proof
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(DbError::codec)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbWatchedContract {
    pub(crate) address: [u8; 20],
    pub(crate) starting_block: u64,
    pub(crate) kind: String,
    pub(crate) checkpoint: bool,
}

impl From<&WatchedContract> for DbWatchedContract {
    fn from(value: &WatchedContract) -> Self {
        Self {
            address: value.address.0 .0,
            starting_block: value.starting_block,
            kind: value.kind.as_str().to_owned(),
            checkpoint: value.checkpoint,
        }
    }
}

impl From<DbWatchedContract> for WatchedContract {
    fn from(value: DbWatchedContract) -> Self {
        Self {
            address: Address::new(value.address),
            starting_block: value.starting_block,
            kind: ContractKind::new(value.kind),
            checkpoint: value.checkpoint,
        }
    }
}

pub(crate) fn state_kind_to_byte(kind: StateKind) -> u8 {
    match kind {
        StateKind::Init => 0,
        StateKind::DiffStaged => 1,
        StateKind::Diff => 2,
        StateKind::Checkpoint => 3,
    }
}

pub(crate) fn state_kind_from_byte(byte: u8) -> Result<StateKind, DbError> {
    match byte {
        0 => Ok(StateKind::Init),
        1 => Ok(StateKind::DiffStaged),
        2 => Ok(StateKind::Diff),
        3 => Ok(StateKind::Checkpoint),
        other => Err(DbError::Codec(format!("unknown state kind tag {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbStateRecord {
    pub(crate) block_hash: [u8; 32],
    pub(crate) block_number: u64,
    pub(crate) contract: [u8; 20],
    pub(crate) cid: String,
    pub(crate) kind: u8,
    pub(crate) data: Vec<u8>,
}

impl From<&StateRecord> for DbStateRecord {
    fn from(value: &StateRecord) -> Self {
        Self {
            block_hash: value.block_hash.0,
            block_number: value.block_number,
            contract: value.contract.0 .0,
            cid: value.cid.as_str().to_owned(),
            kind: state_kind_to_byte(value.kind),
            data: value.data.clone(),
        }
    }
}

impl TryFrom<DbStateRecord> for StateRecord {
    type Error = DbError;

    fn try_from(value: DbStateRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            block_hash: B256::new(value.block_hash),
            block_number: value.block_number,
            contract: Address::new(value.contract),
            cid: Cid::new(value.cid),
            kind: state_kind_from_byte(value.kind)?,
            data: value.data,
        })
    }
}

/// Secondary-index entry for state records, keyed by (block, seq).
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbStateIndexEntry {
    pub(crate) contract: [u8; 20],
    pub(crate) kind: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbBlockNumHash {
    pub(crate) hash: [u8; 32],
    pub(crate) number: u64,
}

impl From<BlockNumHash> for DbBlockNumHash {
    fn from(value: BlockNumHash) -> Self {
        Self {
            hash: value.hash.0,
            number: value.number,
        }
    }
}

impl From<DbBlockNumHash> for BlockNumHash {
    fn from(value: DbBlockNumHash) -> Self {
        Self {
            hash: B256::new(value.hash),
            number: value.number,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbSyncStatus {
    pub(crate) chain_head: Option<DbBlockNumHash>,
    pub(crate) latest_indexed: Option<DbBlockNumHash>,
    pub(crate) latest_canonical: Option<DbBlockNumHash>,
    pub(crate) initial_indexed: Option<DbBlockNumHash>,
}

impl From<&SyncStatus> for DbSyncStatus {
    fn from(value: &SyncStatus) -> Self {
        Self {
            chain_head: value.chain_head.map(Into::into),
            latest_indexed: value.latest_indexed.map(Into::into),
            latest_canonical: value.latest_canonical.map(Into::into),
            initial_indexed: value.initial_indexed.map(Into::into),
        }
    }
}

impl From<DbSyncStatus> for SyncStatus {
    fn from(value: DbSyncStatus) -> Self {
        Self {
            chain_head: value.chain_head.map(Into::into),
            latest_indexed: value.latest_indexed.map(Into::into),
            latest_canonical: value.latest_canonical.map(Into::into),
            initial_indexed: value.initial_indexed.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbStateSyncStatus {
    pub(crate) latest_indexed_block_number: Option<u64>,
    pub(crate) latest_checkpoint_block_number: Option<u64>,
}

impl From<&StateSyncStatus> for DbStateSyncStatus {
    fn from(value: &StateSyncStatus) -> Self {
        Self {
            latest_indexed_block_number: value.latest_indexed_block_number,
            latest_checkpoint_block_number: value.latest_checkpoint_block_number,
        }
    }
}

impl From<DbStateSyncStatus> for StateSyncStatus {
    fn from(value: DbStateSyncStatus) -> Self {
        Self {
            latest_indexed_block_number: value.latest_indexed_block_number,
            latest_checkpoint_block_number: value.latest_checkpoint_block_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub(crate) struct DbJobRecord {
    pub(crate) block_hash: [u8; 32],
    pub(crate) block_number: u64,
    pub(crate) priority: u8,
    pub(crate) attempts: u32,
    pub(crate) next_retry_at_ms: u64,
    pub(crate) enqueued_at_ms: u64,
}

impl From<&JobRecord> for DbJobRecord {
    fn from(value: &JobRecord) -> Self {
        Self {
            block_hash: value.block_hash.0,
            block_number: value.block_number,
            priority: value.priority,
            attempts: value.attempts,
            next_retry_at_ms: value.next_retry_at_ms,
            enqueued_at_ms: value.enqueued_at_ms,
        }
    }
}

impl From<DbJobRecord> for JobRecord {
    fn from(value: DbJobRecord) -> Self {
        Self {
            block_hash: B256::new(value.block_hash),
            block_number: value.block_number,
            priority: value.priority,
            attempts: value.attempts,
            next_retry_at_ms: value.next_retry_at_ms,
            enqueued_at_ms: value.enqueued_at_ms,
        }
    }
}
