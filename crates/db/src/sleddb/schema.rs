//! Key layout of the sled store.
//!
//! Keyspaces are grouped into two transactional domains so that every
//! multi-row write fits into a single two-tree transaction:
//!
//! `chain` tree
//! - `b` ++ block_hash                      => DbBlockRecord
//! - `h` ++ be64(number) ++ block_hash      => () (height index)
//! - `e` ++ block_hash ++ be64(log index)   => DbEventRecord
//!
//! `state` tree
//! - `s` ++ address ++ be64(number) ++ be64(seq) => DbStateRecord
//! - `i` ++ be64(number) ++ be64(seq)            => DbStateIndexEntry
//! - `w` ++ address                              => DbWatchedContract
//! - `c`                                         => be64 insert-seq counter
//! - `y`                                         => DbSyncStatus
//! - `z`                                         => DbStateSyncStatus
//!
//! `jobs_block` / `jobs_events` trees
//! - `j` ++ (255 - priority) ++ be64(seq)   => DbJobRecord
//! - `c`                                    => be64 job-seq counter
//!
//! `jobs_poison` tree
//! - queue_tag ++ be64(seq)                 => DbJobRecord
//!
//! All integers are big-endian so byte order equals numeric order.

use alloy_primitives::{Address, B256};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    jobs::{JobKey, QueueName},
    DbError, DbResult,
};

pub(crate) const CHAIN_TREE: &str = "chain";
pub(crate) const STATE_TREE: &str = "state";
pub(crate) const JOBS_BLOCK_TREE: &str = "jobs_block";
pub(crate) const JOBS_EVENTS_TREE: &str = "jobs_events";
pub(crate) const JOBS_POISON_TREE: &str = "jobs_poison";

pub(crate) const KS_BLOCK: u8 = b'b';
pub(crate) const KS_HEIGHT: u8 = b'h';
pub(crate) const KS_EVENT: u8 = b'e';

pub(crate) const KS_STATE: u8 = b's';
pub(crate) const KS_STATE_BY_BLOCK: u8 = b'i';
pub(crate) const KS_CONTRACT: u8 = b'w';

pub(crate) const KS_JOB: u8 = b'j';

pub(crate) const SEQ_KEY: &[u8] = b"c";
pub(crate) const SYNC_KEY: &[u8] = b"y";
pub(crate) const STATE_SYNC_KEY: &[u8] = b"z";

pub(crate) fn queue_tag(queue: QueueName) -> u8 {
    match queue {
        QueueName::Block => 0,
        QueueName::Events => 1,
    }
}

pub(crate) fn block_key(hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(KS_BLOCK);
    key.extend_from_slice(hash.as_slice());
    key
}

pub(crate) fn height_key(number: u64, hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(41);
    key.push(KS_HEIGHT);
    key.extend_from_slice(&number.to_be_bytes());
    key.extend_from_slice(hash.as_slice());
    key
}

pub(crate) fn height_scan_start(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(KS_HEIGHT);
    key.extend_from_slice(&number.to_be_bytes());
    key
}

/// Height number encoded in a height-index key.
pub(crate) fn height_key_number(key: &[u8]) -> DbResult<u64> {
    let bytes: [u8; 8] = key
        .get(1..9)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Codec("malformed height key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Block hash encoded in a height-index key.
pub(crate) fn height_key_hash(key: &[u8]) -> DbResult<B256> {
    let bytes: [u8; 32] = key
        .get(9..41)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Codec("malformed height key".into()))?;
    Ok(B256::new(bytes))
}

pub(crate) fn event_key(hash: B256, index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(41);
    key.push(KS_EVENT);
    key.extend_from_slice(hash.as_slice());
    key.extend_from_slice(&index.to_be_bytes());
    key
}

pub(crate) fn event_prefix(hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(KS_EVENT);
    key.extend_from_slice(hash.as_slice());
    key
}

pub(crate) fn contract_key(address: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(KS_CONTRACT);
    key.extend_from_slice(address.as_slice());
    key
}

pub(crate) fn state_key(address: Address, number: u64, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(37);
    key.push(KS_STATE);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(&number.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Start of the state keyspace of a contract at `number` (inclusive).
pub(crate) fn state_scan_start(address: Address, number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(29);
    key.push(KS_STATE);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(&number.to_be_bytes());
    key
}

/// Exclusive end of the state keyspace of a contract, optionally bounded to
/// block numbers `<= max_block`.
pub(crate) fn state_scan_end(address: Address, max_block: Option<u64>) -> Vec<u8> {
    match max_block.and_then(|number| number.checked_add(1)) {
        Some(next) => state_scan_start(address, next),
        None => {
            // Past every (number, seq) suffix of this contract.
            let mut key = Vec::with_capacity(38);
            key.push(KS_STATE);
            key.extend_from_slice(address.as_slice());
            key.extend_from_slice(&[0xff; 17]);
            key
        }
    }
}

/// Seq encoded in a state primary key.
pub(crate) fn state_key_seq(key: &[u8]) -> DbResult<u64> {
    let bytes: [u8; 8] = key
        .get(29..37)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Codec("malformed state key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn state_index_key(number: u64, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(KS_STATE_BY_BLOCK);
    key.extend_from_slice(&number.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub(crate) fn state_index_scan_start(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(KS_STATE_BY_BLOCK);
    key.extend_from_slice(&number.to_be_bytes());
    key
}

pub(crate) fn state_index_key_parts(key: &[u8]) -> DbResult<(u64, u64)> {
    let number: [u8; 8] = key
        .get(1..9)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Codec("malformed state index key".into()))?;
    let seq: [u8; 8] = key
        .get(9..17)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Codec("malformed state index key".into()))?;
    Ok((u64::from_be_bytes(number), u64::from_be_bytes(seq)))
}

pub(crate) fn job_key_bytes(key: JobKey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    bytes.push(KS_JOB);
    bytes.push(255 - key.priority);
    bytes.extend_from_slice(&key.seq.to_be_bytes());
    bytes
}

pub(crate) fn parse_job_key(bytes: &[u8]) -> DbResult<JobKey> {
    if bytes.len() != 10 || bytes[0] != KS_JOB {
        return Err(DbError::Codec("malformed job key".into()));
    }
    let seq: [u8; 8] = bytes[2..10]
        .try_into()
        .map_err(|_| DbError::Codec("malformed job key".into()))?;
    Ok(JobKey {
        priority: 255 - bytes[1],
        seq: u64::from_be_bytes(seq),
    })
}

pub(crate) fn poison_key(queue: QueueName, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(queue_tag(queue));
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Exclusive upper bound of a one-byte keyspace.
pub(crate) fn keyspace_end(keyspace: u8) -> Vec<u8> {
    vec![keyspace + 1]
}

pub(crate) fn keyspace_start(keyspace: u8) -> Vec<u8> {
    vec![keyspace]
}

pub(crate) fn enc<T: BorshSerialize>(value: &T) -> DbResult<Vec<u8>> {
    borsh::to_vec(value).map_err(DbError::codec)
}

pub(crate) fn dec<T: BorshDeserialize>(bytes: &[u8]) -> DbResult<T> {
    T::try_from_slice(bytes).map_err(DbError::codec)
}
