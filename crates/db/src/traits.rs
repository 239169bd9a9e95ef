use alloy_primitives::Address;
use tidewatch_primitives::{
    BlockHash, BlockNumHash, BlockRecord, CursorKind, EventRecord, StateKind, StateRecord,
    StateSyncStatus, SyncStatus, WatchedContract,
};

use crate::{
    jobs::{JobKey, JobRecord, QueueName},
    DbResult,
};

/// Transactional store interface for the indexing pipeline.
///
/// Multi-row writes (`insert_block_with_events`, `complete_block`,
/// `mark_blocks_pruned`, the rewind operations) commit atomically; failure of
/// any step rolls back the whole write. Cursor movements ride inside the same
/// transaction as the block or state rows that triggered them.
pub trait WatcherDb: Send + Sync + 'static {
    // Block operations

    fn get_block(&self, hash: BlockHash) -> DbResult<Option<BlockRecord>>;

    /// Blocks at a height, optionally including pruned ones.
    fn get_blocks_at_height(&self, number: u64, include_pruned: bool)
        -> DbResult<Vec<BlockRecord>>;

    /// Atomically inserts a block with its events and advances the indexing
    /// cursors. Fails with `TxnBlockExists` if the block row is present.
    fn insert_block_with_events(
        &self,
        block: &BlockRecord,
        events: &[EventRecord],
        latest_indexed: Option<BlockNumHash>,
        initial_indexed: Option<BlockNumHash>,
    ) -> DbResult<()>;

    /// Records one applied event: bumps `num_processed_events` and
    /// `last_processed_event_index` in a single write.
    fn update_block_progress(
        &self,
        hash: BlockHash,
        last_index: u64,
        num_processed: u64,
    ) -> DbResult<()>;

    /// Completion transition: sets `is_complete`, appends the staged state
    /// records produced by the block, and advances the indexing, canonical,
    /// and state cursors, all in one transaction. `latest_indexed` moves here
    /// when a reorg rewound it below an already-indexed branch.
    fn complete_block(
        &self,
        hash: BlockHash,
        staged: &[StateRecord],
        latest_indexed: Option<BlockNumHash>,
        latest_canonical: Option<BlockNumHash>,
        state_indexed: Option<u64>,
    ) -> DbResult<()>;

    /// Marks a batch of blocks pruned in one transaction.
    fn mark_blocks_pruned(&self, hashes: &[BlockHash]) -> DbResult<()>;

    /// Deletes blocks (and their events and height-index entries) above the
    /// given height. Administrative reset only.
    fn delete_blocks_above(&self, number: u64) -> DbResult<u64>;

    /// Number of complete, non-pruned blocks in the inclusive height range.
    fn count_processed_blocks_in_range(&self, from: u64, to: u64) -> DbResult<u64>;

    // Event operations

    /// Events of a block ordered by ascending log index.
    fn get_events(&self, hash: BlockHash) -> DbResult<Vec<EventRecord>>;

    /// Events of a block with `index > after_index`, ascending.
    fn get_events_after(&self, hash: BlockHash, after_index: Option<u64>)
        -> DbResult<Vec<EventRecord>>;

    /// Events of non-pruned blocks in an inclusive height range, ordered by
    /// (height, log index).
    fn get_events_in_range(&self, from: u64, to: u64) -> DbResult<Vec<EventRecord>>;

    // Watched contract set

    fn upsert_watched_contract(&self, contract: &WatchedContract) -> DbResult<()>;

    fn get_watched_contracts(&self) -> DbResult<Vec<WatchedContract>>;

    // State records

    /// Appends a state record, returning its insert sequence number.
    fn insert_state_record(&self, record: &StateRecord) -> DbResult<u64>;

    /// All state records of a contract at one height (any kind).
    fn get_state_records_at_block(
        &self,
        contract: Address,
        number: u64,
    ) -> DbResult<Vec<StateRecord>>;

    /// Latest record of the contract among `kinds` with block number at most
    /// `max_block` (unbounded when `None`). Ordered by block number then by
    /// insert sequence, both descending; ties go to the most recent insert.
    fn get_latest_state_record(
        &self,
        contract: Address,
        kinds: &[StateKind],
        max_block: Option<u64>,
    ) -> DbResult<Option<StateRecord>>;

    /// Records of the contract among `kinds` in an inclusive height range,
    /// ascending.
    fn get_state_records_in_range(
        &self,
        contract: Address,
        kinds: &[StateKind],
        from: u64,
        to: u64,
    ) -> DbResult<Vec<StateRecord>>;

    /// Whether any contract has any state record in the inclusive range.
    fn any_state_records_in_range(&self, from: u64, to: u64) -> DbResult<bool>;

    /// Promotes `DiffStaged` records with height <= `up_to_block` to `Diff`.
    /// Kind transition only; data and CID are untouched. Returns the number
    /// of promoted records.
    fn promote_staged_to_diff(&self, up_to_block: u64) -> DbResult<u64>;

    /// Deletes rewindable records (diff and staged diff) above the given
    /// height. Checkpoints and init records are retained.
    fn delete_rewindable_state_above(&self, number: u64) -> DbResult<u64>;

    /// Deletes state records of every kind above the given height.
    /// Administrative reset only.
    fn delete_state_above(&self, number: u64) -> DbResult<u64>;

    // Sync cursors

    fn get_sync_status(&self) -> DbResult<SyncStatus>;

    /// Writes one chain cursor. Guard logic lives in the cursor manager; this
    /// is the raw persistence hook.
    fn set_cursor(&self, kind: CursorKind, value: BlockNumHash) -> DbResult<()>;

    fn get_state_sync_status(&self) -> DbResult<StateSyncStatus>;

    fn set_state_sync_indexed(&self, number: u64) -> DbResult<()>;

    fn set_state_sync_checkpoint(&self, number: u64) -> DbResult<()>;

    // Job queue rows

    /// Appends a job, returning its assigned key.
    fn enqueue_job(&self, queue: QueueName, job: &JobRecord) -> DbResult<JobKey>;

    /// Jobs in delivery order (priority, then FIFO), up to `limit`. Includes
    /// jobs whose retry time has not come yet; the queue filters those.
    fn scan_jobs(&self, queue: QueueName, limit: usize) -> DbResult<Vec<(JobKey, JobRecord)>>;

    fn update_job(&self, queue: QueueName, key: JobKey, job: &JobRecord) -> DbResult<()>;

    fn remove_job(&self, queue: QueueName, key: JobKey) -> DbResult<()>;

    /// Moves a job out of its queue into the poison table.
    fn poison_job(&self, queue: QueueName, key: JobKey, job: &JobRecord) -> DbResult<()>;

    fn queue_depth(&self, queue: QueueName) -> DbResult<u64>;

    fn poisoned_jobs(&self, queue: QueueName) -> DbResult<Vec<JobRecord>>;
}
