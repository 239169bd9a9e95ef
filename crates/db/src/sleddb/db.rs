use alloy_primitives::Address;
use sled::{
    transaction::{ConflictableTransactionError, TransactionalTree},
    Transactional, Tree,
};
use tidewatch_primitives::{
    BlockHash, BlockNumHash, BlockRecord, CursorKind, EventRecord, StateKind, StateRecord,
    StateSyncStatus, SyncStatus, WatchedContract,
};

use crate::{
    error::abort,
    jobs::{JobKey, JobRecord, QueueName},
    sleddb::schema::{self, dec, enc},
    traits::WatcherDb,
    types::{
        state_kind_from_byte, state_kind_to_byte, DbBlockRecord, DbEventRecord, DbJobRecord,
        DbStateIndexEntry, DbStateRecord, DbSyncStatus, DbWatchedContract,
    },
    DbError, DbResult,
};

type TxnResult<T> = Result<T, ConflictableTransactionError<DbError>>;

/// Sled-backed [`WatcherDb`].
///
/// Multi-row writes span at most the `chain` and `state` trees, so every
/// atomic operation is a one- or two-tree sled transaction.
#[derive(Debug)]
pub struct SledWatcherDb {
    chain: Tree,
    state: Tree,
    jobs_block: Tree,
    jobs_events: Tree,
    jobs_poison: Tree,
    // Keeps the underlying store alive as long as any tree handle.
    _db: sled::Db,
}

impl SledWatcherDb {
    pub fn new(db: sled::Db) -> DbResult<Self> {
        Ok(Self {
            chain: db.open_tree(schema::CHAIN_TREE)?,
            state: db.open_tree(schema::STATE_TREE)?,
            jobs_block: db.open_tree(schema::JOBS_BLOCK_TREE)?,
            jobs_events: db.open_tree(schema::JOBS_EVENTS_TREE)?,
            jobs_poison: db.open_tree(schema::JOBS_POISON_TREE)?,
            _db: db,
        })
    }

    /// In-memory store for tests and tooling dry runs.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(db)
    }

    fn jobs_tree(&self, queue: QueueName) -> &Tree {
        match queue {
            QueueName::Block => &self.jobs_block,
            QueueName::Events => &self.jobs_events,
        }
    }

    /// Hashes of all blocks recorded at a height, in key order.
    fn block_hashes_at_height(&self, number: u64) -> DbResult<Vec<BlockHash>> {
        let start = schema::height_scan_start(number);
        let end = schema::keyspace_end(schema::KS_HEIGHT);
        let mut hashes = Vec::new();
        for entry in self.chain.range(start..end) {
            let (key, _) = entry?;
            if schema::height_key_number(&key)? != number {
                break;
            }
            hashes.push(schema::height_key_hash(&key)?);
        }
        Ok(hashes)
    }

    fn decode_block(bytes: &[u8]) -> DbResult<BlockRecord> {
        Ok(dec::<DbBlockRecord>(bytes)?.into())
    }
}

fn read_sync_in_txn(state: &TransactionalTree) -> TxnResult<DbSyncStatus> {
    match state.get(schema::SYNC_KEY)? {
        Some(bytes) => dec::<DbSyncStatus>(&bytes).map_err(ConflictableTransactionError::Abort),
        None => Ok(DbSyncStatus::default()),
    }
}

fn write_sync_in_txn(state: &TransactionalTree, sync: &DbSyncStatus) -> TxnResult<()> {
    let bytes = enc(sync).map_err(ConflictableTransactionError::Abort)?;
    state.insert(schema::SYNC_KEY, bytes.as_slice())?;
    Ok(())
}

fn read_seq_in_txn(tree: &TransactionalTree) -> TxnResult<u64> {
    match tree.get(schema::SEQ_KEY)? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                ConflictableTransactionError::Abort(DbError::Codec("malformed seq counter".into()))
            })?;
            Ok(u64::from_be_bytes(raw))
        }
        None => Ok(0),
    }
}

fn write_seq_in_txn(tree: &TransactionalTree, seq: u64) -> TxnResult<()> {
    tree.insert(schema::SEQ_KEY, seq.to_be_bytes().as_slice())?;
    Ok(())
}

/// Applies cursor movements to an in-transaction sync status.
///
/// `initial_indexed` is only written when still unset; the cursor manager
/// guarantees it is never passed otherwise.
fn apply_cursors_in_txn(
    state: &TransactionalTree,
    latest_indexed: Option<BlockNumHash>,
    initial_indexed: Option<BlockNumHash>,
    latest_canonical: Option<BlockNumHash>,
) -> TxnResult<()> {
    if latest_indexed.is_none() && initial_indexed.is_none() && latest_canonical.is_none() {
        return Ok(());
    }
    let mut sync = read_sync_in_txn(state)?;
    if let Some(cursor) = latest_indexed {
        sync.latest_indexed = Some(cursor.into());
    }
    if let Some(cursor) = initial_indexed {
        if sync.initial_indexed.is_none() {
            sync.initial_indexed = Some(cursor.into());
        }
    }
    if let Some(cursor) = latest_canonical {
        sync.latest_canonical = Some(cursor.into());
    }
    write_sync_in_txn(state, &sync)
}

impl WatcherDb for SledWatcherDb {
    fn get_block(&self, hash: BlockHash) -> DbResult<Option<BlockRecord>> {
        match self.chain.get(schema::block_key(hash))? {
            Some(bytes) => Ok(Some(Self::decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_blocks_at_height(
        &self,
        number: u64,
        include_pruned: bool,
    ) -> DbResult<Vec<BlockRecord>> {
        let mut blocks = Vec::new();
        for hash in self.block_hashes_at_height(number)? {
            let Some(block) = self.get_block(hash)? else {
                return Err(DbError::MissingBlock(hash));
            };
            if include_pruned || !block.is_pruned {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    fn insert_block_with_events(
        &self,
        block: &BlockRecord,
        events: &[EventRecord],
        latest_indexed: Option<BlockNumHash>,
        initial_indexed: Option<BlockNumHash>,
    ) -> DbResult<()> {
        let block_key = schema::block_key(block.block_hash);
        let height_key = schema::height_key(block.block_number, block.block_hash);
        let block_bytes = enc(&DbBlockRecord::from(block))?;

        let mut event_rows = Vec::with_capacity(events.len());
        for event in events {
            let key = schema::event_key(event.block_hash, event.index);
            let bytes = enc(&DbEventRecord::try_from(event)?)?;
            event_rows.push((key, bytes));
        }

        (&self.chain, &self.state)
            .transaction(|(chain, state)| {
                if chain.get(block_key.as_slice())?.is_some() {
                    return abort(DbError::TxnBlockExists(block.block_hash));
                }
                chain.insert(block_key.as_slice(), block_bytes.as_slice())?;
                chain.insert(height_key.as_slice(), &[][..])?;
                for (key, bytes) in &event_rows {
                    chain.insert(key.as_slice(), bytes.as_slice())?;
                }
                apply_cursors_in_txn(state, latest_indexed, initial_indexed, None)?;
                Ok(())
            })
            .map_err(DbError::from)
    }

    fn update_block_progress(
        &self,
        hash: BlockHash,
        last_index: u64,
        num_processed: u64,
    ) -> DbResult<()> {
        let block_key = schema::block_key(hash);
        self.chain
            .transaction(|chain| {
                let Some(bytes) = chain.get(block_key.as_slice())? else {
                    return abort(DbError::MissingBlock(hash));
                };
                let mut block =
                    dec::<DbBlockRecord>(&bytes).map_err(ConflictableTransactionError::Abort)?;
                block.last_processed_event_index = Some(last_index);
                block.num_processed_events = num_processed;
                let bytes = enc(&block).map_err(ConflictableTransactionError::Abort)?;
                chain.insert(block_key.as_slice(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(DbError::from)
    }

    fn complete_block(
        &self,
        hash: BlockHash,
        staged: &[StateRecord],
        latest_indexed: Option<BlockNumHash>,
        latest_canonical: Option<BlockNumHash>,
        state_indexed: Option<u64>,
    ) -> DbResult<()> {
        let block_key = schema::block_key(hash);
        let mut staged_rows = Vec::with_capacity(staged.len());
        for record in staged {
            let db_record = DbStateRecord::from(record);
            let bytes = enc(&db_record)?;
            let index_bytes = enc(&DbStateIndexEntry {
                contract: db_record.contract,
                kind: db_record.kind,
            })?;
            staged_rows.push((record.contract, record.block_number, bytes, index_bytes));
        }

        (&self.chain, &self.state)
            .transaction(|(chain, state)| {
                let Some(bytes) = chain.get(block_key.as_slice())? else {
                    return abort(DbError::MissingBlock(hash));
                };
                let mut block =
                    dec::<DbBlockRecord>(&bytes).map_err(ConflictableTransactionError::Abort)?;
                block.is_complete = true;
                let bytes = enc(&block).map_err(ConflictableTransactionError::Abort)?;
                chain.insert(block_key.as_slice(), bytes.as_slice())?;

                let mut seq = read_seq_in_txn(state)?;
                for (contract, number, record_bytes, index_bytes) in &staged_rows {
                    seq += 1;
                    state.insert(
                        schema::state_key(*contract, *number, seq).as_slice(),
                        record_bytes.as_slice(),
                    )?;
                    state.insert(
                        schema::state_index_key(*number, seq).as_slice(),
                        index_bytes.as_slice(),
                    )?;
                }
                write_seq_in_txn(state, seq)?;

                apply_cursors_in_txn(state, latest_indexed, None, latest_canonical)?;

                if let Some(number) = state_indexed {
                    let mut status = match state.get(schema::STATE_SYNC_KEY)? {
                        Some(raw) => dec::<crate::types::DbStateSyncStatus>(&raw)
                            .map_err(ConflictableTransactionError::Abort)?,
                        None => Default::default(),
                    };
                    status.latest_indexed_block_number = Some(number);
                    let raw = enc(&status).map_err(ConflictableTransactionError::Abort)?;
                    state.insert(schema::STATE_SYNC_KEY, raw.as_slice())?;
                }
                Ok(())
            })
            .map_err(DbError::from)
    }

    fn mark_blocks_pruned(&self, hashes: &[BlockHash]) -> DbResult<()> {
        let keys: Vec<(BlockHash, Vec<u8>)> = hashes
            .iter()
            .map(|hash| (*hash, schema::block_key(*hash)))
            .collect();
        self.chain
            .transaction(|chain| {
                for (hash, key) in &keys {
                    let Some(bytes) = chain.get(key.as_slice())? else {
                        return abort(DbError::MissingBlock(*hash));
                    };
                    let mut block = dec::<DbBlockRecord>(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?;
                    block.is_pruned = true;
                    let bytes = enc(&block).map_err(ConflictableTransactionError::Abort)?;
                    chain.insert(key.as_slice(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(DbError::from)
    }

    fn delete_blocks_above(&self, number: u64) -> DbResult<u64> {
        // Collect affected keys outside the transaction; sled transactions
        // cannot iterate. A concurrent insert above `number` would be missed,
        // but resets run with the pipeline stopped.
        let start = match number.checked_add(1) {
            Some(next) => schema::height_scan_start(next),
            None => return Ok(0),
        };
        let end = schema::keyspace_end(schema::KS_HEIGHT);

        let mut height_keys = Vec::new();
        let mut block_keys = Vec::new();
        let mut event_keys = Vec::new();
        for entry in self.chain.range(start..end) {
            let (key, _) = entry?;
            let hash = schema::height_key_hash(&key)?;
            height_keys.push(key.to_vec());
            block_keys.push(schema::block_key(hash));
            for event in self.chain.scan_prefix(schema::event_prefix(hash)) {
                let (event_key, _) = event?;
                event_keys.push(event_key.to_vec());
            }
        }

        let deleted = block_keys.len() as u64;
        self.chain
            .transaction(|chain| {
                for key in height_keys.iter().chain(&block_keys).chain(&event_keys) {
                    chain.remove(key.as_slice())?;
                }
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(DbError::from)?;
        Ok(deleted)
    }

    fn count_processed_blocks_in_range(&self, from: u64, to: u64) -> DbResult<u64> {
        let mut count = 0;
        for number in from..=to {
            for block in self.get_blocks_at_height(number, false)? {
                if block.is_complete {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn get_events(&self, hash: BlockHash) -> DbResult<Vec<EventRecord>> {
        self.get_events_after(hash, None)
    }

    fn get_events_after(
        &self,
        hash: BlockHash,
        after_index: Option<u64>,
    ) -> DbResult<Vec<EventRecord>> {
        let mut events = Vec::new();
        for entry in self.chain.scan_prefix(schema::event_prefix(hash)) {
            let (_, bytes) = entry?;
            let event = EventRecord::try_from(dec::<DbEventRecord>(&bytes)?)?;
            if after_index.is_none_or(|after| event.index > after) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn get_events_in_range(&self, from: u64, to: u64) -> DbResult<Vec<EventRecord>> {
        let mut events = Vec::new();
        for number in from..=to {
            for block in self.get_blocks_at_height(number, false)? {
                events.extend(self.get_events(block.block_hash)?);
            }
        }
        Ok(events)
    }

    fn upsert_watched_contract(&self, contract: &WatchedContract) -> DbResult<()> {
        let bytes = enc(&DbWatchedContract::from(contract))?;
        self.state
            .insert(schema::contract_key(contract.address), bytes)?;
        Ok(())
    }

    fn get_watched_contracts(&self) -> DbResult<Vec<WatchedContract>> {
        let mut contracts = Vec::new();
        for entry in self
            .state
            .scan_prefix(schema::keyspace_start(schema::KS_CONTRACT))
        {
            let (_, bytes) = entry?;
            contracts.push(dec::<DbWatchedContract>(&bytes)?.into());
        }
        Ok(contracts)
    }

    fn insert_state_record(&self, record: &StateRecord) -> DbResult<u64> {
        let db_record = DbStateRecord::from(record);
        let bytes = enc(&db_record)?;
        let index_bytes = enc(&DbStateIndexEntry {
            contract: db_record.contract,
            kind: db_record.kind,
        })?;
        let contract = record.contract;
        let number = record.block_number;

        let seq = self
            .state
            .transaction(|state| {
                let seq = read_seq_in_txn(state)? + 1;
                state.insert(
                    schema::state_key(contract, number, seq).as_slice(),
                    bytes.as_slice(),
                )?;
                state.insert(
                    schema::state_index_key(number, seq).as_slice(),
                    index_bytes.as_slice(),
                )?;
                write_seq_in_txn(state, seq)?;
                Ok(seq)
            })
            .map_err(DbError::from)?;
        Ok(seq)
    }

    fn get_state_records_at_block(
        &self,
        contract: Address,
        number: u64,
    ) -> DbResult<Vec<StateRecord>> {
        self.get_state_records_in_range(
            contract,
            &[
                StateKind::Init,
                StateKind::DiffStaged,
                StateKind::Diff,
                StateKind::Checkpoint,
            ],
            number,
            number,
        )
    }

    fn get_latest_state_record(
        &self,
        contract: Address,
        kinds: &[StateKind],
        max_block: Option<u64>,
    ) -> DbResult<Option<StateRecord>> {
        let start = schema::state_scan_start(contract, 0);
        let end = schema::state_scan_end(contract, max_block);
        for entry in self.state_range(start, end).rev() {
            let (_, bytes) = entry?;
            let record = StateRecord::try_from(dec::<DbStateRecord>(&bytes)?)?;
            if kinds.contains(&record.kind) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn get_state_records_in_range(
        &self,
        contract: Address,
        kinds: &[StateKind],
        from: u64,
        to: u64,
    ) -> DbResult<Vec<StateRecord>> {
        let start = schema::state_scan_start(contract, from);
        let end = schema::state_scan_end(contract, Some(to));
        let mut records = Vec::new();
        for entry in self.state_range(start, end) {
            let (_, bytes) = entry?;
            let record = StateRecord::try_from(dec::<DbStateRecord>(&bytes)?)?;
            if kinds.contains(&record.kind) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn any_state_records_in_range(&self, from: u64, to: u64) -> DbResult<bool> {
        let start = schema::state_index_scan_start(from);
        let end = schema::keyspace_end(schema::KS_STATE_BY_BLOCK);
        for entry in self.state.range(start..end) {
            let (key, _) = entry?;
            let (number, _) = schema::state_index_key_parts(&key)?;
            return Ok(number <= to);
        }
        Ok(false)
    }

    fn promote_staged_to_diff(&self, up_to_block: u64) -> DbResult<u64> {
        let targets = self.collect_index_entries(0, up_to_block, |kind| {
            kind == StateKind::DiffStaged
        })?;
        if targets.is_empty() {
            return Ok(0);
        }

        let diff_tag = state_kind_to_byte(StateKind::Diff);
        let promoted = targets.len() as u64;
        self.state
            .transaction(|state| {
                for (primary_key, index_key) in &targets {
                    let Some(bytes) = state.get(primary_key.as_slice())? else {
                        // NOTE: scanned outside the transaction; a record can
                        // only vanish through a concurrent rewind, which must
                        // not race with promotion.
                        return abort(DbError::TxnStagedVanished(up_to_block));
                    };
                    let mut record = dec::<DbStateRecord>(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?;
                    if record.kind != state_kind_to_byte(StateKind::DiffStaged) {
                        continue;
                    }
                    record.kind = diff_tag;
                    let record_bytes =
                        enc(&record).map_err(ConflictableTransactionError::Abort)?;
                    state.insert(primary_key.as_slice(), record_bytes.as_slice())?;

                    let index_bytes = enc(&DbStateIndexEntry {
                        contract: record.contract,
                        kind: diff_tag,
                    })
                    .map_err(ConflictableTransactionError::Abort)?;
                    state.insert(index_key.as_slice(), index_bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(DbError::from)?;
        Ok(promoted)
    }

    fn delete_rewindable_state_above(&self, number: u64) -> DbResult<u64> {
        let Some(from) = number.checked_add(1) else {
            return Ok(0);
        };
        let targets = self.collect_index_entries(from, u64::MAX, |kind| kind.is_rewindable())?;
        self.delete_state_entries(&targets)
    }

    fn delete_state_above(&self, number: u64) -> DbResult<u64> {
        let Some(from) = number.checked_add(1) else {
            return Ok(0);
        };
        let targets = self.collect_index_entries(from, u64::MAX, |_| true)?;
        self.delete_state_entries(&targets)
    }

    fn get_sync_status(&self) -> DbResult<SyncStatus> {
        match self.state.get(schema::SYNC_KEY)? {
            Some(bytes) => Ok(dec::<DbSyncStatus>(&bytes)?.into()),
            None => Ok(SyncStatus::default()),
        }
    }

    fn set_cursor(&self, kind: CursorKind, value: BlockNumHash) -> DbResult<()> {
        self.state
            .transaction(|state| {
                match kind {
                    CursorKind::ChainHead
                    | CursorKind::LatestIndexed
                    | CursorKind::LatestCanonical
                    | CursorKind::InitialIndexed => {
                        let mut sync = read_sync_in_txn(state)?;
                        let slot = match kind {
                            CursorKind::ChainHead => &mut sync.chain_head,
                            CursorKind::LatestIndexed => &mut sync.latest_indexed,
                            CursorKind::LatestCanonical => &mut sync.latest_canonical,
                            CursorKind::InitialIndexed => &mut sync.initial_indexed,
                            _ => unreachable!(),
                        };
                        *slot = Some(value.into());
                        write_sync_in_txn(state, &sync)?;
                    }
                    CursorKind::StateIndexed | CursorKind::StateCheckpoint => {
                        let mut status = match state.get(schema::STATE_SYNC_KEY)? {
                            Some(raw) => dec::<crate::types::DbStateSyncStatus>(&raw)
                                .map_err(ConflictableTransactionError::Abort)?,
                            None => Default::default(),
                        };
                        if kind == CursorKind::StateIndexed {
                            status.latest_indexed_block_number = Some(value.number);
                        } else {
                            status.latest_checkpoint_block_number = Some(value.number);
                        }
                        let raw =
                            enc(&status).map_err(ConflictableTransactionError::Abort)?;
                        state.insert(schema::STATE_SYNC_KEY, raw.as_slice())?;
                    }
                }
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(DbError::from)
    }

    fn get_state_sync_status(&self) -> DbResult<StateSyncStatus> {
        match self.state.get(schema::STATE_SYNC_KEY)? {
            Some(bytes) => Ok(dec::<crate::types::DbStateSyncStatus>(&bytes)?.into()),
            None => Ok(StateSyncStatus::default()),
        }
    }

    fn set_state_sync_indexed(&self, number: u64) -> DbResult<()> {
        self.set_cursor(
            CursorKind::StateIndexed,
            BlockNumHash::new(BlockHash::ZERO, number),
        )
    }

    fn set_state_sync_checkpoint(&self, number: u64) -> DbResult<()> {
        self.set_cursor(
            CursorKind::StateCheckpoint,
            BlockNumHash::new(BlockHash::ZERO, number),
        )
    }

    fn enqueue_job(&self, queue: QueueName, job: &JobRecord) -> DbResult<JobKey> {
        let bytes = enc(&DbJobRecord::from(job))?;
        let priority = job.priority;
        let seq = self
            .jobs_tree(queue)
            .transaction(|jobs| {
                let seq = read_seq_in_txn(jobs)? + 1;
                jobs.insert(
                    schema::job_key_bytes(JobKey { priority, seq }).as_slice(),
                    bytes.as_slice(),
                )?;
                write_seq_in_txn(jobs, seq)?;
                Ok(seq)
            })
            .map_err(DbError::from)?;
        Ok(JobKey { priority, seq })
    }

    fn scan_jobs(&self, queue: QueueName, limit: usize) -> DbResult<Vec<(JobKey, JobRecord)>> {
        let mut jobs = Vec::new();
        for entry in self
            .jobs_tree(queue)
            .scan_prefix(schema::keyspace_start(schema::KS_JOB))
        {
            let (key, bytes) = entry?;
            jobs.push((
                schema::parse_job_key(&key)?,
                dec::<DbJobRecord>(&bytes)?.into(),
            ));
            if jobs.len() >= limit {
                break;
            }
        }
        Ok(jobs)
    }

    fn update_job(&self, queue: QueueName, key: JobKey, job: &JobRecord) -> DbResult<()> {
        let bytes = enc(&DbJobRecord::from(job))?;
        self.jobs_tree(queue)
            .insert(schema::job_key_bytes(key), bytes)?;
        Ok(())
    }

    fn remove_job(&self, queue: QueueName, key: JobKey) -> DbResult<()> {
        self.jobs_tree(queue).remove(schema::job_key_bytes(key))?;
        Ok(())
    }

    fn poison_job(&self, queue: QueueName, key: JobKey, job: &JobRecord) -> DbResult<()> {
        let job_key = schema::job_key_bytes(key);
        let poison_key = schema::poison_key(queue, key.seq);
        let bytes = enc(&DbJobRecord::from(job))?;
        (self.jobs_tree(queue), &self.jobs_poison)
            .transaction(|(jobs, poison)| {
                jobs.remove(job_key.as_slice())?;
                poison.insert(poison_key.as_slice(), bytes.as_slice())?;
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(DbError::from)
    }

    fn queue_depth(&self, queue: QueueName) -> DbResult<u64> {
        let mut depth = 0;
        for entry in self
            .jobs_tree(queue)
            .scan_prefix(schema::keyspace_start(schema::KS_JOB))
        {
            entry?;
            depth += 1;
        }
        Ok(depth)
    }

    fn poisoned_jobs(&self, queue: QueueName) -> DbResult<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        for entry in self
            .jobs_poison
            .scan_prefix([schema::queue_tag(queue)])
        {
            let (_, bytes) = entry?;
            jobs.push(dec::<DbJobRecord>(&bytes)?.into());
        }
        Ok(jobs)
    }
}

impl SledWatcherDb {
    fn state_range(
        &self,
        start: Vec<u8>,
        end: Vec<u8>,
    ) -> impl DoubleEndedIterator<Item = sled::Result<(sled::IVec, sled::IVec)>> + '_ {
        self.state.range(start..end)
    }

    /// Collects (primary key, index key) pairs of state records in the
    /// inclusive block range whose kind matches the filter.
    fn collect_index_entries(
        &self,
        from: u64,
        to: u64,
        filter: impl Fn(StateKind) -> bool,
    ) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let start = schema::state_index_scan_start(from);
        let end = schema::keyspace_end(schema::KS_STATE_BY_BLOCK);
        let mut targets = Vec::new();
        for entry in self.state.range(start..end) {
            let (key, bytes) = entry?;
            let (number, seq) = schema::state_index_key_parts(&key)?;
            if number > to {
                break;
            }
            let index_entry = dec::<DbStateIndexEntry>(&bytes)?;
            let kind = state_kind_from_byte(index_entry.kind)?;
            if filter(kind) {
                let contract = Address::new(index_entry.contract);
                targets.push((schema::state_key(contract, number, seq), key.to_vec()));
            }
        }
        Ok(targets)
    }

    fn delete_state_entries(&self, targets: &[(Vec<u8>, Vec<u8>)]) -> DbResult<u64> {
        if targets.is_empty() {
            return Ok(0);
        }
        self.state
            .transaction(|state| {
                for (primary_key, index_key) in targets {
                    state.remove(primary_key.as_slice())?;
                    state.remove(index_key.as_slice())?;
                }
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(DbError::from)?;
        Ok(targets.len() as u64)
    }
}
