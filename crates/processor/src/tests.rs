//! End-to-end processor scenarios over a temporary store and a scripted
//! upstream chain.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, B256};
use serde_json::json;
use tidewatch_chain_client::{ChainHeader, FullBlock, MockChainClient};
use tidewatch_db::{QueueName, SledWatcherDb, WatcherDb};
use tidewatch_indexer::{BlockIndexer, MockAbiOracle};
use tidewatch_primitives::{
    BlockNumHash, BlockRecord, ContractKind, EventRecord, StateKind, WatchedContract,
};
use tidewatch_queue::{JobQueue, QueueTuning};
use tidewatch_state::{EventTallyReducer, Materializer, StatePayload};
use tidewatch_status::CursorManager;

use crate::{
    ctx::{ProcessorCtx, ProcessorTuning},
    process::{process_block, ProcessOutcome},
    ProcessorError,
};

fn hash(id: u16) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = (id >> 8) as u8;
    bytes[1] = (id & 0xff) as u8;
    B256::new(bytes)
}

fn contract_address() -> Address {
    Address::new([0xaa; 20])
}

fn watched(starting_block: u64, checkpoint: bool) -> WatchedContract {
    WatchedContract {
        address: contract_address(),
        starting_block,
        kind: ContractKind::new("erc20"),
        checkpoint,
    }
}

type TestCtx = ProcessorCtx<MockChainClient, SledWatcherDb, MockAbiOracle, EventTallyReducer>;

struct Harness {
    ctx: TestCtx,
    db: Arc<SledWatcherDb>,
    headers: Arc<Mutex<HashMap<B256, ChainHeader>>>,
}

impl Harness {
    fn new(tuning: ProcessorTuning) -> Self {
        Self::with_sink(tuning, None)
    }

    fn with_sink(
        tuning: ProcessorTuning,
        sink: Option<Arc<dyn tidewatch_state::StateSink>>,
    ) -> Self {
        let db = Arc::new(SledWatcherDb::open_temporary().unwrap());
        db.upsert_watched_contract(&watched(100, false)).unwrap();

        let headers: Arc<Mutex<HashMap<B256, ChainHeader>>> = Arc::default();

        let mut client = MockChainClient::new();
        {
            let headers = headers.clone();
            client
                .expect_header_by_hash()
                .returning(move |hash| Ok(headers.lock().unwrap().get(&hash).copied()));
        }
        {
            let headers = headers.clone();
            client.expect_full_block().returning(move |hash| {
                Ok(headers.lock().unwrap().get(&hash).map(|header| FullBlock {
                    header: *header,
                    // Tests only need a deterministic per-block encoding.
                    header_rlp: hash.to_vec(),
                }))
            });
        }
        client.expect_logs().returning(|_, _| Ok(Vec::new()));
        let client = Arc::new(client);

        let cursors = Arc::new(CursorManager::new(db.clone()).unwrap());
        let materializer = Arc::new(Materializer::new(db.clone()));
        let events_queue = Arc::new(JobQueue::new(
            db.clone(),
            QueueName::Events,
            QueueTuning {
                high_water_mark: 1_024,
                max_attempts: 3,
                retry_base_ms: 0,
            },
        ));
        let indexer = Arc::new(BlockIndexer::new(
            client.clone(),
            db.clone(),
            Arc::new(MockAbiOracle::new()),
            cursors.clone(),
            events_queue.clone(),
        ));

        let ctx = ProcessorCtx {
            client,
            db: db.clone(),
            cursors,
            materializer,
            indexer,
            reducer: Arc::new(EventTallyReducer),
            events_queue,
            sink,
            tuning,
        };

        Self { ctx, db, headers }
    }

    fn default_tuning() -> ProcessorTuning {
        ProcessorTuning {
            max_reorg_depth: 16,
            max_backfill_depth: 16,
            // High enough that nothing promotes unless a test wants it.
            prune_depth: 1_000,
            checkpoint_interval: 0,
        }
    }

    fn set_head(&self, number: u64, id: u16) {
        self.ctx
            .cursors
            .update_chain_head(BlockNumHash::new(hash(id), number), false)
            .unwrap();
    }

    fn register_header(&self, number: u64, id: u16, parent: u16) -> ChainHeader {
        let header = ChainHeader {
            hash: hash(id),
            parent_hash: hash(parent),
            number,
            timestamp: 1_700_000_000 + number,
        };
        self.headers.lock().unwrap().insert(header.hash, header);
        header
    }

    /// Indexes a block the way the indexer would: cursor plan + atomic
    /// insert, one `Transfer` event per entry in `event_values`.
    fn index_block(&self, number: u64, id: u16, parent: u16, event_values: &[u64]) {
        self.register_header(number, id, parent);
        let events: Vec<EventRecord> = event_values
            .iter()
            .enumerate()
            .map(|(offset, value)| EventRecord {
                block_hash: hash(id),
                index: offset as u64,
                tx_hash: hash(id + 1_000),
                contract: contract_address(),
                event_name: "Transfer".to_owned(),
                event_info: json!({ "value": value }),
                extra_info: json!({}),
                proof: None,
            })
            .collect();
        let block = BlockRecord::new_indexed(
            hash(id),
            hash(parent),
            number,
            1_700_000_000 + number,
            events.len() as u64,
            number,
        );
        let advance = self
            .ctx
            .cursors
            .plan_indexed_advance(BlockNumHash::new(hash(id), number), false)
            .unwrap();
        self.db
            .insert_block_with_events(
                &block,
                &events,
                advance.latest_indexed,
                advance.initial_indexed,
            )
            .unwrap();
    }

    async fn process(&self, id: u16) -> ProcessOutcome {
        process_block(&self.ctx, hash(id)).await.unwrap()
    }

    fn block(&self, id: u16) -> BlockRecord {
        self.db.get_block(hash(id)).unwrap().unwrap()
    }

    fn state_records(&self, number: u64) -> Vec<tidewatch_primitives::StateRecord> {
        self.db
            .get_state_records_at_block(contract_address(), number)
            .unwrap()
    }
}

#[tokio::test]
async fn linear_ingest_produces_init_and_diff_chain() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(105, 6);

    for (offset, id) in (1u16..=6).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=6 {
        assert_eq!(harness.process(id).await, ProcessOutcome::Completed);
    }

    // Every block is complete, with its events applied exactly once.
    for id in 1u16..=6 {
        let block = harness.block(id);
        assert!(block.is_complete);
        assert_eq!(block.num_processed_events, 1);
    }

    // Block 100 carries init + staged diff; later blocks one staged diff.
    let at_100 = harness.state_records(100);
    assert_eq!(at_100.len(), 2);
    assert_eq!(at_100[0].kind, StateKind::Init);
    assert_eq!(at_100[1].kind, StateKind::DiffStaged);
    for number in 101..=105 {
        let records = harness.state_records(number);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, StateKind::DiffStaged);
    }

    // Parent-CID chain: each record's payload parent is the previous CID.
    let mut previous = at_100[0].cid.clone();
    let chained: Vec<_> = std::iter::once(at_100[1].clone())
        .chain((101..=105).map(|number| harness.state_records(number).remove(0)))
        .collect();
    for record in chained {
        let payload = StatePayload::parse(&record).unwrap();
        assert_eq!(payload.meta.parent, previous.as_str());
        previous = record.cid;
    }

    let status = harness.ctx.cursors.status().unwrap();
    assert_eq!(status.latest_indexed.unwrap().number, 105);
    assert_eq!(status.latest_canonical.unwrap().number, 105);
    assert_eq!(
        harness
            .db
            .get_state_sync_status()
            .unwrap()
            .latest_indexed_block_number,
        Some(105)
    );
}

#[tokio::test]
async fn empty_log_block_completes_immediately() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(100, 1);
    harness.index_block(100, 1, 0, &[]);

    assert_eq!(harness.process(1).await, ProcessOutcome::Completed);

    let block = harness.block(1);
    assert!(block.is_complete);
    assert_eq!(block.num_events, 0);
    // No events, but the contract starts here: init only, no diff.
    let records = harness.state_records(100);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, StateKind::Init);
}

#[tokio::test]
async fn replaying_a_complete_block_is_a_noop() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(100, 1);
    harness.index_block(100, 1, 0, &[7]);

    assert_eq!(harness.process(1).await, ProcessOutcome::Completed);
    assert_eq!(harness.process(1).await, ProcessOutcome::AlreadyComplete);

    // No duplicate state records from the replay.
    assert_eq!(harness.state_records(100).len(), 2);
}

#[tokio::test]
async fn block_defers_until_parent_is_complete() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(101, 2);
    harness.index_block(100, 1, 0, &[1]);
    harness.index_block(101, 2, 1, &[2]);

    assert_eq!(
        harness.process(2).await,
        ProcessOutcome::Deferred("parent not complete")
    );
    assert_eq!(harness.process(1).await, ProcessOutcome::Completed);
    assert_eq!(harness.process(2).await, ProcessOutcome::Completed);
}

#[tokio::test]
async fn missing_parent_is_backfilled_through_the_indexer() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(102, 3);
    harness.index_block(100, 1, 0, &[1]);
    assert_eq!(harness.process(1).await, ProcessOutcome::Completed);

    // 102 arrives while 101 was never indexed; its header is upstream.
    harness.register_header(101, 2, 1);
    harness.index_block(102, 3, 2, &[3]);

    assert_eq!(
        harness.process(3).await,
        ProcessOutcome::Deferred("parent backfilled")
    );
    // The parent now exists locally with an events job enqueued.
    assert!(harness.db.get_block(hash(2)).unwrap().is_some());
    assert_eq!(harness.ctx.events_queue.depth().unwrap(), 1);

    assert_eq!(harness.process(2).await, ProcessOutcome::Completed);
    assert_eq!(harness.process(3).await, ProcessOutcome::Completed);
}

#[tokio::test]
async fn resume_mid_block_yields_the_same_final_cid() {
    let tuning = Harness::default_tuning();

    // Uninterrupted run.
    let baseline = Harness::new(tuning);
    baseline.set_head(100, 1);
    baseline.index_block(100, 1, 0, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(baseline.process(1).await, ProcessOutcome::Completed);
    let baseline_diff = baseline.state_records(100).remove(1);

    // Interrupted run: the store says 7 of 10 events were applied when the
    // worker died. No staged diff was written yet.
    let resumed = Harness::new(tuning);
    resumed.set_head(100, 1);
    resumed.index_block(100, 1, 0, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    resumed.db.update_block_progress(hash(1), 6, 7).unwrap();

    assert_eq!(resumed.process(1).await, ProcessOutcome::Completed);
    let resumed_block = resumed.block(1);
    assert!(resumed_block.is_complete);
    assert_eq!(resumed_block.num_processed_events, 10);

    let resumed_diff = resumed.state_records(100).remove(1);
    assert_eq!(resumed_diff.cid, baseline_diff.cid);
    assert_eq!(resumed_diff.data, baseline_diff.data);
}

#[tokio::test]
async fn reorg_prunes_losing_branch_and_rewinds_state() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(103, 4);

    // Branch A: 100 -> 101 -> 102 -> 103, fully processed.
    for (offset, id) in (1u16..=4).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=4 {
        assert_eq!(harness.process(id).await, ProcessOutcome::Completed);
    }
    assert_eq!(
        harness.ctx.cursors.status().unwrap().latest_canonical.unwrap().number,
        103
    );

    // Branch B forks off 101: 102' (id 12), 103' (id 13), 104' (id 14).
    harness.set_head(104, 14);
    harness.index_block(102, 12, 2, &[202]);

    // First attempt detects the conflict with the canonical chain and
    // resolves the reorg.
    assert_eq!(
        harness.process(12).await,
        ProcessOutcome::Deferred("reorg resolved")
    );

    // Branch A above the ancestor is pruned; state rewound; cursors at 101.
    assert!(harness.block(3).is_pruned);
    assert!(harness.block(4).is_pruned);
    assert!(!harness.block(12).is_pruned);
    assert!(harness.state_records(102).is_empty());
    assert!(harness.state_records(103).is_empty());
    let status = harness.ctx.cursors.status().unwrap();
    assert_eq!(status.latest_canonical.unwrap().number, 101);
    assert_eq!(status.latest_indexed.unwrap().number, 101);

    // The retry completes 102' and the new branch extends.
    assert_eq!(harness.process(12).await, ProcessOutcome::Completed);
    harness.index_block(103, 13, 12, &[203]);
    harness.index_block(104, 14, 13, &[204]);
    assert_eq!(harness.process(13).await, ProcessOutcome::Completed);
    assert_eq!(harness.process(14).await, ProcessOutcome::Completed);

    let status = harness.ctx.cursors.status().unwrap();
    assert_eq!(status.latest_canonical.unwrap(), BlockNumHash::new(hash(14), 104));

    // Exactly one non-pruned block per height at or below canonical.
    for number in 100..=104 {
        assert_eq!(harness.db.get_blocks_at_height(number, false).unwrap().len(), 1);
    }
}

#[tokio::test]
async fn block_on_a_pruned_branch_is_pruned_with_its_parent() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(103, 4);
    for (offset, id) in (1u16..=4).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=3 {
        harness.process(id).await;
    }

    // Reorg at 102': parent 101. Block 103 (child of pruned 102) is pruned
    // transitively when its job runs.
    harness.index_block(102, 12, 2, &[202]);
    assert_eq!(
        harness.process(12).await,
        ProcessOutcome::Deferred("reorg resolved")
    );
    assert_eq!(harness.process(4).await, ProcessOutcome::Pruned);
}

#[tokio::test]
async fn reorg_past_max_depth_is_fatal() {
    let mut tuning = Harness::default_tuning();
    tuning.max_reorg_depth = 2;
    let harness = Harness::new(tuning);
    harness.set_head(105, 6);

    for (offset, id) in (1u16..=6).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=6 {
        harness.process(id).await;
    }

    // A fork all the way down at 101 (parent 100) is deeper than allowed.
    harness.index_block(101, 12, 1, &[201]);
    let err = process_block(&harness.ctx, hash(12)).await.unwrap_err();
    assert!(matches!(err, ProcessorError::ReorgDepthExceeded { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn staged_diffs_promote_when_blocks_finalize() {
    let mut tuning = Harness::default_tuning();
    tuning.prune_depth = 2;
    let harness = Harness::new(tuning);
    harness.set_head(105, 6);

    for (offset, id) in (1u16..=6).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=6 {
        harness.process(id).await;
    }

    // Horizon = 105 - 2 = 103: diffs at 100..=103 promoted, 104..105 staged.
    for number in 100..=103u64 {
        let records = harness.state_records(number);
        assert!(records
            .iter()
            .all(|record| record.kind != StateKind::DiffStaged));
    }
    for number in 104..=105u64 {
        let records = harness.state_records(number);
        assert_eq!(records[0].kind, StateKind::DiffStaged);
    }
}

#[tokio::test]
async fn checkpoint_cadence_cuts_a_checkpoint_with_diff_parent() {
    let mut tuning = Harness::default_tuning();
    tuning.checkpoint_interval = 5;
    let harness = Harness::new(tuning);
    harness.db.upsert_watched_contract(&watched(100, true)).unwrap();
    harness.set_head(105, 6);

    for (offset, id) in (1u16..=6).enumerate() {
        let number = 100 + offset as u64;
        harness.index_block(number, id, id - 1, &[number]);
    }
    for id in 1u16..=6 {
        harness.process(id).await;
    }

    // 105 >= starting_block(100) + interval(5): checkpoint at 105 whose
    // parent is the block-105 diff.
    let records = harness.state_records(105);
    let diff = records
        .iter()
        .find(|record| record.kind == StateKind::DiffStaged)
        .unwrap();
    let checkpoint = records
        .iter()
        .find(|record| record.kind == StateKind::Checkpoint)
        .unwrap();
    let payload = StatePayload::parse(checkpoint).unwrap();
    assert_eq!(payload.meta.parent, diff.cid.as_str());

    assert_eq!(
        harness
            .db
            .get_state_sync_status()
            .unwrap()
            .latest_checkpoint_block_number,
        Some(105)
    );
}

#[tokio::test]
async fn completion_pushes_new_records_to_the_sink() {
    let mut sink = tidewatch_state::MockStateSink::new();
    // Block 100 produces an init and a staged diff.
    sink.expect_push().times(2).returning(|_, _| Ok(()));

    let harness = Harness::with_sink(Harness::default_tuning(), Some(Arc::new(sink)));
    harness.set_head(100, 1);
    harness.index_block(100, 1, 0, &[1]);

    assert_eq!(harness.process(1).await, ProcessOutcome::Completed);
}

#[tokio::test]
async fn event_count_mismatch_is_fatal() {
    let harness = Harness::new(Harness::default_tuning());
    harness.set_head(100, 1);
    harness.register_header(100, 1, 0);

    // Two events sharing a log index collapse to one row in the store (keys
    // are (block, index)), leaving the block's recorded total unreachable.
    let events: Vec<EventRecord> = [0u64, 0]
        .iter()
        .enumerate()
        .map(|(n, _)| EventRecord {
            block_hash: hash(1),
            index: 0,
            tx_hash: hash(1_000 + n as u16),
            contract: contract_address(),
            event_name: "Transfer".to_owned(),
            event_info: json!({}),
            extra_info: json!({}),
            proof: None,
        })
        .collect();
    let block = BlockRecord::new_indexed(hash(1), hash(0), 100, 0, 2, 0);
    harness
        .db
        .insert_block_with_events(&block, &events, None, None)
        .unwrap();

    let err = process_block(&harness.ctx, hash(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ProcessorError::EventCountMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert!(err.is_fatal());
    // The block must not have been marked complete.
    assert!(!harness.block(1).is_complete);
}
