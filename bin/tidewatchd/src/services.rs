//! Service wiring and lifecycle.

use std::{sync::Arc, time::Duration};

use tidewatch_chain_client::{CachingClient, HttpChainClient};
use tidewatch_common::TaskExecutor;
use tidewatch_config::Config;
use tidewatch_db::{init_watcher_db, QueueName, SledWatcherDb, WatcherDb};
use tidewatch_indexer::{head_follower_task, BlockIndexer, HeadFollowerCtx, RawLogOracle};
use tidewatch_primitives::{ContractKind, WatchedContract};
use tidewatch_processor::{events_job_handler, ProcessorCtx, ProcessorTuning};
use tidewatch_queue::{spawn_workers, JobQueue, QueueTuning, WorkerFailure};
use tidewatch_state::{EventTallyReducer, Materializer};
use tidewatch_status::CursorManager;
use tracing::info;

type Client = CachingClient<HttpChainClient>;

/// Builds the pipeline and spawns its services: the head follower, the
/// `block` worker pool driving the indexer, and the `events` worker pool
/// driving the processor.
pub(crate) async fn start_services(config: &Config) -> anyhow::Result<TaskExecutor> {
    let db = Arc::new(init_watcher_db(&config.db.datadir)?);

    // The watched set is add-only; config entries are merged in.
    for contract in &config.contracts {
        db.upsert_watched_contract(&WatchedContract {
            address: contract.address,
            starting_block: contract.starting_block,
            kind: ContractKind::new(&contract.kind),
            checkpoint: contract.checkpoint,
        })?;
    }
    let contracts = db.get_watched_contracts()?;
    let start_block = contracts
        .iter()
        .map(|contract| contract.starting_block)
        .min()
        .unwrap_or(0);
    info!(contracts = contracts.len(), start_block, "watched contract set loaded");

    let http = HttpChainClient::new(
        &config.rpc.url,
        Duration::from_millis(config.rpc.request_timeout_ms),
        config.rpc.fetch_proofs,
    )?;
    let client: Arc<Client> = Arc::new(CachingClient::new(http, config.rpc.cache_capacity));

    let cursors = Arc::new(CursorManager::new(db.clone())?);
    let materializer = Arc::new(Materializer::new(db.clone()));

    let queue_tuning = QueueTuning {
        high_water_mark: config.queue.high_water_mark,
        max_attempts: config.queue.max_attempts,
        retry_base_ms: config.queue.retry_base_ms,
    };
    let block_queue: Arc<JobQueue<SledWatcherDb>> =
        Arc::new(JobQueue::new(db.clone(), QueueName::Block, queue_tuning));
    let events_queue: Arc<JobQueue<SledWatcherDb>> =
        Arc::new(JobQueue::new(db.clone(), QueueName::Events, queue_tuning));

    let indexer = Arc::new(BlockIndexer::new(
        client.clone(),
        db.clone(),
        Arc::new(RawLogOracle),
        cursors.clone(),
        events_queue.clone(),
    ));

    let processor_ctx = Arc::new(ProcessorCtx {
        client: client.clone(),
        db: db.clone(),
        cursors: cursors.clone(),
        materializer,
        indexer: indexer.clone(),
        reducer: Arc::new(EventTallyReducer),
        events_queue: events_queue.clone(),
        sink: None,
        tuning: ProcessorTuning {
            max_reorg_depth: config.sync.max_reorg_depth,
            max_backfill_depth: config.sync.max_backfill_depth,
            prune_depth: config.sync.prune_depth,
            checkpoint_interval: config.sync.checkpoint_interval,
        },
    });

    let executor = TaskExecutor::new();

    let follower_ctx = HeadFollowerCtx {
        client,
        cursors,
        block_queue: block_queue.clone(),
        start_block,
        poll_wait_ms: config.sync.poll_wait_ms,
        max_blocks_fetch: config.sync.max_blocks_fetch,
    };
    let shutdown = executor.shutdown_signal();
    executor.spawn_critical("head-follower", head_follower_task(follower_ctx, shutdown));

    spawn_workers(
        &executor,
        block_queue,
        config.queue.block_workers,
        "block-worker",
        move |job| {
            let indexer = indexer.clone();
            async move {
                indexer
                    .index_block_by_hash(job.block_hash)
                    .await
                    .map_err(WorkerFailure::retry)
            }
        },
    );

    spawn_workers(
        &executor,
        events_queue,
        config.queue.events_workers,
        "events-worker",
        events_job_handler(processor_ctx),
    );

    info!("services started");
    Ok(executor)
}
