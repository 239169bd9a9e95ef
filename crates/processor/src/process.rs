use std::{
    collections::{hash_map::Entry, BTreeSet, HashMap},
    future::Future,
    sync::Arc,
};

use alloy_primitives::{Address, B256};
use tidewatch_chain_client::ChainClient;
use tidewatch_db::{JobRecord, WatcherDb};
use tidewatch_indexer::AbiOracle;
use tidewatch_primitives::{BlockRecord, Cid, StateKind, StateRecord, WatchedContract};
use tidewatch_queue::WorkerFailure;
use tidewatch_state::{block_cid, ContractState, EventReducer, StateError};
use tracing::{debug, info, warn};

use crate::{
    ctx::ProcessorCtx,
    error::{ProcessorError, ProcessorResult},
    reorg::handle_reorg,
};

/// Priority for backfilled parent jobs, above the default 0 so parents run
/// before their children.
const BACKFILL_PRIORITY: u8 = 1;

/// What processing a dequeued block amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Events applied, completion transaction committed.
    Completed,
    /// Replay guard: the block was already complete.
    AlreadyComplete,
    /// The block sits on a losing branch; nothing to do.
    Pruned,
    /// Not eligible yet; the job should come back later.
    Deferred(&'static str),
}

/// Adapter from the `events` queue to [`process_block`], classifying
/// failures into retry vs fatal.
pub fn events_job_handler<C, D, O, R>(
    ctx: Arc<ProcessorCtx<C, D, O, R>>,
) -> impl Fn(JobRecord) -> std::pin::Pin<Box<dyn Future<Output = Result<(), WorkerFailure>> + Send>>
       + Clone
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    move |job: JobRecord| {
        let ctx = ctx.clone();
        Box::pin(async move {
            match process_block(&ctx, job.block_hash).await {
                Ok(ProcessOutcome::Deferred(reason)) => {
                    Err(WorkerFailure::retry(eyre::eyre!("deferred: {reason}")))
                }
                Ok(_) => Ok(()),
                Err(err) if err.is_fatal() => Err(WorkerFailure::fatal(err)),
                Err(err) => Err(WorkerFailure::retry(err)),
            }
        })
    }
}

/// Drives one block through event application and completion.
pub async fn process_block<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    hash: B256,
) -> ProcessorResult<ProcessOutcome>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let block = ctx
        .db
        .get_block(hash)?
        .ok_or(ProcessorError::MissingBlock(hash))?;

    if block.is_complete {
        return Ok(ProcessOutcome::AlreadyComplete);
    }
    if block.is_pruned {
        return Ok(ProcessOutcome::Pruned);
    }

    let status = ctx.cursors.status()?;
    let is_root = status
        .initial_indexed
        .is_none_or(|initial| block.block_number <= initial.number);

    if !is_root {
        match ctx.db.get_block(block.parent_hash)? {
            None => {
                backfill_parents(ctx, &block).await?;
                return Ok(ProcessOutcome::Deferred("parent backfilled"));
            }
            Some(parent) if parent.is_pruned => {
                // The parent lost a reorg; this block goes with it.
                ctx.db.mark_blocks_pruned(&[block.block_hash])?;
                return Ok(ProcessOutcome::Pruned);
            }
            Some(parent) if !parent.is_complete => {
                return Ok(ProcessOutcome::Deferred("parent not complete"));
            }
            Some(_) => {}
        }
    }

    // Divergence check: if the canonical chain already covers this height
    // with a different block, resolve the reorg and retry from scratch.
    if let Some(canonical) = status.latest_canonical {
        if canonical.number >= block.block_number {
            let conflicting = ctx
                .db
                .get_blocks_at_height(block.block_number, false)?
                .into_iter()
                .any(|candidate| candidate.block_hash != block.block_hash);
            if conflicting {
                handle_reorg(ctx, &block, canonical).await?;
                return Ok(ProcessOutcome::Deferred("reorg resolved"));
            }
        }
    }

    let contracts: HashMap<Address, WatchedContract> = ctx
        .db
        .get_watched_contracts()?
        .into_iter()
        .map(|contract| (contract.address, contract))
        .collect();

    let (worked, num_processed) = apply_events(ctx, &block, &contracts)?;
    if num_processed != block.num_events {
        return Err(ProcessorError::EventCountMismatch {
            block: block.block_hash,
            expected: block.num_events,
            actual: num_processed,
        });
    }
    complete(ctx, &block, &contracts, worked).await?;

    info!(
        number = block.block_number,
        hash = %block.block_hash,
        num_events = block.num_events,
        "block processed"
    );
    Ok(ProcessOutcome::Completed)
}

/// Per-contract in-memory state with the entity ids the block touched.
type WorkedState = HashMap<Address, (ContractState, BTreeSet<String>)>;

/// Replays the block's events in strict log-index order.
///
/// Events at or below the stored progress marker rebuild the in-memory state
/// only (resume after a crash); events above it also persist progress, one
/// transaction per event. Out-of-order events are a fatal invariant
/// violation.
fn apply_events<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
    contracts: &HashMap<Address, WatchedContract>,
) -> ProcessorResult<(WorkedState, u64)>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let events = ctx.db.get_events(block.block_hash)?;
    let replay_boundary = block.last_processed_event_index;
    let mut num_processed = block.num_processed_events;

    let mut worked: WorkedState = HashMap::new();
    let mut last_index: Option<u64> = None;

    for event in &events {
        if last_index.is_some_and(|last| event.index <= last) {
            return Err(ProcessorError::EventsOutOfOrder {
                block: block.block_hash,
                last: last_index,
                got: event.index,
            });
        }
        last_index = Some(event.index);

        let Some(contract) = contracts.get(&event.contract) else {
            continue;
        };

        let entry = match worked.entry(event.contract) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                // Base state as of the previous blocks; a contract starting
                // at this very block has nothing yet.
                let base = match ctx
                    .materializer
                    .load_state(event.contract, block.block_number)
                {
                    Ok(state) => state,
                    Err(StateError::MissingInit { .. }) => ContractState::new(),
                    Err(err) => return Err(err.into()),
                };
                vacant.insert((base, BTreeSet::new()))
            }
        };

        let touched = ctx.reducer.apply(contract, event, &mut entry.0)?;
        entry.1.extend(touched);

        let already_counted = replay_boundary.is_some_and(|boundary| event.index <= boundary);
        if !already_counted {
            num_processed += 1;
            ctx.db
                .update_block_progress(block.block_hash, event.index, num_processed)?;
        }
    }

    Ok((worked, num_processed))
}

/// The completion transition: init records for contracts starting here,
/// staged diffs for contracts the block touched, cursor advances, and the
/// post-completion steps (sink push, promotion, checkpoint cadence).
async fn complete<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
    contracts: &HashMap<Address, WatchedContract>,
    worked: WorkedState,
) -> ProcessorResult<()>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let num_hash = block.num_hash();
    let full = ctx
        .client
        .full_block(block.block_hash)
        .await?
        .ok_or(ProcessorError::FullBlockUnavailable(block.block_hash))?;
    let bcid = block_cid(&full.header_rlp);

    let mut staged: Vec<StateRecord> = Vec::new();
    let mut fresh_inits: HashMap<Address, Cid> = HashMap::new();

    for contract in contracts.values() {
        if contract.starting_block == block.block_number
            && !ctx.materializer.has_init(contract.address)?
        {
            let init =
                ctx.materializer
                    .build_init_record(contract, num_hash, &bcid, &ContractState::new())?;
            fresh_inits.insert(contract.address, init.cid.clone());
            staged.push(init);
        }
    }

    for (address, (state, touched)) in &worked {
        if touched.is_empty() {
            continue;
        }
        let Some(contract) = contracts.get(address) else {
            continue;
        };
        let changes = state.collect_changes(touched.iter());
        let record = match fresh_inits.get(address) {
            Some(parent) => ctx.materializer.build_diff_with_parent(
                contract,
                num_hash,
                &bcid,
                StateKind::DiffStaged,
                parent.clone(),
                &changes,
            )?,
            None => ctx.materializer.build_diff_record(
                contract,
                num_hash,
                &bcid,
                StateKind::DiffStaged,
                &changes,
            )?,
        };
        staged.push(record);
    }
    // Stable order: per contract, the init precedes its diff; across
    // contracts, insert sequence follows the address.
    staged.sort_by_key(|record| record.contract);

    let indexed_advance = ctx.cursors.plan_indexed_advance(num_hash, false)?;
    let canonical = ctx
        .cursors
        .plan_canonical_advance(num_hash, indexed_advance.latest_indexed, false)?;

    ctx.db.complete_block(
        block.block_hash,
        &staged,
        indexed_advance.latest_indexed,
        canonical,
        Some(block.block_number),
    )?;
    if let Some(cursor) = canonical {
        ctx.cursors.publish_canonical(cursor);
    }

    push_to_sink(ctx, &staged).await;

    let status = ctx.cursors.status()?;
    if let Some(horizon) = ctx.prune_horizon(status.chain_head.map(|head| head.number)) {
        let promoted = ctx.materializer.promote_staged(horizon)?;
        if promoted > 0 {
            debug!(promoted, horizon, "staged diffs promoted");
        }
    }

    maybe_checkpoint(ctx, block, contracts, &bcid).await?;
    Ok(())
}

/// Pushes freshly created records to the optional state sink. The sink is
/// idempotent per CID, so failures only warn; the blob can be re-pushed.
async fn push_to_sink<C, D, O, R>(ctx: &ProcessorCtx<C, D, O, R>, records: &[StateRecord])
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let Some(sink) = &ctx.sink else {
        return;
    };
    for record in records {
        if let Err(error) = sink.push(record.cid.clone(), record.data.clone()).await {
            warn!(cid = %record.cid, %error, "state sink push failed");
        }
    }
}

/// Cuts checkpoints for checkpoint-enabled contracts once the configured
/// cadence has elapsed. Creation is idempotent per (contract, block).
async fn maybe_checkpoint<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
    contracts: &HashMap<Address, WatchedContract>,
    bcid: &str,
) -> ProcessorResult<()>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let interval = ctx.tuning.checkpoint_interval;
    if interval == 0 {
        return Ok(());
    }

    let last_checkpoint = ctx
        .db
        .get_state_sync_status()?
        .latest_checkpoint_block_number;

    for contract in contracts.values().filter(|contract| contract.checkpoint) {
        if !ctx.materializer.has_init(contract.address)? {
            continue;
        }
        let base = last_checkpoint.unwrap_or(contract.starting_block);
        if block.block_number < base + interval {
            continue;
        }

        let (record, created) =
            ctx.materializer
                .create_checkpoint(contract, block.num_hash(), bcid)?;
        if created {
            info!(
                contract = %contract.address,
                number = block.block_number,
                cid = %record.cid,
                "checkpoint created"
            );
            ctx.cursors
                .update_state_sync_checkpoint(block.block_number, false)?;
            push_to_sink(ctx, std::slice::from_ref(&record)).await;
        }
    }
    Ok(())
}

/// Iteratively indexes missing ancestors of `block`, nearest first, bounded
/// by `max_backfill_depth`. Each backfilled parent gets an `events` job with
/// elevated priority so it processes before its children.
async fn backfill_parents<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
) -> ProcessorResult<()>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let root = ctx
        .cursors
        .status()?
        .initial_indexed
        .map(|cursor| cursor.number);

    let mut hash = block.parent_hash;
    let mut depth: u64 = 0;
    loop {
        if ctx.db.get_block(hash)?.is_some() {
            return Ok(());
        }

        depth += 1;
        if depth > ctx.tuning.max_backfill_depth {
            return Err(ProcessorError::BackfillDepthExceeded {
                block: block.block_hash,
                max_depth: ctx.tuning.max_backfill_depth,
            });
        }

        let header = ctx
            .client
            .header_by_hash(hash)
            .await?
            .ok_or(ProcessorError::UnknownAncestor(hash))?;

        ctx.indexer.save_block_and_fetch_events(&header).await?;
        ctx.events_queue
            .enqueue(header.hash, header.number, BACKFILL_PRIORITY)
            .await?;
        debug!(number = header.number, hash = %header.hash, "backfilled parent");

        if root.is_some_and(|root| header.number <= root) {
            return Ok(());
        }
        hash = header.parent_hash;
    }
}
