use std::{sync::Arc, time::Duration};

use tidewatch_chain_client::ChainClient;
use tidewatch_common::ShutdownSignal;
use tidewatch_db::WatcherDb;
use tidewatch_primitives::BlockNumHash;
use tidewatch_queue::JobQueue;
use tidewatch_status::CursorManager;
use tracing::{debug, warn};

use crate::error::IndexerResult;

/// Dependencies and tuning of the head-follower task.
#[derive(Debug)]
pub struct HeadFollowerCtx<C, D> {
    pub client: Arc<C>,
    pub cursors: Arc<CursorManager<D>>,
    pub block_queue: Arc<JobQueue<D>>,
    /// First height to ingest when the store is empty.
    pub start_block: u64,
    pub poll_wait_ms: u64,
    pub max_blocks_fetch: u64,
}

/// Polls the upstream head and enqueues one `block` job per newly observed
/// height, advancing the chain-head cursor as blocks are discovered.
///
/// Upstream faults are logged and retried on the next cycle; the task exits
/// cleanly on shutdown.
pub async fn head_follower_task<C, D>(
    ctx: HeadFollowerCtx<C, D>,
    mut shutdown: ShutdownSignal,
) -> eyre::Result<()>
where
    C: ChainClient,
    D: WatcherDb,
{
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ctx.poll_wait_ms)) => {}
            _ = shutdown.wait() => return Ok(()),
        }

        match poll_head(&ctx).await {
            Ok(0) => {}
            Ok(enqueued) => debug!(enqueued, "head follower enqueued blocks"),
            Err(error) => warn!(%error, "head poll failed; will retry"),
        }
    }
}

/// One poll cycle: discovers at most `max_blocks_fetch` new heights.
pub async fn poll_head<C, D>(ctx: &HeadFollowerCtx<C, D>) -> IndexerResult<u64>
where
    C: ChainClient,
    D: WatcherDb,
{
    let upstream_head = ctx.client.latest_block_number().await?;
    let status = ctx.cursors.status()?;

    let from = status
        .chain_head
        .map(|head| head.number + 1)
        .unwrap_or(ctx.start_block);
    if from > upstream_head {
        return Ok(0);
    }
    let to = upstream_head.min(from + ctx.max_blocks_fetch - 1);

    let mut enqueued = 0;
    for number in from..=to {
        // A header can be absent if the head receded between the two calls;
        // the next cycle picks it up ("future epoch" tolerance).
        let Some(header) = ctx.client.header_by_number(number).await? else {
            break;
        };

        ctx.block_queue.enqueue(header.hash, number, 0).await?;
        ctx.cursors
            .update_chain_head(BlockNumHash::new(header.hash, number), false)?;
        enqueued += 1;
    }
    Ok(enqueued)
}
