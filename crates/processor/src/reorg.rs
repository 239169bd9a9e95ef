//! Reorg resolution: find the common ancestor, prune the losing branch,
//! rewind derived state and cursors.

use std::collections::HashSet;

use alloy_primitives::B256;
use tidewatch_chain_client::ChainClient;
use tidewatch_db::WatcherDb;
use tidewatch_indexer::AbiOracle;
use tidewatch_primitives::{BlockNumHash, BlockRecord};
use tidewatch_state::EventReducer;
use tracing::{info, warn};

use crate::{
    ctx::ProcessorCtx,
    error::{ProcessorError, ProcessorResult},
};

/// Resolves the divergence between `block`'s branch and the local canonical
/// chain whose tip is `old_tip`.
///
/// Walks both branches back to their common ancestor (bounded by
/// `max_reorg_depth`; exceeding it is fatal), marks local blocks above the
/// ancestor that are not on the incoming branch as pruned, deletes
/// rewindable state records above the ancestor, and force-rewinds the
/// cursors. The caller restarts processing afterwards; the new branch
/// re-enters the pipeline from ancestor+1.
pub async fn handle_reorg<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
    old_tip: BlockNumHash,
) -> ProcessorResult<BlockNumHash>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    warn!(
        number = block.block_number,
        hash = %block.block_hash,
        old_tip = old_tip.number,
        "chain divergence detected; resolving reorg"
    );

    let (ancestor, new_branch) = find_common_ancestor(ctx, block, old_tip).await?;
    let new_branch: HashSet<B256> = new_branch.into_iter().collect();

    // Everything above the ancestor that is not on the incoming branch loses.
    let status = ctx.cursors.status()?;
    let top = status
        .latest_indexed
        .map(|cursor| cursor.number)
        .unwrap_or(old_tip.number)
        .max(old_tip.number)
        .max(block.block_number);

    let mut victims = Vec::new();
    for number in ancestor.number + 1..=top {
        for candidate in ctx.db.get_blocks_at_height(number, false)? {
            if !new_branch.contains(&candidate.block_hash) {
                victims.push(candidate.block_hash);
            }
        }
    }
    if !victims.is_empty() {
        ctx.db.mark_blocks_pruned(&victims)?;
    }

    let deleted = ctx.db.delete_rewindable_state_above(ancestor.number)?;
    ctx.cursors.force_rewind(ancestor)?;

    info!(
        ancestor = ancestor.number,
        pruned = victims.len(),
        state_deleted = deleted,
        "reorg resolved"
    );
    Ok(ancestor)
}

/// Walks the incoming branch and the old canonical branch down to their
/// common ancestor.
///
/// Returns the ancestor and the incoming-branch block hashes strictly above
/// it. The rewind depth (old-branch blocks walked) is bounded by
/// `max_reorg_depth`.
pub(crate) async fn find_common_ancestor<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    block: &BlockRecord,
    old_tip: BlockNumHash,
) -> ProcessorResult<(BlockNumHash, Vec<B256>)>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    let max_depth = ctx.tuning.max_reorg_depth;
    let mut rewound: u64 = 0;

    let mut new_hash = block.block_hash;
    let mut new_number = block.block_number;
    let mut old_hash = old_tip.hash;
    let mut old_number = old_tip.number;
    let mut new_branch = Vec::new();

    loop {
        if new_number == old_number && new_hash == old_hash {
            return Ok((BlockNumHash::new(new_hash, new_number), new_branch));
        }

        if old_number >= new_number {
            rewound += 1;
            if rewound > max_depth {
                return Err(ProcessorError::ReorgDepthExceeded { max_depth });
            }
            old_hash = parent_of(ctx, old_hash).await?;
            old_number = old_number
                .checked_sub(1)
                .ok_or(ProcessorError::UnknownAncestor(old_hash))?;
        }
        if new_number > old_number {
            new_branch.push(new_hash);
            new_hash = parent_of(ctx, new_hash).await?;
            new_number = new_number
                .checked_sub(1)
                .ok_or(ProcessorError::UnknownAncestor(new_hash))?;
        }
    }
}

/// Parent hash of a block, preferring the local store and falling back to
/// the upstream client.
async fn parent_of<C, D, O, R>(
    ctx: &ProcessorCtx<C, D, O, R>,
    hash: B256,
) -> ProcessorResult<B256>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    if let Some(block) = ctx.db.get_block(hash)? {
        return Ok(block.parent_hash);
    }
    let header = ctx
        .client
        .header_by_hash(hash)
        .await?
        .ok_or(ProcessorError::UnknownAncestor(hash))?;
    Ok(header.parent_hash)
}
