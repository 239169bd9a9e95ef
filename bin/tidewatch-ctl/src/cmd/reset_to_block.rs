use anyhow::anyhow;
use tidewatch_db::{SledWatcherDb, WatcherDb};
use tidewatch_status::CursorManager;

use crate::args::ResetToBlockCmd;

pub(crate) fn run(
    db: &SledWatcherDb,
    cursors: &CursorManager<SledWatcherDb>,
    cmd: ResetToBlockCmd,
) -> anyhow::Result<()> {
    let number = cmd.number;
    let target = db
        .get_blocks_at_height(number, false)?
        .into_iter()
        .find(|block| block.is_complete)
        .ok_or_else(|| anyhow!("no processed block at height {number}"))?;

    let state_removed = db.delete_state_above(number)?;
    let blocks_removed = db.delete_blocks_above(number)?;

    let cursor = target.num_hash();
    cursors.update_chain_head(cursor, true)?;
    cursors.force_rewind(cursor)?;
    cursors.update_state_sync_indexed(number, true)?;
    let state_status = db.get_state_sync_status()?;
    if state_status
        .latest_checkpoint_block_number
        .is_some_and(|checkpoint| checkpoint > number)
    {
        cursors.update_state_sync_checkpoint(number, true)?;
    }

    println!(
        "reset to block {number} ({}); removed {blocks_removed} blocks, {state_removed} state records",
        target.block_hash
    );
    Ok(())
}
