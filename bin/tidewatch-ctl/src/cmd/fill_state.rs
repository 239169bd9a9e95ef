use anyhow::{anyhow, bail};
use tidewatch_chain_client::{ChainClient, HttpChainClient};
use tidewatch_db::{SledWatcherDb, WatcherDb};
use tidewatch_state::{block_cid, EventTallyReducer, FillBlock, Materializer};

use crate::args::FillStateCmd;

pub(crate) async fn run(
    db: &SledWatcherDb,
    client: &HttpChainClient,
    materializer: &Materializer<SledWatcherDb>,
    cmd: FillStateCmd,
) -> anyhow::Result<()> {
    if cmd.start > cmd.end {
        bail!("start {} is above end {}", cmd.start, cmd.end);
    }

    let mut blocks = Vec::with_capacity((cmd.end - cmd.start + 1) as usize);
    for number in cmd.start..=cmd.end {
        let block = db
            .get_blocks_at_height(number, false)?
            .into_iter()
            .find(|block| block.is_complete)
            .ok_or_else(|| {
                anyhow!("no processed block at height {number}; index the range first")
            })?;
        let full = client
            .full_block(block.block_hash)
            .await?
            .ok_or_else(|| anyhow!("block {} unavailable upstream", block.block_hash))?;
        blocks.push(FillBlock {
            block: block.num_hash(),
            block_cid: block_cid(&full.header_rlp),
        });
    }

    let contracts = db.get_watched_contracts()?;
    let summary = materializer.fill_state(&EventTallyReducer, &contracts, &blocks)?;

    println!(
        "filled {}..={}: {} init, {} diff, {} checkpoint records",
        cmd.start, cmd.end, summary.inits, summary.diffs, summary.checkpoints
    );
    Ok(())
}
