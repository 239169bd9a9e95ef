use alloy_primitives::{Address, B256};
use anyhow::{anyhow, bail};
use tidewatch_chain_client::{ChainClient, HttpChainClient};
use tidewatch_db::{SledWatcherDb, WatcherDb};
use tidewatch_state::{block_cid, Materializer};
use tidewatch_status::CursorManager;

use crate::args::CreateCheckpointCmd;

pub(crate) async fn run(
    db: &SledWatcherDb,
    client: &HttpChainClient,
    materializer: &Materializer<SledWatcherDb>,
    cursors: &CursorManager<SledWatcherDb>,
    cmd: CreateCheckpointCmd,
) -> anyhow::Result<()> {
    let address: Address = cmd
        .contract
        .parse()
        .map_err(|_| anyhow!("invalid contract address: {}", cmd.contract))?;
    let contract = db
        .get_watched_contracts()?
        .into_iter()
        .find(|contract| contract.address == address)
        .ok_or_else(|| anyhow!("contract {address} is not watched"))?;

    let block = match &cmd.block_hash {
        Some(raw) => {
            let hash: B256 = raw
                .parse()
                .map_err(|_| anyhow!("invalid block hash: {raw}"))?;
            db.get_block(hash)?
                .ok_or_else(|| anyhow!("block {hash} is not indexed"))?
        }
        None => {
            let cursor = db
                .get_sync_status()?
                .latest_canonical
                .ok_or_else(|| anyhow!("no canonical block yet"))?;
            db.get_block(cursor.hash)?
                .ok_or_else(|| anyhow!("canonical cursor points at missing block {}", cursor.hash))?
        }
    };
    if block.is_pruned {
        bail!("block {} is on a pruned branch", block.block_hash);
    }
    if !block.is_complete {
        bail!("block {} is not fully processed", block.block_hash);
    }

    let full = client
        .full_block(block.block_hash)
        .await?
        .ok_or_else(|| anyhow!("block {} unavailable upstream", block.block_hash))?;
    let cid = block_cid(&full.header_rlp);

    let (record, created) = materializer.create_checkpoint(&contract, block.num_hash(), &cid)?;
    if created {
        cursors.update_state_sync_checkpoint(block.block_number, false)?;
    }

    println!("{}", record.cid);
    Ok(())
}
