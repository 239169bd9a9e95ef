//! Historical state fill over an already-indexed block range.

use std::collections::BTreeSet;

use tidewatch_db::WatcherDb;
use tidewatch_primitives::{BlockNumHash, StateKind, WatchedContract};
use tracing::{info, warn};

use crate::{
    error::{StateError, StateResult},
    materializer::Materializer,
    reducer::{ContractState, EventReducer},
};

/// A canonical block of the fill range with its content identifier.
#[derive(Debug, Clone)]
pub struct FillBlock {
    pub block: BlockNumHash,
    pub block_cid: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub inits: u64,
    pub diffs: u64,
    pub checkpoints: u64,
}

impl<D: WatcherDb> Materializer<D> {
    /// Replays stored events over `blocks` and writes init/diff records for
    /// each watched contract, plus a final checkpoint for contracts with
    /// checkpointing enabled.
    ///
    /// Aborts without writing anything if the range already holds state
    /// records for any contract.
    pub fn fill_state<R: EventReducer>(
        &self,
        reducer: &R,
        contracts: &[WatchedContract],
        blocks: &[FillBlock],
    ) -> StateResult<FillSummary> {
        let mut blocks: Vec<&FillBlock> = blocks.iter().collect();
        blocks.sort_by_key(|fill| fill.block.number);
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return Ok(FillSummary::default());
        };
        let (from, to) = (first.block.number, last.block.number);

        if self.db().any_state_records_in_range(from, to)? {
            return Err(StateError::RecordsExist { from, to });
        }
        info!(from, to, contracts = contracts.len(), "filling state range");

        let mut summary = FillSummary::default();
        for contract in contracts {
            // A contract starting below the range must already be tracked;
            // one starting above it contributes nothing here.
            let mut state = if contract.starting_block < from {
                match self.load_state(contract.address, from - 1) {
                    Ok(state) => state,
                    Err(StateError::MissingInit { .. }) => {
                        warn!(
                            contract = %contract.address,
                            starting_block = contract.starting_block,
                            "contract has no state below the fill range; skipping"
                        );
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            } else {
                ContractState::new()
            };
            let mut tracked = contract.starting_block < from;

            for fill in &blocks {
                let number = fill.block.number;
                if number < contract.starting_block {
                    continue;
                }
                if number == contract.starting_block {
                    let record = self.build_init_record(
                        contract,
                        fill.block,
                        &fill.block_cid,
                        &state,
                    )?;
                    self.db().insert_state_record(&record)?;
                    summary.inits += 1;
                    tracked = true;
                }
                if !tracked {
                    continue;
                }

                let mut touched: BTreeSet<String> = BTreeSet::new();
                for event in self.db().get_events(fill.block.hash)? {
                    if event.contract != contract.address {
                        continue;
                    }
                    touched.extend(reducer.apply(contract, &event, &mut state)?);
                }
                if touched.is_empty() {
                    continue;
                }

                let changes = state.collect_changes(touched.iter());
                let record = self.build_diff_record(
                    contract,
                    fill.block,
                    &fill.block_cid,
                    StateKind::Diff,
                    &changes,
                )?;
                self.db().insert_state_record(&record)?;
                summary.diffs += 1;
            }

            if contract.checkpoint && tracked {
                let (_, created) =
                    self.create_checkpoint(contract, last.block, &last.block_cid)?;
                if created {
                    summary.checkpoints += 1;
                }
            }
        }

        info!(?summary, "state fill complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::{Address, B256};
    use serde_json::json;
    use tidewatch_db::SledWatcherDb;
    use tidewatch_primitives::{BlockRecord, ContractKind, EventRecord};

    use super::*;
    use crate::{payload::StatePayload, reducer::EventTallyReducer};

    fn hash(id: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[0] = id;
        B256::new(bytes)
    }

    fn contract() -> WatchedContract {
        WatchedContract {
            address: Address::new([0xaa; 20]),
            starting_block: 200,
            kind: ContractKind::new("erc20"),
            checkpoint: true,
        }
    }

    fn seed_block(db: &SledWatcherDb, number: u64, id: u8, with_event: bool) -> FillBlock {
        let events = if with_event {
            vec![EventRecord {
                block_hash: hash(id),
                index: 0,
                tx_hash: hash(id.wrapping_add(100)),
                contract: contract().address,
                event_name: "Transfer".to_owned(),
                event_info: json!({ "n": number }),
                extra_info: json!({}),
                proof: None,
            }]
        } else {
            Vec::new()
        };
        let block = BlockRecord::new_indexed(
            hash(id),
            hash(id.wrapping_sub(1)),
            number,
            0,
            events.len() as u64,
            0,
        );
        db.insert_block_with_events(&block, &events, None, None)
            .unwrap();
        FillBlock {
            block: BlockNumHash::new(hash(id), number),
            block_cid: format!("cid-{number}"),
        }
    }

    #[test]
    fn fill_produces_init_diffs_and_checkpoint() {
        let db = Arc::new(SledWatcherDb::open_temporary().unwrap());
        let materializer = Materializer::new(db.clone());

        let blocks: Vec<FillBlock> = (200..=205)
            .map(|number| seed_block(&db, number, (number - 199) as u8, number != 203))
            .collect();

        let summary = materializer
            .fill_state(&EventTallyReducer, &[contract()], &blocks)
            .unwrap();

        assert_eq!(summary.inits, 1);
        // Block 203 has no events, so no diff there.
        assert_eq!(summary.diffs, 5);
        assert_eq!(summary.checkpoints, 1);

        let checkpoint = db
            .get_latest_state_record(contract().address, &[StateKind::Checkpoint], None)
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.block_number, 205);
        let payload = StatePayload::parse(&checkpoint).unwrap();
        assert_eq!(payload.state["Transfer"]["count"], json!(5));
    }

    #[test]
    fn fill_aborts_when_records_exist() {
        let db = Arc::new(SledWatcherDb::open_temporary().unwrap());
        let materializer = Materializer::new(db.clone());

        let blocks: Vec<FillBlock> = (200..=202)
            .map(|number| seed_block(&db, number, (number - 199) as u8, true))
            .collect();

        materializer
            .fill_state(&EventTallyReducer, &[contract()], &blocks)
            .unwrap();

        let err = materializer
            .fill_state(&EventTallyReducer, &[contract()], &blocks)
            .unwrap_err();
        assert!(matches!(err, StateError::RecordsExist { from: 200, to: 202 }));
    }

    #[test]
    fn empty_range_is_a_noop() {
        let db = Arc::new(SledWatcherDb::open_temporary().unwrap());
        let materializer = Materializer::new(db);
        let summary = materializer
            .fill_state(&EventTallyReducer, &[contract()], &[])
            .unwrap();
        assert_eq!(summary, FillSummary::default());
    }
}
