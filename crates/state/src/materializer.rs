use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::Address;
use serde_json::Value;
use tidewatch_db::WatcherDb;
use tidewatch_primitives::{BlockNumHash, Cid, StateKind, StateRecord, WatchedContract};
use tracing::debug;

use crate::{
    canonical::canonical_json_bytes,
    cid::compute_cid,
    error::{StateError, StateResult},
    payload::{PayloadBlockRef, PayloadMeta, StatePayload},
    reducer::ContractState,
};

/// Kinds that can parent the next diff. A checkpoint never parents a diff
/// unless it was created in the very same block (handled separately).
const DIFF_PARENT_KINDS: &[StateKind] = &[StateKind::Init, StateKind::DiffStaged, StateKind::Diff];

/// Kinds that can parent a checkpoint: the newest of the previous diff or
/// previous checkpoint (or the init when neither exists yet).
const CHECKPOINT_PARENT_KINDS: &[StateKind] = &[
    StateKind::Init,
    StateKind::DiffStaged,
    StateKind::Diff,
    StateKind::Checkpoint,
];

/// Produces and links contract state records.
#[derive(Debug)]
pub struct Materializer<D> {
    db: Arc<D>,
}

impl<D: WatcherDb> Materializer<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub(crate) fn db(&self) -> &Arc<D> {
        &self.db
    }

    /// Whether the contract already has its init record.
    pub fn has_init(&self, contract: Address) -> StateResult<bool> {
        Ok(self
            .db
            .get_latest_state_record(contract, &[StateKind::Init], None)?
            .is_some())
    }

    /// The init record of a contract at its starting block. Parent is the
    /// empty sentinel; `state` carries the initial aggregate (usually empty).
    pub fn build_init_record(
        &self,
        contract: &WatchedContract,
        block: BlockNumHash,
        block_cid: &str,
        state: &ContractState,
    ) -> StateResult<StateRecord> {
        build_record(
            StateKind::Init,
            Cid::empty(),
            contract,
            block,
            block_cid,
            state.entities().clone(),
        )
    }

    /// A diff-shaped record (staged or final) carrying the entities a block
    /// changed, parented per the diff chain rule.
    pub fn build_diff_record(
        &self,
        contract: &WatchedContract,
        block: BlockNumHash,
        block_cid: &str,
        kind: StateKind,
        changes: &BTreeMap<String, Value>,
    ) -> StateResult<StateRecord> {
        debug_assert!(matches!(kind, StateKind::Diff | StateKind::DiffStaged));
        let parent = self.next_diff_parent(contract.address, block.number)?;
        build_record(kind, parent, contract, block, block_cid, changes.clone())
    }

    /// A diff-shaped record with an explicitly provided parent; used when
    /// the parent record is being written in the same transaction and is not
    /// queryable yet.
    pub fn build_diff_with_parent(
        &self,
        contract: &WatchedContract,
        block: BlockNumHash,
        block_cid: &str,
        kind: StateKind,
        parent: Cid,
        changes: &BTreeMap<String, Value>,
    ) -> StateResult<StateRecord> {
        debug_assert!(matches!(kind, StateKind::Diff | StateKind::DiffStaged));
        build_record(kind, parent, contract, block, block_cid, changes.clone())
    }

    /// Parent CID for a diff at `block_number`: a checkpoint created in the
    /// same block wins, otherwise the latest diff (or the init).
    pub fn next_diff_parent(&self, contract: Address, block_number: u64) -> StateResult<Cid> {
        let same_block_checkpoint = self
            .db
            .get_state_records_at_block(contract, block_number)?
            .into_iter()
            .find(|record| record.kind == StateKind::Checkpoint);
        if let Some(checkpoint) = same_block_checkpoint {
            return Ok(checkpoint.cid);
        }

        self.db
            .get_latest_state_record(contract, DIFF_PARENT_KINDS, Some(block_number))?
            .map(|record| record.cid)
            .ok_or(StateError::MissingInit {
                contract,
                block: block_number,
            })
    }

    /// Creates a checkpoint embedding the full aggregated state at `block`.
    ///
    /// Idempotent per (contract, block): an existing checkpoint is returned
    /// as-is and nothing new is written. Returns the record and whether it
    /// was created by this call.
    pub fn create_checkpoint(
        &self,
        contract: &WatchedContract,
        block: BlockNumHash,
        block_cid: &str,
    ) -> StateResult<(StateRecord, bool)> {
        let existing = self
            .db
            .get_state_records_at_block(contract.address, block.number)?
            .into_iter()
            .find(|record| record.kind == StateKind::Checkpoint);
        if let Some(record) = existing {
            debug!(contract = %contract.address, number = block.number, "checkpoint already exists");
            return Ok((record, false));
        }

        let state = self.load_state(contract.address, block.number)?;
        let parent = self
            .db
            .get_latest_state_record(contract.address, CHECKPOINT_PARENT_KINDS, Some(block.number))?
            .map(|record| record.cid)
            .ok_or(StateError::MissingInit {
                contract: contract.address,
                block: block.number,
            })?;

        let record = build_record(
            StateKind::Checkpoint,
            parent,
            contract,
            block,
            block_cid,
            state.entities().clone(),
        )?;
        self.db.insert_state_record(&record)?;
        Ok((record, true))
    }

    /// Reconstructs the aggregated state of a contract as of `up_to_block`
    /// by folding diffs on top of the newest checkpoint (or the init).
    pub fn load_state(&self, contract: Address, up_to_block: u64) -> StateResult<ContractState> {
        let base = self
            .db
            .get_latest_state_record(
                contract,
                &[StateKind::Init, StateKind::Checkpoint],
                Some(up_to_block),
            )?
            .ok_or(StateError::MissingInit {
                contract,
                block: up_to_block,
            })?;

        let payload = StatePayload::parse(&base)?;
        let mut state = ContractState::from_entities(payload.state);

        // Diffs in the init's own block come after the init; diffs in a
        // checkpoint's block are already embedded in the checkpoint.
        let fold_from = match base.kind {
            StateKind::Init => base.block_number,
            _ => base.block_number + 1,
        };
        if fold_from > up_to_block {
            return Ok(state);
        }

        let diffs = self.db.get_state_records_in_range(
            contract,
            &[StateKind::Diff, StateKind::DiffStaged],
            fold_from,
            up_to_block,
        )?;
        for diff in diffs {
            let payload = StatePayload::parse(&diff)?;
            state.apply_diff(&payload.state);
        }
        Ok(state)
    }

    /// Promotes staged diffs whose blocks entered the pruned region.
    pub fn promote_staged(&self, up_to_block: u64) -> StateResult<u64> {
        Ok(self.db.promote_staged_to_diff(up_to_block)?)
    }
}

/// Assembles a record: canonical state bytes drive the CID, and the stored
/// payload is the canonical `{meta, state}` document.
fn build_record(
    kind: StateKind,
    parent: Cid,
    contract: &WatchedContract,
    block: BlockNumHash,
    block_cid: &str,
    state: BTreeMap<String, Value>,
) -> StateResult<StateRecord> {
    let state_value = serde_json::to_value(&state).map_err(StateError::serialization)?;
    let canonical_state = canonical_json_bytes(&state_value)?;
    let cid = compute_cid(kind, &parent, block_cid, contract.address, &canonical_state);

    let payload = StatePayload {
        meta: PayloadMeta {
            block: PayloadBlockRef {
                cid: block_cid.to_owned(),
                hash: block.hash.to_string(),
                number: block.number,
            },
            contract: contract.address.to_checksum(None),
            kind,
            parent: parent.as_str().to_owned(),
        },
        state,
    };
    let payload_value = serde_json::to_value(&payload).map_err(StateError::serialization)?;
    let data = canonical_json_bytes(&payload_value)?;

    Ok(StateRecord {
        block_hash: block.hash,
        block_number: block.number,
        contract: contract.address,
        cid,
        kind,
        data,
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use serde_json::json;
    use tidewatch_db::SledWatcherDb;
    use tidewatch_primitives::ContractKind;

    use super::*;

    fn block(number: u64, id: u8) -> BlockNumHash {
        let mut bytes = [0u8; 32];
        bytes[0] = id;
        BlockNumHash::new(B256::new(bytes), number)
    }

    fn contract() -> WatchedContract {
        WatchedContract {
            address: Address::new([0xaa; 20]),
            starting_block: 100,
            kind: ContractKind::new("erc20"),
            checkpoint: true,
        }
    }

    fn setup() -> Materializer<SledWatcherDb> {
        Materializer::new(Arc::new(SledWatcherDb::open_temporary().unwrap()))
    }

    fn changes(id: &str, value: u64) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert(id.to_owned(), json!({ "id": id, "value": value }));
        map
    }

    fn insert_init(materializer: &Materializer<SledWatcherDb>) -> StateRecord {
        let record = materializer
            .build_init_record(&contract(), block(100, 1), "cid-100", &ContractState::new())
            .unwrap();
        materializer.db().insert_state_record(&record).unwrap();
        record
    }

    #[test]
    fn init_has_empty_parent() {
        let materializer = setup();
        let record = insert_init(&materializer);

        assert_eq!(record.kind, StateKind::Init);
        let payload = StatePayload::parse(&record).unwrap();
        assert!(payload.meta.parent.is_empty());
        assert!(materializer.has_init(contract().address).unwrap());
    }

    #[test]
    fn diff_requires_an_init() {
        let materializer = setup();
        let err = materializer
            .build_diff_record(
                &contract(),
                block(100, 1),
                "cid-100",
                StateKind::DiffStaged,
                &changes("e", 1),
            )
            .unwrap_err();
        assert!(matches!(err, StateError::MissingInit { .. }));
    }

    #[test]
    fn diff_chain_links_by_parent_cid() {
        let materializer = setup();
        let init = insert_init(&materializer);

        let diff_100 = materializer
            .build_diff_record(
                &contract(),
                block(100, 1),
                "cid-100",
                StateKind::DiffStaged,
                &changes("e", 1),
            )
            .unwrap();
        materializer.db().insert_state_record(&diff_100).unwrap();

        let diff_101 = materializer
            .build_diff_record(
                &contract(),
                block(101, 2),
                "cid-101",
                StateKind::DiffStaged,
                &changes("e", 2),
            )
            .unwrap();
        materializer.db().insert_state_record(&diff_101).unwrap();

        let payload_100 = StatePayload::parse(&diff_100).unwrap();
        let payload_101 = StatePayload::parse(&diff_101).unwrap();
        assert_eq!(payload_100.meta.parent, init.cid.as_str());
        assert_eq!(payload_101.meta.parent, diff_100.cid.as_str());
    }

    #[test]
    fn checkpoint_parents_newest_diff_and_next_diff_parents_checkpoint() {
        let materializer = setup();
        insert_init(&materializer);

        let diff = materializer
            .build_diff_record(
                &contract(),
                block(105, 5),
                "cid-105",
                StateKind::DiffStaged,
                &changes("e", 5),
            )
            .unwrap();
        materializer.db().insert_state_record(&diff).unwrap();

        let (checkpoint, created) = materializer
            .create_checkpoint(&contract(), block(105, 5), "cid-105")
            .unwrap();
        assert!(created);
        let payload = StatePayload::parse(&checkpoint).unwrap();
        assert_eq!(payload.meta.parent, diff.cid.as_str());

        // A diff in the checkpoint's block parents the checkpoint.
        let parent = materializer
            .next_diff_parent(contract().address, 105)
            .unwrap();
        assert_eq!(parent, checkpoint.cid);

        // A diff in a later block parents the latest diff, not the
        // checkpoint.
        let parent = materializer
            .next_diff_parent(contract().address, 106)
            .unwrap();
        assert_eq!(parent, diff.cid);
    }

    #[test]
    fn checkpoint_is_idempotent_per_block() {
        let materializer = setup();
        insert_init(&materializer);

        let (first, created_first) = materializer
            .create_checkpoint(&contract(), block(105, 5), "cid-105")
            .unwrap();
        let (second, created_second) = materializer
            .create_checkpoint(&contract(), block(105, 5), "cid-105")
            .unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first, second);
    }

    #[test]
    fn load_state_folds_diffs_over_base() {
        let materializer = setup();
        insert_init(&materializer);

        for (number, id, value) in [(100u64, 1u8, 1u64), (101, 2, 2), (102, 3, 3)] {
            let record = materializer
                .build_diff_record(
                    &contract(),
                    block(number, id),
                    &format!("cid-{number}"),
                    StateKind::DiffStaged,
                    &changes("e", value),
                )
                .unwrap();
            materializer.db().insert_state_record(&record).unwrap();
        }

        let state = materializer.load_state(contract().address, 101).unwrap();
        assert_eq!(state.entity("e").unwrap()["value"], json!(2));

        let state = materializer.load_state(contract().address, 102).unwrap();
        assert_eq!(state.entity("e").unwrap()["value"], json!(3));
    }

    #[test]
    fn load_state_prefers_newest_checkpoint() {
        let materializer = setup();
        insert_init(&materializer);

        let diff = materializer
            .build_diff_record(
                &contract(),
                block(101, 1),
                "cid-101",
                StateKind::DiffStaged,
                &changes("e", 7),
            )
            .unwrap();
        materializer.db().insert_state_record(&diff).unwrap();

        materializer
            .create_checkpoint(&contract(), block(101, 1), "cid-101")
            .unwrap();

        // The checkpoint already embeds the block-101 diff; folding must not
        // double-apply it.
        let state = materializer.load_state(contract().address, 101).unwrap();
        assert_eq!(state.entity("e").unwrap()["value"], json!(7));
    }

    #[test]
    fn cids_are_invariant_under_change_insertion_order() {
        let materializer = setup();
        insert_init(&materializer);

        let mut forward = BTreeMap::new();
        forward.insert("a".to_owned(), json!({ "id": "a", "v": 1 }));
        forward.insert("b".to_owned(), json!({ "id": "b", "v": 2 }));

        let mut reverse = BTreeMap::new();
        reverse.insert("b".to_owned(), json!({ "id": "b", "v": 2 }));
        reverse.insert("a".to_owned(), json!({ "id": "a", "v": 1 }));

        let record_a = materializer
            .build_diff_record(
                &contract(),
                block(100, 1),
                "cid-100",
                StateKind::DiffStaged,
                &forward,
            )
            .unwrap();
        let record_b = materializer
            .build_diff_record(
                &contract(),
                block(100, 1),
                "cid-100",
                StateKind::DiffStaged,
                &reverse,
            )
            .unwrap();

        assert_eq!(record_a.cid, record_b.cid);
        assert_eq!(record_a.data, record_b.data);
    }
}
