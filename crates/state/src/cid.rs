use alloy_primitives::Address;
use sha2::{Digest, Sha256};
use tidewatch_primitives::{Cid, StateKind};

/// Domain separator so state CIDs can never collide with other sha256 uses.
const STATE_CID_DOMAIN: &[u8] = b"tidewatch/state-record/v1";
const BLOCK_CID_DOMAIN: &[u8] = b"tidewatch/block-header/v1";

/// Content identifier of a block, derived from its byte-exact header RLP.
pub fn block_cid(header_rlp: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(BLOCK_CID_DOMAIN);
    hasher.update(header_rlp);
    hex::encode(hasher.finalize())
}

/// Deterministic content identifier of a state record.
///
/// Hashes `(kind, parent, block_cid, contract, canonical(state))`; two
/// records with the same logical content produce the same CID regardless of
/// how their payloads were assembled.
pub fn compute_cid(
    kind: StateKind,
    parent: &Cid,
    block_cid: &str,
    contract: Address,
    canonical_state: &[u8],
) -> Cid {
    let mut hasher = Sha256::new();
    hasher.update(STATE_CID_DOMAIN);
    hasher.update([kind_tag(kind)]);
    hasher.update((parent.as_str().len() as u64).to_be_bytes());
    hasher.update(parent.as_str().as_bytes());
    hasher.update((block_cid.len() as u64).to_be_bytes());
    hasher.update(block_cid.as_bytes());
    hasher.update(contract.as_slice());
    hasher.update(canonical_state);
    Cid::new(hex::encode(hasher.finalize()))
}

fn kind_tag(kind: StateKind) -> u8 {
    match kind {
        StateKind::Init => 0,
        // A staged diff and its promoted form are the same content; the CID
        // must not change on promotion.
        StateKind::DiffStaged | StateKind::Diff => 1,
        StateKind::Checkpoint => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_preserves_the_cid() {
        let parent = Cid::new("parent");
        let staged = compute_cid(
            StateKind::DiffStaged,
            &parent,
            "blockcid",
            Address::ZERO,
            b"{}",
        );
        let promoted = compute_cid(StateKind::Diff, &parent, "blockcid", Address::ZERO, b"{}");
        assert_eq!(staged, promoted);
    }

    #[test]
    fn different_parents_produce_different_cids() {
        let a = compute_cid(
            StateKind::Diff,
            &Cid::new("a"),
            "blockcid",
            Address::ZERO,
            b"{}",
        );
        let b = compute_cid(
            StateKind::Diff,
            &Cid::new("b"),
            "blockcid",
            Address::ZERO,
            b"{}",
        );
        assert_ne!(a, b);
    }

    #[test]
    fn block_cid_tracks_header_bytes() {
        assert_eq!(block_cid(b"rlp"), block_cid(b"rlp"));
        assert_ne!(block_cid(b"rlp"), block_cid(b"rlp2"));
    }
}
