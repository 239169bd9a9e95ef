use crate::block::BlockNumHash;

/// Which sync cursor an operation refers to; used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    ChainHead,
    LatestIndexed,
    LatestCanonical,
    InitialIndexed,
    StateIndexed,
    StateCheckpoint,
}

impl std::fmt::Display for CursorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CursorKind::ChainHead => "chain_head",
            CursorKind::LatestIndexed => "latest_indexed",
            CursorKind::LatestCanonical => "latest_canonical",
            CursorKind::InitialIndexed => "initial_indexed",
            CursorKind::StateIndexed => "state_indexed",
            CursorKind::StateCheckpoint => "state_checkpoint",
        };
        f.write_str(name)
    }
}

/// The single-row set of chain sync cursors.
///
/// Invariant (absent a forced rewind mid-transaction):
/// `latest_canonical.number <= latest_indexed.number <= chain_head.number`.
/// `initial_indexed` is set once and never moves except via administrative
/// reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Highest block observed on the upstream chain.
    pub chain_head: Option<BlockNumHash>,
    /// Highest block persisted with its events.
    pub latest_indexed: Option<BlockNumHash>,
    /// Deepest fully processed block confirmed on the canonical chain.
    pub latest_canonical: Option<BlockNumHash>,
    /// First block ever indexed; anchors historical fills.
    pub initial_indexed: Option<BlockNumHash>,
}

/// Materializer-side cursors, both monotone under normal operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSyncStatus {
    pub latest_indexed_block_number: Option<u64>,
    pub latest_checkpoint_block_number: Option<u64>,
}
