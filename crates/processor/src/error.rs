use alloy_primitives::B256;
use thiserror::Error;
use tidewatch_chain_client::ClientError;
use tidewatch_db::DbError;
use tidewatch_indexer::IndexerError;
use tidewatch_queue::QueueError;
use tidewatch_state::StateError;
use tidewatch_status::StatusError;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Debug, Error)]
pub enum ProcessorError {
    /// A dequeued job referenced a block the store does not have.
    #[error("block {0} missing from the store")]
    MissingBlock(B256),

    /// Events came back out of ascending log-index order. Fatal.
    #[error("events out of order in block {block}: index {got} after {last:?}")]
    EventsOutOfOrder {
        block: B256,
        last: Option<u64>,
        got: u64,
    },

    /// Applied events do not add up to the block's recorded total. Fatal.
    #[error("block {block} expected {expected} events, applied {actual}")]
    EventCountMismatch {
        block: B256,
        expected: u64,
        actual: u64,
    },

    /// Parent backfill walked past its depth bound. Fatal.
    #[error("parent backfill for block {block} exceeded max depth {max_depth}")]
    BackfillDepthExceeded { block: B256, max_depth: u64 },

    /// Reorg resolution walked past its depth bound. Fatal.
    #[error("reorg walk exceeded max depth {max_depth}")]
    ReorgDepthExceeded { max_depth: u64 },

    /// An ancestor is unknown both locally and upstream. Fatal.
    #[error("ancestor {0} unknown locally and upstream")]
    UnknownAncestor(B256),

    /// The upstream client no longer serves a block we must content-address.
    #[error("full block {0} unavailable upstream")]
    FullBlockUnavailable(B256),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl ProcessorError {
    /// Invariant violations that must stop the process rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProcessorError::EventsOutOfOrder { .. }
                | ProcessorError::EventCountMismatch { .. }
                | ProcessorError::BackfillDepthExceeded { .. }
                | ProcessorError::ReorgDepthExceeded { .. }
                | ProcessorError::UnknownAncestor(_)
        )
    }
}
