use alloy_primitives::B256;
use thiserror::Error;
use tidewatch_chain_client::ClientError;
use tidewatch_db::DbError;
use tidewatch_queue::QueueError;
use tidewatch_status::StatusError;

pub type IndexerResult<T> = Result<T, IndexerError>;

#[derive(Debug, Error)]
pub enum IndexerError {
    /// The upstream client does not know the requested block.
    #[error("block {0} unknown upstream")]
    UnknownBlock(B256),

    /// A log came back without a field the event row needs.
    #[error("log missing {field} in block {block}")]
    MalformedLog { block: B256, field: &'static str },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Status(#[from] StatusError),
}
