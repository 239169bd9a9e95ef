use thiserror::Error;
use tidewatch_db::DbError;

pub type StatusResult<T> = Result<T, StatusError>;

#[derive(Debug, Error)]
pub enum StatusError {
    /// `latest_indexed` would pass `chain_head` without `force`.
    #[error("latest_indexed {attempted} would pass chain_head {chain_head} without force")]
    AheadOfChainHead { attempted: u64, chain_head: u64 },

    /// `latest_canonical` must stay at or below `latest_indexed`.
    #[error("latest_canonical {attempted} above latest_indexed {latest_indexed}")]
    AboveLatestIndexed {
        attempted: u64,
        latest_indexed: u64,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}
