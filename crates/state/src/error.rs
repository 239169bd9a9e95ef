use alloy_primitives::Address;
use thiserror::Error;
use tidewatch_db::DbError;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// A diff or checkpoint was requested for a contract with no `init` (or
    /// prior checkpoint) at or below the block. Parent-chain invariant
    /// violation; never swallowed.
    #[error("no init or checkpoint for contract {contract} at or below block {block}")]
    MissingInit { contract: Address, block: u64 },

    /// Historical fill refuses to run over a range that already has records.
    #[error("state records already exist in range {from}..={to}")]
    RecordsExist { from: u64, to: u64 },

    /// A stored payload failed to parse back.
    #[error("invalid state payload: {0}")]
    InvalidPayload(String),

    #[error("serialization: {0}")]
    Serialization(String),

    /// Failure pushing to the external state sink.
    #[error("sink: {0}")]
    Sink(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl StateError {
    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        StateError::Serialization(err.to_string())
    }
}
