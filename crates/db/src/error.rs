use alloy_primitives::B256;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Database-specific errors.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Transaction conflict: block row already present.
    #[error("txn conflict: block {0} already present")]
    TxnBlockExists(B256),

    /// Block expected to be present was not found.
    #[error("missing block {0}")]
    MissingBlock(B256),

    /// A state record scheduled for promotion disappeared mid-operation.
    #[error("txn conflict: staged state record vanished at block {0}")]
    TxnStagedVanished(u64),

    /// Value failed to encode or decode.
    #[error("codec: {0}")]
    Codec(String),

    /// Sled storage error.
    #[error("sled: {0}")]
    Sled(String),

    /// Sled transaction error.
    #[error("sled txn: {0}")]
    SledTxn(String),
}

impl DbError {
    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        DbError::Codec(err.to_string())
    }
}

impl From<sled::Error> for DbError {
    fn from(err: sled::Error) -> Self {
        DbError::Sled(err.to_string())
    }
}

impl From<TransactionError<DbError>> for DbError {
    fn from(err: TransactionError<DbError>) -> Self {
        match err {
            TransactionError::Abort(db_err) => db_err,
            TransactionError::Storage(storage) => DbError::SledTxn(storage.to_string()),
        }
    }
}

/// Aborts the surrounding sled transaction with a domain error.
pub(crate) fn abort<T>(err: DbError) -> Result<T, ConflictableTransactionError<DbError>> {
    Err(ConflictableTransactionError::Abort(err))
}
