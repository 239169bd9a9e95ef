use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_eth::{Log, TransactionReceipt};
use async_trait::async_trait;

use crate::{
    error::ClientResult,
    types::{ChainHeader, FullBlock, StorageSlot},
};

/// Capability interface over the upstream chain.
///
/// Every call is a suspension point; implementations own their transport,
/// caching, and retry concerns. All hash/number inputs are already
/// normalized; storage slots are passed as 256-bit words (left-padded by the
/// caller-facing conversion from `U256`).
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Highest block number the upstream node knows about.
    async fn latest_block_number(&self) -> ClientResult<u64>;

    async fn header_by_hash(&self, hash: B256) -> ClientResult<Option<ChainHeader>>;

    async fn header_by_number(&self, number: u64) -> ClientResult<Option<ChainHeader>>;

    /// Header plus its byte-exact RLP encoding, for content addressing.
    async fn full_block(&self, hash: B256) -> ClientResult<Option<FullBlock>>;

    /// Logs of one block filtered by the given contract addresses.
    ///
    /// Queries beyond the upstream head return an empty vector rather than an
    /// error ("future epoch" normalization).
    async fn logs(&self, block_number: u64, addresses: Vec<Address>) -> ClientResult<Vec<Log>>;

    /// Storage word of `contract` at `slot` as of `block_hash`, plus an
    /// opaque proof when the adapter provides one.
    async fn storage_at(
        &self,
        block_hash: B256,
        contract: Address,
        slot: U256,
    ) -> ClientResult<StorageSlot>;

    async fn transaction_receipt(&self, hash: B256) -> ClientResult<Option<TransactionReceipt>>;
}
