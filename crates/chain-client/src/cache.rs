use std::num::NonZeroUsize;

use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_eth::{Log, TransactionReceipt};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::{
    error::ClientResult,
    traits::ChainClient,
    types::{ChainHeader, FullBlock, StorageSlot},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Header(B256),
    Full(B256),
    Storage(B256, Address, U256),
    Receipt(B256),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Header(ChainHeader),
    Full(FullBlock),
    Storage(StorageSlot),
    Receipt(Box<TransactionReceipt>),
}

/// LRU layer over a [`ChainClient`] for idempotent by-hash reads.
///
/// Only calls keyed by a hash are cached; by-number and log queries can
/// change across reorgs and always go upstream. Absent results are not
/// cached either, since a block unknown now may be known shortly.
#[derive(Debug)]
pub struct CachingClient<C> {
    inner: C,
    cache: Mutex<LruCache<CacheKey, CacheValue>>,
}

impl<C> CachingClient<C> {
    pub fn new(inner: C, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.lock().get(key).cloned()
    }

    fn store(&self, key: CacheKey, value: CacheValue) {
        self.cache.lock().put(key, value);
    }
}

#[async_trait]
impl<C: ChainClient> ChainClient for CachingClient<C> {
    async fn latest_block_number(&self) -> ClientResult<u64> {
        self.inner.latest_block_number().await
    }

    async fn header_by_hash(&self, hash: B256) -> ClientResult<Option<ChainHeader>> {
        let key = CacheKey::Header(hash);
        if let Some(CacheValue::Header(header)) = self.lookup(&key) {
            return Ok(Some(header));
        }
        let header = self.inner.header_by_hash(hash).await?;
        if let Some(header) = header {
            self.store(key, CacheValue::Header(header));
        }
        Ok(header)
    }

    async fn header_by_number(&self, number: u64) -> ClientResult<Option<ChainHeader>> {
        self.inner.header_by_number(number).await
    }

    async fn full_block(&self, hash: B256) -> ClientResult<Option<FullBlock>> {
        let key = CacheKey::Full(hash);
        if let Some(CacheValue::Full(block)) = self.lookup(&key) {
            return Ok(Some(block));
        }
        let block = self.inner.full_block(hash).await?;
        if let Some(block) = &block {
            self.store(key, CacheValue::Full(block.clone()));
        }
        Ok(block)
    }

    async fn logs(&self, block_number: u64, addresses: Vec<Address>) -> ClientResult<Vec<Log>> {
        self.inner.logs(block_number, addresses).await
    }

    async fn storage_at(
        &self,
        block_hash: B256,
        contract: Address,
        slot: U256,
    ) -> ClientResult<StorageSlot> {
        let key = CacheKey::Storage(block_hash, contract, slot);
        if let Some(CacheValue::Storage(slot_value)) = self.lookup(&key) {
            return Ok(slot_value);
        }
        let slot_value = self.inner.storage_at(block_hash, contract, slot).await?;
        self.store(key, CacheValue::Storage(slot_value.clone()));
        Ok(slot_value)
    }

    async fn transaction_receipt(&self, hash: B256) -> ClientResult<Option<TransactionReceipt>> {
        let key = CacheKey::Receipt(hash);
        if let Some(CacheValue::Receipt(receipt)) = self.lookup(&key) {
            return Ok(Some(*receipt));
        }
        let receipt = self.inner.transaction_receipt(hash).await?;
        if let Some(receipt) = &receipt {
            self.store(key, CacheValue::Receipt(Box::new(receipt.clone())));
        }
        Ok(receipt)
    }
}
