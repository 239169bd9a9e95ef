use std::time::Duration;

use alloy_eips::BlockId;
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rpc_types_eth::{Block, Filter, Log, TransactionReceipt};
use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams, ClientError as RpcError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::de::DeserializeOwned;
use tidewatch_common::backoff_delay;
use tracing::{debug, warn};

use crate::{
    error::{is_future_epoch_message, ClientError, ClientResult},
    traits::ChainClient,
    types::{ChainHeader, FullBlock, StorageSlot},
};

/// Transient transport faults are retried this many times before surfacing.
const TRANSPORT_RETRY_ATTEMPTS: u32 = 3;
const TRANSPORT_RETRY_BASE_MS: u64 = 250;

/// [`ChainClient`] over a JSON-RPC HTTP endpoint.
#[derive(Debug)]
pub struct HttpChainClient {
    client: HttpClient,
    fetch_proofs: bool,
}

impl HttpChainClient {
    pub fn new(url: &str, request_timeout: Duration, fetch_proofs: bool) -> ClientResult<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(map_rpc_error)?;
        Ok(Self {
            client,
            fetch_proofs,
        })
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> ClientResult<R> {
        let mut attempt = 0;
        loop {
            match self.client.request::<R, _>(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let mapped = map_rpc_error(err);
                    if mapped.is_transient() && attempt < TRANSPORT_RETRY_ATTEMPTS {
                        let delay = backoff_delay(TRANSPORT_RETRY_BASE_MS, attempt);
                        warn!(method, %mapped, ?delay, "transient rpc fault; retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(mapped);
                }
            }
        }
    }

    async fn block_by_id(&self, method: &str, params: ArrayParams) -> ClientResult<Option<Block>> {
        self.request(method, params).await
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn latest_block_number(&self) -> ClientResult<u64> {
        let raw: String = self.request("eth_blockNumber", rpc_params![]).await?;
        parse_hex_u64(&raw)
    }

    async fn header_by_hash(&self, hash: B256) -> ClientResult<Option<ChainHeader>> {
        let block = self
            .block_by_id("eth_getBlockByHash", rpc_params![hash, false])
            .await?;
        Ok(block.as_ref().map(to_chain_header))
    }

    async fn header_by_number(&self, number: u64) -> ClientResult<Option<ChainHeader>> {
        let block = self
            .block_by_id("eth_getBlockByNumber", rpc_params![hex_u64(number), false])
            .await?;
        Ok(block.as_ref().map(to_chain_header))
    }

    async fn full_block(&self, hash: B256) -> ClientResult<Option<FullBlock>> {
        let Some(block) = self
            .block_by_id("eth_getBlockByHash", rpc_params![hash, false])
            .await?
        else {
            return Ok(None);
        };

        let inner: &alloy_consensus::Header = &block.header.inner;
        let header_rlp = alloy_rlp::encode(inner);
        // The RLP must reproduce the block hash, or the encoding does not
        // match the upstream chain.
        let computed = keccak256(&header_rlp);
        if computed != block.header.hash {
            return Err(ClientError::InvalidResponse(format!(
                "header rlp hashes to {computed}, upstream says {}",
                block.header.hash
            )));
        }

        Ok(Some(FullBlock {
            header: to_chain_header(&block),
            header_rlp,
        }))
    }

    async fn logs(&self, block_number: u64, addresses: Vec<Address>) -> ClientResult<Vec<Log>> {
        let filter = Filter::new()
            .from_block(block_number)
            .to_block(block_number)
            .address(addresses);

        match self
            .request::<Vec<Log>>("eth_getLogs", rpc_params![filter])
            .await
        {
            Ok(logs) => Ok(logs),
            Err(ClientError::Rpc(message)) if is_future_epoch_message(&message) => {
                debug!(block_number, "future epoch; returning empty logs");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn storage_at(
        &self,
        block_hash: B256,
        contract: Address,
        slot: U256,
    ) -> ClientResult<StorageSlot> {
        // Left-pad the slot to a full 32-byte word.
        let slot_word = B256::from(slot);
        let block_id = BlockId::from(block_hash);

        let value: U256 = self
            .request(
                "eth_getStorageAt",
                rpc_params![contract, slot_word, block_id],
            )
            .await?;

        let proof = if self.fetch_proofs {
            let response: serde_json::Value = self
                .request(
                    "eth_getProof",
                    rpc_params![contract, vec![slot_word], block_id],
                )
                .await?;
            Some(response)
        } else {
            None
        };

        Ok(StorageSlot { value, proof })
    }

    async fn transaction_receipt(&self, hash: B256) -> ClientResult<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", rpc_params![hash])
            .await
    }
}

fn to_chain_header(block: &Block) -> ChainHeader {
    ChainHeader {
        hash: block.header.hash,
        parent_hash: block.header.inner.parent_hash,
        number: block.header.inner.number,
        timestamp: block.header.inner.timestamp,
    }
}

fn hex_u64(number: u64) -> String {
    format!("0x{number:x}")
}

fn parse_hex_u64(raw: &str) -> ClientResult<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|_| ClientError::InvalidResponse(format!("bad hex quantity: {raw}")))
}

fn map_rpc_error(err: RpcError) -> ClientError {
    match err {
        RpcError::Call(object) => ClientError::Rpc(object.message().to_string()),
        RpcError::RequestTimeout => ClientError::Transport("request timeout".to_string()),
        RpcError::Transport(inner) => ClientError::Transport(inner.to_string()),
        RpcError::RestartNeeded(inner) => ClientError::Transport(inner.to_string()),
        RpcError::ParseError(inner) => ClientError::InvalidResponse(inner.to_string()),
        other => ClientError::Rpc(other.to_string()),
    }
}
