use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, B256};
use tidewatch_chain_client::{ChainClient, ChainHeader};
use tidewatch_common::unix_time_secs;
use tidewatch_db::WatcherDb;
use tidewatch_primitives::{BlockNumHash, BlockRecord, EventRecord, WatchedContract};
use tidewatch_queue::JobQueue;
use tidewatch_status::CursorManager;
use tracing::{debug, info};

use crate::{
    error::{IndexerError, IndexerResult},
    oracle::AbiOracle,
};

/// A block row together with its events, as persisted.
#[derive(Debug, Clone)]
pub struct IndexedBlock {
    pub block: BlockRecord,
    pub events: Vec<EventRecord>,
}

/// Persists blocks with their watched-contract events.
#[derive(Debug)]
pub struct BlockIndexer<C, D, O> {
    client: Arc<C>,
    db: Arc<D>,
    oracle: Arc<O>,
    cursors: Arc<CursorManager<D>>,
    events_queue: Arc<JobQueue<D>>,
}

impl<C, D, O> BlockIndexer<C, D, O>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
{
    pub fn new(
        client: Arc<C>,
        db: Arc<D>,
        oracle: Arc<O>,
        cursors: Arc<CursorManager<D>>,
        events_queue: Arc<JobQueue<D>>,
    ) -> Self {
        Self {
            client,
            db,
            oracle,
            cursors,
            events_queue,
        }
    }

    /// Entry point for `block` queue workers: resolves the header, persists
    /// block + events, then enqueues the processing job.
    pub async fn index_block_by_hash(&self, hash: B256) -> IndexerResult<()> {
        let header = self
            .client
            .header_by_hash(hash)
            .await?
            .ok_or(IndexerError::UnknownBlock(hash))?;

        let indexed = self.save_block_and_fetch_events(&header).await?;

        // Post-commit: hand the block to the processor. The queue dedups by
        // running key; a crash between commit and enqueue is healed by the
        // block job retry.
        self.events_queue
            .enqueue(hash, header.number, 0)
            .await?;

        debug!(
            number = indexed.block.block_number,
            hash = %indexed.block.block_hash,
            num_events = indexed.block.num_events,
            "block indexed"
        );
        Ok(())
    }

    /// Fetches logs for the block, parses them through the ABI oracle, and
    /// persists block + events + cursor advance in one transaction.
    ///
    /// Idempotent: a block already present is returned with its stored
    /// events and nothing is written.
    pub async fn save_block_and_fetch_events(
        &self,
        header: &ChainHeader,
    ) -> IndexerResult<IndexedBlock> {
        if let Some(block) = self.db.get_block(header.hash)? {
            let events = self.db.get_events(header.hash)?;
            return Ok(IndexedBlock { block, events });
        }

        let contracts = self.db.get_watched_contracts()?;
        let by_address: HashMap<Address, &WatchedContract> = contracts
            .iter()
            .map(|contract| (contract.address, contract))
            .collect();
        let addresses: Vec<Address> = by_address.keys().copied().collect();

        let logs = self.client.logs(header.number, addresses).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            // Unknown contracts contribute no events.
            let Some(contract) = by_address.get(&log.address()) else {
                continue;
            };
            let Some(parsed) = self.oracle.parse_log(&contract.kind, log) else {
                continue;
            };

            let index = log.log_index.ok_or(IndexerError::MalformedLog {
                block: header.hash,
                field: "logIndex",
            })?;
            let tx_hash = log.transaction_hash.ok_or(IndexerError::MalformedLog {
                block: header.hash,
                field: "transactionHash",
            })?;

            events.push(EventRecord {
                block_hash: header.hash,
                index,
                tx_hash,
                contract: log.address(),
                event_name: parsed.event_name,
                event_info: parsed.event_info,
                extra_info: parsed.extra_info,
                proof: None,
            });
        }
        events.sort_by_key(|event| event.index);

        let block = BlockRecord::new_indexed(
            header.hash,
            header.parent_hash,
            header.number,
            header.timestamp,
            events.len() as u64,
            unix_time_secs(),
        );

        let cursor = BlockNumHash::new(header.hash, header.number);
        let advance = self.cursors.plan_indexed_advance(cursor, false)?;
        self.db.insert_block_with_events(
            &block,
            &events,
            advance.latest_indexed,
            advance.initial_indexed,
        )?;

        info!(
            number = header.number,
            hash = %header.hash,
            num_events = block.num_events,
            "saved block with events"
        );
        Ok(IndexedBlock { block, events })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::LogData;
    use alloy_rpc_types_eth::Log;
    use serde_json::json;
    use tidewatch_chain_client::MockChainClient;
    use tidewatch_db::{QueueName, SledWatcherDb};
    use tidewatch_primitives::ContractKind;
    use tidewatch_queue::QueueTuning;

    use super::*;
    use crate::oracle::{MockAbiOracle, ParsedEvent};

    fn hash(id: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[0] = id;
        B256::new(bytes)
    }

    fn address(id: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = id;
        Address::new(bytes)
    }

    fn header(number: u64, id: u8, parent: u8) -> ChainHeader {
        ChainHeader {
            hash: hash(id),
            parent_hash: hash(parent),
            number,
            timestamp: 1_700_000_000,
        }
    }

    fn raw_log(contract: Address, block: u8, index: u64) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: contract,
                data: LogData::new_unchecked(vec![], Default::default()),
            },
            block_hash: Some(hash(block)),
            block_number: Some(100),
            block_timestamp: None,
            transaction_hash: Some(hash(200)),
            transaction_index: Some(0),
            log_index: Some(index),
            removed: false,
        }
    }

    struct Setup {
        indexer: BlockIndexer<MockChainClient, SledWatcherDb, MockAbiOracle>,
        db: Arc<SledWatcherDb>,
        events_queue: Arc<JobQueue<SledWatcherDb>>,
    }

    fn setup(client: MockChainClient, oracle: MockAbiOracle) -> Setup {
        let db = Arc::new(SledWatcherDb::open_temporary().unwrap());
        db.upsert_watched_contract(&WatchedContract {
            address: address(0xaa),
            starting_block: 100,
            kind: ContractKind::new("erc20"),
            checkpoint: false,
        })
        .unwrap();

        let cursors = Arc::new(CursorManager::new(db.clone()).unwrap());
        cursors
            .update_chain_head(BlockNumHash::new(hash(99), 1_000), false)
            .unwrap();
        let events_queue = Arc::new(JobQueue::new(
            db.clone(),
            QueueName::Events,
            QueueTuning {
                high_water_mark: 64,
                max_attempts: 3,
                retry_base_ms: 0,
            },
        ));

        Setup {
            indexer: BlockIndexer::new(
                Arc::new(client),
                db.clone(),
                Arc::new(oracle),
                cursors,
                events_queue.clone(),
            ),
            db,
            events_queue,
        }
    }

    #[tokio::test]
    async fn saves_block_with_parsed_events() {
        let mut client = MockChainClient::new();
        client.expect_logs().times(1).returning(|_, addresses| {
            Ok(vec![
                raw_log(addresses[0], 1, 3),
                raw_log(addresses[0], 1, 1),
                // A log from an unwatched contract is skipped.
                raw_log(address(0xbb), 1, 2),
            ])
        });

        let mut oracle = MockAbiOracle::new();
        oracle.expect_parse_log().returning(|_, log| {
            Some(ParsedEvent {
                event_name: "Transfer".to_owned(),
                event_info: json!({ "index": log.log_index }),
                extra_info: json!({}),
            })
        });

        let setup = setup(client, oracle);
        let indexed = setup
            .indexer
            .save_block_and_fetch_events(&header(100, 1, 0))
            .await
            .unwrap();

        assert_eq!(indexed.block.num_events, 2);
        assert_eq!(indexed.block.num_processed_events, 0);
        assert!(!indexed.block.is_complete);
        // Events are ordered by log index.
        assert_eq!(indexed.events[0].index, 1);
        assert_eq!(indexed.events[1].index, 3);

        let sync = setup.db.get_sync_status().unwrap();
        assert_eq!(sync.latest_indexed.unwrap().number, 100);
        assert_eq!(sync.initial_indexed.unwrap().number, 100);
    }

    #[tokio::test]
    async fn repeated_save_is_idempotent() {
        let mut client = MockChainClient::new();
        client
            .expect_logs()
            .times(1)
            .returning(|_, addresses| Ok(vec![raw_log(addresses[0], 1, 0)]));

        let mut oracle = MockAbiOracle::new();
        oracle.expect_parse_log().returning(|_, _| {
            Some(ParsedEvent {
                event_name: "Transfer".to_owned(),
                event_info: json!({}),
                extra_info: json!({}),
            })
        });

        let setup = setup(client, oracle);
        let head = header(100, 1, 0);

        let first = setup
            .indexer
            .save_block_and_fetch_events(&head)
            .await
            .unwrap();
        // Second run must not hit the client again (times(1) above) and must
        // return identical rows.
        let second = setup
            .indexer
            .save_block_and_fetch_events(&head)
            .await
            .unwrap();

        assert_eq!(first.block, second.block);
        assert_eq!(first.events, second.events);
        assert_eq!(setup.db.get_events(hash(1)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_kind_skips_events() {
        let mut client = MockChainClient::new();
        client
            .expect_logs()
            .times(1)
            .returning(|_, addresses| Ok(vec![raw_log(addresses[0], 1, 0)]));

        let mut oracle = MockAbiOracle::new();
        oracle.expect_parse_log().returning(|_, _| None);

        let setup = setup(client, oracle);
        let indexed = setup
            .indexer
            .save_block_and_fetch_events(&header(100, 1, 0))
            .await
            .unwrap();

        assert_eq!(indexed.block.num_events, 0);
        assert!(indexed.events.is_empty());
    }

    #[tokio::test]
    async fn index_by_hash_enqueues_processing_job() {
        let mut client = MockChainClient::new();
        client
            .expect_header_by_hash()
            .times(1)
            .returning(|h| Ok(Some(header(100, h.0[0], 0))));
        client.expect_logs().times(1).returning(|_, _| Ok(vec![]));

        let oracle = MockAbiOracle::new();
        let setup = setup(client, oracle);

        setup.indexer.index_block_by_hash(hash(1)).await.unwrap();

        assert_eq!(setup.events_queue.depth().unwrap(), 1);
        assert!(setup.db.get_block(hash(1)).unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_upstream_block_is_an_error() {
        let mut client = MockChainClient::new();
        client.expect_header_by_hash().returning(|_| Ok(None));

        let setup = setup(client, MockAbiOracle::new());
        let err = setup.indexer.index_block_by_hash(hash(7)).await.unwrap_err();
        assert!(matches!(err, IndexerError::UnknownBlock(h) if h == hash(7)));
    }
}
