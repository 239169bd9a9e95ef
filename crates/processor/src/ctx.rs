use std::sync::Arc;

use tidewatch_chain_client::ChainClient;
use tidewatch_db::WatcherDb;
use tidewatch_indexer::{AbiOracle, BlockIndexer};
use tidewatch_queue::JobQueue;
use tidewatch_state::{EventReducer, Materializer, StateSink};
use tidewatch_status::CursorManager;

/// Tuning knobs of the processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorTuning {
    /// Walking back further than this during reorg resolution is fatal.
    pub max_reorg_depth: u64,
    /// Parent backfill gives up after this many missing ancestors.
    pub max_backfill_depth: u64,
    /// Heights at or below `chain_head - prune_depth` are final; staged
    /// diffs there are promoted.
    pub prune_depth: u64,
    /// Blocks between automatic checkpoints; 0 disables the cadence.
    pub checkpoint_interval: u64,
}

/// Capabilities and tuning shared by the processor workers.
///
/// The state sink is optional; presence is checked by holding the interface,
/// not by probing methods.
pub struct ProcessorCtx<C, D, O, R> {
    pub client: Arc<C>,
    pub db: Arc<D>,
    pub cursors: Arc<CursorManager<D>>,
    pub materializer: Arc<Materializer<D>>,
    pub indexer: Arc<BlockIndexer<C, D, O>>,
    pub reducer: Arc<R>,
    pub events_queue: Arc<JobQueue<D>>,
    pub sink: Option<Arc<dyn StateSink>>,
    pub tuning: ProcessorTuning,
}

impl<C, D, O, R> ProcessorCtx<C, D, O, R>
where
    C: ChainClient,
    D: WatcherDb,
    O: AbiOracle,
    R: EventReducer,
{
    /// Height at or below which blocks are final for promotion purposes.
    pub(crate) fn prune_horizon(&self, chain_head: Option<u64>) -> Option<u64> {
        chain_head.map(|head| head.saturating_sub(self.tuning.prune_depth))
    }
}

impl<C, D, O, R> std::fmt::Debug for ProcessorCtx<C, D, O, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorCtx")
            .field("tuning", &self.tuning)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}
