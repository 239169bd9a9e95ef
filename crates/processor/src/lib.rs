//! Block processing: replays events into derived state, drives blocks to
//! completion, and resolves chain reorganizations.
//!
//! The processor drains the `events` queue. For each block it verifies
//! parent linkage (backfilling missing ancestors through the indexer),
//! detects divergence from the canonical chain, applies events in strict log
//! order with per-event progress persisted, and on completion materializes
//! staged diffs, advances the canonical cursor, promotes finalized diffs,
//! and cuts checkpoints at the configured cadence.

mod ctx;
mod error;
mod process;
mod reorg;
#[cfg(test)]
mod tests;

pub use ctx::{ProcessorCtx, ProcessorTuning};
pub use error::{ProcessorError, ProcessorResult};
pub use process::{events_job_handler, process_block, ProcessOutcome};
pub use reorg::handle_reorg;
