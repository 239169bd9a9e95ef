//! Block ingestion: pulls blocks and their watched-contract events from the
//! upstream chain and persists them atomically.
//!
//! The head follower polls the upstream tip and enqueues one `block` job per
//! newly observed height; `block` workers drive [`BlockIndexer`], which
//! writes the block with its parsed events in one transaction and then
//! enqueues the `events` job that hands the block to the processor.

mod error;
mod follower;
mod indexer;
mod oracle;

pub use error::{IndexerError, IndexerResult};
pub use follower::{head_follower_task, HeadFollowerCtx};
pub use indexer::{BlockIndexer, IndexedBlock};
pub use oracle::{AbiOracle, ParsedEvent, RawLogOracle};

#[cfg(any(test, feature = "test-utils"))]
pub use oracle::MockAbiOracle;
