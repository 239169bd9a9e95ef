//! Contract state materialization.
//!
//! Processed events become contract-scoped state records: one `init` per
//! contract at its starting block, a staged diff per block that changed the
//! contract, promotion of staged diffs as their blocks finalize, and
//! checkpoints that compact the diff chain. Records are content addressed
//! and linked into a per-contract parent-CID chain.

mod canonical;
mod cid;
mod error;
mod fill;
mod materializer;
mod payload;
mod reducer;
mod sink;

pub use canonical::canonical_json_bytes;
pub use cid::{block_cid, compute_cid};
pub use error::{StateError, StateResult};
pub use fill::{FillBlock, FillSummary};
pub use materializer::Materializer;
pub use payload::{PayloadBlockRef, PayloadMeta, StatePayload};
pub use reducer::{ContractState, EventReducer, EventTallyReducer};
pub use sink::StateSink;

#[cfg(any(test, feature = "test-utils"))]
pub use reducer::MockEventReducer;
#[cfg(any(test, feature = "test-utils"))]
pub use sink::MockStateSink;
