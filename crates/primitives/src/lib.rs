//! Core data model for the tidewatch chain-indexing pipeline.
//!
//! These types are shared by the database layer, the indexer/processor
//! workers, and the state materializer. They carry no persistence or
//! transport concerns; the database crate keeps its own serialization
//! mirrors of them.

mod block;
mod contract;
mod event;
mod state;
mod sync;

pub use block::{BlockHash, BlockNumHash, BlockRecord};
pub use contract::{ContractKind, WatchedContract};
pub use event::EventRecord;
pub use state::{Cid, StateKind, StateRecord};
pub use sync::{CursorKind, StateSyncStatus, SyncStatus};
