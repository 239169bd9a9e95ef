//! Persistence layer for the tidewatch pipeline.
//!
//! The [`WatcherDb`] trait is the transactional store interface consumed by
//! the indexer, processor, materializer, and job queue. The sled
//! implementation groups the keyspaces into two transactional domains (the
//! chain tree and the state tree) so every multi-row write commits or rolls
//! back as one unit.

mod error;
mod jobs;
mod sleddb;
mod traits;
mod types;

pub use error::{DbError, DbResult};
pub use jobs::{JobKey, JobRecord, QueueName};
pub use sleddb::{init_watcher_db, SledWatcherDb};
pub use traits::WatcherDb;
