//! Guarded sync-cursor management.
//!
//! The five pipeline cursors (chain head, latest indexed, latest canonical,
//! initial indexed, and the state-side pair) only move through this crate.
//! Normal updates are monotone; `force` is reserved for the reorg handler and
//! administrative resets. Cursor movements that must be atomic with block or
//! state writes are *planned* here, executed inside the database transaction,
//! and published afterwards.

mod error;
mod manager;

pub use error::{StatusError, StatusResult};
pub use manager::{CursorManager, IndexedAdvance};
