use std::sync::Arc;

use tidewatch_db::WatcherDb;
use tidewatch_primitives::{BlockNumHash, CursorKind, StateSyncStatus, SyncStatus};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{StatusError, StatusResult};

/// Cursor movements to execute inside a block-insert transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexedAdvance {
    pub latest_indexed: Option<BlockNumHash>,
    pub initial_indexed: Option<BlockNumHash>,
}

/// The single authority over the sync cursors.
///
/// Reads go straight to the store; guarded writes validate monotonicity and
/// the cross-cursor invariants before persisting. Watchers receive cursor
/// movements over `tokio::sync::watch` channels.
#[derive(Debug)]
pub struct CursorManager<D> {
    db: Arc<D>,
    head_tx: watch::Sender<Option<BlockNumHash>>,
    canonical_tx: watch::Sender<Option<BlockNumHash>>,
}

impl<D: WatcherDb> CursorManager<D> {
    pub fn new(db: Arc<D>) -> StatusResult<Self> {
        let status = db.get_sync_status()?;
        let (head_tx, _) = watch::channel(status.chain_head);
        let (canonical_tx, _) = watch::channel(status.latest_canonical);
        Ok(Self {
            db,
            head_tx,
            canonical_tx,
        })
    }

    pub fn status(&self) -> StatusResult<SyncStatus> {
        Ok(self.db.get_sync_status()?)
    }

    pub fn state_status(&self) -> StatusResult<StateSyncStatus> {
        Ok(self.db.get_state_sync_status()?)
    }

    /// Observe chain-head movements.
    pub fn subscribe_chain_head(&self) -> watch::Receiver<Option<BlockNumHash>> {
        self.head_tx.subscribe()
    }

    /// Observe canonical-cursor movements.
    pub fn subscribe_latest_canonical(&self) -> watch::Receiver<Option<BlockNumHash>> {
        self.canonical_tx.subscribe()
    }

    /// Advances `chain_head` if `cursor.number` is ahead, or unconditionally
    /// with `force`. Returns whether the cursor moved.
    pub fn update_chain_head(&self, cursor: BlockNumHash, force: bool) -> StatusResult<bool> {
        let status = self.db.get_sync_status()?;
        if !Self::should_advance(status.chain_head, cursor.number, force) {
            return Ok(false);
        }
        self.db.set_cursor(CursorKind::ChainHead, cursor)?;
        let _ = self.head_tx.send(Some(cursor));
        debug!(number = cursor.number, hash = %cursor.hash, "chain head advanced");
        Ok(true)
    }

    /// Validates a `latest_indexed` advance for the insert transaction.
    ///
    /// Returns the cursor values to hand to
    /// `WatcherDb::insert_block_with_events`; empty when the cursor would not
    /// move. Refuses to pass `chain_head` without `force`.
    pub fn plan_indexed_advance(
        &self,
        cursor: BlockNumHash,
        force: bool,
    ) -> StatusResult<IndexedAdvance> {
        let status = self.db.get_sync_status()?;

        if !force {
            if let Some(head) = status.chain_head {
                if cursor.number > head.number {
                    return Err(StatusError::AheadOfChainHead {
                        attempted: cursor.number,
                        chain_head: head.number,
                    });
                }
            }
        }

        let latest_indexed =
            Self::should_advance(status.latest_indexed, cursor.number, force).then_some(cursor);

        let initial_indexed = status.initial_indexed.is_none().then_some(cursor);

        Ok(IndexedAdvance {
            latest_indexed,
            initial_indexed,
        })
    }

    /// Validates a `latest_canonical` advance for the completion transaction.
    ///
    /// `pending_indexed` is a `latest_indexed` advance committing in the same
    /// transaction; the `canonical <= indexed` invariant is checked against
    /// the effective value.
    pub fn plan_canonical_advance(
        &self,
        cursor: BlockNumHash,
        pending_indexed: Option<BlockNumHash>,
        force: bool,
    ) -> StatusResult<Option<BlockNumHash>> {
        let status = self.db.get_sync_status()?;

        let latest_indexed = status
            .latest_indexed
            .map(|c| c.number)
            .unwrap_or(0)
            .max(pending_indexed.map(|c| c.number).unwrap_or(0));
        if cursor.number > latest_indexed {
            return Err(StatusError::AboveLatestIndexed {
                attempted: cursor.number,
                latest_indexed,
            });
        }

        Ok(Self::should_advance(status.latest_canonical, cursor.number, force).then_some(cursor))
    }

    /// Publishes a canonical advance after its transaction committed.
    pub fn publish_canonical(&self, cursor: BlockNumHash) {
        let _ = self.canonical_tx.send(Some(cursor));
    }

    /// Forced rewind used exclusively by the reorg handler: moves
    /// `latest_indexed` down to `cursor` when it currently sits above it, and
    /// caps `latest_canonical` at `cursor.number`.
    pub fn force_rewind(&self, cursor: BlockNumHash) -> StatusResult<()> {
        let status = self.db.get_sync_status()?;

        if status
            .latest_indexed
            .is_some_and(|current| current.number > cursor.number)
        {
            self.db.set_cursor(CursorKind::LatestIndexed, cursor)?;
        }
        if status
            .latest_canonical
            .is_some_and(|current| current.number > cursor.number)
        {
            self.db.set_cursor(CursorKind::LatestCanonical, cursor)?;
            let _ = self.canonical_tx.send(Some(cursor));
        }
        warn!(number = cursor.number, hash = %cursor.hash, "cursors rewound");
        Ok(())
    }

    /// Monotone update of the materializer's indexed cursor.
    pub fn update_state_sync_indexed(&self, number: u64, force: bool) -> StatusResult<bool> {
        let status = self.db.get_state_sync_status()?;
        if !Self::should_advance_number(status.latest_indexed_block_number, number, force) {
            return Ok(false);
        }
        self.db.set_state_sync_indexed(number)?;
        Ok(true)
    }

    /// Monotone update of the materializer's checkpoint cursor.
    pub fn update_state_sync_checkpoint(&self, number: u64, force: bool) -> StatusResult<bool> {
        let status = self.db.get_state_sync_status()?;
        if !Self::should_advance_number(status.latest_checkpoint_block_number, number, force) {
            return Ok(false);
        }
        self.db.set_state_sync_checkpoint(number)?;
        Ok(true)
    }

    fn should_advance(current: Option<BlockNumHash>, attempted: u64, force: bool) -> bool {
        Self::should_advance_number(current.map(|c| c.number), attempted, force)
    }

    /// The shared monotonicity rule: advance when ahead of the current value
    /// or when forced. Anything at or below the current value is a no-op, so
    /// a cursor can never regress without `force`.
    fn should_advance_number(current: Option<u64>, attempted: u64, force: bool) -> bool {
        force || current.is_none_or(|current| attempted > current)
    }
}
