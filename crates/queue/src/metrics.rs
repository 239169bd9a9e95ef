use std::sync::atomic::{AtomicU64, Ordering};

/// Plain counters surfaced by each queue.
///
/// `poisoned` is the operator-facing signal that a job exhausted its retry
/// budget and needs intervention.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    completed: AtomicU64,
    retried: AtomicU64,
    poisoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub completed: u64,
    pub retried: u64,
    pub poisoned: u64,
}

impl QueueMetrics {
    pub(crate) fn note_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_poisoned(&self) {
        self.poisoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
        }
    }
}
