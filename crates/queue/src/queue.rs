use std::{collections::HashSet, sync::Arc, time::Duration};

use alloy_primitives::B256;
use parking_lot::Mutex;
use tidewatch_common::{backoff_delay, unix_time_millis, ShutdownSignal};
use tidewatch_db::{JobKey, JobRecord, QueueName, WatcherDb};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::{
    error::QueueResult,
    metrics::{QueueMetrics, QueueMetricsSnapshot},
};

/// How many queue rows one claim pass inspects.
const SCAN_LIMIT: usize = 256;

/// Fallback wake-up while waiting for work or for backpressure to clear.
const WAIT_TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct QueueTuning {
    /// Enqueues wait while depth exceeds this.
    pub high_water_mark: u64,
    /// Delivery attempts before the job is poisoned.
    pub max_attempts: u32,
    /// Base of the exponential retry backoff.
    pub retry_base_ms: u64,
}

/// A claimed job. The claim holds the per-block-hash exclusion until the
/// worker acks or nacks.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub key: JobKey,
    pub job: JobRecord,
}

/// One named durable queue.
///
/// Delivery order is (priority, FIFO). For a given `block_hash` at most one
/// job is in the running state at any time; a second job for the same hash
/// stays queued until the first is acked or nacked.
#[derive(Debug)]
pub struct JobQueue<D> {
    db: Arc<D>,
    queue: QueueName,
    tuning: QueueTuning,
    running: Mutex<HashSet<B256>>,
    wake: Notify,
    metrics: Arc<QueueMetrics>,
}

impl<D: WatcherDb> JobQueue<D> {
    pub fn new(db: Arc<D>, queue: QueueName, tuning: QueueTuning) -> Self {
        Self {
            db,
            queue,
            tuning,
            running: Mutex::new(HashSet::new()),
            wake: Notify::new(),
            metrics: Arc::new(QueueMetrics::default()),
        }
    }

    pub fn name(&self) -> QueueName {
        self.queue
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn depth(&self) -> QueueResult<u64> {
        Ok(self.db.queue_depth(self.queue)?)
    }

    /// Enqueues a job, waiting while the queue is above its high-water mark.
    pub async fn enqueue(&self, hash: B256, number: u64, priority: u8) -> QueueResult<()> {
        loop {
            if self.db.queue_depth(self.queue)? <= self.tuning.high_water_mark {
                break;
            }
            debug!(queue = %self.queue, "queue above high-water mark; waiting");
            let _ = tokio::time::timeout(WAIT_TICK, self.wake.notified()).await;
        }

        let job = JobRecord::new(hash, number, priority, unix_time_millis());
        self.db.enqueue_job(self.queue, &job)?;
        self.wake.notify_waiters();
        Ok(())
    }

    /// Claims the next deliverable job, waiting until one is available or
    /// shutdown is triggered (then returns `None`).
    pub async fn dequeue(&self, shutdown: &mut ShutdownSignal) -> QueueResult<Option<LeasedJob>> {
        loop {
            if shutdown.is_triggered() {
                return Ok(None);
            }
            if let Some(lease) = self.try_claim()? {
                return Ok(Some(lease));
            }
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(WAIT_TICK) => {}
                _ = shutdown.wait() => return Ok(None),
            }
        }
    }

    fn try_claim(&self) -> QueueResult<Option<LeasedJob>> {
        let now = unix_time_millis();
        let jobs = self.db.scan_jobs(self.queue, SCAN_LIMIT)?;

        let mut running = self.running.lock();
        for (key, job) in jobs {
            if job.next_retry_at_ms > now {
                continue;
            }
            if running.contains(&job.block_hash) {
                continue;
            }
            running.insert(job.block_hash);
            return Ok(Some(LeasedJob { key, job }));
        }
        Ok(None)
    }

    /// Completes a job: the row is removed and the key exclusion released.
    pub fn ack(&self, lease: &LeasedJob) -> QueueResult<()> {
        self.db.remove_job(self.queue, lease.key)?;
        self.running.lock().remove(&lease.job.block_hash);
        self.metrics.note_completed();
        self.wake.notify_waiters();
        Ok(())
    }

    /// Fails a job: schedules a retry with exponential backoff, or poisons
    /// it once the attempt budget is spent.
    pub fn nack(&self, lease: &LeasedJob) -> QueueResult<()> {
        let mut job = lease.job.clone();
        job.attempts += 1;

        if job.attempts >= self.tuning.max_attempts {
            warn!(
                queue = %self.queue,
                block_hash = %job.block_hash,
                attempts = job.attempts,
                "job exhausted retries; poisoning"
            );
            self.db.poison_job(self.queue, lease.key, &job)?;
            self.metrics.note_poisoned();
        } else {
            let delay = backoff_delay(self.tuning.retry_base_ms, job.attempts - 1);
            job.next_retry_at_ms = unix_time_millis() + delay.as_millis() as u64;
            self.db.update_job(self.queue, lease.key, &job)?;
            self.metrics.note_retried();
        }

        self.running.lock().remove(&lease.job.block_hash);
        self.wake.notify_waiters();
        Ok(())
    }
}
