use std::{future::Future, sync::Arc};

use tidewatch_common::TaskExecutor;
use tidewatch_db::{JobRecord, WatcherDb};
use tracing::{debug, error};

use crate::queue::JobQueue;

/// How a failed job should be treated.
#[derive(Debug)]
pub enum WorkerFailure {
    /// Nack: the retry/poison policy applies.
    Retry(eyre::Report),
    /// Invariant violation or unrecoverable fault: the worker terminates as
    /// a critical failure and the process shuts down.
    Fatal(eyre::Report),
}

impl WorkerFailure {
    pub fn retry(err: impl Into<eyre::Report>) -> Self {
        WorkerFailure::Retry(err.into())
    }

    pub fn fatal(err: impl Into<eyre::Report>) -> Self {
        WorkerFailure::Fatal(err.into())
    }
}

/// Spawns `count` workers draining `queue` through `handler`.
///
/// Retryable failures nack the job; fatal ones stop the worker (and with it
/// the process). On shutdown each worker finishes its in-flight job, refuses
/// further dequeues, and exits.
pub fn spawn_workers<D, F, Fut>(
    executor: &TaskExecutor,
    queue: Arc<JobQueue<D>>,
    count: usize,
    name: &'static str,
    handler: F,
) where
    D: WatcherDb,
    F: Fn(JobRecord) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerFailure>> + Send,
{
    for worker in 0..count {
        let queue = queue.clone();
        let handler = handler.clone();
        let mut shutdown = executor.shutdown_signal();

        executor.spawn_critical(name, async move {
            loop {
                let Some(lease) = queue.dequeue(&mut shutdown).await? else {
                    debug!(worker, queue = %queue.name(), "worker draining on shutdown");
                    break;
                };

                match handler(lease.job.clone()).await {
                    Ok(()) => queue.ack(&lease)?,
                    Err(WorkerFailure::Retry(err)) => {
                        error!(
                            worker,
                            queue = %queue.name(),
                            block_hash = %lease.job.block_hash,
                            error = %err,
                            "job failed"
                        );
                        queue.nack(&lease)?;
                    }
                    Err(WorkerFailure::Fatal(err)) => {
                        queue.nack(&lease)?;
                        return Err(err);
                    }
                }
            }
            Ok(())
        });
    }
}
