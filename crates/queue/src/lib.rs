//! Durable job queues and worker pools.
//!
//! Jobs live in the watcher database (one table per named queue), so a
//! restart resumes exactly where the pipeline stopped. The in-process layer
//! adds delivery order, per-block-hash mutual exclusion, retry with
//! exponential backoff, poisoning after the retry budget, and high-water
//! backpressure on enqueue.

mod error;
mod metrics;
mod queue;
mod worker;

pub use error::{QueueError, QueueResult};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{JobQueue, LeasedJob, QueueTuning};
pub use worker::{spawn_workers, WorkerFailure};
