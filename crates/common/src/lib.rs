//! Ambient plumbing shared by the tidewatch binaries and worker crates:
//! logging setup, task lifecycle management, and small time/backoff helpers.

pub mod logging;
mod retry;
mod tasks;
mod time;

pub use retry::backoff_delay;
pub use tasks::{ShutdownSignal, TaskExecutor};
pub use time::{unix_time_millis, unix_time_secs};
