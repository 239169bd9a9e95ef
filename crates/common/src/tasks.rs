//! Minimal task lifecycle management for long-running services.
//!
//! Critical tasks are spawned through [`TaskExecutor`]; a failing critical
//! task triggers a process-wide shutdown signal that every worker observes at
//! its next suspension point. In-flight work (current transaction, current
//! job) completes before the worker exits.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

/// Cloneable receiver half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Completes once shutdown has been triggered.
    pub async fn wait(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // An Err means the sender is gone, which we treat as shutdown too.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Spawns named critical tasks and coordinates graceful shutdown.
#[derive(Debug)]
pub struct TaskExecutor {
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    failed: std::sync::Arc<AtomicBool>,
}

impl TaskExecutor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            failed: std::sync::Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawns a critical task. If it returns an error the whole process is
    /// asked to shut down.
    pub fn spawn_critical<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let shutdown_tx = self.shutdown_tx.clone();
        let failed = self.failed.clone();
        let handle = tokio::spawn(async move {
            match fut.await {
                Ok(()) => info!(task = name, "task exited"),
                Err(error) => {
                    error!(task = name, %error, "critical task failed; shutting down");
                    failed.store(true, Ordering::SeqCst);
                    let _ = shutdown_tx.send(true);
                }
            }
        });
        self.tasks.lock().push((name, handle));
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for ctrl-c or an internal shutdown trigger, then joins all
    /// spawned tasks. Returns `false` if any critical task failed, so the
    /// process can exit non-zero.
    pub async fn monitor(self) -> bool {
        let mut signal = self.shutdown_signal();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "failed to listen for ctrl-c");
                }
                info!("interrupt received; shutting down");
                self.trigger_shutdown();
            }
            _ = signal.wait() => {}
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for (name, handle) in tasks {
            if let Err(error) = handle.await {
                warn!(task = name, %error, "task join failed");
            }
        }

        !self.failed.load(Ordering::SeqCst)
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn failed_critical_task_triggers_shutdown() {
        let executor = TaskExecutor::new();
        let mut signal = executor.shutdown_signal();

        executor.spawn_critical("failing", async { Err(eyre::eyre!("boom")) });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("shutdown should be triggered");
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn clean_exit_does_not_trigger_shutdown() {
        let executor = TaskExecutor::new();
        let signal = executor.shutdown_signal();

        executor.spawn_critical("clean", async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn workers_observe_manual_trigger() {
        let executor = TaskExecutor::new();
        let mut signal = executor.shutdown_signal();

        executor.spawn_critical("worker", async move {
            signal.wait().await;
            Ok(())
        });

        executor.trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(1), executor.monitor())
            .await
            .expect("monitor should join tasks after trigger");
    }
}
