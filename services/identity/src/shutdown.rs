//! Graceful shutdown of background tasks.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Owns background tasks and tells them when to stop.
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tasks.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// A receiver for the shutdown signal.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawn a tracked task. The future receives its own shutdown signal
    /// and is expected to return once it fires.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let future = task(self.subscribe());
        self.tasks.spawn(async move {
            future.await;
            info!(task = name, "Background task stopped");
        });
    }

    /// Signal every task and wait up to `timeout` for them to finish,
    /// aborting stragglers.
    pub async fn shutdown(mut self, timeout: Duration) {
        info!("Initiating graceful shutdown");
        let _ = self.shutdown_tx.send(());

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout reached, aborting remaining tasks");
            self.tasks.abort_all();
        }
        info!("Shutdown complete");
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver.
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
}

impl ShutdownSignal {
    /// Wait for the signal. Also returns if the coordinator is dropped.
    pub async fn recv(&mut self) {
        let _ = self.receiver.recv().await;
    }
}

/// Wait for Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating shutdown");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_tasks_observe_shutdown() {
        let mut coordinator = ShutdownCoordinator::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&stopped);
        coordinator.spawn("waiter", move |mut signal| async move {
            signal.recv().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(coordinator.task_count(), 1);

        coordinator.shutdown(Duration::from_secs(1)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.spawn("stuck", |_signal| std::future::pending::<()>());

        let started = std::time::Instant::now();
        coordinator.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
