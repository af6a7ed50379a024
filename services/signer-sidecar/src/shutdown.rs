//! Graceful shutdown.
//!
//! One cancellation signal, raised once, fans out to every background task;
//! the coordinator owns the tasks and joins them on the way down.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
pub struct ShutdownCoordinator {
    /// Raised once at shutdown
    shutdown_tx: watch::Sender<bool>,
    /// Background tasks joined on shutdown
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawns a background task that will be joined on shutdown.
    ///
    /// The task observes cancellation itself through a [`ShutdownSignal`].
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            future.await;
            info!(task = name, "Background task finished");
        });
    }

    /// Raises the cancellation signal without waiting for tasks
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Raises the signal and joins all tasks, aborting them after `timeout`
    pub async fn shutdown(mut self, timeout: Duration) {
        info!("Initiating graceful shutdown");

        self.trigger();

        let shutdown_result = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        match shutdown_result {
            Ok(()) => info!("All tasks completed gracefully"),
            Err(_) => {
                warn!("Shutdown timeout reached, aborting remaining tasks");
                self.tasks.abort_all();
            }
        }

        info!("Shutdown complete");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Checks if shutdown has been signaled (non-blocking)
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits for the shutdown signal.
    ///
    /// Resolves immediately if it was already raised or the coordinator is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.receiver.wait_for(|raised| *raised).await;
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_signal_reaches_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut first = coordinator.subscribe();
        let second = coordinator.subscribe();
        assert!(!first.is_shutdown());

        coordinator.trigger();

        first.cancelled().await;
        assert!(first.is_shutdown());
        assert!(second.is_shutdown());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_signal() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();

        let mut late = coordinator.subscribe();
        assert!(late.is_shutdown());
        late.cancelled().await;
    }

    #[tokio::test]
    async fn test_shutdown_joins_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        let finished = Arc::new(AtomicBool::new(false));

        let mut signal = coordinator.subscribe();
        let flag = finished.clone();
        coordinator.spawn("waiter", async move {
            signal.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        coordinator.shutdown(Duration::from_secs(1)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.spawn("stuck", std::future::pending());

        coordinator.shutdown(Duration::from_secs(5)).await;
    }
}
