use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

/// Owns the shutdown token shared by every worker and tracks the worker
/// tasks so shutdown can wait for all of them.
///
/// A worker returning an error cancels the others; the supervisor then
/// reports failure once everything has stopped.
#[derive(Debug, Default)]
pub struct Supervisor {
    cancel: CancellationToken,
    tracker: TaskTracker,
    failed: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn<F>(&self, worker: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let failed = Arc::clone(&self.failed);

        self.tracker.spawn(async move {
            match task.await {
                Ok(()) => info!(worker, "worker exited"),
                Err(err) => {
                    error!(worker, error = ?err, "worker failed, shutting down");
                    failed.store(true, Ordering::SeqCst);
                    cancel.cancel();
                }
            }
        });
    }

    /// Waits for `shutdown` (or a failing worker), broadcasts cancellation
    /// and blocks until every tracked task has finished.
    pub async fn run_until<S>(self, shutdown: S) -> anyhow::Result<()>
    where
        S: Future<Output = ()>,
    {
        self.tracker.close();

        tokio::select! {
            _ = shutdown => {
                info!("shutdown requested, stopping workers");
                self.cancel.cancel();
            }
            _ = self.cancel.cancelled() => {}
        }

        self.tracker.wait().await;

        if self.failed.load(Ordering::SeqCst) {
            anyhow::bail!("a worker exited with an error");
        }
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(signal = "SIGINT", "Received signal"),
            Err(err) => {
                error!(error = %err, "failed to listen for SIGINT");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(signal = "SIGTERM", "Received signal");
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
