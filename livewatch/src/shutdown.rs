//! Cooperative shutdown controller.
//!
//! Owns the supervised task set for background work: ingest batches and the sweeper
//! loop are both spawned through [`ShutdownController::spawn`], so `drain` waits for them.
//! `server.rs` combines this with OS signals to perform graceful shutdown.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Cooperative shutdown signal and background task supervisor.
///
/// Shutdown happens in two phases: `request_shutdown` stops new work from being
/// accepted and wakes idle loops, then `drain` waits for tracked tasks and cancels the
/// stragglers once the grace period runs out.
#[derive(Clone, Debug, Default)]
pub struct ShutdownController {
    requested: CancellationToken,
    abort: CancellationToken,
    tasks: TaskTracker,
}

impl ShutdownController {
    /// Returns true if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.is_cancelled()
    }

    /// Request shutdown and wake all waiters.
    pub fn request_shutdown(&self) {
        self.requested.cancel();
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&self) {
        self.requested.cancelled().await;
    }

    /// Token cancelled when shutdown is requested (idle loops exit on it).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.requested.clone()
    }

    /// Token cancelled when in-flight work must be abandoned.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Number of tracked tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn a tracked background task.
    ///
    /// Returns `None` once shutdown has been requested.
    pub fn spawn<F>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown_requested() {
            return None;
        }
        Some(self.tasks.spawn(task))
    }

    /// Wait for tracked tasks, cancelling whatever is left after `grace`.
    ///
    /// Returns true if every task finished within the grace period.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.request_shutdown();
        self.tasks.close();

        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight background tasks");
        }

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_ok() {
            return true;
        }

        warn!(
            remaining = self.tasks.len(),
            grace_secs = grace.as_secs_f64(),
            "Grace period elapsed, cancelling remaining background tasks"
        );
        self.abort.cancel();
        self.tasks.wait().await;
        false
    }
}
