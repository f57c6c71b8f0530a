//! Periodic cleanup of stale uploads and artifacts.
//!
//! Every `interval` the reaper deletes staged files whose modification time
//! is older than `max_age`. Runs independently of request handling; errors
//! on individual files are logged by the store and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use docrelay_core::staging::StagingStore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How long [`ReaperHandle::shutdown`] waits for the task to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owned handle to the running reaper task.
pub struct ReaperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for its current pass to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.task).await.is_err() {
            tracing::warn!("Upload reaper did not stop within the grace period");
        }
    }
}

/// Spawn the reaper on the current runtime.
pub fn spawn(staging: Arc<StagingStore>, interval: Duration, max_age: Duration) -> ReaperHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(staging, interval, max_age, cancel.clone()));
    ReaperHandle { cancel, task }
}

/// Run the cleanup loop until `cancel` is triggered.
///
/// The first pass happens one `interval` after start.
pub async fn run(
    staging: Arc<StagingStore>,
    interval: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        max_age_secs = max_age.as_secs(),
        root = %staging.root().display(),
        "Upload reaper started"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Upload reaper stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = staging.purge_older_than(max_age).await;
                if report.deleted > 0 || report.failed > 0 {
                    tracing::info!(
                        scanned = report.scanned,
                        deleted = report.deleted,
                        failed = report.failed,
                        "Upload reaper: pass complete"
                    );
                } else {
                    tracing::debug!(scanned = report.scanned, "Upload reaper: nothing to purge");
                }
            }
        }
    }
}
