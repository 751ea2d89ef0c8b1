//! Deployment worker: drains the queue on a fixed interval

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::deploy::engine::Reconciler;
use crate::purge::notifier::PurgeNotifier;
use crate::queue::deploy_queue::DeployQueue;

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between drains
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Tally of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Checkouts changed (and purged, when enabled)
    pub deployed: usize,

    /// Requests that needed no action
    pub skipped: usize,

    /// Requests that were rejected or whose commands failed
    pub failed: usize,

    /// Purge calls that failed
    pub purge_failures: usize,
}

/// Run the deployer worker
pub async fn run<S, F>(
    options: &Options,
    queue: &DeployQueue,
    reconciler: &Reconciler,
    notifier: &PurgeNotifier,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Deployer worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let report = drain_once(queue, reconciler, notifier).await;
        if report != DrainReport::default() {
            info!(
                "Drain finished: {} deployed, {} skipped, {} failed, {} purge failures",
                report.deployed, report.skipped, report.failed, report.purge_failures
            );
        }
    }
}

/// Take the queue snapshot and deploy each entry in turn. One failure never
/// stops the rest of the snapshot.
pub async fn drain_once(
    queue: &DeployQueue,
    reconciler: &Reconciler,
    notifier: &PurgeNotifier,
) -> DrainReport {
    let snapshot = queue.drain();
    let mut report = DrainReport::default();
    if snapshot.is_empty() {
        return report;
    }
    debug!("Draining {} pending deployments", snapshot.len());

    for (target_dir, request) in snapshot {
        match reconciler.reconcile(&request).await {
            Ok(action) if action.deploys() => {
                report.deployed += 1;
                report.purge_failures += notifier.notify(&request).await.len();
            }
            Ok(_) => report.skipped += 1,
            Err(e) => {
                warn!(
                    "Could not deploy {} to {} (pushed by {}): {}",
                    request.source_url, target_dir, request.committer, e
                );
                report.failed += 1;
            }
        }
    }
    report
}
