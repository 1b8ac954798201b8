//! Periodic sync trigger
//!
//! Fires [`SyncOrchestrator::sync`] on a fixed interval until the
//! cancellation token is triggered. The first pass runs immediately. A tick
//! that lands while a pass is still running is folded into it by the
//! orchestrator's single-flight guard, so passes never overlap.
//!
//! Hosts that react to file-change events call
//! [`SyncOrchestrator::sync`] directly; the scheduler is only the timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{SyncOrchestrator, SyncOutcome, SyncReport};

/// Runs sync passes every `interval` until `cancel` fires
///
/// Cancellation is observed between passes and while a pass is running;
/// an interrupted pass releases the orchestrator's in-flight guard.
pub async fn run_periodic(
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs(), "Periodic sync started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    report = orchestrator.sync() => log_report(&report),
                }
            }
        }
    }

    info!("Periodic sync stopped");
}

fn log_report(report: &SyncReport) {
    match &report.outcome {
        SyncOutcome::Completed if report.errors.is_empty() => info!(
            uploaded = report.files_uploaded,
            duration_ms = report.duration_ms,
            "Scheduled sync completed"
        ),
        SyncOutcome::Completed => warn!(
            uploaded = report.files_uploaded,
            failed = report.errors.len(),
            "Scheduled sync completed with errors"
        ),
        SyncOutcome::Unauthenticated => warn!(
            uploaded = report.files_uploaded,
            "Scheduled sync stopped: sign-in required"
        ),
        SyncOutcome::Aborted(reason) => warn!(%reason, "Scheduled sync aborted"),
        SyncOutcome::Coalesced => {}
    }
}
