//! One-way sync orchestrator
//!
//! The [`SyncOrchestrator`] pushes every file of the local vault to the
//! remote base folder, replacing whatever is there. It never downloads and
//! never deletes remote items.
//!
//! ## Pass Flow
//!
//! 1. **Credentials**: without a usable credential the pass stops at
//!    `Unauthenticated` and makes no remote calls
//! 2. **Enumerate**: walk the local root; a missing root aborts the pass
//! 3. **Upload**: one upload per file; failures are collected and the pass
//!    moves on to the next file. An authentication failure stops the pass
//!    instead, since no later upload can succeed without a new sign-in
//! 4. **Status**: `Idle` when every upload succeeded, `Unauthenticated` after
//!    an authentication failure, otherwise `Error("N of M files failed")`
//!
//! ## Single Flight
//!
//! At most one pass runs at a time. A trigger arriving while a pass is in
//! flight returns [`SyncOutcome::Coalesced`] immediately and marks a
//! follow-up; the in-flight caller then runs exactly one more pass before
//! returning, however many triggers were coalesced.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vaultdrive_core::domain::{DriveError, SyncJob, SyncStatus};
use vaultdrive_core::ports::IRemoteDrive;

use crate::walker::LocalTreeWalker;

/// How a sync call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every file was attempted; see [`SyncReport::errors`] for failures
    Completed,
    /// No usable credential, or the credential was rejected mid-pass
    Unauthenticated,
    /// The pass could not enumerate the local tree
    Aborted(String),
    /// Another pass was in flight; this trigger was folded into it
    Coalesced,
}

/// A file that failed to upload during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    /// Remote relative path of the file
    pub path: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: DriveError,
}

/// Summary of a sync call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Number of files uploaded successfully
    pub files_uploaded: u32,
    /// Number of files found in the local tree
    pub files_total: u32,
    /// Per-file failures (non-fatal)
    pub errors: Vec<SyncFailure>,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    fn empty(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            files_uploaded: 0,
            files_total: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Returns true if the pass ran to completion without any failure
    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Completed && self.errors.is_empty()
    }

    pub fn files_failed(&self) -> u32 {
        self.errors.len() as u32
    }
}

fn serialize_display<S: Serializer>(error: &DriveError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Releases the in-flight flag when dropped, including on cancellation
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives sync passes from the local root to the remote drive
pub struct SyncOrchestrator {
    remote: Arc<dyn IRemoteDrive>,
    local_root: PathBuf,
    status: watch::Sender<SyncStatus>,
    in_flight: AtomicBool,
    follow_up: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(remote: Arc<dyn IRemoteDrive>, local_root: impl Into<PathBuf>) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            remote,
            local_root: local_root.into(),
            status,
            in_flight: AtomicBool::new(false),
            follow_up: AtomicBool::new(false),
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Returns true while a pass is running
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs a sync pass, or coalesces into the one already running
    ///
    /// Never fails: per-file and pass-level problems are reported through
    /// the returned [`SyncReport`] and the status channel.
    #[tracing::instrument(skip(self), fields(root = %self.local_root.display()))]
    pub async fn sync(&self) -> SyncReport {
        let mut guard = match FlightGuard::try_acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                self.follow_up.store(true, Ordering::Release);
                // The running pass may have released between the two checks
                match FlightGuard::try_acquire(&self.in_flight) {
                    Some(guard) => guard,
                    None => {
                        debug!("Sync already in flight, trigger coalesced");
                        return SyncReport::empty(SyncOutcome::Coalesced);
                    }
                }
            }
        };

        loop {
            self.follow_up.store(false, Ordering::Release);
            let report = self.run_pass().await;
            drop(guard);

            if !self.follow_up.load(Ordering::Acquire) {
                return report;
            }
            guard = match FlightGuard::try_acquire(&self.in_flight) {
                Some(guard) => guard,
                // A coalesced caller took over the follow-up pass
                None => return report,
            };
            debug!("Running follow-up pass for coalesced triggers");
        }
    }

    async fn run_pass(&self) -> SyncReport {
        let start = Instant::now();

        if !self.remote.has_credentials().await {
            info!("No usable credential, sync skipped");
            self.status.send_replace(SyncStatus::Unauthenticated);
            return SyncReport::empty(SyncOutcome::Unauthenticated);
        }

        self.status.send_replace(SyncStatus::Syncing);

        let jobs = match LocalTreeWalker::enumerate(&self.local_root).await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(%err, "Cannot enumerate local root, sync aborted");
                self.status.send_replace(SyncStatus::Error(err.to_string()));
                return SyncReport {
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..SyncReport::empty(SyncOutcome::Aborted(err.to_string()))
                };
            }
        };

        let mut report = SyncReport::empty(SyncOutcome::Completed);
        report.files_total = jobs.len() as u32;

        for job in &jobs {
            match self.upload_job(job).await {
                Ok(()) => report.files_uploaded += 1,
                Err(err) => {
                    warn!(path = %job.remote_relative_path, %err, "Upload failed");
                    let is_auth = err.is_auth();
                    report.errors.push(SyncFailure {
                        path: job.remote_relative_path.clone(),
                        error: err,
                    });
                    // Every later upload would hit the token endpoint again
                    if is_auth {
                        report.outcome = SyncOutcome::Unauthenticated;
                        break;
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        let status = if report.outcome == SyncOutcome::Unauthenticated {
            warn!(
                uploaded = report.files_uploaded,
                "Credential rejected, sync stopped until sign-in"
            );
            SyncStatus::Unauthenticated
        } else if report.errors.is_empty() {
            SyncStatus::Idle
        } else {
            SyncStatus::Error(format!(
                "{} of {} files failed",
                report.errors.len(),
                jobs.len()
            ))
        };
        self.status.send_replace(status);

        info!(
            uploaded = report.files_uploaded,
            failed = report.errors.len(),
            duration_ms = report.duration_ms,
            "Sync pass finished"
        );
        report
    }

    async fn upload_job(&self, job: &SyncJob) -> Result<(), DriveError> {
        let data = tokio::fs::read(&job.local_path)
            .await
            .map_err(|e| DriveError::local_fs(&job.local_path, e.to_string()))?;

        debug!(path = %job.remote_relative_path, bytes = data.len(), "Uploading");
        self.remote.upload(&job.remote_relative_path, &data).await?;
        Ok(())
    }
}
