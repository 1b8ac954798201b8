//! Sync command - Upload the local vault to OneDrive
//!
//! Provides the `vaultdrive sync` CLI command which:
//! 1. Builds the token manager and Graph adapters from configuration
//! 2. Runs one sync pass and displays the report, or
//! 3. With `--watch`, runs passes on the configured interval until Ctrl-C

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vaultdrive_core::config::{expand_tilde, SyncConfig};
use vaultdrive_sync::{scheduler, SyncOrchestrator, SyncOutcome, SyncReport};

use crate::context::AppContext;
use crate::output::{format_duration_ms, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Keep running and sync every `sync.interval_secs` seconds
    #[arg(long)]
    pub watch: bool,

    /// Local vault root, overrides sync.root
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Seconds between passes in watch mode, overrides sync.interval_secs
    #[arg(long)]
    pub interval: Option<u64>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let tokens = ctx.token_manager()?;
        let drive = Arc::new(ctx.remote_drive(tokens)?);
        let root = resolve_root(self.root.as_deref(), &ctx.config.sync);
        let orchestrator = Arc::new(SyncOrchestrator::new(drive, root));

        info!(root = %orchestrator.local_root().display(), watch = self.watch, "Starting sync");

        if self.watch {
            let interval = self.interval.unwrap_or(ctx.config.sync.interval_secs).max(1);
            return self.run_watch(orchestrator, interval, &*formatter).await;
        }

        formatter.info(&format!(
            "Uploading {} ...",
            orchestrator.local_root().display()
        ));
        let report = orchestrator.sync().await;

        if format.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize sync report")?;
            formatter.print_json(&json);
        } else {
            print_report(&report, &*formatter);
        }
        Ok(())
    }

    async fn run_watch(
        &self,
        orchestrator: Arc<SyncOrchestrator>,
        interval_secs: u64,
        formatter: &dyn OutputFormatter,
    ) -> Result<()> {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler::run_periodic(
            orchestrator.clone(),
            Duration::from_secs(interval_secs),
            cancel.clone(),
        ));

        formatter.success(&format!(
            "Watching {} (every {}s, Ctrl-C to stop)",
            orchestrator.local_root().display(),
            interval_secs
        ));

        let mut status = orchestrator.subscribe();
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    formatter.info(&format!("Status: {}", current));
                }
            }
        }

        cancel.cancel();
        handle.await.context("Sync scheduler task failed")?;
        formatter.success("Stopped");
        Ok(())
    }
}

/// `--root` when given, otherwise `sync.root`, with `~` expanded
fn resolve_root(cli_root: Option<&Path>, sync: &SyncConfig) -> PathBuf {
    match cli_root {
        Some(root) => expand_tilde(root),
        None => sync.resolved_root(),
    }
}

fn print_report(report: &SyncReport, formatter: &dyn OutputFormatter) {
    match &report.outcome {
        SyncOutcome::Unauthenticated => {
            formatter.error("Not signed in. Run 'vaultdrive auth login' first.");
            return;
        }
        SyncOutcome::Aborted(reason) => {
            formatter.error(&format!("Sync aborted: {}", reason));
            return;
        }
        SyncOutcome::Coalesced => {
            formatter.info("A sync is already running");
            return;
        }
        SyncOutcome::Completed => {}
    }

    let duration = format_duration_ms(report.duration_ms);
    if report.files_total == 0 {
        formatter.success("Nothing to upload, the vault is empty");
    } else if report.errors.is_empty() {
        formatter.success(&format!(
            "Uploaded {} in {}",
            plural(report.files_uploaded as usize, "file"),
            duration
        ));
    } else {
        formatter.warn(&format!(
            "Uploaded {} of {} in {}",
            report.files_uploaded,
            plural(report.files_total as usize, "file"),
            duration
        ));
        formatter.error(&format!(
            "{} occurred:",
            plural(report.errors.len(), "error")
        ));
        for failure in &report.errors {
            formatter.info(&format!("  - {}: {}", failure.path, failure.error));
        }
    }
}
