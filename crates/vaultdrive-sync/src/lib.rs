//! VaultDrive Sync - one-way vault synchronization
//!
//! Provides:
//! - Recursive enumeration of the local vault
//! - A sync orchestrator that pushes every file to the remote drive
//! - A periodic trigger for unattended operation
//!
//! ## Modules
//!
//! - [`walker`] - Local tree walker producing the per-pass job list
//! - [`engine`] - [`engine::SyncOrchestrator`], status machine and single-flight guard
//! - [`scheduler`] - Timer-driven sync until cancelled

pub mod engine;
pub mod scheduler;
pub mod walker;

pub use engine::{SyncFailure, SyncOrchestrator, SyncOutcome, SyncReport};
pub use walker::{LocalEntry, LocalTreeWalker};
