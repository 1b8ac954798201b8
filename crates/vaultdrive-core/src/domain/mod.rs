//! Domain entities and value types
//!
//! This module contains the core domain types for VaultDrive:
//! - OAuth credential snapshot with its validity predicates
//! - Remote item view parsed from the drive API
//! - Sync jobs and the orchestrator status
//! - Domain-specific error types

pub mod credential;
pub mod errors;
pub mod remote_item;
pub mod status;
pub mod sync_job;

// Re-export commonly used types
pub use credential::Credential;
pub use errors::{DomainError, DriveError};
pub use remote_item::RemoteItem;
pub use status::SyncStatus;
pub use sync_job::SyncJob;
