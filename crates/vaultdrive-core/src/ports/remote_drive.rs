//! Remote drive port (driven/secondary port)
//!
//! This module defines the interface the sync orchestrator uses to talk to
//! the remote drive. The primary implementation targets Microsoft OneDrive
//! via the Microsoft Graph API.
//!
//! ## Design Notes
//!
//! - Returns the typed [`DriveError`] rather than `anyhow::Result` because the
//!   orchestrator and the retry policy branch on the error class.
//! - All paths are relative to the configured remote base folder and use `/`
//!   as separator.
//! - Uses `#[async_trait]` for async trait methods.

use async_trait::async_trait;

use crate::domain::{DriveError, RemoteItem};

/// Operations against the remote drive
#[async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Returns true if a usable credential (access and refresh token) is
    /// available. Makes no remote calls.
    async fn has_credentials(&self) -> bool;

    /// Lists the children of a folder relative to the drive root
    ///
    /// An empty `remote_folder` lists the drive root.
    async fn list_folder(&self, remote_folder: &str) -> Result<Vec<RemoteItem>, DriveError>;

    /// Uploads `data` to `relative_path` under the remote base folder,
    /// replacing any existing item of the same name
    async fn upload(&self, relative_path: &str, data: &[u8]) -> Result<RemoteItem, DriveError>;

    /// Deletes the item at `relative_path` under the remote base folder
    async fn delete(&self, relative_path: &str) -> Result<(), DriveError>;

    /// Downloads the content of the file at `relative_path` under the remote
    /// base folder
    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>, DriveError>;
}
