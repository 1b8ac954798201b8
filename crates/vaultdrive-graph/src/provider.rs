//! GraphRemoteDrive - IRemoteDrive implementation for Microsoft Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the client and upload modules
//! to fulfil the [`IRemoteDrive`] port contract.
//!
//! ## Design Notes
//!
//! - Paths handed to `upload`, `delete` and `read_file` are relative to the
//!   configured base folder; `list_folder` takes a path relative to the
//!   drive root.
//! - Authentication is handled by the shared [`TokenManager`]; this provider
//!   only asks it for a token before each API call.
//!
//! [`TokenManager`]: crate::token::TokenManager

use async_trait::async_trait;
use tracing::{debug, info};
use vaultdrive_core::domain::{DriveError, RemoteItem};
use vaultdrive_core::ports::IRemoteDrive;

use crate::client::{path_segments, GraphClient};
use crate::upload::{self, DEFAULT_CHUNK_SIZE};

/// Remote drive backed by OneDrive through Microsoft Graph
pub struct GraphRemoteDrive {
    client: GraphClient,
    base_folder: String,
    chunk_size: usize,
}

impl GraphRemoteDrive {
    /// Creates a drive rooted at `base_folder` (relative to the drive root)
    pub fn new(client: GraphClient, base_folder: impl Into<String>) -> Self {
        Self {
            client,
            base_folder: base_folder.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Overrides the upload chunk size in bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn base_folder(&self) -> &str {
        &self.base_folder
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Segments of `base_folder/relative_path`, empty ones dropped
    fn item_segments<'a>(&'a self, relative_path: &'a str) -> Vec<&'a str> {
        path_segments(&self.base_folder)
            .chain(path_segments(relative_path))
            .collect()
    }

    /// Segments of an item strictly below the base folder
    ///
    /// A relative path that names nothing (`""`, `"/"`) would resolve to the
    /// base folder itself and is rejected.
    fn child_segments<'a>(
        &'a self,
        relative_path: &'a str,
        operation: &str,
    ) -> Result<Vec<&'a str>, DriveError> {
        let segments = self.item_segments(relative_path);
        if segments.len() == path_segments(&self.base_folder).count() {
            return Err(DriveError::protocol(format!(
                "{} path must name an item below the base folder",
                operation
            )));
        }
        Ok(segments)
    }
}

#[async_trait]
impl IRemoteDrive for GraphRemoteDrive {
    async fn has_credentials(&self) -> bool {
        self.client.tokens().has_usable_credential().await
    }

    async fn list_folder(&self, remote_folder: &str) -> Result<Vec<RemoteItem>, DriveError> {
        let segments: Vec<&str> = path_segments(remote_folder).collect();
        self.client.list_children(&segments).await
    }

    async fn upload(&self, relative_path: &str, data: &[u8]) -> Result<RemoteItem, DriveError> {
        let segments = self.child_segments(relative_path, "upload")?;

        debug!(path = relative_path, bytes = data.len(), "Uploading file");
        let item = upload::upload_file(&self.client, &segments, data, self.chunk_size).await?;
        info!(path = relative_path, id = %item.id, "File uploaded");
        Ok(item)
    }

    async fn delete(&self, relative_path: &str) -> Result<(), DriveError> {
        let segments = self.child_segments(relative_path, "delete")?;

        self.client.delete_item(&segments).await?;
        info!(path = relative_path, "Remote item deleted");
        Ok(())
    }

    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>, DriveError> {
        let segments = self.child_segments(relative_path, "read")?;

        let url = self.client.download_url(&segments).await?;
        self.client.download(&url).await
    }
}
