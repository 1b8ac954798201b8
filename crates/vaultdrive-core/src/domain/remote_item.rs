//! Remote item view
//!
//! [`RemoteItem`] is the provider-agnostic identity of an object in the
//! remote drive. It is only ever produced by adapters parsing server
//! responses.

use serde::{Deserialize, Serialize};

/// A file or folder stored in the remote drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Provider-specific item identifier
    pub id: String,
    /// Item name (file or folder name)
    pub name: String,
    /// Drive-relative path, e.g. `/Vault/Notas/test.md` (None when the
    /// server omitted the parent reference)
    pub path: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Whether this item is a folder
    pub is_folder: bool,
}

impl RemoteItem {
    /// Returns true if this item is a regular file
    pub fn is_file(&self) -> bool {
        !self.is_folder
    }
}
