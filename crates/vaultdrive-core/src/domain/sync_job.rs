//! Sync job entries
//!
//! A [`SyncJob`] is built fresh on every pass from the local tree walk and
//! discarded once the pass completes. Jobs carry no persisted identity.

use std::path::PathBuf;

use serde::Serialize;

/// One file to upload during a sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncJob {
    /// Absolute (or root-prefixed) local path of the file
    pub local_path: PathBuf,
    /// Path relative to the local root, `/`-separated, e.g. `Notas/test.md`
    pub remote_relative_path: String,
    /// File size at enumeration time
    pub size_bytes: u64,
}
