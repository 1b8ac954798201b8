//! Local tree walker
//!
//! Enumerates every regular file below the vault root and maps each one to
//! the `/`-separated path it will have under the remote base folder.
//! Directories are traversed but never emitted as jobs; the remote side
//! creates intermediate folders on upload.
//!
//! Symbolic links are skipped, so a link pointing back up the tree cannot
//! make the walk loop.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use tracing::{debug, warn};
use vaultdrive_core::domain::{DriveError, SyncJob};

/// A classified entry of a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEntry {
    File { path: PathBuf, size: u64 },
    Directory { path: PathBuf },
}

impl LocalEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path, .. } | Self::Directory { path } => path,
        }
    }
}

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DriveError>> + Send + 'a>>;

/// Recursive enumerator of the local vault
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTreeWalker;

impl LocalTreeWalker {
    /// Returns one [`SyncJob`] per regular file below `root`
    ///
    /// Siblings are visited in name order, so the result is stable for an
    /// unchanged tree. Fails with [`DriveError::LocalFs`] if `root` is
    /// missing or not a directory; unreadable subdirectories fail the whole
    /// walk as well.
    pub async fn enumerate(root: &Path) -> Result<Vec<SyncJob>, DriveError> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|e| DriveError::local_fs(root, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(DriveError::local_fs(root, "not a directory"));
        }

        let mut jobs = Vec::new();
        walk_directory(root, root, &mut jobs).await?;
        debug!(root = %root.display(), files = jobs.len(), "Local tree enumerated");
        Ok(jobs)
    }

    /// Lists the direct children of `dir`, sorted by name, symlinks skipped
    pub async fn read_entries(dir: &Path) -> Result<Vec<LocalEntry>, DriveError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| DriveError::local_fs(dir, e.to_string()))?;

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DriveError::local_fs(dir, e.to_string()))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DriveError::local_fs(&path, e.to_string()))?;

            if file_type.is_symlink() {
                debug!(path = %path.display(), "Skipping symlink");
                continue;
            }

            if file_type.is_dir() {
                children.push(LocalEntry::Directory { path });
            } else if file_type.is_file() {
                let size = entry
                    .metadata()
                    .await
                    .map_err(|e| DriveError::local_fs(&path, e.to_string()))?
                    .len();
                children.push(LocalEntry::File { path, size });
            }
        }

        children.sort_by(|a, b| a.path().file_name().cmp(&b.path().file_name()));
        Ok(children)
    }
}

fn walk_directory<'a>(
    dir: &'a Path,
    root: &'a Path,
    jobs: &'a mut Vec<SyncJob>,
) -> WalkFuture<'a> {
    Box::pin(async move {
        for entry in LocalTreeWalker::read_entries(dir).await? {
            match entry {
                LocalEntry::Directory { path } => {
                    walk_directory(&path, root, jobs).await?;
                }
                LocalEntry::File { path, size } => {
                    let remote_relative_path = match remote_relative_path(root, &path) {
                        Ok(relative) => relative,
                        Err(err) => {
                            warn!(path = %path.display(), %err, "Skipping file");
                            continue;
                        }
                    };
                    jobs.push(SyncJob {
                        local_path: path,
                        remote_relative_path,
                        size_bytes: size,
                    });
                }
            }
        }
        Ok(())
    })
}

/// Maps `path` below `root` to its `/`-separated remote relative path
///
/// `MyLocalVault/Notas/test.md` under root `MyLocalVault` becomes
/// `Notas/test.md`. Fails if `path` is not below `root` or a component is
/// not valid UTF-8.
pub fn remote_relative_path(root: &Path, path: &Path) -> Result<String, DriveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| DriveError::local_fs(path, "path is outside the sync root"))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name
                    .to_str()
                    .ok_or_else(|| DriveError::local_fs(path, "file name is not valid UTF-8"))?;
                segments.push(name);
            }
            Component::CurDir => {}
            _ => return Err(DriveError::local_fs(path, "unexpected path component")),
        }
    }

    if segments.is_empty() {
        return Err(DriveError::local_fs(path, "path is the sync root itself"));
    }
    Ok(segments.join("/"))
}
