//! Staging directory helpers.

use crate::domain::{SnapshotError, EXPORTED_FILES_MODE};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Export directory handed over by the controller.
///
/// Call [`StagingDir::remove`] when done. Dropping it without doing so (task
/// cancelled or unwinding) removes the tree synchronously instead.
pub(crate) struct StagingDir {
    path: PathBuf,
    removed: bool,
}

impl StagingDir {
    /// Take ownership of an existing directory.
    pub(crate) fn adopt(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything under it.
    pub(crate) async fn remove(mut self) {
        self.removed = true;
        log_removal(&self.path, tokio::fs::remove_dir_all(&self.path).await);
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.removed {
            log_removal(&self.path, std::fs::remove_dir_all(&self.path));
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!("[qc-18] Removed staging dir {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("[qc-18] Failed to remove staging dir {}: {}", path.display(), e),
    }
}

/// Create a fresh restore directory `<root>/<prefix><random>` on the
/// blocking pool.
pub(crate) async fn create_restore_dir(
    root: PathBuf,
    prefix: String,
) -> Result<TempDir, SnapshotError> {
    tokio::fs::create_dir_all(&root).await?;
    let dir = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
    })
    .await
    .map_err(|e| SnapshotError::Runtime(e.to_string()))??;
    Ok(dir)
}

/// Remove a restore directory on the blocking pool.
pub(crate) async fn close_restore_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match tokio::task::spawn_blocking(move || dir.close()).await {
        Ok(result) => log_removal(&path, result),
        Err(e) => warn!("[qc-18] Failed to remove staging dir {}: {}", path.display(), e),
    }
}

/// Open options for files staged for the controller.
pub(crate) fn staged_file_options() -> tokio::fs::OpenOptions {
    let mut options = tokio::fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    options.mode(EXPORTED_FILES_MODE);
    options
}

/// Write `data` to a freshly staged file at `path`.
pub(crate) async fn write_staged_file(path: &Path, data: &[u8]) -> Result<(), SnapshotError> {
    let mut file = staged_file_options().open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}
