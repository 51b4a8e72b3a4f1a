//! Permanent deletion and the modification-since-scan guard.
//!
//! # Safety
//!
//! Every file is re-stat'ed against the [`FileSnapshot`] taken at scan time
//! before it is removed. The keeper is checked before any member of its group
//! is touched, so a group can never lose its last copy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::ActionError;

/// File metadata snapshot for modification-since-scan verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Snapshot from values recorded earlier.
    #[must_use]
    pub fn recorded(path: &Path, size: u64, mtime_secs: u64, mtime_nanos: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            size,
            mtime: Some(SystemTime::UNIX_EPOCH + Duration::new(mtime_secs, mtime_nanos)),
        }
    }

    /// Create a snapshot of a file's current state.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, ActionError> {
        let metadata = fs::metadata(path).map_err(|e| ActionError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Verify that the file still matches this snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if file was modified, deleted, or can't be accessed.
    pub fn verify(&self) -> Result<(), ActionError> {
        let current = Self::capture(&self.path)?;

        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(ActionError::Modified(self.path.clone()));
            }
        }

        if self.size != current.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(ActionError::Modified(self.path.clone()));
        }

        Ok(())
    }
}

/// Fail unless the keeper is still present with its scanned size.
///
/// # Errors
///
/// Returns `KeeperMissing` if the keeper vanished or changed size.
pub fn ensure_keeper_present(keeper: &Path, size: u64) -> Result<(), ActionError> {
    match fs::metadata(keeper) {
        Ok(meta) if meta.is_file() && meta.len() == size => Ok(()),
        Ok(_) => Err(ActionError::KeeperMissing(keeper.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ActionError::KeeperMissing(keeper.to_path_buf()))
        }
        Err(e) => Err(ActionError::from_io(keeper, e)),
    }
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// Returns the number of bytes freed.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `Io` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let metadata = fs::metadata(path).map_err(|e| ActionError::from_io(path, e))?;
    let size = metadata.len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        ActionError::from_io(path, e)
    })?;

    log::info!("DELETED {} ({} bytes)", path.display(), size);
    Ok(size)
}
