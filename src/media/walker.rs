//! Directory walker for media discovery.
//!
//! # Overview
//!
//! [`Walker`] traverses the target tree (or only its top level) and yields a
//! [`MediaFile`] for every recognized photo, video or sidecar. Quarantine
//! directories created by earlier runs are pruned so already-actioned copies
//! are never detected again.
//!
//! # Example
//!
//! ```no_run
//! use mediadupe::media::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/photos"), WalkerConfig { recursive: false });
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{} ({})", file.path.display(), file.kind),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::{DirEntry, WalkDir};

use super::{MediaFile, ScanError};

/// Directory name prefix used for quarantine roots.
pub const QUARANTINE_DIR_PREFIX: &str = "_quarantine_";

/// Whether a directory name marks a quarantine root.
#[must_use]
pub fn is_quarantine_dir_name(name: &str) -> bool {
    name.starts_with(QUARANTINE_DIR_PREFIX)
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Directory walker for media discovery.
#[derive(Debug)]
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag; iteration stops once it is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree, yielding recognized files in path order.
    ///
    /// Unreadable entries are yielded as errors and never stop the walk.
    pub fn walk(&self) -> impl Iterator<Item = Result<MediaFile, ScanError>> + '_ {
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };

        WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_pruned(entry))
            .take_while(move |_| !self.is_shutdown_requested())
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let path = entry.path().to_path_buf();
                    let kind = super::MediaKind::from_path(&path)?;
                    match entry.metadata() {
                        Ok(meta) => {
                            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                            Some(Ok(MediaFile::new(path, meta.len(), modified, kind)))
                        }
                        Err(e) => Some(Err(walk_error(&path, e))),
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    log::warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    Some(Err(walk_error(&path, e)))
                }
            })
    }
}

fn is_pruned(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && is_quarantine_dir_name(&entry.file_name().to_string_lossy())
}

fn walk_error(path: &Path, err: walkdir::Error) -> ScanError {
    match err.into_io_error() {
        Some(io) => ScanError::from_io(path, io),
        None => ScanError::Io {
            path: path.to_path_buf(),
            source: Arc::new(std::io::Error::other("filesystem loop detected")),
        },
    }
}
