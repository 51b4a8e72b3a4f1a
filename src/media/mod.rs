//! Media discovery, classification and hashing.
//!
//! This module provides functionality for:
//! - Classifying files as photo, video or sidecar by extension
//! - Walking a target tree for recognized media
//! - Grouping sidecars with the primary file they describe
//! - Partial and full BLAKE3 content digests
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal and file discovery
//! - [`sidecar`]: Sidecar association by shared basename
//! - [`hasher`]: Streaming digests
//!
//! # Example
//!
//! ```no_run
//! use mediadupe::media::{associate, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! let association = associate(files);
//! println!("{} media sets, {} orphan sidecars", association.sets.len(), association.orphans.len());
//! ```

pub mod hasher;
pub mod sidecar;
pub mod walker;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use hasher::{
    hash_to_hex, hex_to_hash, Digest, Hasher, DEFAULT_PREHASH_BYTES, MAX_PREHASH_BYTES,
};
pub use sidecar::{associate, Association, SidecarSet};
pub use walker::{is_quarantine_dir_name, Walker, WalkerConfig, QUARANTINE_DIR_PREFIX};

/// Extensions recognized as photos (lowercase, with leading dot).
pub const PHOTO_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".heic", ".heif", ".dng", ".nef", ".cr2", ".cr3", ".arw", ".rw2",
    ".orf",
];

/// Extensions recognized as videos.
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".m4v", ".avi", ".mts", ".m2ts", ".3gp"];

/// Extensions recognized as sidecars. These travel with a primary and are
/// never hashed or actioned on their own.
pub const SIDECAR_EXTENSIONS: &[&str] = &[".aae", ".xmp", ".thm", ".lrv"];

/// Extension class of a recognized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image, including camera RAW formats
    Photo,
    /// Video clip
    Video,
    /// Metadata or auxiliary file belonging to a primary
    Sidecar,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    ///
    /// Returns `None` for files the tool does not handle.
    ///
    /// # Example
    ///
    /// ```
    /// use mediadupe::media::MediaKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(MediaKind::from_path(Path::new("IMG_0001.JPG")), Some(MediaKind::Photo));
    /// assert_eq!(MediaKind::from_path(Path::new("clip.mov")), Some(MediaKind::Video));
    /// assert_eq!(MediaKind::from_path(Path::new("IMG_0001.AAE")), Some(MediaKind::Sidecar));
    /// assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        let dotted = format!(".{ext}");
        if PHOTO_EXTENSIONS.contains(&dotted.as_str()) {
            Some(Self::Photo)
        } else if VIDEO_EXTENSIONS.contains(&dotted.as_str()) {
            Some(Self::Video)
        } else if SIDECAR_EXTENSIONS.contains(&dotted.as_str()) {
            Some(Self::Sidecar)
        } else {
            None
        }
    }

    /// Whether files of this kind are primaries (photo or video).
    #[must_use]
    pub fn is_primary(self) -> bool {
        !matches!(self, Self::Sidecar)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Video => write!(f, "video"),
            Self::Sidecar => write!(f, "sidecar"),
        }
    }
}

/// How far a file has progressed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Found by the walker, nothing computed yet
    #[default]
    Discovered,
    /// Eliminated as unique (size or digest bucket of one)
    Unique,
    /// Partial digest computed
    Prehashed,
    /// Full digest computed
    FullHashed,
    /// Member of a confirmed duplicate group
    Grouped,
    /// Kept or actioned by the resolver
    Resolved,
}

/// A recognized media or sidecar file.
///
/// Digests and the capture date start out empty and are filled in by the
/// hashing pipeline and the metadata collaborator respectively.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// File name with the final extension stripped
    pub basename: String,
    /// Extension class
    pub kind: MediaKind,
    /// Filesystem modification time
    pub modified: SystemTime,
    /// Original capture time from embedded metadata, if known
    pub captured: Option<NaiveDateTime>,
    /// Current pipeline stage
    pub stage: Stage,
    /// Digest of the leading bytes
    pub prehash: Option<Digest>,
    /// Digest of the whole file
    pub full_hash: Option<Digest>,
}

impl MediaFile {
    /// Create a new file record of a known kind.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    /// * `kind` - Extension class
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime, kind: MediaKind) -> Self {
        let basename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            size,
            basename,
            kind,
            modified,
            captured: None,
            stage: Stage::Discovered,
            prehash: None,
            full_hash: None,
        }
    }

    /// Create a record if the path has a recognized extension.
    #[must_use]
    pub fn classify(path: PathBuf, size: u64, modified: SystemTime) -> Option<Self> {
        let kind = MediaKind::from_path(&path)?;
        Some(Self::new(path, size, modified, kind))
    }

    /// Stat a path and build its record.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Unsupported` for unrecognized extensions and the
    /// mapped I/O error when the file cannot be stat'ed.
    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let kind = MediaKind::from_path(path)
            .ok_or_else(|| ScanError::Unsupported(path.to_path_buf()))?;
        let metadata = std::fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self::new(path.to_path_buf(), metadata.len(), modified, kind))
    }

    /// Lowercase extension without the dot.
    #[must_use]
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Modification time as seconds since the Unix epoch.
    #[must_use]
    pub fn modified_secs(&self) -> u64 {
        self.modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The file extension is not a recognized media or sidecar type.
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },

    /// A digest could not be computed.
    #[error(transparent)]
    HashError(#[from] HashError),
}

impl ScanError {
    /// Map an I/O error onto the scan taxonomy.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(err),
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl HashError {
    /// Map an I/O error onto the hashing taxonomy.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(err),
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
