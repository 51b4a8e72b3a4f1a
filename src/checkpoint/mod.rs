//! Checkpointed progress for restartable runs.
//!
//! A run records every completed unit of work (a partial or full digest, a
//! resolved duplicate group) in an append-only log next to the target. When a
//! run is interrupted, the next run over the same target replays the log and
//! skips everything already recorded, so the final duplicate groups and
//! resolution actions match an uninterrupted run.
//!
//! # Features
//!
//! * **Write-ahead**: resolution intents are persisted before any file moves.
//! * **Integrity**: each record carries a SHA256 checksum and a sequence number.
//! * **Torn writes**: an incomplete final line is dropped, anything else fails.
//!
//! # Architecture
//!
//! * [`data`]: Header, record and unit key definitions.
//! * [`io`]: Loading, replaying and appending to the log.

pub mod data;
pub mod io;

use std::path::{Path, PathBuf};

pub use data::{
    fullhash_unit, group_unit, normalize_path, prehash_unit, CheckpointHeader, Phase, Record,
    CHECKPOINT_FILE_NAME, CHECKPOINT_VERSION,
};
pub use io::{Checkpoint, CheckpointStats};

/// Errors raised while reading or writing a checkpoint.
#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    /// The checkpoint could not be read or written.
    #[error("Checkpoint I/O error for {path}: {source}")]
    Io {
        /// Checkpoint path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The log is damaged beyond a torn final write.
    #[error("Checkpoint {path} is corrupt at line {line}: {reason}. Re-run with --discard-checkpoint to start over")]
    Corrupt {
        /// Checkpoint path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// The log was written by an incompatible version.
    #[error("Unsupported checkpoint version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        /// Checkpoint path
        path: PathBuf,
        /// Version found in the header
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// The log belongs to a different target root.
    #[error("Checkpoint {path} belongs to {found}, not {expected}")]
    RootMismatch {
        /// Checkpoint path
        path: PathBuf,
        /// Root of the current run
        expected: PathBuf,
        /// Root recorded in the header
        found: PathBuf,
    },

    /// A record could not be serialized.
    #[error("Checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CheckpointError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error means the persisted state cannot be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::UnsupportedVersion { .. } | Self::RootMismatch { .. }
        )
    }
}
