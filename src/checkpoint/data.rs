//! Data structures for the checkpoint log.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Current version of the checkpoint file format.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Default checkpoint file name, placed in the target root.
pub const CHECKPOINT_FILE_NAME: &str = ".mediadupe-checkpoint.jsonl";

/// Coarse progress marker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing recorded yet; also implied by a missing checkpoint
    #[default]
    Start,
    /// Walking and hashing
    Scanning,
    /// Applying quarantine or delete actions
    Resolving,
    /// Placing survivors (recorded for compatibility, not driven here)
    Organizing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Scanning => write!(f, "scanning"),
            Self::Resolving => write!(f, "resolving"),
            Self::Organizing => write!(f, "organizing"),
        }
    }
}

/// First line of every checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    /// Format version.
    pub version: u32,
    /// Run identifier; doubles as the quarantine namespace.
    pub run_id: String,
    /// Target root the run operates on.
    pub root: PathBuf,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

impl CheckpointHeader {
    /// Create a header for a new run.
    #[must_use]
    pub fn new(run_id: String, root: PathBuf) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            run_id,
            root,
            created_at: Utc::now(),
        }
    }
}

/// A single committed unit of progress.
///
/// The log does not interpret the payloads; they are opaque to everything
/// except the stage that wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// A completed unit of hashing work and its result.
    Unit {
        /// Stable identifier (see [`prehash_unit`], [`fullhash_unit`])
        key: String,
        /// Result of the unit, usually a hex digest
        value: String,
    },
    /// The run moved to a new phase.
    Phase {
        /// Phase entered
        phase: Phase,
    },
    /// A planned resolution, written before any filesystem mutation.
    ActionIntent {
        /// Group identifier
        group: String,
        /// Planned action
        action: serde_json::Value,
    },
    /// Result of executing an intent.
    ActionOutcome {
        /// Group identifier
        group: String,
        /// Whether every file of the group reached its planned state
        completed: bool,
        /// The intent can no longer complete and is dropped from the pending set
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        abandoned: bool,
        /// Executed action details
        outcome: serde_json::Value,
    },
}

/// On-disk form of a record line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry {
    /// Position in the log, starting at 1 and gapless.
    pub seq: u64,
    /// SHA256 of the compact JSON of `record`.
    pub checksum: String,
    /// The record itself.
    pub record: Record,
}

/// Normalized form of a path used inside unit keys.
///
/// Unicode normalization keeps keys stable when a filesystem hands back
/// decomposed names on one run and composed names on the next.
#[must_use]
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().nfc().collect()
}

/// Unit key for a partial digest.
///
/// The prefix length is part of the key so a changed setting never reuses
/// digests computed over a different prefix.
#[must_use]
pub fn prehash_unit(path: &Path, size: u64, mtime: u64, prehash_bytes: u64) -> String {
    format!(
        "prehash:{prehash_bytes}:{size}:{mtime}:{}",
        normalize_path(path)
    )
}

/// Unit key for a full digest.
#[must_use]
pub fn fullhash_unit(path: &Path, size: u64, mtime: u64) -> String {
    format!("fullhash:{size}:{mtime}:{}", normalize_path(path))
}

/// Unit key for a resolved duplicate group.
#[must_use]
pub fn group_unit(group_id: &str) -> String {
    format!("group:{group_id}")
}
