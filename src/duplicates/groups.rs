//! Duplicate grouping and size-based bucketing.
//!
//! # Overview
//!
//! Size bucketing is the first stage of duplicate detection. Sets are
//! bucketed by the size of their primary; buckets holding a single set are
//! unique and leave the pipeline immediately.
//!
//! # Example
//!
//! ```
//! use mediadupe::media::{MediaFile, SidecarSet};
//! use mediadupe::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let set = |p: &str, size| {
//!     SidecarSet::new(MediaFile::classify(PathBuf::from(p), size, SystemTime::now()).unwrap())
//! };
//! let (buckets, stats) = group_by_size(vec![set("/a.jpg", 1024), set("/b.jpg", 1024), set("/c.jpg", 2048)]);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(buckets.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::{hash_to_hex, Digest, SidecarSet, Stage};

/// Identity of a fully resolved duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Size of every primary in the group
    pub size: u64,
    /// Partial digest shared by every primary
    pub prehash: Digest,
    /// Full digest shared by every primary
    pub full_hash: Digest,
}

impl GroupKey {
    /// Stable string identifier used in checkpoints and reports.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}", self.size, hash_to_hex(&self.full_hash))
    }

    /// Full digest as hex; also the quarantine subdirectory name.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hash_to_hex(&self.full_hash)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Confirmed group of byte-identical primaries.
///
/// Members are ordered by primary path. A group always holds at least two
/// members.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Size and digests shared by every member
    pub key: GroupKey,
    /// Sets whose primaries are byte-identical
    pub members: Vec<SidecarSet>,
}

impl DuplicateGroup {
    /// Create a group, sorting members by primary path.
    #[must_use]
    pub fn new(key: GroupKey, mut members: Vec<SidecarSet>) -> Self {
        members.sort_by(|a, b| a.primary.path.cmp(&b.primary.path));
        for member in &mut members {
            member.primary.stage = Stage::Grouped;
        }
        Self { key, members }
    }

    /// Number of members in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Size of each primary in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.key.size
    }

    /// Bytes reclaimable by keeping one copy of the primary.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.key.size * self.duplicate_count() as u64
    }

    /// Number of redundant copies (members minus the keeper).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Full digest as hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        self.key.digest_hex()
    }

    /// Primary paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.primary.path.clone()).collect()
    }

    /// Whether a primary path belongs to this group.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.members.iter().any(|m| m.primary.path == path)
    }
}

/// Statistics from the size bucketing stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of sets processed
    pub total_files: usize,
    /// Total size of all primaries in bytes
    pub total_size: u64,
    /// Number of unique primary sizes
    pub unique_sizes: usize,
    /// Sets that could be duplicates (in buckets of 2+)
    pub potential_duplicates: usize,
    /// Sets eliminated as unique (singleton buckets)
    pub eliminated_unique: usize,
    /// Zero-byte primaries; bucketed like any other size
    pub empty_files: usize,
    /// Number of buckets with 2+ sets
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of sets eliminated by size.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket sets by primary size (stage 1).
///
/// Returns only buckets holding two or more sets. Zero-byte primaries are
/// bucketed too (identical empty files are duplicates) and also counted in
/// `empty_files`.
#[must_use]
pub fn group_by_size(sets: Vec<SidecarSet>) -> (BTreeMap<u64, Vec<SidecarSet>>, GroupingStats) {
    let mut stats = GroupingStats {
        total_files: sets.len(),
        ..Default::default()
    };
    let mut buckets: BTreeMap<u64, Vec<SidecarSet>> = BTreeMap::new();

    for set in sets {
        stats.total_size += set.size();
        if set.size() == 0 {
            stats.empty_files += 1;
        }
        buckets.entry(set.size()).or_default().push(set);
    }

    stats.unique_sizes = buckets.len();
    buckets.retain(|_, bucket| {
        if bucket.len() > 1 {
            true
        } else {
            for set in bucket.iter_mut() {
                set.primary.stage = Stage::Unique;
            }
            false
        }
    });
    stats.duplicate_groups = buckets.len();
    stats.potential_duplicates = buckets.values().map(Vec::len).sum();
    stats.eliminated_unique = stats.total_files - stats.potential_duplicates;

    log::debug!(
        "Size bucketing: {} sets, {} candidate buckets, {:.1}% eliminated",
        stats.total_files,
        stats.duplicate_groups,
        stats.elimination_rate()
    );

    (buckets, stats)
}
