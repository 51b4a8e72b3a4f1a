//! Duplicate finder implementation with multi-phase detection.
//!
//! # Overview
//!
//! This module orchestrates the duplicate detection pipeline:
//! 1. **Phase 1 - Size grouping**: Bucket sets by primary size (see [`crate::duplicates::groups`])
//! 2. **Phase 2 - Prehash**: Digest the leading bytes of same-size primaries
//! 3. **Phase 3 - Full hash**: Digest the entire content of prehash matches
//!
//! Each phase runs over a bounded worker pool and only returns once every
//! file of the phase has been processed, so regrouping always sees complete
//! buckets. When a [`Checkpoint`] is attached, every digest is looked up
//! before it is computed and committed after.
//!
//! # Example
//!
//! ```no_run
//! use mediadupe::media::{associate, Hasher, Walker, WalkerConfig};
//! use mediadupe::duplicates::{group_by_size, phase2_prehash, HashPhaseConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let files = walker.walk().filter_map(Result::ok).collect();
//! let (size_groups, _) = group_by_size(associate(files).sets);
//!
//! let hasher = Arc::new(Hasher::new());
//! let (prehash_groups, stats) = phase2_prehash(size_groups, hasher, &HashPhaseConfig::default());
//! println!("Phase 2: {} potential duplicates remain", stats.potential_duplicates);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;

use super::groups::{group_by_size, DuplicateGroup, GroupKey};
use crate::checkpoint::{fullhash_unit, prehash_unit, Checkpoint, CheckpointError, Phase};
use crate::media::{
    associate, hash_to_hex, hex_to_hash, Digest, HashError, Hasher, MediaFile, ScanError,
    SidecarSet, Stage, Walker, WalkerConfig, DEFAULT_PREHASH_BYTES,
};
use crate::progress::ProgressCallback;

/// Run `op` on a pool of `threads` workers, or on the global pool if one
/// cannot be built.
pub(crate) fn run_in_pool<T, F>(threads: usize, op: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(op),
        Err(e) => {
            log::warn!(
                "Failed to create worker pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            op()
        }
    }
}

/// Configuration shared by the prehash and full hash phases.
#[derive(Clone)]
pub struct HashPhaseConfig {
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Optional checkpoint for resumable runs.
    pub checkpoint: Option<Arc<Checkpoint>>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for HashPhaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashPhaseConfig")
            .field("io_threads", &self.io_threads)
            .field("checkpoint", &self.checkpoint.as_ref().map(|c| c.path()))
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for HashPhaseConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            checkpoint: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl HashPhaseConfig {
    /// Set the I/O thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Attach a checkpoint.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Digest previously committed under `key`.
    fn resume(&self, key: &str) -> Option<Digest> {
        let hex = self.checkpoint.as_ref()?.lookup(key)?;
        let digest = hex_to_hash(&hex);
        if digest.is_none() {
            log::warn!("Ignoring malformed checkpoint value for {}", key);
        }
        digest
    }

    /// Record a computed digest. A failed commit only costs a recompute on
    /// the next run.
    fn record(&self, key: String, digest: &Digest) {
        if let Some(ref checkpoint) = self.checkpoint {
            if let Err(e) = checkpoint.commit(key, hash_to_hex(digest)) {
                log::warn!("Failed to commit checkpoint unit: {}", e);
            }
        }
    }
}

/// Result of hashing a single primary.
enum HashOutcome {
    Computed(Digest),
    Resumed(Digest),
    Reused(Digest),
    Failed(HashError),
    Skipped,
}

/// Statistics from the prehash phase.
#[derive(Debug, Clone, Default)]
pub struct PrehashStats {
    /// Total sets that entered Phase 2
    pub input_files: usize,
    /// Number of primaries hashed in this run
    pub hashed_files: usize,
    /// Zero-byte primaries, digested without a read
    pub empty_files: usize,
    /// Number of digests taken from the checkpoint
    pub resumed_files: usize,
    /// Number of primaries that failed to hash (I/O errors)
    pub failed_files: usize,
    /// Errors encountered during prehash
    pub errors: Vec<HashError>,
    /// Number of unique prehashes (eliminated)
    pub unique_prehashes: usize,
    /// Number of sets that could still be duplicates
    pub potential_duplicates: usize,
    /// Number of prehash buckets with 2+ sets
    pub duplicate_groups: usize,
    /// Whether phase was interrupted by shutdown
    pub interrupted: bool,
}

impl PrehashStats {
    /// Percentage of sets eliminated by prehash comparison.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.input_files == 0 {
            0.0
        } else {
            let eliminated = self.input_files - self.potential_duplicates;
            (eliminated as f64 / self.input_files as f64) * 100.0
        }
    }
}

/// Digest of zero bytes.
fn empty_digest() -> Digest {
    *blake3::hash(&[]).as_bytes()
}

/// Buckets surviving Phase 2, keyed by (size, prehash).
pub type PrehashBuckets = BTreeMap<(u64, Digest), Vec<SidecarSet>>;

/// Re-bucket same-size sets by the digest of their leading bytes (Phase 2).
///
/// # Arguments
///
/// * `size_groups` - Sets bucketed by size from Phase 1
/// * `hasher` - The hasher to use for computing prehashes
/// * `config` - Worker pool, checkpoint and cancellation settings
///
/// # Returns
///
/// Buckets of two or more sets sharing size and prehash, plus statistics.
/// Unreadable primaries are dropped from their bucket and listed in
/// `errors`; they never block their siblings.
#[must_use]
pub fn phase2_prehash(
    size_groups: BTreeMap<u64, Vec<SidecarSet>>,
    hasher: Arc<Hasher>,
    config: &HashPhaseConfig,
) -> (PrehashBuckets, PrehashStats) {
    let all_sets: Vec<SidecarSet> = size_groups.into_values().flatten().collect();
    let mut stats = PrehashStats {
        input_files: all_sets.len(),
        ..Default::default()
    };

    if all_sets.is_empty() {
        log::debug!("Phase 2: No files to process");
        return (BTreeMap::new(), stats);
    }

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start("prehash", all_sets.len());
    }
    log::info!("Phase 2: Computing prehashes for {} files", all_sets.len());

    let prehash_bytes = hasher.prehash_bytes();
    let results: Vec<(SidecarSet, HashOutcome)> = run_in_pool(config.io_threads, || {
        all_sets
            .into_par_iter()
            .enumerate()
            .map(|(idx, set)| {
                if config.is_shutdown_requested() {
                    return (set, HashOutcome::Skipped);
                }
                if let Some(ref callback) = config.progress_callback {
                    callback.on_progress(idx + 1, set.primary.path.to_string_lossy().as_ref());
                }

                let primary = &set.primary;
                if primary.size == 0 {
                    return (set, HashOutcome::Reused(empty_digest()));
                }
                let key = prehash_unit(
                    &primary.path,
                    primary.size,
                    primary.modified_secs(),
                    prehash_bytes,
                );
                if let Some(digest) = config.resume(&key) {
                    log::trace!("Prehash resumed: {}", primary.path.display());
                    return (set, HashOutcome::Resumed(digest));
                }

                let outcome = match hasher.prehash(&primary.path) {
                    Ok(digest) => {
                        log::trace!("Prehash computed: {}", primary.path.display());
                        config.record(key, &digest);
                        if let Some(ref callback) = config.progress_callback {
                            callback.on_item_completed(primary.size.min(prehash_bytes));
                        }
                        HashOutcome::Computed(digest)
                    }
                    Err(HashError::Interrupted(_)) => HashOutcome::Skipped,
                    Err(e) => {
                        log::warn!("Failed to prehash {}: {}", primary.path.display(), e);
                        HashOutcome::Failed(e)
                    }
                };
                (set, outcome)
            })
            .collect()
    });

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end("prehash");
    }
    if config.is_shutdown_requested() {
        stats.interrupted = true;
        log::info!("Phase 2: Interrupted by shutdown signal");
    }

    let mut buckets: PrehashBuckets = BTreeMap::new();
    for (mut set, outcome) in results {
        let digest = match outcome {
            HashOutcome::Computed(d) => {
                stats.hashed_files += 1;
                d
            }
            HashOutcome::Reused(d) => {
                stats.empty_files += 1;
                d
            }
            HashOutcome::Resumed(d) => {
                stats.resumed_files += 1;
                d
            }
            HashOutcome::Failed(e) => {
                stats.failed_files += 1;
                stats.errors.push(e);
                continue;
            }
            HashOutcome::Skipped => {
                stats.interrupted = true;
                continue;
            }
        };
        set.primary.prehash = Some(digest);
        set.primary.stage = Stage::Prehashed;
        buckets.entry((set.size(), digest)).or_default().push(set);
    }

    buckets.retain(|(_, digest), sets| {
        if sets.len() == 1 {
            stats.unique_prehashes += 1;
            log::trace!(
                "Eliminated unique prehash {}: {}",
                hash_to_hex(digest),
                sets[0].primary.path.display()
            );
            false
        } else {
            stats.potential_duplicates += sets.len();
            stats.duplicate_groups += 1;
            true
        }
    });

    log::info!(
        "Phase 2 complete: {} → {} files ({:.1}% eliminated, {} resumed)",
        stats.input_files,
        stats.potential_duplicates,
        stats.elimination_rate(),
        stats.resumed_files
    );

    (buckets, stats)
}

/// Statistics from the full hash phase.
#[derive(Debug, Clone, Default)]
pub struct FullhashStats {
    /// Total sets that entered Phase 3
    pub input_files: usize,
    /// Number of primaries read in full in this run
    pub hashed_files: usize,
    /// Primaries no longer than the prefix, whose prehash is the full digest
    pub reused_prehashes: usize,
    /// Number of digests taken from the checkpoint
    pub resumed_files: usize,
    /// Number of primaries that failed to hash
    pub failed_files: usize,
    /// Errors encountered during full hashing
    pub errors: Vec<HashError>,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Number of redundant copies (excluding one keeper per group)
    pub duplicate_files: usize,
    /// Bytes reclaimable by removing redundant copies
    pub wasted_space: u64,
    /// Whether phase was interrupted by shutdown
    pub interrupted: bool,
}

impl FullhashStats {
    /// Recompute group-derived counters.
    pub fn calculate_wasted_space(&mut self, groups: &[DuplicateGroup]) {
        self.duplicate_groups = groups.len();
        self.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        self.wasted_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
    }
}

/// Confirm duplicates by digesting complete primaries (Phase 3).
///
/// Primaries no longer than the prehash prefix are not read again: their
/// prehash already covers every byte.
///
/// # Returns
///
/// Confirmed groups ordered by key, plus statistics.
#[must_use]
pub fn phase3_fullhash(
    prehash_groups: PrehashBuckets,
    hasher: Arc<Hasher>,
    config: &HashPhaseConfig,
) -> (Vec<DuplicateGroup>, FullhashStats) {
    let all_sets: Vec<SidecarSet> = prehash_groups.into_values().flatten().collect();
    let mut stats = FullhashStats {
        input_files: all_sets.len(),
        ..Default::default()
    };

    if all_sets.is_empty() {
        log::debug!("Phase 3: No files to process");
        return (Vec::new(), stats);
    }

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start("fullhash", all_sets.len());
    }
    log::info!("Phase 3: Computing full hashes for {} files", all_sets.len());

    let prehash_bytes = hasher.prehash_bytes();
    let results: Vec<(SidecarSet, HashOutcome)> = run_in_pool(config.io_threads, || {
        all_sets
            .into_par_iter()
            .enumerate()
            .map(|(idx, set)| {
                if config.is_shutdown_requested() {
                    return (set, HashOutcome::Skipped);
                }
                if let Some(ref callback) = config.progress_callback {
                    callback.on_progress(idx + 1, set.primary.path.to_string_lossy().as_ref());
                }

                let primary = &set.primary;
                if primary.size <= prehash_bytes {
                    if let Some(prehash) = primary.prehash {
                        return (set, HashOutcome::Reused(prehash));
                    }
                }

                let key = fullhash_unit(&primary.path, primary.size, primary.modified_secs());
                if let Some(digest) = config.resume(&key) {
                    log::trace!("Full hash resumed: {}", primary.path.display());
                    return (set, HashOutcome::Resumed(digest));
                }

                let outcome = match hasher.full_hash(&primary.path) {
                    Ok(digest) => {
                        log::trace!("Full hash computed: {}", primary.path.display());
                        config.record(key, &digest);
                        if let Some(ref callback) = config.progress_callback {
                            callback.on_item_completed(primary.size);
                        }
                        HashOutcome::Computed(digest)
                    }
                    Err(HashError::Interrupted(_)) => HashOutcome::Skipped,
                    Err(e) => {
                        log::warn!("Failed to hash {}: {}", primary.path.display(), e);
                        HashOutcome::Failed(e)
                    }
                };
                (set, outcome)
            })
            .collect()
    });

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end("fullhash");
    }
    if config.is_shutdown_requested() {
        stats.interrupted = true;
        log::info!("Phase 3: Interrupted by shutdown signal");
    }

    let mut by_key: BTreeMap<GroupKey, Vec<SidecarSet>> = BTreeMap::new();
    for (mut set, outcome) in results {
        let full_hash = match outcome {
            HashOutcome::Computed(d) => {
                stats.hashed_files += 1;
                d
            }
            HashOutcome::Reused(d) => {
                stats.reused_prehashes += 1;
                d
            }
            HashOutcome::Resumed(d) => {
                stats.resumed_files += 1;
                d
            }
            HashOutcome::Failed(e) => {
                stats.failed_files += 1;
                stats.errors.push(e);
                continue;
            }
            HashOutcome::Skipped => {
                stats.interrupted = true;
                continue;
            }
        };
        let Some(prehash) = set.primary.prehash else {
            continue;
        };
        set.primary.full_hash = Some(full_hash);
        set.primary.stage = Stage::FullHashed;
        let key = GroupKey {
            size: set.size(),
            prehash,
            full_hash,
        };
        by_key.entry(key).or_default().push(set);
    }

    let groups: Vec<DuplicateGroup> = by_key
        .into_iter()
        .filter_map(|(key, mut sets)| {
            if sets.len() < 2 {
                for set in &mut sets {
                    set.primary.stage = Stage::Unique;
                }
                return None;
            }
            log::debug!("Duplicate group {}: {} members", key, sets.len());
            Some(DuplicateGroup::new(key, sets))
        })
        .collect();

    stats.calculate_wasted_space(&groups);

    log::info!(
        "Phase 3 complete: {} duplicate groups, {} duplicate files, {} reclaimable",
        stats.duplicate_groups,
        stats.duplicate_files,
        ByteSize(stats.wasted_space)
    );

    (groups, stats)
}

/// Configuration for the complete detection pipeline.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of I/O threads for parallel hashing.
    pub io_threads: usize,
    /// Prefix length for the partial digest.
    pub prehash_bytes: u64,
    /// Fail on the first unreadable file instead of reporting it.
    pub strict: bool,
    /// Directory traversal settings.
    pub walker_config: WalkerConfig,
    /// Optional checkpoint for resumable runs.
    pub checkpoint: Option<Arc<Checkpoint>>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("prehash_bytes", &self.prehash_bytes)
            .field("strict", &self.strict)
            .field("walker_config", &self.walker_config)
            .field("checkpoint", &self.checkpoint.as_ref().map(|c| c.path()))
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            prehash_bytes: DEFAULT_PREHASH_BYTES,
            strict: false,
            walker_config: WalkerConfig::default(),
            checkpoint: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the I/O thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the prehash prefix length.
    #[must_use]
    pub fn with_prehash_bytes(mut self, bytes: u64) -> Self {
        self.prehash_bytes = bytes;
        self
    }

    /// Enable or disable strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Attach a checkpoint.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn phase_config(&self) -> HashPhaseConfig {
        HashPhaseConfig {
            io_threads: self.io_threads,
            checkpoint: self.checkpoint.clone(),
            shutdown_flag: self.shutdown_flag.clone(),
            progress_callback: self.progress_callback.clone(),
        }
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Number of primaries (photos and videos) found
    pub total_files: usize,
    /// Number of sidecars attached to a primary
    pub sidecar_files: usize,
    /// Number of sidecars without a primary
    pub orphan_sidecars: usize,
    /// Total size of all primaries in bytes
    pub total_size: u64,
    /// Zero-byte primaries; identical empty files form a group like any other
    pub empty_files: usize,
    /// Number of sets eliminated by size grouping
    pub eliminated_by_size: usize,
    /// Number of sets eliminated by prehash
    pub eliminated_by_prehash: usize,
    /// Digests taken from the checkpoint instead of being recomputed
    pub resumed_units: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding keepers)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates
    pub reclaimable_space: u64,
    /// Duration of the entire scan
    pub scan_duration: Duration,
    /// Errors encountered during the scan
    pub scan_errors: Vec<ScanError>,
}

impl ScanSummary {
    /// Calculate the percentage of space that is wasted by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize(self.total_size).to_string()
    }
}

/// Everything a scan produces.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Confirmed duplicate groups
    pub groups: Vec<DuplicateGroup>,
    /// Video sets not in any group, input to the near-duplicate matcher
    pub unclustered_videos: Vec<SidecarSet>,
    /// Sidecars without a primary
    pub orphans: Vec<MediaFile>,
    /// Counters and errors
    pub summary: ScanSummary,
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file could not be read and strict mode is on.
    #[error(transparent)]
    ScanError(#[from] ScanError),

    /// Progress could not be recorded.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Duplicate finder that orchestrates the multi-phase detection pipeline.
///
/// The `DuplicateFinder` runs the complete duplicate detection pipeline:
/// 1. **Walk** - Collect recognized media from the target directory
/// 2. **Associate** - Attach sidecars to their primaries
/// 3. **Phase 1** - Group sets by primary size
/// 4. **Phase 2** - Compare prehashes of same-size primaries
/// 5. **Phase 3** - Compute full hashes to confirm duplicates
///
/// # Example
///
/// ```no_run
/// use mediadupe::duplicates::{DuplicateFinder, FinderConfig};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
/// let outcome = finder.find_duplicates(Path::new("/photos")).unwrap();
///
/// println!("Found {} duplicate groups", outcome.summary.duplicate_groups);
/// println!("Reclaimable space: {}", outcome.summary.reclaimable_display());
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new().with_prehash_bytes(config.prehash_bytes);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self {
            config,
            hasher: Arc::new(hasher),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Find all duplicate media under the given path.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The path does not exist or is not a directory
    /// - The scan is interrupted by shutdown signal
    /// - Strict mode is on and a file cannot be read
    pub fn find_duplicates(&self, path: &Path) -> Result<ScanOutcome, FinderError> {
        if !path.exists() {
            return Err(FinderError::PathNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(FinderError::NotADirectory(path.to_path_buf()));
        }

        log::info!("Starting duplicate scan of {}", path.display());
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("walking", 0);
            callback.on_message(&format!("Walking {}", path.display()));
        }

        let mut walker = Walker::new(path, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        let mut files = Vec::new();
        let mut walk_errors = Vec::new();
        for (idx, result) in walker.walk().enumerate() {
            match result {
                Ok(file) => {
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(idx + 1, file.path.to_string_lossy().as_ref());
                    }
                    files.push(file);
                }
                Err(e) => {
                    if self.config.strict {
                        return Err(FinderError::ScanError(e));
                    }
                    walk_errors.push(e);
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("walking");
        }
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let mut outcome = self.find_duplicates_from_files(files)?;
        walk_errors.append(&mut outcome.summary.scan_errors);
        outcome.summary.scan_errors = walk_errors;
        Ok(outcome)
    }

    /// Find duplicates from a pre-collected list of files.
    ///
    /// Sidecars in `files` are attached to their primaries first; orphans
    /// are returned in the outcome and never hashed.
    ///
    /// # Errors
    ///
    /// See [`DuplicateFinder::find_duplicates`].
    pub fn find_duplicates_from_files(
        &self,
        files: Vec<MediaFile>,
    ) -> Result<ScanOutcome, FinderError> {
        let start_time = Instant::now();
        let mut summary = ScanSummary::default();

        if let Some(ref checkpoint) = self.config.checkpoint {
            if checkpoint.phase() < Phase::Scanning {
                checkpoint.advance_phase(Phase::Scanning)?;
            }
        }

        let association = associate(files);
        summary.total_files = association.sets.len();
        summary.sidecar_files = association.attached_sidecars();
        summary.orphan_sidecars = association.orphans.len();
        summary.total_size = association.sets.iter().map(SidecarSet::size).sum();

        log::info!(
            "Found {} media files with {} sidecars ({} total)",
            summary.total_files,
            summary.sidecar_files,
            summary.total_size_display()
        );

        let videos: Vec<SidecarSet> = association
            .sets
            .iter()
            .filter(|s| s.is_video() && s.size() > 0)
            .cloned()
            .collect();

        log::info!("Phase 1: Grouping by size...");
        let (size_groups, size_stats) = group_by_size(association.sets);
        summary.eliminated_by_size = size_stats.eliminated_unique;
        summary.empty_files = size_stats.empty_files;
        log::info!(
            "Phase 1 complete: {} → {} files ({:.1}% eliminated)",
            size_stats.total_files,
            size_stats.potential_duplicates,
            size_stats.elimination_rate()
        );

        let phase_config = self.config.phase_config();

        let (prehash_groups, prehash_stats) =
            phase2_prehash(size_groups, self.hasher.clone(), &phase_config);
        summary.eliminated_by_prehash = prehash_stats.unique_prehashes;
        summary.resumed_units += prehash_stats.resumed_files;
        self.absorb_errors(&mut summary, prehash_stats.errors)?;
        if prehash_stats.interrupted || self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let (groups, fullhash_stats) =
            phase3_fullhash(prehash_groups, self.hasher.clone(), &phase_config);
        summary.resumed_units += fullhash_stats.resumed_files;
        self.absorb_errors(&mut summary, fullhash_stats.errors)?;
        if fullhash_stats.interrupted || self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        summary.duplicate_groups = fullhash_stats.duplicate_groups;
        summary.duplicate_files = fullhash_stats.duplicate_files;
        summary.reclaimable_space = fullhash_stats.wasted_space;
        summary.scan_duration = start_time.elapsed();

        let grouped: HashSet<&Path> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m.primary.path.as_path()))
            .collect();
        let unclustered_videos: Vec<SidecarSet> = videos
            .into_iter()
            .filter(|v| !grouped.contains(v.primary.path.as_path()))
            .collect();

        log::info!(
            "Scan complete: {} duplicate groups, {} duplicate files, {} reclaimable, {} units resumed",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.resumed_units
        );

        Ok(ScanOutcome {
            groups,
            unclustered_videos,
            orphans: association.orphans,
            summary,
        })
    }

    fn absorb_errors(
        &self,
        summary: &mut ScanSummary,
        errors: Vec<HashError>,
    ) -> Result<(), FinderError> {
        if self.config.strict {
            if let Some(first) = errors.into_iter().next() {
                return Err(FinderError::ScanError(ScanError::from(first)));
            }
            return Ok(());
        }
        summary
            .scan_errors
            .extend(errors.into_iter().map(ScanError::from));
        Ok(())
    }
}
