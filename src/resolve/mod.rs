//! Duplicate resolution.
//!
//! # Overview
//!
//! For every [`DuplicateGroup`] the resolver picks one keeper and applies the
//! requested action to every other member, primary first and then its
//! sidecars:
//!
//! - **Quarantine** (default): move into `_quarantine_<run_id>/<digest>/`
//! - **Delete**: remove permanently; only reachable with an explicit
//!   [`PermanentDeletion::Acknowledged`]
//!
//! # Write-ahead
//!
//! The planned [`ResolutionAction`] is persisted to the checkpoint before any
//! file is touched, and its [`ActionOutcome`] afterwards. A group whose
//! outcome is missing or failed is replayed from the recorded plan on the next
//! run. Replaying an action whose files already reached their destination is
//! a no-op, so a crash at any point can be rolled forward.
//!
//! A replay that cannot finish (keeper gone, a source changed on disk) is
//! abandoned: the intent is closed in the checkpoint and the group is planned
//! again from the scan of the current run.
//!
//! # Example
//!
//! ```no_run
//! use mediadupe::duplicates::DuplicateFinder;
//! use mediadupe::resolve::{ResolveConfig, Resolver};
//! use std::path::Path;
//!
//! let target = Path::new("/photos");
//! let mut outcome = DuplicateFinder::with_defaults().find_duplicates(target).unwrap();
//! let resolver = Resolver::new(ResolveConfig::quarantine(target, "20240101_120000"));
//! let summary = resolver.resolve(&mut outcome.groups).unwrap();
//! println!("{} groups resolved", summary.completed());
//! ```

pub mod delete;
pub mod keeper;
pub mod quarantine;

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, CheckpointError, Phase};
use crate::duplicates::DuplicateGroup;
use crate::media::{hash_to_hex, HashError, Hasher, MediaFile, Stage};

pub use delete::{ensure_keeper_present, permanent_delete, FileSnapshot};
pub use keeper::{keeper_order, select_keeper, KeeperReason};
pub use quarantine::{move_file, quarantine_root, MoveMethod};

/// What happens to non-keepers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Move into the run's quarantine directory
    #[default]
    Quarantine,
    /// Remove permanently
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quarantine => write!(f, "quarantine"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Proof that the caller asked for irreversible deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermanentDeletion {
    /// The operator confirmed permanent deletion
    Acknowledged,
}

/// Where non-keepers go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Into this quarantine root
    Quarantine {
        /// `<target>/_quarantine_<run_id>`
        root: PathBuf,
    },
    /// Nowhere
    Delete(PermanentDeletion),
}

impl Disposition {
    /// Action kind this disposition performs.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Quarantine { .. } => ActionKind::Quarantine,
            Self::Delete(_) => ActionKind::Delete,
        }
    }
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// What happens to non-keepers
    pub disposition: Disposition,
    /// Plan only; nothing is moved, deleted or recorded
    pub dry_run: bool,
    /// Checked between groups
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ResolveConfig {
    /// Quarantine under `target` in the namespace of `run_id`.
    #[must_use]
    pub fn quarantine(target: &Path, run_id: &str) -> Self {
        Self {
            disposition: Disposition::Quarantine {
                root: quarantine_root(target, run_id),
            },
            dry_run: false,
            shutdown_flag: None,
        }
    }

    /// Delete permanently.
    #[must_use]
    pub fn delete(acknowledged: PermanentDeletion) -> Self {
        Self {
            disposition: Disposition::Delete(acknowledged),
            dry_run: false,
            shutdown_flag: None,
        }
    }

    /// Plan without touching anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the shutdown flag.
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
}

/// Error while actioning a single file.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File changed since it was scanned.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The keeper is gone or changed; nothing in the group may be actioned.
    #[error("keeper missing or changed: {0}")]
    KeeperMissing(PathBuf),

    /// The quarantine destination is occupied by another file.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// A landed copy could not be compared with its source.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    /// Map an I/O error on `path`.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Errors that stop resolution altogether.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The checkpoint could not be written; continuing would lose the
    /// write-ahead guarantee.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A recorded intent could not be decoded.
    #[error("Recorded action for group {group} is unreadable: {source}")]
    InvalidIntent {
        /// Group identifier
        group: String,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },

    /// Shutdown requested between groups.
    #[error("Resolution interrupted")]
    Interrupted,
}

/// One file of a planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedFile {
    /// Current location
    pub source: PathBuf,
    /// Quarantine location; `None` when deleting
    pub destination: Option<PathBuf>,
    /// Size at scan time
    pub size: u64,
    /// Modification time at scan time, seconds part
    pub mtime_secs: u64,
    /// Modification time at scan time, nanoseconds part
    pub mtime_nanos: u32,
}

impl PlannedFile {
    fn new(file: &MediaFile, destination: Option<PathBuf>) -> Self {
        let since_epoch = file
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            source: file.path.clone(),
            destination,
            size: file.size,
            mtime_secs: since_epoch.as_secs(),
            mtime_nanos: since_epoch.subsec_nanos(),
        }
    }

    /// Snapshot to verify against before acting.
    #[must_use]
    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot::recorded(&self.source, self.size, self.mtime_secs, self.mtime_nanos)
    }
}

/// A non-keeper sidecar set of a planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSet {
    /// The primary
    pub primary: PlannedFile,
    /// Its sidecars
    pub sidecars: Vec<PlannedFile>,
}

impl PlannedSet {
    /// Every file, primary first.
    pub fn files(&self) -> impl Iterator<Item = &PlannedFile> {
        std::iter::once(&self.primary).chain(self.sidecars.iter())
    }
}

/// The plan for one duplicate group, persisted before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAction {
    /// Group identifier
    pub group: String,
    /// Full digest of the group
    pub digest: String,
    /// Size of every primary
    pub size: u64,
    /// Action applied to non-keepers
    pub kind: ActionKind,
    /// Kept primary
    pub keeper: PathBuf,
    /// Sidecars of the keeper, left in place
    pub keeper_sidecars: Vec<PathBuf>,
    /// Rule that chose the keeper
    pub keeper_reason: KeeperReason,
    /// Everything to be actioned
    pub actioned: Vec<PlannedSet>,
}

impl ResolutionAction {
    /// Number of files the action touches.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.actioned.iter().map(|s| 1 + s.sidecars.len()).sum()
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Renamed into the quarantine
    Moved,
    /// Copied into the quarantine and removed
    Copied,
    /// Deleted
    Deleted,
    /// Already in its planned state (replay)
    AlreadyDone,
    /// Would be actioned (dry run)
    Planned,
    /// Not attempted: an earlier step of its set failed, or the file
    /// vanished before anything reached the quarantine
    Skipped,
    /// Failed
    Failed {
        /// Error message
        error: String,
    },
}

impl FileStatus {
    /// Short lowercase label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::Copied => "copied",
            Self::Deleted => "deleted",
            Self::AlreadyDone => "already_done",
            Self::Planned => "planned",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the file reached its planned state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Self::Moved | Self::Copied | Self::Deleted | Self::AlreadyDone
        )
    }
}

/// Per-file result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Original location
    pub source: PathBuf,
    /// Quarantine location, if any
    pub destination: Option<PathBuf>,
    /// Size at scan time
    pub size: u64,
    /// Result
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Result of executing a [`ResolutionAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Group identifier
    pub group: String,
    /// Every file reached its planned state
    pub completed: bool,
    /// Executed from a recorded intent
    pub replayed: bool,
    /// Recorded intent dropped; the group is planned again from the current scan
    #[serde(default)]
    pub abandoned: bool,
    /// Bytes moved out of place or deleted
    pub bytes_actioned: u64,
    /// First error, if any
    pub error: Option<String>,
    /// Per-file results, in plan order
    pub files: Vec<FileOutcome>,
}

/// A planned action with its outcome.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// The plan
    pub action: ResolutionAction,
    /// Its result
    pub outcome: ActionOutcome,
}

/// Result of a resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ResolveSummary {
    /// Actions taken (or planned in a dry run), replays first
    pub records: Vec<ActionRecord>,
    /// Groups skipped because an earlier run resolved them
    pub already_resolved: usize,
    /// Nothing was touched
    pub dry_run: bool,
}

impl ResolveSummary {
    /// Groups whose action completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.completed).count()
    }

    /// Groups whose action failed and remain pending.
    #[must_use]
    pub fn failed(&self) -> usize {
        if self.dry_run {
            return 0;
        }
        self.records
            .iter()
            .filter(|r| !r.outcome.completed && !r.outcome.abandoned)
            .count()
    }

    /// Recorded intents dropped because they could no longer complete.
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.abandoned).count()
    }

    /// Groups executed from a recorded intent.
    #[must_use]
    pub fn replayed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.replayed).count()
    }

    /// Files that reached their planned state.
    #[must_use]
    pub fn files_actioned(&self) -> usize {
        self.records
            .iter()
            .flat_map(|r| r.outcome.files.iter())
            .filter(|f| f.status.is_done())
            .count()
    }

    /// Bytes moved or deleted.
    #[must_use]
    pub fn bytes_actioned(&self) -> u64 {
        self.records.iter().map(|r| r.outcome.bytes_actioned).sum()
    }
}

/// Plan the action for one group.
///
/// Quarantine destinations are allocated here, so a replayed plan lands files
/// exactly where the first attempt would have. Returns `None` for groups with
/// fewer than two members.
#[must_use]
pub fn plan_action(group: &DuplicateGroup, disposition: &Disposition) -> Option<ResolutionAction> {
    if group.len() < 2 {
        return None;
    }
    let (keeper_idx, keeper_reason) = select_keeper(group)?;
    let keeper = &group.members[keeper_idx];

    let dir = match disposition {
        Disposition::Quarantine { root } => Some(quarantine::group_dir(root, &group.digest_hex())),
        Disposition::Delete(_) => None,
    };
    let mut taken = HashSet::new();

    let actioned = group
        .members
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != keeper_idx)
        .map(|(_, set)| -> Option<PlannedSet> {
            let files: Vec<&MediaFile> =
                std::iter::once(&set.primary).chain(set.sidecars.iter()).collect();
            let destinations: Vec<Option<PathBuf>> = match &dir {
                Some(dir) => {
                    let names: Vec<OsString> = files
                        .iter()
                        .map(|f| f.path.file_name().unwrap_or_default().to_os_string())
                        .collect();
                    quarantine::allocate(dir, &names, &mut taken)
                        .into_iter()
                        .map(Some)
                        .collect()
                }
                None => vec![None; files.len()],
            };
            let mut planned: Vec<PlannedFile> = files
                .iter()
                .zip(destinations)
                .map(|(f, d)| PlannedFile::new(f, d))
                .collect();
            let sidecars = planned.split_off(1);
            let primary = planned.pop()?;
            Some(PlannedSet { primary, sidecars })
        })
        .collect::<Option<Vec<_>>>()?;

    log::debug!(
        "Group {}: keeping {} ({})",
        group.key,
        keeper.primary.path.display(),
        keeper_reason
    );

    Some(ResolutionAction {
        group: group.key.id(),
        digest: group.digest_hex(),
        size: group.size(),
        kind: disposition.kind(),
        keeper: keeper.primary.path.clone(),
        keeper_sidecars: keeper.sidecars.iter().map(|s| s.path.clone()).collect(),
        keeper_reason,
        actioned,
    })
}

/// Whether the file at `destination` holds the content expected for `file`.
///
/// `expected` is the group digest for primaries; sidecars are compared with
/// their source.
fn landed_copy_matches(
    file: &PlannedFile,
    destination: &Path,
    expected: Option<&str>,
) -> Result<bool, ActionError> {
    let hasher = Hasher::new();
    let landed = hash_to_hex(&hasher.full_hash(destination)?);
    let expected = match expected {
        Some(digest) => digest.to_string(),
        None => hash_to_hex(&hasher.full_hash(&file.source)?),
    };
    Ok(landed == expected)
}

fn execute_file(
    file: &PlannedFile,
    kind: ActionKind,
    expected: Option<&str>,
) -> Result<FileStatus, ActionError> {
    let source_present = file.source.symlink_metadata().is_ok();
    match kind {
        ActionKind::Delete => {
            if !source_present {
                log::debug!("Already deleted: {}", file.source.display());
                return Ok(FileStatus::AlreadyDone);
            }
            file.snapshot().verify()?;
            permanent_delete(&file.source)?;
            Ok(FileStatus::Deleted)
        }
        ActionKind::Quarantine => {
            let destination = file
                .destination
                .as_deref()
                .ok_or_else(|| ActionError::DestinationExists(file.source.clone()))?;
            let landed = destination.symlink_metadata().ok();
            match (source_present, landed) {
                (false, Some(_)) => {
                    log::debug!("Already quarantined: {}", file.source.display());
                    Ok(FileStatus::AlreadyDone)
                }
                (false, None) => {
                    log::warn!(
                        "Skipping {}: gone since the scan and not in the quarantine",
                        file.source.display()
                    );
                    Ok(FileStatus::Skipped)
                }
                // a copy landed but the source was not removed yet
                (true, Some(meta)) if meta.len() == file.size => {
                    file.snapshot().verify()?;
                    if !landed_copy_matches(file, destination, expected)? {
                        return Err(ActionError::DestinationExists(destination.to_path_buf()));
                    }
                    std::fs::remove_file(&file.source)
                        .map_err(|e| ActionError::from_io(&file.source, e))?;
                    log::info!(
                        "MOVED {} -> {} (completed)",
                        file.source.display(),
                        destination.display()
                    );
                    Ok(FileStatus::Copied)
                }
                (true, Some(_)) => Err(ActionError::DestinationExists(destination.to_path_buf())),
                (true, None) => {
                    file.snapshot().verify()?;
                    Ok(match move_file(&file.source, destination)? {
                        MoveMethod::Renamed => FileStatus::Moved,
                        MoveMethod::Copied => FileStatus::Copied,
                    })
                }
            }
        }
    }
}

/// Execute a planned action.
///
/// The keeper is verified first; if it is missing nothing is touched. Within
/// each set the primary goes first and its sidecars only follow once the
/// primary succeeded. A source that vanished before anything landed is
/// skipped without failing the group; a vanished primary leaves its sidecars
/// in place.
#[must_use]
pub fn execute_action(action: &ResolutionAction) -> ActionOutcome {
    let mut outcome = ActionOutcome {
        group: action.group.clone(),
        completed: true,
        replayed: false,
        abandoned: false,
        bytes_actioned: 0,
        error: None,
        files: Vec::with_capacity(action.file_count()),
    };

    let skip_all = |outcome: &mut ActionOutcome, error: String| {
        outcome.completed = false;
        outcome.error = Some(error);
        for file in action.actioned.iter().flat_map(PlannedSet::files) {
            outcome.files.push(file_outcome(file, FileStatus::Skipped));
        }
    };

    if let Err(e) = ensure_keeper_present(&action.keeper, action.size) {
        log::warn!("Group {} not actioned: {}", action.group, e);
        skip_all(&mut outcome, e.to_string());
        return outcome;
    }

    for set in &action.actioned {
        let mut stop = false;
        for (idx, file) in set.files().enumerate() {
            if stop {
                outcome.files.push(file_outcome(file, FileStatus::Skipped));
                continue;
            }
            let expected = (idx == 0).then_some(action.digest.as_str());
            let status = match execute_file(file, action.kind, expected) {
                Ok(FileStatus::Skipped) => {
                    stop = idx == 0;
                    FileStatus::Skipped
                }
                Ok(status) => status,
                Err(e) => {
                    log::warn!("Failed to {} {}: {}", action.kind, file.source.display(), e);
                    outcome.completed = false;
                    outcome.error.get_or_insert_with(|| e.to_string());
                    stop = true;
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            if status.is_done() {
                outcome.bytes_actioned += file.size;
            }
            outcome.files.push(file_outcome(file, status));
        }
    }
    outcome
}

fn file_outcome(file: &PlannedFile, status: FileStatus) -> FileOutcome {
    FileOutcome {
        source: file.source.clone(),
        destination: file.destination.clone(),
        size: file.size,
        status,
    }
}

fn planned_outcome(action: &ResolutionAction) -> ActionOutcome {
    ActionOutcome {
        group: action.group.clone(),
        completed: false,
        replayed: false,
        abandoned: false,
        bytes_actioned: 0,
        error: None,
        files: action
            .actioned
            .iter()
            .flat_map(PlannedSet::files)
            .map(|f| file_outcome(f, FileStatus::Planned))
            .collect(),
    }
}

/// Applies resolution actions to duplicate groups.
#[derive(Debug)]
pub struct Resolver {
    config: ResolveConfig,
    checkpoint: Option<Arc<Checkpoint>>,
}

impl Resolver {
    /// Create a resolver without a checkpoint.
    #[must_use]
    pub fn new(config: ResolveConfig) -> Self {
        Self {
            config,
            checkpoint: None,
        }
    }

    /// Record intents and outcomes in `checkpoint`.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// Resolve every group.
    ///
    /// Pending intents from an earlier run are replayed first. A replay that
    /// cannot complete is abandoned and its group planned again below. Then
    /// every group not yet resolved is planned, recorded and executed. A
    /// failing group does not stop the others; it stays pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written, a recorded intent
    /// cannot be decoded, or shutdown is requested.
    pub fn resolve(&self, groups: &mut [DuplicateGroup]) -> Result<ResolveSummary, ResolveError> {
        let dry_run = self.config.dry_run;
        let mut summary = ResolveSummary {
            dry_run,
            ..Default::default()
        };
        let mut handled: HashSet<String> = HashSet::new();

        let checkpoint = self.checkpoint.as_deref();
        if let Some(cp) = checkpoint.filter(|_| !dry_run) {
            if cp.phase() < Phase::Resolving {
                cp.advance_phase(Phase::Resolving)?;
            }
            for (group, value) in cp.pending_intents() {
                if self.config.is_shutdown_requested() {
                    return Err(ResolveError::Interrupted);
                }
                let action: ResolutionAction = serde_json::from_value(value)
                    .map_err(|source| ResolveError::InvalidIntent {
                        group: group.clone(),
                        source,
                    })?;
                log::info!("Replaying recorded action for group {}", group);
                let mut outcome = execute_action(&action);
                outcome.replayed = true;
                if outcome.completed {
                    cp.record_outcome(&group, true, &outcome)?;
                    handled.insert(group);
                } else {
                    log::warn!(
                        "Recorded action for group {} cannot complete ({}), planning it again",
                        group,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                    outcome.abandoned = true;
                    cp.abandon_intent(&group, &outcome)?;
                }
                summary.records.push(ActionRecord { action, outcome });
            }
        }

        for group in groups.iter_mut() {
            if self.config.is_shutdown_requested() {
                return Err(ResolveError::Interrupted);
            }
            let id = group.key.id();
            if handled.contains(&id) {
                mark_resolved(group, &summary);
                continue;
            }
            if checkpoint.is_some_and(|cp| cp.is_resolved(&id)) {
                log::debug!("Group {} already resolved", id);
                summary.already_resolved += 1;
                continue;
            }
            let Some(action) = plan_action(group, &self.config.disposition) else {
                continue;
            };

            if dry_run {
                let outcome = planned_outcome(&action);
                summary.records.push(ActionRecord { action, outcome });
                continue;
            }

            if let Some(cp) = checkpoint {
                cp.record_intent(&id, &action)?;
            }
            let outcome = execute_action(&action);
            if let Some(cp) = checkpoint {
                cp.record_outcome(&id, outcome.completed, &outcome)?;
            }
            summary.records.push(ActionRecord { action, outcome });
            mark_resolved(group, &summary);
        }

        log::info!(
            "Resolution: {} groups completed, {} failed, {} replayed, {} abandoned, {} already resolved",
            summary.completed(),
            summary.failed(),
            summary.replayed(),
            summary.abandoned(),
            summary.already_resolved
        );
        Ok(summary)
    }
}

fn mark_resolved(group: &mut DuplicateGroup, summary: &ResolveSummary) {
    let id = group.key.id();
    let completed = summary
        .records
        .iter()
        .rev()
        .find(|r| r.action.group == id)
        .is_some_and(|r| r.outcome.completed);
    if completed {
        for set in &mut group.members {
            set.primary.stage = Stage::Resolved;
            for sidecar in &mut set.sidecars {
                sidecar.stage = Stage::Resolved;
            }
        }
    }
}
