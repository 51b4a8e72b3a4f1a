//! Checkpoint file handling.
//!
//! The log is appended one line per commit and flushed to stable storage
//! before `commit` returns. Every line after the header is wrapped with a
//! sequence number and a SHA256 checksum of its record, so any damage other
//! than a torn final write is detected on load.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::data::{
    group_unit, normalize_path, CheckpointHeader, Entry, Phase, Record, CHECKPOINT_FILE_NAME,
    CHECKPOINT_VERSION,
};
use super::CheckpointError;

/// Counts reported by `status` and at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointStats {
    /// Current phase
    pub phase: Phase,
    /// Completed hashing units
    pub units: usize,
    /// Duplicate groups fully resolved
    pub resolved_groups: usize,
    /// Intents written without a completed outcome
    pub pending_intents: usize,
    /// Records in the log, header excluded
    pub records: u64,
}

/// In-memory view of the log, rebuilt by replay.
#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    phase: Phase,
    units: HashMap<String, String>,
    resolved: HashSet<String>,
    pending: BTreeMap<String, serde_json::Value>,
    last_action: Option<serde_json::Value>,
}

impl State {
    fn new() -> Self {
        Self {
            next_seq: 1,
            ..Default::default()
        }
    }

    fn apply(&mut self, record: Record) {
        match record {
            Record::Unit { key, value } => {
                self.units.insert(key, value);
            }
            Record::Phase { phase } => self.phase = phase,
            Record::ActionIntent { group, action } => {
                self.last_action = Some(action.clone());
                self.pending.insert(group, action);
            }
            Record::ActionOutcome {
                group,
                completed,
                abandoned,
                ..
            } => {
                if completed {
                    self.pending.remove(&group);
                    self.resolved.insert(group_unit(&group));
                } else if abandoned {
                    self.pending.remove(&group);
                }
            }
        }
    }

    fn stats(&self) -> CheckpointStats {
        CheckpointStats {
            phase: self.phase,
            units: self.units.len(),
            resolved_groups: self.resolved.len(),
            pending_intents: self.pending.len(),
            records: self.next_seq - 1,
        }
    }
}

struct Inner {
    file: File,
    state: State,
}

/// Write-ahead progress log for one run over one target root.
///
/// Safe to share between worker threads; commits are serialized through an
/// internal lock so lines never interleave.
pub struct Checkpoint {
    path: PathBuf,
    header: CheckpointHeader,
    resumed: bool,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}

/// Result of replaying an existing file.
struct Replayed {
    header: Option<CheckpointHeader>,
    state: State,
    committed_len: u64,
    torn: bool,
}

impl Checkpoint {
    /// Default checkpoint location for a target root.
    #[must_use]
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(CHECKPOINT_FILE_NAME)
    }

    /// Open the checkpoint at `path`, or start a new one if none exists.
    ///
    /// A torn final line (an interrupted write) is dropped and the file is
    /// truncated back to the last complete record.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Corrupt`] for malformed records, checksum
    /// mismatches or sequence gaps, [`CheckpointError::RootMismatch`] when
    /// the log belongs to another target, and I/O errors.
    pub fn load_or_init(path: &Path, root: &Path) -> Result<Self, CheckpointError> {
        if !path.exists() {
            return Self::create(path, root);
        }

        let bytes = fs::read(path).map_err(|e| CheckpointError::io(path, e))?;
        let replayed = replay(path, &bytes)?;

        let Some(header) = replayed.header else {
            log::warn!(
                "Checkpoint {} holds only a partial header, starting a new run",
                path.display()
            );
            return Self::create(path, root);
        };

        if normalize_path(&header.root) != normalize_path(root) {
            return Err(CheckpointError::RootMismatch {
                path: path.to_path_buf(),
                expected: root.to_path_buf(),
                found: header.root,
            });
        }

        if replayed.torn {
            log::warn!(
                "Dropping incomplete final record of {} (interrupted write)",
                path.display()
            );
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| CheckpointError::io(path, e))?;
            file.set_len(replayed.committed_len)
                .and_then(|()| file.sync_all())
                .map_err(|e| CheckpointError::io(path, e))?;
        }

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| CheckpointError::io(path, e))?;

        let stats = replayed.state.stats();
        log::info!(
            "Resuming run {} from {} (phase {}, {} units, {} groups resolved, {} pending)",
            header.run_id,
            path.display(),
            stats.phase,
            stats.units,
            stats.resolved_groups,
            stats.pending_intents
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            resumed: true,
            inner: Mutex::new(Inner {
                file,
                state: replayed.state,
            }),
        })
    }

    fn create(path: &Path, root: &Path) -> Result<Self, CheckpointError> {
        let run_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let header = CheckpointHeader::new(run_id, root.to_path_buf());
        let mut line = serde_json::to_string(&header)?;
        line.push('\n');

        let mut file = File::create(path).map_err(|e| CheckpointError::io(path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| CheckpointError::io(path, e))?;
        drop(file);

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| CheckpointError::io(path, e))?;

        log::debug!("Started checkpoint {} for run {}", path.display(), header.run_id);

        Ok(Self {
            path: path.to_path_buf(),
            header,
            resumed: false,
            inner: Mutex::new(Inner {
                file,
                state: State::new(),
            }),
        })
    }

    /// Read a checkpoint without modifying it.
    ///
    /// Returns `None` when no checkpoint exists.
    ///
    /// # Errors
    ///
    /// Same corruption errors as [`Checkpoint::load_or_init`].
    pub fn inspect(path: &Path) -> Result<Option<(CheckpointHeader, CheckpointStats)>, CheckpointError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(|e| CheckpointError::io(path, e))?;
        let replayed = replay(path, &bytes)?;
        Ok(replayed
            .header
            .map(|header| (header, replayed.state.stats())))
    }

    /// Remove a checkpoint file, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn discard(path: &Path) -> Result<bool, CheckpointError> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::warn!("Discarded checkpoint {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckpointError::io(path, e)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, record: Record) -> Result<(), CheckpointError> {
        let mut inner = self.lock();
        let seq = inner.state.next_seq;
        let line = encode_entry(seq, &record)?;
        inner
            .file
            .write_all(line.as_bytes())
            .and_then(|()| inner.file.sync_data())
            .map_err(|e| CheckpointError::io(&self.path, e))?;
        inner.state.next_seq += 1;
        inner.state.apply(record);
        Ok(())
    }

    /// Durably record a completed unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written and flushed.
    pub fn commit(&self, key: String, value: String) -> Result<(), CheckpointError> {
        self.append(Record::Unit { key, value })
    }

    /// Whether a unit (hashing unit or `group:` key) has been recorded.
    #[must_use]
    pub fn is_complete(&self, key: &str) -> bool {
        let inner = self.lock();
        inner.state.units.contains_key(key) || inner.state.resolved.contains(key)
    }

    /// Stored result of a completed unit.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lock().state.units.get(key).cloned()
    }

    /// Whether the group with this identifier has been fully resolved.
    #[must_use]
    pub fn is_resolved(&self, group_id: &str) -> bool {
        self.lock().state.resolved.contains(&group_unit(group_id))
    }

    /// Move the run to a new phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn advance_phase(&self, phase: Phase) -> Result<(), CheckpointError> {
        if self.phase() == phase {
            return Ok(());
        }
        log::debug!("Checkpoint phase -> {}", phase);
        self.append(Record::Phase { phase })
    }

    /// Persist a planned action before it touches the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be serialized or written.
    pub fn record_intent<T: Serialize>(&self, group: &str, action: &T) -> Result<(), CheckpointError> {
        let action = serde_json::to_value(action)?;
        self.append(Record::ActionIntent {
            group: group.to_string(),
            action,
        })
    }

    /// Persist the result of executing an intent.
    ///
    /// Only a completed outcome marks the group resolved; a failed one leaves
    /// the intent pending for the next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome cannot be serialized or written.
    pub fn record_outcome<T: Serialize>(
        &self,
        group: &str,
        completed: bool,
        outcome: &T,
    ) -> Result<(), CheckpointError> {
        let outcome = serde_json::to_value(outcome)?;
        self.append(Record::ActionOutcome {
            group: group.to_string(),
            completed,
            abandoned: false,
            outcome,
        })
    }

    /// Drop a pending intent that can no longer complete.
    ///
    /// The group is neither pending nor resolved afterwards, so the next plan
    /// for it starts from the current state of the files.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome cannot be serialized or written.
    pub fn abandon_intent<T: Serialize>(&self, group: &str, outcome: &T) -> Result<(), CheckpointError> {
        let outcome = serde_json::to_value(outcome)?;
        self.append(Record::ActionOutcome {
            group: group.to_string(),
            completed: false,
            abandoned: true,
            outcome,
        })
    }

    /// Intent recorded for a group that has not completed yet.
    #[must_use]
    pub fn pending_intent(&self, group: &str) -> Option<serde_json::Value> {
        self.lock().state.pending.get(group).cloned()
    }

    /// All pending intents, ordered by group identifier.
    #[must_use]
    pub fn pending_intents(&self) -> Vec<(String, serde_json::Value)> {
        self.lock()
            .state
            .pending
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The most recent intent written to the log.
    #[must_use]
    pub fn last_action(&self) -> Option<serde_json::Value> {
        self.lock().state.last_action.clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().state.phase
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> CheckpointStats {
        self.lock().state.stats()
    }

    /// Run identifier, also used as the quarantine namespace.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.header.run_id
    }

    /// Header of the log.
    #[must_use]
    pub fn header(&self) -> &CheckpointHeader {
        &self.header
    }

    /// Location of the log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this run picked up an existing log.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Delete the log after confirmed completion of the run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be removed.
    pub fn finish(self) -> Result<(), CheckpointError> {
        let Self { path, inner, .. } = self;
        drop(inner);
        fs::remove_file(&path).map_err(|e| CheckpointError::io(&path, e))?;
        log::debug!("Removed checkpoint {}", path.display());
        Ok(())
    }
}

fn checksum(record_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record_json.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn encode_entry(seq: u64, record: &Record) -> Result<String, CheckpointError> {
    let record_json = serde_json::to_string(record)?;
    let entry = Entry {
        seq,
        checksum: checksum(&record_json),
        record: record.clone(),
    };
    let mut line = serde_json::to_string(&entry)?;
    line.push('\n');
    Ok(line)
}

/// Leading bytes of every serialized [`CheckpointHeader`].
const HEADER_PREFIX: &[u8] = b"{\"version\":";

/// Whether `bytes` (holding no newline) are the start of a header and nothing
/// more: an interrupted first write.
fn is_header_fragment(bytes: &[u8]) -> bool {
    if HEADER_PREFIX.starts_with(bytes) {
        return true;
    }
    if !bytes.starts_with(HEADER_PREFIX) {
        return false;
    }
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<serde_json::Value>();
    match stream.next() {
        Some(Err(e)) => e.is_eof(),
        // a complete object followed by anything else is not a torn header
        Some(Ok(_)) => stream.byte_offset() == bytes.len(),
        None => true,
    }
}

fn replay(path: &Path, bytes: &[u8]) -> Result<Replayed, CheckpointError> {
    let committed_len = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let torn = committed_len < bytes.len();

    let corrupt = |line: usize, reason: String| CheckpointError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let committed = &bytes[..committed_len];
    // split() yields a trailing empty slice after the final newline
    let count = committed.iter().filter(|&&b| b == b'\n').count();
    let mut lines = committed
        .split(|&b| b == b'\n')
        .take(count)
        .enumerate()
        .map(|(idx, line)| (idx + 1, line));

    let mut state = State::new();
    let Some((_, first)) = lines.next() else {
        // only an interrupted header write may be started over
        if !is_header_fragment(bytes) {
            return Err(corrupt(1, "unterminated header".to_string()));
        }
        return Ok(Replayed {
            header: None,
            state,
            committed_len: 0,
            torn,
        });
    };

    let header: CheckpointHeader = serde_json::from_slice(first)
        .map_err(|e| corrupt(1, format!("invalid header: {e}")))?;
    if header.version != CHECKPOINT_VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.version,
            expected: CHECKPOINT_VERSION,
        });
    }

    for (number, line) in lines {
        let entry: Entry = serde_json::from_slice(line)
            .map_err(|e| corrupt(number, format!("malformed record: {e}")))?;
        if entry.seq != state.next_seq {
            return Err(corrupt(
                number,
                format!("sequence gap: expected {}, found {}", state.next_seq, entry.seq),
            ));
        }
        let record_json = serde_json::to_string(&entry.record)?;
        if checksum(&record_json) != entry.checksum {
            return Err(corrupt(number, "checksum mismatch".to_string()));
        }
        state.next_seq += 1;
        state.apply(entry.record);
    }

    Ok(Replayed {
        header: Some(header),
        state,
        committed_len: committed_len as u64,
        torn,
    })
}
