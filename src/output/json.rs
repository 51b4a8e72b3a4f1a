//! JSON Lines records for the machine-readable reports.
//!
//! Each report starts with a `run` record followed by one record per group,
//! file or candidate. Every line is a standalone JSON object tagged with
//! `type`.
//!
//! # Scan report
//!
//! ```json
//! {"type":"run","run_id":"20240101_120000","time":"2024-01-01 12:00:00","root":"/photos","recursive":true,"indexed_files":120,"total_size":1048576}
//! {"type":"group","id":"4-ab12..","digest":"ab12..","size":4,"members":[{"path":"/photos/a.jpg","sidecars":[],"captured":null,"mtime":1700000000}],"potential_savings":4}
//! {"type":"summary","duplicate_groups":1,"duplicate_files":1,"reclaimable_space":4,"errors":0}
//! ```

use std::path::PathBuf;

use serde::Serialize;

use super::ReportContext;
use crate::duplicates::{DuplicateGroup, NearDuplicateReport, ScanOutcome, SkipReason};
use crate::resolve::{ActionKind, FileStatus, KeeperReason, ResolveSummary};

/// One member of a group.
#[derive(Debug, Clone, Serialize)]
pub struct MemberLine {
    /// Primary path
    pub path: PathBuf,
    /// Sidecar paths
    pub sidecars: Vec<PathBuf>,
    /// Capture date, if known
    pub captured: Option<String>,
    /// Modification time, seconds since the epoch
    pub mtime: u64,
}

/// A line of the scan report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanLine {
    /// Run header
    Run {
        /// Run identifier
        run_id: String,
        /// Generation time
        time: String,
        /// Target root
        root: PathBuf,
        /// Subdirectories scanned
        recursive: bool,
        /// Primaries indexed
        indexed_files: usize,
        /// Bytes indexed
        total_size: u64,
    },
    /// A duplicate group
    Group {
        /// Group identifier
        id: String,
        /// Full digest
        digest: String,
        /// Size of each primary
        size: u64,
        /// Members, by path
        members: Vec<MemberLine>,
        /// Bytes freed by keeping one member
        potential_savings: u64,
    },
    /// A sidecar without a primary
    Orphan {
        /// Sidecar path
        path: PathBuf,
    },
    /// Totals
    Summary {
        /// Groups found
        duplicate_groups: usize,
        /// Files beyond one per group
        duplicate_files: usize,
        /// Bytes freed by keeping one member per group
        reclaimable_space: u64,
        /// Files that could not be read
        errors: usize,
    },
}

impl ScanLine {
    fn group(group: &DuplicateGroup) -> Self {
        Self::Group {
            id: group.key.id(),
            digest: group.digest_hex(),
            size: group.size(),
            members: group
                .members
                .iter()
                .map(|m| MemberLine {
                    path: m.primary.path.clone(),
                    sidecars: m.sidecars.iter().map(|s| s.path.clone()).collect(),
                    captured: m.primary.captured.map(|d| d.to_string()),
                    mtime: m.primary.modified_secs(),
                })
                .collect(),
            potential_savings: group.wasted_space(),
        }
    }
}

/// Groups ordered by member count, largest first; ties keep key order.
pub(crate) fn ordered_groups(groups: &[DuplicateGroup]) -> Vec<&DuplicateGroup> {
    let mut ordered: Vec<&DuplicateGroup> = groups.iter().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()));
    ordered
}

/// Records of the scan report.
#[must_use]
pub fn scan_lines(outcome: &ScanOutcome, context: &ReportContext) -> Vec<ScanLine> {
    let summary = &outcome.summary;
    let mut lines = vec![ScanLine::Run {
        run_id: context.run_id.clone(),
        time: context.timestamp(),
        root: context.root.clone(),
        recursive: context.recursive,
        indexed_files: summary.total_files,
        total_size: summary.total_size,
    }];
    lines.extend(ordered_groups(&outcome.groups).into_iter().map(ScanLine::group));
    lines.extend(outcome.orphans.iter().map(|o| ScanLine::Orphan {
        path: o.path.clone(),
    }));
    lines.push(ScanLine::Summary {
        duplicate_groups: outcome.groups.len(),
        duplicate_files: outcome.groups.iter().map(DuplicateGroup::duplicate_count).sum(),
        reclaimable_space: outcome.groups.iter().map(DuplicateGroup::wasted_space).sum(),
        errors: summary.scan_errors.len(),
    });
    lines
}

/// A line of the action log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionLine {
    /// Run header
    Run {
        /// Run identifier
        run_id: String,
        /// Generation time
        time: String,
        /// Resolution mode
        mode: String,
        /// Nothing was touched
        dry_run: bool,
    },
    /// One group's action
    Group {
        /// Group identifier
        group: String,
        /// Action kind
        kind: ActionKind,
        /// Kept primary
        keeper: PathBuf,
        /// Rule that chose the keeper
        keeper_reason: KeeperReason,
        /// Every file reached its planned state
        completed: bool,
        /// Executed from a recorded intent
        replayed: bool,
        /// Recorded intent dropped and planned again from the current scan
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        abandoned: bool,
        /// First error
        error: Option<String>,
    },
    /// One file's result
    File {
        /// Group identifier
        group: String,
        /// Original location
        source: PathBuf,
        /// Quarantine location
        destination: Option<PathBuf>,
        /// Size in bytes
        size: u64,
        /// Result label, e.g. `moved` or `failed`
        status: &'static str,
        /// Error of a failed file
        error: Option<String>,
    },
}

/// Records of the action log.
#[must_use]
pub fn action_lines(summary: &ResolveSummary, mode: &str, context: &ReportContext) -> Vec<ActionLine> {
    let mut lines = vec![ActionLine::Run {
        run_id: context.run_id.clone(),
        time: context.timestamp(),
        mode: mode.to_string(),
        dry_run: summary.dry_run,
    }];
    for record in &summary.records {
        let (action, outcome) = (&record.action, &record.outcome);
        lines.push(ActionLine::Group {
            group: action.group.clone(),
            kind: action.kind,
            keeper: action.keeper.clone(),
            keeper_reason: action.keeper_reason,
            completed: outcome.completed,
            replayed: outcome.replayed,
            abandoned: outcome.abandoned,
            error: outcome.error.clone(),
        });
        lines.extend(outcome.files.iter().map(|f| ActionLine::File {
            group: action.group.clone(),
            source: f.source.clone(),
            destination: f.destination.clone(),
            size: f.size,
            status: f.status.label(),
            error: match &f.status {
                FileStatus::Failed { error } => Some(error.clone()),
                _ => None,
            },
        }));
    }
    lines
}

/// A line of the near-duplicate report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NearLine {
    /// Run header
    Run {
        /// Run identifier
        run_id: String,
        /// Generation time
        time: String,
        /// Videos considered
        input_videos: usize,
        /// Videos with a signature
        probed: usize,
        /// Set when the stage did not run
        skipped: Option<SkipReason>,
    },
    /// One candidate pair
    Candidate {
        /// First video
        first: PathBuf,
        /// Second video
        second: PathBuf,
        /// First duration in milliseconds
        first_duration_ms: u64,
        /// Second duration in milliseconds
        second_duration_ms: u64,
        /// Duration difference in milliseconds
        delta_ms: u64,
        /// First codec
        first_codec: Option<String>,
        /// Second codec
        second_codec: Option<String>,
        /// Both codecs known and equal
        same_codec: bool,
    },
}

fn millis(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}

/// Records of the near-duplicate report.
#[must_use]
pub fn near_lines(report: &NearDuplicateReport, context: &ReportContext) -> Vec<NearLine> {
    let mut lines = vec![NearLine::Run {
        run_id: context.run_id.clone(),
        time: context.timestamp(),
        input_videos: report.input_videos,
        probed: report.probed,
        skipped: report.skipped,
    }];
    lines.extend(report.candidates.iter().map(|c| NearLine::Candidate {
        first: c.first.set.primary.path.clone(),
        second: c.second.set.primary.path.clone(),
        first_duration_ms: millis(c.first.signature.duration_secs),
        second_duration_ms: millis(c.second.signature.duration_secs),
        delta_ms: millis(c.duration_delta()),
        first_codec: c.first.signature.codec.clone(),
        second_codec: c.second.signature.codec.clone(),
        same_codec: c.same_codec(),
    }));
    lines
}
