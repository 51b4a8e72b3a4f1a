//! Report writers.
//!
//! Every run appends to three pairs of reports in the report directory (the
//! target root unless configured otherwise):
//!
//! | report | text | JSON Lines |
//! |---|---|---|
//! | duplicate scan | `mediadupe_scan.txt` | `mediadupe_scan.jsonl` |
//! | resolution actions | `mediadupe_actions.txt` | `mediadupe_actions.jsonl` |
//! | near-duplicate videos | `mediadupe_near_duplicates.txt` | `mediadupe_near_duplicates.jsonl` |
//!
//! Reports are append-only; each run starts with a header block or record.
//!
//! # Example
//!
//! ```no_run
//! use mediadupe::duplicates::DuplicateFinder;
//! use mediadupe::output::{ReportContext, ReportWriter};
//! use std::path::Path;
//!
//! let target = Path::new("/photos");
//! let outcome = DuplicateFinder::with_defaults().find_duplicates(target).unwrap();
//! let writer = ReportWriter::new(target, ReportContext::new(target, "20240101_120000", true));
//! writer.write_scan(&outcome).unwrap();
//! ```

pub mod json;
pub mod text;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::duplicates::{NearDuplicateReport, ScanOutcome};
use crate::resolve::ResolveSummary;

pub use json::{ActionLine, NearLine, ScanLine};
pub use text::{render_actions_report, render_near_report, render_scan_report};

/// Scan report, human-readable.
pub const SCAN_TEXT: &str = "mediadupe_scan.txt";
/// Scan report, JSON Lines.
pub const SCAN_JSONL: &str = "mediadupe_scan.jsonl";
/// Action log, human-readable.
pub const ACTIONS_TEXT: &str = "mediadupe_actions.txt";
/// Action log, JSON Lines.
pub const ACTIONS_JSONL: &str = "mediadupe_actions.jsonl";
/// Near-duplicate report, human-readable.
pub const NEAR_TEXT: &str = "mediadupe_near_duplicates.txt";
/// Near-duplicate report, JSON Lines.
pub const NEAR_JSONL: &str = "mediadupe_near_duplicates.jsonl";

/// Errors that can occur while writing reports.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("Cannot write report {path}: {source}")]
    Io {
        /// Report path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Run details repeated in every report header.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Target root
    pub root: PathBuf,
    /// Run identifier
    pub run_id: String,
    /// Whether subdirectories were scanned
    pub recursive: bool,
    /// When the reports were generated
    pub generated_at: DateTime<Local>,
}

impl ReportContext {
    /// Context stamped with the current time.
    #[must_use]
    pub fn new(root: &Path, run_id: &str, recursive: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            run_id: run_id.to_string(),
            recursive,
            generated_at: Local::now(),
        }
    }

    pub(crate) fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Appends reports to a directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    context: ReportContext,
}

impl ReportWriter {
    /// Write into `dir`.
    #[must_use]
    pub fn new(dir: &Path, context: ReportContext) -> Self {
        Self {
            dir: dir.to_path_buf(),
            context,
        }
    }

    /// Full path of a report file.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Append the duplicate scan report pair.
    ///
    /// # Errors
    ///
    /// Returns an error if a report cannot be written.
    pub fn write_scan(&self, outcome: &ScanOutcome) -> Result<(), ReportError> {
        self.append(SCAN_TEXT, render_scan_report(outcome, &self.context).as_bytes())?;
        self.append_lines(SCAN_JSONL, &json::scan_lines(outcome, &self.context))
    }

    /// Append the action log pair.
    ///
    /// # Errors
    ///
    /// Returns an error if a report cannot be written.
    pub fn write_actions(&self, summary: &ResolveSummary, mode: &str) -> Result<(), ReportError> {
        self.append(
            ACTIONS_TEXT,
            render_actions_report(summary, mode, &self.context).as_bytes(),
        )?;
        self.append_lines(ACTIONS_JSONL, &json::action_lines(summary, mode, &self.context))
    }

    /// Append the near-duplicate report pair.
    ///
    /// # Errors
    ///
    /// Returns an error if a report cannot be written.
    pub fn write_near(&self, report: &NearDuplicateReport) -> Result<(), ReportError> {
        self.append(NEAR_TEXT, render_near_report(report, &self.context).as_bytes())?;
        self.append_lines(NEAR_JSONL, &json::near_lines(report, &self.context))
    }

    fn open(&self, name: &str) -> Result<(File, PathBuf), ReportError> {
        let path = self.path(name);
        let io_err = |source| ReportError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        Ok((file, path))
    }

    fn append(&self, name: &str, bytes: &[u8]) -> Result<(), ReportError> {
        let (mut file, path) = self.open(name)?;
        file.write_all(bytes)
            .map_err(|source| ReportError::Io { path, source })
    }

    fn append_lines<T: serde::Serialize>(&self, name: &str, lines: &[T]) -> Result<(), ReportError> {
        let mut buf = String::new();
        for line in lines {
            buf.push_str(&serde_json::to_string(line)?);
            buf.push('\n');
        }
        self.append(name, buf.as_bytes())
    }
}
