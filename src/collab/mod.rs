//! External tool collaborators.
//!
//! Capture dates and video signatures come from external tools (exiftool and
//! ffprobe). The pipeline only talks to them through the [`CaptureDateSource`]
//! and [`VideoProbe`] traits so every stage can run against fakes, and so a
//! missing tool degrades a feature instead of failing the run.
//!
//! # Architecture
//!
//! - [`exiftool`]: batch capture-date extraction
//! - [`ffprobe`]: duration and codec probing
//! - [`fake`]: in-memory implementations for tests and disabled tools

pub mod exiftool;
pub mod fake;
pub mod ffprobe;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::logging::LogOnce;

pub use exiftool::{parse_capture_date, ExifTool, DATE_KEYS, DEFAULT_BATCH_SIZE};
pub use fake::{NoMetadata, NoProbe, StaticDates, StaticProbe};
pub use ffprobe::FfProbe;

/// How capture timestamps carrying a UTC offset are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneMode {
    /// Keep the wall-clock time the camera recorded
    #[default]
    Original,
    /// Convert offset-bearing timestamps to UTC
    Utc,
}

impl fmt::Display for TimeZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Utc => write!(f, "utc"),
        }
    }
}

/// Whether an external tool should be detected or forced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Use the tool if it can be found
    #[default]
    Auto,
    /// Never invoke the tool
    Disabled,
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Errors raised by an external tool.
#[derive(thiserror::Error, Debug)]
pub enum CollaboratorError {
    /// The tool could not be started.
    #[error("{tool} is not available: {source}")]
    Unavailable {
        /// Tool name
        tool: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but reported failure.
    #[error("{tool} failed with status {status}: {stderr}")]
    Failed {
        /// Tool name
        tool: String,
        /// Exit status
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The tool's output could not be parsed.
    #[error("Unexpected output from {tool}: {source}")]
    Parse {
        /// Tool name
        tool: String,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Source of original capture timestamps.
///
/// Batch size is a performance knob only: implementations must return the
/// same dates whether asked for one path or many.
pub trait CaptureDateSource: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Whether the source can be used at all in this run.
    fn is_available(&self) -> bool;

    /// Capture dates for the given files.
    ///
    /// Files without a parsable date are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the whole batch failed.
    fn captured_dates(
        &self,
        paths: &[PathBuf],
    ) -> Result<HashMap<PathBuf, NaiveDateTime>, CollaboratorError>;
}

/// Duration and codec signature of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSignature {
    /// Duration in seconds
    pub duration_secs: f64,
    /// Codec of the first video stream
    pub codec: Option<String>,
    /// Container format name
    pub container: Option<String>,
}

impl VideoSignature {
    /// Signature with a duration only.
    #[must_use]
    pub fn with_duration(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            codec: None,
            container: None,
        }
    }

    /// Set the codec.
    #[must_use]
    pub fn codec(mut self, codec: &str) -> Self {
        self.codec = Some(codec.to_string());
        self
    }
}

/// Source of video signatures.
pub trait VideoProbe: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Whether the probe can be used at all in this run.
    fn is_available(&self) -> bool;

    /// Probe one video; `Ok(None)` means no duration could be determined.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool failed for this file.
    fn probe(&self, path: &Path) -> Result<Option<VideoSignature>, CollaboratorError>;
}

/// Fill in `captured` for every member of every group.
///
/// Paths are sent to the source in batches of `batch_size`. A failed batch
/// leaves its members undated, so keeper selection falls back to the
/// modification time. Returns the number of members that received a date.
pub fn annotate_capture_dates(
    groups: &mut [DuplicateGroup],
    source: &dyn CaptureDateSource,
    batch_size: usize,
    notice: &LogOnce,
) -> usize {
    if groups.is_empty() {
        return 0;
    }
    if !source.is_available() {
        notice.warn(format_args!(
            "{} not available; capture dates fall back to file modification time",
            source.name()
        ));
        return 0;
    }

    let paths: Vec<PathBuf> = groups
        .iter()
        .flat_map(|g| g.members.iter().map(|m| m.primary.path.clone()))
        .collect();

    let mut dates: HashMap<PathBuf, NaiveDateTime> = HashMap::new();
    for chunk in paths.chunks(batch_size.max(1)) {
        match source.captured_dates(chunk) {
            Ok(found) => {
                for path in chunk {
                    if !found.contains_key(path) {
                        log::debug!(
                            "No parsable capture date for {}, using mtime",
                            path.display()
                        );
                    }
                }
                dates.extend(found);
            }
            Err(e) => {
                log::warn!(
                    "{} failed for a batch of {} files, using mtime: {}",
                    source.name(),
                    chunk.len(),
                    e
                );
            }
        }
    }

    let mut annotated = 0;
    for member in groups.iter_mut().flat_map(|g| g.members.iter_mut()) {
        if let Some(date) = dates.get(&member.primary.path) {
            member.primary.captured = Some(*date);
            annotated += 1;
        }
    }
    annotated
}
