//! Capture dates via exiftool.
//!
//! exiftool is invoked once per batch with a forced date format, and the first
//! parsable tag in [`DATE_KEYS`] order wins for each file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use super::{CaptureDateSource, CollaboratorError, TimeZoneMode};
use crate::checkpoint::normalize_path;

/// Date tags in priority order.
pub const DATE_KEYS: &[&str] = &[
    "SubSecDateTimeOriginal",
    "DateTimeOriginal",
    "SubSecCreateDate",
    "CreateDate",
    "XMP:DateCreated",
    "Photoshop:DateCreated",
    "IPTC:DateCreated",
    "MediaCreateDate",
    "TrackCreateDate",
    "CreationDate",
    "ModifyDate",
    "FileCreateDate",
    "FileModifyDate",
];

/// Files per exiftool invocation.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Output format forced with `-d`.
const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%z";

const TOOL: &str = "exiftool";

/// Parse a date string as exiftool prints it.
///
/// Accepts `:` or `-` date separators, optional fractional seconds, an
/// optional numeric offset and a trailing `Z`. Offset-bearing values keep
/// their wall-clock time in [`TimeZoneMode::Original`] and are converted in
/// [`TimeZoneMode::Utc`].
///
/// # Example
///
/// ```
/// use mediadupe::collab::{parse_capture_date, TimeZoneMode};
///
/// let dt = parse_capture_date("2021:06:15 12:30:45+0200", TimeZoneMode::Utc).unwrap();
/// assert_eq!(dt.to_string(), "2021-06-15 10:30:45");
/// assert!(parse_capture_date("0000:00:00 00:00:00", TimeZoneMode::Original).is_none());
/// ```
#[must_use]
pub fn parse_capture_date(value: &str, timezone: TimeZoneMode) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let value = match value.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+0000"),
        None => value.to_string(),
    };

    for fmt in ["%Y:%m:%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&value, fmt) {
            return Some(match timezone {
                TimeZoneMode::Original => dt.naive_local(),
                TimeZoneMode::Utc => dt.naive_utc(),
            });
        }
    }
    for fmt in ["%Y:%m:%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&value, fmt) {
            return Some(dt);
        }
    }
    None
}

fn string_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(string_values).collect(),
        _ => Vec::new(),
    }
}

/// Pick the first parsable date tag of one exiftool JSON object.
///
/// Returns the date and the tag it came from.
#[must_use]
pub fn pick_date(
    object: &serde_json::Map<String, Value>,
    timezone: TimeZoneMode,
) -> Option<(NaiveDateTime, &'static str)> {
    DATE_KEYS.iter().find_map(|&key| {
        // exiftool drops the group prefix from JSON keys unless -G is passed
        let short = key.rsplit(':').next().unwrap_or(key);
        let value = object.get(key).or_else(|| object.get(short))?;
        string_values(value)
            .iter()
            .find_map(|s| parse_capture_date(s, timezone))
            .map(|dt| (dt, key))
    })
}

/// Capture-date source backed by the exiftool executable.
#[derive(Debug)]
pub struct ExifTool {
    program: PathBuf,
    timezone: TimeZoneMode,
    available: OnceLock<bool>,
}

impl ExifTool {
    /// Use `program`, or `exiftool` from `PATH` when `None`.
    #[must_use]
    pub fn new(program: Option<PathBuf>, timezone: TimeZoneMode) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(TOOL)),
            timezone,
            available: OnceLock::new(),
        }
    }

    /// Reported version, if the executable runs.
    #[must_use]
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.program).arg("-ver").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }

    fn command(&self, fast: bool, paths: &[PathBuf]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-q", "-q"]);
        if fast {
            cmd.arg("-fast");
        }
        cmd.args(["-j", "-charset", "filename=utf8"]);
        if fast {
            cmd.args(["-api", "QuickTimeUTC"]);
        }
        cmd.args(["-d", DATE_FORMAT]);
        cmd.args(DATE_KEYS.iter().map(|k| format!("-{k}")));
        cmd.args(paths);
        cmd
    }

    fn run(&self, paths: &[PathBuf]) -> Result<Vec<Value>, CollaboratorError> {
        let mut last_error = None;
        // The fast read misses some container dates; retry with a full read.
        for fast in [true, false] {
            let output = self
                .command(fast, paths)
                .output()
                .map_err(|source| CollaboratorError::Unavailable {
                    tool: TOOL.to_string(),
                    source,
                })?;
            match parse_output(&output) {
                Ok(objects) => return Ok(objects),
                Err(e) => {
                    log::debug!("exiftool attempt (fast={}) failed: {}", fast, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CollaboratorError::Failed {
            tool: TOOL.to_string(),
            status: "unknown".to_string(),
            stderr: String::new(),
        }))
    }
}

fn parse_output(output: &Output) -> Result<Vec<Value>, CollaboratorError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        return Err(CollaboratorError::Failed {
            tool: TOOL.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    serde_json::from_str(&stdout).map_err(|source| CollaboratorError::Parse {
        tool: TOOL.to_string(),
        source,
    })
}

impl CaptureDateSource for ExifTool {
    fn name(&self) -> &str {
        TOOL
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match self.version() {
            Some(version) => {
                log::info!("exiftool found: {} (version {})", self.program.display(), version);
                true
            }
            None => false,
        })
    }

    fn captured_dates(
        &self,
        paths: &[PathBuf],
    ) -> Result<HashMap<PathBuf, NaiveDateTime>, CollaboratorError> {
        if paths.is_empty() {
            return Ok(HashMap::new());
        }
        let objects = self.run(paths)?;
        Ok(match_dates(paths, &objects, self.timezone))
    }
}

/// Pair exiftool result objects with the requested paths.
///
/// `SourceFile` is matched on the normalized path, so a name echoed back in a
/// different Unicode form still finds its file. Dates are keyed by the path as
/// requested.
fn match_dates(
    paths: &[PathBuf],
    objects: &[Value],
    timezone: TimeZoneMode,
) -> HashMap<PathBuf, NaiveDateTime> {
    let wanted: HashMap<String, &PathBuf> = paths.iter().map(|p| (normalize_path(p), p)).collect();

    let mut dates = HashMap::new();
    for object in objects.iter().filter_map(Value::as_object) {
        let Some(source) = object.get("SourceFile").and_then(Value::as_str) else {
            continue;
        };
        let Some(&path) = wanted.get(&normalize_path(Path::new(source))) else {
            log::trace!("exiftool returned unrequested file {}", source);
            continue;
        };
        match pick_date(object, timezone) {
            Some((date, tag)) => {
                log::debug!("[DATE] {}: {} (tag={})", path.display(), date, tag);
                dates.insert(path.clone(), date);
            }
            None => {
                log::debug!("No parsable metadata date for {}", path.display());
            }
        }
    }
    dates
}
