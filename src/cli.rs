//! Command-line interface definitions for mediadupe.
//!
//! Global options (verbosity, color, error format, config file) come first,
//! then a subcommand. Pipeline options are shared by `scan` and `resolve` and
//! are all optional so that unset flags leave the configuration file and
//! environment in charge.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates without touching anything
//! mediadupe scan ~/Pictures
//!
//! # Move duplicates into ~/Pictures/_quarantine_<run>/
//! mediadupe resolve ~/Pictures
//!
//! # Irreversible deletion has to be confirmed explicitly
//! mediadupe resolve ~/Pictures --mode delete --confirm-permanent-delete
//!
//! # Show what an interrupted run left behind
//! mediadupe status ~/Pictures
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::checkpoint::Checkpoint;
use crate::collab::{TimeZoneMode, ToolMode};
use crate::config::ConfigOverrides;
use crate::resolve::{ActionKind, PermanentDeletion};

/// Resumable duplicate finder and resolver for photo and video collections.
///
/// Finds byte-identical media with a size, partial-digest and full-digest
/// funnel, keeps the oldest capture, and quarantines the rest together with
/// their sidecar files.
#[derive(Debug, Parser)]
#[command(name = "mediadupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output and animated progress
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: config.toml in the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicates and write reports; nothing is moved or deleted
    Scan(ScanArgs),
    /// Find duplicates and quarantine or delete every non-keeper
    Resolve(ResolveArgs),
    /// Show the checkpoint of an interrupted run
    Status(StatusArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Pipeline options
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Checkpoint options
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,
}

/// Arguments for the resolve subcommand.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Directory to scan and resolve
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// What happens to non-keepers
    #[arg(long, value_enum, default_value_t = ActionKind::Quarantine)]
    pub mode: ActionKind,

    /// Confirm that `--mode delete` removes files permanently
    #[arg(long)]
    pub confirm_permanent_delete: bool,

    /// Plan and report actions without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Pipeline options
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Checkpoint options
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,
}

impl ResolveArgs {
    /// Deletion acknowledgement, present only when explicitly confirmed.
    #[must_use]
    pub fn permanent_deletion(&self) -> Option<PermanentDeletion> {
        self.confirm_permanent_delete
            .then_some(PermanentDeletion::Acknowledged)
    }
}

/// Arguments for the status subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Target directory of the run
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Checkpoint file (default: <PATH>/.mediadupe-checkpoint.jsonl)
    #[arg(long, value_name = "FILE")]
    pub checkpoint: Option<PathBuf>,
}

impl StatusArgs {
    /// Checkpoint file to inspect.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(|| Checkpoint::default_path(&self.path))
    }
}

/// Options of the detection pipeline, layered over the configuration.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Bytes read for the partial digest (e.g. 4MiB, 16MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub prehash_bytes: Option<u64>,

    /// Worker threads for digests and video probes (default: 4)
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Only scan the top level of the target
    #[arg(long)]
    pub no_recursive: bool,

    /// Skip the near-duplicate video report
    #[arg(long)]
    pub no_near_duplicates: bool,

    /// Near-duplicate duration tolerance in milliseconds (default: 250)
    #[arg(long, value_name = "MS")]
    pub duration_tolerance_ms: Option<u64>,

    /// Near-duplicates must also share a codec
    #[arg(long)]
    pub require_same_codec: bool,

    /// How offset-bearing capture dates are read
    #[arg(long, value_enum)]
    pub timezone: Option<TimeZoneMode>,

    /// Video probe (ffprobe) availability
    #[arg(long, value_enum)]
    pub probe: Option<ToolMode>,

    /// Capture-date tool (exiftool) availability
    #[arg(long, value_enum)]
    pub metadata: Option<ToolMode>,

    /// Files per exiftool invocation (default: 25)
    #[arg(long, value_name = "N")]
    pub metadata_batch_size: Option<usize>,

    /// Path to the exiftool executable
    #[arg(long, value_name = "PATH")]
    pub exiftool: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long, value_name = "PATH")]
    pub ffprobe: Option<PathBuf>,

    /// Fail on the first unreadable file instead of reporting it
    #[arg(long)]
    pub strict: bool,

    /// Directory for the reports (default: the target)
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,
}

impl PipelineArgs {
    /// Configuration values set on the command line.
    ///
    /// Switches only override when given, so `--strict` absent leaves a
    /// `strict = true` in the config file alone.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            prehash_bytes: self.prehash_bytes,
            io_threads: self.io_threads,
            recursive: self.no_recursive.then_some(false),
            near_duplicates: self.no_near_duplicates.then_some(false),
            duration_tolerance_ms: self.duration_tolerance_ms,
            require_same_codec: self.require_same_codec.then_some(true),
            timezone: self.timezone,
            probe: self.probe,
            metadata: self.metadata,
            metadata_batch_size: self.metadata_batch_size,
            exiftool_path: self.exiftool.clone(),
            ffprobe_path: self.ffprobe.clone(),
            strict: self.strict.then_some(true),
            report_dir: self.report_dir.clone(),
        }
    }
}

/// Checkpoint handling options.
#[derive(Debug, Clone, Default, Args)]
pub struct CheckpointArgs {
    /// Checkpoint file (default: <PATH>/.mediadupe-checkpoint.jsonl)
    #[arg(long = "checkpoint", value_name = "FILE")]
    pub checkpoint_file: Option<PathBuf>,

    /// Delete an existing checkpoint and start over
    #[arg(long)]
    pub discard_checkpoint: bool,

    /// Run without a checkpoint; an interrupted run starts from scratch
    #[arg(long, conflicts_with_all = ["checkpoint_file", "discard_checkpoint"])]
    pub no_checkpoint: bool,
}

impl CheckpointArgs {
    /// Checkpoint file for a run over `target`, unless disabled.
    #[must_use]
    pub fn resolve_path(&self, target: &Path) -> Option<PathBuf> {
        if self.no_checkpoint {
            return None;
        }
        Some(
            self.checkpoint_file
                .clone()
                .unwrap_or_else(|| Checkpoint::default_path(target)),
        )
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use mediadupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("4MiB").unwrap(), 4_194_304);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
