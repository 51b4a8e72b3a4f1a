//! mediadupe - resumable duplicate finder for photo and video collections
//!
//! Finds byte-identical media with a size, partial-digest and full-digest
//! funnel, keeps one copy per group (oldest capture date, then oldest
//! modification time, then path order) and quarantines or deletes the rest
//! together with their sidecar files. Every unit of work is recorded in a
//! write-ahead checkpoint so an interrupted run resumes where it stopped.
//! Videos whose durations match but whose bytes differ are reported as
//! near-duplicates and never touched.

pub mod checkpoint;
pub mod cli;
pub mod collab;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod media;
pub mod output;
pub mod progress;
pub mod resolve;
pub mod signal;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;

use crate::checkpoint::Checkpoint;
use crate::cli::{CheckpointArgs, Cli, Commands, ResolveArgs, StatusArgs};
use crate::collab::{annotate_capture_dates, ExifTool, FfProbe, ToolMode};
use crate::config::{check_target_writable, Config, ConfigError, ConfigOverrides};
use crate::duplicates::{
    find_near_duplicates, DuplicateFinder, FinderConfig, NearConfig, NearDuplicateReport,
    ScanOutcome, SkipReason,
};
use crate::error::ExitCode;
use crate::logging::{init_logging, parse_level, LogOnce};
use crate::media::WalkerConfig;
use crate::output::{ReportContext, ReportWriter};
use crate::progress::Progress;
use crate::resolve::{ActionKind, ResolveConfig, ResolveSummary, Resolver};

/// Terminal options shared by every subcommand.
#[derive(Debug, Clone, Copy)]
struct Ui {
    verbose: u8,
    quiet: bool,
    no_color: bool,
}

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unusable target, a
/// corrupt checkpoint, an interrupt, or a failure to write progress or
/// reports. [`ExitCode::for_error`] maps it to an exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        verbose,
        quiet,
        no_color,
        config,
        command,
        ..
    } = cli;
    let ui = Ui {
        verbose,
        quiet,
        no_color,
    };

    match command {
        Commands::Scan(args) => {
            let config = load_config(config.as_deref(), &args.pipeline.overrides(), ui)?;
            run_pipeline(&args.path, &config, &args.checkpoint, None, ui)
        }
        Commands::Resolve(args) => {
            let config = load_config(config.as_deref(), &args.pipeline.overrides(), ui)?;
            run_pipeline(&args.path, &config, &args.checkpoint, Some(&args), ui)
        }
        Commands::Status(args) => {
            load_config(config.as_deref(), &ConfigOverrides::default(), ui)?;
            show_status(&args)
        }
    }
}

fn load_config(
    file: Option<&Path>,
    overrides: &ConfigOverrides,
    ui: Ui,
) -> anyhow::Result<Config> {
    let config = Config::load(file, overrides).context("Failed to load configuration")?;
    init_logging(
        ui.verbose,
        ui.quiet,
        config.log_level.as_deref().and_then(parse_level),
    );
    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn run_pipeline(
    target: &Path,
    config: &Config,
    checkpoint_args: &CheckpointArgs,
    resolve: Option<&ResolveArgs>,
    ui: Ui,
) -> anyhow::Result<ExitCode> {
    // Everything that can be rejected is rejected before the first write.
    if let Some(args) = resolve {
        if args.mode == ActionKind::Delete && args.permanent_deletion().is_none() {
            return Err(unconfirmed_delete().into());
        }
    }
    check_target_writable(target)?;
    let target = fs::canonicalize(target)
        .with_context(|| format!("Failed to resolve {}", target.display()))?;

    let handler = signal::install_handler()?;
    let flag = handler.get_flag();

    let checkpoint_path = checkpoint_args.resolve_path(&target);
    if checkpoint_args.discard_checkpoint {
        if let Some(path) = &checkpoint_path {
            Checkpoint::discard(path).context("Failed to discard checkpoint")?;
        }
    }
    let checkpoint = checkpoint_path
        .as_deref()
        .map(|path| Checkpoint::load_or_init(path, &target).map(Arc::new))
        .transpose()
        .context("Failed to load checkpoint")?;
    let run_id = checkpoint.as_ref().map_or_else(
        || chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        |cp| cp.run_id().to_string(),
    );

    let progress = Arc::new(Progress::new(ui.quiet).plain(ui.no_color));
    let mut finder_config = FinderConfig::default()
        .with_io_threads(config.io_threads)
        .with_prehash_bytes(config.prehash_bytes)
        .with_strict(config.strict)
        .with_walker_config(WalkerConfig {
            recursive: config.recursive,
        })
        .with_shutdown_flag(flag.clone())
        .with_progress_callback(progress);
    if let Some(cp) = &checkpoint {
        finder_config = finder_config.with_checkpoint(Arc::clone(cp));
    }
    let finder = DuplicateFinder::new(finder_config);
    let mut outcome = finder
        .find_duplicates(&target)
        .with_context(|| format!("Scan of {} failed", target.display()))?;
    drop(finder);

    annotate_dates(&mut outcome, config);
    let near = near_duplicates(&outcome, config, &flag);

    let report_dir = config.report_dir.clone().unwrap_or_else(|| target.clone());
    let writer = ReportWriter::new(
        &report_dir,
        ReportContext::new(&target, &run_id, config.recursive),
    );
    writer
        .write_scan(&outcome)
        .context("Failed to write scan report")?;
    writer
        .write_near(&near)
        .context("Failed to write near-duplicate report")?;

    if !ui.quiet {
        print_scan_summary(&outcome, &near, &writer);
    }
    if handler.is_shutdown_requested() {
        return Ok(ExitCode::Interrupted);
    }

    let mut summary = None;
    if let Some(args) = resolve {
        let resolved = run_resolver(args, &target, &run_id, &mut outcome, checkpoint.as_ref(), &flag)?;
        writer
            .write_actions(&resolved, &args.mode.to_string())
            .context("Failed to write action log")?;
        if !ui.quiet {
            print_resolve_summary(&resolved, &writer);
        }
        summary = Some(resolved);
    }

    if let Some(cp) = checkpoint {
        finish_checkpoint(cp);
    }

    Ok(exit_code(&outcome, summary.as_ref()))
}

fn annotate_dates(outcome: &mut ScanOutcome, config: &Config) {
    if outcome.groups.is_empty() {
        return;
    }
    if config.metadata == ToolMode::Disabled {
        log::debug!("Capture dates disabled; keepers are chosen by modification time");
        return;
    }
    let source = ExifTool::new(config.exiftool_path.clone(), config.timezone);
    let notice = LogOnce::new();
    let annotated = annotate_capture_dates(
        &mut outcome.groups,
        &source,
        config.metadata_batch_size,
        &notice,
    );
    log::debug!("Capture dates found for {} group members", annotated);
}

fn near_duplicates(
    outcome: &ScanOutcome,
    config: &Config,
    flag: &Arc<std::sync::atomic::AtomicBool>,
) -> NearDuplicateReport {
    let videos = &outcome.unclustered_videos;
    if !config.near_duplicates || config.probe == ToolMode::Disabled {
        log::debug!("Near-duplicate detection disabled");
        return NearDuplicateReport::skipped(SkipReason::Disabled, videos.len());
    }
    let near_config = NearConfig::default()
        .with_tolerance_ms(config.duration_tolerance_ms)
        .with_require_same_codec(config.require_same_codec)
        .with_io_threads(config.io_threads)
        .with_shutdown_flag(Arc::clone(flag));
    let probe = FfProbe::new(config.ffprobe_path.clone());
    find_near_duplicates(videos, &probe, &near_config, &LogOnce::new())
}

fn run_resolver(
    args: &ResolveArgs,
    target: &Path,
    run_id: &str,
    outcome: &mut ScanOutcome,
    checkpoint: Option<&Arc<Checkpoint>>,
    flag: &Arc<std::sync::atomic::AtomicBool>,
) -> anyhow::Result<ResolveSummary> {
    let base = match (args.mode, args.permanent_deletion()) {
        (ActionKind::Quarantine, _) => ResolveConfig::quarantine(target, run_id),
        (ActionKind::Delete, Some(ack)) => ResolveConfig::delete(ack),
        (ActionKind::Delete, None) => return Err(unconfirmed_delete().into()),
    };
    let config = base.with_dry_run(args.dry_run).with_shutdown_flag(Arc::clone(flag));

    let pending = checkpoint.map_or(0, |cp| cp.stats().pending_intents);
    if let resolve::Disposition::Quarantine { root } = &config.disposition {
        if !args.dry_run && (!outcome.groups.is_empty() || pending > 0) {
            ensure_quarantine_root(root)?;
        }
    }

    let mut resolver = Resolver::new(config);
    if let Some(cp) = checkpoint {
        resolver = resolver.with_checkpoint(Arc::clone(cp));
    }
    let summary = resolver
        .resolve(&mut outcome.groups)
        .context("Resolution failed")?;
    Ok(summary)
}

fn unconfirmed_delete() -> ConfigError {
    ConfigError::Invalid {
        key: "mode",
        reason: "delete is permanent; pass --confirm-permanent-delete".to_string(),
    }
}

fn ensure_quarantine_root(root: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(root).map_err(|e| ConfigError::Target {
        path: root.to_path_buf(),
        reason: format!("cannot create quarantine directory ({e})"),
    })
}

/// Remove the checkpoint once nothing is left to replay.
fn finish_checkpoint(cp: Arc<Checkpoint>) {
    let pending = cp.stats().pending_intents;
    if pending > 0 {
        log::warn!(
            "{} actions did not complete; rerun to retry them (checkpoint kept at {})",
            pending,
            cp.path().display()
        );
        return;
    }
    let path = cp.path().to_path_buf();
    match Arc::try_unwrap(cp) {
        Ok(cp) => {
            if let Err(e) = cp.finish() {
                log::warn!("Failed to remove checkpoint: {}", e);
            }
        }
        Err(_) => log::debug!("Checkpoint {} still shared, leaving it", path.display()),
    }
}

fn exit_code(outcome: &ScanOutcome, summary: Option<&ResolveSummary>) -> ExitCode {
    let failed = summary.map_or(0, ResolveSummary::failed);
    if failed > 0 || !outcome.summary.scan_errors.is_empty() {
        return ExitCode::PartialSuccess;
    }
    let acted = summary.is_some_and(|s| !s.records.is_empty() || s.already_resolved > 0);
    if outcome.groups.is_empty() && !acted {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}

fn print_scan_summary(outcome: &ScanOutcome, near: &NearDuplicateReport, writer: &ReportWriter) {
    let summary = &outcome.summary;
    println!(
        "Indexed {} files ({}), {} duplicate groups, {} reclaimable",
        summary.total_files,
        summary.total_size_display(),
        outcome.groups.len(),
        summary.reclaimable_display()
    );
    if !near.candidates.is_empty() {
        println!(
            "{} near-duplicate video pairs (advisory): {}",
            near.candidates.len(),
            writer.path(output::NEAR_TEXT).display()
        );
    }
    println!("Report: {}", writer.path(output::SCAN_TEXT).display());
}

fn print_resolve_summary(summary: &ResolveSummary, writer: &ReportWriter) {
    let verb = if summary.dry_run { "Would action" } else { "Actioned" };
    println!(
        "{} {} files ({}) in {} groups, {} failed",
        verb,
        summary.files_actioned(),
        ByteSize(summary.bytes_actioned()),
        summary.completed(),
        summary.failed()
    );
    println!("Action log: {}", writer.path(output::ACTIONS_TEXT).display());
}

fn show_status(args: &StatusArgs) -> anyhow::Result<ExitCode> {
    let path: PathBuf = args.checkpoint_path();
    let Some((header, stats)) =
        Checkpoint::inspect(&path).context("Failed to read checkpoint")?
    else {
        println!("No checkpoint at {}", path.display());
        return Ok(ExitCode::Success);
    };
    println!("Checkpoint:      {}", path.display());
    println!("Run:             {}", header.run_id);
    println!("Root:            {}", header.root.display());
    println!("Created:         {}", header.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Phase:           {}", stats.phase);
    println!("Hashed units:    {}", stats.units);
    println!("Resolved groups: {}", stats.resolved_groups);
    println!("Pending actions: {}", stats.pending_intents);
    Ok(ExitCode::Success)
}
