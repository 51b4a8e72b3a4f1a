//! Human-readable reports.

use std::fmt::Write;

use bytesize::ByteSize;

use super::json::ordered_groups;
use super::ReportContext;
use crate::duplicates::{DuplicateGroup, NearDuplicateReport, ScanOutcome, SkipReason};
use crate::resolve::{FileStatus, ResolveSummary};

const RULE: &str = "============================================================";

/// Render the duplicate scan report.
///
/// Groups are listed by descending member count, each with its members and
/// their sidecars.
#[must_use]
pub fn render_scan_report(outcome: &ScanOutcome, context: &ReportContext) -> String {
    let summary = &outcome.summary;
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "mediadupe scan report");
    let _ = writeln!(out, "Generated:     {}", context.timestamp());
    let _ = writeln!(out, "Run:           {}", context.run_id);
    let _ = writeln!(out, "Base dir:      {}", context.root.display());
    let _ = writeln!(out, "Recursive:     {}", context.recursive);
    let _ = writeln!(
        out,
        "Indexed files: {} ({})",
        summary.total_files,
        ByteSize(summary.total_size)
    );
    if summary.sidecar_files > 0 || summary.orphan_sidecars > 0 {
        let _ = writeln!(
            out,
            "Sidecars:      {} attached, {} orphaned",
            summary.sidecar_files, summary.orphan_sidecars
        );
    }
    let _ = writeln!(out, "{RULE}");

    for (i, group) in ordered_groups(&outcome.groups).into_iter().enumerate() {
        write_group(&mut out, i + 1, group);
    }

    if !outcome.orphans.is_empty() {
        let _ = writeln!(out, "\nOrphan sidecars (not processed):");
        for orphan in &outcome.orphans {
            let _ = writeln!(out, "    {}", orphan.path.display());
        }
    }

    let reclaimable: u64 = outcome.groups.iter().map(DuplicateGroup::wasted_space).sum();
    let _ = writeln!(out, "\nSummary:");
    let _ = writeln!(out, "  Duplicate groups: {}", outcome.groups.len());
    let _ = writeln!(out, "  Reclaimable:      {}", ByteSize(reclaimable));
    if !summary.scan_errors.is_empty() {
        let _ = writeln!(out, "  Unreadable files: {}", summary.scan_errors.len());
        for err in &summary.scan_errors {
            let _ = writeln!(out, "    {err}");
        }
    }
    out.push('\n');
    out
}

fn write_group(out: &mut String, index: usize, group: &DuplicateGroup) {
    let _ = writeln!(
        out,
        "\n[{}] DIGEST={} members={} size={} potential_savings={}",
        index,
        group.digest_hex(),
        group.len(),
        ByteSize(group.size()),
        ByteSize(group.wasted_space())
    );
    for member in &group.members {
        match member.primary.captured {
            Some(date) => {
                let _ = writeln!(out, "    {}  (captured {})", member.primary.path.display(), date);
            }
            None => {
                let _ = writeln!(out, "    {}", member.primary.path.display());
            }
        }
        for sidecar in &member.sidecars {
            let _ = writeln!(out, "      + {}", sidecar.path.display());
        }
    }
}

/// Render the action log for one resolution pass.
#[must_use]
pub fn render_actions_report(summary: &ResolveSummary, mode: &str, context: &ReportContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {} mode={}{} run={} ===",
        context.timestamp(),
        mode,
        if summary.dry_run { " (dry run)" } else { "" },
        context.run_id
    );

    for record in &summary.records {
        let (action, outcome) = (&record.action, &record.outcome);
        let _ = writeln!(
            out,
            "GROUP {}{}",
            action.group,
            match (outcome.replayed, outcome.abandoned) {
                (true, true) => " (replayed, abandoned)",
                (true, false) => " (replayed)",
                _ => "",
            }
        );
        let _ = writeln!(out, "KEEP {} ({})", action.keeper.display(), action.keeper_reason);
        for file in &outcome.files {
            let src = file.source.display();
            let dst = file
                .destination
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            let line = match &file.status {
                FileStatus::Moved | FileStatus::Copied => format!("MOVED {src} -> {dst}"),
                FileStatus::Deleted => format!("DELETED {src}"),
                FileStatus::AlreadyDone => format!("DONE {src}"),
                FileStatus::Planned if file.destination.is_some() => {
                    format!("WOULD MOVE {src} -> {dst}")
                }
                FileStatus::Planned => format!("WOULD DELETE {src}"),
                FileStatus::Skipped => format!("SKIPPED {src}"),
                FileStatus::Failed { error } => format!("FAILED {src}: {error}"),
            };
            let _ = writeln!(out, "{line}");
        }
    }

    let _ = writeln!(
        out,
        "--- {} completed, {} failed, {} already resolved, {} files, {} ---\n",
        summary.completed(),
        summary.failed(),
        summary.already_resolved,
        summary.files_actioned(),
        ByteSize(summary.bytes_actioned())
    );
    out
}

/// Render the advisory near-duplicate report.
#[must_use]
pub fn render_near_report(report: &NearDuplicateReport, context: &ReportContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {} near-duplicate videos (advisory, nothing was changed) run={} ===",
        context.timestamp(),
        context.run_id
    );
    match report.skipped {
        Some(SkipReason::ProbeUnavailable) => {
            let _ = writeln!(out, "Skipped: video probe not available");
        }
        Some(SkipReason::Disabled) => {
            let _ = writeln!(out, "Skipped: disabled by configuration");
        }
        Some(SkipReason::Interrupted) => {
            let _ = writeln!(out, "Skipped: interrupted");
        }
        None => {
            let _ = writeln!(
                out,
                "Videos: {} considered, {} probed, {} candidate pairs",
                report.input_videos,
                report.probed,
                report.candidates.len()
            );
        }
    }
    for c in &report.candidates {
        let (a, b) = c.paths();
        let _ = writeln!(
            out,
            "{} ({:.3}s, {}) ~ {} ({:.3}s, {})  delta={:.0}ms",
            a.display(),
            c.first.signature.duration_secs,
            c.first.signature.codec.as_deref().unwrap_or("?"),
            b.display(),
            c.second.signature.duration_secs,
            c.second.signature.codec.as_deref().unwrap_or("?"),
            c.duration_delta() * 1000.0
        );
    }
    out.push('\n');
    out
}
