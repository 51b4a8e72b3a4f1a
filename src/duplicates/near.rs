//! Near-duplicate video detection.
//!
//! # Overview
//!
//! Re-encoded copies of a video have different bytes but (almost) the same
//! duration. Videos that did not land in an exact duplicate group are probed,
//! sorted by duration, and every pair whose durations differ by no more than
//! the tolerance is reported. Optionally the codec must match as well.
//!
//! Candidates are advisory. Nothing in this module touches the filesystem.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use super::finder::run_in_pool;
use crate::collab::{VideoProbe, VideoSignature};
use crate::logging::LogOnce;
use crate::media::SidecarSet;

/// Default duration tolerance in milliseconds.
pub const DEFAULT_TOLERANCE_MS: u64 = 250;

/// Configuration for the near-duplicate matcher.
#[derive(Debug, Clone)]
pub struct NearConfig {
    /// Maximum duration difference in milliseconds
    pub tolerance_ms: u64,
    /// Also require equal codec names
    pub require_same_codec: bool,
    /// Number of concurrent probe invocations
    pub io_threads: usize,
    /// Optional shutdown flag
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for NearConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            require_same_codec: false,
            io_threads: 4,
            shutdown_flag: None,
        }
    }
}

impl NearConfig {
    /// Set the duration tolerance.
    #[must_use]
    pub fn with_tolerance_ms(mut self, ms: u64) -> Self {
        self.tolerance_ms = ms;
        self
    }

    /// Require matching codecs.
    #[must_use]
    pub fn with_require_same_codec(mut self, require: bool) -> Self {
        self.require_same_codec = require;
        self
    }

    /// Set the probe concurrency.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
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

    fn tolerance_secs(&self) -> f64 {
        self.tolerance_ms as f64 / 1000.0
    }
}

/// A probed video.
#[derive(Debug, Clone)]
pub struct ProbedVideo {
    /// The video and its sidecars
    pub set: SidecarSet,
    /// Its signature
    pub signature: VideoSignature,
}

/// Two videos suspected to hold the same footage.
///
/// The pair is unordered; `first` is the one whose path sorts first.
#[derive(Debug, Clone)]
pub struct NearDuplicateCandidate {
    /// Video with the smaller path
    pub first: ProbedVideo,
    /// Video with the larger path
    pub second: ProbedVideo,
}

impl NearDuplicateCandidate {
    /// Absolute duration difference in seconds.
    #[must_use]
    pub fn duration_delta(&self) -> f64 {
        (self.first.signature.duration_secs - self.second.signature.duration_secs).abs()
    }

    /// Whether both codecs are known and equal.
    #[must_use]
    pub fn same_codec(&self) -> bool {
        matches!(
            (&self.first.signature.codec, &self.second.signature.codec),
            (Some(a), Some(b)) if a == b
        )
    }

    /// Paths of both primaries.
    #[must_use]
    pub fn paths(&self) -> (&Path, &Path) {
        (&self.first.set.primary.path, &self.second.set.primary.path)
    }
}

/// Why the matcher did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Turned off by configuration
    Disabled,
    /// The probe tool is missing
    ProbeUnavailable,
    /// Shutdown requested
    Interrupted,
}

/// Result of the near-duplicate stage.
#[derive(Debug, Clone, Default)]
pub struct NearDuplicateReport {
    /// Matching pairs, ordered by path
    pub candidates: Vec<NearDuplicateCandidate>,
    /// Videos considered
    pub input_videos: usize,
    /// Videos with a usable signature
    pub probed: usize,
    /// Videos the probe could not read
    pub probe_failures: usize,
    /// Set when the stage did not run
    pub skipped: Option<SkipReason>,
}

impl NearDuplicateReport {
    /// Report for a stage that did not run.
    #[must_use]
    pub fn skipped(reason: SkipReason, input_videos: usize) -> Self {
        Self {
            input_videos,
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

fn is_match(a: &VideoSignature, b: &VideoSignature, config: &NearConfig) -> bool {
    // Small epsilon so 120.00 vs 120.25 matches a 250 ms tolerance
    let within = (a.duration_secs - b.duration_secs).abs() <= config.tolerance_secs() + 1e-9;
    if !within {
        return false;
    }
    if config.require_same_codec {
        return matches!((&a.codec, &b.codec), (Some(x), Some(y)) if x == y);
    }
    true
}

/// Compare already-probed videos.
///
/// Sorted by duration, so the inner scan stops at the first video beyond
/// the tolerance; the worst case stays quadratic when every duration falls
/// inside one window.
#[must_use]
pub fn match_signatures(
    mut videos: Vec<ProbedVideo>,
    config: &NearConfig,
) -> Vec<NearDuplicateCandidate> {
    videos.sort_by(|a, b| {
        a.signature
            .duration_secs
            .total_cmp(&b.signature.duration_secs)
            .then_with(|| a.set.primary.path.cmp(&b.set.primary.path))
    });

    let tolerance = config.tolerance_secs() + 1e-9;
    let mut candidates = Vec::new();
    for (i, a) in videos.iter().enumerate() {
        for b in &videos[i + 1..] {
            if b.signature.duration_secs - a.signature.duration_secs > tolerance {
                break;
            }
            if !is_match(&a.signature, &b.signature, config) {
                continue;
            }
            let (first, second) = if a.set.primary.path <= b.set.primary.path {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            candidates.push(NearDuplicateCandidate { first, second });
        }
    }

    candidates.sort_by(|x, y| x.paths().cmp(&y.paths()));
    candidates
}

/// Probe unclustered videos and report near-duplicate pairs.
///
/// When the probe is unavailable the stage is skipped with a single notice;
/// it never fails the run.
pub fn find_near_duplicates(
    videos: &[SidecarSet],
    probe: &dyn VideoProbe,
    config: &NearConfig,
    notice: &LogOnce,
) -> NearDuplicateReport {
    if videos.len() < 2 {
        return NearDuplicateReport {
            input_videos: videos.len(),
            ..Default::default()
        };
    }
    if !probe.is_available() {
        notice.warn(format_args!(
            "{} not available; near-duplicate video detection skipped",
            probe.name()
        ));
        return NearDuplicateReport::skipped(SkipReason::ProbeUnavailable, videos.len());
    }

    log::info!("Probing {} videos for near-duplicates", videos.len());

    let results: Vec<Option<Option<ProbedVideo>>> = run_in_pool(config.io_threads, || {
        videos
            .par_iter()
            .map(|set| {
                if config.is_shutdown_requested() {
                    return None;
                }
                match probe.probe(&set.primary.path) {
                    Ok(Some(signature)) => Some(Some(ProbedVideo {
                        set: set.clone(),
                        signature,
                    })),
                    Ok(None) => {
                        log::debug!("No duration for {}", set.primary.path.display());
                        Some(None)
                    }
                    Err(e) => {
                        log::warn!("Failed to probe {}: {}", set.primary.path.display(), e);
                        Some(None)
                    }
                }
            })
            .collect()
    });

    if config.is_shutdown_requested() {
        return NearDuplicateReport::skipped(SkipReason::Interrupted, videos.len());
    }

    let probed: Vec<ProbedVideo> = results.into_iter().flatten().flatten().collect();
    let probe_failures = videos.len() - probed.len();
    let probed_count = probed.len();
    let candidates = match_signatures(probed, config);

    log::info!(
        "Near-duplicate scan: {} candidate pairs among {} probed videos",
        candidates.len(),
        probed_count
    );

    NearDuplicateReport {
        candidates,
        input_videos: videos.len(),
        probed: probed_count,
        probe_failures,
        skipped: None,
    }
}
