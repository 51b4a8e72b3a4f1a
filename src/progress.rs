//! Progress reporting using indicatif.
//!
//! The pipeline reports through [`ProgressCallback`]; [`Progress`] renders
//! it as a spinner while walking and bars for the digest phases. Nothing is
//! drawn when quiet, and `plain` mode drops the animation and Unicode bar
//! characters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for the detection pipeline.
///
/// Phases are `walking`, `prehash` and `fullhash`.
pub trait ProgressCallback: Send + Sync {
    /// A phase starts with `total` items (0 when unknown).
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item `current` (1-based) is being processed.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` was read.
    fn on_item_completed(&self, _bytes: u64) {}

    /// A phase finished.
    fn on_phase_end(&self, phase: &str);

    /// Replace the status message.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    active: Mutex<Option<String>>,
    bytes: AtomicU64,
    quiet: bool,
    plain: bool,
}

impl Progress {
    /// Reporter that draws nothing when `quiet`.
    ///
    /// ```
    /// use mediadupe::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
            plain: false,
        }
    }

    /// Use ASCII bars without animation.
    #[must_use]
    pub fn plain(mut self, plain: bool) -> Self {
        self.plain = plain;
        self
    }

    /// Bytes reported through `on_item_completed` so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_active_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let active = self.active().clone();
        if let Some(phase) = active {
            if let Some(pb) = self.bars().get(&phase) {
                f(pb);
            }
        }
    }

    fn walking_style(&self) -> ProgressStyle {
        if self.plain {
            ProgressStyle::with_template("{msg} [{elapsed_precise}] {pos} files")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        } else {
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        }
    }

    fn bar_style(&self, color: &str) -> ProgressStyle {
        if self.plain {
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        } else {
            ProgressStyle::with_template(&format!(
                "[{{elapsed_precise}}] [{{bar:40.{color}/blue}}] {{pos}}/{{len}} ({{percent}}%) {{msg}} (ETA: {{eta}})"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = match phase {
            "walking" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(self.walking_style());
                pb.set_message("Walking directory");
                let tick = if self.plain { 500 } else { 100 };
                pb.enable_steady_tick(Duration::from_millis(tick));
                pb
            }
            "fullhash" => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(self.bar_style("green"));
                pb.set_message("Full hashing");
                pb
            }
            other => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(self.bar_style("cyan"));
                pb.set_message(if other == "prehash" {
                    "Prehashing".to_string()
                } else {
                    other.to_string()
                });
                pb
            }
        };
        self.bars().insert(phase.to_string(), pb);
        *self.active() = Some(phase.to_string());
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_active_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.bars().remove(phase) {
            let done = match phase {
                "walking" => "Walking complete".to_string(),
                "prehash" => "Prehashing complete".to_string(),
                "fullhash" => format!("Full hashing complete ({} read)", ByteSize(self.bytes_read())),
                other => format!("{other} complete"),
            };
            pb.finish_with_message(done);
        }
        let mut active = self.active();
        if active.as_deref() == Some(phase) {
            *active = None;
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_active_bar(|pb| pb.set_message(message.to_string()));
    }
}

/// Shorten a path to its file name for the progress line.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
