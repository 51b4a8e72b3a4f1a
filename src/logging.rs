//! Logging for mediadupe.
//!
//! Built on the `log` facade with an `env_logger` backend. The level comes
//! from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. The `log_level` configuration key
//! 4. Default: info
//!
//! Debug builds print a timestamp and, when verbose, the module path.
//! Release builds print level and message only.
//!
//! [`LogOnce`] covers degraded-capability notices ("exiftool not found")
//! that must appear once per run no matter how many files hit them.
//!
//! # Example
//!
//! ```rust,no_run
//! use mediadupe::logging::init_logging;
//!
//! init_logging(0, false, None);
//! log::info!("Application started");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Initialize the logging subsystem.
///
/// `configured` is the level name from the configuration file, used when
/// neither `RUST_LOG` nor a CLI flag picks one.
///
/// Only the first call in a process installs a logger; later calls are
/// ignored.
pub fn init_logging(verbose: u8, quiet: bool, configured: Option<LevelFilter>) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();

    let level = determine_level(verbose, quiet, configured);
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }

    configure_format(&mut builder, verbose);
    if builder.try_init().is_err() {
        return;
    }

    if use_env {
        log::debug!(
            "Logging initialized from RUST_LOG: {:?}",
            env::var("RUST_LOG").ok()
        );
    } else {
        log::debug!("Logging initialized at level: {:?}", level);
    }
}

/// Parse a level name such as `"warn"` or `"DEBUG"`.
#[must_use]
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse().ok()
}

fn determine_level(verbose: u8, quiet: bool, configured: Option<LevelFilter>) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => configured.unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);

            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}",
                    timestamp,
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        });
    }
}

/// A warning that is logged at most once.
///
/// Shared by reference across worker threads; the first caller wins.
///
/// ```
/// use mediadupe::logging::LogOnce;
///
/// let notice = LogOnce::new();
/// assert!(notice.warn("exiftool not found"));
/// assert!(!notice.warn("exiftool not found"));
/// assert!(notice.has_fired());
/// ```
#[derive(Debug, Default)]
pub struct LogOnce {
    fired: AtomicBool,
}

impl LogOnce {
    /// Create an unfired latch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }

    /// Log `message` at warn level unless already fired.
    ///
    /// Returns `true` if this call logged.
    pub fn warn(&self, message: impl fmt::Display) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        log::warn!("{}", message);
        true
    }

    /// Whether the latch has fired.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_determine_level_default() {
        assert_eq!(determine_level(0, false, None), LevelFilter::Info);
    }

    #[test]
    fn test_determine_level_verbose() {
        assert_eq!(determine_level(1, false, None), LevelFilter::Debug);
        assert_eq!(determine_level(2, false, None), LevelFilter::Trace);
        assert_eq!(determine_level(3, false, None), LevelFilter::Trace);
    }

    #[test]
    fn test_determine_level_quiet_overrides_verbose() {
        assert_eq!(determine_level(2, true, None), LevelFilter::Error);
        assert_eq!(
            determine_level(0, true, Some(LevelFilter::Trace)),
            LevelFilter::Error
        );
    }

    #[test]
    fn test_determine_level_configured() {
        assert_eq!(
            determine_level(0, false, Some(LevelFilter::Warn)),
            LevelFilter::Warn
        );
        // flags win over the file
        assert_eq!(
            determine_level(1, false, Some(LevelFilter::Warn)),
            LevelFilter::Debug
        );
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_log_once_across_threads() {
        let notice = Arc::new(LogOnce::new());
        let fired: usize = (0..8)
            .map(|_| {
                let notice = Arc::clone(&notice);
                std::thread::spawn(move || notice.warn("probe missing"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(fired, 1);
        assert!(notice.has_fired());
    }
}
