//! Layered configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config PATH`, or `config.toml` in the platform config
//!    directory when it exists)
//! 3. Environment variables prefixed `MEDIADUPE_` (e.g. `MEDIADUPE_IO_THREADS=8`)
//! 4. Command-line flags
//!
//! # Example
//!
//! ```toml
//! prehash_bytes = 8388608
//! io_threads = 8
//! timezone = "utc"
//! probe = "disabled"
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::collab::{TimeZoneMode, ToolMode, DEFAULT_BATCH_SIZE};
use crate::duplicates::DEFAULT_TOLERANCE_MS;
use crate::media::{DEFAULT_PREHASH_BYTES, MAX_PREHASH_BYTES};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "MEDIADUPE_";

/// Errors raised while building the configuration or checking the target.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or a value has the wrong type.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// An explicitly named configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    /// A value is out of range.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Configuration key
        key: &'static str,
        /// What is wrong
        reason: String,
    },

    /// The target directory cannot be used.
    #[error("Target {path} is not usable: {reason}")]
    Target {
        /// Target path
        path: PathBuf,
        /// What is wrong
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bytes read for the partial digest.
    pub prehash_bytes: u64,
    /// Worker threads for digests and probes.
    pub io_threads: usize,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Run the near-duplicate video stage.
    pub near_duplicates: bool,
    /// Near-duplicate duration tolerance in milliseconds.
    pub duration_tolerance_ms: u64,
    /// Near-duplicates must also share a codec.
    pub require_same_codec: bool,
    /// Interpretation of offset-bearing capture dates.
    pub timezone: TimeZoneMode,
    /// Video probe availability.
    pub probe: ToolMode,
    /// Capture-date tool availability.
    pub metadata: ToolMode,
    /// Files per capture-date batch.
    pub metadata_batch_size: usize,
    /// Explicit exiftool location.
    pub exiftool_path: Option<PathBuf>,
    /// Explicit ffprobe location.
    pub ffprobe_path: Option<PathBuf>,
    /// Abort on the first unreadable file.
    pub strict: bool,
    /// Log level when no flag or `RUST_LOG` sets one.
    pub log_level: Option<String>,
    /// Directory for reports; the target root when unset.
    pub report_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prehash_bytes: DEFAULT_PREHASH_BYTES,
            io_threads: 4,
            recursive: true,
            near_duplicates: true,
            duration_tolerance_ms: DEFAULT_TOLERANCE_MS,
            require_same_codec: false,
            timezone: TimeZoneMode::Original,
            probe: ToolMode::Auto,
            metadata: ToolMode::Auto,
            metadata_batch_size: DEFAULT_BATCH_SIZE,
            exiftool_path: None,
            ffprobe_path: None,
            strict: false,
            log_level: None,
            report_dir: None,
        }
    }
}

/// Values supplied on the command line; unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prehash_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_duplicates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_tolerance_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_same_codec: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<TimeZoneMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ToolMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ToolMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exiftool_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

impl Config {
    /// Default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "mediadupe", "mediadupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, file and environment layers.
    ///
    /// `file` must exist when given; the default path is used only if present.
    ///
    /// # Errors
    ///
    /// Returns `MissingFile` if an explicit file does not exist.
    pub fn figment(file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::MissingFile(path.to_path_buf()))
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    log::debug!("Using configuration file {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Build the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is unreadable or a value is invalid.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file)?
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prehash_bytes == 0 || self.prehash_bytes > MAX_PREHASH_BYTES {
            return Err(ConfigError::Invalid {
                key: "prehash_bytes",
                reason: format!("must be between 1 and {MAX_PREHASH_BYTES}"),
            });
        }
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid {
                key: "io_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.metadata_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "metadata_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(level) = &self.log_level {
            if crate::logging::parse_level(level).is_none() {
                return Err(ConfigError::Invalid {
                    key: "log_level",
                    reason: format!("unknown level '{level}'"),
                });
            }
        }
        Ok(())
    }
}

/// Check that the target exists, is a directory and accepts new files.
///
/// Runs before anything is changed, so a read-only tree fails up front
/// instead of halfway through quarantining.
///
/// # Errors
///
/// Returns `Target` describing the problem.
pub fn check_target_writable(target: &Path) -> Result<(), ConfigError> {
    let fail = |reason: String| ConfigError::Target {
        path: target.to_path_buf(),
        reason,
    };
    let meta = fs::metadata(target).map_err(|e| fail(e.to_string()))?;
    if !meta.is_dir() {
        return Err(fail("not a directory".to_string()));
    }
    let probe = target.join(".mediadupe-write-test");
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|e| fail(format!("not writable ({e})")))?;
    fs::remove_file(&probe).map_err(|e| fail(format!("cannot clean up write test ({e})")))?;
    Ok(())
}
