//! Structured error handling and exit codes.

use serde::Serialize;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::duplicates::FinderError;
use crate::resolve::ResolveError;

/// Exit codes for mediadupe.
///
/// - 0: Success (completed normally, duplicates found or resolved)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found
/// - 3: Partial success (unreadable files or failed actions)
/// - 4: Checkpoint corrupt; rerun with `--discard-checkpoint` to start over
/// - 5: Configuration error, reported before anything was changed
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Completed with non-fatal errors.
    PartialSuccess = 3,
    /// The checkpoint is malformed.
    CheckpointCorruption = 4,
    /// Invalid configuration or target.
    ConfigError = 5,
    /// Interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MD000",
            Self::GeneralError => "MD001",
            Self::NoDuplicates => "MD002",
            Self::PartialSuccess => "MD003",
            Self::CheckpointCorruption => "MD004",
            Self::ConfigError => "MD005",
            Self::Interrupted => "MD130",
        }
    }

    /// Exit code for an error that ended the run.
    ///
    /// Walks the `anyhow` chain looking for a typed cause.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<CheckpointError>() {
                if e.is_corruption() {
                    return Self::CheckpointCorruption;
                }
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::ConfigError;
            }
            match cause.downcast_ref::<FinderError>() {
                Some(FinderError::Interrupted) => return Self::Interrupted,
                Some(FinderError::PathNotFound(_) | FinderError::NotADirectory(_)) => {
                    return Self::ConfigError
                }
                Some(FinderError::Checkpoint(e)) if e.is_corruption() => {
                    return Self::CheckpointCorruption
                }
                _ => {}
            }
            match cause.downcast_ref::<ResolveError>() {
                Some(ResolveError::Interrupted) => return Self::Interrupted,
                Some(ResolveError::Checkpoint(e)) if e.is_corruption() => {
                    return Self::CheckpointCorruption
                }
                _ => {}
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
