//! In-memory collaborators.
//!
//! [`NoMetadata`] and [`NoProbe`] stand in for tools that are disabled or
//! missing. [`StaticDates`] and [`StaticProbe`] answer from fixed tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::{CaptureDateSource, CollaboratorError, VideoProbe, VideoSignature};

/// Capture-date source that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl CaptureDateSource for NoMetadata {
    fn name(&self) -> &str {
        "metadata"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn captured_dates(
        &self,
        _paths: &[PathBuf],
    ) -> Result<HashMap<PathBuf, NaiveDateTime>, CollaboratorError> {
        Ok(HashMap::new())
    }
}

/// Video probe that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl VideoProbe for NoProbe {
    fn name(&self) -> &str {
        "video probe"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn probe(&self, _path: &Path) -> Result<Option<VideoSignature>, CollaboratorError> {
        Ok(None)
    }
}

/// Capture dates from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticDates {
    dates: HashMap<PathBuf, NaiveDateTime>,
}

impl StaticDates {
    /// Build from `(path, date)` pairs.
    pub fn new<P, I>(entries: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (P, NaiveDateTime)>,
    {
        Self {
            dates: entries.into_iter().map(|(p, d)| (p.into(), d)).collect(),
        }
    }
}

impl CaptureDateSource for StaticDates {
    fn name(&self) -> &str {
        "static dates"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn captured_dates(
        &self,
        paths: &[PathBuf],
    ) -> Result<HashMap<PathBuf, NaiveDateTime>, CollaboratorError> {
        Ok(paths
            .iter()
            .filter_map(|p| self.dates.get(p).map(|d| (p.clone(), *d)))
            .collect())
    }
}

/// Video signatures from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticProbe {
    signatures: HashMap<PathBuf, VideoSignature>,
}

impl StaticProbe {
    /// Build from `(path, signature)` pairs.
    pub fn new<P, I>(entries: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (P, VideoSignature)>,
    {
        Self {
            signatures: entries.into_iter().map(|(p, s)| (p.into(), s)).collect(),
        }
    }
}

impl VideoProbe for StaticProbe {
    fn name(&self) -> &str {
        "static probe"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn probe(&self, path: &Path) -> Result<Option<VideoSignature>, CollaboratorError> {
        Ok(self.signatures.get(path).cloned())
    }
}
