//! Quarantine layout and moves.
//!
//! Actioned files land in `<target>/_quarantine_<run_id>/<full-digest>/`
//! under their original file names. When a name is already taken the whole
//! sidecar set gets the same `_2`, `_3`, ... suffix so the primary and its
//! sidecars still share a basename inside the quarantine.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::ActionError;
use crate::media::QUARANTINE_DIR_PREFIX;

/// How a file reached the quarantine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    /// Atomic rename on the same filesystem
    Renamed,
    /// Copy, sync and remove across filesystems
    Copied,
}

/// Quarantine root for a run.
#[must_use]
pub fn quarantine_root(target: &Path, run_id: &str) -> PathBuf {
    target.join(format!("{QUARANTINE_DIR_PREFIX}{run_id}"))
}

/// Directory holding the actioned members of one group.
#[must_use]
pub fn group_dir(root: &Path, digest_hex: &str) -> PathBuf {
    root.join(digest_hex)
}

/// `stem_n.ext` for `n >= 2`, the name unchanged otherwise.
///
/// ```
/// use mediadupe::resolve::quarantine::suffixed_name;
/// use std::ffi::OsStr;
///
/// assert_eq!(suffixed_name(OsStr::new("IMG_1.JPG"), 1), "IMG_1.JPG");
/// assert_eq!(suffixed_name(OsStr::new("IMG_1.JPG"), 2), "IMG_1_2.JPG");
/// assert_eq!(suffixed_name(OsStr::new("README"), 3), "README_3");
/// ```
#[must_use]
pub fn suffixed_name(name: &OsStr, n: u32) -> OsString {
    if n < 2 {
        return name.to_os_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().unwrap_or(name);
    let mut out = stem.to_os_string();
    out.push(format!("_{n}"));
    if let Some(ext) = path.extension() {
        out.push(".");
        out.push(ext);
    }
    out
}

/// Choose destinations in `dir` for one sidecar set.
///
/// `names` are the original file names, primary first. The first suffix for
/// which no name is on disk or in `taken` is used for all of them; the chosen
/// names are added to `taken`.
pub fn allocate(dir: &Path, names: &[OsString], taken: &mut HashSet<OsString>) -> Vec<PathBuf> {
    let mut n = 1;
    loop {
        let candidates: Vec<OsString> = names.iter().map(|name| suffixed_name(name, n)).collect();
        let free = candidates
            .iter()
            .all(|c| !taken.contains(c) && !dir.join(c).exists());
        if free {
            return candidates
                .into_iter()
                .map(|c| {
                    let path = dir.join(&c);
                    taken.insert(c);
                    path
                })
                .collect();
        }
        n += 1;
    }
}

/// Move `source` to `destination`, creating parent directories.
///
/// A failed rename falls back to copy, sync and remove; the source is only
/// removed once the copy is synced and renamed into place.
///
/// # Errors
///
/// Returns an error if the source is missing, the destination is taken, or
/// the copy fails. The source is left untouched on error.
pub fn move_file(source: &Path, destination: &Path) -> Result<MoveMethod, ActionError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| ActionError::from_io(parent, e))?;
    }
    if destination.exists() {
        return Err(ActionError::DestinationExists(destination.to_path_buf()));
    }

    match fs::rename(source, destination) {
        Ok(()) => {
            log::info!("MOVED {} -> {}", source.display(), destination.display());
            return Ok(MoveMethod::Renamed);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ActionError::NotFound(source.to_path_buf()));
        }
        Err(e) => {
            log::debug!(
                "Rename {} failed ({}), copying instead",
                source.display(),
                e
            );
        }
    }

    let partial = partial_path(destination);
    let copied = fs::copy(source, &partial).map_err(|e| ActionError::from_io(source, e));
    let result = copied.and_then(|_| {
        File::open(&partial)
            .and_then(|f| f.sync_all())
            .map_err(|e| ActionError::from_io(&partial, e))?;
        fs::rename(&partial, destination).map_err(|e| ActionError::from_io(destination, e))
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::remove_file(source).map_err(|e| ActionError::from_io(source, e))?;
    log::info!(
        "MOVED {} -> {} (copied)",
        source.display(),
        destination.display()
    );
    Ok(MoveMethod::Copied)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(".partial");
    destination.with_file_name(name)
}
