//! Sidecar association.
//!
//! Sidecars (`.aae`, `.xmp`, `.thm`, `.lrv`) belong to the primary in the same
//! directory whose basename they share. Both `IMG_0001.xmp` and
//! `IMG_0001.JPG.xmp` attach to `IMG_0001.JPG`.
//!
//! When several primaries share a basename (a Live Photo's `.HEIC` and `.MOV`,
//! say) the sidecar goes to the primary of the kind it usually describes:
//! `.thm` and `.lrv` to videos, `.aae` and `.xmp` to photos. Remaining ties go
//! to the primary whose path sorts first.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{MediaFile, MediaKind};

/// A primary media file plus the sidecars that share its basename.
///
/// Every filesystem operation applied to the primary is applied to the
/// sidecars as well; sidecars are never actioned on their own.
#[derive(Debug, Clone)]
pub struct SidecarSet {
    /// The photo or video
    pub primary: MediaFile,
    /// Sidecars sorted by path
    pub sidecars: Vec<MediaFile>,
}

impl SidecarSet {
    /// Create a set with no sidecars.
    #[must_use]
    pub fn new(primary: MediaFile) -> Self {
        Self {
            primary,
            sidecars: Vec::new(),
        }
    }

    /// Stable identifier of the set (the primary's path).
    #[must_use]
    pub fn id(&self) -> &Path {
        &self.primary.path
    }

    /// All paths in the set, primary first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        std::iter::once(&self.primary)
            .chain(self.sidecars.iter())
            .map(|f| f.path.clone())
            .collect()
    }

    /// Whether the primary is a video.
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.primary.kind == MediaKind::Video
    }

    /// Size of the primary in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.primary.size
    }

    /// Combined size of primary and sidecars.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.primary.size + self.sidecars.iter().map(|s| s.size).sum::<u64>()
    }
}

/// Result of associating a flat file listing.
#[derive(Debug, Default)]
pub struct Association {
    /// One set per primary, sorted by primary path
    pub sets: Vec<SidecarSet>,
    /// Sidecars without a matching primary; excluded from duplicate processing
    pub orphans: Vec<MediaFile>,
}

impl Association {
    /// Number of sidecars attached to some primary.
    #[must_use]
    pub fn attached_sidecars(&self) -> usize {
        self.sets.iter().map(|s| s.sidecars.len()).sum()
    }

    /// Sets indexed by primary basename.
    ///
    /// Several sets can share a basename when they live in different
    /// directories or differ only by extension.
    #[must_use]
    pub fn by_basename(&self) -> BTreeMap<&str, Vec<&SidecarSet>> {
        let mut map: BTreeMap<&str, Vec<&SidecarSet>> = BTreeMap::new();
        for set in &self.sets {
            map.entry(set.primary.basename.as_str())
                .or_default()
                .push(set);
        }
        map
    }
}

/// Kind of primary a sidecar extension usually describes.
fn preferred_primary(sidecar: &MediaFile) -> MediaKind {
    match sidecar.extension().as_str() {
        "thm" | "lrv" => MediaKind::Video,
        _ => MediaKind::Photo,
    }
}

/// Group sidecars with their primaries.
///
/// A primary with no sidecar yields a set with an empty sidecar list. A
/// sidecar with no primary in its directory is returned as an orphan and
/// logged.
#[must_use]
pub fn associate(files: Vec<MediaFile>) -> Association {
    let (mut primaries, mut sidecars): (Vec<MediaFile>, Vec<MediaFile>) =
        files.into_iter().partition(|f| f.kind.is_primary());
    primaries.sort_by(|a, b| a.path.cmp(&b.path));
    sidecars.sort_by(|a, b| a.path.cmp(&b.path));

    // (directory, stem) -> primary indices, and (directory, file name) -> index
    let mut by_stem: HashMap<(PathBuf, String), Vec<usize>> = HashMap::new();
    let mut by_name: HashMap<(PathBuf, String), usize> = HashMap::new();
    for (idx, primary) in primaries.iter().enumerate() {
        let dir = parent_of(&primary.path);
        by_stem
            .entry((dir.clone(), primary.basename.clone()))
            .or_default()
            .push(idx);
        if let Some(name) = primary.path.file_name() {
            by_name.insert((dir, name.to_string_lossy().into_owned()), idx);
        }
    }

    let mut attached: Vec<Vec<MediaFile>> = vec![Vec::new(); primaries.len()];
    let mut orphans = Vec::new();

    for sidecar in sidecars {
        let dir = parent_of(&sidecar.path);
        let key = (dir, sidecar.basename.clone());

        let target = if let Some(&idx) = by_name.get(&key) {
            Some(idx)
        } else {
            by_stem.get(&key).and_then(|candidates| {
                let wanted = preferred_primary(&sidecar);
                candidates
                    .iter()
                    .copied()
                    .find(|&i| primaries[i].kind == wanted)
                    .or_else(|| candidates.first().copied())
            })
        };

        match target {
            Some(idx) => {
                log::trace!(
                    "Sidecar {} attached to {}",
                    sidecar.path.display(),
                    primaries[idx].path.display()
                );
                attached[idx].push(sidecar);
            }
            None => {
                log::warn!(
                    "Orphan sidecar (no matching photo or video): {}",
                    sidecar.path.display()
                );
                orphans.push(sidecar);
            }
        }
    }

    let sets = primaries
        .into_iter()
        .zip(attached)
        .map(|(primary, sidecars)| SidecarSet { primary, sidecars })
        .collect();

    Association { sets, orphans }
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
