//! Keeper selection.
//!
//! Members are ranked by:
//!
//! 1. Capture date, oldest first; members without one rank after all dated members
//! 2. Filesystem modification time, oldest first
//! 3. Primary path, lexicographic
//!
//! The ranking is a total order over distinct paths, so the same group always
//! yields the same keeper.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::media::SidecarSet;

/// Which rule decided the keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeeperReason {
    /// Oldest capture date
    CaptureDate,
    /// Oldest modification time
    ModifiedTime,
    /// First path in lexicographic order
    PathOrder,
}

impl fmt::Display for KeeperReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureDate => write!(f, "oldest capture date"),
            Self::ModifiedTime => write!(f, "oldest modification time"),
            Self::PathOrder => write!(f, "path order"),
        }
    }
}

/// Compare two members by keeper preference; `Less` means `a` is kept first.
#[must_use]
pub fn keeper_order(a: &SidecarSet, b: &SidecarSet) -> Ordering {
    let (pa, pb) = (&a.primary, &b.primary);
    pa.captured
        .is_none()
        .cmp(&pb.captured.is_none())
        .then_with(|| pa.captured.cmp(&pb.captured))
        .then_with(|| pa.modified.cmp(&pb.modified))
        .then_with(|| pa.path.cmp(&pb.path))
}

/// Pick the keeper of a group.
///
/// Returns the index of the keeper in `group.members` and the rule that
/// separated it from the runner-up. Returns `None` for an empty group.
#[must_use]
pub fn select_keeper(group: &DuplicateGroup) -> Option<(usize, KeeperReason)> {
    let mut ranked: Vec<usize> = (0..group.members.len()).collect();
    ranked.sort_by(|&i, &j| keeper_order(&group.members[i], &group.members[j]));

    let keeper = *ranked.first()?;
    let Some(&runner_up) = ranked.get(1) else {
        return Some((keeper, KeeperReason::PathOrder));
    };

    let (k, r) = (&group.members[keeper].primary, &group.members[runner_up].primary);
    let reason = if k.captured.is_some() && k.captured != r.captured {
        KeeperReason::CaptureDate
    } else if k.modified != r.modified {
        KeeperReason::ModifiedTime
    } else {
        KeeperReason::PathOrder
    };
    Some((keeper, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::GroupKey;
    use crate::media::MediaFile;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};

    fn member(path: &str, mtime: u64, captured: Option<NaiveDateTime>) -> SidecarSet {
        let mut file = MediaFile::classify(
            PathBuf::from(path),
            10,
            SystemTime::UNIX_EPOCH + Duration::from_secs(mtime),
        )
        .unwrap();
        file.captured = captured;
        SidecarSet::new(file)
    }

    fn group(members: Vec<SidecarSet>) -> DuplicateGroup {
        DuplicateGroup::new(
            GroupKey {
                size: 10,
                prehash: [1; 32],
                full_hash: [2; 32],
            },
            members,
        )
    }

    fn day(y: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, 1, 1)?.and_hms_opt(0, 0, 0)
    }

    fn keeper_path(g: &DuplicateGroup) -> &Path {
        let (i, _) = select_keeper(g).unwrap();
        &g.members[i].primary.path
    }

    #[test]
    fn test_oldest_capture_date_wins() {
        let g = group(vec![
            member("/b.jpg", 1, day(2021)),
            member("/a.jpg", 900, day(2020)),
        ]);
        assert_eq!(keeper_path(&g), Path::new("/a.jpg"));
        assert_eq!(select_keeper(&g).unwrap().1, KeeperReason::CaptureDate);
    }

    #[test]
    fn test_dated_beats_undated() {
        let g = group(vec![member("/a.jpg", 1, None), member("/b.jpg", 500, day(2022))]);
        assert_eq!(keeper_path(&g), Path::new("/b.jpg"));
        assert_eq!(select_keeper(&g).unwrap().1, KeeperReason::CaptureDate);
    }

    #[test]
    fn test_mtime_breaks_equal_dates() {
        let g = group(vec![
            member("/a.jpg", 200, day(2020)),
            member("/b.jpg", 100, day(2020)),
        ]);
        assert_eq!(keeper_path(&g), Path::new("/b.jpg"));
        assert_eq!(select_keeper(&g).unwrap().1, KeeperReason::ModifiedTime);
    }

    #[test]
    fn test_mtime_without_dates() {
        let g = group(vec![member("/z.jpg", 5, None), member("/a.jpg", 6, None)]);
        assert_eq!(keeper_path(&g), Path::new("/z.jpg"));
        assert_eq!(select_keeper(&g).unwrap().1, KeeperReason::ModifiedTime);
    }

    #[test]
    fn test_path_order_last_resort() {
        let g = group(vec![
            member("/p/c.jpg", 7, None),
            member("/p/a.jpg", 7, None),
            member("/p/b.jpg", 7, None),
        ]);
        assert_eq!(keeper_path(&g), Path::new("/p/a.jpg"));
        assert_eq!(select_keeper(&g).unwrap().1, KeeperReason::PathOrder);
    }

    #[test]
    fn test_selection_is_stable_across_input_order() {
        let members = vec![
            member("/x/1.jpg", 3, None),
            member("/x/2.jpg", 3, day(2019)),
            member("/x/3.jpg", 1, None),
        ];
        let mut reversed = members.clone();
        reversed.reverse();
        let (forward, backward) = (group(members), group(reversed));
        assert_eq!(keeper_path(&forward), keeper_path(&backward));
        assert_eq!(keeper_path(&forward), Path::new("/x/2.jpg"));
    }

    #[test]
    fn test_empty_group() {
        assert!(select_keeper(&group(Vec::new())).is_none());
    }
}
