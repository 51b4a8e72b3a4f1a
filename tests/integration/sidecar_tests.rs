use mediadupe::duplicates::DuplicateFinder;
use mediadupe::resolve::{ResolveConfig, Resolver};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}

#[test]
fn test_sidecars_attach_to_primary_in_same_directory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "IMG_0001.JPG", b"photo-bytes");
    write(dir.path(), "IMG_0001.AAE", b"edits");
    write(dir.path(), "IMG_0001.JPG.xmp", b"<xmp/>");
    write(dir.path(), "copy/IMG_0001.JPG", b"photo-bytes");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.summary.total_files, 2);
    assert_eq!(outcome.summary.sidecar_files, 2);
    assert_eq!(outcome.groups.len(), 1);

    let group = &outcome.groups[0];
    let original = group
        .members
        .iter()
        .find(|m| m.primary.path == dir.path().join("IMG_0001.JPG"))
        .unwrap();
    assert_eq!(original.sidecars.len(), 2);
    let copy = group
        .members
        .iter()
        .find(|m| m.primary.path == dir.path().join("copy/IMG_0001.JPG"))
        .unwrap();
    assert!(copy.sidecars.is_empty());
}

#[test]
fn test_sidecar_content_does_not_affect_grouping() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/clip.mp4", b"video-bytes");
    write(dir.path(), "a/clip.thm", b"thumb-one");
    write(dir.path(), "b/clip.mp4", b"video-bytes");
    write(dir.path(), "b/clip.thm", b"a different thumbnail");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
    assert!(outcome.groups[0].members.iter().all(|m| m.sidecars.len() == 1));
}

#[test]
fn test_orphan_sidecars_are_reported_not_grouped() {
    let dir = tempdir().unwrap();
    write(dir.path(), "lonely.xmp", b"<xmp/>");
    write(dir.path(), "other/lonely.xmp", b"<xmp/>");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.orphans.len(), 2);
    assert_eq!(outcome.summary.orphan_sidecars, 2);
}

#[test]
fn test_quarantine_moves_sidecars_with_primary() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep/IMG_1.JPG", b"same-photo");
    write(dir.path(), "dupe/IMG_1.JPG", b"same-photo");
    write(dir.path(), "dupe/IMG_1.AAE", b"adjustments");
    set_mtime(&dir.path().join("keep/IMG_1.JPG"), 1_000_000);
    set_mtime(&dir.path().join("dupe/IMG_1.JPG"), 2_000_000);

    let mut outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let digest = outcome.groups[0].digest_hex();

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "20240101_000000"))
        .resolve(&mut outcome.groups)
        .unwrap();

    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.files_actioned(), 2);

    let qdir = dir
        .path()
        .join("_quarantine_20240101_000000")
        .join(&digest);
    assert!(qdir.join("IMG_1.JPG").exists());
    assert!(qdir.join("IMG_1.AAE").exists());
    assert!(!dir.path().join("dupe/IMG_1.JPG").exists());
    assert!(!dir.path().join("dupe/IMG_1.AAE").exists());
    assert!(dir.path().join("keep/IMG_1.JPG").exists());
}

#[test]
fn test_name_collision_suffixes_whole_set() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/IMG_1.JPG", b"same-photo");
    write(dir.path(), "b/IMG_1.JPG", b"same-photo");
    write(dir.path(), "b/IMG_1.xmp", b"<b/>");
    write(dir.path(), "c/IMG_1.JPG", b"same-photo");
    write(dir.path(), "c/IMG_1.xmp", b"<c/>");
    for (name, secs) in [("a", 1), ("b", 2), ("c", 3)] {
        set_mtime(&dir.path().join(name).join("IMG_1.JPG"), secs * 1_000_000);
    }

    let mut outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let digest = outcome.groups[0].digest_hex();

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run"))
        .resolve(&mut outcome.groups)
        .unwrap();
    assert_eq!(summary.completed(), 1);

    let qdir = dir.path().join("_quarantine_run").join(&digest);
    assert_eq!(fs::read(qdir.join("IMG_1.xmp")).unwrap(), b"<b/>");
    assert_eq!(fs::read(qdir.join("IMG_1_2.xmp")).unwrap(), b"<c/>");
    assert!(qdir.join("IMG_1_2.JPG").exists());
    assert!(dir.path().join("a/IMG_1.JPG").exists());
}
