use mediadupe::duplicates::{DuplicateFinder, FinderConfig};
use mediadupe::media::WalkerConfig;
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

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.summary.total_files, 0);
    assert_eq!(outcome.summary.duplicate_groups, 0);
}

#[test]
fn test_scan_last_byte_difference() {
    let dir = tempdir().unwrap();
    let mut content = vec![7u8; 64 * 1024];
    write(dir.path(), "a.jpg", &content);
    write(dir.path(), "b.jpg", &content);
    *content.last_mut().unwrap() = 8;
    write(dir.path(), "c.jpg", &content);

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    let paths = outcome.groups[0].paths();
    assert_eq!(paths, vec![dir.path().join("a.jpg"), dir.path().join("b.jpg")]);
    assert!(!outcome.groups[0].contains(&dir.path().join("c.jpg")));
    assert_eq!(outcome.summary.total_files, 3);
}

#[test]
fn test_scan_difference_past_prehash_prefix() {
    let dir = tempdir().unwrap();
    let mut content = vec![1u8; 8192];
    write(dir.path(), "a.mov", &content);
    content[8000] = 2;
    write(dir.path(), "b.mov", &content);

    let finder = DuplicateFinder::new(FinderConfig::default().with_prehash_bytes(1024));
    let outcome = finder.find_duplicates(dir.path()).unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.summary.eliminated_by_prehash, 0);
    assert_eq!(outcome.unclustered_videos.len(), 2);
}

#[test]
fn test_scan_ignores_unrecognized_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "notes.txt", b"same");
    write(dir.path(), "copy.txt", b"same");
    write(dir.path(), "IMG_1.JPG", b"photo");
    write(dir.path(), "IMG_2.jpeg", b"photo");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.summary.total_files, 2);
    assert_eq!(outcome.groups.len(), 1);
}

#[test]
fn test_scan_nested_and_flat() {
    let dir = tempdir().unwrap();
    write(dir.path(), "top.jpg", b"dup");
    write(dir.path(), "2021/01/nested.jpg", b"dup");

    let recursive = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    assert_eq!(recursive.groups.len(), 1);

    let flat = DuplicateFinder::new(
        FinderConfig::default().with_walker_config(WalkerConfig { recursive: false }),
    )
    .find_duplicates(dir.path())
    .unwrap();
    assert!(flat.groups.is_empty());
    assert_eq!(flat.summary.total_files, 1);
}

#[test]
fn test_scan_skips_quarantine_directories() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.jpg", b"dup");
    write(dir.path(), "_quarantine_20240101_120000/abc/a.jpg", b"dup");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.summary.total_files, 1);
}

#[test]
fn test_scan_groups_are_sorted_by_path() {
    let dir = tempdir().unwrap();
    for name in ["z.jpg", "m.jpg", "a.jpg"] {
        write(dir.path(), name, b"triplicate");
    }

    let outcome = DuplicateFinder::new(FinderConfig::default().with_io_threads(3))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(
        outcome.groups[0].paths(),
        vec![
            dir.path().join("a.jpg"),
            dir.path().join("m.jpg"),
            dir.path().join("z.jpg")
        ]
    );
    assert_eq!(outcome.summary.duplicate_files, 2);
    assert_eq!(outcome.summary.reclaimable_space, 20);
}

#[cfg(unix)]
#[test]
fn test_scan_unreadable_file_does_not_block_siblings() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "a.jpg", b"same-bytes");
    write(dir.path(), "b.jpg", b"same-bytes");
    write(dir.path(), "c.jpg", b"same-bytes");
    let locked = dir.path().join("c.jpg");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything; nothing to test then.
    if fs::read(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
    assert_eq!(outcome.summary.scan_errors.len(), 1);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let strict = DuplicateFinder::new(FinderConfig::default().with_strict(true))
        .find_duplicates(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    assert!(strict.is_err());
}
