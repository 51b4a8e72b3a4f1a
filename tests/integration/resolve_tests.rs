use chrono::NaiveDate;
use mediadupe::checkpoint::Checkpoint;
use mediadupe::collab::{annotate_capture_dates, StaticDates};
use mediadupe::duplicates::{DuplicateFinder, DuplicateGroup};
use mediadupe::logging::LogOnce;
use mediadupe::resolve::{
    FileStatus, KeeperReason, PermanentDeletion, ResolveConfig, Resolver,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn write(root: &Path, name: &str, content: &[u8], mtime: i64) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

fn scan(root: &Path) -> Vec<DuplicateGroup> {
    DuplicateFinder::with_defaults()
        .find_duplicates(root)
        .unwrap()
        .groups
}

/// Three identical photos; `c.jpg` has the oldest mtime.
fn triple() -> TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.jpg", b"identical", 3_000_000);
    write(dir.path(), "b.jpg", b"identical", 2_000_000);
    write(dir.path(), "c.jpg", b"identical", 1_000_000);
    dir
}

#[test]
fn test_capture_date_beats_modification_time() {
    let dir = tempdir().unwrap();
    // a was copied last but shot first
    let a = write(dir.path(), "a.jpg", b"same-shot", 2_000_000_000);
    let b = write(dir.path(), "b.jpg", b"same-shot", 1_000_000_000);
    let shot = |y| NaiveDate::from_ymd_opt(y, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();

    let mut groups = scan(dir.path());
    let dates = StaticDates::new([(a.clone(), shot(2020)), (b.clone(), shot(2021))]);
    assert_eq!(annotate_capture_dates(&mut groups, &dates, 25, &LogOnce::new()), 2);

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run"))
        .resolve(&mut groups)
        .unwrap();

    let record = &summary.records[0];
    assert_eq!(record.action.keeper, a);
    assert_eq!(record.action.keeper_reason, KeeperReason::CaptureDate);
    assert!(a.exists());
    assert!(!b.exists());
}

#[test]
fn test_oldest_mtime_kept_without_dates() {
    let dir = triple();
    let mut groups = scan(dir.path());

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run"))
        .resolve(&mut groups)
        .unwrap();

    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.files_actioned(), 2);
    assert_eq!(summary.bytes_actioned(), 18);
    assert_eq!(summary.records[0].action.keeper_reason, KeeperReason::ModifiedTime);
    assert!(dir.path().join("c.jpg").exists());
    assert!(!dir.path().join("a.jpg").exists());
    assert!(!dir.path().join("b.jpg").exists());
}

#[test]
fn test_quarantine_layout_and_contents() {
    let dir = triple();
    let mut groups = scan(dir.path());
    let digest = groups[0].digest_hex();

    Resolver::new(ResolveConfig::quarantine(dir.path(), "20240102_030405"))
        .resolve(&mut groups)
        .unwrap();

    let qdir = dir.path().join("_quarantine_20240102_030405").join(digest);
    let mut names: Vec<String> = fs::read_dir(&qdir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    assert_eq!(fs::read(qdir.join("a.jpg")).unwrap(), b"identical");
}

#[test]
fn test_dry_run_touches_nothing() {
    let dir = triple();
    let cp_path = Checkpoint::default_path(dir.path());
    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    let mut groups = scan(dir.path());

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run").with_dry_run(true))
        .with_checkpoint(cp.clone())
        .resolve(&mut groups)
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.failed(), 0);
    assert!(summary.records[0]
        .outcome
        .files
        .iter()
        .all(|f| f.status == FileStatus::Planned));
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(dir.path().join(name).exists());
    }
    assert!(!dir.path().join("_quarantine_run").exists());
    assert_eq!(cp.stats().pending_intents, 0);
    assert_eq!(cp.stats().resolved_groups, 0);
}

#[test]
fn test_permanent_delete() {
    let dir = triple();
    let mut groups = scan(dir.path());

    let summary = Resolver::new(ResolveConfig::delete(PermanentDeletion::Acknowledged))
        .resolve(&mut groups)
        .unwrap();

    assert_eq!(summary.completed(), 1);
    assert!(summary.records[0]
        .outcome
        .files
        .iter()
        .all(|f| f.status == FileStatus::Deleted && f.destination.is_none()));
    assert!(dir.path().join("c.jpg").exists());
    assert!(!dir.path().join("a.jpg").exists());
    assert!(!dir.path().join("b.jpg").exists());
    assert!(!fs::read_dir(dir.path())
        .unwrap()
        .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("_quarantine_")));
}

#[test]
fn test_second_resolve_is_a_no_op() {
    let dir = triple();
    let cp_path = Checkpoint::default_path(dir.path());
    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    let mut groups = scan(dir.path());

    let resolver = Resolver::new(ResolveConfig::quarantine(dir.path(), cp.run_id()))
        .with_checkpoint(cp.clone());
    let first = resolver.resolve(&mut groups).unwrap();
    assert_eq!(first.completed(), 1);

    let second = resolver.resolve(&mut groups).unwrap();
    assert!(second.records.is_empty());
    assert_eq!(second.already_resolved, 1);

    // A fresh scan sees only the keeper now
    assert!(scan(dir.path()).is_empty());
}

#[test]
fn test_file_changed_after_scan_is_left_alone() {
    let dir = triple();
    let mut groups = scan(dir.path());
    write(dir.path(), "a.jpg", b"rewritten!", 3_000_500);

    let cp_path = Checkpoint::default_path(dir.path());
    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run"))
        .with_checkpoint(cp.clone())
        .resolve(&mut groups)
        .unwrap();

    assert_eq!(summary.failed(), 1);
    let outcome = &summary.records[0].outcome;
    assert!(!outcome.completed);
    assert!(outcome.error.is_some());
    assert_eq!(fs::read(dir.path().join("a.jpg")).unwrap(), b"rewritten!");
    assert_eq!(cp.stats().pending_intents, 1);
}

#[test]
fn test_missing_keeper_aborts_group() {
    let dir = triple();
    let mut groups = scan(dir.path());
    fs::remove_file(dir.path().join("c.jpg")).unwrap();

    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), "run"))
        .resolve(&mut groups)
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(summary.records[0]
        .outcome
        .files
        .iter()
        .all(|f| f.status == FileStatus::Skipped));
    assert!(dir.path().join("a.jpg").exists());
    assert!(dir.path().join("b.jpg").exists());
}
