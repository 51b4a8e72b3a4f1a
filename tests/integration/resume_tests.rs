use mediadupe::checkpoint::Checkpoint;
use mediadupe::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use mediadupe::media::MediaFile;
use mediadupe::resolve::{plan_action, FileStatus, ResolveConfig, ResolveError, Resolver};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

/// 1000 files of 16 bytes; files 500..510 copy files 0..10.
fn thousand_files(root: &Path) -> Vec<PathBuf> {
    (0..1000)
        .map(|i| {
            let path = root.join(format!("IMG_{i:04}.JPG"));
            let content = if (500..510).contains(&i) {
                format!("{:016}", i - 500)
            } else {
                format!("{i:016}")
            };
            fs::write(&path, content).unwrap();
            path
        })
        .collect()
}

fn media(paths: &[PathBuf]) -> Vec<MediaFile> {
    paths.iter().map(|p| MediaFile::from_path(p).unwrap()).collect()
}

#[test]
fn test_resume_after_half_the_files() {
    let dir = tempdir().unwrap();
    let paths = thousand_files(dir.path());
    let cp_dir = tempdir().unwrap();
    let cp_path = cp_dir.path().join("checkpoint.jsonl");

    // First run only got through the first 500 files
    {
        let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
        let finder = DuplicateFinder::new(FinderConfig::default().with_checkpoint(cp));
        let partial = finder.find_duplicates_from_files(media(&paths[..500])).unwrap();
        assert!(partial.groups.is_empty());
    }

    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    assert!(cp.is_resumed());
    let resumed = DuplicateFinder::new(FinderConfig::default().with_checkpoint(cp))
        .find_duplicates(dir.path())
        .unwrap();
    assert_eq!(resumed.summary.resumed_units, 500);

    let fresh = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(resumed.groups.len(), 10);
    let keys = |groups: &[mediadupe::duplicates::DuplicateGroup]| {
        groups
            .iter()
            .map(|g| (g.key.clone(), g.paths()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&resumed.groups), keys(&fresh.groups));
}

#[test]
fn test_changed_file_is_rehashed_on_resume() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    fs::write(&a, b"original").unwrap();
    fs::write(&b, b"original").unwrap();
    let cp_path = Checkpoint::default_path(dir.path());

    {
        let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
        let outcome = DuplicateFinder::new(FinderConfig::default().with_checkpoint(cp))
            .find_duplicates(dir.path())
            .unwrap();
        assert_eq!(outcome.groups.len(), 1);
    }

    fs::write(&b, b"modified").unwrap();
    filetime::set_file_mtime(&b, filetime::FileTime::from_unix_time(2_000_000_000, 0)).unwrap();

    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    let outcome = DuplicateFinder::new(FinderConfig::default().with_checkpoint(cp))
        .find_duplicates(dir.path())
        .unwrap();
    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.summary.resumed_units, 1);
}

#[test]
fn test_interrupted_scan_returns_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"x").unwrap();
    fs::write(dir.path().join("b.jpg"), b"x").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let result = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag))
        .find_duplicates(dir.path());
    assert!(matches!(result, Err(FinderError::Interrupted)));
}

#[test]
fn test_recorded_intent_is_replayed_after_crash() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    let c = dir.path().join("c.jpg");
    for (path, secs) in [(&a, 1_000_000), (&b, 2_000_000), (&c, 3_000_000)] {
        fs::write(path, b"same bytes").unwrap();
        filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
    }
    let cp_path = Checkpoint::default_path(dir.path());
    let mut groups = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap()
        .groups;

    // Crash after the intent was written and b was moved, before c
    let run_id = {
        let cp = Checkpoint::load_or_init(&cp_path, dir.path()).unwrap();
        let config = ResolveConfig::quarantine(dir.path(), cp.run_id());
        let action = plan_action(&groups[0], &config.disposition).unwrap();
        cp.record_intent(&action.group, &action).unwrap();
        let b_dest = action.actioned[0].primary.destination.clone().unwrap();
        fs::create_dir_all(b_dest.parent().unwrap()).unwrap();
        fs::rename(&b, &b_dest).unwrap();
        cp.run_id().to_string()
    };

    let cp = Arc::new(Checkpoint::load_or_init(&cp_path, dir.path()).unwrap());
    assert_eq!(cp.stats().pending_intents, 1);
    let summary = Resolver::new(ResolveConfig::quarantine(dir.path(), &run_id))
        .with_checkpoint(cp.clone())
        .resolve(&mut groups)
        .unwrap();

    assert_eq!(summary.replayed(), 1);
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.records.len(), 1);
    let statuses: Vec<&FileStatus> = summary.records[0]
        .outcome
        .files
        .iter()
        .map(|f| &f.status)
        .collect();
    assert_eq!(statuses, vec![&FileStatus::AlreadyDone, &FileStatus::Moved]);

    assert!(a.exists());
    assert!(!b.exists());
    assert!(!c.exists());
    assert_eq!(cp.stats().pending_intents, 0);
    assert_eq!(cp.stats().resolved_groups, 1);
}

#[test]
fn test_shutdown_before_resolution_touches_nothing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"dup").unwrap();
    fs::write(dir.path().join("b.jpg"), b"dup").unwrap();
    let mut groups = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap()
        .groups;

    let flag = Arc::new(AtomicBool::new(true));
    let result = Resolver::new(ResolveConfig::quarantine(dir.path(), "run").with_shutdown_flag(flag))
        .resolve(&mut groups);

    assert!(matches!(result, Err(ResolveError::Interrupted)));
    assert!(dir.path().join("a.jpg").exists());
    assert!(dir.path().join("b.jpg").exists());
}
