use mediadupe::checkpoint::{Checkpoint, CheckpointError, Phase};
use mediadupe::duplicates::{DuplicateFinder, FinderConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn populate(root: &Path) {
    fs::write(root.join("a.jpg"), b"duplicate photo").unwrap();
    fs::write(root.join("b.jpg"), b"duplicate photo").unwrap();
    fs::write(root.join("c.jpg"), b"distinct photo!").unwrap();
}

fn scan_with_checkpoint(root: &Path) -> Arc<Checkpoint> {
    let cp = Arc::new(Checkpoint::load_or_init(&Checkpoint::default_path(root), root).unwrap());
    DuplicateFinder::new(FinderConfig::default().with_checkpoint(cp.clone()))
        .find_duplicates(root)
        .unwrap();
    cp
}

#[test]
fn test_scan_records_units_and_phase() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let cp = scan_with_checkpoint(dir.path());
    let stats = cp.stats();
    // one prehash per file; files below the prefix length reuse it
    assert_eq!(stats.units, 3);
    assert!(stats.phase >= Phase::Scanning);
    assert_eq!(stats.pending_intents, 0);
}

#[test]
fn test_checkpoint_file_is_not_scanned() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let cp = scan_with_checkpoint(dir.path());
    drop(cp);

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    assert_eq!(outcome.summary.total_files, 3);
}

#[test]
fn test_corrupted_record_is_fatal() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let path = Checkpoint::default_path(dir.path());
    drop(scan_with_checkpoint(dir.path()));

    let content = fs::read_to_string(&path).unwrap();
    let target = content
        .lines()
        .position(|line| line.contains("\"type\":\"unit\""))
        .unwrap();
    let tampered: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == target {
                line.replacen("\"value\":\"", "\"value\":\"00", 1)
            } else {
                line.to_string()
            }
        })
        .collect();
    fs::write(&path, tampered.join("\n") + "\n").unwrap();

    let err = Checkpoint::load_or_init(&path, dir.path()).unwrap_err();
    assert!(err.is_corruption());
    assert!(matches!(err, CheckpointError::Corrupt { line, .. } if line == target + 1));
    assert!(err.to_string().contains("--discard-checkpoint"));

    // inspect reports the same damage without repairing anything
    assert!(Checkpoint::inspect(&path).unwrap_err().is_corruption());
    assert_eq!(fs::read_to_string(&path).unwrap(), tampered.join("\n") + "\n");
}

#[test]
fn test_torn_final_line_is_dropped() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let path = Checkpoint::default_path(dir.path());
    let units = scan_with_checkpoint(dir.path()).stats().units;

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"seq\":99,\"checksum\":\"ab").unwrap();
    drop(file);

    let cp = Checkpoint::load_or_init(&path, dir.path()).unwrap();
    assert!(cp.is_resumed());
    assert_eq!(cp.stats().units, units);
    assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
}

#[test]
fn test_checkpoint_from_other_root_is_rejected() {
    let dir = tempdir().unwrap();
    let other = tempdir().unwrap();
    let path = Checkpoint::default_path(dir.path());
    drop(Checkpoint::load_or_init(&path, other.path()).unwrap());

    let err = Checkpoint::load_or_init(&path, dir.path()).unwrap_err();
    assert!(matches!(err, CheckpointError::RootMismatch { .. }));
    assert!(err.is_corruption());
}

#[test]
fn test_discard_then_fresh_run() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let path = Checkpoint::default_path(dir.path());
    drop(scan_with_checkpoint(dir.path()));
    fs::write(&path, "not json at all\n").unwrap();

    assert!(Checkpoint::load_or_init(&path, dir.path()).is_err());
    assert!(Checkpoint::discard(&path).unwrap());
    assert!(!Checkpoint::discard(&path).unwrap());

    let cp = Checkpoint::load_or_init(&path, dir.path()).unwrap();
    assert!(!cp.is_resumed());
    assert_eq!(cp.stats().units, 0);
}

#[test]
fn test_inspect_and_finish() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let path = Checkpoint::default_path(dir.path());
    assert!(Checkpoint::inspect(&path).unwrap().is_none());

    let cp = scan_with_checkpoint(dir.path());
    let (header, stats) = Checkpoint::inspect(&path).unwrap().unwrap();
    assert_eq!(header.run_id, cp.run_id());
    assert_eq!(stats, cp.stats());

    Arc::try_unwrap(cp).unwrap().finish().unwrap();
    assert!(!path.exists());
}
