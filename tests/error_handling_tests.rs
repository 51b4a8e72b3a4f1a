//! End-to-end tests for exit codes and error reporting.
//!
//! Every run disables the external tools and uses an empty configuration
//! file so results do not depend on the machine running the tests.

use clap::Parser;
use mediadupe::checkpoint::{Checkpoint, CHECKPOINT_FILE_NAME};
use mediadupe::cli::Cli;
use mediadupe::duplicates::DuplicateFinder;
use mediadupe::error::{ExitCode, StructuredError};
use mediadupe::output::{ACTIONS_JSONL, ACTIONS_TEXT, NEAR_TEXT, SCAN_JSONL, SCAN_TEXT};
use mediadupe::resolve::{plan_action, ResolveConfig};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let config_dir = tempdir().unwrap();
    let config = config_dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    let mut argv = vec!["mediadupe", "--quiet", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    mediadupe::run_app(cli)
}

fn tools_off<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut all = args.to_vec();
    all.extend_from_slice(&["--metadata", "disabled", "--probe", "disabled"]);
    all
}

fn with_duplicates() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"duplicate").unwrap();
    fs::write(dir.path().join("b.jpg"), b"duplicate").unwrap();
    fs::write(dir.path().join("c.jpg"), b"different").unwrap();
    dir
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_exit_code_no_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("only.jpg"), b"unique").unwrap();

    let code = run(&tools_off(&["scan", path_str(dir.path())])).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
    assert_eq!(code.as_i32(), 2);
    assert!(dir.path().join(SCAN_TEXT).exists());
    assert!(dir.path().join(NEAR_TEXT).exists());
}

#[test]
fn test_scan_success_writes_reports_and_touches_nothing() {
    let dir = with_duplicates();

    let code = run(&tools_off(&["scan", path_str(dir.path())])).unwrap();
    assert_eq!(code, ExitCode::Success);

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(dir.path().join(name).exists());
    }
    let jsonl = fs::read_to_string(dir.path().join(SCAN_JSONL)).unwrap();
    assert!(jsonl.lines().count() >= 1);
    assert!(!dir.path().join(CHECKPOINT_FILE_NAME).exists());
}

#[test]
fn test_resolve_quarantines_and_logs_actions() {
    let dir = with_duplicates();
    let report_dir = tempdir().unwrap();

    let code = run(&tools_off(&[
        "resolve",
        path_str(dir.path()),
        "--report-dir",
        path_str(report_dir.path()),
    ]))
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    let remaining = ["a.jpg", "b.jpg"]
        .iter()
        .filter(|n| dir.path().join(n).exists())
        .count();
    assert_eq!(remaining, 1);
    assert!(dir.path().join("c.jpg").exists());
    assert!(report_dir.path().join(ACTIONS_TEXT).exists());
    assert!(report_dir.path().join(ACTIONS_JSONL).exists());
    assert!(!dir.path().join(CHECKPOINT_FILE_NAME).exists());

    // Rerun finds nothing left to do
    let code = run(&tools_off(&["resolve", path_str(dir.path())])).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_resolve_dry_run_keeps_files() {
    let dir = with_duplicates();

    let code = run(&tools_off(&["resolve", path_str(dir.path()), "--dry-run"])).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a.jpg").exists());
    assert!(dir.path().join("b.jpg").exists());
    let quarantined = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().starts_with("_quarantine_"));
    assert!(!quarantined);
}

#[test]
fn test_delete_requires_confirmation() {
    let dir = with_duplicates();

    let err = run(&tools_off(&["resolve", path_str(dir.path()), "--mode", "delete"])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
    assert!(dir.path().join("a.jpg").exists());
    assert!(dir.path().join("b.jpg").exists());
    assert!(!dir.path().join(CHECKPOINT_FILE_NAME).exists());

    let code = run(&tools_off(&[
        "resolve",
        path_str(dir.path()),
        "--mode",
        "delete",
        "--confirm-permanent-delete",
    ]))
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert_ne!(
        dir.path().join("a.jpg").exists(),
        dir.path().join("b.jpg").exists()
    );
}

#[test]
fn test_missing_target_is_config_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = run(&tools_off(&["scan", path_str(&missing)])).unwrap_err();
    let code = ExitCode::for_error(&err);
    assert_eq!(code, ExitCode::ConfigError);
    assert_eq!(code.code_prefix(), "MD005");
}

#[test]
fn test_invalid_config_value_is_config_error() {
    let dir = with_duplicates();
    let err = run(&tools_off(&["scan", path_str(dir.path()), "--io-threads", "0"])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_corrupt_checkpoint_exit_code() {
    let dir = with_duplicates();
    fs::write(dir.path().join(CHECKPOINT_FILE_NAME), "garbage\n").unwrap();

    let err = run(&tools_off(&["resolve", path_str(dir.path())])).unwrap_err();
    let code = ExitCode::for_error(&err);
    assert_eq!(code, ExitCode::CheckpointCorruption);
    assert_eq!(code.as_i32(), 4);
    assert!(dir.path().join("a.jpg").exists());
    assert!(dir.path().join("b.jpg").exists());

    let structured = StructuredError::new(&err, code);
    assert_eq!(structured.code, "MD004");
    assert!(!structured.interrupted);

    let code = run(&tools_off(&[
        "resolve",
        path_str(dir.path()),
        "--discard-checkpoint",
    ]))
    .unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_stale_intent_converges_and_checkpoint_is_removed() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (name, secs) in [("a.jpg", 1_000_000), ("b.jpg", 2_000_000), ("c.jpg", 3_000_000)] {
        let path = root.join(name);
        fs::write(&path, b"duplicate").unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
    }
    let groups = DuplicateFinder::with_defaults()
        .find_duplicates(&root)
        .unwrap()
        .groups;
    {
        let cp = Checkpoint::load_or_init(&Checkpoint::default_path(&root), &root).unwrap();
        let config = ResolveConfig::quarantine(&root, cp.run_id());
        let action = plan_action(&groups[0], &config.disposition).unwrap();
        assert_eq!(action.keeper, root.join("a.jpg"));
        cp.record_intent(&action.group, &action).unwrap();
    }
    // the recorded keeper disappears before the resumed run
    fs::remove_file(root.join("a.jpg")).unwrap();

    let code = run(&tools_off(&["resolve", path_str(&root)])).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(!root.join(CHECKPOINT_FILE_NAME).exists());
    assert!(root.join("b.jpg").exists());
    assert!(!root.join("c.jpg").exists());

    let code = run(&tools_off(&["resolve", path_str(&root)])).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_no_checkpoint_flag() {
    let dir = with_duplicates();
    let code = run(&tools_off(&["scan", path_str(dir.path()), "--no-checkpoint"])).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(!dir.path().join(CHECKPOINT_FILE_NAME).exists());
}

#[test]
fn test_status_without_and_with_checkpoint() {
    let dir = with_duplicates();
    let code = run(&["status", path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let root = fs::canonicalize(dir.path()).unwrap();
    let cp = Checkpoint::load_or_init(&Checkpoint::default_path(&root), &root).unwrap();
    cp.commit("prehash:x".to_string(), "00".to_string()).unwrap();
    drop(cp);

    let code = run(&["status", path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(root.join(CHECKPOINT_FILE_NAME).exists());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_partial_success() {
    use std::os::unix::fs::PermissionsExt;

    let dir = with_duplicates();
    let locked = dir.path().join("locked.jpg");
    fs::write(&locked, b"cannot read").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // running as root
        return;
    }

    // same size as the locked file so it reaches the hashing stage
    fs::write(dir.path().join("other.jpg"), b"readable!!!").unwrap();
    let code = run(&tools_off(&["scan", path_str(dir.path())])).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let result = run(&tools_off(&["scan", path_str(dir.path()), "--strict"]));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    assert!(result.is_err());
}
