use mediadupe::collab::{NoProbe, StaticProbe, VideoSignature};
use mediadupe::duplicates::{find_near_duplicates, DuplicateFinder, NearConfig, SkipReason};
use mediadupe::logging::LogOnce;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) {
    fs::write(root.join(name), content).unwrap();
}

fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries: Vec<(String, Vec<u8>)> = fs::read_dir(root)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    entries.sort();
    entries
}

#[test]
fn test_reencoded_clip_is_reported_without_mutation() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"h264 encoding of the clip");
    write(dir.path(), "y.mov", b"hevc encoding, different bytes");
    let before = snapshot(dir.path());

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.unclustered_videos.len(), 2);

    let probe = StaticProbe::new([
        (
            dir.path().join("x.mp4"),
            VideoSignature::with_duration(120.00).codec("h264"),
        ),
        (
            dir.path().join("y.mov"),
            VideoSignature::with_duration(120.02).codec("hevc"),
        ),
    ]);
    let report = find_near_duplicates(
        &outcome.unclustered_videos,
        &probe,
        &NearConfig::default(),
        &LogOnce::new(),
    );

    assert_eq!(report.skipped, None);
    assert_eq!(report.probed, 2);
    assert_eq!(report.candidates.len(), 1);
    let (first, second) = report.candidates[0].paths();
    assert_eq!(first, dir.path().join("x.mp4"));
    assert_eq!(second, dir.path().join("y.mov"));
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_codec_requirement_filters_pairs() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"one");
    write(dir.path(), "y.mov", b"two!");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let probe = StaticProbe::new([
        (
            dir.path().join("x.mp4"),
            VideoSignature::with_duration(60.0).codec("h264"),
        ),
        (
            dir.path().join("y.mov"),
            VideoSignature::with_duration(60.1).codec("hevc"),
        ),
    ]);
    let report = find_near_duplicates(
        &outcome.unclustered_videos,
        &probe,
        &NearConfig::default().with_require_same_codec(true),
        &LogOnce::new(),
    );

    assert!(report.candidates.is_empty());
}

#[test]
fn test_durations_outside_tolerance_do_not_match() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"one");
    write(dir.path(), "y.mp4", b"two!");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let probe = StaticProbe::new([
        (dir.path().join("x.mp4"), VideoSignature::with_duration(10.0)),
        (dir.path().join("y.mp4"), VideoSignature::with_duration(10.5)),
    ]);

    let strict = find_near_duplicates(
        &outcome.unclustered_videos,
        &probe,
        &NearConfig::default().with_tolerance_ms(250),
        &LogOnce::new(),
    );
    assert!(strict.candidates.is_empty());

    let loose = find_near_duplicates(
        &outcome.unclustered_videos,
        &probe,
        &NearConfig::default().with_tolerance_ms(500),
        &LogOnce::new(),
    );
    assert_eq!(loose.candidates.len(), 1);
}

#[test]
fn test_exact_duplicates_are_not_near_candidates() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"same clip");
    write(dir.path(), "copy.mp4", b"same clip");
    write(dir.path(), "y.mov", b"other clip");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.unclustered_videos.len(), 1);
    assert_eq!(outcome.unclustered_videos[0].primary.path, dir.path().join("y.mov"));
}

#[test]
fn test_missing_probe_skips_stage() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"one");
    write(dir.path(), "y.mov", b"two!");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let report = find_near_duplicates(
        &outcome.unclustered_videos,
        &NoProbe,
        &NearConfig::default(),
        &LogOnce::new(),
    );

    assert_eq!(report.skipped, Some(SkipReason::ProbeUnavailable));
    assert_eq!(report.input_videos, 2);
    assert!(report.candidates.is_empty());
}

#[test]
fn test_unprobeable_video_counts_as_failure() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.mp4", b"one");
    write(dir.path(), "y.mov", b"two!");

    let outcome = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let probe = StaticProbe::new([(dir.path().join("x.mp4"), VideoSignature::with_duration(5.0))]);
    let report = find_near_duplicates(
        &outcome.unclustered_videos,
        &probe,
        &NearConfig::default(),
        &LogOnce::new(),
    );

    assert_eq!(report.probed, 1);
    assert_eq!(report.probe_failures, 1);
    assert!(report.candidates.is_empty());
}
