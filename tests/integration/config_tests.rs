use figment::providers::Serialized;
use figment::Figment;
use mediadupe::collab::{TimeZoneMode, ToolMode};
use mediadupe::config::{Config, ConfigError, ConfigOverrides};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Figment directly, so environment variables from other tests don't leak in
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.probe, ToolMode::Auto);
    assert_eq!(config.timezone, TimeZoneMode::Original);
}

#[test]
fn test_config_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
prehash_bytes = 1048576
recursive = false
probe = "disabled"
metadata = "disabled"
metadata_batch_size = 10
timezone = "utc"
exiftool_path = "/opt/exiftool/exiftool"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path), &ConfigOverrides::default()).unwrap();
    assert_eq!(config.prehash_bytes, 1_048_576);
    assert!(!config.recursive);
    assert_eq!(config.probe, ToolMode::Disabled);
    assert_eq!(config.metadata, ToolMode::Disabled);
    assert_eq!(config.metadata_batch_size, 10);
    assert_eq!(config.timezone, TimeZoneMode::Utc);
    assert_eq!(
        config.exiftool_path.as_deref(),
        Some(std::path::Path::new("/opt/exiftool/exiftool"))
    );
}

#[test]
fn test_config_env_then_overrides() {
    std::env::set_var("MEDIADUPE_DURATION_TOLERANCE_MS", "900");
    std::env::set_var("MEDIADUPE_REQUIRE_SAME_CODEC", "true");

    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "duration_tolerance_ms = 100\nrequire_same_codec = false\n").unwrap();

    let from_env = Config::load(Some(&path), &ConfigOverrides::default());
    let overridden = Config::load(
        Some(&path),
        &ConfigOverrides {
            duration_tolerance_ms: Some(50),
            ..Default::default()
        },
    );

    std::env::remove_var("MEDIADUPE_DURATION_TOLERANCE_MS");
    std::env::remove_var("MEDIADUPE_REQUIRE_SAME_CODEC");

    let from_env = from_env.unwrap();
    assert_eq!(from_env.duration_tolerance_ms, 900);
    assert!(from_env.require_same_codec);

    let overridden = overridden.unwrap();
    assert_eq!(overridden.duration_tolerance_ms, 50);
    assert!(overridden.require_same_codec);
}

#[test]
fn test_config_invalid_values_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    fs::write(&path, "metadata_batch_size = 0\n").unwrap();
    let result = Config::load(Some(&path), &ConfigOverrides::default());
    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            key: "metadata_batch_size",
            ..
        })
    ));

    fs::write(&path, "prehash_bytes = \"lots\"\n").unwrap();
    let result = Config::load(Some(&path), &ConfigOverrides::default());
    assert!(matches!(result, Err(ConfigError::Load(_))));

    fs::write(&path, "probe = \"sometimes\"\n").unwrap();
    assert!(Config::load(Some(&path), &ConfigOverrides::default()).is_err());
}

#[test]
fn test_override_zero_threads_rejected() {
    let overrides = ConfigOverrides {
        io_threads: Some(0),
        ..Default::default()
    };
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    fs::write(&path, "").unwrap();

    let result = Config::load(Some(&path), &overrides);
    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            key: "io_threads",
            ..
        })
    ));
}
