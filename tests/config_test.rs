//! Settings loading tests

use std::io::Write;

use assert_matches::assert_matches;
use serial_test::serial;

use ClubHub::{ClubError, Settings};

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clubhub.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[logging]\nlevel = \"warn\"\nformat = \"json\"\n\n[image_host]\nupload_preset = \"gallery\""
    )
    .unwrap();

    std::env::set_var("CLUBHUB__LOGGING__LEVEL", "trace");
    let settings = Settings::from_file(path.to_str().unwrap());
    std::env::remove_var("CLUBHUB__LOGGING__LEVEL");

    let settings = settings.unwrap();
    assert_eq!(settings.logging.level, "trace");
    assert_eq!(settings.logging.format, "json");
    assert_eq!(settings.image_host.upload_preset, "gallery");
    assert!(settings.validate().is_ok());
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::from_file(dir.path().join("absent").to_str().unwrap()).unwrap();
    assert_eq!(settings.store.max_conflict_retries, 5);
    assert_eq!(settings.auth.sign_in_attempts_per_minute, 5);
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut settings = Settings::default();
    settings.store.max_conflict_retries = 0;
    assert_matches!(settings.validate(), Err(ClubError::Config(_)));

    let mut settings = Settings::default();
    settings.auth.endpoint = "not a url".to_string();
    assert_matches!(settings.validate(), Err(ClubError::Config(_)));

    let mut settings = Settings::default();
    settings.database.min_connections = 50;
    assert_matches!(settings.validate(), Err(ClubError::Config(_)));
}
