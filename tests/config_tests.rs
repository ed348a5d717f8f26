use std::io::Write;

use binary_log_packer::{
    find_component, register_component, Component, ConfigError, Level, LevelDirectives,
    LEVELS_ENV_VAR,
};
use tempfile::NamedTempFile;

static INGEST: Component = Component::new("config_tests::ingest", Level::Basic);
static EXPORT: Component = Component::new("config_tests::export", Level::Basic);
static FROM_FILE: Component = Component::new("config_tests::from_file", Level::Basic);
static FROM_ENV: Component = Component::new("config_tests::from_env", Level::Basic);

#[test]
fn test_apply_sets_matching_components() {
    register_component(&INGEST);
    register_component(&EXPORT);

    let directives: LevelDirectives = "config_tests::ingest=trace,config_tests::export=none,missing=debug"
        .parse()
        .unwrap();
    let unmatched = directives.apply();

    assert_eq!(unmatched, ["missing"]);
    assert_eq!(INGEST.level(), Level::Trace);
    assert!(INGEST.is_logging(Level::Trace));
    assert_eq!(EXPORT.level(), Level::None);
    assert!(!EXPORT.is_logging(Level::Basic));
    assert!(find_component("missing").is_none());
}

#[test]
fn test_directives_from_file() {
    register_component(&FROM_FILE);

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# levels for the test run").unwrap();
    writeln!(file, "config_tests::from_file=detail  # raised while debugging").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "config_tests::from_file=debug").unwrap();

    let directives = LevelDirectives::from_file(file.path()).unwrap();
    assert_eq!(directives.level_for("config_tests::from_file"), Some(Level::Debug));
    assert!(directives.apply().is_empty());
    assert_eq!(FROM_FILE.level(), Level::Debug);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.levels");

    let err = LevelDirectives::from_file(&path).unwrap_err();
    match &err {
        ConfigError::Io { path: reported, .. } => assert!(reported.ends_with("absent.levels")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("absent.levels"));
}

#[test]
fn test_bad_file_contents() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "config_tests::from_file=chatty").unwrap();

    let err = LevelDirectives::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownLevel(ref name) if name == "chatty"));
    assert_eq!(err.to_string(), "unknown log level `chatty`");
}

#[test]
fn test_directives_from_env() {
    register_component(&FROM_ENV);

    std::env::set_var(LEVELS_ENV_VAR, "config_tests::from_env=insane");
    let directives = LevelDirectives::from_env().unwrap().unwrap();
    std::env::remove_var(LEVELS_ENV_VAR);

    directives.apply();
    assert_eq!(FROM_ENV.level(), Level::Insane);
    assert!(LevelDirectives::from_env().unwrap().is_none());
}
