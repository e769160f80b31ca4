//! Tests for config file discovery and layered loading.

use kiln_config::{ConfigDiscovery, ConfigError, ConfigOverrides, StyleDialect};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn discovers_kiln_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("kiln.toml"),
        r##"
public_path = "https://cdn.example.com/app/"

[[entry]]
name = "main"
modules = ["./src/main.js"]

[[entry]]
name = "admin"
modules = ["./src/admin.js"]

[theme.variables]
"primary-color" = "#1DA57A"
"##,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    let found = discovery.find().unwrap();
    assert_eq!(found.file_name().unwrap(), "kiln.toml");

    let config = discovery.load().unwrap();
    let names: Vec<_> = config.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["main", "admin"]);
    assert_eq!(config.public_url(), "https://cdn.example.com/app");
    assert_eq!(
        config.theme.variables.get("primary-color").map(String::as_str),
        Some("#1DA57A")
    );
    // untouched sections keep their defaults
    assert_eq!(config.styles.dialect_for("less"), Some(StyleDialect::Less));
    assert_eq!(config.workers.parallel_jobs, 50);
    assert_eq!(config.root, dir.path().to_path_buf());
}

#[test]
#[serial]
fn discovers_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "test",
  "kiln": {
    "output_dir": "dist",
    "workers": { "script_workers": 4 }
  }
}"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    assert_eq!(discovery.find().unwrap().file_name().unwrap(), "package.json");

    let config = discovery.load().unwrap();
    assert_eq!(config.output_dir, PathBuf::from("dist"));
    assert_eq!(config.workers.script_workers, 4);
    assert_eq!(config.workers.style_workers, 2);
}

#[test]
#[serial]
fn package_json_without_field_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "plain" }"#).unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    assert!(discovery.find().is_none());
    assert!(matches!(discovery.load(), Err(ConfigError::NotFound)));

    let config = discovery.load_or_default(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.entries[0].name, "index");
}

#[test]
#[serial]
fn toml_syntax_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kiln.toml"), "public_path = [").unwrap();

    let err = ConfigDiscovery::new(dir.path()).without_env().load().unwrap_err();
    match err {
        ConfigError::Parse { path, .. } => assert!(path.ends_with("kiln.toml")),
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
#[serial]
fn environment_overrides_file_and_overrides_win() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kiln.toml"), "public_path = \"/from-file/\"\n").unwrap();

    unsafe {
        std::env::set_var("KILN_PUBLIC_PATH", "/from-env/");
        std::env::set_var("KILN_WORKERS__IDLE_TIMEOUT_MS", "500");
    }

    let discovery = ConfigDiscovery::new(dir.path());
    let config = discovery.load().unwrap();
    assert_eq!(config.public_path, "/from-env/");
    assert_eq!(config.workers.idle_timeout_ms, 500);

    let overrides = ConfigOverrides {
        public_path: Some("/from-cli/".into()),
        output_dir: Some(PathBuf::from("out")),
    };
    let config = discovery.load_with(&overrides).unwrap();
    assert_eq!(config.public_path, "/from-cli/");
    assert_eq!(config.output_dir, PathBuf::from("out"));

    unsafe {
        std::env::remove_var("KILN_PUBLIC_PATH");
        std::env::remove_var("KILN_WORKERS__IDLE_TIMEOUT_MS");
    }
}

#[test]
#[serial]
fn explicit_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let discovery = ConfigDiscovery::new(dir.path()).with_file("custom.toml").without_env();
    assert!(matches!(
        discovery.load_or_default(&ConfigOverrides::default()),
        Err(ConfigError::NotFound)
    ));
}
