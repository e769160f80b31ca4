//! Shared fixtures and assertions for kiln-bundler integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_bundler::{Artifact, ArtifactKind, BuildOutput, Bundler, ClientEnvironment};
use kiln_config::KilnConfig;
use tempfile::TempDir;

pub const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>%APP_TITLE%</title>
    <link rel="icon" href="%PUBLIC_URL%/favicon.ico">
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#;

/// A throwaway project directory with a default HTML template.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        project.write("public/index.html", TEMPLATE);
        project
    }

    pub fn with(self, path: &str, content: &str) -> Self {
        self.write(path, content);
        self
    }

    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) {
        let full = self.dir.path().join(path);
        fs::create_dir_all(full.parent().expect("parent")).expect("create dirs");
        fs::write(full, content).expect("write fixture");
    }

    /// `node_modules/<name>` with a `main` file.
    pub fn package(self, name: &str, source: &str) -> Self {
        self.write(
            &format!("node_modules/{name}/package.json"),
            format!(r#"{{"name": "{name}", "version": "1.0.0", "main": "index.js"}}"#),
        );
        self.write(&format!("node_modules/{name}/index.js"), source);
        self
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn config(&self) -> KilnConfig {
        let mut config = KilnConfig::with_root(self.root());
        config.env.vars.insert("APP_TITLE".to_string(), "Kiln".to_string());
        config
    }

    /// Bundler isolated from the test process environment.
    pub fn bundler(&self, config: KilnConfig) -> Bundler {
        let env = ClientEnvironment::with_process_vars(&config, Vec::new());
        Bundler::with_environment(config, env).expect("valid config")
    }

    pub fn build(&self) -> BuildOutput {
        self.build_with(self.config())
    }

    pub fn build_with(&self, config: KilnConfig) -> BuildOutput {
        self.bundler(config).build_in_memory().expect("build succeeds")
    }
}

pub fn paths(output: &BuildOutput) -> BTreeSet<String> {
    output.iter().map(|a| a.path.clone()).collect()
}

/// Paths present in only one output, or present in both with different bytes.
pub fn changed_paths(a: &BuildOutput, b: &BuildOutput) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = paths(a).symmetric_difference(&paths(b)).cloned().collect();
    for artifact in a.iter() {
        if let Some(other) = b.get(&artifact.path) {
            if other.content != artifact.content {
                changed.insert(artifact.path.clone());
            }
        }
    }
    changed
}

/// The single artifact whose manifest key is `logical`.
pub fn by_logical<'a>(output: &'a BuildOutput, logical: &str) -> &'a Artifact {
    output
        .iter()
        .find(|a| a.logical.as_deref() == Some(logical))
        .unwrap_or_else(|| panic!("no artifact for {logical}; have {:?}", paths(output)))
}

pub fn of_kind(output: &BuildOutput, kind: ArtifactKind) -> Vec<&Artifact> {
    output.of_kind(kind).collect()
}

pub fn assert_no_artifact_contains(output: &BuildOutput, needle: &str) {
    for artifact in output.iter() {
        assert!(
            !artifact.text().contains(needle),
            "{} unexpectedly contains '{needle}'",
            artifact.path
        );
    }
}

pub fn assert_fingerprinted(path: &str) {
    let name = Path::new(path).file_name().unwrap().to_string_lossy().into_owned();
    let fingerprinted = name.split('.').skip(1).any(|segment| {
        segment.len() == kiln_bundler::hash::FINGERPRINT_LEN
            && segment.chars().all(|c| c.is_ascii_hexdigit())
    });
    assert!(fingerprinted, "{path} should carry an 8-character fingerprint");
}
