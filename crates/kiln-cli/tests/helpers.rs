//! Shared fixtures for the CLI integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Kiln app</title></head>
  <body><div id="root"></div></body>
</html>
"#;

/// A minimal application: one entry, one stylesheet, the HTML template.
pub struct App {
    pub dir: TempDir,
}

impl App {
    pub fn new() -> Self {
        let app = Self {
            dir: TempDir::new().expect("temp dir"),
        };
        app.write("public/index.html", TEMPLATE);
        app.write("src/index.css", "body { margin: 0; }\n");
        app.write(
            "src/index.js",
            "import './index.css';\nimport { greet } from './greet';\ndocument.title = greet('kiln');\n",
        );
        app.write("src/greet.js", "export function greet(name) { return 'hello ' + name; }\n");
        app
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(path, content).expect("write fixture");
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// `kiln <args> --root <app>` with colors and CI detection pinned.
    pub fn kiln(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("kiln").expect("kiln binary");
        cmd.args(args)
            .arg("--root")
            .arg(self.root())
            .env("NO_COLOR", "1")
            .env("CI", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}
