//! Publishing builds to disk.

mod helpers;

use std::fs;

use helpers::*;

#[tokio::test]
async fn build_writes_every_reported_artifact() {
    let project = Project::new()
        .with("src/index.js", "import './app.css';\nwindow.x = 1;\n")
        .with("src/app.css", "body { margin: 0; }\n");
    let bundler = project.bundler(project.config());

    let report = bundler.build().await.unwrap();
    let build = project.path("build");
    for artifact in &report.artifacts {
        let on_disk = fs::metadata(build.join(&artifact.path)).unwrap();
        assert_eq!(on_disk.len(), artifact.size, "{}", artifact.path);
    }
    assert!(report.module_count >= 2);
    let stages: Vec<&str> = report.timings.iter().map(|t| t.stage.as_str()).collect();
    assert_eq!(stages.first(), Some(&"load"));
    assert_eq!(stages.last(), Some(&"publish"));
}

#[test]
fn failed_build_keeps_previous_output() {
    let project = Project::new().with("src/index.js", "window.x = 1;\n");
    let bundler = project.bundler(project.config());
    bundler.build_blocking().unwrap();
    let html = fs::read_to_string(project.path("build/index.html")).unwrap();

    project.write("src/index.js", "window.x = ;\n");
    let rebuilt = project.bundler(project.config());
    assert!(rebuilt.build_blocking().is_err());
    assert_eq!(fs::read_to_string(project.path("build/index.html")).unwrap(), html);
}

#[test]
fn clean_removes_stale_files() {
    let project = Project::new().with("src/index.js", "window.x = 1;\n");
    project.write("build/stale.txt", "old");

    let mut config = project.config();
    config.clean = false;
    project.bundler(config.clone()).build_blocking().unwrap();
    assert!(project.path("build/stale.txt").exists());

    config.clean = true;
    project.bundler(config).build_blocking().unwrap();
    assert!(!project.path("build/stale.txt").exists());
    assert!(project.path("build/index.html").exists());
}

#[test]
fn check_writes_nothing() {
    let project = Project::new()
        .with("src/index.js", "import { v } from './v';\nwindow.v = v;\n")
        .with("src/v.js", "export const v = 1;\n");
    let report = project.bundler(project.config()).check().unwrap();
    assert_eq!(report.module_count, 2);
    assert!(!project.path("build").exists());
}
