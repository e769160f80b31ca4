//! Builtin defaults mirror the production build this tool replaces.

use kiln_config::{JsxMode, KilnConfig, LintLevel};

#[test]
fn externals_cover_page_provided_globals() {
    let table = KilnConfig::default().effective_externals();
    for (name, global) in [
        ("react", "React"),
        ("react-dom", "ReactDOM"),
        ("react-router-dom", "ReactRouterDOM"),
        ("antd", "antd"),
        ("axios", "axios"),
        ("redux", "Redux"),
        ("react-redux", "ReactRedux"),
        ("bizcharts", "BizCharts"),
        ("jquery", "jQuery"),
    ] {
        assert_eq!(table.get(name).map(String::as_str), Some(global), "{name}");
    }
}

#[test]
fn node_builtins_are_stubbed() {
    let cfg = KilnConfig::default();
    for module in ["dgram", "fs", "net", "tls", "child_process"] {
        assert!(cfg.node.stubs.iter().any(|s| s == module), "{module}");
    }
    assert!(cfg.node.dirname);
}

#[test]
fn worker_defaults() {
    let workers = KilnConfig::default().workers;
    assert_eq!(workers.script_workers, 2);
    assert_eq!(workers.style_workers, 2);
    assert_eq!(workers.parallel_jobs, 50);
    assert_eq!(workers.idle_timeout().as_millis(), 2000);
}

#[test]
fn script_and_asset_defaults() {
    let cfg = KilnConfig::default();
    assert_eq!(cfg.assets.inline_limit, 10_240);
    assert_eq!(cfg.scripts.target, "es2015");
    assert_eq!(cfg.scripts.jsx, JsxMode::Classic);
    assert_eq!(cfg.scripts.lint.get("no-debugger"), Some(&LintLevel::Error));
    assert!(cfg.minify.drop_console && cfg.minify.keep_names);
}

#[test]
fn date_library_locales_are_ignored() {
    let cfg = KilnConfig::default();
    assert_eq!(cfg.ignore.len(), 1);
    assert_eq!(cfg.ignore[0].request, r"^\./locale$");
    assert_eq!(cfg.ignore[0].context.as_deref(), Some("moment$"));
}

#[test]
fn service_worker_defaults() {
    let sw = KilnConfig::default().service_worker;
    assert!(sw.enabled);
    assert_eq!(sw.filename, "service-worker.js");
    assert_eq!(sw.dont_cache_bust, r"\.\w{8}\.");
    assert_eq!(sw.navigate_fallback_denylist, vec![r"^/__".to_string()]);
}
