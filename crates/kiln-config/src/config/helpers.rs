use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{CopyRule, EntryGroup, IgnoreRule, LintLevel, StyleDialect};

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_root() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

pub(crate) fn default_public_path() -> String {
    "/".to_string()
}

pub(crate) fn default_html_template() -> PathBuf {
    PathBuf::from("public/index.html")
}

pub(crate) fn default_entries() -> Vec<EntryGroup> {
    vec![EntryGroup {
        name: "index".to_string(),
        modules: vec!["./src/index.js".to_string()],
    }]
}

/// Globals every build treats as provided by the page.
pub(crate) fn builtin_externals() -> BTreeMap<String, String> {
    [
        ("axios", "axios"),
        ("react", "React"),
        ("react-dom", "ReactDOM"),
        ("react-router", "ReactRouter"),
        ("react-router-dom", "ReactRouterDOM"),
        ("antd", "antd"),
        ("moment", "moment"),
        ("moment-duration-format", "moment-duration-format"),
        ("ant-design-icons", "ant-design-icons"),
        ("redux", "Redux"),
        ("react-redux", "ReactRedux"),
        ("bizcharts", "BizCharts"),
        ("html2canvas", "html2canvas"),
        ("jquery", "jQuery"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub(crate) fn default_extensions() -> Vec<String> {
    [".web.js", ".js", ".json", ".web.jsx", ".jsx", ".mjs", ".ts", ".tsx"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_modules() -> Vec<String> {
    vec!["node_modules".to_string()]
}

pub(crate) fn default_main_fields() -> Vec<String> {
    ["browser", "module", "main"].into_iter().map(String::from).collect()
}

pub(crate) fn default_condition_names() -> Vec<String> {
    ["browser", "import", "require", "default"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_node_stubs() -> Vec<String> {
    ["dgram", "fs", "net", "tls", "child_process"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_ignore() -> Vec<IgnoreRule> {
    vec![IgnoreRule {
        request: r"^\./locale$".to_string(),
        context: Some("moment$".to_string()),
    }]
}

pub(crate) fn default_inline_limit() -> u64 {
    10 * 1024
}

pub(crate) fn default_script_target() -> String {
    "es2015".to_string()
}

pub(crate) fn default_lint() -> BTreeMap<String, LintLevel> {
    [
        ("no-debugger", LintLevel::Error),
        ("no-dupe-keys", LintLevel::Error),
        ("no-with", LintLevel::Error),
        ("no-unused-labels", LintLevel::Warn),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub(crate) fn default_dialects() -> BTreeMap<String, StyleDialect> {
    [
        ("css", StyleDialect::Css),
        ("less", StyleDialect::Less),
        ("scss", StyleDialect::Scss),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub(crate) fn default_theme_define() -> Option<String> {
    Some("THEMES".to_string())
}

pub(crate) fn default_env_prefix() -> Option<String> {
    Some("APP_".to_string())
}

pub(crate) fn default_node_env() -> String {
    "production".to_string()
}

pub(crate) fn default_workers() -> usize {
    2
}

pub(crate) fn default_parallel_jobs() -> usize {
    50
}

pub(crate) fn default_idle_timeout_ms() -> u64 {
    2000
}

pub(crate) fn default_pool_name() -> String {
    "kiln-pool".to_string()
}

pub(crate) fn default_manifest_filename() -> String {
    "asset-manifest.json".to_string()
}

pub(crate) fn default_sw_filename() -> String {
    "service-worker.js".to_string()
}

pub(crate) fn default_cache_id() -> String {
    "kiln".to_string()
}

pub(crate) fn default_dont_cache_bust() -> String {
    r"\.\w{8}\.".to_string()
}

pub(crate) fn default_fallback_denylist() -> Vec<String> {
    vec![r"^/__".to_string()]
}

pub(crate) fn default_sw_exclude() -> Vec<String> {
    vec![r"\.map$".to_string()]
}

pub(crate) fn default_copy() -> Vec<CopyRule> {
    vec![CopyRule {
        from: PathBuf::from("src/publicMedia"),
        to: PathBuf::from("static/publicMedia"),
    }]
}
