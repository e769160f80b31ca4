//! Core build configuration types.

mod helpers;
mod output;
mod resolve;
mod scripts;
mod styles;
mod workers;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

pub use output::{AssetConfig, HtmlConfig, ManifestConfig, ServiceWorkerConfig};
pub use resolve::{NodeConfig, ResolveConfig};
pub use scripts::{JsxMode, LintLevel, MinifyConfig, ScriptConfig};
pub use styles::{BrowserTargets, StyleConfig, StyleDialect};
pub use workers::WorkerConfig;

use helpers::{
    builtin_externals, default_copy, default_entries, default_env_prefix, default_html_template,
    default_ignore, default_node_env, default_output_dir, default_public_path, default_root,
    default_source_dir, default_theme_define, default_true,
};

/// Complete configuration for one build invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KilnConfig {
    /// Project root. Every other relative path is resolved against it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directory holding application sources (lint, transform and module scope apply here)
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Public base path; may be an absolute CDN URL
    #[serde(default = "default_public_path")]
    pub public_path: String,

    #[serde(default = "default_html_template")]
    pub html_template: PathBuf,

    /// Empty the output directory before publishing
    #[serde(default = "default_true")]
    pub clean: bool,

    /// Named entry groups, in injection order
    #[serde(default = "default_entries", rename = "entry")]
    pub entries: Vec<EntryGroup>,

    /// Extra externals merged over the builtin table
    #[serde(default)]
    pub externals: BTreeMap<String, String>,

    /// Include the builtin externals table
    #[serde(default = "default_true")]
    pub builtin_externals: bool,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default = "default_ignore")]
    pub ignore: Vec<IgnoreRule>,

    #[serde(default)]
    pub assets: AssetConfig,

    #[serde(default)]
    pub scripts: ScriptConfig,

    #[serde(default)]
    pub styles: StyleConfig,

    #[serde(default)]
    pub theme: ThemeConfig,

    #[serde(default)]
    pub env: EnvConfig,

    /// Raw compile-time replacements (`KEY = "js expression"`)
    #[serde(default)]
    pub define: BTreeMap<String, String>,

    #[serde(default)]
    pub minify: MinifyConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub service_worker: ServiceWorkerConfig,

    #[serde(default = "default_copy")]
    pub copy: Vec<CopyRule>,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            public_path: default_public_path(),
            html_template: default_html_template(),
            clean: true,
            entries: default_entries(),
            externals: BTreeMap::new(),
            builtin_externals: true,
            resolve: ResolveConfig::default(),
            node: NodeConfig::default(),
            ignore: default_ignore(),
            assets: AssetConfig::default(),
            scripts: ScriptConfig::default(),
            styles: StyleConfig::default(),
            theme: ThemeConfig::default(),
            env: EnvConfig::default(),
            define: BTreeMap::new(),
            minify: MinifyConfig::default(),
            workers: WorkerConfig::default(),
            html: HtmlConfig::default(),
            manifest: ManifestConfig::default(),
            service_worker: ServiceWorkerConfig::default(),
            copy: default_copy(),
        }
    }
}

impl KilnConfig {
    /// Configuration rooted at `root` with every other field defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Effective external table: builtin globals (when enabled) overlaid by `externals`.
    pub fn effective_externals(&self) -> BTreeMap<String, String> {
        let mut table = if self.builtin_externals {
            builtin_externals()
        } else {
            BTreeMap::new()
        };
        table.extend(self.externals.iter().map(|(k, v)| (k.clone(), v.clone())));
        table
    }

    pub fn source_path(&self) -> PathBuf {
        self.absolute(&self.source_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.absolute(&self.output_dir)
    }

    pub fn template_path(&self) -> PathBuf {
        self.absolute(&self.html_template)
    }

    /// Resolve a config-relative path against the project root.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.root.join(path).clean()
        }
    }

    /// Public path with exactly one trailing slash (`/`, `https://cdn/app/`).
    pub fn public_path(&self) -> String {
        let trimmed = self.public_path.trim_end_matches('/');
        format!("{trimmed}/")
    }

    /// Public path without the trailing slash; empty for a root path.
    ///
    /// This is the value exposed as `PUBLIC_URL`.
    pub fn public_url(&self) -> String {
        self.public_path.trim_end_matches('/').to_string()
    }
}

/// A named group of modules bundled into one entry artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryGroup {
    pub name: String,
    /// Module requests, relative to the project root or bare package names.
    pub modules: Vec<String>,
}

impl EntryGroup {
    pub fn new(name: impl Into<String>, modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

/// Requests matching `request`, issued from a directory matching `context`,
/// resolve to an empty module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    pub request: String,
    #[serde(default)]
    pub context: Option<String>,
}

/// Directory copied verbatim into the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Theme variable overrides applied to Less/Scss sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Variable name (with or without the `@`/`$` sigil) to value
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Global constant the variables are defined as in scripts
    #[serde(default = "default_theme_define")]
    pub define_as: Option<String>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            variables: BTreeMap::new(),
            define_as: default_theme_define(),
        }
    }
}

/// Client environment exposed as `process.env.*` and `%KEY%` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Process environment variables with this prefix are forwarded
    #[serde(default = "default_env_prefix")]
    pub prefix: Option<String>,

    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default = "default_node_env")]
    pub node_env: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            prefix: default_env_prefix(),
            vars: BTreeMap::new(),
            node_env: default_node_env(),
        }
    }
}
