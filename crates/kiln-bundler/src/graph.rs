//! Module graph and its loader.
//!
//! The graph is loaded frontier by frontier: every module discovered in one
//! round is read and transformed in parallel on the script or style pool,
//! then its requests are resolved in sorted order to form the next frontier.
//! Nothing about the result depends on worker timing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{KilnConfig, StyleDialect};
use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::cache::BuildCaches;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::env::ClientEnvironment;
use crate::media::{self, MediaOutput};
use crate::resolver::{ModuleResolver, Resolution, ResolveFailure, display_relative, is_package_path};
use crate::rules::{Category, RuleSet};
use crate::script::skeleton::{EditKind, ExportTarget, ImportBinding};
use crate::script::{self, CompiledScript, Origin, ScriptOptions, ScriptSource, Skeleton};
use crate::style::{self, CompiledStyle, StyleOptions};
use crate::workers::{PoolKind, WorkerPool};
use crate::Result;

const EXTERNAL_PREFIX: &str = "external:";
const STUB_PREFIX: &str = "stub:";
const IGNORED_PREFIX: &str = "ignored:";

/// Identifier of a module in the graph.
///
/// Files are named by their forward-slash path relative to the project root
/// (`src/index.js`, `node_modules/lodash/lodash.js`). Modules with no file
/// behind them use a prefixed virtual id (`external:react`, `stub:fs`,
/// `ignored:./locale`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn from_path(root: &Path, path: &Path) -> Self {
        Self::new(display_relative(root, path))
    }

    pub fn external(request: &str) -> Self {
        Self::new(format!("{EXTERNAL_PREFIX}{request}"))
    }

    pub fn stub(name: &str) -> Self {
        Self::new(format!("{STUB_PREFIX}{name}"))
    }

    pub fn ignored(request: &str) -> Self {
        Self::new(format!("{IGNORED_PREFIX}{request}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ids with no file behind them.
    pub fn is_virtual(&self) -> bool {
        [EXTERNAL_PREFIX, STUB_PREFIX, IGNORED_PREFIX]
            .iter()
            .any(|prefix| self.0.starts_with(prefix))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// How one module refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// `import` / `export ... from`
    Static,
    /// `require("x")`
    Require,
    /// `import("x")`, the target is an async root
    Dynamic,
    /// CSS `@import`
    StyleImport,
    /// CSS `url()`
    StyleUrl,
}

impl EdgeKind {
    /// Edges that load their target together with the importer.
    pub fn is_static(self) -> bool {
        self != EdgeKind::Dynamic
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub request: String,
    pub kind: EdgeKind,
    pub target: ModuleId,
}

/// What a module is, with its transformed content.
#[derive(Debug, Clone)]
pub enum ModuleKind {
    /// Transformed script. `skeleton.requests[i]` is `dependencies[i]`.
    Script {
        code: Arc<String>,
        skeleton: Arc<Skeleton>,
    },
    /// `module.exports = <json>`
    Json { code: Arc<String> },
    /// Normalized CSS with url placeholders. `@import` edges come first in
    /// `dependencies`, followed by one edge per placeholder.
    Style {
        css: Arc<String>,
        dialect: StyleDialect,
        imports: usize,
    },
    Media {
        output: MediaOutput,
        content: Arc<Vec<u8>>,
    },
    /// Global provided by the page
    External { global: String },
    /// Node built-in replaced by an empty object
    Stub,
    /// Request dropped by an ignore rule
    Ignored,
}

impl ModuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::Script { .. } => "script",
            ModuleKind::Json { .. } => "json",
            ModuleKind::Style { .. } => "style",
            ModuleKind::Media { .. } => "media",
            ModuleKind::External { .. } => "external",
            ModuleKind::Stub => "stub",
            ModuleKind::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// File behind the module, `None` for virtual modules
    pub path: Option<PathBuf>,
    pub kind: ModuleKind,
    pub dependencies: Vec<Dependency>,
    /// Source size in bytes
    pub size: usize,
}

impl Module {
    fn virtual_module(id: ModuleId, kind: ModuleKind) -> Self {
        Self {
            id,
            path: None,
            kind,
            dependencies: Vec::new(),
            size: 0,
        }
    }

    /// Packages, externals, stubs and ignored requests. These go to vendors.
    pub fn is_vendor(&self) -> bool {
        match &self.path {
            Some(path) => is_package_path(path),
            None => true,
        }
    }

    pub fn is_style(&self) -> bool {
        matches!(self.kind, ModuleKind::Style { .. })
    }

    /// Modules that execute as part of a script chunk.
    pub fn is_executable(&self) -> bool {
        !self.is_style()
    }

    pub fn static_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.kind.is_static())
    }
}

/// A named entry group and the modules its requests resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub modules: Vec<ModuleId>,
}

/// Every module reachable from the entry groups.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, Module>,
    entries: Vec<EntryPoint>,
}

impl ModuleGraph {
    pub fn get(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Modules in id order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Entry groups in declared order.
    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Targets of every `import()` in the graph, sorted.
    pub fn async_roots(&self) -> Vec<ModuleId> {
        let mut roots: Vec<ModuleId> = self
            .modules
            .values()
            .flat_map(|m| m.dependencies.iter())
            .filter(|d| d.kind == EdgeKind::Dynamic)
            .map(|d| d.target.clone())
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }

    fn insert(&mut self, module: Module) {
        self.modules.insert(module.id.clone(), module);
    }
}

/// Graph plus every diagnostic found while loading it.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub graph: ModuleGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Loads the module graph for one build.
pub struct Loader<'a> {
    resolver: ModuleResolver,
    rules: RuleSet,
    scripts: ScriptOptions,
    styles: StyleOptions,
    entries: &'a [kiln_config::EntryGroup],
    inline_limit: u64,
    workers: &'a WorkerPool,
    caches: &'a BuildCaches,
}

/// Files waiting to be loaded. A file is queued at most once per build.
#[derive(Default)]
struct Frontier {
    pending: BTreeMap<ModuleId, PathBuf>,
    queued: FxHashSet<ModuleId>,
}

impl Frontier {
    fn push(&mut self, id: ModuleId, path: PathBuf) {
        if self.queued.insert(id.clone()) {
            self.pending.insert(id, path);
        }
    }

    fn take(&mut self) -> BTreeMap<ModuleId, PathBuf> {
        std::mem::take(&mut self.pending)
    }
}

struct Job {
    id: ModuleId,
    path: PathBuf,
    category: Category,
}

enum Payload {
    Script(CompiledScript),
    Json(String),
    Style(CompiledStyle, StyleDialect),
    Media(MediaOutput, Vec<u8>),
}

struct Loaded {
    id: ModuleId,
    path: PathBuf,
    /// Text source, kept to locate unresolved requests
    source: Option<Arc<String>>,
    size: usize,
    result: std::result::Result<Payload, Vec<Diagnostic>>,
}

impl<'a> Loader<'a> {
    pub fn new(
        config: &'a KilnConfig,
        env: &ClientEnvironment,
        workers: &'a WorkerPool,
        caches: &'a BuildCaches,
    ) -> Result<Self> {
        Ok(Self {
            resolver: ModuleResolver::new(config)?,
            rules: RuleSet::from_config(&config.styles),
            scripts: ScriptOptions::new(config, env),
            styles: StyleOptions::new(config),
            entries: &config.entries,
            inline_limit: config.assets.inline_limit,
            workers,
            caches,
        })
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn load(&self) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();
        let mut frontier = Frontier::default();

        for group in self.entries {
            let mut modules = Vec::new();
            for request in &group.modules {
                match self.resolver.resolve(request, None) {
                    Ok(resolution) => {
                        let id = self.admit(resolution, &mut outcome.graph, &mut frontier);
                        if !modules.contains(&id) {
                            modules.push(id);
                        }
                    }
                    Err(failure) => outcome.diagnostics.push(
                        Diagnostic::error(
                            DiagnosticKind::Resolve,
                            format!("Entry '{}': {failure}", group.name),
                        )
                        .with_help(failure.help()),
                    ),
                }
            }
            outcome.graph.entries.push(EntryPoint {
                name: group.name.clone(),
                modules,
            });
        }

        let mut round = 0;
        while !frontier.pending.is_empty() {
            round += 1;
            let pending = frontier.take();
            debug!(round, modules = pending.len(), "loading frontier");

            let mut jobs = Vec::with_capacity(pending.len());
            for (id, path) in pending {
                match self.rules.classify(&path) {
                    Some(category) => jobs.push(Job { id, path, category }),
                    None => outcome.diagnostics.push(
                        Diagnostic::error(DiagnosticKind::Rule, format!("No rule matches {id}"))
                            .with_file(id.as_str())
                            .with_help("HTML and other non-asset files cannot be imported."),
                    ),
                }
            }

            for loaded in self.run(jobs)? {
                match loaded.result {
                    Ok(payload) => {
                        let module = self.link(
                            loaded.id,
                            loaded.path,
                            loaded.source,
                            loaded.size,
                            payload,
                            &mut outcome,
                            &mut frontier,
                        );
                        outcome.graph.insert(module);
                    }
                    Err(diagnostics) => outcome.diagnostics.extend(diagnostics),
                }
            }
        }

        let missing = missing_exports(&outcome.graph);
        outcome.diagnostics.extend(missing);
        debug!(modules = outcome.graph.len(), rounds = round, "module graph loaded");
        Ok(outcome)
    }

    /// Transform one frontier. Results come back in id order.
    fn run(&self, jobs: Vec<Job>) -> Result<Vec<Loaded>> {
        let (scripts, rest): (Vec<Job>, Vec<Job>) = jobs
            .into_iter()
            .partition(|job| job.category == Category::Script);
        let (styles, rest): (Vec<Job>, Vec<Job>) = rest
            .into_iter()
            .partition(|job| matches!(job.category, Category::Style(_)));

        let mut loaded = Vec::with_capacity(scripts.len() + styles.len() + rest.len());
        if !scripts.is_empty() {
            let lease = self.workers.lease(PoolKind::Script)?;
            loaded.extend(lease.map(&scripts, |job| self.load_script(job)));
        }
        if !styles.is_empty() {
            let lease = self.workers.lease(PoolKind::Style)?;
            loaded.extend(lease.map(&styles, |job| self.load_style(job)));
        }
        loaded.extend(rest.iter().map(|job| self.load_asset(job)));

        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(loaded)
    }

    fn load_script(&self, job: &Job) -> Loaded {
        let source = match read_text(job) {
            Ok(source) => source,
            Err(diag) => return failed(job, diag),
        };
        let origin = if is_package_path(&job.path) {
            Origin::Package
        } else if job.path.starts_with(self.resolver.source_dir()) {
            Origin::Source
        } else {
            Origin::Local
        };
        let input = ScriptSource {
            id: job.id.as_str(),
            path: &job.path,
            source: Arc::clone(&source),
            origin,
        };
        let result = self
            .caches
            .scripts
            .get_or_try_insert(input.cache_key(&self.scripts), || {
                script::compile(&input, &self.scripts)
            })
            .map(Payload::Script);
        trace!(module = %job.id, ?origin, "script loaded");
        Loaded {
            id: job.id.clone(),
            path: job.path.clone(),
            size: source.len(),
            source: Some(source),
            result,
        }
    }

    fn load_style(&self, job: &Job) -> Loaded {
        let Category::Style(dialect) = job.category else {
            return self.load_asset(job);
        };
        let source = match read_text(job) {
            Ok(source) => source,
            Err(diag) => return failed(job, diag),
        };
        let id = job.id.as_str();
        let result = style::run_preprocessor(id, &job.path, &source, dialect, &self.styles)
            .and_then(|preprocessed| {
                let key = style::cache_key(id, &preprocessed.css, dialect, &self.styles);
                self.caches.styles.get_or_try_insert(key, || {
                    style::compile_preprocessed(id, &source, dialect, preprocessed, &self.styles)
                })
            })
            .map(|compiled| Payload::Style(compiled, dialect));
        Loaded {
            id: job.id.clone(),
            path: job.path.clone(),
            size: source.len(),
            source: Some(source),
            result,
        }
    }

    fn load_asset(&self, job: &Job) -> Loaded {
        if job.category == Category::Json {
            let source = match read_text(job) {
                Ok(source) => source,
                Err(diag) => return failed(job, diag),
            };
            let result = script::json_module(job.id.as_str(), &source)
                .map(Payload::Json)
                .map_err(|diag| vec![diag]);
            return Loaded {
                id: job.id.clone(),
                path: job.path.clone(),
                size: source.len(),
                source: Some(source),
                result,
            };
        }

        match std::fs::read(&job.path) {
            Ok(content) => Loaded {
                id: job.id.clone(),
                path: job.path.clone(),
                source: None,
                size: content.len(),
                result: Ok(Payload::Media(
                    media::process(&job.path, &content, job.category, self.inline_limit),
                    content,
                )),
            },
            Err(err) => failed(job, read_error(job, &err)),
        }
    }

    /// Resolve a loaded module's requests and turn it into a graph node.
    #[allow(clippy::too_many_arguments)]
    fn link(
        &self,
        id: ModuleId,
        path: PathBuf,
        source: Option<Arc<String>>,
        size: usize,
        payload: Payload,
        outcome: &mut LoadOutcome,
        frontier: &mut Frontier,
    ) -> Module {
        let (kind, requests) = match payload {
            Payload::Script(compiled) => {
                outcome.diagnostics.extend(compiled.warnings);
                let requests = compiled
                    .skeleton
                    .requests
                    .iter()
                    .map(|r| {
                        let kind = match r.kind {
                            script::skeleton::RequestKind::Static => EdgeKind::Static,
                            script::skeleton::RequestKind::Require => EdgeKind::Require,
                            script::skeleton::RequestKind::Dynamic => EdgeKind::Dynamic,
                        };
                        (r.specifier.clone(), kind)
                    })
                    .collect::<Vec<_>>();
                let kind = ModuleKind::Script {
                    code: Arc::new(compiled.code),
                    skeleton: Arc::new(compiled.skeleton),
                };
                (kind, requests)
            }
            Payload::Json(code) => (
                ModuleKind::Json {
                    code: Arc::new(code),
                },
                Vec::new(),
            ),
            Payload::Style(compiled, dialect) => {
                let requests = compiled
                    .imports
                    .iter()
                    .map(|r| (r.clone(), EdgeKind::StyleImport))
                    .chain(compiled.urls.iter().map(|r| (r.clone(), EdgeKind::StyleUrl)))
                    .collect::<Vec<_>>();
                let kind = ModuleKind::Style {
                    css: Arc::new(compiled.css),
                    dialect,
                    imports: compiled.imports.len(),
                };
                (kind, requests)
            }
            Payload::Media(output, content) => (
                ModuleKind::Media {
                    output,
                    content: Arc::new(content),
                },
                Vec::new(),
            ),
        };

        let mut dependencies = Vec::with_capacity(requests.len());
        for (request, edge) in requests {
            match self.resolver.resolve(&request, Some(&path)) {
                Ok(resolution) => {
                    let target = self.admit(resolution, &mut outcome.graph, frontier);
                    dependencies.push(Dependency {
                        request,
                        kind: edge,
                        target,
                    });
                }
                Err(failure) => outcome.diagnostics.push(resolve_diagnostic(
                    &id,
                    &request,
                    &failure,
                    source.as_ref(),
                )),
            }
        }

        debug!(module = %id, kind = kind.label(), deps = dependencies.len(), "module linked");
        Module {
            id,
            path: Some(path),
            kind,
            dependencies,
            size,
        }
    }

    /// Id for a resolution. Files not seen yet join the next frontier.
    fn admit(
        &self,
        resolution: Resolution,
        graph: &mut ModuleGraph,
        frontier: &mut Frontier,
    ) -> ModuleId {
        match resolution {
            Resolution::File(path) => {
                let id = ModuleId::from_path(self.resolver.root(), &path);
                frontier.push(id.clone(), path);
                id
            }
            Resolution::External { request, global } => {
                let id = ModuleId::external(&request);
                if !graph.contains(&id) {
                    graph.insert(Module::virtual_module(id.clone(), ModuleKind::External { global }));
                }
                id
            }
            Resolution::Stub(name) => {
                let id = ModuleId::stub(&name);
                if !graph.contains(&id) {
                    graph.insert(Module::virtual_module(id.clone(), ModuleKind::Stub));
                }
                id
            }
            Resolution::Ignored(request) => {
                let id = ModuleId::ignored(&request);
                if !graph.contains(&id) {
                    graph.insert(Module::virtual_module(id.clone(), ModuleKind::Ignored));
                }
                id
            }
        }
    }
}

/// Named and default imports, and named re-exports, of ES modules that the
/// target ES module does not export. CommonJS, JSON and virtual targets can
/// export anything.
fn missing_exports(graph: &ModuleGraph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for module in graph.modules() {
        let ModuleKind::Script { skeleton, .. } = &module.kind else {
            continue;
        };
        // a failed resolution leaves requests and dependencies misaligned
        if !skeleton.is_esm || skeleton.requests.len() != module.dependencies.len() {
            continue;
        }

        let mut wanted: Vec<(usize, &str)> = Vec::new();
        for edit in &skeleton.edits {
            if let EditKind::Import { request, bindings } = &edit.kind {
                for binding in bindings {
                    match binding {
                        ImportBinding::Default(_) => wanted.push((*request, "default")),
                        ImportBinding::Named { imported, .. } => wanted.push((*request, imported)),
                        ImportBinding::Namespace(_) => {}
                    }
                }
            }
        }
        for export in &skeleton.exports {
            if let ExportTarget::Reexport { request, imported } = &export.target {
                if imported != "*" {
                    wanted.push((*request, imported));
                }
            }
        }

        for (request, name) in wanted {
            let Some(dependency) = module.dependencies.get(request) else {
                continue;
            };
            let mut seen = FxHashSet::default();
            if !provides(graph, &dependency.target, name, &mut seen) {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Resolve,
                        format!(
                            "export '{name}' was not found in '{}'",
                            dependency.request
                        ),
                    )
                    .with_file(module.id.as_str())
                    .with_help(format!("Check the exports of {}", dependency.target)),
                );
            }
        }
    }
    diagnostics
}

/// Whether `id` exports `name`, following `export *` chains.
fn provides(graph: &ModuleGraph, id: &ModuleId, name: &str, seen: &mut FxHashSet<ModuleId>) -> bool {
    if !seen.insert(id.clone()) {
        return false;
    }
    let Some(module) = graph.get(id) else {
        return true;
    };
    let ModuleKind::Script { skeleton, .. } = &module.kind else {
        return true;
    };
    if !skeleton.is_esm {
        return true;
    }
    if skeleton.exports.iter().any(|export| export.exported == name) {
        return true;
    }
    // `export *` never forwards the default export
    name != "default"
        && skeleton.star_exports.iter().any(|&request| {
            module
                .dependencies
                .get(request)
                .is_none_or(|dep| provides(graph, &dep.target, name, seen))
        })
}

fn read_text(job: &Job) -> std::result::Result<Arc<String>, Diagnostic> {
    std::fs::read_to_string(&job.path)
        .map(Arc::new)
        .map_err(|err| read_error(job, &err))
}

fn read_error(job: &Job, err: &std::io::Error) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::Transform,
        format!("Cannot read {}: {err}", job.id),
    )
    .with_file(job.id.as_str())
}

fn failed(job: &Job, diag: Diagnostic) -> Loaded {
    Loaded {
        id: job.id.clone(),
        path: job.path.clone(),
        source: None,
        size: 0,
        result: Err(vec![diag]),
    }
}

/// Point the diagnostic at the quoted request in the importer's source.
fn resolve_diagnostic(
    importer: &ModuleId,
    request: &str,
    failure: &ResolveFailure,
    source: Option<&Arc<String>>,
) -> Diagnostic {
    let diag = Diagnostic::error(DiagnosticKind::Resolve, failure.to_string())
        .with_file(importer.as_str())
        .with_help(failure.help());
    let offset = source.and_then(|src| {
        ['"', '\'', '`']
            .iter()
            .find_map(|q| src.find(&format!("{q}{request}{q}")))
            .or_else(|| src.find(request))
            .map(|offset| (src, offset))
    });
    match offset {
        Some((src, offset)) => diag.with_offset(src, offset),
        None => diag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{EntryGroup, WorkerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, KilnConfig) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let root = dir.path().canonicalize().unwrap();
        (dir, KilnConfig::with_root(root))
    }

    fn load(config: &KilnConfig) -> LoadOutcome {
        let env = ClientEnvironment::with_process_vars(config, Vec::new());
        let workers = WorkerPool::new(WorkerConfig::default());
        let caches = BuildCaches::default();
        Loader::new(config, &env, &workers, &caches)
            .unwrap()
            .load()
            .unwrap()
    }

    #[test]
    fn virtual_ids() {
        assert_eq!(ModuleId::external("react").as_str(), "external:react");
        assert!(ModuleId::stub("fs").is_virtual());
        assert!(!ModuleId::new("src/index.js").is_virtual());
        assert_eq!(
            ModuleId::from_path(Path::new("/p"), Path::new("/p/src/a.js")).to_string(),
            "src/a.js"
        );
    }

    #[test]
    fn loads_scripts_styles_and_externals() {
        let (_dir, config) = project(&[
            (
                "src/index.js",
                "import React from 'react';\nimport './app.css';\nimport { add } from './math';\nimport('./lazy').then(m => m.run(add(1, 2)));\n",
            ),
            ("src/math.js", "export const add = (a, b) => a + b;\n"),
            ("src/lazy.js", "export function run(x) { return x; }\n"),
            ("src/app.css", ".app { background: url(./bg.png); }\n"),
            ("src/bg.png", "not really a png"),
        ]);
        let outcome = load(&config);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);

        let graph = outcome.graph;
        let ids: Vec<&str> = graph.modules().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "external:react",
                "src/app.css",
                "src/bg.png",
                "src/index.js",
                "src/lazy.js",
                "src/math.js"
            ]
        );
        assert_eq!(graph.entries()[0].modules, vec![ModuleId::new("src/index.js")]);
        assert_eq!(graph.async_roots(), vec![ModuleId::new("src/lazy.js")]);

        let index = graph.get(&ModuleId::new("src/index.js")).unwrap();
        let kinds: Vec<EdgeKind> = index.dependencies.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::Static, EdgeKind::Static, EdgeKind::Static, EdgeKind::Dynamic]
        );

        let css = graph.get(&ModuleId::new("src/app.css")).unwrap();
        assert_eq!(css.dependencies[0].kind, EdgeKind::StyleUrl);
        assert!(matches!(
            graph.get(&ModuleId::new("src/bg.png")).unwrap().kind,
            ModuleKind::Media {
                output: MediaOutput::Inline(_),
                ..
            }
        ));
    }

    #[test]
    fn unresolved_requests_point_at_the_import() {
        let (_dir, config) = project(&[(
            "src/index.js",
            "import a from './a';\nimport missing from './missing';\nconsole.log(a, missing);\n",
        ), ("src/a.js", "export default 1;\n")]);
        let outcome = load(&config);
        assert_eq!(outcome.diagnostics.len(), 1);
        let diag = &outcome.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::Resolve);
        assert_eq!(diag.file.as_deref(), Some("src/index.js"));
        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.column, Some(21));
    }

    #[test]
    fn imports_of_missing_exports_fail() {
        let (_dir, config) = project(&[
            (
                "src/index.js",
                "import { yes, nope } from './a';\nimport legacy from './legacy';\nimport { anything } from './legacy';\nimport b, { fromC } from './b';\nconsole.log(yes, nope, legacy, anything, b, fromC);\n",
            ),
            ("src/a.js", "export const yes = 1;\n"),
            ("src/b.js", "export default 2;\nexport * from './c';\nexport { gone as renamed } from './a';\n"),
            ("src/c.js", "export const fromC = 3;\nexport default 4;\n"),
            ("src/legacy.js", "module.exports = { anything: 1 };\n"),
        ]);
        let outcome = load(&config);
        let messages: Vec<(&str, Option<&str>)> = outcome
            .diagnostics
            .iter()
            .map(|d| (d.message.as_str(), d.file.as_deref()))
            .collect();
        assert_eq!(
            messages,
            vec![
                ("export 'gone' was not found in './a'", Some("src/b.js")),
                ("export 'nope' was not found in './a'", Some("src/index.js")),
            ]
        );
        assert!(outcome.diagnostics.iter().all(|d| d.kind == DiagnosticKind::Resolve));
    }

    #[test]
    fn star_export_cycles_terminate() {
        let (_dir, config) = project(&[
            ("src/index.js", "import { x } from './a';\nconsole.log(x);\n"),
            ("src/a.js", "export * from './b';\n"),
            ("src/b.js", "export * from './a';\nexport const x = 1;\n"),
        ]);
        let outcome = load(&config);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    }

    #[test]
    fn html_imports_have_no_rule() {
        let (_dir, config) = project(&[
            ("src/index.js", "import page from './page.html';\nconsole.log(page);\n"),
            ("src/page.html", "<p>hi</p>"),
        ]);
        let outcome = load(&config);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Rule);
    }

    #[test]
    fn entry_groups_keep_declared_order() {
        let (_dir, mut config) = project(&[
            ("src/b.js", "export default 'b';\n"),
            ("src/a.js", "export default 'a';\n"),
        ]);
        config.entries = vec![
            EntryGroup::new("second", ["./src/b.js"]),
            EntryGroup::new("first", ["./src/a.js", "./src/b.js"]),
        ];
        let outcome = load(&config);
        let names: Vec<&str> = outcome.graph.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(outcome.graph.entries()[1].modules.len(), 2);
    }

    #[test]
    fn second_load_hits_the_cache() {
        let (_dir, config) = project(&[("src/index.js", "export const x = 1;\n")]);
        let env = ClientEnvironment::with_process_vars(&config, Vec::new());
        let workers = WorkerPool::new(WorkerConfig::default());
        let caches = BuildCaches::default();
        let loader = Loader::new(&config, &env, &workers, &caches).unwrap();
        loader.load().unwrap();
        loader.load().unwrap();
        let stats = caches.scripts.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
    }
}
