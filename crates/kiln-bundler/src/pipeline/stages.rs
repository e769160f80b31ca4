//! The standard build stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use tracing::{debug, info};
use walkdir::WalkDir;

use kiln_config::KilnConfig;

use super::{BuildContext, BuildState, Stage, StageOutput};
use crate::chunk::{Chunk, ChunkKind, ChunkPlan};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::graph::{Dependency, Loader, ModuleGraph, ModuleKind};
use crate::hash::NameTemplate;
use crate::html::{self, HtmlMinifyOptions, PageAssets};
use crate::manifest::AssetManifest;
use crate::media::MediaOutput;
use crate::output::{Artifact, ArtifactKind};
use crate::render::{self, RenderContext};
use crate::runtime;
use crate::script::{ScriptMinifyOptions, minify_script};
use crate::service_worker::{self, ServiceWorkerOptions};
use crate::style::{self, fill_urls, minify_css};
use crate::{Error, Result};

/// Minifier settings for chunks and inline scripts.
pub fn script_minify_options(config: &KilnConfig) -> ScriptMinifyOptions {
    ScriptMinifyOptions {
        drop_console: config.minify.drop_console,
        keep_names: config.minify.keep_names,
        target: config.scripts.target.clone(),
    }
}

/// Resolve entries, transform every reachable module.
pub struct LoadStage;

impl Stage for LoadStage {
    fn name(&self) -> &'static str {
        "load"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let loader = Loader::new(context.config, context.env, context.workers, context.caches)?;
        let outcome = loader.load()?;
        for module in outcome.graph.modules() {
            debug!(
                id = %module.id,
                kind = module.kind.label(),
                dependencies = module.dependencies.len(),
                "module"
            );
        }
        let scripts = context.caches.scripts.stats();
        debug!(hits = scripts.hits, misses = scripts.misses, "script cache");
        info!(modules = outcome.graph.len(), "module graph loaded");
        state.graph = outcome.graph;
        Ok(StageOutput::with_diagnostics(outcome.diagnostics))
    }
}

/// Assign modules to chunks.
pub struct ChunkStage;

impl Stage for ChunkStage {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn run(&self, _context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        state.plan = ChunkPlan::build(&state.graph);
        for chunk in state.plan.chunks() {
            debug!(
                chunk = %chunk.name,
                kind = ?chunk.kind,
                styles = chunk.styles.len(),
                modules = %render::describe(chunk),
                "chunk"
            );
        }
        Ok(StageOutput::empty())
    }
}

/// Emit media files that were not inlined.
pub struct MediaStage;

impl Stage for MediaStage {
    fn name(&self) -> &'static str {
        "media"
    }

    fn run(&self, _context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let mut seen = BTreeSet::new();
        let mut output = StageOutput::empty();
        for module in state.graph.modules() {
            let ModuleKind::Media {
                output: MediaOutput::Emitted { path, logical },
                content,
            } = &module.kind
            else {
                continue;
            };
            if seen.insert(path.clone()) {
                output.artifacts.push(Artifact::shared(
                    path.clone(),
                    Some(logical.clone()),
                    ArtifactKind::Media,
                    content.clone(),
                ));
            }
        }
        Ok(output)
    }
}

fn url_of(graph: &ModuleGraph, dependency: &Dependency, public_path: &str) -> String {
    match graph.get(&dependency.target).map(|m| &m.kind) {
        Some(ModuleKind::Media { output, .. }) => output.url(public_path),
        _ => dependency.request.clone(),
    }
}

/// Concatenate each chunk's style modules into one stylesheet.
pub struct StyleStage;

impl StyleStage {
    fn chunk_css(graph: &ModuleGraph, chunk: &Chunk, public_path: &str) -> String {
        let mut css = String::new();
        for id in &chunk.styles {
            let Some(module) = graph.get(id) else { continue };
            let ModuleKind::Style { css: text, imports, .. } = &module.kind else {
                continue;
            };
            let urls: Vec<String> = module
                .dependencies
                .iter()
                .skip(*imports)
                .map(|dep| url_of(graph, dep, public_path))
                .collect();
            css.push_str(&fill_urls(text, &urls));
            if !css.ends_with('\n') {
                css.push('\n');
            }
        }
        css
    }
}

impl Stage for StyleStage {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let BuildState {
            graph,
            plan,
            chunk_files,
            ..
        } = state;
        let targets = style::lightningcss_targets(&context.config.styles.targets);
        let mut output = StageOutput::empty();

        for chunk in plan.chunks().iter().filter(|c| !c.styles.is_empty()) {
            let mut css = Self::chunk_css(graph, chunk, &context.public_path);
            if context.config.minify.enabled {
                match minify_css(&css, &targets) {
                    Ok(minified) => css = minified,
                    Err(message) => {
                        output.diagnostics.push(
                            Diagnostic::error(
                                DiagnosticKind::Style,
                                format!("Minifying styles of chunk '{}' failed: {message}", chunk.name),
                            )
                            .with_file(format!("{}.css", chunk.name)),
                        );
                        continue;
                    }
                }
            }

            let path = NameTemplate::Style.render(&chunk.name, css.as_bytes(), "");
            chunk_files.entry(chunk.name.clone()).or_default().style = Some(path.clone());
            output.artifacts.push(Artifact::new(
                path,
                Some(format!("{}.css", chunk.name)),
                ArtifactKind::Style,
                css,
            ));
        }
        Ok(output)
    }
}

/// Render script chunks. Async chunks go first because the runtime in
/// vendors embeds their file names.
pub struct ScriptStage;

impl ScriptStage {
    fn finish(
        source: String,
        chunk: &Chunk,
        minify: Option<&ScriptMinifyOptions>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        let Some(options) = minify else {
            return Some(source);
        };
        match minify_script(&source, options) {
            Ok(code) => Some(code),
            Err(message) => {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Transform,
                        format!("Minifying chunk '{}' failed: {message}", chunk.name),
                    )
                    .with_file(format!("{}.js", chunk.name)),
                );
                None
            }
        }
    }
}

impl Stage for ScriptStage {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let BuildState {
            graph,
            plan,
            chunk_files,
            ..
        } = state;
        let renderer = RenderContext {
            graph,
            plan,
            public_path: &context.public_path,
        };
        let minify = context
            .config
            .minify
            .enabled
            .then(|| script_minify_options(context.config));
        let mut output = StageOutput::empty();

        let mut async_scripts = BTreeMap::new();
        let mut async_styles = BTreeMap::new();
        for chunk in plan.async_chunks() {
            if let Some(style) = chunk_files.get(&chunk.name).and_then(|f| f.style.clone()) {
                async_styles.insert(chunk.name.clone(), style);
            }
            if chunk.modules.is_empty() {
                continue;
            }
            let source = renderer.chunk_source(chunk);
            let Some(code) = Self::finish(source, chunk, minify.as_ref(), &mut output.diagnostics)
            else {
                continue;
            };
            let path = NameTemplate::AsyncChunk.render(&chunk.name, code.as_bytes(), "");
            async_scripts.insert(chunk.name.clone(), path.clone());
            output.artifacts.push(Artifact::new(
                path,
                Some(format!("{}.js", chunk.name)),
                ArtifactKind::AsyncScript,
                code,
            ));
        }

        for chunk in plan.initial_chunks() {
            let source = if chunk.kind == ChunkKind::Vendors {
                let mut source = runtime::render(&context.public_path, &async_scripts, &async_styles);
                source.push_str(&renderer.chunk_source(chunk));
                source
            } else if chunk.modules.is_empty() && chunk.entry.is_empty() {
                continue;
            } else {
                renderer.chunk_source(chunk)
            };
            let Some(code) = Self::finish(source, chunk, minify.as_ref(), &mut output.diagnostics)
            else {
                continue;
            };
            let path = NameTemplate::Script.render(&chunk.name, code.as_bytes(), "");
            debug!(chunk = %chunk.name, path = %path, "script chunk");
            output.artifacts.push(Artifact::new(
                path,
                Some(format!("{}.js", chunk.name)),
                ArtifactKind::Script,
                code,
            ));
        }

        for artifact in &output.artifacts {
            if let Some(name) = artifact.logical.as_deref().and_then(|l| l.strip_suffix(".js")) {
                chunk_files.entry(name.to_string()).or_default().script = Some(artifact.path.clone());
            }
        }
        Ok(output)
    }
}

/// Copy configured directories unmodified. Every file is copied, scripts
/// and JSON included.
pub struct CopyStage;

impl Stage for CopyStage {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn run(&self, context: &BuildContext<'_>, _state: &mut BuildState) -> Result<StageOutput> {
        let mut output = StageOutput::empty();
        for rule in &context.config.copy {
            let from = context.config.absolute(&rule.from);
            if !from.is_dir() {
                debug!(from = %from.display(), "copy source missing, skipped");
                continue;
            }

            for entry in WalkDir::new(&from).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    Error::io(format!("Failed to read '{}'", from.display()), e.into())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&from) else {
                    continue;
                };
                let target = rule.to.join(relative).to_string_lossy().replace('\\', "/");
                let content = fs::read(entry.path()).map_err(|e| {
                    Error::io(format!("Failed to read '{}'", entry.path().display()), e)
                })?;
                output.artifacts.push(Artifact::new(
                    target.clone(),
                    Some(target),
                    ArtifactKind::Copied,
                    content,
                ));
            }
        }
        Ok(output)
    }
}

/// Produce `index.html` from the template.
pub struct HtmlStage;

impl HtmlStage {
    fn assets(context: &BuildContext<'_>, state: &BuildState) -> PageAssets {
        let mut assets = PageAssets::default();
        for chunk in state.plan.initial_chunks() {
            let Some(files) = state.chunk_files.get(&chunk.name) else {
                continue;
            };
            if let Some(style) = &files.style {
                assets.styles.push(format!("{}{style}", context.public_path));
            }
            if let Some(script) = &files.script {
                assets.scripts.push(format!("{}{script}", context.public_path));
            }
        }
        assets
    }
}

impl Stage for HtmlStage {
    fn name(&self) -> &'static str {
        "html"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let config = context.config;
        let template_path = config.template_path();
        let template = fs::read_to_string(&template_path).map_err(|e| {
            Error::io(
                format!("Failed to read HTML template '{}'", template_path.display()),
                e,
            )
        })?;

        let mut document = context.env.interpolate(&template);
        if config.html.inject {
            document = html::inject(&document, &Self::assets(context, state));
        }
        if config.html.minify {
            let options = HtmlMinifyOptions {
                scripts: config.minify.enabled.then(|| script_minify_options(config)),
                styles: Some(style::lightningcss_targets(&config.styles.targets)),
            };
            document = html::minify(&document, &options);
        }

        Ok(StageOutput {
            artifacts: vec![Artifact::new(
                "index.html",
                Some("index.html".to_string()),
                ArtifactKind::Html,
                document,
            )],
            diagnostics: Vec::new(),
        })
    }
}

/// Write the asset manifest once every other file name is final.
pub struct ManifestStage;

impl Stage for ManifestStage {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        let manifest = AssetManifest::from_artifacts(&state.artifacts, &context.public_path);
        debug!(entries = manifest.len(), "asset manifest");
        Ok(StageOutput {
            artifacts: vec![Artifact::new(
                context.config.manifest.filename.clone(),
                None,
                ArtifactKind::Manifest,
                manifest.to_json(),
            )],
            diagnostics: Vec::new(),
        })
    }
}

/// Generate the offline-cache service worker, last of all.
pub struct ServiceWorkerStage;

impl Stage for ServiceWorkerStage {
    fn name(&self) -> &'static str {
        "service-worker"
    }

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput> {
        if !context.config.service_worker.enabled {
            return Ok(StageOutput::empty());
        }
        let options = ServiceWorkerOptions::new(context.config)?;
        let entries = service_worker::precache_entries(&state.artifacts, &options);
        debug!(entries = entries.len(), "precache list");
        let source = service_worker::render(&entries, &options)?;
        Ok(StageOutput {
            artifacts: vec![Artifact::new(
                options.filename.clone(),
                None,
                ArtifactKind::ServiceWorker,
                source,
            )],
            diagnostics: Vec::new(),
        })
    }
}
