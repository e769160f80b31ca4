//! Build driver: an ordered list of named stages.
//!
//! Stages run strictly in order. Each one reads the shared [`BuildContext`],
//! may update the [`BuildState`] (the graph and chunk plan live there) and
//! returns the artifacts it added plus any diagnostics. The driver stops at
//! the first stage that reports an error, before any later stage runs.

pub mod stages;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use kiln_config::KilnConfig;

use crate::cache::BuildCaches;
use crate::chunk::ChunkPlan;
use crate::diagnostics::{Diagnostic, has_errors};
use crate::env::ClientEnvironment;
use crate::graph::ModuleGraph;
use crate::output::{Artifact, ArtifactSummary, BuildOutput};
use crate::workers::WorkerPool;
use crate::{Error, Result};

/// Read-only inputs shared by every stage.
pub struct BuildContext<'a> {
    pub config: &'a KilnConfig,
    pub env: &'a ClientEnvironment,
    pub workers: &'a WorkerPool,
    pub caches: &'a BuildCaches,
    /// Public path with a trailing slash
    pub public_path: String,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a KilnConfig,
        env: &'a ClientEnvironment,
        workers: &'a WorkerPool,
        caches: &'a BuildCaches,
    ) -> Self {
        Self {
            config,
            env,
            workers,
            caches,
            public_path: config.public_path(),
        }
    }
}

/// Output files of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFiles {
    pub script: Option<String>,
    pub style: Option<String>,
}

/// State threaded through the stages of one build.
#[derive(Debug, Default)]
pub struct BuildState {
    pub graph: ModuleGraph,
    pub plan: ChunkPlan,
    /// Chunk name to its emitted files
    pub chunk_files: BTreeMap<String, ChunkFiles>,
    /// Every artifact added so far, in stage order
    pub artifacts: Vec<Artifact>,
}

/// What a stage contributes.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl StageOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            artifacts: Vec::new(),
            diagnostics,
        }
    }
}

/// One named step of the build.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, context: &BuildContext<'_>, state: &mut BuildState) -> Result<StageOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed: Duration,
}

/// Progress notifications for front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent<'a> {
    Started {
        name: &'a str,
        index: usize,
        total: usize,
    },
    Finished {
        name: &'a str,
        elapsed: Duration,
    },
}

pub type ProgressCallback = Arc<dyn Fn(StageEvent<'_>) + Send + Sync>;

/// Summary of a finished build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Artifacts in path order
    pub artifacts: Vec<ArtifactSummary>,
    pub module_count: usize,
    pub timings: Vec<StageTiming>,
    #[serde(skip)]
    pub warnings: Vec<Diagnostic>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn total_size(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size).sum()
    }

    pub fn timing(&self, stage: &str) -> Option<Duration> {
        self.timings
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.elapsed)
    }
}

/// Result of running every stage, before publishing.
#[derive(Debug)]
pub struct PipelineRun {
    pub output: BuildOutput,
    pub report: BuildReport,
}

/// Ordered stages and the driver that runs them.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    progress: Option<ProgressCallback>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            stages,
            progress: None,
        }
    }

    /// `load`, `chunk`, `media`, `styles`, `scripts`, `copy`, `html`,
    /// `manifest`, `service-worker`.
    pub fn standard() -> Self {
        use stages::*;
        Self::new(vec![
            Box::new(LoadStage),
            Box::new(ChunkStage),
            Box::new(MediaStage),
            Box::new(StyleStage),
            Box::new(ScriptStage),
            Box::new(CopyStage),
            Box::new(HtmlStage),
            Box::new(ManifestStage),
            Box::new(ServiceWorkerStage),
        ])
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    fn notify(&self, event: StageEvent<'_>) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }

    /// Run every stage. Fails with [`Error::Build`] at the first stage that
    /// reports an error diagnostic.
    pub fn run(&self, context: &BuildContext<'_>) -> Result<PipelineRun> {
        let _build = info_span!("kiln.build", root = %context.config.root.display()).entered();
        let started = Instant::now();
        let mut state = BuildState::default();
        let mut timings = Vec::with_capacity(self.stages.len());
        let mut warnings = Vec::new();
        let total = self.stages.len();

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            let _span = info_span!("kiln.stage", stage = name).entered();
            self.notify(StageEvent::Started { name, index, total });

            let stage_started = Instant::now();
            let output = stage.run(context, &mut state)?;
            let elapsed = stage_started.elapsed();

            self.notify(StageEvent::Finished { name, elapsed });
            timings.push(StageTiming {
                stage: name.to_string(),
                elapsed,
            });

            if has_errors(&output.diagnostics) {
                let errors: Vec<Diagnostic> = output
                    .diagnostics
                    .into_iter()
                    .filter(Diagnostic::is_error)
                    .collect();
                info!(stage = name, errors = errors.len(), "stage failed");
                return Err(Error::Build { diagnostics: errors });
            }

            for diagnostic in &output.diagnostics {
                warn!(stage = name, "{}", diagnostic.headline());
            }
            warnings.extend(output.diagnostics);

            for artifact in &output.artifacts {
                debug!(path = %artifact.path, size = artifact.size, kind = artifact.kind.label(), "artifact");
            }
            info!(
                stage = name,
                artifacts = output.artifacts.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "stage finished"
            );
            state.artifacts.extend(output.artifacts);
        }

        let output = BuildOutput::new(state.artifacts);
        let report = BuildReport {
            artifacts: output.iter().map(Artifact::summary).collect(),
            module_count: state.graph.len(),
            timings,
            warnings,
            elapsed: started.elapsed(),
        };
        Ok(PipelineRun { output, report })
    }
}
