//! The public entry point: configure once, build many times.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use kiln_config::{KilnConfig, validate_schema};

use crate::cache::BuildCaches;
use crate::diagnostics::Diagnostic;
use crate::env::ClientEnvironment;
use crate::graph::Loader;
use crate::output::{BuildOutput, publish};
use crate::pipeline::{BuildContext, BuildReport, Pipeline, PipelineRun, ProgressCallback, StageTiming};
use crate::workers::WorkerPool;
use crate::{Error, Result};

/// Outcome of [`Bundler::check`].
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub module_count: usize,
    pub entry_groups: usize,
    pub warnings: Vec<Diagnostic>,
}

/// A configured build.
///
/// Cloning is cheap; clones share the worker pools and the transform cache,
/// so repeated builds reuse warm pools and skip unchanged modules.
#[derive(Clone)]
pub struct Bundler {
    config: Arc<KilnConfig>,
    env: Arc<ClientEnvironment>,
    workers: Arc<WorkerPool>,
    caches: Arc<BuildCaches>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("root", &self.config.root)
            .field("entries", &self.config.entries.len())
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// Validate `config` and read the client environment from the process.
    pub fn new(config: KilnConfig) -> Result<Self> {
        let env = ClientEnvironment::from_config(&config);
        Self::with_environment(config, env)
    }

    /// Like [`Bundler::new`] with an explicit client environment.
    pub fn with_environment(mut config: KilnConfig, env: ClientEnvironment) -> Result<Self> {
        validate_schema(&config)?;
        config.root = config.root.canonicalize().map_err(|e| {
            Error::io(
                format!("Project root '{}' is not accessible", config.root.display()),
                e,
            )
        })?;
        let workers = WorkerPool::new(config.workers.clone());
        Ok(Self {
            config: Arc::new(config),
            env: Arc::new(env),
            workers: Arc::new(workers),
            caches: Arc::new(BuildCaches::default()),
            progress: None,
        })
    }

    /// Report stage progress to `progress`.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    pub fn environment(&self) -> &ClientEnvironment {
        &self.env
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    pub fn caches(&self) -> &BuildCaches {
        &self.caches
    }

    fn pipeline(&self) -> Pipeline {
        let pipeline = Pipeline::standard();
        match &self.progress {
            Some(progress) => pipeline.with_progress(Arc::clone(progress)),
            None => pipeline,
        }
    }

    /// Run every stage without touching the output directory.
    pub fn run(&self) -> Result<PipelineRun> {
        let context = BuildContext::new(&self.config, &self.env, &self.workers, &self.caches);
        let result = self.pipeline().run(&context);
        let reclaimed = self.workers.reclaim_idle();
        if reclaimed > 0 {
            debug!(pools = reclaimed, "reclaimed idle worker pools");
        }
        result
    }

    /// Build and return the artifacts without writing them.
    pub fn build_in_memory(&self) -> Result<BuildOutput> {
        self.run().map(|run| run.output)
    }

    /// Build and publish into the output directory, blocking the caller.
    pub fn build_blocking(&self) -> Result<BuildReport> {
        let PipelineRun { output, mut report } = self.run()?;

        let started = Instant::now();
        publish(&output, &self.config.output_path(), self.config.clean)?;
        let elapsed = started.elapsed();
        report.timings.push(StageTiming {
            stage: "publish".to_string(),
            elapsed,
        });
        report.elapsed += elapsed;

        info!(
            artifacts = report.artifacts.len(),
            bytes = report.total_size(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build published"
        );
        Ok(report)
    }

    /// Build and publish on the blocking thread pool.
    pub async fn build(&self) -> Result<BuildReport> {
        let bundler = self.clone();
        tokio::task::spawn_blocking(move || bundler.build_blocking())
            .await
            .map_err(|e| Error::WorkerPool(format!("build task failed: {e}")))?
    }

    /// Resolve and load every entry group without producing output.
    pub fn check(&self) -> Result<CheckReport> {
        let loader = Loader::new(&self.config, &self.env, &self.workers, &self.caches)?;
        let outcome = loader.load()?;
        self.workers.reclaim_idle();

        let (errors, warnings): (Vec<_>, Vec<_>) =
            outcome.diagnostics.into_iter().partition(Diagnostic::is_error);
        if !errors.is_empty() {
            return Err(Error::Build { diagnostics: errors });
        }
        Ok(CheckReport {
            module_count: outcome.graph.len(),
            entry_groups: outcome.graph.entries().len(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("src/index.js"), "console.log('hi');\n").unwrap();
        fs::write(
            dir.path().join("public/index.html"),
            "<!DOCTYPE html><html><head><title>%PUBLIC_URL%</title></head><body></body></html>",
        )
        .unwrap();
        dir
    }

    #[test]
    fn rejects_invalid_config() {
        let dir = project();
        let mut config = KilnConfig::with_root(dir.path());
        config.entries.clear();
        assert!(matches!(Bundler::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let config = KilnConfig::with_root("/definitely/not/here/kiln");
        assert!(matches!(Bundler::new(config), Err(Error::Io { .. })));
    }

    #[test]
    fn check_loads_without_writing() {
        let dir = project();
        let bundler = Bundler::new(KilnConfig::with_root(dir.path())).unwrap();
        let report = bundler.check().unwrap();
        assert_eq!(report.module_count, 1);
        assert_eq!(report.entry_groups, 1);
        assert!(!dir.path().join("build").exists());
    }

    #[tokio::test]
    async fn build_publishes_and_reports() {
        let dir = project();
        let bundler = Bundler::new(KilnConfig::with_root(dir.path())).unwrap();
        let report = bundler.build().await.unwrap();

        assert!(dir.path().join("build/index.html").is_file());
        assert!(dir.path().join("build/asset-manifest.json").is_file());
        assert_eq!(report.module_count, 1);
        assert!(report.timing("publish").is_some());
        assert!(report.artifacts.iter().all(|a| dir.path().join("build").join(&a.path).is_file()));
    }
}
