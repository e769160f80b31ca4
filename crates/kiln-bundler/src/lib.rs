#![cfg_attr(docsrs, feature(doc_cfg))]

//! # kiln-bundler
//!
//! Kiln build pipeline - turns a browser application's source tree into a
//! deployable set of fingerprinted artifacts, an asset manifest and an
//! offline-cache service worker.
//!
//! The build is an explicit, ordered list of [`Stage`]s run by a driver that
//! stops at the first fatal diagnostic. Nothing is written to disk until every
//! stage has succeeded, so a failed build never leaves a partial output tree.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kiln_bundler::Bundler;
//! use kiln_config::discover;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = discover(".")?;
//! let report = Bundler::new(config)?.build().await?;
//!
//! for artifact in &report.artifacts {
//!     println!("{} ({} bytes)", artifact.path, artifact.size);
//! }
//! # Ok(()) }
//! ```
//!
//! ### Build in memory
//!
//! ```no_run
//! use kiln_bundler::Bundler;
//! use kiln_config::KilnConfig;
//!
//! # fn main() -> kiln_bundler::Result<()> {
//! let bundler = Bundler::new(KilnConfig::with_root("./my-app"))?;
//! let output = bundler.build_in_memory()?;
//! let manifest = output.get("asset-manifest.json").expect("manifest");
//! println!("{}", manifest.text());
//! # Ok(()) }
//! ```

pub mod bundler;
pub mod cache;
pub mod chunk;
pub mod diagnostics;
pub mod env;
pub mod graph;
pub mod hash;
pub mod html;
pub mod manifest;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod rules;
pub mod runtime;
pub mod script;
pub mod service_worker;
pub mod style;
pub mod workers;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging};

pub use bundler::{Bundler, CheckReport};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use env::ClientEnvironment;
pub use graph::{Module, ModuleGraph, ModuleId, ModuleKind};
pub use output::{Artifact, ArtifactKind, ArtifactSummary, BuildOutput};
pub use pipeline::{
    BuildContext, BuildReport, BuildState, Pipeline, ProgressCallback, Stage, StageEvent,
    StageOutput, StageTiming,
};
pub use rules::{Category, Rule, RuleSet};
pub use workers::{PoolKind, WorkerLease, WorkerPool};

/// Error types for kiln-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error with context message.
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more fatal diagnostics stopped the build.
    #[error("{}", format_build_error(diagnostics))]
    Build { diagnostics: Vec<Diagnostic> },

    /// A module request could not be resolved.
    #[error("Cannot resolve '{specifier}' from {importer}")]
    Resolve { specifier: String, importer: String },

    /// No transformation rule claims the file.
    #[error("No rule matches {path}")]
    NoMatchingRule { path: String },

    /// A script or stylesheet could not be transformed.
    #[error("Transform failed for {file}: {message}")]
    Transform { file: String, message: String },

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    OutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// A worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Result type alias for kiln-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source,
        }
    }

    /// Fatal diagnostics carried by a [`Error::Build`], empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Build { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

impl From<kiln_config::ConfigError> for Error {
    fn from(err: kiln_config::ConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

fn format_build_error(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "Build failed".to_string(),
        [single] => format!("Build failed: {}", single.headline()),
        [first, rest @ ..] => format!(
            "Build failed with {} errors, first: {}",
            rest.len() + 1,
            first.headline()
        ),
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfig(_) => "kiln::invalid_config",
            Error::Io { .. } => "kiln::io",
            Error::Build { .. } => "kiln::build",
            Error::Resolve { .. } => "kiln::resolve",
            Error::NoMatchingRule { .. } => "kiln::no_matching_rule",
            Error::Transform { .. } => "kiln::transform",
            Error::OutputPath(_) => "kiln::output_path",
            Error::WriteFailure(_) => "kiln::write_failure",
            Error::WorkerPool(_) => "kiln::worker_pool",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfig(_) => Some(Box::new(
                "Check kiln.toml (or the \"kiln\" field of package.json) for invalid values.",
            )),
            Error::Build { diagnostics } if diagnostics.len() > 1 => Some(Box::new(
                "Every error is listed below. No files were written.",
            )),
            Error::Build { .. } => Some(Box::new("No files were written.")),
            Error::Resolve { specifier, .. } => Some(Box::new(format!(
                "Check that '{specifier}' exists, or declare it in [externals] if the page provides it."
            ))),
            Error::NoMatchingRule { .. } => Some(Box::new(
                "HTML and other non-asset files cannot be imported from scripts.",
            )),
            Error::OutputPath(_) => Some(Box::new(
                "Output paths must stay inside the output directory.",
            )),
            Error::WriteFailure(_) => Some(Box::new(
                "Check disk space and permissions of the output directory.",
            )),
            Error::WorkerPool(_) => Some(Box::new(
                "Lower [workers] counts or check the process thread limit.",
            )),
            _ => None,
        }
    }

    fn related(&self) -> Option<Box<dyn Iterator<Item = &dyn miette::Diagnostic> + '_>> {
        match self {
            Error::Build { diagnostics } if !diagnostics.is_empty() => Some(Box::new(
                diagnostics.iter().map(|d| d as &dyn miette::Diagnostic),
            )),
            _ => None,
        }
    }
}
