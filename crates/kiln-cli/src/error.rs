//! Error types for the CLI.
//!
//! [`CliError`] wraps configuration and build failures. Each variant knows
//! the hint printed under it; [`cli_error_to_miette`] turns the error into
//! the report `main` returns.

use std::path::PathBuf;

use kiln_config::ConfigError;
use miette::{MietteDiagnostic, Report};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or validating the configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The build pipeline failed
    #[error(transparent)]
    Build(#[from] kiln_bundler::Error),

    /// `--root` does not name a directory
    #[error("Project root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The blocking build task panicked or was cancelled
    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Writing the report to stdout failed
    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    /// Hint printed below the error message, when there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            CliError::Config(err) => err.hint().map(str::to_string),
            CliError::RootNotFound(_) => {
                Some("Pass an existing directory with --root, or run kiln from the project root".to_string())
            }
            CliError::Build(_) | CliError::Task(_) | CliError::Report(_) => None,
        }
    }
}

/// Convert a [`CliError`] into a miette report.
///
/// Build errors already implement `miette::Diagnostic` and keep their codes,
/// help and per-diagnostic source labels.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(err) => Report::new(err),
        other => {
            let mut diagnostic = MietteDiagnostic::new(other.to_string());
            if let Some(hint) = other.hint() {
                diagnostic = diagnostic.with_help(hint);
            }
            Report::new(diagnostic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_bundler::{Diagnostic, DiagnosticKind};

    #[test]
    fn config_errors_carry_their_hint() {
        let err: CliError = ConfigError::NoEntries.into();
        assert!(err.to_string().starts_with("Configuration error"));
        assert!(err.hint().unwrap().contains("[[entry]]"));
    }

    #[test]
    fn root_not_found_names_the_path() {
        let err = CliError::RootNotFound(PathBuf::from("/nowhere/app"));
        assert!(err.to_string().contains("/nowhere/app"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn build_errors_keep_their_diagnostic_code() {
        let err: CliError = kiln_bundler::Error::Build {
            diagnostics: vec![Diagnostic::error(DiagnosticKind::Syntax, "Unexpected token")],
        }
        .into();
        let report = cli_error_to_miette(err);
        assert_eq!(report.code().unwrap().to_string(), "kiln::build");
        assert!(report.to_string().contains("Unexpected token"));
    }

    #[test]
    fn other_errors_become_help_reports() {
        let report = cli_error_to_miette(CliError::RootNotFound(PathBuf::from("app")));
        assert!(report.help().unwrap().to_string().contains("--root"));
    }
}
