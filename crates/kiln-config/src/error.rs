//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors (for CLI use)
    #[error("source directory not found: {}", path.display())]
    SourceDirNotFound { path: PathBuf },

    #[error("HTML template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    // Config parsing/loading errors
    #[error("config not found")]
    NotFound,

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for '{field}'{}", hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    // Schema validation errors (no filesystem checks)
    #[error("no entries specified")]
    NoEntries,

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Hint shown alongside the error by the CLI, when one exists.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::NotFound => Some("Create a kiln.toml or add a \"kiln\" field to package.json"),
            Self::NoEntries => Some("Declare at least one [[entry]] with a name and modules"),
            Self::InvalidValue { hint, .. } | Self::SchemaValidation { hint, .. } => {
                hint.as_deref()
            }
            Self::SourceDirNotFound { .. } => Some("Check `source_dir` relative to the project root"),
            Self::TemplateNotFound { .. } => Some("Check `html_template` relative to the project root"),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}
