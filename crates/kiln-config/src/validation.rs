//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// Lint rules the script checker knows about.
pub const KNOWN_LINT_RULES: &[&str] = &["no-debugger", "no-dupe-keys", "no-with", "no-unused-labels"];

/// Extensions owned by other rule categories; a style dialect may not claim them.
const RESERVED_EXTENSIONS: &[&str] = &[
    "js", "jsx", "mjs", "ts", "tsx", "json", "html", "bmp", "gif", "jpg", "jpeg", "png", "svg",
];

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use kiln_config::{ConfigValidator, KilnConfig, SchemaValidator};
///
/// SchemaValidator.validate(&KilnConfig::default()).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        let mut names = BTreeSet::new();
        for entry in &config.entries {
            if entry.name.trim().is_empty() || !is_artifact_name(&entry.name) {
                return Err(schema(
                    format!("invalid entry name '{}'", entry.name),
                    "Entry names may contain letters, digits, '-' and '_'",
                ));
            }
            if RESERVED_CHUNK_NAMES.contains(&entry.name.as_str()) {
                return Err(schema(
                    format!("entry name '{}' is reserved", entry.name),
                    "The vendors chunk already uses this name; rename the entry",
                ));
            }
            if entry.modules.is_empty() {
                return Err(schema(
                    format!("entry '{}' lists no modules", entry.name),
                    "Add at least one module request to the entry",
                ));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(schema(
                    format!("duplicate entry name '{}'", entry.name),
                    "Entry names must be unique",
                ));
            }
        }

        if config.output_dir.as_os_str().is_empty() || config.output_path() == config.root {
            return Err(ConfigError::InvalidValue {
                field: "output_dir".to_string(),
                hint: Some("The output directory must be a subdirectory of the project".to_string()),
            });
        }

        for (name, global) in config.effective_externals() {
            if name.trim().is_empty() || global.trim().is_empty() {
                return Err(schema(
                    "external names and globals cannot be empty".to_string(),
                    "Remove empty keys or values from [externals]",
                ));
            }
        }

        let workers = &config.workers;
        if workers.script_workers == 0 || workers.style_workers == 0 || workers.parallel_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers".to_string(),
                hint: Some("Worker counts and parallel_jobs must be at least 1".to_string()),
            });
        }

        for rule in &config.ignore {
            compile("ignore.request", &rule.request)?;
            if let Some(context) = &rule.context {
                compile("ignore.context", context)?;
            }
        }
        let sw = &config.service_worker;
        compile("service_worker.dont_cache_bust", &sw.dont_cache_bust)?;
        for pattern in sw.navigate_fallback_denylist.iter().chain(&sw.exclude) {
            compile("service_worker", pattern)?;
        }

        for ext in config.styles.dialects.keys() {
            let normalized = ext.trim_start_matches('.').to_ascii_lowercase();
            if normalized.is_empty() || RESERVED_EXTENSIONS.contains(&normalized.as_str()) {
                return Err(schema(
                    format!("style dialect table claims reserved extension '{ext}'"),
                    "Map only stylesheet extensions such as css, less or scss",
                ));
            }
            if normalized != *ext {
                return Err(schema(
                    format!("style dialect key '{ext}' must be a bare lowercase extension"),
                    "Write keys without the leading dot, e.g. less = \"less\"",
                ));
            }
        }

        for rule in config.scripts.lint.keys() {
            if !KNOWN_LINT_RULES.contains(&rule.as_str()) {
                return Err(schema(
                    format!("unknown lint rule '{rule}'"),
                    &format!("Known rules: {}", KNOWN_LINT_RULES.join(", ")),
                ));
            }
        }

        if config.scripts.target.parse::<TargetCheck>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "scripts.target".to_string(),
                hint: Some("Use es5, es2015 ... es2024 or esnext".to_string()),
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Runs [`SchemaValidator`] and then checks that the source directory and the
/// HTML template exist.
pub struct FsValidator;

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let source = config.source_path();
        if !source.is_dir() {
            return Err(ConfigError::SourceDirNotFound { path: source });
        }

        let template = config.template_path();
        if !template.is_file() {
            return Err(ConfigError::TemplateNotFound { path: template });
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &KilnConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for schema plus filesystem validation
pub fn validate_fs(config: &KilnConfig) -> Result<()> {
    FsValidator.validate(config)
}

fn schema(message: String, hint: &str) -> ConfigError {
    ConfigError::SchemaValidation {
        message,
        hint: Some(hint.to_string()),
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        hint: Some(format!("'{pattern}' is not a valid regular expression: {e}")),
    })
}

/// Chunk names the bundler assigns itself.
const RESERVED_CHUNK_NAMES: &[&str] = &["vendors"];

/// `~` joins entry names into common chunk names, so entries cannot use it.
fn is_artifact_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

struct TargetCheck;

impl std::str::FromStr for TargetCheck {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        let ok = s == "es5"
            || s == "esnext"
            || s.strip_prefix("es")
                .and_then(|year| year.parse::<u32>().ok())
                .is_some_and(|year| (2015..=2024).contains(&year));
        if ok { Ok(TargetCheck) } else { Err(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_schema() {
        assert!(validate_schema(&KilnConfig::default()).is_ok());
    }

    #[test]
    fn target_check_accepts_known_levels() {
        for target in ["es5", "es2015", "ES2020", "esnext"] {
            assert!(target.parse::<TargetCheck>().is_ok(), "{target}");
        }
        for target in ["es3", "es2099", "latest"] {
            assert!(target.parse::<TargetCheck>().is_err(), "{target}");
        }
    }

    #[test]
    fn artifact_names() {
        assert!(is_artifact_name("index"));
        assert!(is_artifact_name("admin-v2"));
        assert!(!is_artifact_name("a/b"));
        assert!(!is_artifact_name("a.b"));
        assert!(!is_artifact_name("index~admin"));
    }

    #[test]
    fn rooted_config_passes_schema() {
        let cfg = KilnConfig::with_root(Path::new("/tmp/project"));
        assert!(SchemaValidator.validate(&cfg).is_ok());
    }
}
