//! Command implementations.

pub mod build;
pub mod check;

use kiln_config::{ConfigDiscovery, ConfigOverrides, KilnConfig, validate_fs};
use tracing::debug;

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// Discover, layer and validate the project configuration.
///
/// Missing config files fall back to the defaults unless `--config` named
/// one explicitly. Filesystem checks (source dir, template) run here so they
/// fail before any stage starts.
pub fn load_config(project: &ProjectArgs, overrides: &ConfigOverrides) -> Result<KilnConfig> {
    if !project.root.is_dir() {
        return Err(CliError::RootNotFound(project.root.clone()));
    }

    let mut discovery = ConfigDiscovery::new(&project.root);
    if let Some(file) = &project.config {
        discovery = discovery.with_file(file);
    }
    debug!(root = %project.root.display(), config = ?discovery.find(), "loading configuration");

    let config = discovery.load_or_default(overrides)?;
    validate_fs(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn project(dir: &TempDir, config: Option<&str>) -> ProjectArgs {
        ProjectArgs {
            root: dir.path().to_path_buf(),
            config: config.map(PathBuf::from),
        }
    }

    fn scaffold() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("src/index.js"), "").unwrap();
        fs::write(dir.path().join("public/index.html"), "<html></html>").unwrap();
        dir
    }

    #[test]
    fn missing_root_is_reported() {
        let args = ProjectArgs {
            root: PathBuf::from("/definitely/not/a/kiln/project"),
            config: None,
        };
        assert!(matches!(
            load_config(&args, &ConfigOverrides::default()),
            Err(CliError::RootNotFound(_))
        ));
    }

    #[test]
    fn overrides_beat_the_config_file() {
        let dir = scaffold();
        fs::write(dir.path().join("kiln.toml"), "output_dir = \"dist\"\npublic_path = \"/app/\"\n").unwrap();

        let config = load_config(&project(&dir, None), &ConfigOverrides::default()).unwrap();
        assert!(config.output_path().ends_with("dist"));

        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("out")),
            public_path: Some("https://cdn.example.com/".to_string()),
        };
        let config = load_config(&project(&dir, None), &overrides).unwrap();
        assert!(config.output_path().ends_with("out"));
        assert_eq!(config.public_path(), "https://cdn.example.com/");
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = scaffold();
        let err = load_config(&project(&dir, Some("missing.toml")), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(kiln_config::ConfigError::NotFound)));
    }

    #[test]
    fn missing_template_fails_validation() {
        let dir = scaffold();
        fs::remove_file(dir.path().join("public/index.html")).unwrap();
        let err = load_config(&project(&dir, None), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(kiln_config::ConfigError::TemplateNotFound { .. })
        ));
    }
}
