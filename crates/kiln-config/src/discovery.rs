//! File-based config discovery and layered loading.
//!
//! Layers, lowest priority first: builtin defaults, the discovered config
//! file, `KILN_*` environment variables (`__` separates nested keys), and
//! explicit [`ConfigOverrides`] from the caller.

use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use path_clean::PathClean;
use serde::Serialize;
use serde_json::Value;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

const CONFIG_FILE: &str = "kiln.toml";
const PACKAGE_FIELD: &str = "kiln";
const ENV_PREFIX: &str = "KILN_";

/// Values that take precedence over every other configuration layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,
}

/// Searches a project root for configuration and loads it.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// println!("building into {}", config.output_path().display());
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
    explicit: Option<PathBuf>,
    use_env: bool,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            explicit: None,
            use_env: true,
        }
    }

    /// Load this file instead of searching the root.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Skip the `KILN_*` environment layer.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: kiln.toml
    /// 2. package.json (kiln field)
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            let path = self.root.join(path);
            return path.is_file().then_some(path);
        }

        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        match parsed.get(PACKAGE_FIELD) {
            Some(field) if !field.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<KilnConfig> {
        self.load_with(&ConfigOverrides::default())
    }

    /// Load config from the discovered file, falling back to defaults when
    /// the project has none.
    pub fn load_or_default(&self, overrides: &ConfigOverrides) -> Result<KilnConfig> {
        match self.find() {
            Some(path) => self.extract(Some(&path), overrides),
            None if self.explicit.is_none() => {
                tracing::debug!(root = %self.root.display(), "no config file, using defaults");
                self.extract(None, overrides)
            }
            None => Err(ConfigError::NotFound),
        }
    }

    pub fn load_with(&self, overrides: &ConfigOverrides) -> Result<KilnConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.extract(Some(&path), overrides)
    }

    fn extract(&self, path: Option<&Path>, overrides: &ConfigOverrides) -> Result<KilnConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(KilnConfig::default()));

        if let Some(path) = path {
            tracing::debug!(config = %path.display(), "loading configuration");
            figment = match path.file_name().and_then(|n| n.to_str()) {
                Some("package.json") => figment.merge(Json::string(&package_field(path)?)),
                _ => {
                    // syntax errors carry the file path
                    let content = fs::read_to_string(path)?;
                    toml::from_str::<toml::Value>(&content).map_err(|e| ConfigError::Parse {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                    figment.merge(Toml::string(&content))
                }
            };
        }

        if self.use_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        figment = figment.merge(Serialized::defaults(overrides));

        let mut config: KilnConfig = figment.extract()?;
        config.root = if config.root.is_absolute() {
            config.root.clean()
        } else {
            self.root.join(&config.root).clean()
        };
        Ok(config)
    }
}

fn package_field(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match parsed.get(PACKAGE_FIELD) {
        Some(field) if field.is_object() => Ok(field.to_string()),
        _ => Err(ConfigError::InvalidValue {
            field: PACKAGE_FIELD.to_string(),
            hint: Some("The \"kiln\" field in package.json must be an object".to_string()),
        }),
    }
}

/// Discover and load configuration for `root`, using defaults when no file exists.
pub fn discover(root: impl AsRef<Path>) -> Result<KilnConfig> {
    ConfigDiscovery::new(root).load_or_default(&ConfigOverrides::default())
}
