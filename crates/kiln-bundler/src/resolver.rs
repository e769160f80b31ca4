//! Module request resolution.
//!
//! Requests are checked in a fixed order before touching the file system:
//! externals, Node built-in stubs, then ignore rules. Everything else goes
//! through `oxc_resolver` with the configured extensions, aliases, search
//! directories and main fields.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use kiln_config::KilnConfig;
use oxc_resolver::{AliasValue, ResolveError, ResolveOptions, Resolver};
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::{Error, Result};

/// Where a request ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A file on disk
    File(PathBuf),
    /// Provided by the page as a global
    External { request: String, global: String },
    /// Node built-in replaced by an empty object
    Stub(String),
    /// Matched an ignore rule or a `false` browser mapping
    Ignored(String),
}

/// Why a request could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveFailure {
    #[error("Module not found: Can't resolve '{request}' ({reason})")]
    NotFound { request: String, reason: String },

    #[error("'{request}' resolves to {resolved}, which is outside of the source directory {source_dir}")]
    OutsideSourceDir {
        request: String,
        resolved: String,
        source_dir: String,
    },
}

impl ResolveFailure {
    pub fn help(&self) -> &'static str {
        match self {
            ResolveFailure::NotFound { .. } => {
                "Check the path and extension, or list the package under [externals]."
            }
            ResolveFailure::OutsideSourceDir { .. } => {
                "Relative imports from the source directory must stay inside it. Move the file or install it as a package."
            }
        }
    }
}

struct IgnoreMatcher {
    request: Regex,
    context: Option<Regex>,
}

/// Resolves module requests for one build.
pub struct ModuleResolver {
    inner: Resolver,
    root: PathBuf,
    source_dir: PathBuf,
    externals: BTreeMap<String, String>,
    stubs: FxHashSet<String>,
    ignore: Vec<IgnoreMatcher>,
    restrict_to_source: bool,
}

impl ModuleResolver {
    pub fn new(config: &KilnConfig) -> Result<Self> {
        let root = config.absolute(Path::new("."));
        let resolve = &config.resolve;

        let alias = resolve
            .alias
            .iter()
            .map(|(prefix, target)| {
                let target = config.absolute(target).to_string_lossy().into_owned();
                (prefix.clone(), vec![AliasValue::Path(target)])
            })
            .collect();

        let modules = resolve
            .modules
            .iter()
            .map(|m| {
                let path = Path::new(m);
                if path.is_absolute() || m.contains('/') {
                    config.absolute(path).to_string_lossy().into_owned()
                } else {
                    m.clone()
                }
            })
            .collect();

        let inner = Resolver::new(ResolveOptions {
            extensions: resolve.extensions.clone(),
            alias,
            alias_fields: vec![vec!["browser".to_string()]],
            main_fields: resolve.main_fields.clone(),
            condition_names: resolve.condition_names.clone(),
            modules,
            ..ResolveOptions::default()
        });

        let ignore = config
            .ignore
            .iter()
            .map(|rule| {
                let request = Regex::new(&rule.request)
                    .map_err(|e| Error::InvalidConfig(format!("ignore request pattern: {e}")))?;
                let context = rule
                    .context
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| Error::InvalidConfig(format!("ignore context pattern: {e}")))?;
                Ok(IgnoreMatcher { request, context })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            inner,
            source_dir: config.source_path(),
            root,
            externals: config.effective_externals(),
            stubs: config.node.stubs.iter().cloned().collect(),
            ignore,
            restrict_to_source: config.resolve.restrict_to_source,
        })
    }

    /// Resolve `request` as issued by `importer`, or by the project root for entries.
    pub fn resolve(
        &self,
        request: &str,
        importer: Option<&Path>,
    ) -> std::result::Result<Resolution, ResolveFailure> {
        if let Some(global) = self.externals.get(request) {
            return Ok(Resolution::External {
                request: request.to_string(),
                global: global.clone(),
            });
        }

        let builtin = request.strip_prefix("node:").unwrap_or(request);
        if self.stubs.contains(builtin) {
            return Ok(Resolution::Stub(builtin.to_string()));
        }

        let context = importer
            .and_then(Path::parent)
            .unwrap_or(self.root.as_path());

        if self.is_ignored(request, context) {
            return Ok(Resolution::Ignored(request.to_string()));
        }

        let resolved = match self.inner.resolve(context, request) {
            Ok(resolution) => resolution.path().to_path_buf(),
            Err(ResolveError::Ignored(_)) => return Ok(Resolution::Ignored(request.to_string())),
            Err(err) => {
                return Err(ResolveFailure::NotFound {
                    request: request.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        if let Some(importer) = importer {
            self.check_scope(request, importer, &resolved)?;
        }

        Ok(Resolution::File(resolved))
    }

    /// Relative requests from the source directory may not escape it.
    fn check_scope(
        &self,
        request: &str,
        importer: &Path,
        resolved: &Path,
    ) -> std::result::Result<(), ResolveFailure> {
        if !self.restrict_to_source
            || !request.starts_with('.')
            || !importer.starts_with(&self.source_dir)
            || resolved.starts_with(&self.source_dir)
            || is_package_path(resolved)
            || resolved == self.root.join("package.json")
        {
            return Ok(());
        }

        Err(ResolveFailure::OutsideSourceDir {
            request: request.to_string(),
            resolved: display_relative(&self.root, resolved),
            source_dir: display_relative(&self.root, &self.source_dir),
        })
    }

    fn is_ignored(&self, request: &str, context: &Path) -> bool {
        let context = context.to_string_lossy().replace('\\', "/");
        self.ignore.iter().any(|rule| {
            rule.request.is_match(request)
                && rule.context.as_ref().is_none_or(|ctx| ctx.is_match(&context))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

/// True for files inside a `node_modules` directory.
pub fn is_package_path(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

/// Forward-slash path of `path` relative to `root`, or the full path when outside it.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
