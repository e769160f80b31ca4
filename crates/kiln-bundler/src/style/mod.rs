//! Stylesheet compilation.
//!
//! Each style module is preprocessed (Less/Scss), stripped of its `@import`
//! and `url()` requests, then validated and normalized by lightningcss
//! against the browser targets. Requests become graph edges; `url()`
//! references are left as `__kiln_url_N__` placeholders until the final
//! asset URLs are known.

pub mod preprocess;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use kiln_config::{BrowserTargets, KilnConfig, StyleDialect};
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;

pub use preprocess::{PreprocessError, Preprocessed, preprocess};

use crate::cache::CacheKey;
use crate::diagnostics::{Diagnostic, DiagnosticKind};

static IMPORT_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\(\s*)?(["']?)([^"'()\s;]+)["']?\s*\)?\s*([^;]*);"#)
        .expect("valid regex")
});
static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(["']?)([^"'()]+?)["']?\s*\)"#).expect("valid regex")
});

/// Options shared by every style module of a build.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub targets: BrowserTargets,
    /// Theme variable overrides for Less/Scss
    pub overrides: BTreeMap<String, String>,
    pub root: PathBuf,
}

impl StyleOptions {
    pub fn new(config: &KilnConfig) -> Self {
        Self {
            targets: config.styles.targets.clone(),
            overrides: config.theme.variables.clone(),
            root: config.absolute(Path::new(".")),
        }
    }

    pub fn lightningcss_targets(&self) -> Targets {
        lightningcss_targets(&self.targets)
    }
}

pub fn lightningcss_targets(targets: &BrowserTargets) -> Targets {
    let version = |major: Option<u32>| major.map(|m| m << 16);
    Targets::from(Browsers {
        chrome: version(targets.chrome),
        firefox: version(targets.firefox),
        safari: version(targets.safari),
        edge: version(targets.edge),
        ie: version(targets.ie),
        ios_saf: version(targets.ios_saf),
        android: version(targets.android),
        ..Browsers::default()
    })
}

/// A normalized style module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    /// CSS with `url()` placeholders
    pub css: String,
    /// `@import` requests, in order
    pub imports: Vec<String>,
    /// `url()` requests; index `N` fills `__kiln_url_N__`
    pub urls: Vec<String>,
    /// Files inlined by the preprocessor
    pub included: Vec<PathBuf>,
}

/// Placeholder token for the `index`th url request.
pub fn placeholder(index: usize) -> String {
    format!("__kiln_url_{index}__")
}

/// Replace url placeholders with their final URLs.
pub fn fill_urls(css: &str, urls: &[String]) -> String {
    let mut out = css.to_string();
    for (index, url) in urls.iter().enumerate() {
        out = out.replace(&placeholder(index), url);
    }
    out
}

/// Graph request for a stylesheet reference, or `None` when it is left as is.
pub fn css_request(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let skip = raw.is_empty()
        || raw.starts_with("data:")
        || raw.starts_with("http:")
        || raw.starts_with("https:")
        || raw.starts_with("//")
        || raw.starts_with('#')
        || raw.starts_with('/')
        || raw.starts_with("__kiln_url_");
    if skip {
        return None;
    }
    Some(match raw.strip_prefix('~') {
        Some(package) => package.to_string(),
        None if raw.starts_with("./") || raw.starts_with("../") => raw.to_string(),
        None => format!("./{raw}"),
    })
}

/// Compile one style module.
pub fn compile(
    id: &str,
    path: &Path,
    source: &Arc<String>,
    dialect: StyleDialect,
    options: &StyleOptions,
) -> Result<CompiledStyle, Vec<Diagnostic>> {
    let preprocessed = run_preprocessor(id, path, source, dialect, options)?;
    compile_preprocessed(id, source, dialect, preprocessed, options)
}

/// Run the Less/Scss preprocessor, mapping failures to diagnostics.
pub fn run_preprocessor(
    id: &str,
    path: &Path,
    source: &Arc<String>,
    dialect: StyleDialect,
    options: &StyleOptions,
) -> Result<Preprocessed, Vec<Diagnostic>> {
    preprocess(source, path, dialect, &options.overrides, &options.root).map_err(|err| {
        let file = err
            .file
            .strip_prefix(&options.root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| id.to_string());
        vec![Diagnostic::error(DiagnosticKind::Style, err.message).with_file(file)]
    })
}

/// Extract requests from preprocessed text and normalize it.
pub fn compile_preprocessed(
    id: &str,
    source: &Arc<String>,
    dialect: StyleDialect,
    preprocessed: Preprocessed,
    options: &StyleOptions,
) -> Result<CompiledStyle, Vec<Diagnostic>> {
    let (text, imports, urls) = extract_requests(&preprocessed.css);
    let context = if dialect == StyleDialect::Css {
        Arc::clone(source)
    } else {
        Arc::new(text.clone())
    };
    let css = normalize(id, &text, &options.lightningcss_targets(), &context)?;

    Ok(CompiledStyle {
        css,
        imports,
        urls,
        included: preprocessed.included,
    })
}

/// Cache key over the preprocessed text, so edits to inlined files miss.
pub fn cache_key(id: &str, source: &str, dialect: StyleDialect, options: &StyleOptions) -> CacheKey {
    let options = format!("{dialect}|{:?}|{:?}", options.targets, options.overrides);
    CacheKey::new([id.as_bytes(), source.as_bytes(), options.as_bytes()])
}

/// Pull `@import` and `url()` requests out of the text.
fn extract_requests(css: &str) -> (String, Vec<String>, Vec<String>) {
    let mut imports = Vec::new();
    let mut text = String::with_capacity(css.len());
    let mut last = 0;
    for caps in IMPORT_RULE.captures_iter(css) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let has_media = caps.get(3).is_some_and(|m| !m.as_str().trim().is_empty());
        let Some(request) = css_request(target.as_str()).filter(|_| !has_media) else {
            continue;
        };
        text.push_str(&css[last..whole.start()]);
        // keep line numbers stable for diagnostics
        text.extend(whole.as_str().matches('\n').map(|_| '\n'));
        last = whole.end();
        imports.push(request);
    }
    text.push_str(&css[last..]);

    let mut urls: Vec<String> = Vec::new();
    let replaced = URL_FUNCTION.replace_all(&text, |caps: &regex::Captures<'_>| {
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let split = raw.find(['?', '#']).unwrap_or(raw.len());
        let (target, suffix) = raw.split_at(split);
        match css_request(target) {
            Some(request) => {
                let index = urls.iter().position(|u| *u == request).unwrap_or_else(|| {
                    urls.push(request);
                    urls.len() - 1
                });
                format!("url({}{suffix})", placeholder(index))
            }
            None => caps[0].to_string(),
        }
    });

    (replaced.into_owned(), imports, urls)
}

fn style_error(id: &str, message: String, loc: Option<(u32, u32)>, context: &Arc<String>) -> Diagnostic {
    let diag = Diagnostic::error(DiagnosticKind::Style, message).with_file(id);
    match loc {
        // lightningcss lines are 0-based
        Some((line, column)) => diag.with_position(context, line + 1, column),
        None => diag,
    }
}

/// Validate and normalize (prefixes, nesting) without minifying.
fn normalize(
    id: &str,
    css: &str,
    targets: &Targets,
    context: &Arc<String>,
) -> Result<String, Vec<Diagnostic>> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: id.to_string(),
            flags: ParserFlags::NESTING,
            ..ParserOptions::default()
        },
    )
    .map_err(|err| {
        let loc = err.loc.as_ref().map(|l| (l.line, l.column));
        vec![style_error(id, err.kind.to_string(), loc, context)]
    })?;

    sheet
        .minify(MinifyOptions {
            targets: *targets,
            ..MinifyOptions::default()
        })
        .map_err(|err| vec![style_error(id, err.kind.to_string(), None, context)])?;

    sheet
        .to_css(PrinterOptions {
            minify: false,
            targets: *targets,
            ..PrinterOptions::default()
        })
        .map(|out| out.code)
        .map_err(|err| vec![style_error(id, err.kind.to_string(), None, context)])
}

/// Minify a complete stylesheet (a chunk's CSS or an inline `<style>`).
pub fn minify_css(css: &str, targets: &Targets) -> Result<String, String> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            flags: ParserFlags::NESTING,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;
    sheet
        .minify(MinifyOptions {
            targets: *targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;
    sheet
        .to_css(PrinterOptions {
            minify: true,
            targets: *targets,
            ..PrinterOptions::default()
        })
        .map(|out| out.code)
        .map_err(|e| e.to_string())
}
