//! Script compilation: parse, check, lint, transform, substitute constants
//! and extract the module skeleton.

pub mod lint;
pub mod minify;
pub mod skeleton;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use kiln_config::{JsxMode, KilnConfig, LintLevel};
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::{ParseOptions, Parser};
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};
use oxc_transformer_plugins::{ReplaceGlobalDefines, ReplaceGlobalDefinesConfig};
use tracing::trace;

pub use minify::{ScriptMinifyOptions, minify_script};
pub use skeleton::{Skeleton, extract};

use crate::cache::CacheKey;
use crate::diagnostics::{Diagnostic, DiagnosticKind, has_errors};
use crate::env::ClientEnvironment;

/// Converts oxc diagnostics into ours, keeping the first label as location.
macro_rules! convert_errors {
    ($errors:expr, $kind:expr, $file:expr, $source:expr) => {
        $errors
            .iter()
            .map(|err| {
                let mut diag = Diagnostic::error($kind, err.message.to_string()).with_file($file);
                if let Some(offset) = err
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.first())
                    .map(|label| label.offset())
                {
                    diag = diag.with_offset($source, offset);
                }
                if let Some(help) = &err.help {
                    diag = diag.with_help(help.to_string());
                }
                diag
            })
            .collect::<Vec<Diagnostic>>()
    };
}

/// Where a script lives, which decides how much work it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Under the source directory: checked, linted and transformed
    Source,
    /// Local file outside the source directory: checked and transformed
    Local,
    /// Under `node_modules`: parsed and linked only
    Package,
}

/// Options shared by every script of a build.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub target: String,
    pub jsx: JsxMode,
    pub lint: BTreeMap<String, LintLevel>,
    /// `(expression, replacement)` pairs
    pub defines: Vec<(String, String)>,
    /// Replace `__dirname` in source modules
    pub dirname: bool,
}

impl ScriptOptions {
    pub fn new(config: &KilnConfig, env: &ClientEnvironment) -> Self {
        Self {
            target: config.scripts.target.to_ascii_lowercase(),
            jsx: config.scripts.jsx,
            lint: config.scripts.lint.clone(),
            defines: env.defines().to_vec(),
            dirname: config.node.dirname,
        }
    }

    /// Syntax level handed to the transformer. ES5 lowering stops at ES2015.
    fn transform_target(&self) -> &str {
        match self.target.as_str() {
            "es5" | "es3" => "es2015",
            other => other,
        }
    }

    fn fingerprint(&self) -> String {
        let lint: Vec<String> = self.lint.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let defines: Vec<String> = self.defines.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!(
            "target={};jsx={:?};dirname={};lint={};defines={}",
            self.target,
            self.jsx,
            self.dirname,
            lint.join(","),
            defines.join("\n")
        )
    }
}

/// One script to compile.
#[derive(Debug, Clone)]
pub struct ScriptSource<'a> {
    /// Project-relative path, used in diagnostics
    pub id: &'a str,
    pub path: &'a Path,
    pub source: Arc<String>,
    pub origin: Origin,
}

impl ScriptSource<'_> {
    /// Directory of the module relative to the project root (`__dirname`).
    fn dirname(&self) -> String {
        match self.id.rfind('/') {
            Some(idx) => format!("/{}", &self.id[..idx]),
            None => "/".to_string(),
        }
    }

    pub fn cache_key(&self, options: &ScriptOptions) -> CacheKey {
        let origin = format!("{:?}", self.origin);
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let options = options.fingerprint();
        CacheKey::new([
            self.source.as_bytes(),
            options.as_bytes(),
            origin.as_bytes(),
            extension.as_bytes(),
            self.id.as_bytes(),
        ])
    }
}

/// Output of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// Transformed code; ES module syntax is still present
    pub code: String,
    pub skeleton: Skeleton,
    /// Non-fatal diagnostics (lint warnings)
    pub warnings: Vec<Diagnostic>,
}

/// Compile one script. On failure every diagnostic found is returned.
pub fn compile(
    input: &ScriptSource<'_>,
    options: &ScriptOptions,
) -> Result<CompiledScript, Vec<Diagnostic>> {
    let allocator = Allocator::default();
    let file = input.id;
    let source = &input.source;
    let package = input.origin == Origin::Package;

    let source_type = SourceType::from_path(input.path).unwrap_or_else(|_| SourceType::mjs());
    let mut parsed = Parser::new(&allocator, source, source_type).parse();
    let mut is_module = source_type.is_module();

    if !parsed.errors.is_empty() && source_type.is_javascript() {
        // CommonJS files may use sloppy-mode syntax or a top-level return
        let script = Parser::new(&allocator, source, source_type.with_module(false))
            .with_options(ParseOptions {
                allow_return_outside_function: true,
                ..ParseOptions::default()
            })
            .parse();
        if script.errors.is_empty() && !script.panicked {
            parsed = script;
            is_module = false;
        }
    }

    if !parsed.errors.is_empty() || parsed.panicked {
        let mut diags = convert_errors!(parsed.errors, DiagnosticKind::Syntax, file, source);
        if diags.is_empty() {
            diags.push(Diagnostic::error(DiagnosticKind::Syntax, "Failed to parse").with_file(file));
        }
        return Err(diags);
    }
    let mut program = parsed.program;

    let semantic = SemanticBuilder::new()
        .with_check_syntax_error(!package)
        .build(&program);
    if !package && !semantic.errors.is_empty() {
        return Err(convert_errors!(semantic.errors, DiagnosticKind::Semantic, file, source));
    }
    let mut scoping = semantic.semantic.into_scoping();

    let mut warnings = Vec::new();
    if input.origin == Origin::Source {
        let diags = lint::lint(&program, source, file, &options.lint);
        if has_errors(&diags) {
            return Err(diags);
        }
        warnings = diags;
    }

    if !package {
        let mut transform = TransformOptions::from_target(options.transform_target()).map_err(
            |message| {
                vec![Diagnostic::error(
                    DiagnosticKind::Transform,
                    format!("Unsupported script target '{}': {message}", options.target),
                )
                .with_file(file)]
            },
        )?;
        transform.jsx.jsx_plugin = true;
        transform.jsx.runtime = match options.jsx {
            JsxMode::Classic => JsxRuntime::Classic,
            JsxMode::Automatic => JsxRuntime::Automatic,
        };

        let transformed =
            Transformer::new(&allocator, input.path, &transform).build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(convert_errors!(
                transformed.errors,
                DiagnosticKind::Transform,
                file,
                source
            ));
        }
        scoping = transformed.scoping;
    }

    let mut defines = options.defines.clone();
    if options.dirname && input.origin == Origin::Source {
        defines.push((
            "__dirname".to_string(),
            serde_json::Value::String(input.dirname()).to_string(),
        ));
    }
    if !defines.is_empty() {
        let config = ReplaceGlobalDefinesConfig::new(&defines).map_err(|errors| {
            convert_errors!(errors, DiagnosticKind::Transform, file, source)
        })?;
        let replaced = ReplaceGlobalDefines::new(&allocator, config).build(scoping, &mut program);
        trace!(file, changed = replaced.changed, "replaced global defines");
    }

    let code = Codegen::new().build(&program).code;
    let skeleton = extract(&code, is_module).map_err(|message| {
        vec![Diagnostic::error(
            DiagnosticKind::Transform,
            format!("Transformed output is not valid JavaScript: {message}"),
        )
        .with_file(file)]
    })?;

    trace!(file, requests = skeleton.requests.len(), "compiled script");
    Ok(CompiledScript {
        code,
        skeleton,
        warnings,
    })
}

/// `module.exports = <json>;` for a JSON module.
pub fn json_module(id: &str, source: &Arc<String>) -> Result<String, Diagnostic> {
    match serde_json::from_str::<serde_json::Value>(source) {
        Ok(value) => Ok(format!("module.exports = {value};\n")),
        Err(err) => Err(Diagnostic::error(
            DiagnosticKind::Syntax,
            format!("Invalid JSON: {err}"),
        )
        .with_file(id)
        .with_position(source, err.line() as u32, err.column() as u32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options() -> ScriptOptions {
        let mut config = KilnConfig::default();
        config.env.vars.insert("APP_NAME".into(), "Demo".into());
        let env = ClientEnvironment::with_process_vars(&config, Vec::new());
        ScriptOptions::new(&config, &env)
    }

    fn compile_source(id: &str, code: &str, origin: Origin) -> Result<CompiledScript, Vec<Diagnostic>> {
        let path = PathBuf::from("/project").join(id);
        let input = ScriptSource {
            id,
            path: &path,
            source: Arc::new(code.to_string()),
            origin,
        };
        compile(&input, &options())
    }

    #[test]
    fn jsx_and_typescript_are_lowered() {
        let out = compile_source(
            "src/App.tsx",
            "import React from 'react';\ninterface P { n: number }\nexport const App = (p: P) => <div>{p.n}</div>;\n",
            Origin::Source,
        )
        .unwrap();
        assert!(out.code.contains("React.createElement"));
        assert!(!out.code.contains("interface"));
        assert!(out.skeleton.is_esm);
        assert_eq!(out.skeleton.requests[0].specifier, "react");
    }

    #[test]
    fn process_env_and_dirname_are_substituted() {
        let out = compile_source(
            "src/pages/home.js",
            "export const a = process.env.NODE_ENV, b = process.env.APP_NAME, c = __dirname;\n",
            Origin::Source,
        )
        .unwrap();
        assert!(out.code.contains("\"production\""));
        assert!(out.code.contains("\"Demo\""));
        assert!(out.code.contains("\"/src/pages\""));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        let errors = compile_source("src/bad.js", "let a = 1;\nlet b = ;\n", Origin::Source).unwrap_err();
        assert_eq!(errors[0].kind, DiagnosticKind::Syntax);
        assert_eq!(errors[0].file.as_deref(), Some("src/bad.js"));
        assert_eq!(errors[0].line, Some(2));
    }

    #[test]
    fn semantic_errors_are_fatal() {
        let errors = compile_source("src/dup.js", "let a = 1;\nlet a = 2;\n", Origin::Source).unwrap_err();
        assert_eq!(errors[0].kind, DiagnosticKind::Semantic);
    }

    #[test]
    fn lint_errors_only_apply_to_sources() {
        let errors = compile_source("src/dbg.js", "debugger;\n", Origin::Source).unwrap_err();
        assert_eq!(errors[0].rule.as_deref(), Some("no-debugger"));

        assert!(compile_source("node_modules/x/index.js", "debugger;\n", Origin::Package).is_ok());
    }

    #[test]
    fn commonjs_packages_keep_their_shape() {
        let out = compile_source(
            "node_modules/x/index.js",
            "if (process.env.NODE_ENV === 'production') { module.exports = require('./prod'); }\n",
            Origin::Package,
        )
        .unwrap();
        assert!(!out.skeleton.is_esm);
        assert_eq!(out.skeleton.requests[0].specifier, "./prod");
        assert!(out.code.contains("\"production\" === \"production\""));
    }

    #[test]
    fn lint_warnings_are_kept() {
        let out = compile_source("src/l.js", "a: for (;;) { break; }\n", Origin::Source).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn json_modules() {
        let src = Arc::new("{\"a\": [1, 2]}".to_string());
        assert_eq!(json_module("src/a.json", &src).unwrap(), "module.exports = {\"a\":[1,2]};\n");
        let bad = Arc::new("{\n  \"a\": }".to_string());
        let err = json_module("src/b.json", &bad).unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn cache_key_depends_on_origin_and_path() {
        let opts = options();
        let source = Arc::new("export default 1;".to_string());
        let a = ScriptSource {
            id: "src/a.js",
            path: Path::new("/p/src/a.js"),
            source: Arc::clone(&source),
            origin: Origin::Source,
        };
        let b = ScriptSource {
            id: "src/b.js",
            path: Path::new("/p/src/b.js"),
            ..a.clone()
        };
        assert_ne!(a.cache_key(&opts), b.cache_key(&opts));
        assert_eq!(a.cache_key(&opts), a.clone().cache_key(&opts));
    }
}
