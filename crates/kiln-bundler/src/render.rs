//! Module factories and chunk source.
//!
//! Scripts keep their transformed code; the skeleton edits rewrite ES module
//! syntax into calls on the runtime. Each imported module's exports object is
//! bound once at the top of the factory and every use of an imported name
//! reads through it, so bindings stay live across circular imports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::chunk::{Chunk, ChunkPlan};
use crate::graph::{Module, ModuleGraph, ModuleId, ModuleKind};
use crate::runtime;
use crate::script::skeleton::{
    DEFAULT_BINDING, EditKind, ExportTarget, ImportBinding, ReferenceSite, RequestKind, Skeleton,
};

/// Everything a factory may need to know about other modules.
pub struct RenderContext<'a> {
    pub graph: &'a ModuleGraph,
    pub plan: &'a ChunkPlan,
    pub public_path: &'a str,
}

fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn module_var(request: usize) -> String {
    format!("__kiln_m{request}")
}

/// Live read of one export of an imported module.
fn imported_member(request: usize, imported: &str) -> String {
    format!("{}[{}]", module_var(request), quote(imported))
}

impl RenderContext<'_> {
    /// Body of the factory for `module`.
    pub fn factory_body(&self, module: &Module) -> String {
        match &module.kind {
            ModuleKind::Script { code, skeleton } => self.script_body(module, code, skeleton),
            ModuleKind::Json { code } => code.to_string(),
            ModuleKind::Media { output, .. } => {
                format!("module.exports = {};\n", quote(&output.url(self.public_path)))
            }
            ModuleKind::External { global } => {
                format!("module.exports = self[{}];\n", quote(global))
            }
            ModuleKind::Stub | ModuleKind::Ignored | ModuleKind::Style { .. } => {
                "module.exports = {};\n".to_string()
            }
        }
    }

    fn target(&self, module: &Module, request: usize) -> Option<&Module> {
        module
            .dependencies
            .get(request)
            .and_then(|dep| self.graph.get(&dep.target))
    }

    /// `__kiln_require.i("id")`, or an empty object for style targets.
    fn import_expression(&self, module: &Module, request: usize) -> String {
        match self.target(module, request) {
            Some(target) if !target.is_style() => {
                format!("__kiln_require.i({})", quote(target.id.as_str()))
            }
            _ => "{}".to_string(),
        }
    }

    fn script_body(&self, module: &Module, code: &str, skeleton: &Skeleton) -> String {
        let mut out = String::with_capacity(code.len() + 256);
        if skeleton.is_esm {
            out.push_str("\"use strict\";\n");
            out.push_str(&self.esm_prologue(module, skeleton));
        }

        let mut cursor = 0usize;
        for edit in &skeleton.edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            if start < cursor || end > code.len() {
                continue;
            }
            out.push_str(&code[cursor..start]);
            match &edit.kind {
                EditKind::Remove | EditKind::Import { .. } => {}
                EditKind::DefaultExpression => {
                    let _ = write!(out, "var {DEFAULT_BINDING} = ");
                }
                EditKind::Terminate => out.push(';'),
                EditKind::DynamicImport { request } => {
                    out.push_str(&self.dynamic_import(module, *request));
                }
                EditKind::Require { request } => match self.target(module, *request) {
                    Some(target) if !target.is_style() => {
                        let _ = write!(out, "__kiln_require({})", quote(target.id.as_str()));
                    }
                    _ => out.push_str("({})"),
                },
                EditKind::ImportReference {
                    request,
                    imported,
                    site,
                } => {
                    let member = imported_member(*request, imported);
                    let _ = match site {
                        ReferenceSite::Value => write!(out, "{member}"),
                        ReferenceSite::Callee => write!(out, "(0, {member})"),
                        ReferenceSite::Shorthand => write!(out, "{}: {member}", &code[start..end]),
                    };
                }
            }
            cursor = end;
        }
        out.push_str(&code[cursor..]);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Export definitions and imports, hoisted above the module body.
    fn esm_prologue(&self, module: &Module, skeleton: &Skeleton) -> String {
        let mut out = String::new();
        out.push_str("__kiln_require.r(exports);\n");

        // `export { name }` of an imported name re-exports the live binding
        let mut imported: BTreeMap<&str, String> = BTreeMap::new();
        let mut namespaces = Vec::new();
        for edit in &skeleton.edits {
            let EditKind::Import { request, bindings } = &edit.kind else {
                continue;
            };
            for binding in bindings {
                match binding {
                    ImportBinding::Default(local) => {
                        imported.insert(local, imported_member(*request, "default"));
                    }
                    ImportBinding::Named { imported: name, local } => {
                        imported.insert(local, imported_member(*request, name));
                    }
                    ImportBinding::Namespace(local) => namespaces.push((local, *request)),
                }
            }
        }

        if !skeleton.exports.is_empty() {
            let getters: Vec<String> = skeleton
                .exports
                .iter()
                .map(|export| {
                    let value = match &export.target {
                        ExportTarget::Local(local) => imported
                            .get(local.as_str())
                            .cloned()
                            .unwrap_or_else(|| local.clone()),
                        ExportTarget::Reexport { request, imported } if imported == "*" => {
                            module_var(*request)
                        }
                        ExportTarget::Reexport { request, imported } => {
                            imported_member(*request, imported)
                        }
                    };
                    format!("{}: function () {{ return {value}; }}", quote(&export.exported))
                })
                .collect();
            let _ = writeln!(out, "__kiln_require.d(exports, {{ {} }});", getters.join(", "));
        }

        for (request, _) in skeleton.requests_of(RequestKind::Static) {
            let _ = writeln!(
                out,
                "var {} = {};",
                module_var(request),
                self.import_expression(module, request)
            );
        }

        for request in &skeleton.star_exports {
            let _ = writeln!(out, "__kiln_require.x(exports, {});", module_var(*request));
        }

        for (local, request) in namespaces {
            let _ = writeln!(out, "var {local} = {};", module_var(request));
        }
        out
    }

    fn dynamic_import(&self, module: &Module, request: usize) -> String {
        let Some(target) = self.target(module, request) else {
            return "Promise.resolve({})".to_string();
        };
        let names: Vec<String> = self
            .plan
            .async_chunks_for(&target.id)
            .iter()
            .map(|chunk| quote(&chunk.name))
            .collect();
        if target.is_style() {
            return format!("__kiln_require.e([{}]).then(function () {{ return {{}}; }})", names.join(","));
        }
        format!(
            "__kiln_require.e([{}]).then(__kiln_require.i.bind(null, {}))",
            names.join(","),
            quote(target.id.as_str())
        )
    }

    /// Source of a script chunk: registration call with every factory.
    ///
    /// The vendors chunk gets the runtime prepended by the caller.
    pub fn chunk_source(&self, chunk: &Chunk) -> String {
        let mut out = runtime::chunk_prefix(&chunk.name);
        out.push('\n');
        let mut first = true;
        for id in &chunk.modules {
            let Some(module) = self.graph.get(id) else {
                continue;
            };
            if !first {
                out.push_str(",\n");
            }
            first = false;
            let _ = write!(
                out,
                "{}: function (module, exports, __kiln_require) {{\n{}}}",
                quote(id.as_str()),
                self.factory_body(module)
            );
        }
        let entries: Vec<String> = chunk.entry.iter().map(|id| quote(id.as_str())).collect();
        let _ = writeln!(out, "\n}},[{}]]);", entries.join(","));
        out
    }
}

/// Ids of every module in `chunk`, for logging.
pub fn describe(chunk: &Chunk) -> String {
    chunk
        .modules
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildCaches;
    use crate::env::ClientEnvironment;
    use crate::graph::Loader;
    use crate::workers::WorkerPool;
    use kiln_config::{KilnConfig, WorkerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn build(files: &[(&str, &str)]) -> (ModuleGraph, ChunkPlan) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let config = KilnConfig::with_root(dir.path().canonicalize().unwrap());
        let env = ClientEnvironment::with_process_vars(&config, Vec::new());
        let workers = WorkerPool::new(WorkerConfig::default());
        let caches = BuildCaches::default();
        let outcome = Loader::new(&config, &env, &workers, &caches)
            .unwrap()
            .load()
            .unwrap();
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        let plan = ChunkPlan::build(&outcome.graph);
        (outcome.graph, plan)
    }

    fn body(graph: &ModuleGraph, plan: &ChunkPlan, id: &str) -> String {
        let ctx = RenderContext {
            graph,
            plan,
            public_path: "/",
        };
        ctx.factory_body(graph.get(&ModuleId::new(id)).unwrap())
    }

    #[test]
    fn imports_become_runtime_calls() {
        let (graph, plan) = build(&[
            (
                "src/index.js",
                "import React, { Component as C } from 'react';\nimport * as util from './util';\nimport './theme.css';\nexport default class App extends C {}\nexport const version = util.v;\n",
            ),
            ("src/util.js", "export const v = 2;\nexport * from './more';\n"),
            ("src/more.js", "export function extra() {}\n"),
            ("src/theme.css", "body { margin: 0; }\n"),
        ]);

        let index = body(&graph, &plan, "src/index.js");
        assert!(index.starts_with("\"use strict\";\n__kiln_require.r(exports);\n"));
        assert!(index.contains(r#"var __kiln_m0 = __kiln_require.i("external:react");"#));
        assert!(index.contains(r#"class App extends __kiln_m0["Component"] {}"#));
        assert!(!index.contains("var React"));
        assert!(!index.contains("var C "));
        assert!(index.contains(r#"var util = __kiln_m1;"#));
        assert!(index.contains("var __kiln_m2 = {};"));
        assert!(index.contains(r#""default": function () { return App; }"#));
        assert!(index.contains(r#""version": function () { return version; }"#));
        assert!(!index.contains("import "));
        assert!(!index.contains("export "));

        let util = body(&graph, &plan, "src/util.js");
        assert!(util.contains(r#"__kiln_require.x(exports, __kiln_m0);"#));
    }

    #[test]
    fn imported_names_are_read_live() {
        let (graph, plan) = build(&[
            (
                "src/index.js",
                "import { a, getB } from './a';\nwindow.out = a + getB();\n",
            ),
            (
                "src/a.js",
                "import { b } from './b';\nexport const a = 'A';\nexport function getB() { return b; }\n",
            ),
            (
                "src/b.js",
                "import { a } from './a';\nimport log from './log';\nexport const b = 'B';\nexport function readA() { log({ a }); return a; }\nexport { a as again };\n",
            ),
            ("src/log.js", "export default function (x) { return x; }\n"),
        ]);

        let b = body(&graph, &plan, "src/b.js");
        // nothing is read from the cyclic import while b initializes
        assert!(!b.contains("var a "));
        assert!(b.contains(r#"return __kiln_m0["a"];"#));
        assert!(b.contains(r#"(0, __kiln_m1["default"])({ a: __kiln_m0["a"] })"#));
        assert!(b.contains(r#""again": function () { return __kiln_m0["a"]; }"#));

        let a = body(&graph, &plan, "src/a.js");
        assert!(a.contains(r#"return __kiln_m0["b"];"#));
        let index = body(&graph, &plan, "src/index.js");
        assert!(index.contains(r#"window.out = __kiln_m0["a"] + (0, __kiln_m0["getB"])();"#));
    }

    #[test]
    fn anonymous_default_export_is_bound() {
        let (graph, plan) = build(&[("src/index.js", "export default function () { return 1; }\n")]);
        let out = body(&graph, &plan, "src/index.js");
        assert!(out.contains("var __kiln_default__ = function"));
        assert!(out.contains(r#""default": function () { return __kiln_default__; }"#));
    }

    #[test]
    fn dynamic_imports_load_their_chunks() {
        let (graph, plan) = build(&[
            ("src/index.js", "import('./lazy').then((m) => m.default);\n"),
            ("src/lazy.js", "export default 42;\n"),
        ]);
        let out = body(&graph, &plan, "src/index.js");
        assert!(out.contains(
            r#"__kiln_require.e(["src-lazy"]).then(__kiln_require.i.bind(null, "src/lazy.js"))"#
        ));
    }

    #[test]
    fn commonjs_requires_are_rewritten() {
        let (graph, plan) = build(&[
            ("src/index.js", "const fs = require('fs');\nconst data = require('./data.json');\nmodule.exports = { fs, data };\n"),
            ("src/data.json", "{\"a\": 1}"),
        ]);
        let out = body(&graph, &plan, "src/index.js");
        assert!(out.contains(r#"__kiln_require("stub:fs")"#));
        assert!(out.contains(r#"__kiln_require("src/data.json")"#));
        assert!(!out.contains("use strict"));
        assert_eq!(body(&graph, &plan, "src/data.json"), "module.exports = {\"a\":1};\n");
    }

    #[test]
    fn chunk_source_registers_factories() {
        let (graph, plan) = build(&[("src/index.js", "import $ from 'jquery';\n$('body');\n")]);
        let ctx = RenderContext {
            graph: &graph,
            plan: &plan,
            public_path: "/",
        };
        let vendors = ctx.chunk_source(&plan.chunks()[0]);
        assert!(vendors.starts_with(r#"(self.kilnJsonp=self.kilnJsonp||[]).push(["vendors",{"#));
        assert!(vendors.contains(r#"module.exports = self["jQuery"];"#));
        assert!(vendors.trim_end().ends_with("},[]]);"));

        let entry = ctx.chunk_source(&plan.chunks()[1]);
        assert!(entry.trim_end().ends_with(r#"},["src/index.js"]]);"#));
        assert_eq!(describe(&plan.chunks()[1]), "src/index.js");
    }
}
