//! Lint rules run on application sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_config::LintLevel;
use oxc_ast::ast::{
    BreakStatement, ContinueStatement, DebuggerStatement, LabeledStatement, ObjectExpression,
    ObjectPropertyKind, Program, PropertyKind, WithStatement,
};
use oxc_ast_visit::{Visit, walk};
use oxc_span::GetSpan;
use rustc_hash::FxHashSet;

use crate::diagnostics::{Diagnostic, DiagnosticKind};

/// Severity per rule; rules set to `off` never run.
#[derive(Debug, Clone, Copy, Default)]
struct Levels {
    no_debugger: Option<LintLevel>,
    no_dupe_keys: Option<LintLevel>,
    no_with: Option<LintLevel>,
    no_unused_labels: Option<LintLevel>,
}

impl Levels {
    fn from_config(config: &BTreeMap<String, LintLevel>) -> Self {
        let level = |name: &str| config.get(name).copied().filter(|l| *l != LintLevel::Off);
        Self {
            no_debugger: level("no-debugger"),
            no_dupe_keys: level("no-dupe-keys"),
            no_with: level("no-with"),
            no_unused_labels: level("no-unused-labels"),
        }
    }
}

struct Label {
    name: String,
    offset: u32,
    used: bool,
}

struct Linter<'s> {
    levels: Levels,
    source: &'s Arc<String>,
    file: &'s str,
    labels: Vec<Label>,
    diagnostics: Vec<Diagnostic>,
}

impl Linter<'_> {
    fn report(&mut self, level: LintLevel, rule: &str, offset: u32, message: String) {
        let diagnostic = match level {
            LintLevel::Error => Diagnostic::error(DiagnosticKind::Lint, message),
            _ => Diagnostic::warning(DiagnosticKind::Lint, message),
        };
        self.diagnostics.push(
            diagnostic
                .with_file(self.file)
                .with_offset(self.source, offset as usize)
                .with_rule(rule),
        );
    }

    fn mark_label(&mut self, name: &str) {
        if let Some(label) = self.labels.iter_mut().rev().find(|l| l.name == name) {
            label.used = true;
        }
    }
}

impl<'a> Visit<'a> for Linter<'_> {
    fn visit_debugger_statement(&mut self, it: &DebuggerStatement) {
        if let Some(level) = self.levels.no_debugger {
            self.report(level, "no-debugger", it.span.start, "Unexpected 'debugger' statement".into());
        }
    }

    fn visit_with_statement(&mut self, it: &WithStatement<'a>) {
        if let Some(level) = self.levels.no_with {
            self.report(level, "no-with", it.span.start, "Unexpected use of 'with' statement".into());
        }
        walk::walk_with_statement(self, it);
    }

    fn visit_object_expression(&mut self, it: &ObjectExpression<'a>) {
        if let Some(level) = self.levels.no_dupe_keys {
            let mut seen = FxHashSet::default();
            for prop in &it.properties {
                let ObjectPropertyKind::ObjectProperty(prop) = prop else {
                    continue;
                };
                if prop.computed || prop.kind != PropertyKind::Init {
                    continue;
                }
                let Some(name) = prop.key.static_name() else {
                    continue;
                };
                if !seen.insert(name.to_string()) {
                    self.report(
                        level,
                        "no-dupe-keys",
                        prop.key.span().start,
                        format!("Duplicate key '{name}'"),
                    );
                }
            }
        }
        walk::walk_object_expression(self, it);
    }

    fn visit_labeled_statement(&mut self, it: &LabeledStatement<'a>) {
        self.labels.push(Label {
            name: it.label.name.to_string(),
            offset: it.label.span.start,
            used: false,
        });
        walk::walk_labeled_statement(self, it);
        if let Some(label) = self.labels.pop() {
            if let (false, Some(level)) = (label.used, self.levels.no_unused_labels) {
                self.report(
                    level,
                    "no-unused-labels",
                    label.offset,
                    format!("'{}:' is defined but never used", label.name),
                );
            }
        }
    }

    fn visit_break_statement(&mut self, it: &BreakStatement<'a>) {
        if let Some(label) = &it.label {
            self.mark_label(label.name.as_str());
        }
    }

    fn visit_continue_statement(&mut self, it: &ContinueStatement<'a>) {
        if let Some(label) = &it.label {
            self.mark_label(label.name.as_str());
        }
    }
}

/// Run the configured rules over `program`.
pub fn lint(
    program: &Program,
    source: &Arc<String>,
    file: &str,
    config: &BTreeMap<String, LintLevel>,
) -> Vec<Diagnostic> {
    let mut linter = Linter {
        levels: Levels::from_config(config),
        source,
        file,
        labels: Vec::new(),
        diagnostics: Vec::new(),
    };
    linter.visit_program(program);
    linter.diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn run(code: &str, config: &BTreeMap<String, LintLevel>) -> Vec<Diagnostic> {
        let allocator = Allocator::default();
        let source = Arc::new(code.to_string());
        let ret = Parser::new(&allocator, &source, SourceType::mjs().with_module(false)).parse();
        assert!(ret.errors.is_empty(), "{:?}", ret.errors);
        lint(&ret.program, &source, "src/a.js", config)
    }

    fn defaults() -> BTreeMap<String, LintLevel> {
        [
            ("no-debugger", LintLevel::Error),
            ("no-dupe-keys", LintLevel::Error),
            ("no-with", LintLevel::Error),
            ("no-unused-labels", LintLevel::Warn),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn debugger_is_an_error_with_position() {
        let diags = run("var a = 1;\n  debugger;\n", &defaults());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
        assert_eq!((diags[0].line, diags[0].column), (Some(2), Some(3)));
        assert_eq!(diags[0].rule.as_deref(), Some("no-debugger"));
    }

    #[test]
    fn duplicate_keys() {
        let diags = run(
            "var o = { a: 1, 'a': 2, get b() { return 1 }, set b(v) {}, [c]: 1, [c]: 2 };",
            &defaults(),
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Duplicate key 'a'");
    }

    #[test]
    fn with_statement_in_sloppy_script() {
        let diags = run("with (obj) { x = 1; }", &defaults());
        assert_eq!(diags[0].rule.as_deref(), Some("no-with"));
    }

    #[test]
    fn unused_labels_warn() {
        let diags = run(
            "outer: for (;;) { inner: for (;;) { break outer; } }",
            &defaults(),
        );
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
        assert!(diags[0].message.starts_with("'inner:'"));
    }

    #[test]
    fn off_rules_do_not_run() {
        let mut config = defaults();
        config.insert("no-debugger".into(), LintLevel::Off);
        assert!(run("debugger;", &config).is_empty());
    }
}
