//! Build diagnostics.
//!
//! Every stage reports problems as [`Diagnostic`] values instead of returning
//! early, so one build can surface every syntax error at once. The pipeline
//! driver turns the error-severity ones into [`crate::Error::Build`].

mod miette;

pub use self::miette::SourceContext;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Syntax,
    Semantic,
    Lint,
    Resolve,
    Transform,
    Style,
    /// A module no transformation rule claims
    Rule,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Lint => "lint",
            DiagnosticKind::Resolve => "resolve",
            DiagnosticKind::Transform => "transform",
            DiagnosticKind::Style => "style",
            DiagnosticKind::Rule => "rule",
        })
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single problem found while building, with its location when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// Project-relative path of the offending file
    pub file: Option<String>,
    /// 1-based
    pub line: Option<u32>,
    /// 1-based, in characters
    pub column: Option<u32>,
    pub help: Option<String>,
    /// Lint rule name for [`DiagnosticKind::Lint`]
    pub rule: Option<String>,
    #[serde(skip)]
    pub context: Option<SourceContext>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            help: None,
            rule: None,
            context: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Attach a byte offset into `source`; fills in line and column.
    pub fn with_offset(mut self, source: &Arc<String>, offset: usize) -> Self {
        let (line, column) = line_column(source, offset);
        self.line = Some(line);
        self.column = Some(column);
        self.context = Some(SourceContext::new(Arc::clone(source), offset, self.kind));
        self
    }

    /// Attach a 1-based line and column (as reported by CSS tooling).
    pub fn with_position(mut self, source: &Arc<String>, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        if let Some(offset) = line_col_to_offset(source, line, column) {
            self.context = Some(SourceContext::new(Arc::clone(source), offset, self.kind));
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `file:line:column: message`, with whatever location parts are known.
    pub fn headline(&self) -> String {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => {
                format!("{file}:{line}:{column}: {}", self.message)
            }
            (Some(file), _, _) => format!("{file}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{} ({rule})", self.headline()),
            None => f.write_str(&self.headline()),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// True when any diagnostic is fatal.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// 1-based line and character column of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line as u32, column as u32)
}

/// Convert line and column to byte offset
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line as usize {
            let col = column.saturating_sub(1) as usize;
            let col_bytes = text
                .char_indices()
                .nth(col)
                .map(|(pos, _)| pos)
                .unwrap_or(text.len());
            return Some(offset + col_bytes);
        }
        offset += text.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one() {
        let src = "let a = 1;\nlet b = ;\n";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 19), (2, 9));
        assert_eq!(line_column(src, 10_000), (3, 1));
    }

    #[test]
    fn offsets_round_trip_through_positions() {
        let src = "a {\n  color: red;\n}\n";
        let offset = line_col_to_offset(src, 2, 3).unwrap();
        assert_eq!(&src[offset..offset + 5], "color");
        assert_eq!(line_column(src, offset), (2, 3));
        assert!(line_col_to_offset(src, 9, 1).is_none());
    }

    #[test]
    fn headline_includes_location() {
        let source = Arc::new("debugger;\n".to_string());
        let diag = Diagnostic::error(DiagnosticKind::Lint, "Unexpected 'debugger' statement")
            .with_file("src/index.js")
            .with_offset(&source, 0)
            .with_rule("no-debugger");
        assert_eq!(
            diag.to_string(),
            "src/index.js:1:1: Unexpected 'debugger' statement (no-debugger)"
        );
        assert!(diag.is_error());
    }

    #[test]
    fn warnings_are_not_fatal() {
        let diags = vec![Diagnostic::warning(DiagnosticKind::Lint, "unused label")];
        assert!(!has_errors(&diags));
    }
}
