//! Miette rendering for build diagnostics.

use std::sync::Arc;

use miette::{LabeledSpan, Severity as MietteSeverity, SourceCode};

use super::{Diagnostic, DiagnosticKind, Severity};

/// Source text plus the span a diagnostic points at.
#[derive(Debug, Clone)]
pub struct SourceContext {
    source: Arc<String>,
    offset: usize,
    len: usize,
}

impl SourceContext {
    pub(crate) fn new(source: Arc<String>, offset: usize, kind: DiagnosticKind) -> Self {
        let offset = offset.min(source.len());
        let len = calculate_span_length(&source, offset, kind);
        Self {
            source,
            offset,
            len,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Length of the highlighted token starting at `offset`.
fn calculate_span_length(source: &str, offset: usize, kind: DiagnosticKind) -> usize {
    let Some(remaining) = source.get(offset..) else {
        return 0;
    };
    if remaining.is_empty() {
        return 0;
    }

    if kind == DiagnosticKind::Resolve {
        if let Some(quote) = remaining.chars().next().filter(|c| matches!(c, '"' | '\'')) {
            if let Some(end) = remaining[1..].find(quote) {
                return end + 2;
            }
        }
    }

    remaining
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$' || *c == '-'))
        .map(|(pos, c)| if pos == 0 { c.len_utf8() } else { pos })
        .unwrap_or(remaining.len())
}

fn label_for(kind: DiagnosticKind) -> &'static str {
    match kind {
        DiagnosticKind::Syntax => "syntax error",
        DiagnosticKind::Semantic => "invalid here",
        DiagnosticKind::Lint => "lint",
        DiagnosticKind::Resolve => "unresolved",
        DiagnosticKind::Transform => "transform failed",
        DiagnosticKind::Style => "stylesheet error",
        DiagnosticKind::Rule => "no matching rule",
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match &self.rule {
            Some(rule) => format!("kiln::{}::{rule}", self.kind),
            None => format!("kiln::{}", self.kind),
        }))
    }

    fn severity(&self) -> Option<MietteSeverity> {
        Some(match self.severity {
            Severity::Error => MietteSeverity::Error,
            Severity::Warning => MietteSeverity::Warning,
        })
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h.as_str()) as Box<dyn std::fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context
            .as_ref()
            .map(|ctx| &*ctx.source as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.context.as_ref()?;
        Some(Box::new(std::iter::once(LabeledSpan::new(
            Some(label_for(self.kind).to_string()),
            ctx.offset,
            ctx.len,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;

    #[test]
    fn span_covers_identifier() {
        assert_eq!(calculate_span_length("debugger;", 0, DiagnosticKind::Lint), 8);
        assert_eq!(calculate_span_length("; x", 0, DiagnosticKind::Syntax), 1);
    }

    #[test]
    fn span_covers_quoted_request() {
        let src = r#"import a from "./missing";"#;
        let offset = src.find('"').unwrap();
        assert_eq!(
            calculate_span_length(src, offset, DiagnosticKind::Resolve),
            "\"./missing\"".len()
        );
    }

    #[test]
    fn labels_point_into_source() {
        let source = Arc::new("a {\n  colr red\n}".to_string());
        let diag = Diagnostic::error(DiagnosticKind::Style, "Unexpected token")
            .with_position(&source, 2, 3);
        let labels: Vec<_> = diag.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 6);
        assert!(diag.source_code().is_some());
        assert_eq!(diag.code().unwrap().to_string(), "kiln::style");
    }
}
