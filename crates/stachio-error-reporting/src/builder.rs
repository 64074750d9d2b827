/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::catalog;
use crate::diagnostic::{Detail, DetailKind, DiagnosticMessage, Severity};
use crate::span::SourceSpan;

/// Fluent construction of a [`DiagnosticMessage`].
///
/// ```
/// use stachio_error_reporting::DiagnosticMessageBuilder;
///
/// let msg = DiagnosticMessageBuilder::error("Unresolved formatter")
///     .with_code("T-2-1")
///     .problem("No overload of `pad_left` accepts (Int, String)")
///     .add_detail("`pad_left` is registered for (String, Int)")
///     .build();
/// assert_eq!(msg.code.as_deref(), Some("T-2-1"));
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(Severity::Error, title),
        }
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(Severity::Warning, title),
        }
    }

    /// Start from a catalog entry: its title, code and hint.
    ///
    /// Unknown codes still get the code; the title is the code itself.
    pub fn from_code(code: &str) -> Self {
        let info = catalog::get_error_info(code);
        let title = info.map_or(code, |info| info.title.as_str());
        let mut builder = Self::error(title).with_code(code);
        if let Some(hint) = info.and_then(|info| info.hint.as_deref()) {
            builder = builder.add_hint(hint);
        }
        builder
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    pub fn with_location(mut self, location: SourceSpan) -> Self {
        self.message.location = Some(location);
        self
    }

    pub fn add_detail(self, text: impl Into<String>) -> Self {
        self.detail(DetailKind::Error, text.into(), None)
    }

    /// Error detail drawn as an extra label in source snippets.
    pub fn add_detail_at(self, text: impl Into<String>, span: SourceSpan) -> Self {
        self.detail(DetailKind::Error, text.into(), Some(span))
    }

    pub fn add_info(self, text: impl Into<String>) -> Self {
        self.detail(DetailKind::Info, text.into(), None)
    }

    pub fn add_note(self, text: impl Into<String>) -> Self {
        self.detail(DetailKind::Note, text.into(), None)
    }

    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }

    fn detail(mut self, kind: DetailKind, text: String, span: Option<SourceSpan>) -> Self {
        self.message.details.push(Detail { kind, text, span });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_details_keep_order() {
        let msg = DiagnosticMessageBuilder::warning("Careful")
            .add_detail("first")
            .add_info("second")
            .add_note("third")
            .build();

        let kinds: Vec<_> = msg.details.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DetailKind::Error, DetailKind::Info, DetailKind::Note]);
        assert_eq!(msg.severity, Severity::Warning);
    }

    #[test]
    fn test_from_code_uses_catalog() {
        let msg = DiagnosticMessageBuilder::from_code("T-1-2").build();
        assert_eq!(msg.title, "Unclosed block");
        assert_eq!(msg.code.as_deref(), Some("T-1-2"));
        assert_eq!(msg.hints.len(), 1);
    }

    #[test]
    fn test_from_unknown_code() {
        let msg = DiagnosticMessageBuilder::from_code("T-9-9").build();
        assert_eq!(msg.title, "T-9-9");
        assert!(msg.hints.is_empty());
    }
}
