/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing and rendering.
//!
//! Parse problems are collected as [`ParseError`] values and returned next to
//! the (possibly partial) document tree. Render problems abort the render and
//! surface as a single [`TemplateError`].

use stachio_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder, SourceFile, SourceSpan};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The category of a parse problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// A closing tag that does not match the innermost open block.
    UnexpectedToken,
    /// A block opened but never closed before the end of input.
    UnclosedBlock,
    /// An opening delimiter without a closing delimiter.
    UnclosedTag,
    /// A path expression that does not follow the path grammar.
    InvalidPath,
    /// A formatter call or argument list that does not parse.
    MalformedFormatter,
    /// A tag with nothing inside it.
    EmptyTag,
    /// An empty opening or closing delimiter.
    InvalidDelimiter,
}

impl ParseErrorKind {
    /// Stable error code from the diagnostics catalog.
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedToken => "T-1-1",
            ParseErrorKind::UnclosedBlock => "T-1-2",
            ParseErrorKind::UnclosedTag => "T-1-3",
            ParseErrorKind::InvalidPath => "T-1-4",
            ParseErrorKind::MalformedFormatter => "T-1-5",
            ParseErrorKind::EmptyTag => "T-1-6",
            ParseErrorKind::InvalidDelimiter => "T-1-7",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedToken => "Unexpected token",
            ParseErrorKind::UnclosedBlock => "Unclosed block",
            ParseErrorKind::UnclosedTag => "Unclosed tag",
            ParseErrorKind::InvalidPath => "Invalid path",
            ParseErrorKind::MalformedFormatter => "Malformed formatter call",
            ParseErrorKind::EmptyTag => "Empty tag",
            ParseErrorKind::InvalidDelimiter => "Invalid delimiter",
        }
    }
}

/// A single problem found while tokenizing or parsing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// 1-based line the problem starts on.
    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        DiagnosticMessageBuilder::from_code(self.kind.code())
            .problem(self.message.clone())
            .with_location(self.span)
            .build()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: {}",
            self.kind.title(),
            self.span.line,
            self.span.column,
            self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Every parse error of a template, aggregated for a refused render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render every error with a source snippet.
    pub fn render(&self, source: &SourceFile) -> String {
        self.0
            .iter()
            .map(|e| e.to_diagnostic().to_text(Some(source)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template has {} parse error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

/// Errors that abort a render.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse; rendering it is refused.
    #[error("{0}")]
    Parse(ParseErrors),

    /// No registered formatter overload accepts the call.
    #[error("No formatter overload matches {name}{signature} (line {line})")]
    UnresolvedFormatter {
        name: String,
        signature: String,
        line: usize,
    },

    /// A formatter was selected but rejected its arguments.
    #[error("Formatter '{name}' failed: {message}")]
    FormatterInvocation { name: String, message: String },

    /// A partial reference names no declared or stored partial.
    #[error("Partial not found: {name}")]
    PartialNotFound { name: String },

    /// Partial inclusion went deeper than the configured stack size.
    #[error("Partial stack overflow in '{name}' (stack size {max_depth})")]
    PartialStackOverflow { name: String, max_depth: usize },

    /// The output sink refused a write past its size limit.
    #[error("Output limit of {limit} bytes reached")]
    OutputLimitExceeded { limit: usize },

    /// The caller cancelled the render.
    #[error("Render cancelled")]
    Cancelled,

    /// The render ran past its deadline.
    #[error("Render timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// I/O error opening or writing the destination.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    /// Stable error code from the diagnostics catalog.
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::Parse(errors) => errors
                .iter()
                .next()
                .map_or("T-0-1", |e| e.kind.code()),
            TemplateError::UnresolvedFormatter { .. } => "T-2-1",
            TemplateError::FormatterInvocation { .. } => "T-2-2",
            TemplateError::PartialStackOverflow { .. } => "T-2-3",
            TemplateError::PartialNotFound { .. } => "T-2-4",
            TemplateError::OutputLimitExceeded { .. } => "T-2-5",
            TemplateError::Timeout { .. } => "T-2-6",
            TemplateError::Cancelled => "T-2-7",
            TemplateError::Io(_) => "T-0-1",
        }
    }

    /// Whether the render was stopped by cancellation or its deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TemplateError::Cancelled | TemplateError::Timeout { .. })
    }

    /// Convert into diagnostic messages, one per underlying problem.
    pub fn to_diagnostics(&self) -> Vec<DiagnosticMessage> {
        match self {
            TemplateError::Parse(errors) => errors.iter().map(|e| e.to_diagnostic()).collect(),
            other => vec![
                DiagnosticMessageBuilder::from_code(other.code())
                    .problem(other.to_string())
                    .build(),
            ],
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
