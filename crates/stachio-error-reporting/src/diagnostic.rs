/*
 * diagnostic.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The diagnostic message type and its text and JSON renderings.

use crate::span::{SourceFile, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        }
    }
}

/// Bullet style of a detail line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// `✖`
    Error,
    /// `ℹ`
    Info,
    /// `•`
    Note,
}

impl DetailKind {
    fn bullet(self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub kind: DetailKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

/// One reported problem: a title with an optional code, a problem
/// statement, bulleted details and hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub severity: Severity,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Detail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
}

impl DiagnosticMessage {
    pub fn new(severity: Severity, title: impl Into<String>) -> Self {
        Self {
            code: None,
            severity,
            title: title.into(),
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(Severity::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Render as text.
    ///
    /// When `source` is given and the message has a location, the title,
    /// problem and located details are drawn as an ariadne snippet and only
    /// unlocated details follow as bullets. Otherwise:
    ///
    /// ```text
    /// Error [T-1-2]: Unclosed block (at 3:7)
    /// `if` is opened but never closed
    /// ✖ detail
    /// ? hint
    /// ```
    pub fn to_text(&self, source: Option<&SourceFile>) -> String {
        let snippet = source.and_then(|file| self.snippet(file));
        let mut out = String::new();

        match snippet {
            Some(snippet) => {
                out.push_str(&snippet);
                for detail in self.details.iter().filter(|d| d.span.is_none()) {
                    push_bullet(&mut out, detail.kind.bullet(), &detail.text);
                }
            }
            None => {
                self.write_header(&mut out);
                if let Some(problem) = &self.problem {
                    out.push_str(problem);
                    out.push('\n');
                }
                for detail in &self.details {
                    push_bullet(&mut out, detail.kind.bullet(), &detail.text);
                }
            }
        }

        for hint in &self.hints {
            push_bullet(&mut out, "?", hint);
        }
        out
    }

    /// Render as JSON for tooling.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    fn write_header(&self, out: &mut String) {
        out.push_str(self.severity.label());
        if let Some(code) = &self.code {
            let _ = write!(out, " [{}]", code);
        }
        let _ = write!(out, ": {}", self.title);
        if let Some(at) = &self.location {
            let _ = write!(out, " (at {}:{})", at.line, at.column);
        }
        out.push('\n');
    }

    fn heading(&self) -> String {
        match &self.code {
            Some(code) => format!("[{}] {}", code, self.title),
            None => self.title.clone(),
        }
    }

    fn snippet(&self, file: &SourceFile) -> Option<String> {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let location = self
            .location
            .as_ref()
            .or_else(|| self.details.iter().find_map(|d| d.span.as_ref()))?;
        let text = file.content.as_str();
        let main = char_range(text, location)?;

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let name = file.name.clone();
        let mut report = Report::build(kind, name.clone(), main.start)
            .with_config(Config::default().with_color(false))
            .with_message(self.heading())
            .with_label(
                Label::new((name.clone(), main)).with_message(self.problem.as_deref().unwrap_or(&self.title)),
            );

        for detail in &self.details {
            if let Some(range) = detail.span.as_ref().and_then(|span| char_range(text, span)) {
                report = report.with_label(Label::new((name.clone(), range)).with_message(&detail.text));
            }
        }

        let mut buffer = Vec::new();
        report
            .finish()
            .write((name, Source::from(text)), &mut buffer)
            .ok()?;
        String::from_utf8(buffer).ok()
    }
}

fn push_bullet(out: &mut String, bullet: &str, text: &str) {
    let _ = writeln!(out, "{} {}", bullet, text);
}

/// ariadne 0.4 labels count characters.
fn char_range(text: &str, span: &SourceSpan) -> Option<std::ops::Range<usize>> {
    let chars_before = |offset: usize| text.get(..offset).map(|prefix| prefix.chars().count());
    let start = chars_before(span.start)?;
    let end = chars_before(span.end.max(span.start))?;
    Some(start..end)
}
