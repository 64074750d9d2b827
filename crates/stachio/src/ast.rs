/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Document tree types.
//!
//! A parsed template is an ordered forest of [`DocumentItem`]s. Parents own
//! their children; partial bodies are reference-counted so that rendering can
//! register them without copying the subtree.

use crate::error::ParseError;
use crate::expression::Expression;
use crate::inference::InferredModel;
use stachio_error_reporting::SourceSpan;
use std::sync::Arc;

/// How a section decides whether, and how often, to render its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Render once if the value is truthy.
    Truthy,
    /// Render once if the value is falsy.
    Falsy,
    /// Render once per element, each element becoming the current scope.
    Each,
    /// Render once with the value as the current scope.
    With,
    /// Mustache `{{#x}}`: once per element of a non-empty sequence, once
    /// with any other truthy value as the scope, not at all when falsy.
    Scoped,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Truthy => "if",
            SectionKind::Falsy => "unless",
            SectionKind::Each => "each",
            SectionKind::With => "with",
            SectionKind::Scoped => "section",
        }
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentItem {
    /// Literal text, written as-is.
    Literal(String),

    /// `{{expr}}`: resolve, format, stringify and write.
    Output {
        expression: Expression,
        escape: bool,
        span: SourceSpan,
    },

    /// A block section. `otherwise` holds the `{{else}}` branch.
    Section {
        kind: SectionKind,
        expression: Expression,
        children: Vec<DocumentItem>,
        otherwise: Vec<DocumentItem>,
        span: SourceSpan,
    },

    /// `{{> name}}`
    PartialReference { name: String, span: SourceSpan },

    /// `{{#declare name}}...{{/declare}}`
    PartialDefinition {
        name: String,
        body: Arc<[DocumentItem]>,
        span: SourceSpan,
    },

    /// An item contributed by a custom document item provider.
    Custom(CustomItem),
}

impl DocumentItem {
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            DocumentItem::Literal(_) => None,
            DocumentItem::Output { span, .. }
            | DocumentItem::Section { span, .. }
            | DocumentItem::PartialReference { span, .. }
            | DocumentItem::PartialDefinition { span, .. } => Some(*span),
            DocumentItem::Custom(item) => Some(item.span),
        }
    }

    /// Direct children, in document order.
    pub fn children(&self) -> Box<dyn Iterator<Item = &DocumentItem> + '_> {
        match self {
            DocumentItem::Section {
                children, otherwise, ..
            } => Box::new(children.iter().chain(otherwise.iter())),
            DocumentItem::PartialDefinition { body, .. } => Box::new(body.iter()),
            DocumentItem::Custom(item) => Box::new(item.children.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

/// Payload of a provider-defined item.
///
/// `provider` names the [`CustomDocumentItemProvider`](crate::CustomDocumentItemProvider)
/// that renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomItem {
    pub provider: String,
    /// Tag name; for block items, the closer must repeat it.
    pub tag: String,
    pub expression: Option<Expression>,
    /// Free-form provider data.
    pub payload: serde_json::Value,
    pub children: Vec<DocumentItem>,
    pub span: SourceSpan,
}

impl CustomItem {
    pub fn new(provider: impl Into<String>, tag: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            provider: provider.into(),
            tag: tag.into(),
            expression: None,
            payload: serde_json::Value::Null,
            children: Vec::new(),
            span,
        }
    }

    pub fn with_expression(mut self, expression: Expression) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// The result of parsing: the tree plus everything that went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub items: Arc<[DocumentItem]>,
    pub errors: Vec<ParseError>,
    pub inferred_model: Option<InferredModel>,
}

impl Document {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Depth-first walk over every item.
    pub fn walk(&self) -> impl Iterator<Item = &DocumentItem> {
        let mut stack: Vec<&DocumentItem> = self.items.iter().rev().collect();
        std::iter::from_fn(move || {
            let item = stack.pop()?;
            let children: Vec<_> = item.children().collect();
            stack.extend(children.into_iter().rev());
            Some(item)
        })
    }
}
