/*
 * custom.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Host-defined document items.
//!
//! A [`CustomDocumentItemProvider`] can claim raw tags during tokenizing and
//! tokens during parsing before the built-in handling sees them, and renders
//! the items it produced. Providers are consulted in registration order and
//! the first one to accept wins.
//!
//! Block providers return [`CustomParse::Open`] for their opening tag and
//! [`CustomParse::Close`] for the closer; the parser keeps them on the same
//! scope stack as built-in sections, so custom and built-in blocks nest and
//! are validated together.

use crate::ast::{CustomItem, DocumentItem};
use crate::context::ExpectedKind;
use crate::error::{ParseError, TemplateResult};
use crate::expression::Expression;
use crate::options::ParserOptions;
use crate::parser::ScopeStack;
use crate::scope::ScopeData;
use crate::token::{Token, TokenInfo, TokenKind};
use crate::value::Value;

/// What a provider made of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomParse {
    /// A finished leaf item.
    Item(DocumentItem),
    /// Opens a block; following items become its children until the closer.
    Open(CustomItem),
    /// Closes the innermost block, which must carry this name.
    Close(String),
    /// Drop the token.
    Skip,
}

pub trait CustomDocumentItemProvider: Send + Sync {
    /// Unique name; [`CustomItem::provider`] refers back to it.
    fn name(&self) -> &str;

    /// Claim a raw tag (delimiters stripped) during tokenizing.
    fn should_tokenize(&self, _raw: &str) -> bool {
        false
    }

    /// Turn a claimed tag into tokens.
    fn tokenize(&self, info: &TokenInfo<'_>, _options: &ParserOptions) -> Vec<Token> {
        vec![Token::new(
            TokenKind::Custom(self.name().to_string()),
            info.raw,
            info.span,
        )]
    }

    /// Claim a token during parsing. By default a provider claims the
    /// custom tokens it produced.
    fn should_parse(&self, token: &Token, _options: &ParserOptions) -> bool {
        matches!(&token.kind, TokenKind::Custom(name) if name == self.name())
    }

    fn parse(
        &self,
        token: &Token,
        options: &ParserOptions,
        scopes: &ScopeStack,
    ) -> Result<CustomParse, ParseError>;

    /// Render an item this provider produced.
    fn render(&self, item: &CustomItem, renderer: &mut dyn ItemRenderer) -> TemplateResult<()>;
}

/// The renderer as seen by a provider, bound to the current scope.
pub trait ItemRenderer {
    /// Write text to the output as-is.
    fn write(&mut self, text: &str) -> TemplateResult<()>;

    /// Resolve and format an expression in the current scope. `None` if the
    /// path is absent.
    fn evaluate(&mut self, expression: &Expression, expected: ExpectedKind) -> TemplateResult<Option<Value>>;

    /// Render items in the current scope.
    fn render_children(&mut self, items: &[DocumentItem]) -> TemplateResult<()>;

    /// Render items with `value` as a new innermost scope.
    fn render_with_value(&mut self, items: &[DocumentItem], value: Value) -> TemplateResult<()>;

    fn scope_data(&mut self) -> &mut ScopeData;

    fn options(&self) -> &ParserOptions;
}
