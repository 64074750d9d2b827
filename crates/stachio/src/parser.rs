/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Document parser.
//!
//! Builds the document tree from the token stream in a single left-to-right
//! pass. Open blocks live on an explicit [`ScopeStack`]; each entry has a
//! frame collecting its children. Mismatched closers and blocks left open at
//! the end are reported as [`ParseError`]s and recovered from, so one parse
//! reports every problem in the template.

use crate::ast::{CustomItem, Document, DocumentItem, SectionKind};
use crate::custom::CustomParse;
use crate::error::{ParseError, ParseErrorKind, TemplateError};
use crate::expression::{Expression, parse_expression};
use crate::inference::InferredModel;
use crate::options::ParserOptions;
use crate::token::{BlockKind, Token, TokenKind, tokenize};
use stachio_error_reporting::{SourceFile, SourceSpan};
use std::path::Path;
use std::sync::Arc;

/// A parsed template, ready to render.
///
/// Parsing never fails; check [`Template::errors`] or [`Template::is_valid`].
/// Rendering a template with parse errors is refused.
#[derive(Debug, Clone)]
pub struct Template {
    source: Arc<str>,
    document: Arc<Document>,
    options: Arc<ParserOptions>,
}

impl Template {
    /// Parse a template.
    ///
    /// # Example
    ///
    /// ```
    /// use stachio::{ParserOptions, Template};
    /// use std::sync::Arc;
    ///
    /// let template = Template::parse("Hello {{name}}!", Arc::new(ParserOptions::default()));
    /// assert!(template.is_valid());
    /// ```
    pub fn parse(source: &str, options: Arc<ParserOptions>) -> Self {
        let document = parse_document(source, &options);
        Self {
            source: Arc::from(source),
            document: Arc::new(document),
            options,
        }
    }

    /// Parse with default options and the built-in formatters.
    pub fn parse_with_defaults(source: &str) -> Self {
        Self::parse(source, Arc::new(ParserOptions::default()))
    }

    /// Read and parse a template file.
    pub fn from_file(path: impl AsRef<Path>, options: Arc<ParserOptions>) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::parse(&source, options))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn items(&self) -> &[DocumentItem] {
        &self.document.items
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.document.errors
    }

    pub fn is_valid(&self) -> bool {
        self.document.is_valid()
    }

    pub fn options(&self) -> &Arc<ParserOptions> {
        &self.options
    }

    /// Referenced data paths; `None` unless `infer_model` was enabled.
    pub fn inferred_model(&self) -> Option<&InferredModel> {
        self.document.inferred_model.as_ref()
    }

    /// Every parse error rendered with a source snippet.
    pub fn render_errors(&self, filename: &str) -> String {
        let file = SourceFile::new(filename, self.source.as_ref());
        self.errors()
            .iter()
            .map(|e| e.to_diagnostic().to_text(Some(&file)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tokenize and parse `source` into a [`Document`].
pub fn parse_document(source: &str, options: &ParserOptions) -> Document {
    let (tokens, mut errors) = tokenize(source, options);
    let (items, parse_errors) = parse_tokens(&tokens, options);
    errors.extend(parse_errors);
    errors.sort_by_key(|e| e.span.start);

    let inferred_model = options
        .settings
        .infer_model
        .then(|| InferredModel::from_items(&items));

    tracing::debug!(
        tokens = tokens.len(),
        items = items.len(),
        errors = errors.len(),
        "parsed template"
    );

    Document {
        items: items.into(),
        errors,
        inferred_model,
    }
}

/// An open block awaiting its closer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    /// What the closer must repeat: `if`, `each`, `with`, `declare`, the
    /// section path for mustache-style sections, or a custom tag.
    pub name: String,
    /// Index of the opening token.
    pub token_index: usize,
    pub span: SourceSpan,
}

/// Parse-time stack of open blocks, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    entries: Vec<ScopeEntry>,
}

impl ScopeStack {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn innermost(&self) -> Option<&ScopeEntry> {
        self.entries.last()
    }

    /// Whether a block with this name is open at any depth.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScopeEntry> {
        self.entries.iter()
    }

    fn push(&mut self, entry: ScopeEntry) {
        self.entries.push(entry);
    }

    fn pop(&mut self) -> Option<ScopeEntry> {
        self.entries.pop()
    }
}

/// What a frame turns into once closed.
#[derive(Debug)]
enum Opener {
    Section {
        kind: SectionKind,
        expression: Expression,
    },
    Declare {
        name: String,
    },
    Custom(CustomItem),
}

#[derive(Debug)]
struct Frame {
    opener: Opener,
    children: Vec<DocumentItem>,
    otherwise: Option<Vec<DocumentItem>>,
}

impl Frame {
    fn new(opener: Opener) -> Self {
        Self {
            opener,
            children: Vec::new(),
            otherwise: None,
        }
    }

    fn into_item(self, span: SourceSpan) -> DocumentItem {
        match self.opener {
            Opener::Section { kind, expression } => DocumentItem::Section {
                kind,
                expression,
                children: self.children,
                otherwise: self.otherwise.unwrap_or_default(),
                span,
            },
            Opener::Declare { name } => DocumentItem::PartialDefinition {
                name,
                body: self.children.into(),
                span,
            },
            Opener::Custom(mut item) => {
                item.children = self.children;
                item.span = span;
                DocumentItem::Custom(item)
            }
        }
    }
}

/// Build the document tree from tokens.
pub fn parse_tokens(tokens: &[Token], options: &ParserOptions) -> (Vec<DocumentItem>, Vec<ParseError>) {
    let mut parser = Parser {
        options,
        root: Vec::new(),
        frames: Vec::new(),
        scopes: ScopeStack::default(),
        errors: Vec::new(),
    };
    for (index, token) in tokens.iter().enumerate() {
        parser.token(index, token);
    }
    parser.finish()
}

struct Parser<'o> {
    options: &'o ParserOptions,
    root: Vec<DocumentItem>,
    frames: Vec<Frame>,
    scopes: ScopeStack,
    errors: Vec<ParseError>,
}

impl Parser<'_> {
    fn token(&mut self, index: usize, token: &Token) {
        let options = self.options;
        if let Some(provider) = options
            .providers
            .iter()
            .find(|p| p.should_parse(token, options))
        {
            match provider.parse(token, options, &self.scopes) {
                Ok(CustomParse::Item(item)) => self.push_item(item),
                Ok(CustomParse::Open(item)) => {
                    let name = item.tag.clone();
                    self.open(Opener::Custom(item), name, index, token.span);
                }
                Ok(CustomParse::Close(name)) => self.close(&name, token),
                Ok(CustomParse::Skip) => {}
                Err(error) => self.errors.push(error),
            }
            return;
        }

        match &token.kind {
            TokenKind::Text => self.push_item(DocumentItem::Literal(token.value.clone())),
            TokenKind::Comment => {}
            TokenKind::Expression { escape } => {
                let expression = self.expression(token);
                let escape = *escape && !options.settings.disable_content_escaping;
                self.push_item(DocumentItem::Output {
                    expression,
                    escape,
                    span: token.span,
                });
            }
            TokenKind::BlockOpen {
                block: BlockKind::Section(kind),
                name,
            } => {
                let expression = self.expression(token);
                let opener = Opener::Section {
                    kind: *kind,
                    expression,
                };
                self.open(opener, name.clone(), index, token.span);
            }
            TokenKind::BlockOpen {
                block: BlockKind::Declare,
                name,
            } => {
                if token.value.is_empty() {
                    self.error(ParseErrorKind::InvalidPath, "`declare` needs a partial name", token.span);
                }
                let opener = Opener::Declare {
                    name: token.value.clone(),
                };
                self.open(opener, name.clone(), index, token.span);
            }
            TokenKind::BlockClose => self.close(&token.value, token),
            TokenKind::Else => self.otherwise(token),
            TokenKind::PartialReference => {
                if token.value.is_empty() {
                    self.error(ParseErrorKind::InvalidPath, "`>` needs a partial name", token.span);
                    return;
                }
                self.push_item(DocumentItem::PartialReference {
                    name: token.value.clone(),
                    span: token.span,
                });
            }
            TokenKind::Custom(provider) => {
                let message = format!("no provider named `{}` accepts `{}`", provider, token.value);
                self.error(ParseErrorKind::UnexpectedToken, message, token.span);
            }
        }
    }

    fn expression(&mut self, token: &Token) -> Expression {
        let (expression, errors) = parse_expression(&token.value, token.span);
        self.errors.extend(errors);
        expression
    }

    fn push_item(&mut self, item: DocumentItem) {
        match self.frames.last_mut() {
            Some(Frame {
                otherwise: Some(otherwise),
                ..
            }) => otherwise.push(item),
            Some(frame) => frame.children.push(item),
            None => self.root.push(item),
        }
    }

    fn open(&mut self, opener: Opener, name: String, token_index: usize, span: SourceSpan) {
        self.scopes.push(ScopeEntry {
            name,
            token_index,
            span,
        });
        self.frames.push(Frame::new(opener));
    }

    fn close(&mut self, name: &str, token: &Token) {
        let Some(innermost) = self.scopes.innermost() else {
            let message = format!("`/{}` does not close any open block", name);
            self.error(ParseErrorKind::UnexpectedToken, message, token.span);
            return;
        };

        if innermost.name != name {
            let message = format!(
                "`/{}` does not match the open `{}` from line {}",
                name, innermost.name, innermost.span.line
            );
            self.error(ParseErrorKind::UnexpectedToken, message, token.span);
            return;
        }

        if let (Some(entry), Some(frame)) = (self.scopes.pop(), self.frames.pop()) {
            let item = frame.into_item(entry.span.merge(&token.span));
            self.push_item(item);
        }
    }

    fn otherwise(&mut self, token: &Token) {
        let Some(frame) = self.frames.last_mut() else {
            self.error(ParseErrorKind::UnexpectedToken, "`else` outside of a section", token.span);
            return;
        };
        let is_section = matches!(frame.opener, Opener::Section { .. });
        let message = match (is_section, frame.otherwise.is_some()) {
            (true, false) => {
                frame.otherwise = Some(Vec::new());
                return;
            }
            (_, true) => "a section can only have one `else`",
            (false, false) => "`else` outside of a section",
        };
        self.error(ParseErrorKind::UnexpectedToken, message, token.span);
    }

    /// Report blocks left open and fold them into their parents.
    fn finish(mut self) -> (Vec<DocumentItem>, Vec<ParseError>) {
        while let (Some(entry), Some(frame)) = (self.scopes.pop(), self.frames.pop()) {
            let message = format!("`{}` is never closed", entry.name);
            self.error(ParseErrorKind::UnclosedBlock, message, entry.span);
            let item = frame.into_item(entry.span);
            self.push_item(item);
        }
        (self.root, self.errors)
    }

    fn error(&mut self, kind: ParseErrorKind, message: impl Into<String>, span: SourceSpan) {
        self.errors.push(ParseError::new(kind, message, span));
    }
}
