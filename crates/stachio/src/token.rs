/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template tokenizer.
//!
//! Splits raw template text into a flat, document-ordered list of [`Token`]s.
//! Tags are recognised by the configured delimiters (`{{` / `}}` by default)
//! and classified by their first character:
//!
//! | Tag            | Token                           |
//! |----------------|---------------------------------|
//! | `{{! ...}}`    | comment                         |
//! | `{{#each x}}`  | block-open (each)               |
//! | `{{#with x}}`  | block-open (with)               |
//! | `{{#if x}}`    | block-open (truthy)             |
//! | `{{^if x}}`    | block-open (falsy)              |
//! | `{{#x}}`       | block-open (scoped, named `x`)  |
//! | `{{^x}}`       | block-open (falsy, named `x`)   |
//! | `{{#declare n}}` | block-open (partial definition) |
//! | `{{/name}}`    | block-close                     |
//! | `{{else}}`     | else                            |
//! | `{{> name}}`   | partial reference               |
//! | `{{& x}}`, `{{{x}}}` | unescaped expression      |
//! | anything else  | expression                      |
//!
//! The tokenizer never fails: problems are returned as [`ParseError`]s and
//! scanning resumes at the next opening delimiter.

use crate::ast::SectionKind;
use crate::error::{ParseError, ParseErrorKind};
use crate::options::ParserOptions;
use stachio_error_reporting::SourceSpan;

/// What kind of block a block-open token starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Section(SectionKind),
    /// `{{#declare name}}`: a partial definition.
    Declare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text between tags.
    Text,
    Comment,
    /// An expression to output; `escape` is false for `{{{x}}}` and `{{& x}}`.
    Expression { escape: bool },
    /// Opens a block. `name` is what the matching closer must repeat.
    BlockOpen { block: BlockKind, name: String },
    /// Closes the block named by the token value.
    BlockClose,
    Else,
    PartialReference,
    /// A token produced by a custom document item provider.
    Custom(String),
}

/// A classified piece of template text.
///
/// `value` holds the payload: the literal text, the expression source, the
/// partial or block name, or the raw tag content for custom tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: SourceSpan,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            value: value.into(),
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}

/// The raw tag handed to a custom provider's `tokenize`.
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo<'s> {
    /// Tag content with delimiters and surrounding whitespace removed.
    pub raw: &'s str,
    /// Span of the whole tag including delimiters.
    pub span: SourceSpan,
}

/// Maps byte offsets to 1-based line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            source,
            line_starts,
        }
    }

    pub fn span(&self, start: usize, end: usize) -> SourceSpan {
        let line = self.line_starts.partition_point(|&s| s <= start);
        let line_start = self.line_starts[line - 1];
        let column = self
            .source
            .get(line_start..start)
            .map_or(start - line_start, |s| s.chars().count())
            + 1;
        SourceSpan::new(start, end, line, column)
    }
}

/// Tokenize `template` using the delimiters and providers in `options`.
pub fn tokenize(template: &str, options: &ParserOptions) -> (Vec<Token>, Vec<ParseError>) {
    let settings = &options.settings;
    if settings.open_delimiter.is_empty() || settings.close_delimiter.is_empty() {
        let error = ParseError::new(
            ParseErrorKind::InvalidDelimiter,
            format!(
                "delimiters must not be empty (open `{}`, close `{}`)",
                settings.open_delimiter, settings.close_delimiter
            ),
            SourceSpan::new(0, 0, 1, 1),
        );
        return (Vec::new(), vec![error]);
    }
    let mut tokenizer = Tokenizer::new(template, options);
    tokenizer.run();
    (tokenizer.tokens, tokenizer.errors)
}

struct Tokenizer<'s, 'o> {
    source: &'s str,
    options: &'o ParserOptions,
    open: &'o str,
    close: &'o str,
    lines: LineIndex<'s>,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

impl<'s, 'o> Tokenizer<'s, 'o> {
    fn new(source: &'s str, options: &'o ParserOptions) -> Self {
        Self {
            source,
            options,
            open: &options.settings.open_delimiter,
            close: &options.settings.close_delimiter,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(&mut self) {
        let len = self.source.len();
        let mut pos = 0;

        while pos < len {
            let Some(rel) = self.source[pos..].find(self.open) else {
                self.push_text(pos, len);
                break;
            };
            let tag_start = pos + rel;
            self.push_text(pos, tag_start);

            let after_open = tag_start + self.open.len();
            let raw = self.source[after_open..].starts_with('{');
            let content_start = after_open + usize::from(raw);
            let closer = if raw {
                format!("}}{}", self.close)
            } else {
                self.close.to_string()
            };

            let close_rel = self.source[content_start..].find(closer.as_str());
            let next_open = self.source[content_start..].find(self.open);

            let close_rel = match (close_rel, next_open) {
                (Some(c), Some(n)) if n < c => None,
                (c, _) => c,
            };

            let Some(close_rel) = close_rel else {
                let resume = next_open.map_or(len, |n| content_start + n);
                self.errors.push(ParseError::new(
                    ParseErrorKind::UnclosedTag,
                    format!("`{}` is never closed with `{}`", self.open, closer),
                    self.lines.span(tag_start, resume),
                ));
                self.push_text(tag_start, resume);
                pos = resume;
                continue;
            };

            let content = &self.source[content_start..content_start + close_rel];
            let tag_end = content_start + close_rel + closer.len();
            let span = self.lines.span(tag_start, tag_end);
            self.classify(content.trim(), raw, span);
            pos = tag_end;
        }
    }

    /// Push literal text, merging with a directly preceding text token.
    fn push_text(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let text = &self.source[start..end];
        if let Some(last) = self.tokens.last_mut() {
            if last.kind == TokenKind::Text && last.span.end == start {
                last.value.push_str(text);
                last.span.end = end;
                return;
            }
        }
        let span = self.lines.span(start, end);
        self.tokens.push(Token::new(TokenKind::Text, text, span));
    }

    fn classify(&mut self, content: &str, raw: bool, span: SourceSpan) {
        let options = self.options;
        if let Some(provider) = options
            .providers
            .iter()
            .find(|p| p.should_tokenize(content))
        {
            let info = TokenInfo { raw: content, span };
            self.tokens.extend(provider.tokenize(&info, options));
            return;
        }

        if raw {
            self.push(TokenKind::Expression { escape: false }, content, span);
            return;
        }

        let Some(first) = content.chars().next() else {
            self.errors.push(ParseError::new(
                ParseErrorKind::EmptyTag,
                "tag contains no expression",
                span,
            ));
            return;
        };
        let rest = content[first.len_utf8()..].trim();

        match first {
            '!' => self.push(TokenKind::Comment, rest, span),
            '#' => {
                let (keyword, argument) = split_keyword(rest);
                let (block, name, value) = match keyword {
                    "each" => (BlockKind::Section(SectionKind::Each), keyword, argument),
                    "with" => (BlockKind::Section(SectionKind::With), keyword, argument),
                    "if" => (BlockKind::Section(SectionKind::Truthy), keyword, argument),
                    "declare" => (BlockKind::Declare, keyword, argument),
                    _ => (BlockKind::Section(SectionKind::Scoped), rest, rest),
                };
                let name = name.to_string();
                self.push(TokenKind::BlockOpen { block, name }, value, span);
            }
            '^' => {
                let (keyword, argument) = split_keyword(rest);
                let (name, value) = match keyword {
                    "if" => (keyword, argument),
                    _ => (rest, rest),
                };
                let block = BlockKind::Section(SectionKind::Falsy);
                let name = name.to_string();
                self.push(TokenKind::BlockOpen { block, name }, value, span);
            }
            '/' => self.push(TokenKind::BlockClose, rest, span),
            '>' => self.push(TokenKind::PartialReference, rest, span),
            '&' => self.push(TokenKind::Expression { escape: false }, rest, span),
            _ if content == "else" => self.push(TokenKind::Else, "", span),
            _ => self.push(TokenKind::Expression { escape: true }, content, span),
        }
    }

    fn push(&mut self, kind: TokenKind, value: &str, span: SourceSpan) {
        self.tokens.push(Token::new(kind, value, span));
    }
}

/// Split `each items` into (`each`, `items`).
fn split_keyword(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((keyword, argument)) => (keyword, argument.trim()),
        None => (s, ""),
    }
}
