/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Path and formatter-chain expressions.
//!
//! The text inside a tag is parsed into an [`Expression`]: a [`Path`] followed
//! by zero or more `| formatter(args)` calls. Arguments are literals or nested
//! expressions, so `{{ title | pad_left(width | add(2), "-") }}` is valid.
//!
//! Parsing never fails outright. Problems are reported as [`ParseError`]s
//! next to a best-effort expression so that the document parser can keep
//! going.

use crate::error::{ParseError, ParseErrorKind};
use crate::value::Value;
use stachio_error_reporting::SourceSpan;
use std::fmt;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Member or key lookup.
    Name(String),
    /// Positional lookup (`items.0`).
    Index(usize),
    /// `.`: the current scope.
    SelfRef,
    /// `../`: step out to the enclosing scope.
    Parent,
    /// `~`: jump to the root data.
    Root,
}

/// A parsed path, e.g. `../user.emails.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
    /// The path as written, for diagnostics and observer callbacks.
    pub text: String,
}

impl Path {
    /// The current-scope path `.`.
    pub fn current() -> Self {
        Self {
            segments: vec![PathSegment::SelfRef],
            text: ".".to_string(),
        }
    }

    /// Parse a path from its textual form.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() {
            return Err("expected a path".to_string());
        }
        if text == "." || text == "this" {
            return Ok(Self {
                segments: vec![PathSegment::SelfRef],
                text: text.to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut rest = text;

        if let Some(after) = rest.strip_prefix('~') {
            segments.push(PathSegment::Root);
            rest = after.strip_prefix('.').unwrap_or(after);
        } else {
            while let Some(after) = rest.strip_prefix("../") {
                segments.push(PathSegment::Parent);
                rest = after;
            }
            if rest == ".." {
                segments.push(PathSegment::Parent);
                rest = "";
            }
        }

        if !rest.is_empty() {
            for part in rest.split('.') {
                segments.push(parse_segment(part, text)?);
            }
        } else if segments.is_empty() {
            return Err(format!("`{}` has no segments", text));
        }

        Ok(Self {
            segments,
            text: text.to_string(),
        })
    }

    /// True for `.`.
    pub fn is_current(&self) -> bool {
        matches!(self.segments.as_slice(), [PathSegment::SelfRef])
    }

    /// Name segments only, used by model inference.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Name(n) => Some(n.as_str()),
            _ => None,
        })
    }

    /// Whether the path is anchored at the root or steps out of the current scope.
    pub fn is_anchored(&self) -> bool {
        matches!(
            self.segments.first(),
            Some(PathSegment::Root | PathSegment::Parent)
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_segment(part: &str, path: &str) -> Result<PathSegment, String> {
    if part.is_empty() {
        return Err(format!("`{}` contains an empty segment", path));
    }
    if part.bytes().all(|b| b.is_ascii_digit()) {
        return part
            .parse::<usize>()
            .map(PathSegment::Index)
            .map_err(|_| format!("index `{}` is out of range", part));
    }
    if let Some(bad) = part.chars().find(|c| !is_name_char(*c)) {
        return Err(format!("unexpected character `{}` in `{}`", bad, path));
    }
    Ok(PathSegment::Name(part.to_string()))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '@')
}

fn is_path_char(c: char) -> bool {
    is_name_char(c) || matches!(c, '.' | '~' | '/')
}

/// A formatter invocation in a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterCall {
    pub name: String,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Literal(Value),
    Expression(Box<Expression>),
}

/// A path plus a formatter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub path: Path,
    pub formatters: Vec<FormatterCall>,
    pub span: SourceSpan,
}

impl Expression {
    /// An expression for the current scope with no formatters.
    pub fn current(span: SourceSpan) -> Self {
        Self {
            path: Path::current(),
            formatters: Vec::new(),
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for call in &self.formatters {
            write!(f, " | {}", call)?;
        }
        Ok(())
    }
}

impl fmt::Display for FormatterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Argument::Literal(v) => write!(f, "{}", v.render("null")),
            Argument::Expression(e) => write!(f, "{}", e),
        }
    }
}

/// Parse the content of a tag into an expression.
pub fn parse_expression(raw: &str, span: SourceSpan) -> (Expression, Vec<ParseError>) {
    let mut parser = ExpressionParser {
        src: raw,
        pos: 0,
        span,
        errors: Vec::new(),
    };
    let expression = parser.parse_top();
    (expression, parser.errors)
}

struct ExpressionParser<'s> {
    src: &'s str,
    pos: usize,
    span: SourceSpan,
    errors: Vec<ParseError>,
}

impl ExpressionParser<'_> {
    fn parse_top(&mut self) -> Expression {
        let expression = self.parse_chain();
        self.skip_ws();
        if self.pos < self.src.len() {
            let message = format!("unexpected `{}` in `{}`", &self.src[self.pos..], self.src);
            let kind = if expression.formatters.is_empty() {
                ParseErrorKind::InvalidPath
            } else {
                ParseErrorKind::MalformedFormatter
            };
            self.error(kind, message);
        }
        expression
    }

    /// `path ( '|' call )*`, stopping at `,` or `)` when nested.
    fn parse_chain(&mut self) -> Expression {
        self.skip_ws();
        let path = self.parse_path();
        let mut formatters = Vec::new();

        loop {
            self.skip_ws();
            if !self.eat('|') {
                break;
            }
            self.skip_ws();
            match self.parse_call() {
                Some(call) => formatters.push(call),
                None => self.recover(),
            }
        }

        Expression {
            path,
            formatters,
            span: self.span,
        }
    }

    fn parse_path(&mut self) -> Path {
        let src = self.src;
        let start = self.pos;
        self.take_while(is_path_char);
        let text = &src[start..self.pos];
        match Path::parse(text) {
            Ok(path) => path,
            Err(message) => {
                self.error(ParseErrorKind::InvalidPath, message);
                Path {
                    segments: Vec::new(),
                    text: text.to_string(),
                }
            }
        }
    }

    fn parse_call(&mut self) -> Option<FormatterCall> {
        let name = self
            .take_while(|c| c.is_alphanumeric() || c == '_')
            .to_string();
        if name.is_empty() {
            let message = format!("expected a formatter name after `|` in `{}`", self.src);
            self.error(ParseErrorKind::MalformedFormatter, message);
            return None;
        }

        self.skip_ws();
        let mut args = Vec::new();
        if self.eat('(') {
            self.skip_ws();
            if !self.eat(')') {
                loop {
                    args.push(self.parse_argument()?);
                    self.skip_ws();
                    if self.eat(',') {
                        continue;
                    }
                    if self.eat(')') {
                        break;
                    }
                    let message = if self.pos >= self.src.len() {
                        format!("argument list of `{}` is never closed", name)
                    } else {
                        format!("expected `,` or `)` in arguments of `{}`", name)
                    };
                    self.error(ParseErrorKind::MalformedFormatter, message);
                    return None;
                }
            }
        }

        Some(FormatterCall { name, args })
    }

    fn parse_argument(&mut self) -> Option<Argument> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.parse_string(q).map(|s| Argument::Literal(Value::String(s))),
            Some(c) if c.is_ascii_digit() || (c == '-' && self.peek_digit_after_sign()) => {
                self.parse_number().map(Argument::Literal)
            }
            Some(_) => {
                if let Some(value) = self.parse_keyword() {
                    return Some(Argument::Literal(value));
                }
                let before = self.errors.len();
                let nested = self.parse_chain();
                (self.errors.len() == before).then(|| Argument::Expression(Box::new(nested)))
            }
            None => {
                self.error(
                    ParseErrorKind::MalformedFormatter,
                    format!("expected an argument in `{}`", self.src),
                );
                None
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Option<String> {
        let src = self.src;
        self.pos += quote.len_utf8();
        let mut out = String::new();
        let mut chars = src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c if c == quote => {
                    self.pos += i + c.len_utf8();
                    return Some(out);
                }
                c => out.push(c),
            }
        }
        self.pos = self.src.len();
        self.error(
            ParseErrorKind::MalformedFormatter,
            format!("unterminated string literal in `{}`", self.src),
        );
        None
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        self.take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_'));
        let text = self.src[start..self.pos].replace('_', "");
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Int(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Some(Value::Float(f));
        }
        self.error(
            ParseErrorKind::MalformedFormatter,
            format!("invalid number literal `{}`", text),
        );
        None
    }

    /// `true`, `false` or `null` when followed by an argument boundary.
    fn parse_keyword(&mut self) -> Option<Value> {
        let rest = &self.src[self.pos..];
        for (word, value) in [
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("null", Value::Null),
        ] {
            if let Some(after) = rest.strip_prefix(word) {
                let boundary = after
                    .chars()
                    .next()
                    .is_none_or(|c| c.is_whitespace() || matches!(c, ',' | ')'));
                if boundary {
                    self.pos += word.len();
                    return Some(value);
                }
            }
        }
        None
    }

    /// Skip to the next top-level `|` outside quotes and parentheses.
    fn recover(&mut self) {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '(') => depth += 1,
                (None, ')') => depth = depth.saturating_sub(1),
                (None, '|') if depth == 0 => return,
                _ => {}
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_digit_after_sign(&self) -> bool {
        self.src[self.pos..]
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn error(&mut self, kind: ParseErrorKind, message: impl Into<String>) {
        self.errors.push(ParseError::new(kind, message, self.span));
    }
}
