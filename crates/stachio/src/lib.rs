/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mustache-style template engine.
//!
//! Templates are parsed once into an immutable document tree and rendered
//! any number of times, concurrently if needed, against a data [`Value`].
//! The syntax covers:
//!
//! - Output: `{{path}}` (HTML-escaped), `{{{path}}}` and `{{& path}}` (raw)
//! - Paths: `a.b.c`, `items.0`, `this`/`.`, `../parent`, `~.root`
//! - Formatter chains: `{{name | trim | pad_left(10)}}`
//! - Sections: `{{#if x}}`, `{{^if x}}`, `{{#each xs}}`, `{{#with x}}`,
//!   mustache-style `{{#x}}` (scoped) and `{{^x}}`, each with an optional
//!   `{{else}}`
//! - Loop metadata: `$index`, `$first`, `$last`, `$odd`, `$even`
//! - Partials: `{{#declare name}}...{{/declare}}` and `{{> name}}`
//! - Comments: `{{! ignored }}`
//!
//! Formatters are resolved at render time by name and by the runtime types
//! of their arguments. Rendering is bounded by a partial depth limit, an
//! output size cap, a timeout and a caller-supplied cancellation token.
//!
//! # Example
//!
//! ```
//! use stachio::{Template, Value};
//! use serde_json::json;
//!
//! let template = Template::parse_with_defaults("{{#each users}}{{name | upper}} {{/each}}");
//! let data = Value::from(json!({"users": [{"name": "ada"}, {"name": "alan"}]}));
//! assert_eq!(template.render(&data).unwrap(), "ADA ALAN ");
//! ```

pub mod ast;
mod builtins;
pub mod cancellation;
pub mod context;
pub mod custom;
pub mod error;
pub mod escape;
pub mod expression;
pub mod formatter;
pub mod inference;
pub mod options;
pub mod parser;
pub mod partials;
pub mod renderer;
pub mod scope;
pub mod sink;
pub mod token;
pub mod value;

// Re-export main types at crate root
pub use ast::{CustomItem, Document, DocumentItem, SectionKind};
pub use cancellation::RenderSignal;
pub use context::{ContextObject, ExpectedKind, LoopMeta, ValueResolver};
pub use custom::{CustomDocumentItemProvider, CustomParse, ItemRenderer};
pub use error::{ParseError, ParseErrorKind, ParseErrors, TemplateError, TemplateResult};
pub use expression::{Argument, Expression, FormatterCall, Path, PathSegment};
pub use formatter::{FormatterError, FormatterRegistry, ParamType, Signature};
pub use inference::InferredModel;
pub use options::{Encoding, ParserOptions, PartialStackOverflowBehavior, RenderSettings};
pub use parser::{ScopeEntry, ScopeStack, Template};
pub use partials::{MemoryPartialStore, NullPartialStore, PartialStore};
pub use renderer::RenderOutput;
pub use scope::{ProfileSample, ScopeData};
pub use sink::OutputSink;
pub use token::{Token, TokenInfo, TokenKind};
pub use value::{Object, Value, ValueType};

pub use tokio_util::sync::CancellationToken;
