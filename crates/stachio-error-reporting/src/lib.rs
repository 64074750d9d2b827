/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structured diagnostics for stachio templates.
//!
//! A [`DiagnosticMessage`] has a title, an optional code from the embedded
//! catalog (`T-1-2`), a problem statement, bulleted details that may point at
//! a [`SourceSpan`], and hints. It renders as plain text, as an ariadne
//! snippet when the [`SourceFile`] is at hand, or as JSON.
//!
//! # Example
//!
//! ```
//! use stachio_error_reporting::{DiagnosticMessageBuilder, SourceFile, SourceSpan};
//!
//! let source = SourceFile::new("greeting.stache", "Hello {{#if name}}!");
//! let message = DiagnosticMessageBuilder::from_code("T-1-2")
//!     .problem("`if` is opened but never closed")
//!     .with_location(SourceSpan::new(6, 18, 1, 7))
//!     .build();
//!
//! let text = message.to_text(Some(&source));
//! assert!(text.contains("Unclosed block"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;
pub mod span;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, codes_in, get_error_info, get_subsystem};
pub use diagnostic::{Detail, DetailKind, DiagnosticMessage, Severity};
pub use span::{SourceFile, SourceSpan};
