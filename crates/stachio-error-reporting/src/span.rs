/*
 * span.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source locations inside template text.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A byte range in a template together with the line/column of its start.
///
/// `line` and `column` are 1-based; `column` counts characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Byte range of the span.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Smallest span covering both `self` and `other`; position info comes
    /// from whichever starts first.
    pub fn merge(&self, other: &SourceSpan) -> SourceSpan {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        SourceSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: first.line,
            column: first.column,
        }
    }
}

/// A named piece of template source, used to render source snippets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        let span = SourceSpan::new(3, 9, 1, 4);
        assert_eq!(span.range(), 3..9);
    }

    #[test]
    fn test_merge_keeps_earliest_position() {
        let a = SourceSpan::new(10, 14, 2, 3);
        let b = SourceSpan::new(2, 5, 1, 3);
        let merged = a.merge(&b);
        assert_eq!(merged, SourceSpan::new(2, 14, 1, 3));
    }
}
