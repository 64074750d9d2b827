/*
 * partials.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lookup of partials defined outside the template being rendered.
//!
//! `{{> name}}` first looks for a `{{#declare name}}` block rendered earlier
//! in the same template, then asks the [`PartialStore`] configured in
//! [`ParserOptions`](crate::ParserOptions).

use crate::ast::Document;
use crate::error::ParseErrors;
use crate::options::ParserOptions;
use crate::parser::parse_document;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Source of pre-parsed partial documents.
pub trait PartialStore: fmt::Debug + Send + Sync {
    fn get_partial(&self, name: &str) -> Option<Arc<Document>>;
}

/// A store that knows no partials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPartialStore;

impl PartialStore for NullPartialStore {
    fn get_partial(&self, _name: &str) -> Option<Arc<Document>> {
        None
    }
}

/// Partials held in memory by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryPartialStore {
    partials: HashMap<String, Arc<Document>>,
}

impl MemoryPartialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already parsed document. Replaces any partial of the same name.
    pub fn insert(&mut self, name: impl Into<String>, document: Arc<Document>) {
        self.partials.insert(name.into(), document);
    }

    /// Parse `source` and store it under `name`.
    ///
    /// A partial with parse errors is rejected, since it could never be rendered.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        source: &str,
        options: &ParserOptions,
    ) -> Result<(), ParseErrors> {
        let document = parse_document(source, options);
        if !document.is_valid() {
            return Err(ParseErrors(document.errors));
        }
        self.insert(name, Arc::new(document));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }
}

impl PartialStore for MemoryPartialStore {
    fn get_partial(&self, name: &str) -> Option<Arc<Document>> {
        self.partials.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    #[test]
    fn test_add_and_lookup() {
        let mut store = MemoryPartialStore::new();
        store
            .add("greeting", "Hello {{name}}", &ParserOptions::default())
            .unwrap();
        assert!(store.contains("greeting"));
        assert_eq!(store.len(), 1);
        let document = store.get_partial("greeting").unwrap();
        assert_eq!(document.items.len(), 2);
        assert!(store.get_partial("missing").is_none());
    }

    #[test]
    fn test_invalid_partial_is_rejected() {
        let mut store = MemoryPartialStore::new();
        let errors = store
            .add("broken", "{{#if x}}never closed", &ParserOptions::default())
            .unwrap_err();
        assert_eq!(errors.0[0].kind, ParseErrorKind::UnclosedBlock);
        assert!(store.is_empty());
    }

    #[test]
    fn test_null_store() {
        assert!(NullPartialStore.get_partial("anything").is_none());
    }
}
