/*
 * scope.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Per-render mutable state.

use crate::ast::DocumentItem;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Timing of one rendered section, partial or custom item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSample {
    /// `if`, `unless`, `each`, `with`, `partial`, or a provider name.
    pub kind: String,
    /// The expression or partial name.
    pub label: String,
    pub elapsed: Duration,
    /// Partial depth at which the item was rendered.
    pub depth: usize,
}

/// State owned by exactly one render call.
#[derive(Debug, Default)]
pub struct ScopeData {
    partial_stack: Vec<String>,
    partials: HashMap<String, Arc<[DocumentItem]>>,
    profile: Option<Vec<ProfileSample>>,
}

impl ScopeData {
    pub fn new(profile: bool) -> Self {
        Self {
            profile: profile.then(Vec::new),
            ..Self::default()
        }
    }

    /// Current partial nesting depth.
    pub fn partial_depth(&self) -> usize {
        self.partial_stack.len()
    }

    /// Names of the partials currently being rendered, outermost first.
    pub fn partial_stack(&self) -> &[String] {
        &self.partial_stack
    }

    pub(crate) fn enter_partial(&mut self, name: &str) {
        self.partial_stack.push(name.to_string());
    }

    pub(crate) fn leave_partial(&mut self) {
        self.partial_stack.pop();
    }

    /// Register a `{{#declare}}` body. Later declarations replace earlier ones.
    pub fn declare_partial(&mut self, name: impl Into<String>, body: Arc<[DocumentItem]>) {
        self.partials.insert(name.into(), body);
    }

    pub fn declared_partial(&self, name: &str) -> Option<Arc<[DocumentItem]>> {
        self.partials.get(name).cloned()
    }

    pub fn is_profiling(&self) -> bool {
        self.profile.is_some()
    }

    pub fn record(&mut self, kind: impl Into<String>, label: impl Into<String>, elapsed: Duration) {
        let depth = self.partial_depth();
        if let Some(samples) = &mut self.profile {
            samples.push(ProfileSample {
                kind: kind.into(),
                label: label.into(),
                elapsed,
                depth,
            });
        }
    }

    pub fn take_profile(&mut self) -> Option<Vec<ProfileSample>> {
        self.profile.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_stack() {
        let mut scope = ScopeData::new(false);
        scope.enter_partial("a");
        scope.enter_partial("b");
        assert_eq!(scope.partial_depth(), 2);
        assert_eq!(scope.partial_stack(), ["a".to_string(), "b".to_string()]);
        scope.leave_partial();
        assert_eq!(scope.partial_depth(), 1);
    }

    #[test]
    fn test_profile_only_when_enabled() {
        let mut off = ScopeData::new(false);
        off.record("each", "items", Duration::from_millis(1));
        assert!(off.take_profile().is_none());

        let mut on = ScopeData::new(true);
        on.enter_partial("row");
        on.record("each", "items", Duration::from_millis(1));
        let samples = on.take_profile().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].depth, 1);
    }
}
