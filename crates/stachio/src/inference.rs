/*
 * inference.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Data model inference.
//!
//! With `infer_model` enabled, parsing records which data paths a template
//! reads. Paths inside `{{#each}}` are recorded relative to the iterated
//! elements, so `{{#each items}}{{name}}{{/each}}` yields `items[].name`.

use crate::ast::{DocumentItem, SectionKind};
use crate::expression::{Argument, Expression, PathSegment};
use serde::Serialize;
use std::collections::BTreeMap;

/// A node of the inferred data model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferredModel {
    /// Members read from this value.
    pub children: BTreeMap<String, InferredModel>,
    /// Whether the value is iterated.
    pub sequence: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Element,
}

impl InferredModel {
    pub fn from_items(items: &[DocumentItem]) -> Self {
        let mut model = InferredModel::default();
        let mut scopes = vec![Vec::new()];
        model.collect(items, &mut scopes);
        model
    }

    pub fn get(&self, key: &str) -> Option<&InferredModel> {
        self.children.get(key)
    }

    /// Every recorded path, e.g. `["items[]", "items[].name"]`.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.push_paths("", &mut out);
        out
    }

    fn push_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, child) in &self.children {
            let mut path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            if child.sequence {
                path.push_str("[]");
            }
            out.push(path.clone());
            child.push_paths(&path, out);
        }
    }

    fn collect(&mut self, items: &[DocumentItem], scopes: &mut Vec<Vec<Step>>) {
        for item in items {
            match item {
                DocumentItem::Literal(_) | DocumentItem::PartialReference { .. } => {}
                DocumentItem::Output { expression, .. } => {
                    self.record(expression, scopes);
                }
                DocumentItem::Section {
                    kind,
                    expression,
                    children,
                    otherwise,
                    ..
                } => {
                    let steps = self.record(expression, scopes);
                    match (*kind, steps) {
                        (SectionKind::Each, Some(mut steps)) => {
                            self.insert(&steps).sequence = true;
                            steps.push(Step::Element);
                            scopes.push(steps);
                            self.collect(children, scopes);
                            scopes.pop();
                        }
                        (SectionKind::With | SectionKind::Scoped, Some(steps)) => {
                            scopes.push(steps);
                            self.collect(children, scopes);
                            scopes.pop();
                        }
                        _ => self.collect(children, scopes),
                    }
                    self.collect(otherwise, scopes);
                }
                DocumentItem::PartialDefinition { body, .. } => self.collect(body, scopes),
                DocumentItem::Custom(custom) => {
                    if let Some(expression) = &custom.expression {
                        self.record(expression, scopes);
                    }
                    self.collect(&custom.children, scopes);
                }
            }
        }
    }

    /// Record the path and formatter arguments of `expression`; returns the
    /// absolute steps of the path.
    fn record(&mut self, expression: &Expression, scopes: &[Vec<Step>]) -> Option<Vec<Step>> {
        for call in &expression.formatters {
            for arg in &call.args {
                if let Argument::Expression(nested) = arg {
                    self.record(nested, scopes);
                }
            }
        }
        let steps = absolute_steps(expression, scopes)?;
        self.insert(&steps);
        Some(steps)
    }

    fn insert(&mut self, steps: &[Step]) -> &mut InferredModel {
        let mut node = self;
        for step in steps {
            node = match step {
                Step::Key(key) => node.children.entry(key.clone()).or_default(),
                Step::Element => {
                    node.sequence = true;
                    node
                }
            };
        }
        node
    }
}

fn absolute_steps(expression: &Expression, scopes: &[Vec<Step>]) -> Option<Vec<Step>> {
    let segments = &expression.path.segments;
    let mut depth = scopes.len().checked_sub(1)?;
    let mut rest = segments.as_slice();

    match rest.first()? {
        PathSegment::Root => {
            depth = 0;
            rest = &rest[1..];
        }
        PathSegment::Parent => {
            while let [PathSegment::Parent, tail @ ..] = rest {
                depth = depth.checked_sub(1)?;
                rest = tail;
            }
        }
        _ => {}
    }

    let mut steps = scopes[depth].clone();
    for segment in rest {
        match segment {
            PathSegment::Name(name) if name.starts_with('$') => return None,
            PathSegment::Name(name) => steps.push(Step::Key(name.clone())),
            PathSegment::Index(_) => steps.push(Step::Element),
            PathSegment::SelfRef | PathSegment::Parent | PathSegment::Root => {}
        }
    }
    Some(steps)
}
