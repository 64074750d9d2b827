/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render-time scopes and path resolution.
//!
//! A [`ContextObject`] is one step of the scope chain: the value a path
//! resolved to plus a borrowed reference to the scope it was resolved in.
//! Children never own their parents, so the chain lives exactly as long as
//! the render call that built it.

use crate::expression::{Path, PathSegment};
use crate::options::ParserOptions;
use crate::value::Value;
use std::borrow::Cow;
use std::fmt;

static NULL: Value = Value::Null;

/// Host hook for member lookup on arbitrary values.
///
/// Consulted before structural lookup for every name segment; returning
/// `None` falls back to map keys and [`Object`](crate::Object) members.
pub trait ValueResolver: Send + Sync {
    fn resolve(&self, value: &Value, name: &str) -> Option<Value>;
}

impl<F> ValueResolver for F
where
    F: Fn(&Value, &str) -> Option<Value> + Send + Sync,
{
    fn resolve(&self, value: &Value, name: &str) -> Option<Value> {
        self(value, name)
    }
}

/// What a path was being resolved for; passed to the unresolved-path observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedKind {
    /// Output of `{{expr}}`.
    Value,
    /// `#if`, `^if` and `^x`.
    Condition,
    /// `#each`.
    Sequence,
    /// `#with` and mustache sections.
    Scope,
    /// A path used as a formatter argument.
    FormatterArgument,
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectedKind::Value => "value",
            ExpectedKind::Condition => "condition",
            ExpectedKind::Sequence => "sequence",
            ExpectedKind::Scope => "scope",
            ExpectedKind::FormatterArgument => "formatter argument",
        };
        f.write_str(name)
    }
}

/// Position of the current element inside an `each` iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopMeta {
    pub index: usize,
    pub len: usize,
}

impl LoopMeta {
    /// Value of a `$`-prefixed loop variable, if `name` is one.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "$index" => Some(Value::from(self.index)),
            "$first" => Some(Value::Bool(self.index == 0)),
            "$last" => Some(Value::Bool(self.index + 1 == self.len)),
            "$odd" => Some(Value::Bool(self.index % 2 == 1)),
            "$even" => Some(Value::Bool(self.index % 2 == 0)),
            _ => None,
        }
    }
}

fn is_loop_variable(name: &str) -> bool {
    matches!(name, "$index" | "$first" | "$last" | "$odd" | "$even")
}

/// A scope during rendering.
#[derive(Debug, Clone)]
pub struct ContextObject<'a> {
    path: String,
    value: Option<Cow<'a, Value>>,
    parent: Option<&'a ContextObject<'a>>,
    from_resolver: bool,
    loop_meta: Option<LoopMeta>,
}

impl<'a> ContextObject<'a> {
    /// The outermost scope of a render.
    pub fn root(value: &'a Value) -> Self {
        Self {
            path: String::new(),
            value: Some(Cow::Borrowed(value)),
            parent: None,
            from_resolver: false,
            loop_meta: None,
        }
    }

    /// A scope nested in `parent`.
    pub fn child(parent: &'a ContextObject<'a>, path: impl Into<String>, value: Cow<'a, Value>) -> Self {
        Self {
            path: path.into(),
            value: Some(value),
            parent: Some(parent),
            from_resolver: false,
            loop_meta: None,
        }
    }

    fn absent(parent: &'a ContextObject<'a>, path: &str) -> Self {
        Self {
            path: path.to_string(),
            value: None,
            parent: Some(parent),
            from_resolver: false,
            loop_meta: None,
        }
    }

    pub fn with_loop_meta(mut self, meta: LoopMeta) -> Self {
        self.loop_meta = Some(meta);
        self
    }

    /// The resolved value, or `None` if resolution found nothing.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    /// The resolved value with absence collapsed to null.
    pub fn value_or_null(&self) -> &Value {
        self.value.as_deref().unwrap_or(&NULL)
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<&'a ContextObject<'a>> {
        self.parent
    }

    /// Whether the final segment came from the host [`ValueResolver`].
    pub fn from_resolver(&self) -> bool {
        self.from_resolver
    }

    pub fn loop_meta(&self) -> Option<LoopMeta> {
        self.loop_meta
    }

    /// The outermost scope of this chain.
    pub fn root_context(&self) -> &ContextObject<'a> {
        let mut current = self;
        while let Some(parent) = current.parent {
            current = parent;
        }
        current
    }

    /// Truthiness of the resolved value; absence is falsy.
    pub fn is_truthy(&self) -> bool {
        self.value().is_some_and(Value::is_truthy)
    }

    pub fn into_value(self) -> Option<Value> {
        self.value.map(Cow::into_owned)
    }

    /// Innermost loop metadata visible from this scope.
    fn nearest_loop(&self) -> Option<LoopMeta> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx.loop_meta.is_some() {
                return ctx.loop_meta;
            }
            current = ctx.parent;
        }
        None
    }

    /// The scope's value, borrowed for the lifetime of the chain when possible.
    fn borrowed_value(&'a self) -> Option<Cow<'a, Value>> {
        match self.value.as_ref()? {
            Cow::Borrowed(v) => Some(Cow::Borrowed(*v)),
            Cow::Owned(v) => Some(Cow::Borrowed(v)),
        }
    }
}

/// Resolve `path` starting from `ctx`.
///
/// Never fails: a path that finds nothing yields an absent context and the
/// configured observer is told once.
pub fn resolve_path<'c>(
    ctx: &'c ContextObject<'c>,
    path: &Path,
    expected: ExpectedKind,
    options: &ParserOptions,
) -> ContextObject<'c> {
    let resolved = lookup(ctx, path, options);
    match resolved {
        Some((value, from_resolver)) => ContextObject {
            path: path.text.clone(),
            value: Some(value),
            parent: Some(ctx),
            from_resolver,
            loop_meta: None,
        },
        None => {
            tracing::trace!(path = %path, %expected, "unresolved path");
            if let Some(observer) = &options.unresolved_observer {
                observer(&path.text, expected);
            }
            ContextObject::absent(ctx, &path.text)
        }
    }
}

fn lookup<'c>(
    ctx: &'c ContextObject<'c>,
    path: &Path,
    options: &ParserOptions,
) -> Option<(Cow<'c, Value>, bool)> {
    let segments = path.segments.as_slice();
    let mut scope = ctx;
    let mut rest = segments;

    match segments.first()? {
        PathSegment::SelfRef => {
            return ctx.borrowed_value().map(|v| (v, ctx.from_resolver));
        }
        PathSegment::Root => {
            scope = ctx.root_context();
            rest = &segments[1..];
        }
        PathSegment::Parent => {
            while let [PathSegment::Parent, tail @ ..] = rest {
                scope = scope.parent?;
                rest = tail;
            }
        }
        _ => {}
    }

    let Some((first, tail)) = rest.split_first() else {
        return scope.borrowed_value().map(|v| (v, false));
    };

    let mut from_resolver = false;
    let mut current = match first {
        PathSegment::Name(name) if is_loop_variable(name) => {
            Cow::Owned(scope.nearest_loop()?.lookup(name)?)
        }
        _ if path.is_anchored() => step(scope.borrowed_value()?, first, options, &mut from_resolver)?,
        _ => ascend(scope, first, options, &mut from_resolver)?,
    };

    for segment in tail {
        current = step(current, segment, options, &mut from_resolver)?;
    }
    Some((current, from_resolver))
}

/// Look `segment` up in `scope`, then in each enclosing scope.
fn ascend<'c>(
    scope: &'c ContextObject<'c>,
    segment: &PathSegment,
    options: &ParserOptions,
    from_resolver: &mut bool,
) -> Option<Cow<'c, Value>> {
    let mut current = Some(scope);
    while let Some(ctx) = current {
        if let Some(value) = ctx.borrowed_value() {
            if let Some(found) = step(value, segment, options, from_resolver) {
                return Some(found);
            }
        }
        current = ctx.parent;
    }
    None
}

fn step<'v>(
    current: Cow<'v, Value>,
    segment: &PathSegment,
    options: &ParserOptions,
    from_resolver: &mut bool,
) -> Option<Cow<'v, Value>> {
    match current {
        Cow::Borrowed(value) => lookup_segment(value, segment, options, from_resolver),
        Cow::Owned(value) => lookup_segment(&value, segment, options, from_resolver)
            .map(|found| Cow::Owned(found.into_owned())),
    }
}

fn lookup_segment<'v>(
    value: &'v Value,
    segment: &PathSegment,
    options: &ParserOptions,
    from_resolver: &mut bool,
) -> Option<Cow<'v, Value>> {
    match segment {
        PathSegment::Name(name) => {
            if let Some(resolver) = &options.value_resolver {
                if let Some(found) = resolver.resolve(value, name) {
                    *from_resolver = true;
                    return Some(Cow::Owned(found));
                }
            }
            *from_resolver = false;
            value.get_member(name)
        }
        PathSegment::Index(index) => {
            *from_resolver = false;
            value.get_index(*index)
        }
        PathSegment::SelfRef => Some(Cow::Borrowed(value)),
        PathSegment::Parent | PathSegment::Root => None,
    }
}
