/*
 * renderer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tree-walking renderer.
//!
//! Walks a document depth-first against a chain of [`ContextObject`]s and
//! writes through an [`OutputSink`]. The render signal is polled before every
//! item and every loop iteration. Partial depth is tracked with a guard that
//! restores the depth on every exit path, errors included.

use crate::ast::{CustomItem, DocumentItem, SectionKind};
use crate::cancellation::RenderSignal;
use crate::context::{ContextObject, ExpectedKind, LoopMeta, resolve_path};
use crate::custom::ItemRenderer;
use crate::error::{ParseErrors, TemplateError, TemplateResult};
use crate::escape::escape_html;
use crate::expression::{Argument, Expression};
use crate::formatter::FormatterResolutionError;
use crate::options::{ParserOptions, PartialStackOverflowBehavior};
use crate::parser::Template;
use crate::scope::{ProfileSample, ScopeData};
use crate::sink::OutputSink;
use crate::value::Value;
use std::borrow::Cow;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The destination of a finished render.
#[derive(Debug)]
pub struct RenderOutput<W> {
    pub output: W,
    pub bytes_written: usize,
    /// True if the output cap stopped the render early.
    pub limit_reached: bool,
    /// Timing samples, when profiling is enabled.
    pub profile: Option<Vec<ProfileSample>>,
}

impl Template {
    /// Render to a string with no cancellation.
    pub fn render(&self, data: &Value) -> TemplateResult<String> {
        self.render_to_string(data, None)
    }

    /// Render into memory and decode with the configured encoding.
    ///
    /// A render stopped by the output cap is
    /// [`TemplateError::OutputLimitExceeded`]; use
    /// [`render_to_writer`](Self::render_to_writer) to keep the capped output.
    pub fn render_to_string(
        &self,
        data: &Value,
        cancellation: Option<&CancellationToken>,
    ) -> TemplateResult<String> {
        let output = self.render_to_writer(data, Vec::new(), cancellation)?;
        self.decode_complete(output)
    }

    /// Render into `writer`.
    ///
    /// On any error other than reaching the output cap, `writer` is dropped
    /// and the error returned. Reaching the cap returns the writer with
    /// [`RenderOutput::limit_reached`] set.
    pub fn render_to_writer<W: Write>(
        &self,
        data: &Value,
        writer: W,
        cancellation: Option<&CancellationToken>,
    ) -> TemplateResult<RenderOutput<W>> {
        let signal = RenderSignal::new(cancellation, self.options().settings.timeout());
        self.render_with_signal(data, writer, &signal)
    }

    /// Render into a writer opened by `factory`.
    ///
    /// Parse errors are reported before the factory runs; a factory error is
    /// returned as [`TemplateError::Io`] before rendering starts.
    pub fn render_with_factory<W, F>(
        &self,
        data: &Value,
        factory: F,
        cancellation: Option<&CancellationToken>,
    ) -> TemplateResult<RenderOutput<W>>
    where
        W: Write,
        F: FnOnce() -> io::Result<W>,
    {
        self.ensure_valid()?;
        let writer = factory()?;
        self.render_to_writer(data, writer, cancellation)
    }

    /// Render from async code. `timeout` overrides the configured timeout.
    pub async fn render_async(
        &self,
        data: &Value,
        cancellation: Option<CancellationToken>,
        timeout: Option<Duration>,
    ) -> TemplateResult<String> {
        tokio::task::yield_now().await;
        let timeout = timeout.or_else(|| self.options().settings.timeout());
        let signal = RenderSignal::new(cancellation.as_ref(), timeout);
        let output = self.render_with_signal(data, Vec::new(), &signal)?;
        self.decode_complete(output)
    }

    fn decode_complete(&self, output: RenderOutput<Vec<u8>>) -> TemplateResult<String> {
        let settings = &self.options().settings;
        if output.limit_reached {
            return Err(TemplateError::OutputLimitExceeded {
                limit: settings.max_size,
            });
        }
        Ok(settings.encoding.decode(&output.output))
    }

    fn ensure_valid(&self) -> TemplateResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        tracing::warn!(
            errors = self.errors().len(),
            "refusing to render a template with parse errors"
        );
        Err(TemplateError::Parse(ParseErrors(self.errors().to_vec())))
    }

    fn render_with_signal<W: Write>(
        &self,
        data: &Value,
        writer: W,
        signal: &RenderSignal,
    ) -> TemplateResult<RenderOutput<W>> {
        self.ensure_valid()?;
        signal.check()?;

        let options = self.options();
        let settings = &options.settings;
        let mut sink = OutputSink::new(writer, settings.encoding, settings.max_size);
        let mut renderer = Renderer::new(options, &mut sink, signal);
        let root = ContextObject::root(data);

        let result = renderer.render_items(self.items(), &root);
        let profile = renderer.scope.take_profile();
        match result {
            Ok(()) => {}
            Err(TemplateError::OutputLimitExceeded { limit }) => {
                tracing::debug!(limit, "output limit reached; render stopped");
            }
            Err(error) => return Err(error),
        }

        sink.flush()?;
        Ok(RenderOutput {
            bytes_written: sink.bytes_written(),
            limit_reached: sink.limit_reached(),
            output: sink.into_inner(),
            profile,
        })
    }
}

/// State of one render call.
pub(crate) struct Renderer<'r, W: Write> {
    options: &'r ParserOptions,
    sink: &'r mut OutputSink<W>,
    signal: &'r RenderSignal,
    scope: ScopeData,
}

impl<'r, W: Write> Renderer<'r, W> {
    pub(crate) fn new(options: &'r ParserOptions, sink: &'r mut OutputSink<W>, signal: &'r RenderSignal) -> Self {
        Self {
            options,
            sink,
            signal,
            scope: ScopeData::new(options.settings.profile),
        }
    }

    pub(crate) fn render_items(&mut self, items: &[DocumentItem], ctx: &ContextObject<'_>) -> TemplateResult<()> {
        for item in items {
            self.signal.check()?;
            self.render_item(item, ctx)?;
        }
        Ok(())
    }

    fn render_item(&mut self, item: &DocumentItem, ctx: &ContextObject<'_>) -> TemplateResult<()> {
        match item {
            DocumentItem::Literal(text) => self.sink.write(text),
            DocumentItem::Output {
                expression, escape, ..
            } => {
                let resolved = self.resolve(expression, ctx, ExpectedKind::Value)?;
                let text = resolved
                    .value()
                    .map_or_else(|| self.null_value().to_string(), |v| v.render(self.null_value()));
                if *escape {
                    self.sink.write(&escape_html(&text))
                } else {
                    self.sink.write(&text)
                }
            }
            DocumentItem::Section {
                kind,
                expression,
                children,
                otherwise,
                ..
            } => {
                let started = self.scope.is_profiling().then(Instant::now);
                let result = self.render_section(*kind, expression, children, otherwise, ctx);
                if let Some(started) = started {
                    self.scope
                        .record(kind.as_str(), expression.to_string(), started.elapsed());
                }
                result
            }
            DocumentItem::PartialDefinition { name, body, .. } => {
                self.scope.declare_partial(name.clone(), Arc::clone(body));
                Ok(())
            }
            DocumentItem::PartialReference { name, .. } => {
                let started = self.scope.is_profiling().then(Instant::now);
                let result = self.render_partial(name, ctx);
                if let Some(started) = started {
                    self.scope.record("partial", name.clone(), started.elapsed());
                }
                result
            }
            DocumentItem::Custom(item) => {
                let started = self.scope.is_profiling().then(Instant::now);
                let result = self.render_custom(item, ctx);
                if let Some(started) = started {
                    self.scope
                        .record(item.provider.clone(), item.tag.clone(), started.elapsed());
                }
                result
            }
        }
    }

    fn null_value(&self) -> &'r str {
        &self.options.settings.null_value
    }

    /// Resolve the path and run the formatter chain.
    fn resolve<'c>(
        &self,
        expression: &Expression,
        ctx: &'c ContextObject<'c>,
        expected: ExpectedKind,
    ) -> TemplateResult<ContextObject<'c>> {
        let resolved = resolve_path(ctx, &expression.path, expected, self.options);
        if expression.formatters.is_empty() {
            return Ok(resolved);
        }

        let mut value = resolved.into_value().unwrap_or_default();
        for call in &expression.formatters {
            let args = call
                .args
                .iter()
                .map(|arg| match arg {
                    Argument::Literal(v) => Ok(v.clone()),
                    Argument::Expression(nested) => Ok(self
                        .resolve(nested, ctx, ExpectedKind::FormatterArgument)?
                        .into_value()
                        .unwrap_or_default()),
                })
                .collect::<TemplateResult<Vec<_>>>()?;

            value = self
                .options
                .formatters
                .invoke(&call.name, &value, &args)
                .map_err(|error| match error {
                    FormatterResolutionError::Unresolved { name, signature } => {
                        TemplateError::UnresolvedFormatter {
                            name,
                            signature,
                            line: expression.line(),
                        }
                    }
                    FormatterResolutionError::Invocation { name, message } => {
                        TemplateError::FormatterInvocation { name, message }
                    }
                })?;
        }
        Ok(ContextObject::child(ctx, expression.path.text.clone(), Cow::Owned(value)))
    }

    fn render_section(
        &mut self,
        kind: SectionKind,
        expression: &Expression,
        children: &[DocumentItem],
        otherwise: &[DocumentItem],
        ctx: &ContextObject<'_>,
    ) -> TemplateResult<()> {
        let expected = match kind {
            SectionKind::Truthy | SectionKind::Falsy => ExpectedKind::Condition,
            SectionKind::Each => ExpectedKind::Sequence,
            SectionKind::With | SectionKind::Scoped => ExpectedKind::Scope,
        };
        let resolved = self.resolve(expression, ctx, expected)?;
        let path = resolved.path();

        match kind {
            SectionKind::Truthy | SectionKind::Falsy => {
                let matches = resolved.is_truthy() == (kind == SectionKind::Truthy);
                let branch = if matches { children } else { otherwise };
                self.render_items(branch, ctx)
            }
            SectionKind::Each | SectionKind::Scoped => {
                let Some(value) = resolved.value() else {
                    return self.render_items(otherwise, ctx);
                };
                // mustache sections treat a map as a scope, not as entries
                let elements = match (kind, value) {
                    (SectionKind::Scoped, Value::Map(_)) => None,
                    _ => value.elements(),
                };
                match elements {
                    Some(elements) if !elements.is_empty() => {
                        let len = elements.len();
                        for (index, element) in elements.iter().enumerate() {
                            self.signal.check()?;
                            let child = ContextObject::child(ctx, path, Cow::Borrowed(element.as_ref()))
                                .with_loop_meta(LoopMeta { index, len });
                            self.render_items(children, &child)?;
                        }
                        Ok(())
                    }
                    // a truthy non-sequence renders once with itself as the scope
                    None if value.is_truthy() => {
                        let child = ContextObject::child(ctx, path, Cow::Borrowed(value));
                        let child = match kind {
                            SectionKind::Each => child.with_loop_meta(LoopMeta { index: 0, len: 1 }),
                            _ => child,
                        };
                        self.render_items(children, &child)
                    }
                    _ => self.render_items(otherwise, ctx),
                }
            }
            SectionKind::With => match resolved.value() {
                Some(value) if !value.is_null() => {
                    let child = ContextObject::child(ctx, path, Cow::Borrowed(value));
                    self.render_items(children, &child)
                }
                _ => self.render_items(otherwise, ctx),
            },
        }
    }

    fn render_partial(&mut self, name: &str, ctx: &ContextObject<'_>) -> TemplateResult<()> {
        let settings = &self.options.settings;
        let depth = self.scope.partial_depth();
        if depth >= settings.partial_stack_size {
            return match settings.stack_overflow_behavior {
                PartialStackOverflowBehavior::FailWithError => Err(TemplateError::PartialStackOverflow {
                    name: name.to_string(),
                    max_depth: settings.partial_stack_size,
                }),
                PartialStackOverflowBehavior::FailSilent => {
                    tracing::warn!(
                        partial = name,
                        max_depth = settings.partial_stack_size,
                        "partial stack size reached; skipping reference"
                    );
                    Ok(())
                }
            };
        }

        let body = match self.scope.declared_partial(name) {
            Some(body) => body,
            None => {
                let document = self
                    .options
                    .partials
                    .get_partial(name)
                    .ok_or_else(|| TemplateError::PartialNotFound {
                        name: name.to_string(),
                    })?;
                if !document.is_valid() {
                    return Err(TemplateError::Parse(ParseErrors(document.errors.clone())));
                }
                Arc::clone(&document.items)
            }
        };

        tracing::trace!(partial = name, depth = depth + 1, "entering partial");
        let mut guard = PartialGuard::enter(self, name);
        guard.render_items(&body, ctx)
    }

    fn render_custom(&mut self, item: &CustomItem, ctx: &ContextObject<'_>) -> TemplateResult<()> {
        let options = self.options;
        let Some(provider) = options.provider(&item.provider) else {
            tracing::warn!(provider = %item.provider, tag = %item.tag, "no provider registered for custom item");
            return Ok(());
        };
        let mut scope = ItemScope { renderer: self, ctx };
        provider.render(item, &mut scope)
    }
}

/// Holds one level of partial depth; released on drop.
struct PartialGuard<'g, 'r, W: Write> {
    renderer: &'g mut Renderer<'r, W>,
}

impl<'g, 'r, W: Write> PartialGuard<'g, 'r, W> {
    fn enter(renderer: &'g mut Renderer<'r, W>, name: &str) -> Self {
        renderer.scope.enter_partial(name);
        Self { renderer }
    }
}

impl<'r, W: Write> Deref for PartialGuard<'_, 'r, W> {
    type Target = Renderer<'r, W>;

    fn deref(&self) -> &Self::Target {
        &*self.renderer
    }
}

impl<W: Write> DerefMut for PartialGuard<'_, '_, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.renderer
    }
}

impl<W: Write> Drop for PartialGuard<'_, '_, W> {
    fn drop(&mut self) {
        self.renderer.scope.leave_partial();
    }
}

/// The renderer bound to the scope a custom item appears in.
struct ItemScope<'x, 'r, W: Write> {
    renderer: &'x mut Renderer<'r, W>,
    ctx: &'x ContextObject<'x>,
}

impl<W: Write> ItemRenderer for ItemScope<'_, '_, W> {
    fn write(&mut self, text: &str) -> TemplateResult<()> {
        self.renderer.sink.write(text)
    }

    fn evaluate(&mut self, expression: &Expression, expected: ExpectedKind) -> TemplateResult<Option<Value>> {
        Ok(self.renderer.resolve(expression, self.ctx, expected)?.into_value())
    }

    fn render_children(&mut self, items: &[DocumentItem]) -> TemplateResult<()> {
        self.renderer.render_items(items, self.ctx)
    }

    fn render_with_value(&mut self, items: &[DocumentItem], value: Value) -> TemplateResult<()> {
        let child = ContextObject::child(self.ctx, self.ctx.path(), Cow::Owned(value));
        self.renderer.render_items(items, &child)
    }

    fn scope_data(&mut self) -> &mut ScopeData {
        &mut self.renderer.scope
    }

    fn options(&self) -> &ParserOptions {
        self.renderer.options
    }
}
