/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for stachio using test fixtures.
 */

use pretty_assertions::assert_eq;
use serde_json::json;
use stachio::expression::parse_expression;
use stachio::{
    CancellationToken, CustomDocumentItemProvider, CustomItem, CustomParse, DocumentItem, Encoding, ExpectedKind,
    FormatterError, FormatterRegistry, ItemRenderer, MemoryPartialStore, ParamType, ParseError, ParseErrorKind,
    ParserOptions, PartialStackOverflowBehavior, RenderSettings, ScopeStack, Signature, Template, TemplateError,
    TemplateResult, Token, Value,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> std::path::PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

/// Helper to load a template from fixtures
fn load_template(name: &str, options: ParserOptions) -> Template {
    let path = fixture_path(name);
    Template::from_file(&path, Arc::new(options)).unwrap_or_else(|_| panic!("Failed to load template: {}", name))
}

fn data(value: serde_json::Value) -> Value {
    Value::from(value)
}

fn settings(settings: RenderSettings) -> ParserOptions {
    ParserOptions::default().with_settings(settings)
}

#[test]
fn test_greeting() {
    let template = load_template("greeting.template", ParserOptions::default());
    let result = template.render(&data(json!({"name": "World"}))).unwrap();
    assert_eq!(result, "Hello World!");
}

#[test]
fn test_order_lines() {
    let template = load_template("order.template", ParserOptions::default());

    let order = json!({"lines": [{"item": "tea", "qty": 2}, {"item": "cake", "qty": 1}]});
    assert_eq!(template.render(&data(order)).unwrap(), "1. TEA x2\n2. CAKE x1");

    let empty = json!({"lines": []});
    assert_eq!(template.render(&data(empty)).unwrap(), "(empty order)");
}

#[test]
fn test_recursive_tree() {
    let template = load_template("tree.template", ParserOptions::default());
    let nodes = json!({"nodes": [
        {"title": "a", "children": [{"title": "b", "children": []}]},
        {"title": "c", "children": []}
    ]});
    assert_eq!(
        template.render(&data(nodes)).unwrap(),
        "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"
    );
}

#[test]
fn test_with_and_parent_path() {
    let template = load_template("profile.template", ParserOptions::default());
    let profile = json!({"site": "example.org", "user": {"name": "Ada", "email": "ada@example.org"}});
    assert_eq!(
        template.render(&data(profile)).unwrap(),
        "Ada <ada@example.org> from example.org"
    );
    assert_eq!(template.render(&data(json!({}))).unwrap(), "nobody");
}

#[test]
fn test_literal_text_round_trips() {
    let source = "plain text, braces } and { alone, ünïcödé\nsecond line";
    let template = Template::parse_with_defaults(source);
    assert!(template.is_valid());
    assert_eq!(template.render(&Value::Null).unwrap(), source);
}

#[test]
fn test_rendering_is_idempotent() {
    let template = load_template("order.template", ParserOptions::default());
    let order = data(json!({"lines": [{"item": "tea", "qty": 2}]}));
    let first = template.render(&order).unwrap();
    let second = template.render(&order).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_renders_share_a_template() {
    let template = Arc::new(Template::parse_with_defaults("{{#each xs}}{{.}}{{/each}}"));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let template = Arc::clone(&template);
            std::thread::spawn(move || template.render(&data(json!({"xs": [i, i]}))).unwrap())
        })
        .collect();
    let results: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec!["00", "11", "22", "33"]);
}

#[test]
fn test_partial_recursion_fails_with_error_after_stack_size_levels() {
    let options = settings(
        RenderSettings::default()
            .with_partial_stack_size(3)
            .with_stack_overflow_behavior(PartialStackOverflowBehavior::FailWithError),
    );
    let template = load_template("recursive.template", options);

    let mut buffer = Vec::new();
    let err = template
        .render_to_writer(&Value::Null, &mut buffer, None)
        .unwrap_err();

    match err {
        TemplateError::PartialStackOverflow { name, max_depth } => {
            assert_eq!(name, "down");
            assert_eq!(max_depth, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(String::from_utf8(buffer).unwrap(), "[[[");
}

#[test]
fn test_partial_recursion_fails_silently() {
    let options = settings(
        RenderSettings::default()
            .with_partial_stack_size(3)
            .with_stack_overflow_behavior(PartialStackOverflowBehavior::FailSilent),
    );
    let template = load_template("recursive.template", options);
    assert_eq!(template.render(&Value::Null).unwrap(), "[[[]]]");
}

#[test]
fn test_stored_partials() {
    let mut store = MemoryPartialStore::new();
    store
        .add("footer", "-- {{author}}", &ParserOptions::default())
        .unwrap();
    assert!(store.add("broken", "{{#if x}}", &ParserOptions::default()).is_err());
    assert!(!store.contains("broken"));

    let options = ParserOptions::default().with_partials(Arc::new(store));
    let template = Template::parse("Thanks {{> footer}}", Arc::new(options));
    assert_eq!(
        template.render(&data(json!({"author": "Ada"}))).unwrap(),
        "Thanks -- Ada"
    );
}

#[test]
fn test_output_cap_stops_at_chunk_boundary() {
    let template = Template::parse(
        "Hello {{name}}!",
        Arc::new(settings(RenderSettings::default().with_max_size(8))),
    );
    let output = template
        .render_to_writer(&data(json!({"name": "World"})), Vec::new(), None)
        .unwrap();

    assert!(output.limit_reached);
    assert_eq!(output.bytes_written, 6);
    assert_eq!(String::from_utf8(output.output).unwrap(), "Hello ");
}

#[test]
fn test_string_render_reports_the_cap() {
    let template = Template::parse(
        "Hello {{name}}!",
        Arc::new(settings(RenderSettings::default().with_max_size(8))),
    );
    let err = template.render(&data(json!({"name": "World"}))).unwrap_err();
    assert!(matches!(err, TemplateError::OutputLimitExceeded { limit: 8 }));

    // output that fits is unaffected
    assert_eq!(template.render(&data(json!({"name": "A"}))).unwrap(), "Hello A!");
}

#[test]
fn test_output_cap_zero_is_unlimited() {
    let template = Template::parse(
        "{{#each xs}}{{.}}{{/each}}",
        Arc::new(settings(RenderSettings::default().with_max_size(0))),
    );
    let xs: Vec<i64> = (0..1000).collect();
    let output = template
        .render_to_writer(&data(json!({ "xs": xs })), Vec::new(), None)
        .unwrap();
    assert!(!output.limit_reached);
    assert_eq!(output.bytes_written, output.output.len());
    assert!(output.bytes_written > 2000);
}

#[test]
fn test_formatter_overloads() {
    let mut formatters = FormatterRegistry::with_builtins();
    formatters
        .register("kind", Signature::new(ParamType::Int), |_, _| Ok(Value::from("int")))
        .register("kind", Signature::new(ParamType::Any), |_, _| Ok(Value::from("any")));

    let options = ParserOptions::default().with_formatters(formatters);
    let template = Template::parse("{{n | kind}} {{s | kind}}", Arc::new(options));
    assert_eq!(
        template.render(&data(json!({"n": 3, "s": "three"}))).unwrap(),
        "int any"
    );
}

#[test]
fn test_formatter_failure_aborts_render() {
    let mut formatters = FormatterRegistry::new();
    formatters.register("fail", Signature::new(ParamType::Any), |_, _| {
        Err(FormatterError::new("not today"))
    });
    let options = ParserOptions::default().with_formatters(formatters);
    let template = Template::parse("{{x | fail}}", Arc::new(options));

    let err = template.render(&data(json!({"x": 1}))).unwrap_err();
    assert!(matches!(err, TemplateError::FormatterInvocation { ref name, .. } if name == "fail"));
}

#[test]
fn test_unresolved_path_observer_fires_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer_seen = Arc::clone(&seen);
    let options = ParserOptions::default().on_unresolved_path(move |path, expected| {
        observer_seen
            .lock()
            .unwrap()
            .push((path.to_string(), expected));
    });
    let template = Template::parse("Hello {{name}}!", Arc::new(options));

    assert_eq!(template.render(&data(json!({}))).unwrap(), "Hello !");
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("name".to_string(), ExpectedKind::Value)]
    );
}

#[test]
fn test_value_resolver_is_consulted_first() {
    let options = ParserOptions::default().with_value_resolver(|_: &Value, name: &str| {
        (name == "now").then(|| Value::from("2025-01-01"))
    });
    let template = Template::parse("{{now}} {{name}}", Arc::new(options));
    assert_eq!(
        template.render(&data(json!({"now": "ignored", "name": "x"}))).unwrap(),
        "2025-01-01 x"
    );
}

#[test]
fn test_empty_delimiter_is_a_parse_error() {
    let options = settings(RenderSettings::default().with_delimiters("", "}}"));
    let template = Template::parse("Hello {{name}}", Arc::new(options));
    assert!(!template.is_valid());
    assert_eq!(template.errors()[0].kind, ParseErrorKind::InvalidDelimiter);
    assert!(matches!(template.render(&Value::Null), Err(TemplateError::Parse(_))));
}

#[test]
fn test_unmatched_closer_is_refused() {
    let template = Template::parse_with_defaults("a{{/if}}b");
    assert!(!template.is_valid());
    assert_eq!(template.errors()[0].kind, ParseErrorKind::UnexpectedToken);

    let err = template.render(&Value::Null).unwrap_err();
    match err {
        TemplateError::Parse(errors) => assert_eq!(errors.len(), 1),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_parse_errors_render_with_source() {
    let template = Template::parse_with_defaults("{{#each items}}\n{{name | }}\n");
    let rendered = template.render_errors("list.template");
    assert!(rendered.contains("T-1-"));
    assert!(rendered.contains("list.template"));
}

#[test]
fn test_timeout() {
    let mut formatters = FormatterRegistry::with_builtins();
    formatters.register("nap", Signature::new(ParamType::Any), |v, _| {
        std::thread::sleep(Duration::from_millis(30));
        Ok(v.clone())
    });
    let options = settings(RenderSettings::default().with_timeout(Duration::from_millis(10)))
        .with_formatters(formatters);
    let template = Template::parse("{{#each xs}}{{. | nap}}{{/each}}", Arc::new(options));

    let err = template.render(&data(json!({"xs": [1, 2, 3]}))).unwrap_err();
    assert!(matches!(err, TemplateError::Timeout { .. }));
    assert!(err.is_interrupted());
}

#[test]
fn test_cancellation_before_render() {
    let token = CancellationToken::new();
    token.cancel();
    let template = Template::parse_with_defaults("never {{written}}");

    let err = template
        .render_to_string(&Value::Null, Some(&token))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Cancelled));
}

#[test]
fn test_cancellation_during_render() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut formatters = FormatterRegistry::with_builtins();
    formatters.register("stop", Signature::new(ParamType::Any), move |v, _| {
        trigger.cancel();
        Ok(v.clone())
    });
    let options = ParserOptions::default().with_formatters(formatters);
    let template = Template::parse("{{#each xs}}{{. | stop}}{{/each}}", Arc::new(options));

    let mut buffer = Vec::new();
    let err = template
        .render_to_writer(&data(json!({"xs": [1, 2, 3]})), &mut buffer, Some(&token))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Cancelled));
    assert_eq!(String::from_utf8(buffer).unwrap(), "1");
}

#[tokio::test]
async fn test_render_async() {
    let template = load_template("greeting.template", ParserOptions::default());
    let result = template
        .render_async(&data(json!({"name": "async"})), None, None)
        .await
        .unwrap();
    assert_eq!(result, "Hello async!");
}

#[tokio::test]
async fn test_render_async_with_unbounded_timeout() {
    let template = load_template("greeting.template", ParserOptions::default());
    let result = template
        .render_async(&data(json!({"name": "later"})), None, Some(Duration::MAX))
        .await
        .unwrap();
    assert_eq!(result, "Hello later!");
}

#[tokio::test]
async fn test_render_async_timeout_overrides_settings() {
    let mut formatters = FormatterRegistry::with_builtins();
    formatters.register("nap", Signature::new(ParamType::Any), |v, _| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(v.clone())
    });
    let options = settings(RenderSettings::default().with_timeout(Duration::from_secs(60)))
        .with_formatters(formatters);
    let template = Template::parse("{{#each xs}}{{. | nap}}{{/each}}", Arc::new(options));

    let err = template
        .render_async(
            &data(json!({"xs": [1, 2, 3]})),
            Some(CancellationToken::new()),
            Some(Duration::from_millis(5)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TemplateError::Timeout { timeout } if timeout == Duration::from_millis(5)));
}

#[test]
fn test_utf16_output() {
    let options = settings(RenderSettings::default().with_encoding(Encoding::Utf16Le));
    let template = Template::parse("héllo {{name}}", Arc::new(options));
    let value = data(json!({"name": "wörld"}));

    let output = template.render_to_writer(&value, Vec::new(), None).unwrap();
    assert_eq!(output.bytes_written, 22);
    assert_eq!(&output.output[..4], &[b'h', 0, 0xe9, 0]);
    assert_eq!(template.render(&value).unwrap(), "héllo wörld");
}

#[test]
fn test_factory_error_is_reported_before_rendering() {
    let template = Template::parse_with_defaults("{{x}}");
    let err = template
        .render_with_factory(
            &Value::Null,
            || -> io::Result<Vec<u8>> { Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")) },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, TemplateError::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
}

#[test]
fn test_factory_not_opened_for_invalid_template() {
    let opened = AtomicBool::new(false);
    let template = Template::parse_with_defaults("{{#if x}}");
    let err = template
        .render_with_factory(
            &Value::Null,
            || {
                opened.store(true, Ordering::SeqCst);
                Ok(Vec::new())
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, TemplateError::Parse(_)));
    assert!(!opened.load(Ordering::SeqCst));
}

#[test]
fn test_model_inference() {
    let options = settings(RenderSettings::default().with_model_inference(true));
    let template = load_template("order.template", options);
    assert_eq!(
        template.inferred_model().unwrap().paths(),
        vec!["lines[]", "lines[].item", "lines[].qty"]
    );

    let plain = load_template("order.template", ParserOptions::default());
    assert!(plain.inferred_model().is_none());
}

#[test]
fn test_profiling() {
    let options = settings(RenderSettings::default().with_profiling(true));
    let template = load_template("tree.template", options);
    let nodes = json!({"nodes": [{"title": "a", "children": []}]});
    let output = template
        .render_to_writer(&data(nodes), Vec::new(), None)
        .unwrap();

    let profile = output.profile.unwrap();
    assert!(profile.iter().any(|s| s.kind == "partial" && s.label == "row"));
    assert!(profile.iter().any(|s| s.kind == "if" && s.depth == 1));
    assert!(profile.iter().any(|s| s.kind == "each" && s.depth == 0));
}

/// `{{#repeat n}}...{{/repeat}}` renders its body `n` times with the
/// iteration number as the scope.
struct Repeat;

impl CustomDocumentItemProvider for Repeat {
    fn name(&self) -> &str {
        "repeat"
    }

    fn should_tokenize(&self, raw: &str) -> bool {
        raw.starts_with("#repeat ") || raw == "/repeat"
    }

    fn parse(&self, token: &Token, _options: &ParserOptions, _scopes: &ScopeStack) -> Result<CustomParse, ParseError> {
        if token.value == "/repeat" {
            return Ok(CustomParse::Close("repeat".to_string()));
        }
        let count: u64 = token.value["#repeat ".len()..].trim().parse().map_err(|_| {
            ParseError::new(ParseErrorKind::UnexpectedToken, "`repeat` needs a count", token.span)
        })?;
        Ok(CustomParse::Open(
            CustomItem::new("repeat", "repeat", token.span).with_payload(json!(count)),
        ))
    }

    fn render(&self, item: &CustomItem, renderer: &mut dyn ItemRenderer) -> TemplateResult<()> {
        let count = item.payload.as_u64().unwrap_or(0);
        for i in 0..count {
            renderer.render_with_value(&item.children, Value::from(i as i64))?;
        }
        Ok(())
    }
}

/// `{{shout path}}` writes the value upper-cased.
struct Shout {
    renders: Arc<AtomicUsize>,
}

impl CustomDocumentItemProvider for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn should_tokenize(&self, raw: &str) -> bool {
        raw.starts_with("shout ")
    }

    fn parse(&self, token: &Token, _options: &ParserOptions, _scopes: &ScopeStack) -> Result<CustomParse, ParseError> {
        let (expression, errors) = parse_expression(token.value["shout ".len()..].trim(), token.span);
        if let Some(error) = errors.into_iter().next() {
            return Err(error);
        }
        let item = CustomItem::new("shout", "shout", token.span).with_expression(expression);
        Ok(CustomParse::Item(DocumentItem::Custom(item)))
    }

    fn render(&self, item: &CustomItem, renderer: &mut dyn ItemRenderer) -> TemplateResult<()> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let Some(expression) = &item.expression else {
            return Ok(());
        };
        let text = renderer
            .evaluate(expression, ExpectedKind::Value)?
            .map(|v| v.render(""))
            .unwrap_or_default();
        renderer.write(&text.to_uppercase())
    }
}

#[test]
fn test_custom_block_provider() {
    let options = ParserOptions::default().with_provider(Repeat);
    let template = Template::parse("{{#repeat 3}}<{{.}}>{{/repeat}}", Arc::new(options));
    assert!(template.is_valid(), "{:?}", template.errors());
    assert_eq!(template.render(&Value::Null).unwrap(), "<0><1><2>");
}

#[test]
fn test_custom_blocks_share_the_scope_stack() {
    let options = ParserOptions::default().with_provider(Repeat);
    let template = Template::parse("{{#repeat 2}}{{#if a}}{{/repeat}}{{/if}}", Arc::new(options));
    let kinds: Vec<_> = template.errors().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&ParseErrorKind::UnexpectedToken));
    assert!(kinds.contains(&ParseErrorKind::UnclosedBlock));
}

#[test]
fn test_custom_inline_provider() {
    let renders = Arc::new(AtomicUsize::new(0));
    let options = ParserOptions::default()
        .with_provider(Repeat)
        .with_provider(Shout {
            renders: Arc::clone(&renders),
        });
    let template = Template::parse("{{#repeat 2}}{{shout name}}!{{/repeat}}", Arc::new(options));
    assert_eq!(
        template.render(&data(json!({"name": "hey"}))).unwrap(),
        "HEY!HEY!"
    );
    assert_eq!(renders.load(Ordering::SeqCst), 2);
}
