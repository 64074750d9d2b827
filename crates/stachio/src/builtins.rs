/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Standard formatters.
//!
//! | Formatter                       | Effect                                      |
//! |---------------------------------|---------------------------------------------|
//! | `upper`, `lower`, `trim`        | case and whitespace on the rendered value   |
//! | `length`                        | chars of a string, elements of a list/map   |
//! | `join(sep?)`                    | join list elements, default `", "`          |
//! | `default(fallback)`             | fallback for null and empty strings         |
//! | `add(n)`                        | integer or float addition                   |
//! | `equals(other)`, `not`          | boolean helpers for sections                |
//! | `first`, `last`, `reverse`      | lists and strings                           |
//! | `pad_left(width, fill?)`        | left-pad to a width in chars                |
//! | `truncate(width, suffix?)`      | cut to a width in chars, appending a suffix |
//! | `html_escape`                   | escape regardless of the escaping setting   |

use crate::escape::escape_html;
use crate::formatter::{FormatterError, FormatterRegistry, ParamType, Signature};
use crate::value::Value;

pub(crate) fn register_builtins(registry: &mut FormatterRegistry) {
    use ParamType::{Any, Float, Int, List, Map, String};

    registry
        .register("upper", Signature::new(Any), |v, _| {
            Ok(Value::String(v.render("").to_uppercase()))
        })
        .register("lower", Signature::new(Any), |v, _| {
            Ok(Value::String(v.render("").to_lowercase()))
        })
        .register("trim", Signature::new(Any), |v, _| {
            Ok(Value::from(v.render("").trim()))
        })
        .register("length", Signature::new(String), |v, _| {
            Ok(Value::from(v.as_str().map_or(0, |s| s.chars().count())))
        })
        .register("length", Signature::new(List), |v, _| Ok(Value::from(list(v).len())))
        .register("length", Signature::new(Map), |v, _| match v {
            Value::Map(m) => Ok(Value::from(m.len())),
            _ => Ok(Value::Int(0)),
        })
        .register("join", Signature::new(List).optional(String), |v, args| {
            let sep = args.first().and_then(Value::as_str).unwrap_or(", ");
            let parts: Vec<std::string::String> = list(v).iter().map(|e| e.render("")).collect();
            Ok(Value::String(parts.join(sep)))
        })
        .register("default", Signature::new(Any).param(Any), |v, args| {
            let missing = v.is_null() || v.as_str().is_some_and(str::is_empty);
            Ok(if missing { args[0].clone() } else { v.clone() })
        })
        .register("add", Signature::new(Int).param(Int), |v, args| {
            match (v, &args[0]) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(*b)
                    .map(Value::Int)
                    .ok_or_else(|| FormatterError::new(format!("{} + {} overflows", a, b))),
                _ => Err(FormatterError::new("add expects integers")),
            }
        })
        .register("add", Signature::new(Float).param(Float), |v, args| {
            match (v, &args[0]) {
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                _ => Err(FormatterError::new("add expects numbers")),
            }
        })
        .register("equals", Signature::new(Any).param(Any), |v, args| {
            Ok(Value::Bool(*v == args[0]))
        })
        .register("not", Signature::new(Any), |v, _| Ok(Value::Bool(!v.is_truthy())))
        .register("first", Signature::new(List), |v, _| {
            Ok(list(v).first().cloned().unwrap_or_default())
        })
        .register("first", Signature::new(String), |v, _| {
            Ok(v.as_str()
                .and_then(|s| s.chars().next())
                .map_or(Value::Null, |c| Value::String(c.to_string())))
        })
        .register("last", Signature::new(List), |v, _| {
            Ok(list(v).last().cloned().unwrap_or_default())
        })
        .register("last", Signature::new(String), |v, _| {
            Ok(v.as_str()
                .and_then(|s| s.chars().next_back())
                .map_or(Value::Null, |c| Value::String(c.to_string())))
        })
        .register("reverse", Signature::new(List), |v, _| {
            Ok(Value::List(list(v).iter().rev().cloned().collect()))
        })
        .register("reverse", Signature::new(String), |v, _| {
            Ok(Value::String(v.as_str().unwrap_or_default().chars().rev().collect()))
        })
        .register(
            "pad_left",
            Signature::new(String).param(Int).optional(String),
            |v, args| {
                let text = v.as_str().unwrap_or_default();
                let width = width_arg(&args[0])?;
                let fill = fill_arg(args.get(1))?;
                let len = text.chars().count();
                let mut out: std::string::String =
                    std::iter::repeat_n(fill, width.saturating_sub(len)).collect();
                out.push_str(text);
                Ok(Value::String(out))
            },
        )
        .register(
            "truncate",
            Signature::new(String).param(Int).optional(String),
            |v, args| {
                let text = v.as_str().unwrap_or_default();
                let width = width_arg(&args[0])?;
                if text.chars().count() <= width {
                    return Ok(Value::from(text));
                }
                let mut out: std::string::String = text.chars().take(width).collect();
                if let Some(suffix) = args.get(1).and_then(Value::as_str) {
                    out.push_str(suffix);
                }
                Ok(Value::String(out))
            },
        )
        .register("html_escape", Signature::new(String), |v, _| {
            Ok(Value::from(escape_html(v.as_str().unwrap_or_default()).into_owned()))
        });
}

fn list(value: &Value) -> &[Value] {
    match value {
        Value::List(items) => items,
        _ => &[],
    }
}

fn width_arg(value: &Value) -> Result<usize, FormatterError> {
    match value {
        Value::Int(w) => usize::try_from(*w)
            .map_err(|_| FormatterError::new(format!("width must not be negative, got {}", w))),
        other => Err(FormatterError::new(format!(
            "width must be an integer, got {}",
            other.value_type()
        ))),
    }
}

fn fill_arg(value: Option<&Value>) -> Result<char, FormatterError> {
    let Some(value) = value else {
        return Ok(' ');
    };
    let fill = value.as_str().unwrap_or_default();
    let mut chars = fill.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(FormatterError::new(format!(
            "fill must be a single character, got {:?}",
            fill
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::FormatterResolutionError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(name: &str, source: impl Into<Value>, args: &[Value]) -> Value {
        FormatterRegistry::with_builtins()
            .invoke(name, &source.into(), args)
            .unwrap()
    }

    #[test]
    fn test_string_case_and_trim() {
        assert_eq!(call("upper", "abc", &[]), Value::from("ABC"));
        assert_eq!(call("lower", "ÀB", &[]), Value::from("àb"));
        assert_eq!(call("trim", "  x ", &[]), Value::from("x"));
        assert_eq!(call("upper", Value::Null, &[]), Value::from(""));
        assert_eq!(call("upper", true, &[]), Value::from("TRUE"));
    }

    #[test]
    fn test_length_overloads() {
        assert_eq!(call("length", "héllo", &[]), Value::Int(5));
        assert_eq!(call("length", vec![1, 2], &[]), Value::Int(2));
        assert_eq!(call("length", Value::from(json!({"a": 1})), &[]), Value::Int(1));
    }

    #[test]
    fn test_join() {
        assert_eq!(call("join", vec!["a", "b"], &[]), Value::from("a, b"));
        assert_eq!(call("join", vec![1, 2], &[Value::from("-")]), Value::from("1-2"));
    }

    #[test]
    fn test_default() {
        assert_eq!(call("default", Value::Null, &[Value::from("n/a")]), Value::from("n/a"));
        assert_eq!(call("default", "", &[Value::from("n/a")]), Value::from("n/a"));
        assert_eq!(call("default", 0, &[Value::from("n/a")]), Value::Int(0));
    }

    #[test]
    fn test_add_picks_numeric_overload() {
        assert_eq!(call("add", 2, &[Value::Int(3)]), Value::Int(5));
        assert_eq!(call("add", 2, &[Value::Float(0.5)]), Value::Float(2.5));
        assert_eq!(call("add", 1.5, &[Value::Int(1)]), Value::Float(2.5));

        let overflow = FormatterRegistry::with_builtins().invoke("add", &Value::Int(i64::MAX), &[Value::Int(1)]);
        assert!(matches!(overflow, Err(FormatterResolutionError::Invocation { .. })));
    }

    #[test]
    fn test_booleans() {
        assert_eq!(call("equals", "a", &[Value::from("a")]), Value::Bool(true));
        assert_eq!(call("equals", 1, &[Value::Float(1.0)]), Value::Bool(true));
        assert_eq!(call("not", "", &[]), Value::Bool(true));
    }

    #[test]
    fn test_sequence_helpers() {
        assert_eq!(call("first", vec![1, 2, 3], &[]), Value::Int(1));
        assert_eq!(call("last", "abc", &[]), Value::from("c"));
        assert_eq!(call("first", Value::List(vec![]), &[]), Value::Null);
        assert_eq!(call("reverse", vec![1, 2], &[]), Value::from(vec![2, 1]));
        assert_eq!(call("reverse", "abc", &[]), Value::from("cba"));
    }

    #[test]
    fn test_pad_and_truncate() {
        assert_eq!(call("pad_left", "7", &[Value::Int(3), Value::from("0")]), Value::from("007"));
        assert_eq!(call("pad_left", 42, &[Value::Int(4)]), Value::from("  42"));
        assert_eq!(call("pad_left", "long", &[Value::Int(2)]), Value::from("long"));
        assert_eq!(
            call("truncate", "abcdef", &[Value::Int(3), Value::from("…")]),
            Value::from("abc…")
        );
        assert_eq!(call("truncate", "ab", &[Value::Int(3)]), Value::from("ab"));

        let negative = FormatterRegistry::with_builtins().invoke(
            "pad_left",
            &Value::from("x"),
            &[Value::Int(-1)],
        );
        assert!(matches!(negative, Err(FormatterResolutionError::Invocation { .. })));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(call("html_escape", "<b>", &[]), Value::from("&lt;b&gt;"));
    }

    #[test]
    fn test_type_mismatch_is_unresolved() {
        let err = FormatterRegistry::with_builtins()
            .invoke("join", &Value::from("abc"), &[])
            .unwrap_err();
        assert!(matches!(err, FormatterResolutionError::Unresolved { .. }));
    }
}
