/*
 * formatter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formatter registry and overload resolution.
//!
//! A formatter is a named function applied to the value its call is chained
//! from. Several overloads may share a name; the one whose declared parameter
//! types best fit the runtime values wins:
//!
//! 1. Keep candidates whose arity accepts the argument count.
//! 2. Score every parameter against its value: exact type 3, implicit
//!    conversion 2, [`ParamType::Any`] 1. A parameter that rejects its value
//!    removes the candidate.
//! 3. Highest total wins. Equal totals go to the most recently registered
//!    overload, so hosts can override built-ins per type.
//!
//! Arguments are converted to the declared types before the call.

use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Declared type of a formatter parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Catch-all; accepts every value, including null.
    Any,
    Bool,
    Int,
    Float,
    /// Int or Float, passed through unchanged.
    Number,
    String,
    List,
    Map,
    /// A host object with this [`type_name`](crate::Object::type_name).
    Object(String),
}

const EXACT: u32 = 3;
const CONVERTIBLE: u32 = 2;
const CATCH_ALL: u32 = 1;

impl ParamType {
    /// How well `value` fits this parameter, or `None` if it cannot be passed.
    pub fn score(&self, value: &Value) -> Option<u32> {
        match (self, value) {
            (ParamType::Any, _) => Some(CATCH_ALL),
            (ParamType::Bool, Value::Bool(_))
            | (ParamType::Int, Value::Int(_))
            | (ParamType::Float, Value::Float(_))
            | (ParamType::String, Value::String(_))
            | (ParamType::List, Value::List(_))
            | (ParamType::Map, Value::Map(_)) => Some(EXACT),
            (ParamType::Object(name), Value::Object(obj)) if obj.type_name() == name => Some(EXACT),
            (ParamType::Int, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                Some(CONVERTIBLE)
            }
            (ParamType::Float | ParamType::Number, Value::Int(_))
            | (ParamType::Number, Value::Float(_))
            | (ParamType::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(CONVERTIBLE)
            }
            _ => None,
        }
    }

    /// Convert `value` to this parameter type.
    pub fn convert(&self, value: &Value) -> Result<Value, FormatterError> {
        let converted = match (self, value) {
            (ParamType::Int, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                // fract() == 0.0 and finite, so the cast is exact within range
                if f.abs() <= i64::MAX as f64 {
                    Some(Value::Int(*f as i64))
                } else {
                    None
                }
            }
            (ParamType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (ParamType::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(Value::String(value.render("")))
            }
            _ if self.score(value).is_some() => Some(value.clone()),
            _ => None,
        };
        converted.ok_or_else(|| {
            FormatterError::new(format!("cannot convert {} to {}", value.value_type(), self))
        })
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "Any"),
            ParamType::Bool => write!(f, "Bool"),
            ParamType::Int => write!(f, "Int"),
            ParamType::Float => write!(f, "Float"),
            ParamType::Number => write!(f, "Number"),
            ParamType::String => write!(f, "String"),
            ParamType::List => write!(f, "List"),
            ParamType::Map => write!(f, "Map"),
            ParamType::Object(name) => write!(f, "{}", name),
        }
    }
}

/// Parameter list of one formatter overload.
///
/// `source` is the value the call is chained from; `params` are the
/// explicit arguments, of which the last `optional` may be omitted. `rest`
/// accepts any number of extra arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub source: ParamType,
    pub params: Vec<ParamType>,
    pub optional: usize,
    pub rest: Option<ParamType>,
}

impl Signature {
    pub fn new(source: ParamType) -> Self {
        Self {
            source,
            params: Vec::new(),
            optional: 0,
            rest: None,
        }
    }

    pub fn param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    /// Add a trailing parameter that may be omitted.
    pub fn optional(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self.optional += 1;
        self
    }

    pub fn rest(mut self, param: ParamType) -> Self {
        self.rest = Some(param);
        self
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        let required = self.params.len().saturating_sub(self.optional);
        count >= required && (count <= self.params.len() || self.rest.is_some())
    }

    fn param_at(&self, index: usize) -> Option<&ParamType> {
        self.params.get(index).or(self.rest.as_ref())
    }

    /// Total fit of `source` and `args`, or `None` if any parameter rejects its value.
    pub fn score(&self, source: &Value, args: &[Value]) -> Option<u32> {
        if !self.accepts_arity(args.len()) {
            return None;
        }
        let mut total = self.source.score(source)?;
        for (i, arg) in args.iter().enumerate() {
            total += self.param_at(i)?.score(arg)?;
        }
        Some(total)
    }

    fn convert_args(&self, args: &[Value]) -> Result<Vec<Value>, FormatterError> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| match self.param_at(i) {
                Some(param) => param.convert(arg),
                None => Err(FormatterError::new("too many arguments")),
            })
            .collect()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.source)?;
        let required = self.params.len().saturating_sub(self.optional);
        for (i, param) in self.params.iter().enumerate() {
            if i < required {
                write!(f, ", {}", param)?;
            } else {
                write!(f, ", {}?", param)?;
            }
        }
        if let Some(rest) = &self.rest {
            write!(f, ", {}...", rest)?;
        }
        write!(f, ")")
    }
}

/// Error returned by a formatter body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormatterError {
    pub message: String,
}

impl FormatterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a formatter call could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatterResolutionError {
    #[error("no overload of '{name}' accepts {signature}")]
    Unresolved { name: String, signature: String },

    #[error("'{name}' failed: {message}")]
    Invocation { name: String, message: String },
}

pub type FormatterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, FormatterError> + Send + Sync>;

/// A registered overload.
#[derive(Clone)]
pub struct Formatter {
    pub name: String,
    pub signature: Signature,
    func: FormatterFn,
}

impl Formatter {
    /// Convert arguments and call the body.
    pub fn call(&self, source: &Value, args: &[Value]) -> Result<Value, FormatterError> {
        let source = self.signature.source.convert(source)?;
        let args = self.signature.convert_args(args)?;
        (self.func)(&source, &args)
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Formatters by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FormatterRegistry {
    formatters: Vec<Formatter>,
}

impl FormatterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the standard formatters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_builtins(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, signature: Signature, func: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, FormatterError> + Send + Sync + 'static,
    {
        self.formatters.push(Formatter {
            name: name.into(),
            signature,
            func: Arc::new(func),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formatters.iter().any(|f| f.name == name)
    }

    /// Every overload registered under `name`, oldest first.
    pub fn candidates<'r>(&'r self, name: &'r str) -> impl Iterator<Item = &'r Formatter> + 'r {
        self.formatters.iter().filter(move |f| f.name == name)
    }

    /// Applicable overloads with their scores, best first. Ties keep the most
    /// recent registration ahead.
    pub fn rank<'a>(&'a self, name: &str, source: &Value, args: &[Value]) -> Vec<(u32, &'a Formatter)> {
        let mut ranked: Vec<(u32, usize, &'a Formatter)> = self
            .formatters
            .iter()
            .filter(|f| f.name == name)
            .enumerate()
            .filter_map(|(order, f)| f.signature.score(source, args).map(|s| (s, order, f)))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        ranked.into_iter().map(|(s, _, f)| (s, f)).collect()
    }

    /// Pick the overload to call.
    pub fn select(
        &self,
        name: &str,
        source: &Value,
        args: &[Value],
    ) -> Result<&Formatter, FormatterResolutionError> {
        let ranked = self.rank(name, source, args);
        match ranked.as_slice() {
            [] => Err(FormatterResolutionError::Unresolved {
                name: name.to_string(),
                signature: call_signature(source, args),
            }),
            [(best, chosen), (runner_up, _), ..] if best == runner_up => {
                tracing::debug!(
                    formatter = name,
                    score = best,
                    chosen = %chosen.signature,
                    "ambiguous formatter overloads; using the most recently registered"
                );
                Ok(chosen)
            }
            [(_, chosen), ..] => Ok(chosen),
        }
    }

    /// Whether the best two overloads for this call have equal scores.
    pub fn is_ambiguous(&self, name: &str, source: &Value, args: &[Value]) -> bool {
        matches!(self.rank(name, source, args).as_slice(), [(a, _), (b, _), ..] if a == b)
    }

    /// Select and call.
    pub fn invoke(&self, name: &str, source: &Value, args: &[Value]) -> Result<Value, FormatterResolutionError> {
        let formatter = self.select(name, source, args)?;
        formatter
            .call(source, args)
            .map_err(|e| FormatterResolutionError::Invocation {
                name: name.to_string(),
                message: e.message,
            })
    }
}

/// `(Int, String)`-style description of the runtime types of a call.
fn call_signature(source: &Value, args: &[Value]) -> String {
    let types: Vec<ValueType> = std::iter::once(source)
        .chain(args)
        .map(Value::value_type)
        .collect();
    let names: Vec<String> = types.iter().map(ToString::to_string).collect();
    format!("({})", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;
    use pretty_assertions::assert_eq;

    fn tag(label: &'static str) -> impl Fn(&Value, &[Value]) -> Result<Value, FormatterError> {
        move |_, _| Ok(Value::from(label))
    }

    #[derive(Debug)]
    struct Money;

    impl Object for Money {
        fn type_name(&self) -> &str {
            "Money"
        }

        fn get_member(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn test_exact_type_beats_catch_all() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("describe", Signature::new(ParamType::Int), tag("int"))
            .register("describe", Signature::new(ParamType::Any), tag("any"));

        assert_eq!(
            registry.invoke("describe", &Value::Int(3), &[]),
            Ok(Value::from("int"))
        );
        assert_eq!(
            registry.invoke("describe", &Value::from("three"), &[]),
            Ok(Value::from("any"))
        );
    }

    #[test]
    fn test_conversion_beats_catch_all() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("f", Signature::new(ParamType::Any), tag("any"))
            .register("f", Signature::new(ParamType::Float), tag("float"));
        assert_eq!(registry.invoke("f", &Value::Int(1), &[]), Ok(Value::from("float")));
    }

    #[test]
    fn test_tie_goes_to_most_recent_registration() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("f", Signature::new(ParamType::String), tag("first"))
            .register("f", Signature::new(ParamType::String), tag("second"));

        let source = Value::from("x");
        assert!(registry.is_ambiguous("f", &source, &[]));
        assert_eq!(registry.invoke("f", &source, &[]), Ok(Value::from("second")));
    }

    #[test]
    fn test_distinct_scores_are_not_ambiguous() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("f", Signature::new(ParamType::Int), tag("int"))
            .register("f", Signature::new(ParamType::Number), tag("number"));
        assert!(!registry.is_ambiguous("f", &Value::Int(1), &[]));
        assert_eq!(registry.invoke("f", &Value::Int(1), &[]), Ok(Value::from("int")));
    }

    #[test]
    fn test_ranked_overloads_outlive_the_name() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("f", Signature::new(ParamType::Any), tag("any"))
            .register("f", Signature::new(ParamType::String), tag("string"));

        let ranked = {
            let name = String::from("f");
            registry.rank(&name, &Value::from("x"), &[])
        };
        let order: Vec<String> = ranked.iter().map(|(_, f)| f.signature.to_string()).collect();
        assert_eq!(order, vec!["(String)", "(Any)"]);
        assert_eq!(registry.candidates("f").count(), 2);
    }

    #[test]
    fn test_hand_built_signature_with_excess_optional() {
        let signature = Signature {
            source: ParamType::Any,
            params: vec![ParamType::Int],
            optional: 3,
            rest: None,
        };
        assert!(signature.accepts_arity(0));
        assert!(signature.accepts_arity(1));
        assert!(!signature.accepts_arity(2));
        assert_eq!(signature.to_string(), "(Any, Int?)");
    }

    #[test]
    fn test_arity_filters_candidates() {
        let mut registry = FormatterRegistry::new();
        registry
            .register(
                "pad",
                Signature::new(ParamType::String)
                    .param(ParamType::Int)
                    .optional(ParamType::String),
                tag("two-or-three"),
            )
            .register("pad", Signature::new(ParamType::String), tag("one"));

        let s = Value::from("x");
        assert_eq!(registry.invoke("pad", &s, &[]), Ok(Value::from("one")));
        assert_eq!(
            registry.invoke("pad", &s, &[Value::Int(3)]),
            Ok(Value::from("two-or-three"))
        );
        assert_eq!(
            registry.invoke("pad", &s, &[Value::Int(3), Value::from("-")]),
            Ok(Value::from("two-or-three"))
        );
        assert!(registry
            .invoke("pad", &s, &[Value::Int(3), Value::from("-"), Value::Null])
            .is_err());
    }

    #[test]
    fn test_rest_parameters() {
        let mut registry = FormatterRegistry::new();
        registry.register(
            "sum",
            Signature::new(ParamType::Int).rest(ParamType::Int),
            |source, args| {
                let mut total = match source {
                    Value::Int(i) => *i,
                    _ => 0,
                };
                for arg in args {
                    if let Value::Int(i) = arg {
                        total += i;
                    }
                }
                Ok(Value::Int(total))
            },
        );
        assert_eq!(
            registry.invoke("sum", &Value::Int(1), &[Value::Int(2), Value::Float(3.0)]),
            Ok(Value::Int(6))
        );
    }

    #[test]
    fn test_unresolved_reports_runtime_types() {
        let registry = FormatterRegistry::new();
        let err = registry
            .invoke("nope", &Value::Int(1), &[Value::from("a")])
            .unwrap_err();
        assert_eq!(
            err,
            FormatterResolutionError::Unresolved {
                name: "nope".to_string(),
                signature: "(Int, String)".to_string()
            }
        );
    }

    #[test]
    fn test_object_parameters_match_by_type_name() {
        let mut registry = FormatterRegistry::new();
        registry
            .register("show", Signature::new(ParamType::Object("Money".to_string())), tag("money"))
            .register("show", Signature::new(ParamType::Any), tag("any"));
        let money = Value::from(Arc::new(Money));
        assert_eq!(registry.invoke("show", &money, &[]), Ok(Value::from("money")));
    }

    #[test]
    fn test_arguments_are_converted_before_the_call() {
        let mut registry = FormatterRegistry::new();
        registry.register(
            "kind",
            Signature::new(ParamType::String).param(ParamType::Float),
            |source, args| Ok(Value::from(format!("{:?}/{:?}", source, args[0]))),
        );
        assert_eq!(
            registry.invoke("kind", &Value::Int(7), &[Value::Int(2)]),
            Ok(Value::from("String(\"7\")/Float(2.0)"))
        );
    }

    #[test]
    fn test_invocation_error() {
        let mut registry = FormatterRegistry::new();
        registry.register("boom", Signature::new(ParamType::Any), |_, _| {
            Err(FormatterError::new("bad input"))
        });
        assert_eq!(
            registry.invoke("boom", &Value::Null, &[]),
            Err(FormatterResolutionError::Invocation {
                name: "boom".to_string(),
                message: "bad input".to_string()
            })
        );
    }

    #[test]
    fn test_signature_display() {
        let signature = Signature::new(ParamType::String)
            .param(ParamType::Int)
            .optional(ParamType::String)
            .rest(ParamType::Any);
        assert_eq!(signature.to_string(), "(String, Int, String?, Any...)");
    }
}
