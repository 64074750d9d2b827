/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value types.
//!
//! [`Value`] is the data model templates are rendered against. Host types that
//! do not map onto plain data implement [`Object`] and travel as
//! [`Value::Object`]; their members are looked up on demand.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A host object exposed to templates.
///
/// Lookups return owned values; a template never holds a borrow into the
/// host object.
pub trait Object: fmt::Debug + Send + Sync {
    /// Name used for formatter overload matching and diagnostics.
    fn type_name(&self) -> &str;

    /// Named member lookup (`{{obj.member}}`).
    fn get_member(&self, name: &str) -> Option<Value>;

    /// Positional lookup (`{{obj.0}}`); only meaningful for sequence-like objects.
    fn get_index(&self, _index: usize) -> Option<Value> {
        None
    }

    /// Element count if the object behaves as a sequence.
    fn sequence_len(&self) -> Option<usize> {
        None
    }

    /// Text written when the object itself is output.
    fn render(&self) -> String {
        self.type_name().to_string()
    }
}

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// An explicit null.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    /// Keyed collection, iterated in key order.
    Map(BTreeMap<String, Value>),
    /// A host object.
    Object(Arc<dyn Object>),
}

/// Runtime type of a [`Value`], used for overload selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
    Object(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Null => write!(f, "Null"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Float => write!(f, "Float"),
            ValueType::String => write!(f, "String"),
            ValueType::List => write!(f, "List"),
            ValueType::Map => write!(f, "Map"),
            ValueType::Object(name) => write!(f, "{}", name),
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Object(obj) => ValueType::Object(obj.type_name().to_string()),
        }
    }

    /// Build a value from anything serde can serialize.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(value).map(Value::from)
    }

    /// Check if this value is "truthy" for section evaluation.
    ///
    /// Falsy: null, `false`, zero (including `0.0` and NaN), the empty string,
    /// empty lists and maps, and sequence objects of length zero. A string of
    /// whitespace is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Object(obj) => obj.sequence_len() != Some(0),
        }
    }

    /// Named member lookup: map key, object member, or a numeric name
    /// against a list.
    pub fn get_member(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Map(m) => m.get(name).map(Cow::Borrowed),
            Value::Object(obj) => obj.get_member(name).map(Cow::Owned),
            Value::List(_) => name.parse::<usize>().ok().and_then(|i| self.get_index(i)),
            _ => None,
        }
    }

    /// Bounds-checked positional lookup. Maps accept the index as a key.
    pub fn get_index(&self, index: usize) -> Option<Cow<'_, Value>> {
        match self {
            Value::List(items) => items.get(index).map(Cow::Borrowed),
            Value::Object(obj) => match obj.sequence_len() {
                Some(len) if index < len => obj.get_index(index).map(Cow::Owned),
                _ => None,
            },
            Value::Map(m) => m.get(&index.to_string()).map(Cow::Borrowed),
            _ => None,
        }
    }

    /// Elements of a sequence value, or `None` if the value is not iterable.
    ///
    /// Maps iterate as `{key, value}` entries in key order.
    pub fn elements(&self) -> Option<Vec<Cow<'_, Value>>> {
        match self {
            Value::List(items) => Some(items.iter().map(Cow::Borrowed).collect()),
            Value::Map(m) => Some(
                m.iter()
                    .map(|(k, v)| {
                        let mut entry = BTreeMap::new();
                        entry.insert("key".to_string(), Value::String(k.clone()));
                        entry.insert("value".to_string(), v.clone());
                        Cow::Owned(Value::Map(entry))
                    })
                    .collect(),
            ),
            Value::Object(obj) => obj.sequence_len().map(|len| {
                (0..len)
                    .map(|i| Cow::Owned(obj.get_index(i).unwrap_or(Value::Null)))
                    .collect()
            }),
            _ => None,
        }
    }

    /// Render this value as text for output.
    ///
    /// - Null: the supplied null substitution
    /// - Bool: "true" / "false"
    /// - numbers: their decimal form
    /// - List: elements joined with ", "
    /// - Map: compact JSON
    /// - Object: [`Object::render`]
    pub fn render(&self, null_value: &str) -> String {
        match self {
            Value::Null => null_value.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(|v| v.render(null_value))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Map(_) => self.to_json().to_string(),
            Value::Object(obj) => obj.render(),
        }
    }

    /// Convert to JSON. Objects become their rendered text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(obj) => serde_json::Value::String(obj.render()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Object + 'static> From<Arc<T>> for Value {
    fn from(obj: Arc<T>) -> Self {
        Value::Object(obj)
    }
}
