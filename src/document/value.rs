//! Value types for documents
//!
//! A value is a tagged union. Conversions are explicit and fallible; a
//! conversion that would lose information fails with
//! `AERO_CONVERSION_FAILED` instead of truncating.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DbResult};

use super::buffer::FieldBuffer;

/// Type tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Null,
    Bool,
    Integer,
    Double,
    Text,
    Blob,
    Array,
    Document,
}

impl ValueType {
    /// Returns the type name for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::Text => "text",
            ValueType::Blob => "blob",
            ValueType::Array => "array",
            ValueType::Document => "document",
        }
    }

    /// Returns true for integer and double
    pub fn is_number(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Double)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A document value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Array(Vec<Value>),
    Document(FieldBuffer),
}

impl Value {
    /// Returns the type tag
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
            Value::Array(_) => ValueType::Array,
            Value::Document(_) => ValueType::Document,
        }
    }

    /// Returns true for integer and double values
    pub fn is_number(&self) -> bool {
        self.value_type().is_number()
    }

    /// Returns true for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to the target type.
    ///
    /// Identity conversions always succeed. Numeric conversions succeed only
    /// when no information is lost.
    pub fn convert_to(&self, target: ValueType) -> DbResult<Value> {
        if self.value_type() == target {
            return Ok(self.clone());
        }

        match (self, target) {
            (Value::Integer(i), ValueType::Double) => Ok(Value::Double(*i as f64)),
            (Value::Double(d), ValueType::Integer) => double_to_int(*d).map(Value::Integer),
            (Value::Bool(b), ValueType::Integer) => Ok(Value::Integer(i64::from(*b))),
            (Value::Integer(i), ValueType::Bool) => Ok(Value::Bool(*i != 0)),
            (Value::Text(s), ValueType::Blob) => Ok(Value::Blob(s.clone().into_bytes())),
            (Value::Blob(b), ValueType::Text) => String::from_utf8(b.clone())
                .map(Value::Text)
                .map_err(|_| DbError::conversion_failed("blob is not valid UTF-8 text")),
            _ => Err(DbError::conversion_failed(format!(
                "cannot convert {} to {}",
                self.value_type(),
                target
            ))),
        }
    }

    /// Converts a numeric value to i64.
    pub fn convert_to_int(&self) -> DbResult<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Double(d) => double_to_int(*d),
            other => Err(DbError::type_mismatch(format!(
                "expected a number, got {}",
                other.value_type()
            ))),
        }
    }

    /// Converts a numeric value to f64.
    pub fn convert_to_double(&self) -> DbResult<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Double(d) => Ok(*d),
            other => Err(DbError::type_mismatch(format!(
                "expected a number, got {}",
                other.value_type()
            ))),
        }
    }

    /// Returns whether the value counts as true in a predicate
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Blob(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Document(d) => !d.is_empty(),
        }
    }

    /// Compares two values.
    ///
    /// Integers and doubles compare numerically with each other. Any other
    /// pair of different types is incomparable and returns None.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Document(a), Value::Document(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Builds a value from JSON.
    ///
    /// Objects become documents; integral JSON numbers become integers.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Document(FieldBuffer::from_json(json)),
        }
    }

    /// Converts the value to JSON. Blobs become arrays of bytes.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => serde_json::Value::from(b.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(d) => d.to_json(),
        }
    }
}

fn double_to_int(d: f64) -> DbResult<i64> {
    if d.fract() != 0.0 || !d.is_finite() {
        return Err(DbError::conversion_failed(format!(
            "cannot convert {} to integer without losing precision",
            d
        )));
    }
    // 2^63 is exactly representable; anything at or above it overflows i64
    if d < -9_223_372_036_854_775_808.0 || d >= 9_223_372_036_854_775_808.0 {
        return Err(DbError::conversion_failed(format!(
            "{} is out of integer range",
            d
        )));
    }
    Ok(d as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Blob(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Array(_) | Value::Document(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}
