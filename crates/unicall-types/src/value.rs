//! The tagged value union exchanged at every engine boundary.
//!
//! Arguments arrive as JSON, are coerced into [`Value`]s, flow through the
//! registered callables, and leave again as JSON. `Value` mirrors the JSON
//! data model and adds one extra arm, [`Value::Opaque`], for constructed
//! target instances (and callback stubs) that have no JSON representation
//! of their own.
//!
//! # Example
//!
//! ```
//! use unicall_types::Value;
//! use serde_json::json;
//!
//! let v = Value::from_json(json!({"id": 3, "name": "UnitAuto"}));
//! assert_eq!(v.type_name(), "dict");
//! assert_eq!(v.to_json(), json!({"id": 3, "name": "UnitAuto"}));
//! ```

use crate::instance::InstanceHandle;
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed value.
///
/// # Runtime type names
///
/// Every arm maps to a primitive type name used for inference when an
/// argument descriptor carries no explicit `type`:
///
/// | Arm | Name |
/// |-----|------|
/// | `Null` | `any` |
/// | `Bool` | `bool` |
/// | `Int` | `int` |
/// | `Float` | `float` |
/// | `Str` | `str` |
/// | `List` | `list` |
/// | `Map` | `dict` |
/// | `Opaque` | the instance's registered type name |
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A constructed target instance or callback stub.
    Opaque(InstanceHandle),
}

impl Value {
    /// Converts a JSON value into a [`Value`].
    ///
    /// Numbers that fit `i64` become [`Value::Int`]; everything else
    /// numeric becomes [`Value::Float`].
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into JSON.
    ///
    /// [`Value::Opaque`] serializes via the instance's best-effort
    /// [`snapshot`](crate::Instance::snapshot); a non-finite float becomes
    /// `null` (JSON has no NaN/Inf).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Opaque(handle) => handle.snapshot(),
        }
    }

    /// Returns the inferred primitive type name of this value.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "any".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "dict".to_string(),
            Value::Opaque(handle) => handle.type_name(),
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the inner `i64` if this is an [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the inner `f64` for [`Value::Float`] or [`Value::Int`].
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the inner `bool` if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the inner string slice if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner list if this is a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the inner map if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the instance handle if this is an [`Value::Opaque`].
    #[must_use]
    pub fn as_opaque(&self) -> Option<&InstanceHandle> {
        match self {
            Value::Opaque(handle) => Some(handle),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality; `Opaque` values compare by handle identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Opaque(handle) => write!(f, "Opaque({})", handle.type_name()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip() {
        let json = json!({
            "id": 3,
            "ratio": 0.5,
            "name": "UnitAuto",
            "tags": [1, 2, 3],
            "none": null,
            "ok": true,
        });
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn integer_vs_float_tagging() {
        assert_eq!(Value::from_json(json!(3)), Value::Int(3));
        assert_eq!(Value::from_json(json!(3.5)), Value::Float(3.5));
    }

    #[test]
    fn type_name_inference() {
        assert_eq!(Value::Null.type_name(), "any");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.5).type_name(), "float");
        assert_eq!(Value::Str("x".into()).type_name(), "str");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(Value::Map(BTreeMap::new()).type_name(), "dict");
    }

    #[test]
    fn non_finite_float_serializes_as_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(2).as_int(), Some(2));
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Str("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::Null.as_int().is_none());
    }
}
