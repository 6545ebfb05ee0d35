//! Argument descriptors and coercion.
//!
//! Incoming `methodArgs`/`classArgs` elements come in three shapes:
//!
//! - compact string: `"int:3"`, `"int:b=3"`, `"b=3"` — the payload stays a
//!   string literal; only the declared type may coerce it further
//! - tagged object: `{"type": "int", "value": 3, "key": "b"}`
//! - bare JSON literal: the type is inferred from the runtime tag
//!
//! Coercion is *soft*: every step of the fallback chain fails silently and
//! the final fallback hands the value through uncoerced. The only hard
//! failures are an unresolvable type name and a function-typed argument
//! whose value is not an object.

use crate::callback::CallbackBridge;
use crate::error::InvokeError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;
use unicall_registry::{
    CallArgs, Callable, ClassEntry, FunctionEntry, ParamSpec, TypeDescriptor, TypeKind,
    TypeRegistry, DEFAULT_CONSTRUCTOR,
};
use unicall_types::{wire, Value};

/// A parsed-but-unresolved argument descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArg {
    /// Keyword-binding name, when the descriptor carries one.
    pub key: Option<String>,
    /// Declared type name, when the descriptor carries one.
    pub type_name: Option<String>,
    /// The literal payload.
    pub value: Value,
}

/// An argument after type resolution and coercion.
#[derive(Debug, Clone)]
pub struct BoundArg {
    pub key: Option<String>,
    pub type_desc: TypeDescriptor,
    pub value: Value,
}

impl BoundArg {
    /// Re-tags this argument for the `methodArgs` echo in the envelope.
    #[must_use]
    pub fn echo(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            wire::KEY_TYPE.to_string(),
            serde_json::Value::String(self.type_desc.name.clone()),
        );
        map.insert(wire::KEY_VALUE.to_string(), self.value.to_json());
        if let Some(key) = &self.key {
            map.insert(
                wire::KEY_KEY.to_string(),
                serde_json::Value::String(key.clone()),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Parses one descriptor into a [`RawArg`] without resolving its type.
#[must_use]
pub fn parse_descriptor(json: &serde_json::Value) -> RawArg {
    match json {
        serde_json::Value::String(s) => parse_compact(s),
        serde_json::Value::Object(map)
            if map.contains_key(wire::KEY_TYPE)
                || map.contains_key(wire::KEY_VALUE)
                || map.contains_key(wire::KEY_KEY) =>
        {
            RawArg {
                key: map
                    .get(wire::KEY_KEY)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                type_name: map
                    .get(wire::KEY_TYPE)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                value: map
                    .get(wire::KEY_VALUE)
                    .cloned()
                    .map(Value::from_json)
                    .unwrap_or(Value::Null),
            }
        }
        other => RawArg {
            key: None,
            type_name: None,
            value: Value::from_json(other.clone()),
        },
    }
}

/// Parses the compact string forms. The payload after `type:` and `key=`
/// stays a string literal; `from_json` is never involved here.
fn parse_compact(s: &str) -> RawArg {
    let (type_name, payload) = match s.find(':') {
        Some(ind) => {
            let prefix = &s[..ind];
            if prefix.is_empty() {
                (None, &s[ind + 1..])
            } else {
                (Some(prefix.to_string()), &s[ind + 1..])
            }
        }
        None => (None, s),
    };

    if let Some(eq) = payload.find('=') {
        let key = &payload[..eq];
        if is_identifier(key) {
            return RawArg {
                key: Some(key.to_string()),
                type_name,
                value: Value::Str(payload[eq + 1..].to_string()),
            };
        }
    }

    if type_name.is_none() {
        // A plain string with neither marker is a bare literal.
        return RawArg {
            key: None,
            type_name: None,
            value: Value::Str(s.to_string()),
        };
    }

    RawArg {
        key: None,
        type_name,
        value: Value::Str(payload.to_string()),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolves descriptor types and coerces their payloads.
pub struct Coercer<'a> {
    types: &'a TypeRegistry,
    bridge: &'a CallbackBridge,
}

impl<'a> Coercer<'a> {
    pub fn new(types: &'a TypeRegistry, bridge: &'a CallbackBridge) -> Self {
        Self { types, bridge }
    }

    /// Resolves the declared (or inferred) type and coerces the payload.
    ///
    /// # Errors
    ///
    /// [`InvokeError::Type`] for an unresolvable type name and
    /// [`InvokeError::Binding`] for a function-typed argument whose value
    /// is not an object.
    pub fn coerce(&self, raw: RawArg) -> Result<BoundArg, InvokeError> {
        let type_desc = self
            .types
            .resolve(raw.type_name.as_deref(), Some(&raw.value))?;

        let value = match &type_desc.kind {
            TypeKind::Function(sig) => {
                let Value::Map(spec) = &raw.value else {
                    return Err(InvokeError::binding(format!(
                        "{} argument requires an object value, got {}",
                        type_desc.name,
                        raw.value.type_name()
                    )));
                };
                let stub = self
                    .bridge
                    .materialize(&type_desc.name, sig, spec, raw.key.as_deref())?;
                Value::Opaque(stub)
            }
            _ => coerce_plain(&type_desc, raw.value),
        };

        Ok(BoundArg {
            key: raw.key,
            type_desc,
            value,
        })
    }
}

/// Coerces a value to a non-function type; never fails, falls back to the
/// value uncoerced.
#[must_use]
pub fn coerce_plain(desc: &TypeDescriptor, value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match &desc.kind {
        TypeKind::Any | TypeKind::Function(_) => value,
        TypeKind::Bool => match &value {
            Value::Bool(_) => value,
            Value::Int(i) => Value::Bool(*i != 0),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" | "" => Value::Bool(false),
                _ => value,
            },
            _ => value,
        },
        TypeKind::Int => match &value {
            Value::Int(_) => value,
            Value::Float(f) => Value::Int(*f as i64),
            Value::Bool(b) => Value::Int(i64::from(*b)),
            Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(value),
            _ => value,
        },
        TypeKind::Float => match &value {
            Value::Float(_) => value,
            Value::Int(i) => Value::Float(*i as f64),
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(value),
            _ => value,
        },
        TypeKind::Str => match &value {
            Value::Str(_) => value,
            Value::Int(i) => Value::Str(i.to_string()),
            Value::Float(f) => Value::Str(f.to_string()),
            Value::Bool(b) => Value::Str(b.to_string()),
            _ => value,
        },
        TypeKind::List => match &value {
            Value::List(_) => value,
            Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json @ serde_json::Value::Array(_)) => Value::from_json(json),
                _ => value,
            },
            _ => value,
        },
        TypeKind::Dict => match &value {
            Value::Map(_) => value,
            Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json @ serde_json::Value::Object(_)) => Value::from_json(json),
                _ => value,
            },
            _ => value,
        },
        TypeKind::Class(class) => coerce_class(class, value),
    }
}

/// The class fallback chain: structured decode, then positional spread of
/// a list into the default constructor, then keyword spread of a map.
fn coerce_class(class: &Arc<ClassEntry>, value: Value) -> Value {
    match &value {
        Value::Opaque(handle) if handle.type_name() == class.qualified() => value,
        Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                coerce_class(class, Value::from_json(json))
            }
            _ => value,
        },
        Value::Map(map) => {
            if class.decode().is_some() {
                match class.decode_value(&value.to_json()) {
                    Ok(handle) => return Value::Opaque(handle),
                    Err(err) => trace!(class = class.qualified(), %err, "decode fell through"),
                }
            }
            class
                .constructor(DEFAULT_CONSTRUCTOR)
                .and_then(|ctor| spread_keywords(ctor, map))
                .unwrap_or(value)
        }
        Value::List(items) => class
            .constructor(DEFAULT_CONSTRUCTOR)
            .and_then(|ctor| call_sync(ctor, items.clone()))
            .unwrap_or(value),
        _ => value,
    }
}

fn spread_keywords(ctor: &FunctionEntry, map: &BTreeMap<String, Value>) -> Option<Value> {
    let known = |k: &String| ctor.params().iter().any(|p| p.name == *k);
    if !map.keys().all(known) {
        return None;
    }
    let values = ctor
        .params()
        .iter()
        .map(|p| map.get(&p.name).cloned().unwrap_or(Value::Null))
        .collect();
    call_sync(ctor, values)
}

fn call_sync(entry: &FunctionEntry, values: Vec<Value>) -> Option<Value> {
    match entry.callable() {
        Callable::Sync(f) => f(CallArgs::positional(values)).ok(),
        Callable::Async(_) => None,
    }
}

/// Merges coerced arguments into the declared parameter slots.
///
/// Positional arguments fill slots in order; keyed arguments bind by name
/// and must form a contiguous tail. Missing slots stay `Null`; extra
/// positional arguments are appended after the declared slots.
///
/// # Errors
///
/// [`InvokeError::Binding`] for a positional argument after a keyed one,
/// an unknown key, or a slot bound twice.
pub fn bind_args(params: &[ParamSpec], args: &[BoundArg]) -> Result<Vec<Value>, InvokeError> {
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut extra = Vec::new();
    let mut keyed = false;

    for (i, arg) in args.iter().enumerate() {
        match &arg.key {
            Some(key) => {
                keyed = true;
                let index = params
                    .iter()
                    .position(|p| p.name == *key)
                    .ok_or_else(|| {
                        InvokeError::binding(format!("unknown keyword argument '{key}'"))
                    })?;
                if slots[index].is_some() {
                    return Err(InvokeError::binding(format!(
                        "duplicate argument for '{key}'"
                    )));
                }
                slots[index] = Some(arg.value.clone());
            }
            None => {
                if keyed {
                    return Err(InvokeError::binding(format!(
                        "positional argument {i} after a keyword argument"
                    )));
                }
                if i < slots.len() {
                    slots[i] = Some(arg.value.clone());
                } else {
                    extra.push(arg.value.clone());
                }
            }
        }
    }

    let mut values: Vec<Value> = slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Value::Null))
        .collect();
    values.extend(extra);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use unicall_registry::testing::{sample_registry, TestRecord};
    use unicall_registry::TypeRegistry;

    fn types() -> TypeRegistry {
        TypeRegistry::new(Arc::new(sample_registry()))
    }

    fn coerce(raw: RawArg) -> Result<BoundArg, InvokeError> {
        let types = types();
        let bridge = CallbackBridge::new(types.clone(), None);
        Coercer::new(&types, &bridge).coerce(raw)
    }

    fn param(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.into(),
            type_name: "any".into(),
        }
    }

    fn bound(key: Option<&str>, value: Value) -> BoundArg {
        BoundArg {
            key: key.map(str::to_string),
            type_desc: TypeRegistry::infer(Some(&value)),
            value,
        }
    }

    #[test]
    fn tagged_object_descriptor() {
        let raw = parse_descriptor(&json!({"type": "int", "value": 3}));
        assert_eq!(raw.type_name.as_deref(), Some("int"));
        assert_eq!(raw.value, Value::Int(3));
        assert!(raw.key.is_none());
    }

    #[test]
    fn compact_string_descriptors() {
        let raw = parse_descriptor(&json!("int:3"));
        assert_eq!(raw.type_name.as_deref(), Some("int"));
        assert_eq!(raw.value, Value::Str("3".into()));

        let raw = parse_descriptor(&json!("int:b=3"));
        assert_eq!(raw.type_name.as_deref(), Some("int"));
        assert_eq!(raw.key.as_deref(), Some("b"));
        assert_eq!(raw.value, Value::Str("3".into()));

        let raw = parse_descriptor(&json!("b=3"));
        assert!(raw.type_name.is_none());
        assert_eq!(raw.key.as_deref(), Some("b"));
        assert_eq!(raw.value, Value::Str("3".into()));
    }

    #[test]
    fn bare_literals() {
        let raw = parse_descriptor(&json!(3));
        assert!(raw.type_name.is_none());
        assert_eq!(raw.value, Value::Int(3));

        // No ':' or valid 'key=' marker: a plain string literal.
        let raw = parse_descriptor(&json!("hello"));
        assert_eq!(raw.value, Value::Str("hello".into()));

        // '=' without an identifier key stays a literal.
        let raw = parse_descriptor(&json!("1=2"));
        assert!(raw.key.is_none());
        assert_eq!(raw.value, Value::Str("1=2".into()));
    }

    #[test]
    fn compact_payload_is_not_json_parsed() {
        // "str:[1]" keeps the brackets; only the declared type coerces.
        let arg = coerce(parse_descriptor(&json!("str:[1]"))).unwrap();
        assert_eq!(arg.value, Value::Str("[1]".into()));

        let arg = coerce(parse_descriptor(&json!("list:[1]"))).unwrap();
        assert_eq!(arg.value, Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn primitive_coercion() {
        let arg = coerce(parse_descriptor(&json!("int:3"))).unwrap();
        assert_eq!(arg.value, Value::Int(3));

        let arg = coerce(parse_descriptor(&json!({"type": "float", "value": 2}))).unwrap();
        assert_eq!(arg.value, Value::Float(2.0));

        let arg = coerce(parse_descriptor(&json!({"type": "str", "value": 2}))).unwrap();
        assert_eq!(arg.value, Value::Str("2".into()));

        let arg = coerce(parse_descriptor(&json!({"type": "bool", "value": "true"}))).unwrap();
        assert_eq!(arg.value, Value::Bool(true));
    }

    #[test]
    fn uncoercible_value_passes_through() {
        let arg = coerce(parse_descriptor(&json!({"type": "int", "value": "xyz"}))).unwrap();
        assert_eq!(arg.value, Value::Str("xyz".into()));
    }

    #[test]
    fn null_stays_null() {
        let arg = coerce(parse_descriptor(&json!({"type": "int", "value": null}))).unwrap();
        assert_eq!(arg.value, Value::Null);
    }

    #[test]
    fn class_decode_from_map() {
        let raw = parse_descriptor(&json!({
            "type": "unicall.test.testutil$Test",
            "value": {"id": 3, "sex": 1, "name": "X"},
        }));
        let arg = coerce(raw).unwrap();
        let handle = arg.value.as_opaque().expect("instance");
        assert_eq!(handle.type_name(), "unicall.test.testutil$Test");
        let id = handle.with::<TestRecord, _, _>(|r| r.id).unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn class_positional_spread_from_list() {
        let raw = parse_descriptor(&json!({
            "type": "unicall.test.testutil$Test",
            "value": [7, 0, "Spread"],
        }));
        let arg = coerce(raw).unwrap();
        let handle = arg.value.as_opaque().expect("instance");
        let name = handle.with::<TestRecord, _, _>(|r| r.name.clone()).unwrap();
        assert_eq!(name, "Spread");
    }

    #[test]
    fn class_from_json_string() {
        let raw = parse_descriptor(&json!({
            "type": "unicall.test.testutil$Test",
            "value": "{\"id\": 5, \"sex\": 0, \"name\": \"S\"}",
        }));
        let arg = coerce(raw).unwrap();
        let id = arg
            .value
            .as_opaque()
            .unwrap()
            .with::<TestRecord, _, _>(|r| r.id)
            .unwrap();
        assert_eq!(id, 5);
    }

    #[test]
    fn unknown_type_is_hard_error() {
        let raw = parse_descriptor(&json!({"type": "no.such$T", "value": 1}));
        let err = coerce(raw).unwrap_err();
        assert_eq!(err.kind(), "UnresolvedType");
    }

    #[test]
    fn function_type_requires_object() {
        let raw = parse_descriptor(&json!({"type": "def(a,b)", "value": 1}));
        let err = coerce(raw).unwrap_err();
        assert_eq!(err.kind(), "BindingError");
    }

    #[test]
    fn inferred_type_from_bare_value() {
        let arg = coerce(parse_descriptor(&json!(3.5))).unwrap();
        assert_eq!(arg.type_desc.name, "float");
        assert_eq!(arg.value, Value::Float(3.5));
    }

    #[test]
    fn echo_shape() {
        let arg = coerce(parse_descriptor(&json!("int:b=3"))).unwrap();
        assert_eq!(arg.echo(), json!({"type": "int", "value": 3, "key": "b"}));
    }

    #[test]
    fn bind_positional_then_keyed_tail() {
        let params = [param("a"), param("b"), param("c")];
        let args = [
            bound(None, Value::Int(1)),
            bound(Some("c"), Value::Int(3)),
            bound(Some("b"), Value::Int(2)),
        ];
        let values = bind_args(&params, &args).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn bind_rejects_positional_after_keyed() {
        let params = [param("a"), param("b")];
        let args = [bound(Some("a"), Value::Int(1)), bound(None, Value::Int(2))];
        let err = bind_args(&params, &args).unwrap_err();
        assert_eq!(err.kind(), "BindingError");
    }

    #[test]
    fn bind_rejects_unknown_and_duplicate_keys() {
        let params = [param("a")];
        let err = bind_args(&params, &[bound(Some("z"), Value::Int(1))]).unwrap_err();
        assert_eq!(err.kind(), "BindingError");

        let args = [bound(None, Value::Int(1)), bound(Some("a"), Value::Int(2))];
        let err = bind_args(&params, &args).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn bind_fills_missing_with_null_and_appends_extras() {
        let params = [param("a"), param("b")];
        let values = bind_args(&params, &[bound(None, Value::Int(1))]).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Null]);

        let args = [
            bound(None, Value::Int(1)),
            bound(None, Value::Int(2)),
            bound(None, Value::Int(3)),
        ];
        let values = bind_args(&params, &args).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], Value::Int(3));
    }
}
