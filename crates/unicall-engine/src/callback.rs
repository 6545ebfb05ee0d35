//! Callback stubs and the out-of-band notice channel.
//!
//! A function-typed argument (`{"type": "def(a,b)", "value": {...}}`)
//! never carries executable code. The bridge materializes a [`CallbackStub`]
//! from the descriptor's value object:
//!
//! - `type` — declared return type name (defaults to `any`)
//! - `return` — literal return value, or a string evaluated as a bounded
//!   expression over the declared parameter names
//! - `callback` — when `true`, every stub call forwards a
//!   [`CallbackNotice`] over the engine's notice channel
//!
//! The stub records every call it receives in order; the log rides along in
//! the stub's snapshot under `call()[]` so it shows up in the `methodArgs`
//! echo of the enclosing invocation.

use crate::coerce::coerce_plain;
use crate::error::InvokeError;
use crate::expr;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::mpsc;
use tracing::{debug, warn};
use unicall_registry::{FnSignature, TypeRegistry};
use unicall_types::{wire, Callback, Instance, InstanceHandle, Value};

/// One received argument, re-tagged for the record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaggedArg {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: serde_json::Value,
}

/// One stub call: when it happened and what it received.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Epoch microseconds at the moment of the call.
    #[serde(rename = "time")]
    pub time_micros: u64,
    #[serde(rename = "methodArgs")]
    pub args: Vec<TaggedArg>,
}

/// An as-you-go notification forwarded while the enclosing invocation is
/// still running.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackNotice {
    /// Qualified name of the enclosing target, `package.class.method`.
    pub method: String,
    /// The stub's function type, e.g. `def(a,b)`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Keyword the stub was bound under, when it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub call: CallRecord,
    /// Partial envelope of the still-running enclosing invocation.
    pub envelope: serde_json::Value,
}

/// Materializes callback stubs for one invocation.
///
/// The bridge carries the invocation context (enclosing method, partial
/// envelope) so every stub it produces can stamp its notices.
pub struct CallbackBridge {
    types: TypeRegistry,
    notify: Option<mpsc::Sender<CallbackNotice>>,
    method: String,
    envelope: serde_json::Value,
}

impl CallbackBridge {
    pub fn new(types: TypeRegistry, notify: Option<mpsc::Sender<CallbackNotice>>) -> Self {
        Self {
            types,
            notify,
            method: String::new(),
            envelope: serde_json::Value::Null,
        }
    }

    /// Attaches the enclosing-invocation context stamped onto notices.
    #[must_use]
    pub fn with_context(mut self, method: impl Into<String>, envelope: serde_json::Value) -> Self {
        self.method = method.into();
        self.envelope = envelope;
        self
    }

    /// Builds a stub from a function-typed descriptor's value object.
    ///
    /// # Errors
    ///
    /// [`InvokeError::Validation`] when the `callback` field is present but
    /// not a bool.
    pub fn materialize(
        &self,
        type_name: &str,
        sig: &FnSignature,
        spec: &BTreeMap<String, Value>,
        key: Option<&str>,
    ) -> Result<InstanceHandle, InvokeError> {
        let forward = match spec.get(wire::KEY_CALLBACK) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(InvokeError::validation(format!(
                    "{} must be bool, got {}!",
                    wire::KEY_CALLBACK,
                    other.type_name()
                )))
            }
        };

        let return_type = spec
            .get(wire::KEY_TYPE)
            .and_then(Value::as_str)
            .unwrap_or("any")
            .to_string();

        let stub = CallbackStub {
            type_name: type_name.to_string(),
            key: key.map(str::to_string),
            params: sig.params.clone(),
            return_type,
            return_spec: spec.get(wire::KEY_RETURN).cloned(),
            forward,
            method: self.method.clone(),
            envelope: self.envelope.clone(),
            types: self.types.clone(),
            notify: self.notify.clone(),
            log: Mutex::new(Vec::new()),
        };
        Ok(InstanceHandle::new(stub))
    }
}

/// A synthesized callable bound into a function-typed argument slot.
pub struct CallbackStub {
    type_name: String,
    key: Option<String>,
    params: Vec<String>,
    return_type: String,
    return_spec: Option<Value>,
    forward: bool,
    method: String,
    envelope: serde_json::Value,
    types: TypeRegistry,
    notify: Option<mpsc::Sender<CallbackNotice>>,
    log: Mutex<Vec<CallRecord>>,
}

impl CallbackStub {
    /// Computes the declared return for one call.
    ///
    /// A string `return` is evaluated as an expression over the declared
    /// parameter names bound to the received arguments; evaluation failure
    /// falls back to the literal. Either way the result is coerced to the
    /// declared return type (soft).
    fn returned(&self, args: &[Value]) -> Value {
        let Some(spec) = &self.return_spec else {
            return Value::Null;
        };

        let value = if let Value::Str(text) = spec {
            let mut scope = BTreeMap::new();
            for (i, name) in self.params.iter().enumerate() {
                scope.insert(name.clone(), args.get(i).cloned().unwrap_or(Value::Null));
            }
            match expr::eval(text, &scope) {
                Ok(value) => value,
                Err(err) => {
                    debug!(expr = %text, %err, "return expression fell back to the literal");
                    spec.clone()
                }
            }
        } else {
            spec.clone()
        };

        match self.types.resolve(Some(&self.return_type), Some(&value)) {
            Ok(desc) => coerce_plain(&desc, value),
            Err(_) => value,
        }
    }
}

impl Instance for CallbackStub {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn snapshot(&self) -> Option<serde_json::Value> {
        let log = serde_json::to_value(&*self.log.lock()).unwrap_or(serde_json::Value::Null);
        let mut map = serde_json::Map::new();
        map.insert(
            wire::KEY_TYPE.to_string(),
            serde_json::Value::String(self.return_type.clone()),
        );
        map.insert(
            wire::KEY_RETURN.to_string(),
            self.return_spec
                .as_ref()
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
        );
        map.insert(
            wire::KEY_CALLBACK.to_string(),
            serde_json::Value::Bool(self.forward),
        );
        map.insert(wire::KEY_CALL_LIST.to_string(), log);
        Some(serde_json::Value::Object(map))
    }

    fn debug_string(&self) -> String {
        format!("CallbackStub({})", self.type_name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_callback(&self) -> Option<&dyn Callback> {
        Some(self)
    }
}

impl Callback for CallbackStub {
    fn call(&self, args: &[Value]) -> Result<Value, String> {
        let record = CallRecord {
            time_micros: wire::now_micros() as u64,
            args: args
                .iter()
                .map(|v| TaggedArg {
                    type_name: v.type_name(),
                    value: v.to_json(),
                })
                .collect(),
        };
        self.log.lock().push(record.clone());

        if self.forward {
            if let Some(tx) = &self.notify {
                let notice = CallbackNotice {
                    method: self.method.clone(),
                    type_name: self.type_name.clone(),
                    key: self.key.clone(),
                    call: record,
                    envelope: self.envelope.clone(),
                };
                if let Err(err) = tx.send(notice) {
                    warn!(%err, "callback notice dropped, receiver gone");
                }
            }
        }

        Ok(self.returned(args))
    }
}
