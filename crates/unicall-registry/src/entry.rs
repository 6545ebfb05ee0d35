//! Registered callables and their descriptors.
//!
//! A [`FunctionEntry`] pairs a typed closure with the signature metadata
//! discovery reports. Closures come in two flavors: synchronous, and
//! asynchronous (boxed futures the dispatcher runs to completion).

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use unicall_types::{ErrorCode, InstanceHandle, Value};

/// Error raised by a registered callable.
///
/// The dispatcher surfaces these as `TargetInvocationError` in the wire
/// envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The callable itself failed.
    #[error("{0}")]
    Failed(String),

    /// An argument had the wrong shape for this callable.
    #[error("bad argument {index}: expected {expected}")]
    BadArg { index: usize, expected: String },

    /// An instance method was called without a usable receiver.
    #[error("missing or mistyped receiver: expected {0}")]
    BadReceiver(String),
}

impl CallError {
    /// Convenience constructor for [`CallError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl ErrorCode for CallError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "CALL_FAILED",
            Self::BadArg { .. } => "CALL_BAD_ARG",
            Self::BadReceiver(_) => "CALL_BAD_RECEIVER",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A runtime failure may be transient; shape errors are not.
        matches!(self, Self::Failed(_))
    }
}

/// One declared parameter: a name and a type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub type_name: String,
}

/// Bound arguments handed to a registered closure.
///
/// `values` is ordered per the declared parameters (keyword arguments have
/// already been merged into their positional slots); missing trailing
/// arguments are [`Value::Null`].
#[derive(Debug, Clone)]
pub struct CallArgs {
    /// Receiver for instance methods, `None` for statics and free functions.
    pub this: Option<InstanceHandle>,
    /// Positionally-ordered argument values.
    pub values: Vec<Value>,
}

impl CallArgs {
    /// Arguments for a static call.
    #[must_use]
    pub fn positional(values: Vec<Value>) -> Self {
        Self { this: None, values }
    }

    /// Returns the argument at `index`, or `Null` when absent.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    /// Returns argument `index` as an `i64`.
    ///
    /// # Errors
    ///
    /// [`CallError::BadArg`] when the value is not an integer.
    pub fn int(&self, index: usize) -> Result<i64, CallError> {
        self.arg(index).as_int().ok_or(CallError::BadArg {
            index,
            expected: "int".into(),
        })
    }

    /// Returns argument `index` as an `f64` (ints widen).
    pub fn float(&self, index: usize) -> Result<f64, CallError> {
        self.arg(index).as_float().ok_or(CallError::BadArg {
            index,
            expected: "float".into(),
        })
    }

    /// Returns argument `index` as a string slice.
    pub fn str(&self, index: usize) -> Result<&str, CallError> {
        self.arg(index).as_str().ok_or(CallError::BadArg {
            index,
            expected: "str".into(),
        })
    }

    /// Returns argument `index` as a map.
    pub fn map(&self, index: usize) -> Result<&BTreeMap<String, Value>, CallError> {
        self.arg(index).as_map().ok_or(CallError::BadArg {
            index,
            expected: "dict".into(),
        })
    }

    /// Returns argument `index` as an instance handle.
    pub fn opaque(&self, index: usize) -> Result<&InstanceHandle, CallError> {
        self.arg(index).as_opaque().ok_or(CallError::BadArg {
            index,
            expected: "instance".into(),
        })
    }

    /// Returns the receiver handle.
    ///
    /// # Errors
    ///
    /// [`CallError::BadReceiver`] for static calls.
    pub fn this(&self) -> Result<&InstanceHandle, CallError> {
        self.this
            .as_ref()
            .ok_or_else(|| CallError::BadReceiver("instance".into()))
    }
}

/// Synchronous registered closure.
pub type SyncFn = Arc<dyn Fn(CallArgs) -> Result<Value, CallError> + Send + Sync>;

/// Future produced by an asynchronous registered closure.
pub type CallFuture = Pin<Box<dyn Future<Output = Result<Value, CallError>> + Send>>;

/// Asynchronous registered closure.
pub type AsyncFn = Arc<dyn Fn(CallArgs) -> CallFuture + Send + Sync>;

/// The executable half of a [`FunctionEntry`].
#[derive(Clone)]
pub enum Callable {
    Sync(SyncFn),
    Async(AsyncFn),
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "Callable::Sync"),
            Self::Async(_) => write!(f, "Callable::Async"),
        }
    }
}

/// A registered function, static method, instance method, or constructor.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    name: String,
    is_static: bool,
    return_type: String,
    params: Vec<ParamSpec>,
    callable: Callable,
}

impl FunctionEntry {
    /// Starts building an entry. Defaults: static, returns `any`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder {
            name: name.into(),
            is_static: true,
            return_type: "any".into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the callable binds without a receiver.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[must_use]
    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    /// Declared parameters. Instance methods never declare the receiver;
    /// it travels separately in [`CallArgs::this`].
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    #[must_use]
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Whether the underlying closure is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }

    /// Clones this entry under a different registration name.
    pub(crate) fn with_name(&self, name: &str) -> FunctionEntry {
        FunctionEntry {
            name: name.to_string(),
            is_static: self.is_static,
            return_type: self.return_type.clone(),
            params: self.params.clone(),
            callable: self.callable.clone(),
        }
    }
}

/// Builder for [`FunctionEntry`].
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    is_static: bool,
    return_type: String,
    params: Vec<ParamSpec>,
}

impl FunctionBuilder {
    /// Declares a parameter. Unannotated targets use `"any"`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    /// Declares the return type name.
    #[must_use]
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = type_name.into();
        self
    }

    /// Marks this entry as an instance method (receiver required).
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Finishes with a synchronous closure.
    #[must_use]
    pub fn sync<F>(self, f: F) -> FunctionEntry
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        FunctionEntry {
            name: self.name,
            is_static: self.is_static,
            return_type: self.return_type,
            params: self.params,
            callable: Callable::Sync(Arc::new(f)),
        }
    }

    /// Finishes with an asynchronous closure.
    ///
    /// The dispatcher blocks the invocation until the returned future
    /// settles (run-to-completion, never fire-and-forget).
    #[must_use]
    pub fn asynchronous<F, Fut>(self, f: F) -> FunctionEntry
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        FunctionEntry {
            name: self.name,
            is_static: self.is_static,
            return_type: self.return_type,
            params: self.params,
            callable: Callable::Async(Arc::new(move |args| Box::pin(f(args)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicall_types::assert_error_codes;

    #[test]
    fn call_error_codes() {
        assert_error_codes(
            &[
                CallError::failed("x"),
                CallError::BadArg {
                    index: 0,
                    expected: "int".into(),
                },
                CallError::BadReceiver("T".into()),
            ],
            "CALL_",
        );
    }

    #[test]
    fn builder_defaults() {
        let entry = FunctionEntry::builder("f").sync(|_| Ok(Value::Null));
        assert!(entry.is_static());
        assert_eq!(entry.return_type(), "any");
        assert!(entry.params().is_empty());
        assert!(!entry.is_async());
    }

    #[test]
    fn sync_call() {
        let entry = FunctionEntry::builder("minus")
            .param("a", "int")
            .param("b", "int")
            .returns("int")
            .sync(|args| Ok(Value::Int(args.int(0)? - args.int(1)?)));

        let Callable::Sync(f) = entry.callable() else {
            panic!("expected sync callable");
        };
        let out = f(CallArgs::positional(vec![Value::Int(2), Value::Int(3)])).unwrap();
        assert_eq!(out, Value::Int(-1));
    }

    #[test]
    fn missing_arg_is_null() {
        let args = CallArgs::positional(vec![]);
        assert!(args.arg(0).is_null());
        assert!(args.int(0).is_err());
    }

    #[test]
    fn async_entry_reports_async() {
        let entry = FunctionEntry::builder("later")
            .asynchronous(|_args| async { Ok(Value::Int(1)) });
        assert!(entry.is_async());
    }
}
