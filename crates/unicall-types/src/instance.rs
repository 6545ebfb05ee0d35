//! Constructed target instances.
//!
//! When an invocation targets an instance method, the engine constructs (or
//! reuses) an object of the target class. Those objects are not written for
//! unicall, so the engine holds them behind the [`Instance`] trait object
//! and lets registered method closures downcast back to the concrete type.
//!
//! # Example
//!
//! ```
//! use unicall_types::{InstanceHandle, Object};
//!
//! #[derive(Debug, serde::Serialize)]
//! struct Counter { hits: u32 }
//!
//! let handle = InstanceHandle::of("demo$Counter", Counter { hits: 0 });
//! handle.with_mut::<Counter, _, _>(|c| c.hits += 1);
//! let hits = handle.with::<Counter, _, _>(|c| c.hits).unwrap();
//! assert_eq!(hits, 1);
//! assert_eq!(handle.snapshot(), serde_json::json!({"hits": 1}));
//! ```

use crate::Value;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// A synthesized callable installed as an argument.
///
/// Target code receives callback arguments as [`Value::Opaque`] handles and
/// invokes them through [`InstanceHandle::call_callback`]. The engine's
/// callback bridge provides the only production implementation; tests may
/// supply their own.
pub trait Callback: Send {
    /// Invokes the callback with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the callback cannot produce
    /// a value.
    fn call(&self, args: &[Value]) -> Result<Value, String>;
}

/// A live object owned by the invocation engine.
///
/// Implementations provide identity (the registered qualified type name),
/// a best-effort JSON snapshot of their state (used for the post-call
/// `this` echo and for serializing [`Value::Opaque`](crate::Value::Opaque)
/// results), and `Any` access for downcasting inside registered methods.
pub trait Instance: Send {
    /// The qualified type name this instance was registered under,
    /// e.g. `"unicall.test.testutil$Test"`.
    fn type_name(&self) -> String;

    /// Best-effort JSON snapshot of the current state.
    ///
    /// Returns `None` when the state cannot be serialized; callers fall
    /// back to a debug string and attach a `warn` note.
    fn snapshot(&self) -> Option<serde_json::Value>;

    /// Debug rendering used when [`snapshot`](Self::snapshot) fails.
    fn debug_string(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the callback view of this instance, if it is one.
    ///
    /// Only callback stubs override this; ordinary instances return `None`.
    fn as_callback(&self) -> Option<&dyn Callback> {
        None
    }
}

/// Shared, mutex-guarded handle to an [`Instance`].
///
/// Cloning is cheap (`Arc`). Interior mutability is required because a
/// reused instance may be mutated by successive invocations.
#[derive(Clone)]
pub struct InstanceHandle {
    inner: Arc<Mutex<dyn Instance>>,
}

impl InstanceHandle {
    /// Wraps an existing [`Instance`] implementation.
    #[must_use]
    pub fn new<I: Instance + 'static>(instance: I) -> Self {
        Self {
            inner: Arc::new(Mutex::new(instance)),
        }
    }

    /// Wraps a plain serializable struct as an [`Object`] instance.
    ///
    /// This is the common path for registered classes: the concrete state
    /// type only needs `Serialize + Debug + Send`.
    #[must_use]
    pub fn of<T>(type_name: impl Into<String>, state: T) -> Self
    where
        T: serde::Serialize + std::fmt::Debug + Send + 'static,
    {
        Self::new(Object::new(type_name, state))
    }

    /// Runs `f` against the inner state downcast to `T`.
    ///
    /// Returns `None` when the instance does not hold a `T`. Works for
    /// instances created via [`InstanceHandle::of`] (the [`Object`]
    /// wrapper is unwrapped transparently) as well as direct
    /// [`Instance`] implementations of type `T`.
    pub fn with<T: 'static, R, F: FnOnce(&T) -> R>(&self, f: F) -> Option<R> {
        let guard = self.inner.lock();
        let any = guard.as_any();
        if let Some(obj) = any.downcast_ref::<Object<T>>() {
            return Some(f(&obj.state));
        }
        any.downcast_ref::<T>().map(f)
    }

    /// Mutable variant of [`with`](Self::with).
    pub fn with_mut<T: 'static, R, F: FnOnce(&mut T) -> R>(&self, f: F) -> Option<R> {
        let mut guard = self.inner.lock();
        let any = guard.as_any_mut();
        if let Some(obj) = any.downcast_mut::<Object<T>>() {
            return Some(f(&mut obj.state));
        }
        any.downcast_mut::<T>().map(f)
    }

    /// Runs `f` against the raw [`Instance`] trait object.
    pub fn with_instance<R, F: FnOnce(&dyn Instance) -> R>(&self, f: F) -> R {
        f(&*self.inner.lock())
    }

    /// The registered qualified type name.
    #[must_use]
    pub fn type_name(&self) -> String {
        self.inner.lock().type_name()
    }

    /// Best-effort JSON snapshot; falls back to the debug string.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        let guard = self.inner.lock();
        guard
            .snapshot()
            .unwrap_or_else(|| serde_json::Value::String(guard.debug_string()))
    }

    /// Like [`snapshot`](Self::snapshot) but reports whether the
    /// serialization path succeeded, so callers can attach a `warn` note.
    #[must_use]
    pub fn try_snapshot(&self) -> Result<serde_json::Value, String> {
        let guard = self.inner.lock();
        guard.snapshot().ok_or_else(|| guard.debug_string())
    }

    /// Invokes this instance as a callback.
    ///
    /// # Errors
    ///
    /// Fails when the instance is not a callback stub, or when the stub
    /// itself fails. The handle's lock is held for the duration of the
    /// call; callbacks must not call back into themselves.
    pub fn call_callback(&self, args: &[Value]) -> Result<Value, String> {
        let guard = self.inner.lock();
        let callback = guard
            .as_callback()
            .ok_or_else(|| format!("{} is not a callback", guard.type_name()))?;
        callback.call(args)
    }

    /// Identity comparison (same underlying allocation).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstanceHandle({})", self.type_name())
    }
}

/// Adapter that turns any `Serialize + Debug` struct into an [`Instance`].
///
/// Registered classes usually keep their state in a plain struct; `Object`
/// carries that struct plus the qualified name it was registered under.
#[derive(Debug)]
pub struct Object<T> {
    type_name: String,
    /// The wrapped state, freely accessible to method closures.
    pub state: T,
}

impl<T> Object<T> {
    /// Wraps `state` under the given registered type name.
    #[must_use]
    pub fn new(type_name: impl Into<String>, state: T) -> Self {
        Self {
            type_name: type_name.into(),
            state,
        }
    }
}

impl<T> Instance for Object<T>
where
    T: serde::Serialize + std::fmt::Debug + Send + 'static,
{
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn snapshot(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn debug_string(&self) -> String {
        format!("{:?}", self.state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
