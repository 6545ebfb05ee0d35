//! The unicall invocation engine.
//!
//! Takes wire-shaped JSON requests, resolves the named target in the
//! registration tables, coerces the tagged arguments, constructs or reuses
//! a receiver when needed, runs the target to completion, and renders the
//! response envelope. Every failure is caught at the dispatcher boundary;
//! the caller always gets an envelope back.
//!
//! ```text
//! request JSON
//!     │ validate (dispatch)
//!     │ resolve  (unicall-registry)
//!     │ coerce + bind (coerce, callback, expr)
//!     │ construct / reuse (cache)
//!     │ invoke (dispatch)
//!     ▼
//! envelope JSON
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use unicall_engine::{Engine, EngineConfig};
//! use unicall_registry::testing::sample_registry;
//!
//! let engine = Engine::new(Arc::new(sample_registry()), EngineConfig::new());
//! let rsp = engine.invoke(&json!({
//!     "package": "unicall.test",
//!     "class": "testutil",
//!     "method": "minus",
//!     "methodArgs": [{"type": "int", "value": 2}, {"type": "int", "value": 3}],
//! }));
//! assert_eq!(rsp["return"], json!(-1));
//! ```

mod cache;
mod callback;
mod coerce;
mod config;
mod dispatch;
mod error;
pub mod expr;

pub use cache::InstanceCache;
pub use callback::{CallRecord, CallbackBridge, CallbackNotice, CallbackStub, TaggedArg};
pub use coerce::{bind_args, coerce_plain, parse_descriptor, BoundArg, Coercer, RawArg};
pub use config::EngineConfig;
pub use dispatch::Engine;
pub use error::InvokeError;
