//! Core types for the unicall invocation engine.
//!
//! This crate provides the foundational value and instance types shared by
//! every unicall crate.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SDK Layer                               │
//! │  (SemVer stable, safe for target-registration code)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  unicall-types    : Value, Instance, ErrorCode  ◄── HERE     │
//! │  unicall-registry : Registry, ClassEntry, listing            │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Runtime Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  unicall-engine   : coercion, dispatch, callbacks, cache     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Frontend Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  unicall-cli      : invoke / list / serve                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # What lives here
//!
//! - [`Value`]: the tagged value union exchanged at every engine boundary
//! - [`Instance`] / [`InstanceHandle`]: constructed target objects
//! - [`ErrorCode`]: the unified error-code contract
//! - [`wire`]: the fixed wire-key strings and [`TimeDetail`](wire::TimeDetail)

mod error;
mod instance;
mod value;
pub mod wire;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use instance::{Callback, Instance, InstanceHandle, Object};
pub use value::Value;
