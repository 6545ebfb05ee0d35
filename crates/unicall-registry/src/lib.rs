//! Registration registry and discovery for unicall.
//!
//! Statically-compiled code has no runtime reflection, so every invokable
//! target is **registered** at process start: packages hold free functions
//! and classes, classes hold constructors, methods, and `$`-nested inner
//! classes, and every entry carries the descriptor (parameter names/types,
//! return type, staticness) that discovery reports.
//!
//! # Registering targets
//!
//! ```
//! use unicall_registry::{ClassBuilder, FunctionEntry, Registry};
//! use unicall_types::Value;
//!
//! let mut registry = Registry::new();
//! registry
//!     .package("demo")
//!     .function(
//!         FunctionEntry::builder("minus")
//!             .param("a", "int")
//!             .param("b", "int")
//!             .returns("int")
//!             .sync(|args| Ok(Value::Int(args.int(0)? - args.int(1)?))),
//!     );
//!
//! let entry = registry.resolve_function("demo", "", "minus").unwrap();
//! assert_eq!(entry.return_type(), "int");
//! ```
//!
//! # Layers
//!
//! - [`Registry`] / [`ClassEntry`] / [`FunctionEntry`]: the symbol tables
//! - [`TypeRegistry`]: primitive and qualified type-name resolution
//! - [`listing`]: the read-only discovery path over the same tables
//! - [`testing`]: a ready-made sample registry for tests and demos

mod class;
mod descriptor;
mod entry;
mod error;
pub mod listing;
mod registry;
pub mod testing;
mod types;

pub use class::{ClassBuilder, ClassEntry, DecodeFn, DEFAULT_CONSTRUCTOR, FALLBACK_CONSTRUCTOR};
pub use descriptor::MethodDescriptor;
pub use entry::{CallArgs, CallError, Callable, FunctionBuilder, FunctionEntry, ParamSpec};
pub use error::RegistryError;
pub use registry::{PackageBuilder, PackageEntry, Registry};
pub use types::{parse_function_type, FnSignature, TypeDescriptor, TypeKind, TypeRegistry};
