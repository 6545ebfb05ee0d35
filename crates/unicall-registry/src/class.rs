//! Registered classes.
//!
//! A [`ClassEntry`] groups constructors, methods, and `$`-nested inner
//! classes under a qualified name such as `unicall.test.testutil$Test`.
//! Module-like containers (a source file holding free functions) register
//! the same way; their "methods" are simply all static.
//!
//! # Constructors
//!
//! Constructors are [`FunctionEntry`]s returning [`Value::Opaque`]:
//!
//! - the **default** constructor is registered under the empty name
//! - **alternate factories** are registered under their own names
//! - a factory literally named `constructor` acts as the fallback when a
//!   requested alternate is missing or fails
//!
//! # Decoding
//!
//! A class may register a decode hook that materializes an instance from a
//! plain JSON map without running any constructor. This serves both the
//! `this`-supplied invocation path and the structured-deserialization step
//! of argument coercion. [`ClassBuilder::decodes`] wires it up via serde.

use crate::entry::{CallError, FunctionEntry};
use std::collections::BTreeMap;
use std::sync::Arc;
use unicall_types::{InstanceHandle, Value};

/// Decode hook: qualified type name + JSON state → live instance.
pub type DecodeFn =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<InstanceHandle, CallError> + Send + Sync>;

/// The default constructor's registration name.
pub const DEFAULT_CONSTRUCTOR: &str = "";

/// The literal fallback-factory name.
pub const FALLBACK_CONSTRUCTOR: &str = "constructor";

/// A registered class (or module-like container of static members).
pub struct ClassEntry {
    name: String,
    qualified: String,
    constructors: BTreeMap<String, Arc<FunctionEntry>>,
    methods: BTreeMap<String, Arc<FunctionEntry>>,
    nested: BTreeMap<String, Arc<ClassEntry>>,
    decode: Option<DecodeFn>,
}

impl ClassEntry {
    /// Simple name, the last `$` segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name: `package.Class$Inner`.
    ///
    /// This string is the class identity used by the type registry and the
    /// instance reuse cache.
    #[must_use]
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    /// Looks up a constructor by name (`""` = default).
    #[must_use]
    pub fn constructor(&self, name: &str) -> Option<&Arc<FunctionEntry>> {
        self.constructors.get(name)
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Arc<FunctionEntry>> {
        self.methods.get(name)
    }

    /// Looks up a nested class by simple name.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&Arc<ClassEntry>> {
        self.nested.get(name)
    }

    /// All methods, in registration (name) order.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<FunctionEntry>> {
        self.methods.values()
    }

    /// All nested classes, in name order.
    pub fn nested_classes(&self) -> impl Iterator<Item = &Arc<ClassEntry>> {
        self.nested.values()
    }

    /// The decode hook, when registered.
    #[must_use]
    pub fn decode(&self) -> Option<&DecodeFn> {
        self.decode.as_ref()
    }

    /// Materializes an instance from a plain JSON map via the decode hook.
    ///
    /// # Errors
    ///
    /// Fails when no hook is registered or the hook itself fails.
    pub fn decode_value(&self, value: &serde_json::Value) -> Result<InstanceHandle, CallError> {
        let decode = self
            .decode
            .as_ref()
            .ok_or_else(|| CallError::failed(format!("{} has no decode hook", self.qualified)))?;
        decode(&self.qualified, value)
    }
}

impl std::fmt::Debug for ClassEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassEntry")
            .field("qualified", &self.qualified)
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("nested", &self.nested.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`ClassEntry`].
///
/// Qualified names are assigned when the package (or outer class) finishes
/// registration, so builders only carry simple names.
pub struct ClassBuilder {
    name: String,
    constructors: Vec<FunctionEntry>,
    methods: Vec<FunctionEntry>,
    nested: Vec<ClassBuilder>,
    decode: Option<DecodeFn>,
}

impl ClassBuilder {
    /// Starts a class under its simple name (no `$` or `.`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            decode: None,
        }
    }

    /// Registers the default constructor.
    #[must_use]
    pub fn constructor(mut self, entry: FunctionEntry) -> Self {
        self.constructors.push(rename(entry, DEFAULT_CONSTRUCTOR));
        self
    }

    /// Registers an alternate factory under the entry's own name.
    #[must_use]
    pub fn factory(mut self, entry: FunctionEntry) -> Self {
        self.constructors.push(entry);
        self
    }

    /// Registers a method (static or instance per the entry).
    #[must_use]
    pub fn method(mut self, entry: FunctionEntry) -> Self {
        self.methods.push(entry);
        self
    }

    /// Registers a `$`-nested inner class.
    #[must_use]
    pub fn nested(mut self, class: ClassBuilder) -> Self {
        self.nested.push(class);
        self
    }

    /// Registers a custom decode hook.
    #[must_use]
    pub fn decode_with(mut self, decode: DecodeFn) -> Self {
        self.decode = Some(decode);
        self
    }

    /// Registers a serde-backed decode hook for state type `T`.
    #[must_use]
    pub fn decodes<T>(self) -> Self
    where
        T: serde::de::DeserializeOwned
            + serde::Serialize
            + std::fmt::Debug
            + Send
            + 'static,
    {
        self.decode_with(Arc::new(|qualified, json| {
            let state: T = serde_json::from_value(json.clone())
                .map_err(|e| CallError::failed(format!("decode failed: {e}")))?;
            Ok(InstanceHandle::of(qualified, state))
        }))
    }

    /// Finalizes into an [`ClassEntry`] under `owner` (package path or the
    /// outer class's qualified name joined by `$`).
    pub(crate) fn build(self, owner: &str, separator: char) -> Arc<ClassEntry> {
        let qualified = if owner.is_empty() {
            self.name.clone()
        } else {
            format!("{owner}{separator}{}", self.name)
        };

        let nested = self
            .nested
            .into_iter()
            .map(|b| {
                let built = b.build(&qualified, '$');
                (built.name().to_string(), built)
            })
            .collect();

        Arc::new(ClassEntry {
            name: self.name,
            qualified,
            constructors: self
                .constructors
                .into_iter()
                .map(|e| (e.name().to_string(), Arc::new(e)))
                .collect(),
            methods: self
                .methods
                .into_iter()
                .map(|e| (e.name().to_string(), Arc::new(e)))
                .collect(),
            nested,
            decode: self.decode,
        })
    }
}

/// Re-registers an entry under a different name, keeping its signature
/// and closure.
fn rename(entry: FunctionEntry, name: &str) -> FunctionEntry {
    entry.with_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Pair {
        a: i64,
        b: i64,
    }

    fn sample_class() -> Arc<ClassEntry> {
        ClassBuilder::new("Outer")
            .constructor(
                FunctionEntry::builder("ignored")
                    .param("a", "int")
                    .sync(|args| Ok(Value::Int(args.int(0)?))),
            )
            .method(
                FunctionEntry::builder("get")
                    .instance()
                    .returns("int")
                    .sync(|args| {
                        args.this()?
                            .with::<Pair, _, _>(|p| Value::Int(p.a))
                            .ok_or_else(|| CallError::BadReceiver("Pair".into()))
                    }),
            )
            .nested(ClassBuilder::new("Inner").decodes::<Pair>())
            .build("pkg.mod", '$')
    }

    #[test]
    fn qualified_names() {
        let class = sample_class();
        assert_eq!(class.qualified(), "pkg.mod$Outer");
        assert_eq!(
            class.nested("Inner").unwrap().qualified(),
            "pkg.mod$Outer$Inner"
        );
    }

    #[test]
    fn default_constructor_registered_under_empty_name() {
        let class = sample_class();
        assert!(class.constructor(DEFAULT_CONSTRUCTOR).is_some());
        assert!(class.constructor("ignored").is_none());
    }

    #[test]
    fn serde_decode_hook() {
        let class = sample_class();
        let inner = class.nested("Inner").unwrap();
        let handle = inner
            .decode_value(&serde_json::json!({"a": 1, "b": 2}))
            .unwrap();
        assert_eq!(handle.type_name(), "pkg.mod$Outer$Inner");
        let a = handle.with::<Pair, _, _>(|p| p.a).unwrap();
        assert_eq!(a, 1);
    }

    #[test]
    fn decode_without_hook_fails() {
        let class = sample_class();
        assert!(class.decode_value(&serde_json::json!({})).is_err());
    }
}
