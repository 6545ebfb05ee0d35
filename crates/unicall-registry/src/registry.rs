//! The package table and symbol resolution.
//!
//! Packages are registered under dotted paths (`unicall.test`); each holds
//! free functions (invoked with an empty class path) and classes (invoked
//! through a `$`-delimited class chain). Resolution mirrors the invocation
//! request shape: `(package, classPath, member)`.

use crate::class::{ClassBuilder, ClassEntry};
use crate::entry::FunctionEntry;
use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One registered package: free functions plus top-level classes.
#[derive(Debug, Default)]
pub struct PackageEntry {
    functions: BTreeMap<String, Arc<FunctionEntry>>,
    classes: BTreeMap<String, Arc<ClassEntry>>,
}

impl PackageEntry {
    /// Free functions, in name order.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionEntry>> {
        self.functions.values()
    }

    /// Top-level classes, in name order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassEntry>> {
        self.classes.values()
    }
}

/// The process-wide registration table.
///
/// Built once at startup, then shared read-only (`Arc<Registry>`) across
/// invocations; there is no post-startup mutation.
///
/// # Example
///
/// ```
/// use unicall_registry::{ClassBuilder, FunctionEntry, Registry};
/// use unicall_types::Value;
///
/// let mut registry = Registry::new();
/// registry
///     .package("demo")
///     .function(FunctionEntry::builder("ping").sync(|_| Ok(Value::Str("pong".into()))))
///     .class(ClassBuilder::new("util"));
///
/// assert!(registry.resolve_function("demo", "", "ping").is_ok());
/// assert!(registry.resolve_class("demo", "util").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    packages: BTreeMap<String, PackageEntry>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (creating if needed) a package for registration.
    pub fn package(&mut self, path: impl Into<String>) -> PackageBuilder<'_> {
        let path = path.into();
        self.packages.entry(path.clone()).or_default();
        PackageBuilder {
            registry: self,
            path,
        }
    }

    /// All registered package paths, sorted.
    pub fn package_paths(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Looks up a package entry.
    #[must_use]
    pub fn get_package(&self, path: &str) -> Option<&PackageEntry> {
        self.packages.get(path)
    }

    /// Resolves a `(package, classPath, member)` triple to a callable.
    ///
    /// An empty `class_path` targets a free function of the package;
    /// otherwise the `$`-delimited chain is walked to the declaring class
    /// and the member is looked up there.
    ///
    /// # Errors
    ///
    /// [`RegistryError`] naming the first missing link.
    pub fn resolve_function(
        &self,
        package: &str,
        class_path: &str,
        member: &str,
    ) -> Result<Arc<FunctionEntry>, RegistryError> {
        if class_path.is_empty() {
            let pkg = self
                .packages
                .get(package)
                .ok_or_else(|| RegistryError::PackageNotFound(package.to_string()))?;
            return pkg
                .functions
                .get(member)
                .cloned()
                .ok_or_else(|| RegistryError::MemberNotFound {
                    owner: package.to_string(),
                    member: member.to_string(),
                });
        }

        let class = self.resolve_class(package, class_path)?;
        class
            .method(member)
            .cloned()
            .ok_or_else(|| RegistryError::MemberNotFound {
                owner: class.qualified().to_string(),
                member: member.to_string(),
            })
    }

    /// Walks a `$`-delimited class chain inside a package.
    ///
    /// # Errors
    ///
    /// [`RegistryError::PackageNotFound`] or [`RegistryError::ClassNotFound`].
    pub fn resolve_class(
        &self,
        package: &str,
        class_path: &str,
    ) -> Result<Arc<ClassEntry>, RegistryError> {
        let pkg = self
            .packages
            .get(package)
            .ok_or_else(|| RegistryError::PackageNotFound(package.to_string()))?;

        let not_found = || RegistryError::ClassNotFound {
            package: package.to_string(),
            class: class_path.to_string(),
        };

        let mut segments = class_path.split('$');
        let first = segments.next().ok_or_else(not_found)?;
        let mut current = pkg.classes.get(first).cloned().ok_or_else(not_found)?;
        for segment in segments {
            current = current.nested(segment).cloned().ok_or_else(not_found)?;
        }
        Ok(current)
    }
}

/// Registration handle for one package.
pub struct PackageBuilder<'a> {
    registry: &'a mut Registry,
    path: String,
}

impl PackageBuilder<'_> {
    /// Registers a free function.
    pub fn function(&mut self, entry: FunctionEntry) -> &mut Self {
        debug!(package = %self.path, function = entry.name(), "registering function");
        let pkg = self
            .registry
            .packages
            .get_mut(&self.path)
            .expect("package created by Registry::package");
        pkg.functions
            .insert(entry.name().to_string(), Arc::new(entry));
        self
    }

    /// Registers a top-level class (and its nested classes).
    pub fn class(&mut self, class: ClassBuilder) -> &mut Self {
        let built = class.build(&self.path, '.');
        debug!(package = %self.path, class = built.name(), "registering class");
        let pkg = self
            .registry
            .packages
            .get_mut(&self.path)
            .expect("package created by Registry::package");
        pkg.classes.insert(built.name().to_string(), built);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CallArgs;
    use unicall_types::Value;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        registry
            .package("m")
            .function(FunctionEntry::builder("free").sync(|_| Ok(Value::Int(1))))
            .class(
                ClassBuilder::new("c")
                    .method(
                        FunctionEntry::builder("minus")
                            .param("a", "int")
                            .param("b", "int")
                            .returns("int")
                            .sync(|args: CallArgs| Ok(Value::Int(args.int(0)? - args.int(1)?))),
                    )
                    .nested(ClassBuilder::new("Inner").method(
                        FunctionEntry::builder("leaf").sync(|_| Ok(Value::Bool(true))),
                    )),
            );
        registry
    }

    #[test]
    fn resolve_free_function() {
        let registry = sample();
        let entry = registry.resolve_function("m", "", "free").unwrap();
        assert_eq!(entry.name(), "free");
    }

    #[test]
    fn resolve_class_method() {
        let registry = sample();
        let entry = registry.resolve_function("m", "c", "minus").unwrap();
        assert_eq!(entry.return_type(), "int");
    }

    #[test]
    fn resolve_nested_chain() {
        let registry = sample();
        let class = registry.resolve_class("m", "c$Inner").unwrap();
        assert_eq!(class.qualified(), "m.c$Inner");
        assert!(registry.resolve_function("m", "c$Inner", "leaf").is_ok());
    }

    #[test]
    fn missing_package() {
        let registry = sample();
        let err = registry.resolve_function("nope", "", "free").unwrap_err();
        assert_eq!(err, RegistryError::PackageNotFound("nope".into()));
    }

    #[test]
    fn missing_member() {
        let registry = sample();
        let err = registry.resolve_function("m", "c", "plus").unwrap_err();
        assert!(matches!(err, RegistryError::MemberNotFound { .. }));
    }

    #[test]
    fn missing_chain_segment() {
        let registry = sample();
        let err = registry.resolve_class("m", "c$Missing").unwrap_err();
        assert!(matches!(err, RegistryError::ClassNotFound { .. }));
    }
}
