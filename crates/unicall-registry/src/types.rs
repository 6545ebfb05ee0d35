//! Type-name resolution.
//!
//! Primitive names resolve from a fixed table; qualified names
//! (`pkg.mod$Class$Inner`) resolve through the symbol registry; the
//! `def(a,b)` shape resolves to a function type for callback arguments.
//! Successful lookups are memoized by the full name in a process-scoped
//! cache that is never invalidated (class identities are immutable for
//! the process lifetime).

use crate::class::ClassEntry;
use crate::error::RegistryError;
use crate::registry::Registry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use unicall_types::Value;

/// The pre-registered primitive type names.
pub const PRIMITIVES: &[&str] = &["any", "bool", "int", "float", "str", "list", "dict"];

/// Declared parameter names of a function type (`def(a,b)` ⇒ `["a","b"]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSignature {
    pub params: Vec<String>,
}

/// What a resolved type name denotes.
#[derive(Clone)]
pub enum TypeKind {
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Dict,
    /// A registered class; carries its entry for decoding/construction.
    Class(Arc<ClassEntry>),
    /// A synthesized-callback type.
    Function(FnSignature),
}

impl std::fmt::Debug for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Bool => write!(f, "Bool"),
            Self::Int => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::Str => write!(f, "Str"),
            Self::List => write!(f, "List"),
            Self::Dict => write!(f, "Dict"),
            Self::Class(c) => write!(f, "Class({})", c.qualified()),
            Self::Function(sig) => write!(f, "Function({:?})", sig.params),
        }
    }
}

/// A resolved type: the name it resolved from plus its denotation.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    fn primitive(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// The class entry, when this type denotes a registered class.
    #[must_use]
    pub fn as_class(&self) -> Option<&Arc<ClassEntry>> {
        match &self.kind {
            TypeKind::Class(entry) => Some(entry),
            _ => None,
        }
    }

    /// The callback signature, when this is a function type.
    #[must_use]
    pub fn as_function(&self) -> Option<&FnSignature> {
        match &self.kind {
            TypeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

/// Resolves and memoizes type names.
///
/// Cheap to clone; the memo cache is shared. Concurrent insert of the same
/// name is harmless (entries are value-equivalent, last writer wins).
#[derive(Clone)]
pub struct TypeRegistry {
    registry: Arc<Registry>,
    cache: Arc<RwLock<HashMap<String, TypeDescriptor>>>,
}

impl TypeRegistry {
    /// Wraps a symbol registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The underlying symbol registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolves a type name, or infers one from a sample value.
    ///
    /// Resolution order: primitive table, `def(...)` function shape,
    /// qualified class name. With no name at all the sample's runtime tag
    /// decides (a sample that is itself untyped resolves to `any`).
    ///
    /// # Errors
    ///
    /// [`RegistryError::TypeNotFound`] when the name matches nothing.
    pub fn resolve(
        &self,
        name: Option<&str>,
        sample: Option<&Value>,
    ) -> Result<TypeDescriptor, RegistryError> {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Ok(Self::infer(sample));
        };

        if let Some(primitive) = Self::lookup_primitive(name) {
            return Ok(primitive);
        }

        if let Some(hit) = self.cache.read().get(name) {
            trace!(name, "type cache hit");
            return Ok(hit.clone());
        }

        let descriptor = if let Some(sig) = parse_function_type(name) {
            TypeDescriptor {
                name: name.to_string(),
                kind: TypeKind::Function(sig),
            }
        } else {
            self.resolve_qualified(name)?
        };

        self.cache
            .write()
            .insert(name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Infers a descriptor from a sample value's runtime tag.
    #[must_use]
    pub fn infer(sample: Option<&Value>) -> TypeDescriptor {
        let Some(sample) = sample else {
            return TypeDescriptor::primitive("any", TypeKind::Any);
        };
        match sample {
            Value::Null => TypeDescriptor::primitive("any", TypeKind::Any),
            Value::Bool(_) => TypeDescriptor::primitive("bool", TypeKind::Bool),
            Value::Int(_) => TypeDescriptor::primitive("int", TypeKind::Int),
            Value::Float(_) => TypeDescriptor::primitive("float", TypeKind::Float),
            Value::Str(_) => TypeDescriptor::primitive("str", TypeKind::Str),
            Value::List(_) => TypeDescriptor::primitive("list", TypeKind::List),
            Value::Map(_) => TypeDescriptor::primitive("dict", TypeKind::Dict),
            Value::Opaque(handle) => TypeDescriptor {
                name: handle.type_name(),
                kind: TypeKind::Any,
            },
        }
    }

    fn lookup_primitive(name: &str) -> Option<TypeDescriptor> {
        let kind = match name {
            "any" => TypeKind::Any,
            "bool" => TypeKind::Bool,
            "int" => TypeKind::Int,
            "float" => TypeKind::Float,
            "str" => TypeKind::Str,
            "list" => TypeKind::List,
            "dict" => TypeKind::Dict,
            _ => return None,
        };
        Some(TypeDescriptor::primitive(name, kind))
    }

    /// Resolves `pkg.mod$Class$Inner`: the leading dot-path is split into a
    /// registered package prefix plus the head of the class chain, longest
    /// package prefix first.
    fn resolve_qualified(&self, name: &str) -> Result<TypeDescriptor, RegistryError> {
        let mut parts = name.split('$');
        let module_path = parts.next().unwrap_or_default();
        let chain_rest: Vec<&str> = parts.collect();

        let segments: Vec<&str> = module_path.split('.').collect();
        // Longest registered package prefix wins; the leftover dot segments
        // prepend the `$` chain.
        for split in (1..=segments.len()).rev() {
            let package = segments[..split].join(".");
            if self.registry.get_package(&package).is_none() {
                continue;
            }
            let mut pieces: Vec<&str> = segments[split..].to_vec();
            pieces.extend(chain_rest.iter().copied());
            if pieces.is_empty() {
                continue;
            }
            let chain = pieces.join("$");
            if let Ok(class) = self.registry.resolve_class(&package, &chain) {
                return Ok(TypeDescriptor {
                    name: name.to_string(),
                    kind: TypeKind::Class(class),
                });
            }
        }

        Err(RegistryError::TypeNotFound(name.to_string()))
    }
}

/// Parses the `def(a,b,...)` function-type shape.
///
/// The name before the parenthesis must be the literal keyword `def`;
/// anything else is not a function type.
#[must_use]
pub fn parse_function_type(name: &str) -> Option<FnSignature> {
    let rest = name.strip_prefix("def(")?;
    let inner = rest.strip_suffix(')')?;
    let params = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|p| p.trim().to_string()).collect()
    };
    if params.iter().any(String::is_empty) {
        return None;
    }
    Some(FnSignature { params })
}
