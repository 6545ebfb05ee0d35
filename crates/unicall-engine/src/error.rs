//! Engine layer errors.
//!
//! Every failure an invocation can hit maps to one of six kinds, caught
//! uniformly at the dispatcher boundary and degraded to the error envelope
//! (`ok:false, code:500, msg, throw`). Nothing propagates to the transport
//! as a protocol-level failure.
//!
//! | Variant | Wire `throw` tag | Raised during |
//! |---------|------------------|---------------|
//! | [`Validation`](InvokeError::Validation) | `ValidationError` | request checks, before resolution |
//! | [`Symbol`](InvokeError::Symbol) | `SymbolNotFound` | Resolving |
//! | [`Type`](InvokeError::Type) | `UnresolvedType` | Binding (type lookup) |
//! | [`Binding`](InvokeError::Binding) | `BindingError` | Binding (keyword tail, duplicates) |
//! | [`Construction`](InvokeError::Construction) | `ConstructionError` | Constructing |
//! | [`Target`](InvokeError::Target) | `TargetInvocationError` | Invoking |

use thiserror::Error;
use unicall_registry::{CallError, RegistryError};
use unicall_types::ErrorCode;

/// An invocation failure, carrying the human-readable `msg`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// Malformed or contradictory request fields.
    #[error("{0}")]
    Validation(String),

    /// Unresolvable package, class, or member.
    #[error("{0}")]
    Symbol(String),

    /// Unresolvable type name.
    #[error("{0}")]
    Type(String),

    /// Keyword-tail violation, duplicate or unknown keys, or a
    /// function-typed argument with a non-object value.
    #[error("{0}")]
    Binding(String),

    /// Both the requested and the fallback constructor failed.
    #[error("{0}")]
    Construction(String),

    /// The resolved callable itself raised.
    #[error("{0}")]
    Target(String),
}

impl InvokeError {
    /// The stable `throw` tag of the wire contract.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Symbol(_) => "SymbolNotFound",
            Self::Type(_) => "UnresolvedType",
            Self::Binding(_) => "BindingError",
            Self::Construction(_) => "ConstructionError",
            Self::Target(_) => "TargetInvocationError",
        }
    }

    /// Convenience constructor for [`InvokeError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Convenience constructor for [`InvokeError::Binding`].
    pub fn binding(msg: impl Into<String>) -> Self {
        Self::Binding(msg.into())
    }
}

impl ErrorCode for InvokeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ENGINE_VALIDATION",
            Self::Symbol(_) => "ENGINE_SYMBOL_NOT_FOUND",
            Self::Type(_) => "ENGINE_TYPE_NOT_FOUND",
            Self::Binding(_) => "ENGINE_BINDING",
            Self::Construction(_) => "ENGINE_CONSTRUCTION",
            Self::Target(_) => "ENGINE_TARGET_INVOCATION",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A target may fail transiently; everything else needs a
        // corrected request or registration.
        matches!(self, Self::Target(_))
    }
}

impl From<RegistryError> for InvokeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::TypeNotFound(_) => Self::Type(err.to_string()),
            _ => Self::Symbol(err.to_string()),
        }
    }
}

impl From<CallError> for InvokeError {
    fn from(err: CallError) -> Self {
        Self::Target(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicall_types::assert_error_codes;

    fn all_variants() -> Vec<InvokeError> {
        vec![
            InvokeError::Validation("x".into()),
            InvokeError::Symbol("x".into()),
            InvokeError::Type("x".into()),
            InvokeError::Binding("x".into()),
            InvokeError::Construction("x".into()),
            InvokeError::Target("x".into()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "ENGINE_");
    }

    #[test]
    fn wire_kinds_are_stable() {
        let kinds: Vec<_> = all_variants().iter().map(InvokeError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "ValidationError",
                "SymbolNotFound",
                "UnresolvedType",
                "BindingError",
                "ConstructionError",
                "TargetInvocationError",
            ]
        );
    }

    #[test]
    fn registry_errors_map_by_kind() {
        let symbol: InvokeError = RegistryError::PackageNotFound("p".into()).into();
        assert_eq!(symbol.kind(), "SymbolNotFound");
        let ty: InvokeError = RegistryError::TypeNotFound("t".into()).into();
        assert_eq!(ty.kind(), "UnresolvedType");
    }

    #[test]
    fn call_errors_become_target_errors() {
        let err: InvokeError = CallError::failed("boom").into();
        assert_eq!(err.kind(), "TargetInvocationError");
        assert!(err.is_recoverable());
    }
}
