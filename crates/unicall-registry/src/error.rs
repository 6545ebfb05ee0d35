//! Registry layer errors.
//!
//! All variants implement [`ErrorCode`] with the `REGISTRY_` prefix.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`PackageNotFound`](RegistryError::PackageNotFound) | `REGISTRY_PACKAGE_NOT_FOUND` | No |
//! | [`ClassNotFound`](RegistryError::ClassNotFound) | `REGISTRY_CLASS_NOT_FOUND` | No |
//! | [`MemberNotFound`](RegistryError::MemberNotFound) | `REGISTRY_MEMBER_NOT_FOUND` | No |
//! | [`TypeNotFound`](RegistryError::TypeNotFound) | `REGISTRY_TYPE_NOT_FOUND` | No |

use thiserror::Error;
use unicall_types::ErrorCode;

/// Symbol and type resolution failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No package registered under the given path.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// The `$`-delimited class chain could not be walked.
    #[error("class not found: {class} in package {package}")]
    ClassNotFound { package: String, class: String },

    /// The named member does not exist on the resolved target.
    #[error("member not found: {member} on {owner}")]
    MemberNotFound { owner: String, member: String },

    /// A type name resolved through neither the primitive table nor the
    /// registered classes.
    #[error("type not found: {0}")]
    TypeNotFound(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::PackageNotFound(_) => "REGISTRY_PACKAGE_NOT_FOUND",
            Self::ClassNotFound { .. } => "REGISTRY_CLASS_NOT_FOUND",
            Self::MemberNotFound { .. } => "REGISTRY_MEMBER_NOT_FOUND",
            Self::TypeNotFound(_) => "REGISTRY_TYPE_NOT_FOUND",
        }
    }

    fn is_recoverable(&self) -> bool {
        // All of these require a corrected request or registration.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicall_types::assert_error_codes;

    fn all_variants() -> Vec<RegistryError> {
        vec![
            RegistryError::PackageNotFound("p".into()),
            RegistryError::ClassNotFound {
                package: "p".into(),
                class: "c".into(),
            },
            RegistryError::MemberNotFound {
                owner: "p.c".into(),
                member: "m".into(),
            },
            RegistryError::TypeNotFound("t".into()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "REGISTRY_");
    }

    #[test]
    fn display_names_the_symbol() {
        let err = RegistryError::MemberNotFound {
            owner: "demo$Test".into(),
            member: "get_id".into(),
        };
        assert!(err.to_string().contains("get_id"));
        assert!(err.to_string().contains("demo$Test"));
    }
}
