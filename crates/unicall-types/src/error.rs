//! Unified error interface for unicall crates.
//!
//! Every error type in the workspace implements [`ErrorCode`] so the
//! dispatcher and the frontends can handle failures uniformly:
//!
//! - **Machine-readable codes**: stable UPPER_SNAKE_CASE strings
//! - **Recoverability info**: whether retrying the request can help
//!
//! # Example
//!
//! ```
//! use unicall_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     NotFound(String),
//!     Busy,
//! }
//!
//! impl ErrorCode for MyError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NotFound(_) => "DEMO_NOT_FOUND",
//!             Self::Busy => "DEMO_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(MyError::Busy.code(), "DEMO_BUSY");
//! ```

/// Unified error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"ENGINE_BINDING"`
/// - **Prefixed per crate**: `REGISTRY_`, `ENGINE_`, ...
/// - **Stable**: codes are part of the API contract and never change
///
/// # Recoverability
///
/// An error is recoverable when retrying the same request may succeed or
/// the caller can fix the condition without a code change. Malformed
/// descriptors and unresolvable symbols are not recoverable; a target
/// callable failing at runtime may be.
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows the workspace conventions.
///
/// # Panics
///
/// Panics with a descriptive message if the code is empty, not
/// UPPER_SNAKE_CASE, or lacks the expected prefix. Intended for tests.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

/// Checks if a string is UPPER_SNAKE_CASE.
fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&TestError::Transient, "WRONG_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("ENGINE_BINDING"));
        assert!(is_upper_snake_case("CODE_123"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("lower"));
        assert!(!is_upper_snake_case("_LEAD"));
        assert!(!is_upper_snake_case("TRAIL_"));
        assert!(!is_upper_snake_case("A__B"));
    }
}
