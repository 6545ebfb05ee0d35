//! Fixed wire-contract keys and the timing triple.
//!
//! The response envelope keys are a stable contract shared with the other
//! language runtimes of the protocol; they never change casing or spelling.
//! Timing is rendered as a single `start|duration|end` string with all
//! three fields in integer microseconds.

/// `ok` — overall success flag.
pub const KEY_OK: &str = "ok";
/// `code` — `200` on success, `500` on any caught failure.
pub const KEY_CODE: &str = "code";
/// `msg` — `"success"` or the human-readable error message.
pub const KEY_MSG: &str = "msg";
/// `throw` — the error-kind tag of a caught failure.
pub const KEY_THROW: &str = "throw";
/// `language` — the runtime language of this engine.
pub const KEY_LANGUAGE: &str = "language";
/// `type` — the declared/observed return type name.
pub const KEY_TYPE: &str = "type";
/// `value` — an argument descriptor's value field.
pub const KEY_VALUE: &str = "value";
/// `key` — an argument descriptor's keyword-binding field.
pub const KEY_KEY: &str = "key";
/// `return` — the coerced return value.
pub const KEY_RETURN: &str = "return";
/// `warn` — best-effort serialization fallback note.
pub const KEY_WARN: &str = "warn";
/// `this` — post-call receiver snapshot.
pub const KEY_THIS: &str = "this";
/// `static` — static-member flag.
pub const KEY_STATIC: &str = "static";
/// `reuse` — instance-reuse flag.
pub const KEY_REUSE: &str = "reuse";
/// `package` — package path.
pub const KEY_PACKAGE: &str = "package";
/// `class` — `$`-delimited class path.
pub const KEY_CLASS: &str = "class";
/// `constructor` — alternate factory member name.
pub const KEY_CONSTRUCTOR: &str = "constructor";
/// `method` — target member name.
pub const KEY_METHOD: &str = "method";
/// `name` — member name (listing output).
pub const KEY_NAME: &str = "name";
/// `classArgs` — constructor argument descriptors.
pub const KEY_CLASS_ARGS: &str = "classArgs";
/// `methodArgs` — method argument descriptors.
pub const KEY_METHOD_ARGS: &str = "methodArgs";
/// `callback` — as-you-go callback forwarding flag.
pub const KEY_CALLBACK: &str = "callback";
/// `mock` — mock flag (validated, not acted on).
pub const KEY_MOCK: &str = "mock";
/// `query` — listing query mode: 0-data, 1-totals, 2-both.
pub const KEY_QUERY: &str = "query";
/// `depth` — listing package recursion depth, 0 = unbounded.
pub const KEY_DEPTH: &str = "depth";
/// `types` — listing signature filter (validated, not applied).
pub const KEY_TYPES: &str = "types";
/// `call()[]` — a callback stub's ordered call log.
pub const KEY_CALL_LIST: &str = "call()[]";
/// `time:start|duration|end` — the rendered timing triple.
pub const KEY_TIME_DETAIL: &str = "time:start|duration|end";
/// `packageTotal` — number of matched packages.
pub const KEY_PACKAGE_TOTAL: &str = "packageTotal";
/// `classTotal` — number of matched classes.
pub const KEY_CLASS_TOTAL: &str = "classTotal";
/// `methodTotal` — number of matched methods.
pub const KEY_METHOD_TOTAL: &str = "methodTotal";
/// `packageList` — listing payload.
pub const KEY_PACKAGE_LIST: &str = "packageList";
/// `classList` — per-package class group.
pub const KEY_CLASS_LIST: &str = "classList";
/// `methodList` — per-class method group.
pub const KEY_METHOD_LIST: &str = "methodList";

/// Success code.
pub const CODE_SUCCESS: i64 = 200;
/// Caught-failure code.
pub const CODE_SERVER_ERROR: i64 = 500;
/// Success message.
pub const MSG_SUCCESS: &str = "success";
/// Engine language tag.
pub const LANGUAGE: &str = "Rust";

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timing of one invocation, microsecond resolution.
///
/// # Example
///
/// ```
/// use unicall_types::wire::TimeDetail;
///
/// let t = TimeDetail { start_micros: 10, duration_micros: 5, end_micros: 15 };
/// assert_eq!(t.render(), "10|5|15");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDetail {
    pub start_micros: u128,
    pub duration_micros: u128,
    pub end_micros: u128,
}

impl TimeDetail {
    /// Measures from `start` (epoch microseconds) to now.
    #[must_use]
    pub fn since(start_micros: u128) -> Self {
        let end_micros = now_micros();
        Self {
            start_micros,
            duration_micros: end_micros.saturating_sub(start_micros),
            end_micros,
        }
    }

    /// Renders the `start|duration|end` wire string.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}|{}|{}",
            self.start_micros, self.duration_micros, self.end_micros
        )
    }
}

/// Current wall-clock time in epoch microseconds.
#[must_use]
pub fn now_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_detail_since() {
        let start = now_micros();
        let detail = TimeDetail::since(start);
        assert_eq!(detail.start_micros, start);
        assert_eq!(
            detail.end_micros,
            detail.start_micros + detail.duration_micros
        );
    }

    #[test]
    fn render_is_pipe_separated() {
        let t = TimeDetail {
            start_micros: 1,
            duration_micros: 2,
            end_micros: 3,
        };
        assert_eq!(t.render(), "1|2|3");
    }

    #[test]
    fn now_micros_is_monotonic_enough() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
    }
}
