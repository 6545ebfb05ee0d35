//! Engine configuration.
//!
//! All fields have compile-time defaults; `#[serde(default)]` keeps every
//! field optional in the TOML file. Layering works through [`merge`]
//! (values differing from the default override).
//!
//! [`merge`]: EngineConfig::merge

use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// # Example
///
/// ```
/// use unicall_engine::EngineConfig;
///
/// let config: EngineConfig = EngineConfig::from_toml("reuse_cache_capacity = 16").unwrap();
/// assert_eq!(config.reuse_cache_capacity, 16);
/// assert_eq!(config.list_depth, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on the instance reuse cache; `0` = unbounded.
    ///
    /// The original runtimes keep this cache unbounded for the lifetime of
    /// a test session, so unbounded stays the default. With a bound set,
    /// the oldest-inserted entry is evicted first.
    pub reuse_cache_capacity: usize,

    /// Default package recursion depth for listing when the request omits
    /// `depth`; `0` = unbounded.
    pub list_depth: u32,

    /// Echo bound method arguments in success envelopes.
    ///
    /// Disable to shrink responses when callers only need `return`.
    pub echo_method_args: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reuse_cache_capacity: 0,
            list_depth: 0,
            echo_method_args: true,
        }
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one; values from `other` win only
    /// when they differ from the default.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::new();
        if other.reuse_cache_capacity != default.reuse_cache_capacity {
            self.reuse_cache_capacity = other.reuse_cache_capacity;
        }
        if other.list_depth != default.list_depth {
            self.list_depth = other.list_depth;
        }
        if other.echo_method_args != default.echo_method_args {
            self.echo_method_args = other.echo_method_args;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.reuse_cache_capacity, 0);
        assert_eq!(config.list_depth, 0);
        assert!(config.echo_method_args);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = EngineConfig::new();
        config.reuse_cache_capacity = 8;
        let text = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml("list_depth = 2").unwrap();
        assert_eq!(config.list_depth, 2);
        assert!(config.echo_method_args);
    }

    #[test]
    fn merge_only_overrides_non_default() {
        let mut base = EngineConfig::new();
        base.reuse_cache_capacity = 4;

        let other = EngineConfig {
            list_depth: 3,
            ..EngineConfig::new()
        };
        base.merge(&other);
        assert_eq!(base.reuse_cache_capacity, 4);
        assert_eq!(base.list_depth, 3);
    }
}
