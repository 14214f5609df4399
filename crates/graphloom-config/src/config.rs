//! Configuration sections.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[cfg(feature = "toml")]
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// File extension is not a supported configuration format
    #[error("unsupported config format '{extension}' (expected toml or json)")]
    UnsupportedFormat {
        /// The offending extension
        extension: String,
    },

    /// A value is outside its allowed range
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Human readable description
        message: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level translator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Pagination limits
    pub limits: LimitConfig,

    /// Optional filter operators
    pub filters: FilterFeatures,

    /// Statement formatting
    pub emit: EmitConfig,

    /// Subscription support
    pub subscriptions: SubscriptionConfig,
}

impl TranslatorConfig {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if let (Some(default), Some(max)) = (self.limits.default_limit, self.limits.max_limit) {
            if default > max {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "limits.default_limit ({default}) exceeds limits.max_limit ({max})"
                    ),
                });
            }
        }
        if self.limits.default_limit == Some(0) || self.limits.max_limit == Some(0) {
            return Err(ConfigError::Invalid {
                message: "limits must be positive".to_string(),
            });
        }
        if self.emit.indent == 0 {
            return Err(ConfigError::Invalid {
                message: "emit.indent must be at least 1".to_string(),
            });
        }
        if self.emit.error_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "emit.error_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Default and maximum page sizes for list reads.
///
/// A type-level `@limit` annotation takes precedence over these values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitConfig {
    /// Limit applied when a request does not specify one
    pub default_limit: Option<u64>,
    /// Upper bound for requested limits
    pub max_limit: Option<u64>,
}

/// Filter operators that are off unless enabled
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterFeatures {
    /// `_LT/_LTE/_GT/_GTE` on String and ID attributes
    pub string_comparisons: bool,
    /// `_MATCHES` regular expression filters
    pub regex_matches: bool,
}

/// Statement text formatting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmitConfig {
    /// Spaces per subquery nesting level
    pub indent: usize,
    /// Prefix of the error codes raised by in-statement guards
    pub error_prefix: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            error_prefix: "@graphloom".to_string(),
        }
    }
}

/// Subscription support
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// When false, subscribe requests are rejected and no event
    /// descriptors are produced for mutations
    pub enabled: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
