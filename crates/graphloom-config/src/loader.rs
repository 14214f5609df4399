//! Loading configuration from strings and files.

use crate::config::{ConfigError, ConfigResult, TranslatorConfig};
use std::path::Path;
use tracing::debug;

/// Configuration loader.
///
/// Every entry point validates the loaded configuration before returning it.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse a TOML document
    #[cfg(feature = "toml")]
    pub fn from_toml_str(input: &str) -> ConfigResult<TranslatorConfig> {
        let config: TranslatorConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    pub fn from_json_str(input: &str) -> ConfigResult<TranslatorConfig> {
        let config: TranslatorConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, choosing the format by extension
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<TranslatorConfig> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        debug!(path = ?path, format = %extension, "Loading translator config");

        let contents = std::fs::read_to_string(path)?;
        match extension.as_str() {
            #[cfg(feature = "toml")]
            "toml" => Self::from_toml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(ConfigError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConfigLoader::from_toml_str(
            r#"
            [limits]
            default_limit = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.limits.default_limit, Some(20));
        assert_eq!(config.limits.max_limit, None);
        assert_eq!(config.emit.indent, 4);
    }

    #[test]
    fn test_json_config() {
        let config =
            ConfigLoader::from_json_str(r#"{"filters": {"regex_matches": true}}"#).unwrap();
        assert!(config.filters.regex_matches);
        assert!(!config.filters.string_comparisons);
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let result = ConfigLoader::from_toml_str(
            r#"
            [limits]
            default_limit = 100
            max_limit = 10
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
