//! Global Configuration (~/.charter/config.toml)
//!
//! Handles user-level defaults stored in `~/.charter/config.toml`.

use crate::project::validate_timeout;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.charter/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Default oracle timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_timeout_ms: Option<u64>,

    /// Record an audit trail by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(timeout) = self.default_oracle_timeout_ms() {
            validate_timeout("defaults.oracle_timeout_ms", timeout)?;
        }
        Ok(())
    }

    /// Get the global config file path (~/.charter/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".charter").join("config.toml"))
    }

    pub fn default_oracle_timeout_ms(&self) -> Option<u64> {
        self.defaults.as_ref().and_then(|d| d.oracle_timeout_ms)
    }

    pub fn default_audit(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.audit)
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[defaults]
oracle_timeout_ms = 1000
audit = false
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_oracle_timeout_ms(), Some(1000));
        assert_eq!(config.default_audit(), Some(false));
    }

    #[test]
    fn test_timeout_over_limit_rejected() {
        let config = GlobalConfig {
            defaults: Some(DefaultsConfig {
                oracle_timeout_ms: Some(120_000),
                audit: None,
            }),
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = GlobalConfig::default();
        let override_config = GlobalConfig {
            defaults: Some(DefaultsConfig {
                oracle_timeout_ms: Some(10),
                audit: Some(true),
            }),
        };

        base.merge(&override_config);
        assert_eq!(base.default_oracle_timeout_ms(), Some(10));
        assert_eq!(base.default_audit(), Some(true));
    }
}
