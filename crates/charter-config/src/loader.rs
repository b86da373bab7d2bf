//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{validate_timeout, OrganizationConfig, OracleConfig, ProjectConfig};
use crate::{ConfigError, ConfigResult, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Oracle timeout used when neither project nor global config sets one
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 250;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.charter/config.toml) - lowest priority
/// 2. Project config (./charter.toml) - overrides global
/// 3. Environment variables (CHARTER_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where charter.toml was found)
    pub project_root: Option<PathBuf>,
}

/// A verification manifest entry with address aliases resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVerifyEntry {
    pub resource: String,
    pub actor: String,
    pub capability: String,
    pub granted: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads global config from an explicit path
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find charter.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        // Global config is optional
        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); a missing file yields defaults
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.charter/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognised variables: CHARTER_ORACLE_TIMEOUT_MS, CHARTER_AUDIT,
    /// CHARTER_ORGANIZATION
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(timeout) = env::var("CHARTER_ORACLE_TIMEOUT_MS") {
            let timeout_ms: u64 = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "CHARTER_ORACLE_TIMEOUT_MS".to_string(),
                reason: format!("expected milliseconds, got '{}'", timeout),
            })?;
            validate_timeout("CHARTER_ORACLE_TIMEOUT_MS", timeout_ms)?;
            config
                .oracle
                .get_or_insert_with(OracleConfig::default)
                .timeout_ms = Some(timeout_ms);
        }

        if let Ok(audit) = env::var("CHARTER_AUDIT") {
            let enabled = matches!(audit.to_lowercase().as_str(), "true" | "1" | "yes");
            config.audit.get_or_insert_with(Default::default).enabled = Some(enabled);
        }

        if let Ok(address) = env::var("CHARTER_ORGANIZATION") {
            match config.organization.as_mut() {
                Some(org) => org.address = address,
                None => {
                    config.organization = Some(OrganizationConfig {
                        address,
                        name: None,
                    })
                }
            }
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective oracle timeout (project > global > default)
    pub fn oracle_timeout(&self) -> Duration {
        let ms = self
            .project
            .oracle_timeout_ms()
            .or_else(|| self.global.default_oracle_timeout_ms())
            .unwrap_or(DEFAULT_ORACLE_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    /// Whether an audit trail should be recorded (project > global > on)
    pub fn audit_enabled(&self) -> bool {
        self.project
            .audit_enabled()
            .or_else(|| self.global.default_audit())
            .unwrap_or(true)
    }

    /// Organization address, if configured
    pub fn organization(&self) -> Option<&str> {
        self.project.organization_address()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has charter.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Resolve a literal address or an `@Name` alias from the address book
    pub fn resolve_address(&self, value: &str) -> ConfigResult<String> {
        match value.strip_prefix('@') {
            Some(alias) => self
                .project
                .addresses
                .get(alias)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownAddress(alias.to_string())),
            None => Ok(value.to_string()),
        }
    }

    /// Verification manifest with all aliases resolved, in file order
    pub fn verification_entries(&self) -> ConfigResult<Vec<ResolvedVerifyEntry>> {
        self.project
            .verify
            .iter()
            .map(|entry| {
                Ok(ResolvedVerifyEntry {
                    resource: self.resolve_address(&entry.resource)?,
                    actor: self.resolve_address(&entry.actor)?,
                    capability: entry.capability.clone(),
                    granted: entry.granted,
                })
            })
            .collect()
    }
}
