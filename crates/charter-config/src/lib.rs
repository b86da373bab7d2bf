//! Charter Configuration System
//!
//! Provides configuration for a permission matrix deployment:
//! - Project configuration (charter.toml)
//! - Global user configuration (~/.charter/config.toml)
//! - A named address book and a deployment verification manifest
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.charter/config.toml)
//! 2. Project config (./charter.toml)
//! 3. Environment variables (CHARTER_*)
//!
//! # Example
//!
//! ```no_run
//! use charter_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("oracle timeout: {:?}", config.oracle_timeout());
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown address alias '@{0}'")]
    UnknownAddress(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "charter.toml";

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader, ResolvedVerifyEntry};
pub use project::{ProjectConfig, VerifyEntry};
