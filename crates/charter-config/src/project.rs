//! Project Configuration (charter.toml)
//!
//! Handles project-level configuration stored in `charter.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Upper bound accepted for `oracle.timeout_ms`
pub const MAX_ORACLE_TIMEOUT_MS: u64 = 60_000;

/// Project configuration from charter.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Organization owning the permission matrix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationConfig>,

    /// Oracle evaluation settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleConfig>,

    /// Audit trail settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,

    /// Named address book (contract name -> address)
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub addresses: BTreeMap<String, String>,

    /// Deployment verification manifest
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verify: Vec<VerifyEntry>,
}

/// Organization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrganizationConfig {
    /// Organization address
    pub address: String,

    /// Human readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    /// Bound on a single oracle evaluation, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Audit configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Record an in-memory audit trail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// One expected (or expected-absent) grant
///
/// `resource` and `actor` accept either a literal address or `@Name`,
/// which is looked up in the `[addresses]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VerifyEntry {
    pub resource: String,
    pub actor: String,
    pub capability: String,
    #[serde(default = "default_granted")]
    pub granted: bool,
}

fn default_granted() -> bool {
    true
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(org) = &self.organization {
            if org.address.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "organization.address".to_string(),
                    reason: "address cannot be empty".to_string(),
                });
            }
        }

        if let Some(timeout) = self.oracle.as_ref().and_then(|o| o.timeout_ms) {
            validate_timeout("oracle.timeout_ms", timeout)?;
        }

        for (name, address) in &self.addresses {
            if name.is_empty() || name.starts_with('@') {
                return Err(ConfigError::InvalidValue {
                    field: "addresses".to_string(),
                    reason: format!("invalid alias '{}'", name),
                });
            }
            if address.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("addresses.{}", name),
                    reason: "address cannot be empty".to_string(),
                });
            }
        }

        for (index, entry) in self.verify.iter().enumerate() {
            validate_verify_entry(index, entry)?;
        }

        Ok(())
    }

    /// Get the organization address, if present
    pub fn organization_address(&self) -> Option<&str> {
        self.organization.as_ref().map(|o| o.address.as_str())
    }

    /// Get the configured oracle timeout, if present
    pub fn oracle_timeout_ms(&self) -> Option<u64> {
        self.oracle.as_ref().and_then(|o| o.timeout_ms)
    }

    /// Get the audit flag, if present
    pub fn audit_enabled(&self) -> Option<bool> {
        self.audit.as_ref().and_then(|a| a.enabled)
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.organization.is_some() {
            self.organization = other.organization.clone();
        }
        if other.oracle.is_some() {
            self.oracle = other.oracle.clone();
        }
        if other.audit.is_some() {
            self.audit = other.audit.clone();
        }
        if !other.addresses.is_empty() {
            self.addresses.extend(other.addresses.clone());
        }
        if !other.verify.is_empty() {
            self.verify.extend(other.verify.iter().cloned());
        }
    }
}

/// Validate an oracle timeout value
pub(crate) fn validate_timeout(field: &str, timeout_ms: u64) -> ConfigResult<()> {
    if timeout_ms == 0 || timeout_ms > MAX_ORACLE_TIMEOUT_MS {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "must be between 1 and {} milliseconds, got {}",
                MAX_ORACLE_TIMEOUT_MS, timeout_ms
            ),
        });
    }
    Ok(())
}

fn validate_verify_entry(index: usize, entry: &VerifyEntry) -> ConfigResult<()> {
    let fields = [
        ("resource", &entry.resource),
        ("actor", &entry.actor),
        ("capability", &entry.capability),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() || value.as_str() == "@" {
            return Err(ConfigError::InvalidValue {
                field: format!("verify[{}].{}", index, field),
                reason: "value cannot be empty".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_project_config() {
        let toml = r#"
[organization]
address = "0x00000000000000000000000000000000000000DA"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.organization_address(),
            Some("0x00000000000000000000000000000000000000DA")
        );
        assert!(config.verify.is_empty());
    }

    #[test]
    fn test_parse_full_project_config() {
        let toml = r#"
[organization]
address = "0x00000000000000000000000000000000000000DA"
name = "managing-dao"

[oracle]
timeout_ms = 500

[audit]
enabled = true

[addresses]
DAORegistry = "0x0000000000000000000000000000000000000001"
DAOFactory = "0x0000000000000000000000000000000000000002"

[[verify]]
resource = "@DAORegistry"
actor = "@DAOFactory"
capability = "REGISTER_DAO_PERMISSION"

[[verify]]
resource = "@DAORegistry"
actor = "0x0000000000000000000000000000000000000003"
capability = "REGISTER_DAO_PERMISSION"
granted = false
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.oracle_timeout_ms(), Some(500));
        assert_eq!(config.audit_enabled(), Some(true));
        assert_eq!(config.addresses.len(), 2);
        assert_eq!(config.verify.len(), 2);
        assert!(config.verify[0].granted);
        assert!(!config.verify[1].granted);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[oracle]
timeout = 5
"#;
        assert!(toml::from_str::<ProjectConfig>(toml).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ProjectConfig {
            oracle: Some(OracleConfig {
                timeout_ms: Some(0),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_verify_capability_rejected() {
        let config = ProjectConfig {
            verify: vec![VerifyEntry {
                resource: "0x01".to_string(),
                actor: "0x02".to_string(),
                capability: " ".to_string(),
                granted: true,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = ProjectConfig::default();
        let override_config = ProjectConfig {
            organization: Some(OrganizationConfig {
                address: "0xDA".to_string(),
                name: None,
            }),
            ..Default::default()
        };

        base.merge(&override_config);
        assert_eq!(base.organization_address(), Some("0xDA"));
    }
}
