//! Named capabilities and their stable identifiers

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const ROOT_PERMISSION: &str = "ROOT_PERMISSION";
pub const UPGRADE_DAO_PERMISSION: &str = "UPGRADE_DAO_PERMISSION";
pub const SET_SIGNATURE_VALIDATOR_PERMISSION: &str = "SET_SIGNATURE_VALIDATOR_PERMISSION";
pub const SET_TRUSTED_FORWARDER_PERMISSION: &str = "SET_TRUSTED_FORWARDER_PERMISSION";
pub const SET_METADATA_PERMISSION: &str = "SET_METADATA_PERMISSION";
pub const REGISTER_STANDARD_CALLBACK_PERMISSION: &str = "REGISTER_STANDARD_CALLBACK_PERMISSION";
pub const REGISTER_ENS_SUBDOMAIN_PERMISSION: &str = "REGISTER_ENS_SUBDOMAIN_PERMISSION";
pub const REGISTER_DAO_PERMISSION: &str = "REGISTER_DAO_PERMISSION";
pub const REGISTER_PLUGIN_REPO_PERMISSION: &str = "REGISTER_PLUGIN_REPO_PERMISSION";
pub const EXECUTE_PERMISSION: &str = "EXECUTE_PERMISSION";

/// A named permission a resource can grant to an actor.
///
/// Capabilities compare by name. The matrix treats unknown names exactly
/// like the well-known ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Capability(name.into())
    }

    pub fn root() -> Self {
        Capability::new(ROOT_PERMISSION)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Blank names are malformed
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Stable 32-byte identifier (hex SHA-256 of the name)
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Capability::new(name)
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Capability(name)
    }
}
