//! Plugin setup logic and the values it produces
//!
//! A plugin ships setup logic implementing [`PluginSetup`]. The processor
//! calls it directly and takes the returned value as the result of the
//! prepare step; nothing is recovered from side channels.

use charter_permissions::{Address, PermissionOperation};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by plugin-provided code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PluginError {
    message: String,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Output of preparing an installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSetupResult {
    pub plugin: Address,
    /// Auxiliary addresses; order is significant
    pub helpers: Vec<Address>,
    pub permissions: Vec<PermissionOperation>,
}

/// What update logic returns for an existing plugin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginUpdate {
    /// The full new helper set, not a delta
    pub helpers: Vec<Address>,
    pub permissions: Vec<PermissionOperation>,
    /// Payload handed to the plugin once the permission batch is committed
    pub init_data: Option<Vec<u8>>,
}

/// Prepared update: the new setup result plus what it replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePreparation {
    pub result: PluginSetupResult,
    pub current_helpers: Vec<Address>,
    pub init_data: Option<Vec<u8>>,
}

impl UpdatePreparation {
    /// Helpers present before the update and absent after it
    pub fn removed_helpers(&self) -> Vec<Address> {
        self.current_helpers
            .iter()
            .filter(|helper| !self.result.helpers.contains(helper))
            .cloned()
            .collect()
    }

    /// Helpers introduced by the update
    pub fn added_helpers(&self) -> Vec<Address> {
        self.result
            .helpers
            .iter()
            .filter(|helper| !self.current_helpers.contains(helper))
            .cloned()
            .collect()
    }
}

/// State of the installed plugin passed to update logic
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    pub plugin: &'a Address,
    pub current_version: &'a Version,
    pub current_helpers: &'a [Address],
}

/// Setup logic shipped with one published plugin version
pub trait PluginSetup: Send + Sync {
    fn prepare_installation(
        &self,
        organization: &Address,
        payload: &[u8],
    ) -> Result<PluginSetupResult, PluginError>;

    fn prepare_update(
        &self,
        organization: &Address,
        update: &UpdateContext<'_>,
        payload: &[u8],
    ) -> Result<PluginUpdate, PluginError> {
        let _ = (organization, payload);
        Err(PluginError::new(format!(
            "no update path from version {}",
            update.current_version
        )))
    }

    /// Operations undoing the installation, typically revokes
    fn prepare_uninstallation(
        &self,
        organization: &Address,
        plugin: &Address,
        current_helpers: &[Address],
        payload: &[u8],
    ) -> Result<Vec<PermissionOperation>, PluginError>;
}

/// Delivers `init_data` to a plugin after its update batch is committed
pub trait PluginInvoker: Send + Sync {
    fn invoke(&self, organization: &Address, plugin: &Address, init_data: &[u8]) -> Result<(), PluginError>;
}

impl<F> PluginInvoker for F
where
    F: Fn(&Address, &Address, &[u8]) -> Result<(), PluginError> + Send + Sync,
{
    fn invoke(&self, organization: &Address, plugin: &Address, init_data: &[u8]) -> Result<(), PluginError> {
        self(organization, plugin, init_data)
    }
}

/// Invoker that accepts every call and does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvoker;

impl PluginInvoker for NoopInvoker {
    fn invoke(&self, _organization: &Address, _plugin: &Address, _init_data: &[u8]) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn preparation(current: &[&str], new: &[&str]) -> UpdatePreparation {
        UpdatePreparation {
            result: PluginSetupResult {
                plugin: Address::new("plugin"),
                helpers: new.iter().map(|h| Address::new(*h)).collect(),
                permissions: Vec::new(),
            },
            current_helpers: current.iter().map(|h| Address::new(*h)).collect(),
            init_data: None,
        }
    }

    #[test]
    fn test_helper_diff() {
        let update = preparation(&["a", "b", "c"], &["c", "a", "d"]);

        assert_eq!(update.removed_helpers(), vec![Address::new("b")]);
        assert_eq!(update.added_helpers(), vec![Address::new("d")]);
    }

    #[test]
    fn test_default_update_path_is_refused() {
        struct InstallOnly;

        impl PluginSetup for InstallOnly {
            fn prepare_installation(&self, _: &Address, _: &[u8]) -> Result<PluginSetupResult, PluginError> {
                Err(PluginError::new("unused"))
            }

            fn prepare_uninstallation(
                &self,
                _: &Address,
                _: &Address,
                _: &[Address],
                _: &[u8],
            ) -> Result<Vec<PermissionOperation>, PluginError> {
                Ok(Vec::new())
            }
        }

        let version = Version::new(1, 2, 0);
        let plugin = Address::new("plugin");
        let context = UpdateContext {
            plugin: &plugin,
            current_version: &version,
            current_helpers: &[],
        };
        let err = InstallOnly
            .prepare_update(&Address::new("dao"), &context, &[])
            .unwrap_err();

        assert_eq!(err.message(), "no update path from version 1.2.0");
    }

    #[test]
    fn test_closure_invoker() {
        let invoker = |_: &Address, _: &Address, data: &[u8]| -> Result<(), PluginError> {
            if data.is_empty() {
                Err(PluginError::new("empty init data"))
            } else {
                Ok(())
            }
        };

        assert!(invoker.invoke(&Address::new("dao"), &Address::new("p"), b"init").is_ok());
        assert!(invoker.invoke(&Address::new("dao"), &Address::new("p"), b"").is_err());
    }
}
