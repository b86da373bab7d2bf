//! Shared fixtures for plugin setup tests

#![allow(dead_code)]

use charter_permissions::{Address, OperationKind, PermissionOperation};
use charter_plugin::{
    PluginError, PluginRepo, PluginRepoRegistry, PluginSetup, PluginSetupResult, PluginUpdate,
    UpdateContext,
};
use semver::Version;
use std::sync::Arc;

pub const EXECUTE: &str = "EXECUTE_PERMISSION";

/// `amount` operations of one kind on distinct, non-null keys
pub fn mock_permission_operations(amount: usize, kind: OperationKind) -> Vec<PermissionOperation> {
    (1..=amount)
        .map(|i| {
            let target = format!("0x{:040x}", i);
            PermissionOperation {
                kind,
                resource: Address::new(target.clone()),
                actor: Address::new(target),
                oracle: (kind == OperationKind::GrantWithOracle)
                    .then(|| Address::new(format!("0x{:040x}", 0xffff))),
                capability: "MOCK_PERMISSION".into(),
            }
        })
        .collect()
}

/// Setup logic returning fixed values
pub struct ScriptedSetup {
    pub install: PluginSetupResult,
    pub update: Option<PluginUpdate>,
    pub uninstall: Vec<PermissionOperation>,
}

impl ScriptedSetup {
    pub fn installing(plugin: &str, permissions: Vec<PermissionOperation>) -> Self {
        Self {
            install: PluginSetupResult {
                plugin: Address::new(plugin),
                helpers: Vec::new(),
                permissions,
            },
            update: None,
            uninstall: Vec::new(),
        }
    }
}

impl PluginSetup for ScriptedSetup {
    fn prepare_installation(&self, _: &Address, _: &[u8]) -> Result<PluginSetupResult, PluginError> {
        Ok(self.install.clone())
    }

    fn prepare_update(
        &self,
        _: &Address,
        update: &UpdateContext<'_>,
        _: &[u8],
    ) -> Result<PluginUpdate, PluginError> {
        self.update.clone().ok_or_else(|| {
            PluginError::new(format!("no update path from {}", update.current_version))
        })
    }

    fn prepare_uninstallation(
        &self,
        _: &Address,
        _: &Address,
        _: &[Address],
        _: &[u8],
    ) -> Result<Vec<PermissionOperation>, PluginError> {
        Ok(self.uninstall.clone())
    }
}

/// Setup logic whose helpers may execute on the organization.
///
/// Installation deploys `helpers`; an update moves to `helpers`, revoking
/// removed helpers and granting new ones.
pub struct HelperSetup {
    pub plugin: Address,
    pub helpers: Vec<Address>,
    pub init_data: Option<Vec<u8>>,
}

impl HelperSetup {
    pub fn new(plugin: &str, helpers: &[&str]) -> Self {
        Self {
            plugin: Address::new(plugin),
            helpers: helpers.iter().map(|h| Address::new(*h)).collect(),
            init_data: None,
        }
    }
}

impl PluginSetup for HelperSetup {
    fn prepare_installation(
        &self,
        organization: &Address,
        _: &[u8],
    ) -> Result<PluginSetupResult, PluginError> {
        let mut permissions = vec![PermissionOperation::grant(
            organization.clone(),
            self.plugin.clone(),
            EXECUTE,
        )];
        permissions.extend(
            self.helpers
                .iter()
                .map(|helper| PermissionOperation::grant(organization.clone(), helper.clone(), EXECUTE)),
        );
        Ok(PluginSetupResult {
            plugin: self.plugin.clone(),
            helpers: self.helpers.clone(),
            permissions,
        })
    }

    fn prepare_update(
        &self,
        organization: &Address,
        update: &UpdateContext<'_>,
        _: &[u8],
    ) -> Result<PluginUpdate, PluginError> {
        let revokes = update
            .current_helpers
            .iter()
            .filter(|helper| !self.helpers.contains(helper))
            .map(|helper| PermissionOperation::revoke(organization.clone(), helper.clone(), EXECUTE));
        let grants = self
            .helpers
            .iter()
            .filter(|helper| !update.current_helpers.contains(helper))
            .map(|helper| PermissionOperation::grant(organization.clone(), helper.clone(), EXECUTE));

        Ok(PluginUpdate {
            helpers: self.helpers.clone(),
            permissions: revokes.chain(grants).collect(),
            init_data: self.init_data.clone(),
        })
    }

    fn prepare_uninstallation(
        &self,
        organization: &Address,
        plugin: &Address,
        current_helpers: &[Address],
        _: &[u8],
    ) -> Result<Vec<PermissionOperation>, PluginError> {
        Ok(std::iter::once(plugin)
            .chain(current_helpers)
            .map(|actor| PermissionOperation::revoke(organization.clone(), actor.clone(), EXECUTE))
            .collect())
    }
}

/// Registry holding one repository at `repo` with the given releases
pub fn registry_with(repo: &str, releases: Vec<(&str, &str, Arc<dyn PluginSetup>)>) -> PluginRepoRegistry {
    let mut plugin_repo = PluginRepo::new(repo);
    for (version, setup, logic) in releases {
        plugin_repo
            .publish(Version::parse(version).unwrap(), setup, logic)
            .unwrap();
    }
    let mut registry = PluginRepoRegistry::new();
    registry.register(plugin_repo).unwrap();
    registry
}

pub fn logic(setup: impl PluginSetup + 'static) -> Arc<dyn PluginSetup> {
    Arc::new(setup)
}
