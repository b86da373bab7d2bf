//! Expectation presets for a freshly deployed framework
//!
//! These mirror the post-deployment checks run against a managing
//! organization and the registries it controls.

use crate::address::Address;
use crate::capability::{
    REGISTER_DAO_PERMISSION, REGISTER_ENS_SUBDOMAIN_PERMISSION, REGISTER_PLUGIN_REPO_PERMISSION,
    REGISTER_STANDARD_CALLBACK_PERMISSION, ROOT_PERMISSION, SET_METADATA_PERMISSION,
    SET_SIGNATURE_VALIDATOR_PERMISSION, SET_TRUSTED_FORWARDER_PERMISSION, UPGRADE_DAO_PERMISSION,
};
use crate::verify::Expectation;
use charter_config::{Config, ConfigResult};

/// Capabilities a managing organization must hold on itself
pub const MANAGING_DAO_SELF_PERMISSIONS: [&str; 6] = [
    ROOT_PERMISSION,
    UPGRADE_DAO_PERMISSION,
    SET_SIGNATURE_VALIDATOR_PERMISSION,
    SET_TRUSTED_FORWARDER_PERMISSION,
    SET_METADATA_PERMISSION,
    REGISTER_STANDARD_CALLBACK_PERMISSION,
];

/// Deployer holds ROOT on the organization; the organization holds its
/// self-permissions.
pub fn managing_dao_expectations(dao: &Address, deployer: &Address) -> Vec<Expectation> {
    let mut expectations = vec![Expectation::granted(
        dao.clone(),
        deployer.clone(),
        ROOT_PERMISSION,
    )];
    expectations.extend(
        MANAGING_DAO_SELF_PERMISSIONS
            .iter()
            .map(|capability| Expectation::granted(dao.clone(), dao.clone(), *capability)),
    );
    expectations
}

/// Framework contract addresses checked after deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkAddresses {
    pub dao_registry: Address,
    pub plugin_repo_registry: Address,
    pub dao_ens_registrar: Address,
    pub plugin_ens_registrar: Address,
    pub dao_factory: Address,
    pub plugin_repo_factory: Address,
}

impl FrameworkAddresses {
    /// Address book names used in `charter.toml`
    pub const DAO_REGISTRY: &'static str = "DAORegistry";
    pub const PLUGIN_REPO_REGISTRY: &'static str = "PluginRepoRegistry";
    pub const DAO_ENS_REGISTRAR: &'static str = "DAO_ENSSubdomainRegistrar";
    pub const PLUGIN_ENS_REGISTRAR: &'static str = "Plugin_ENSSubdomainRegistrar";
    pub const DAO_FACTORY: &'static str = "DAOFactory";
    pub const PLUGIN_REPO_FACTORY: &'static str = "PluginRepoFactory";

    /// Look every framework address up in the configured address book
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let lookup = |name: &str| -> ConfigResult<Address> {
            config
                .resolve_address(&format!("@{}", name))
                .map(Address::new)
        };

        Ok(Self {
            dao_registry: lookup(Self::DAO_REGISTRY)?,
            plugin_repo_registry: lookup(Self::PLUGIN_REPO_REGISTRY)?,
            dao_ens_registrar: lookup(Self::DAO_ENS_REGISTRAR)?,
            plugin_ens_registrar: lookup(Self::PLUGIN_ENS_REGISTRAR)?,
            dao_factory: lookup(Self::DAO_FACTORY)?,
            plugin_repo_factory: lookup(Self::PLUGIN_REPO_FACTORY)?,
        })
    }
}

/// Registries may register names and entries; factories may register
/// organizations and plugin repositories.
pub fn framework_expectations(addresses: &FrameworkAddresses) -> Vec<Expectation> {
    vec![
        Expectation::granted(
            addresses.dao_ens_registrar.clone(),
            addresses.dao_registry.clone(),
            REGISTER_ENS_SUBDOMAIN_PERMISSION,
        ),
        Expectation::granted(
            addresses.plugin_ens_registrar.clone(),
            addresses.plugin_repo_registry.clone(),
            REGISTER_ENS_SUBDOMAIN_PERMISSION,
        ),
        Expectation::granted(
            addresses.dao_registry.clone(),
            addresses.dao_factory.clone(),
            REGISTER_DAO_PERMISSION,
        ),
        Expectation::granted(
            addresses.plugin_repo_registry.clone(),
            addresses.plugin_repo_factory.clone(),
            REGISTER_PLUGIN_REPO_PERMISSION,
        ),
    ]
}

/// Expectations listed in the `[[verify]]` section of the configuration
pub fn configured_expectations(config: &Config) -> ConfigResult<Vec<Expectation>> {
    Ok(config
        .verification_entries()?
        .into_iter()
        .map(Expectation::from)
        .collect())
}
