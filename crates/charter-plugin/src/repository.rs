//! Versioned plugin repositories
//!
//! A [`PluginRepo`] holds every published version of one plugin, each bound
//! to the address of its setup logic. [`PluginRepoRegistry`] is the
//! in-process lookup the processor resolves setups through.

use crate::error::{SetupError, SetupResult};
use crate::setup::PluginSetup;
use charter_permissions::Address;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Publication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("version {attempted} is not newer than latest {latest}")]
    VersionNotIncreasing { latest: Version, attempted: Version },

    #[error("setup {setup} is already published as version {version}")]
    DuplicateSetup { setup: Address, version: Version },

    #[error("null setup address")]
    NullSetup,

    #[error("repository {0} is already registered")]
    AlreadyRegistered(Address),
}

/// Setup logic resolved for one published version
#[derive(Clone)]
pub struct ResolvedSetup {
    pub version: Version,
    pub logic: Arc<dyn PluginSetup>,
}

impl fmt::Debug for ResolvedSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSetup")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Lookup of published setup logic
pub trait PluginSetupRepository {
    /// Resolve `setup` inside repository `repo`
    fn resolve(&self, repo: &Address, setup: &Address) -> SetupResult<ResolvedSetup>;
}

/// One published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: Version,
    pub setup: Address,
}

/// All published versions of one plugin
#[derive(Clone)]
pub struct PluginRepo {
    address: Address,
    releases: BTreeMap<Version, (Address, Arc<dyn PluginSetup>)>,
}

impl fmt::Debug for PluginRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRepo")
            .field("address", &self.address)
            .field("releases", &self.releases())
            .finish()
    }
}

impl PluginRepo {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            releases: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Publish a new version; it must be newer than every existing one
    pub fn publish(
        &mut self,
        version: Version,
        setup: impl Into<Address>,
        logic: Arc<dyn PluginSetup>,
    ) -> Result<(), RepoError> {
        let setup = setup.into();
        if setup.is_null() {
            return Err(RepoError::NullSetup);
        }
        if let Some(existing) = self.version_of(&setup) {
            return Err(RepoError::DuplicateSetup {
                setup,
                version: existing.clone(),
            });
        }
        if let Some(latest) = self.latest_version() {
            if version <= *latest {
                return Err(RepoError::VersionNotIncreasing {
                    latest: latest.clone(),
                    attempted: version,
                });
            }
        }

        tracing::debug!(repo = %self.address, %version, %setup, "plugin version published");
        self.releases.insert(version, (setup, logic));
        Ok(())
    }

    pub fn latest_version(&self) -> Option<&Version> {
        self.releases.keys().next_back()
    }

    /// Setup address of the latest version
    pub fn latest_setup(&self) -> Option<&Address> {
        self.releases.values().next_back().map(|(setup, _)| setup)
    }

    pub fn version_of(&self, setup: &Address) -> Option<&Version> {
        self.releases
            .iter()
            .find(|(_, (published, _))| published == setup)
            .map(|(version, _)| version)
    }

    pub fn setup_for(&self, version: &Version) -> Option<&Address> {
        self.releases.get(version).map(|(setup, _)| setup)
    }

    /// Published versions, oldest first
    pub fn releases(&self) -> Vec<Release> {
        self.releases
            .iter()
            .map(|(version, (setup, _))| Release {
                version: version.clone(),
                setup: setup.clone(),
            })
            .collect()
    }

    fn resolve_setup(&self, setup: &Address) -> Option<ResolvedSetup> {
        self.releases
            .iter()
            .find(|(_, (published, _))| published == setup)
            .map(|(version, (_, logic))| ResolvedSetup {
                version: version.clone(),
                logic: Arc::clone(logic),
            })
    }
}

/// Registry of plugin repositories by address
#[derive(Debug, Clone, Default)]
pub struct PluginRepoRegistry {
    repos: HashMap<Address, PluginRepo>,
}

impl PluginRepoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, repo: PluginRepo) -> Result<(), RepoError> {
        if self.repos.contains_key(repo.address()) {
            return Err(RepoError::AlreadyRegistered(repo.address().clone()));
        }
        self.repos.insert(repo.address().clone(), repo);
        Ok(())
    }

    pub fn repo(&self, address: &Address) -> Option<&PluginRepo> {
        self.repos.get(address)
    }

    pub fn repo_mut(&mut self, address: &Address) -> Option<&mut PluginRepo> {
        self.repos.get_mut(address)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

impl PluginSetupRepository for PluginRepoRegistry {
    fn resolve(&self, repo: &Address, setup: &Address) -> SetupResult<ResolvedSetup> {
        let plugin_repo = self
            .repos
            .get(repo)
            .ok_or_else(|| SetupError::UnknownPluginRepo(repo.clone()))?;

        plugin_repo
            .resolve_setup(setup)
            .ok_or_else(|| SetupError::UnknownPluginVersion {
                repo: repo.clone(),
                setup: setup.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{PluginError, PluginSetupResult};
    use charter_permissions::PermissionOperation;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct Empty;

    impl PluginSetup for Empty {
        fn prepare_installation(&self, _: &Address, _: &[u8]) -> Result<PluginSetupResult, PluginError> {
            Ok(PluginSetupResult {
                plugin: Address::new("plugin"),
                helpers: Vec::new(),
                permissions: Vec::new(),
            })
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

    fn repo_with(versions: &[(&str, &str)]) -> PluginRepo {
        let mut repo = PluginRepo::new("repo");
        for (version, setup) in versions {
            repo.publish(Version::parse(version).unwrap(), *setup, Arc::new(Empty))
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_publish_and_lookup() {
        let repo = repo_with(&[("1.0.0", "setup-1"), ("1.1.0", "setup-2")]);

        assert_eq!(repo.latest_version(), Some(&Version::new(1, 1, 0)));
        assert_eq!(repo.latest_setup(), Some(&Address::new("setup-2")));
        assert_eq!(repo.version_of(&Address::new("setup-1")), Some(&Version::new(1, 0, 0)));
        assert_eq!(repo.setup_for(&Version::new(1, 1, 0)), Some(&Address::new("setup-2")));
        assert_eq!(repo.releases().len(), 2);
    }

    #[rstest]
    #[case::same("1.0.0")]
    #[case::older("0.9.0")]
    #[case::prerelease("1.0.0-rc.1")]
    fn test_publish_rejects_non_increasing(#[case] version: &str) {
        let mut repo = repo_with(&[("1.0.0", "setup-1")]);
        let err = repo
            .publish(Version::parse(version).unwrap(), "setup-new", Arc::new(Empty))
            .unwrap_err();

        assert!(matches!(err, RepoError::VersionNotIncreasing { .. }));
    }

    #[test]
    fn test_publish_rejects_duplicate_setup() {
        let mut repo = repo_with(&[("1.0.0", "setup-1")]);
        let err = repo
            .publish(Version::new(2, 0, 0), "setup-1", Arc::new(Empty))
            .unwrap_err();

        assert_eq!(
            err,
            RepoError::DuplicateSetup {
                setup: Address::new("setup-1"),
                version: Version::new(1, 0, 0),
            }
        );
    }

    #[test]
    fn test_publish_rejects_null_setup() {
        let mut repo = PluginRepo::new("repo");
        assert_eq!(
            repo.publish(Version::new(1, 0, 0), Address::zero(), Arc::new(Empty)),
            Err(RepoError::NullSetup)
        );
    }

    #[test]
    fn test_registry_resolution_errors() {
        let mut registry = PluginRepoRegistry::new();
        registry.register(repo_with(&[("1.0.0", "setup-1")])).unwrap();

        assert!(matches!(
            registry.resolve(&Address::new("other"), &Address::new("setup-1")),
            Err(SetupError::UnknownPluginRepo(_))
        ));
        assert!(matches!(
            registry.resolve(&Address::new("repo"), &Address::new("setup-9")),
            Err(SetupError::UnknownPluginVersion { .. })
        ));
        let resolved = registry
            .resolve(&Address::new("repo"), &Address::new("setup-1"))
            .unwrap();
        assert_eq!(resolved.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_registry_rejects_duplicate_repo() {
        let mut registry = PluginRepoRegistry::new();
        registry.register(PluginRepo::new("repo")).unwrap();

        assert_eq!(
            registry.register(PluginRepo::new("repo")),
            Err(RepoError::AlreadyRegistered(Address::new("repo")))
        );
    }
}
