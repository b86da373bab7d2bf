//! Single-use handle returned by every prepare call

use crate::setup::{PluginSetupResult, UpdatePreparation};
use crate::state::{SetupKind, SetupState};
use charter_permissions::{Address, PermissionOperation};
use semver::Version;

/// What a prepare call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    Installation(PluginSetupResult),
    Update(UpdatePreparation),
    /// Helpers are the ones in place before uninstalling
    Uninstallation(PluginSetupResult),
}

impl Preparation {
    pub fn kind(&self) -> SetupKind {
        match self {
            Preparation::Installation(_) => SetupKind::Installation,
            Preparation::Update(_) => SetupKind::Update,
            Preparation::Uninstallation(_) => SetupKind::Uninstallation,
        }
    }

    pub fn result(&self) -> &PluginSetupResult {
        match self {
            Preparation::Installation(result) | Preparation::Uninstallation(result) => result,
            Preparation::Update(update) => &update.result,
        }
    }
}

/// A prepared installation, update or uninstallation.
///
/// The handle is not `Clone`: it is consumed by exactly one apply or abort,
/// after which it only reports its terminal state.
#[derive(Debug, PartialEq, Eq)]
pub struct PreparedSetup {
    organization: Address,
    repo: Address,
    setup: Address,
    version: Version,
    preparation: Preparation,
    state: SetupState,
}

impl PreparedSetup {
    pub(crate) fn new(
        organization: Address,
        repo: Address,
        setup: Address,
        version: Version,
        preparation: Preparation,
    ) -> Self {
        Self {
            organization,
            repo,
            setup,
            version,
            preparation,
            state: SetupState::Prepared,
        }
    }

    pub fn kind(&self) -> SetupKind {
        self.preparation.kind()
    }

    pub fn state(&self) -> SetupState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SetupState) {
        self.state = state;
    }

    pub fn organization(&self) -> &Address {
        &self.organization
    }

    pub fn repo(&self) -> &Address {
        &self.repo
    }

    /// Setup logic the preparation came from
    pub fn setup(&self) -> &Address {
        &self.setup
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn preparation(&self) -> &Preparation {
        &self.preparation
    }

    pub fn result(&self) -> &PluginSetupResult {
        self.preparation.result()
    }

    pub fn plugin(&self) -> &Address {
        &self.result().plugin
    }

    pub fn helpers(&self) -> &[Address] {
        &self.result().helpers
    }

    pub fn permissions(&self) -> &[PermissionOperation] {
        &self.result().permissions
    }

    /// Init payload of an update, if any
    pub fn init_data(&self) -> Option<&[u8]> {
        match &self.preparation {
            Preparation::Update(update) => update.init_data.as_deref(),
            _ => None,
        }
    }
}
