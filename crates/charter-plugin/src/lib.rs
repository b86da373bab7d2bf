//! Charter plugin setup
//!
//! Two-phase installation, update and uninstallation of plugins. Setup logic
//! published in a versioned repository is asked what permission changes a
//! plugin needs; the processor validates that batch, hands back a single-use
//! [`PreparedSetup`], and commits the batch to the organization's
//! [`PermissionMatrix`](charter_permissions::PermissionMatrix) only when the
//! prepared setup is applied.

pub mod error;
pub mod prepared;
pub mod processor;
pub mod repository;
pub mod setup;
pub mod state;
pub mod validate;

pub use error::{SetupError, SetupResult};
pub use prepared::{Preparation, PreparedSetup};
pub use processor::{SetupProcessor, UpdateParams};
pub use repository::{
    PluginRepo, PluginRepoRegistry, PluginSetupRepository, Release, RepoError, ResolvedSetup,
};
pub use setup::{
    NoopInvoker, PluginError, PluginInvoker, PluginSetup, PluginSetupResult, PluginUpdate,
    UpdateContext, UpdatePreparation,
};
pub use state::{SetupKind, SetupState};
pub use validate::Validator;
