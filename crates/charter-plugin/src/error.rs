//! Plugin setup errors

use crate::repository::RepoError;
use crate::setup::PluginError;
use crate::state::SetupState;
use charter_permissions::{Address, PermissionError, PermissionOperation};
use thiserror::Error;

/// Errors raised while preparing or applying a plugin setup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    /// Two operations on one key with different effects
    #[error("conflicting operations in setup batch: {first} and {second}")]
    ConflictingOperations {
        first: PermissionOperation,
        second: PermissionOperation,
    },

    #[error("malformed operation {operation}: {reason}")]
    MalformedOperation {
        operation: PermissionOperation,
        reason: String,
    },

    /// Setup logic returned a result the processor cannot use
    #[error("malformed setup result: {0}")]
    MalformedResult(String),

    #[error("unknown plugin repository: {0}")]
    UnknownPluginRepo(Address),

    #[error("setup {setup} is not published in repository {repo}")]
    UnknownPluginVersion { repo: Address, setup: Address },

    /// The prepared setup was already applied or aborted
    #[error("prepared setup is already {0}")]
    AlreadyFinalized(SetupState),

    #[error("prepared for organization {expected}, applied to {actual}")]
    OrganizationMismatch { expected: Address, actual: Address },

    #[error("setup logic {setup} failed: {source}")]
    SetupLogic {
        setup: Address,
        #[source]
        source: PluginError,
    },

    /// Plugin initialization after an update failed; the batch was rolled back
    #[error("initialization of plugin {plugin} failed: {source}")]
    InitializationFailed {
        plugin: Address,
        #[source]
        source: PluginError,
    },

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

pub type SetupResult<T> = Result<T, SetupError>;
