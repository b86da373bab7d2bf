//! Two-phase plugin setup processor
//!
//! Prepare calls resolve setup logic, run it, validate the resulting batch
//! and dry-run it against the matrix. Nothing is committed until
//! [`SetupProcessor::apply_prepared`] hands the batch to
//! [`PermissionMatrix::apply_batch`].

use crate::error::{SetupError, SetupResult};
use crate::prepared::{Preparation, PreparedSetup};
use crate::repository::PluginSetupRepository;
use crate::setup::{NoopInvoker, PluginInvoker, PluginSetupResult, UpdateContext, UpdatePreparation};
use crate::state::SetupState;
use crate::validate::Validator;
use charter_permissions::{Address, AuditEvent, PermissionMatrix};
use std::sync::Arc;

/// Where an installed plugin comes from and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParams {
    pub plugin: Address,
    pub repo: Address,
    pub current_setup: Address,
    pub new_setup: Address,
}

/// Orchestrates prepare and apply for plugin setups
pub struct SetupProcessor<R> {
    address: Address,
    repository: R,
    invoker: Arc<dyn PluginInvoker>,
}

impl<R: PluginSetupRepository> SetupProcessor<R> {
    /// `address` is recorded as the requester of every applied batch
    pub fn new(address: impl Into<Address>, repository: R) -> Self {
        Self {
            address: address.into(),
            repository,
            invoker: Arc::new(NoopInvoker),
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn PluginInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// Prepare installing the plugin published as `setup` in `repo`
    pub fn prepare_installation(
        &self,
        matrix: &PermissionMatrix,
        setup: &Address,
        repo: &Address,
        payload: &[u8],
    ) -> SetupResult<PreparedSetup> {
        let organization = matrix.organization();
        let resolved = self.repository.resolve(repo, setup)?;

        let result = resolved
            .logic
            .prepare_installation(organization, payload)
            .map_err(|source| SetupError::SetupLogic {
                setup: setup.clone(),
                source,
            })?;
        if result.plugin.is_null() {
            return Err(SetupError::MalformedResult(format!(
                "setup {} returned a null plugin address",
                setup
            )));
        }
        self.check_batch(matrix, &result)?;

        tracing::info!(
            organization = %organization,
            plugin = %result.plugin,
            %setup,
            version = %resolved.version,
            operations = result.permissions.len(),
            "installation prepared"
        );
        matrix.audit_logger().log(AuditEvent::InstallationPrepared {
            organization: organization.clone(),
            plugin: result.plugin.clone(),
            setup: setup.clone(),
            helpers: result.helpers.len(),
            operations: result.permissions.len(),
        });

        Ok(PreparedSetup::new(
            organization.clone(),
            repo.clone(),
            setup.clone(),
            resolved.version,
            Preparation::Installation(result),
        ))
    }

    /// Prepare moving an installed plugin from one published setup to another.
    ///
    /// Both setups must be published in the same repository. The returned
    /// helper list is the full new set.
    pub fn prepare_update(
        &self,
        matrix: &PermissionMatrix,
        params: &UpdateParams,
        current_helpers: &[Address],
        payload: &[u8],
    ) -> SetupResult<PreparedSetup> {
        let organization = matrix.organization();
        if params.plugin.is_null() {
            return Err(SetupError::InvalidUpdate("plugin address is null".to_string()));
        }
        if params.current_setup == params.new_setup {
            return Err(SetupError::InvalidUpdate(format!(
                "plugin {} is already on setup {}",
                params.plugin, params.new_setup
            )));
        }

        let current = self.repository.resolve(&params.repo, &params.current_setup)?;
        let new = self.repository.resolve(&params.repo, &params.new_setup)?;

        let context = UpdateContext {
            plugin: &params.plugin,
            current_version: &current.version,
            current_helpers,
        };
        let update = new
            .logic
            .prepare_update(organization, &context, payload)
            .map_err(|source| SetupError::SetupLogic {
                setup: params.new_setup.clone(),
                source,
            })?;

        let preparation = UpdatePreparation {
            result: PluginSetupResult {
                plugin: params.plugin.clone(),
                helpers: update.helpers,
                permissions: update.permissions,
            },
            current_helpers: current_helpers.to_vec(),
            init_data: update.init_data,
        };
        self.check_batch(matrix, &preparation.result)?;

        tracing::info!(
            organization = %organization,
            plugin = %params.plugin,
            from = %current.version,
            to = %new.version,
            operations = preparation.result.permissions.len(),
            "update prepared"
        );
        matrix.audit_logger().log(AuditEvent::UpdatePrepared {
            organization: organization.clone(),
            plugin: params.plugin.clone(),
            setup: params.new_setup.clone(),
            helpers: preparation.result.helpers.len(),
            operations: preparation.result.permissions.len(),
        });

        Ok(PreparedSetup::new(
            organization.clone(),
            params.repo.clone(),
            params.new_setup.clone(),
            new.version,
            Preparation::Update(preparation),
        ))
    }

    /// Prepare removing an installed plugin
    pub fn prepare_uninstallation(
        &self,
        matrix: &PermissionMatrix,
        plugin: &Address,
        setup: &Address,
        repo: &Address,
        current_helpers: &[Address],
        payload: &[u8],
    ) -> SetupResult<PreparedSetup> {
        let organization = matrix.organization();
        let resolved = self.repository.resolve(repo, setup)?;

        let permissions = resolved
            .logic
            .prepare_uninstallation(organization, plugin, current_helpers, payload)
            .map_err(|source| SetupError::SetupLogic {
                setup: setup.clone(),
                source,
            })?;
        let result = PluginSetupResult {
            plugin: plugin.clone(),
            helpers: current_helpers.to_vec(),
            permissions,
        };
        self.check_batch(matrix, &result)?;

        tracing::info!(
            organization = %organization,
            %plugin,
            %setup,
            operations = result.permissions.len(),
            "uninstallation prepared"
        );
        matrix.audit_logger().log(AuditEvent::UninstallationPrepared {
            organization: organization.clone(),
            plugin: plugin.clone(),
            setup: setup.clone(),
            operations: result.permissions.len(),
        });

        Ok(PreparedSetup::new(
            organization.clone(),
            repo.clone(),
            setup.clone(),
            resolved.version,
            Preparation::Uninstallation(result),
        ))
    }

    /// Commit a prepared batch.
    ///
    /// A matrix rejection aborts the setup and is returned unchanged. For
    /// updates carrying init data the plugin is invoked after the commit; if
    /// that fails the changes of this batch are rolled back and the setup is
    /// aborted.
    pub fn apply_prepared(&self, matrix: &mut PermissionMatrix, prepared: &mut PreparedSetup) -> SetupResult<()> {
        if prepared.state().is_terminal() {
            return Err(SetupError::AlreadyFinalized(prepared.state()));
        }
        if matrix.organization() != prepared.organization() {
            return Err(SetupError::OrganizationMismatch {
                expected: prepared.organization().clone(),
                actual: matrix.organization().clone(),
            });
        }

        let applied = matrix.apply_batch_then(prepared.permissions(), &self.address, |_| {
            match prepared.init_data() {
                Some(init_data) => self
                    .invoker
                    .invoke(prepared.organization(), prepared.plugin(), init_data),
                None => Ok(()),
            }
        });

        match applied {
            Err(err) => {
                self.finish_aborted(matrix, prepared, &err.to_string());
                return Err(err.into());
            }
            Ok(Err(source)) => {
                self.finish_aborted(matrix, prepared, &source.to_string());
                return Err(SetupError::InitializationFailed {
                    plugin: prepared.plugin().clone(),
                    source,
                });
            }
            Ok(Ok(())) => {}
        }

        prepared.set_state(SetupState::Applied);
        tracing::info!(
            organization = %prepared.organization(),
            plugin = %prepared.plugin(),
            kind = %prepared.kind(),
            "setup applied"
        );
        matrix.audit_logger().log(AuditEvent::SetupApplied {
            organization: prepared.organization().clone(),
            plugin: prepared.plugin().clone(),
        });
        Ok(())
    }

    /// Operator abort of a prepared setup that has not been applied
    pub fn abort(&self, matrix: &PermissionMatrix, prepared: &mut PreparedSetup, reason: &str) -> SetupResult<()> {
        if prepared.state().is_terminal() {
            return Err(SetupError::AlreadyFinalized(prepared.state()));
        }
        self.finish_aborted(matrix, prepared, reason);
        Ok(())
    }

    fn finish_aborted(&self, matrix: &PermissionMatrix, prepared: &mut PreparedSetup, reason: &str) {
        prepared.set_state(SetupState::Aborted);
        tracing::warn!(
            organization = %prepared.organization(),
            plugin = %prepared.plugin(),
            kind = %prepared.kind(),
            reason,
            "setup aborted"
        );
        matrix.audit_logger().log(AuditEvent::SetupAborted {
            organization: prepared.organization().clone(),
            plugin: prepared.plugin().clone(),
            reason: reason.to_string(),
        });
    }

    /// Well-formedness first, then a dry run against current matrix state
    fn check_batch(&self, matrix: &PermissionMatrix, result: &PluginSetupResult) -> SetupResult<()> {
        Validator::validate(&result.permissions)?;
        matrix.stage(&result.permissions)?;
        Ok(())
    }
}
