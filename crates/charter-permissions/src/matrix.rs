//! Permission matrix
//!
//! Maps (resource, actor, capability) to a grant state for one organization.
//! All mutation goes through [`PermissionMatrix::apply_batch`] (or
//! [`PermissionMatrix::apply_batch_then`]), which validates the whole batch
//! against the current state before committing any of it. Mutation needs `&mut self`, so a reader holding `&self` can never
//! observe half of a batch; hosts that share a matrix across threads wrap it
//! in a lock and get single-writer serialization from that lock.

use crate::address::Address;
use crate::audit::{AuditEvent, AuditLogger, NullAuditLogger};
use crate::capability::Capability;
use crate::operation::{OperationKind, PermissionKey, PermissionOperation, PermissionState};
use crate::oracle::{OracleGate, OracleRequest, PermissionOracle};
use charter_config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Batch rejection errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PermissionError {
    /// Mutation of a capability locked on its resource
    #[error("operation #{index} rejected, capability is frozen: {operation}")]
    CapabilityFrozen {
        index: usize,
        operation: PermissionOperation,
    },

    #[error("operation #{index} rejected, no oracle given: {operation}")]
    MissingOracle {
        index: usize,
        operation: PermissionOperation,
    },
}

impl PermissionError {
    /// The operation that caused the rejection
    pub fn operation(&self) -> &PermissionOperation {
        match self {
            PermissionError::CapabilityFrozen { operation, .. }
            | PermissionError::MissingOracle { operation, .. } => operation,
        }
    }

    /// Position of the offending operation in its batch
    pub fn index(&self) -> usize {
        match self {
            PermissionError::CapabilityFrozen { index, .. }
            | PermissionError::MissingOracle { index, .. } => *index,
        }
    }
}

pub type PermissionResult<T> = Result<T, PermissionError>;

/// A live (non-frozen) grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    Unconditional,
    Oracle(Address),
}

/// Freeze is keyed by (resource, capability); the actor plays no part
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FreezeKey {
    pub resource: Address,
    pub capability: Capability,
}

impl FreezeKey {
    fn of(resource: &Address, capability: &Capability) -> Self {
        Self {
            resource: resource.clone(),
            capability: capability.clone(),
        }
    }
}

/// Ordered, comparable copy of the matrix contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatrixSnapshot {
    pub grants: BTreeMap<PermissionKey, Grant>,
    pub frozen: BTreeSet<FreezeKey>,
}

/// One effective change produced by staging a batch
#[derive(Debug, Clone, PartialEq)]
enum Change {
    Set(PermissionKey, Grant),
    Remove(PermissionKey),
    Freeze(FreezeKey),
}

/// Inverse of one committed change
#[derive(Debug, Clone, PartialEq)]
enum Undo {
    Restore(PermissionKey, Option<Grant>),
    Unfreeze(FreezeKey),
}

/// Result of a dry run: the effective changes a batch would make
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBatch {
    changes: Vec<Change>,
}

impl StagedBatch {
    /// Number of operations that will change state (no-ops excluded)
    pub fn effective_changes(&self) -> usize {
        self.changes.len()
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Permission matrix owned by one organization
#[derive(Clone)]
pub struct PermissionMatrix {
    organization: Address,
    grants: BTreeMap<PermissionKey, Grant>,
    frozen: BTreeSet<FreezeKey>,
    gate: OracleGate,
    audit_logger: Arc<dyn AuditLogger>,
}

impl fmt::Debug for PermissionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionMatrix")
            .field("organization", &self.organization)
            .field("grants", &self.grants)
            .field("frozen", &self.frozen)
            .field("gate", &self.gate)
            .finish()
    }
}

impl PermissionMatrix {
    /// Empty matrix with the default oracle gate and no audit trail
    pub fn new(organization: impl Into<Address>) -> Self {
        Self {
            organization: organization.into(),
            grants: BTreeMap::new(),
            frozen: BTreeSet::new(),
            gate: OracleGate::default(),
            audit_logger: Arc::new(NullAuditLogger::new()),
        }
    }

    /// Empty matrix recording to the given audit logger
    pub fn with_audit_logger(organization: impl Into<Address>, logger: Arc<dyn AuditLogger>) -> Self {
        Self {
            audit_logger: logger,
            ..Self::new(organization)
        }
    }

    /// Create from configuration
    ///
    /// Uses the configured organization, oracle timeout and audit setting.
    /// An enabled audit trail is kept in a [`crate::MemoryAuditLogger`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let organization = config
            .organization()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "organization.address".to_string(),
                reason: "an organization address is required".to_string(),
            })?;

        let logger: Arc<dyn AuditLogger> = if config.audit_enabled() {
            Arc::new(crate::audit::MemoryAuditLogger::new())
        } else {
            Arc::new(NullAuditLogger::new())
        };

        let mut matrix = Self::with_audit_logger(organization, logger);
        matrix.gate = OracleGate::new(config.oracle_timeout());
        Ok(matrix)
    }

    pub fn organization(&self) -> &Address {
        &self.organization
    }

    pub fn oracle_gate(&self) -> &OracleGate {
        &self.gate
    }

    pub fn oracle_gate_mut(&mut self) -> &mut OracleGate {
        &mut self.gate
    }

    /// Register an oracle that `GrantWithOracle` operations may reference
    pub fn register_oracle(&mut self, address: impl Into<Address>, oracle: Arc<dyn PermissionOracle>) {
        self.gate.register(address, oracle);
    }

    pub fn audit_logger(&self) -> Arc<dyn AuditLogger> {
        Arc::clone(&self.audit_logger)
    }

    // Queries

    /// Current state of one entry
    pub fn state(&self, resource: &Address, actor: &Address, capability: &Capability) -> PermissionState {
        if self.is_frozen(resource, capability) {
            return PermissionState::Frozen;
        }
        let key = PermissionKey {
            resource: resource.clone(),
            actor: actor.clone(),
            capability: capability.clone(),
        };
        match self.grants.get(&key) {
            None => PermissionState::Ungranted,
            Some(Grant::Unconditional) => PermissionState::Granted,
            Some(Grant::Oracle(oracle)) => PermissionState::GrantedWithOracle(oracle.clone()),
        }
    }

    pub fn is_frozen(&self, resource: &Address, capability: &Capability) -> bool {
        self.frozen.contains(&FreezeKey::of(resource, capability))
    }

    /// Whether `actor` currently holds `capability` on `resource`.
    ///
    /// Frozen capabilities are allowed for every actor. Oracle-gated grants
    /// consult the oracle with `context`; any oracle failure is a denial.
    pub fn check(
        &self,
        resource: &Address,
        actor: &Address,
        capability: &Capability,
        context: &Value,
    ) -> bool {
        match self.state(resource, actor, capability) {
            PermissionState::Ungranted => false,
            PermissionState::Granted | PermissionState::Frozen => true,
            PermissionState::GrantedWithOracle(oracle) => {
                let request = OracleRequest {
                    resource: resource.clone(),
                    actor: actor.clone(),
                    capability: capability.clone(),
                    context: context.clone(),
                };
                match self.gate.try_evaluate(&oracle, &request) {
                    Ok(granted) => granted,
                    Err(err) => {
                        tracing::warn!(
                            organization = %self.organization,
                            oracle = %oracle,
                            resource = %resource,
                            actor = %actor,
                            capability = %capability,
                            error = %err,
                            "oracle evaluation failed, treating as not granted"
                        );
                        self.audit_logger.log(AuditEvent::OracleEvaluationFailed {
                            oracle,
                            resource: resource.clone(),
                            actor: actor.clone(),
                            capability: capability.clone(),
                            reason: err.to_string(),
                        });
                        false
                    }
                }
            }
        }
    }

    /// Number of live grants plus frozen capabilities
    pub fn len(&self) -> usize {
        self.grants.len() + self.frozen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.frozen.is_empty()
    }

    pub fn snapshot(&self) -> MatrixSnapshot {
        MatrixSnapshot {
            grants: self.grants.clone(),
            frozen: self.frozen.clone(),
        }
    }

    // Mutation

    /// Validate a batch against the current state without changing anything.
    ///
    /// Operations are replayed in order on an overlay, so later operations
    /// see the effect of earlier ones (a freeze followed by a grant on the
    /// same capability is rejected). The first failing operation is reported.
    pub fn stage(&self, operations: &[PermissionOperation]) -> PermissionResult<StagedBatch> {
        let mut grants: BTreeMap<PermissionKey, Option<Grant>> = BTreeMap::new();
        let mut frozen: BTreeSet<FreezeKey> = BTreeSet::new();
        let mut changes = Vec::new();

        for (index, operation) in operations.iter().enumerate() {
            let freeze_key = FreezeKey::of(&operation.resource, &operation.capability);
            let is_frozen = frozen.contains(&freeze_key) || self.frozen.contains(&freeze_key);
            let key = operation.key();
            let current = match grants.get(&key) {
                Some(staged) => staged.clone(),
                None => self.grants.get(&key).cloned(),
            };

            let next = match operation.kind {
                OperationKind::Freeze => {
                    if !is_frozen {
                        frozen.insert(freeze_key.clone());
                        changes.push(Change::Freeze(freeze_key));
                    }
                    continue;
                }
                _ if is_frozen => {
                    return Err(PermissionError::CapabilityFrozen {
                        index,
                        operation: operation.clone(),
                    })
                }
                OperationKind::Grant => Some(Grant::Unconditional),
                OperationKind::GrantWithOracle => match operation.oracle_ref() {
                    Some(oracle) => Some(Grant::Oracle(oracle.clone())),
                    None => {
                        return Err(PermissionError::MissingOracle {
                            index,
                            operation: operation.clone(),
                        })
                    }
                },
                OperationKind::Revoke => None,
            };

            if current == next {
                continue;
            }

            changes.push(match &next {
                Some(grant) => Change::Set(key.clone(), grant.clone()),
                None => Change::Remove(key.clone()),
            });
            grants.insert(key, next);
        }

        Ok(StagedBatch { changes })
    }

    /// Commit a batch staged against the current state, returning its inverse
    fn commit(&mut self, staged: StagedBatch, requested_by: &Address) -> Vec<Undo> {
        let mut undo = Vec::with_capacity(staged.changes.len());
        for change in staged.changes {
            match change {
                Change::Set(key, grant) => {
                    tracing::debug!(organization = %self.organization, key = %key, ?grant, "grant committed");
                    self.audit_logger.log(match &grant {
                        Grant::Unconditional => AuditEvent::PermissionGranted {
                            resource: key.resource.clone(),
                            actor: key.actor.clone(),
                            capability: key.capability.clone(),
                            requested_by: requested_by.clone(),
                        },
                        Grant::Oracle(oracle) => AuditEvent::PermissionGrantedWithOracle {
                            resource: key.resource.clone(),
                            actor: key.actor.clone(),
                            capability: key.capability.clone(),
                            oracle: oracle.clone(),
                            requested_by: requested_by.clone(),
                        },
                    });
                    let previous = self.grants.insert(key.clone(), grant);
                    undo.push(Undo::Restore(key, previous));
                }
                Change::Remove(key) => {
                    tracing::debug!(organization = %self.organization, key = %key, "revoke committed");
                    self.audit_logger.log(AuditEvent::PermissionRevoked {
                        resource: key.resource.clone(),
                        actor: key.actor.clone(),
                        capability: key.capability.clone(),
                        requested_by: requested_by.clone(),
                    });
                    let previous = self.grants.remove(&key);
                    undo.push(Undo::Restore(key, previous));
                }
                Change::Freeze(key) => {
                    tracing::debug!(
                        organization = %self.organization,
                        resource = %key.resource,
                        capability = %key.capability,
                        "freeze committed"
                    );
                    self.audit_logger.log(AuditEvent::CapabilityFrozen {
                        resource: key.resource.clone(),
                        capability: key.capability.clone(),
                        requested_by: requested_by.clone(),
                    });
                    self.frozen.insert(key.clone());
                    undo.push(Undo::Unfreeze(key));
                }
            }
        }
        undo
    }

    /// Undo exactly the changes of one commit, newest first
    fn rollback(&mut self, undo: Vec<Undo>, requested_by: &Address, reason: &str) {
        let changes = undo.len();
        for step in undo.into_iter().rev() {
            match step {
                Undo::Restore(key, Some(grant)) => {
                    self.grants.insert(key, grant);
                }
                Undo::Restore(key, None) => {
                    self.grants.remove(&key);
                }
                Undo::Unfreeze(key) => {
                    self.frozen.remove(&key);
                }
            }
        }

        tracing::warn!(organization = %self.organization, changes, reason, "permission batch rolled back");
        self.audit_logger.log(AuditEvent::BatchRolledBack {
            organization: self.organization.clone(),
            requested_by: requested_by.clone(),
            changes,
            reason: reason.to_string(),
        });
    }

    /// Apply a batch atomically: either every operation takes effect or none.
    ///
    /// Authorization of `requested_by` is the caller's concern; it is only
    /// recorded in the audit trail.
    pub fn apply_batch(
        &mut self,
        operations: &[PermissionOperation],
        requested_by: &Address,
    ) -> PermissionResult<()> {
        self.commit_checked(operations, requested_by).map(|_| ())
    }

    /// Apply a batch, then run `then` against the updated matrix.
    ///
    /// A rejected batch is returned as the outer error and `then` never runs.
    /// If `then` fails, the changes this batch made are undone and the
    /// failure is returned as the inner error. Only freezes committed by this
    /// batch are lifted by the undo.
    pub fn apply_batch_then<E, F>(
        &mut self,
        operations: &[PermissionOperation],
        requested_by: &Address,
        then: F,
    ) -> PermissionResult<Result<(), E>>
    where
        E: fmt::Display,
        F: FnOnce(&Self) -> Result<(), E>,
    {
        let undo = self.commit_checked(operations, requested_by)?;
        match then(self) {
            Ok(()) => Ok(Ok(())),
            Err(err) => {
                self.rollback(undo, requested_by, &err.to_string());
                Ok(Err(err))
            }
        }
    }

    fn commit_checked(
        &mut self,
        operations: &[PermissionOperation],
        requested_by: &Address,
    ) -> PermissionResult<Vec<Undo>> {
        let staged = match self.stage(operations) {
            Ok(staged) => staged,
            Err(err) => {
                tracing::warn!(organization = %self.organization, error = %err, "permission batch rejected");
                self.audit_logger.log(AuditEvent::BatchRejected {
                    organization: self.organization.clone(),
                    requested_by: requested_by.clone(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        tracing::debug!(
            organization = %self.organization,
            operations = operations.len(),
            effective = staged.effective_changes(),
            "applying permission batch"
        );
        Ok(self.commit(staged, requested_by))
    }

    pub fn grant(
        &mut self,
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
        requested_by: &Address,
    ) -> PermissionResult<()> {
        self.apply_batch(
            &[PermissionOperation::grant(resource, actor, capability)],
            requested_by,
        )
    }

    pub fn grant_with_oracle(
        &mut self,
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        oracle: impl Into<Address>,
        capability: impl Into<Capability>,
        requested_by: &Address,
    ) -> PermissionResult<()> {
        self.apply_batch(
            &[PermissionOperation::grant_with_oracle(resource, actor, oracle, capability)],
            requested_by,
        )
    }

    pub fn revoke(
        &mut self,
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
        requested_by: &Address,
    ) -> PermissionResult<()> {
        self.apply_batch(
            &[PermissionOperation::revoke(resource, actor, capability)],
            requested_by,
        )
    }

    pub fn freeze(
        &mut self,
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
        requested_by: &Address,
    ) -> PermissionResult<()> {
        self.apply_batch(
            &[PermissionOperation::freeze(resource, actor, capability)],
            requested_by,
        )
    }
}
