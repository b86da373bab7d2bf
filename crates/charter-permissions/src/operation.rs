//! Permission operations, keys and grant states

use crate::address::Address;
use crate::capability::Capability;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a requested mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Grant,
    Revoke,
    Freeze,
    GrantWithOracle,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Grant => "Grant",
            OperationKind::Revoke => "Revoke",
            OperationKind::Freeze => "Freeze",
            OperationKind::GrantWithOracle => "GrantWithOracle",
        };
        f.write_str(name)
    }
}

/// (resource, actor, capability) triple addressing one matrix entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    pub resource: Address,
    pub actor: Address,
    pub capability: Capability,
}

impl PermissionKey {
    pub fn new(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self {
            resource: resource.into(),
            actor: actor.into(),
            capability: capability.into(),
        }
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} for {}",
            self.capability, self.resource, self.actor
        )
    }
}

/// A requested mutation of the permission matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionOperation {
    pub kind: OperationKind,
    pub resource: Address,
    pub actor: Address,
    /// Only meaningful for `GrantWithOracle`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<Address>,
    pub capability: Capability,
}

impl PermissionOperation {
    pub fn grant(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self::plain(OperationKind::Grant, resource, actor, capability)
    }

    pub fn revoke(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self::plain(OperationKind::Revoke, resource, actor, capability)
    }

    pub fn freeze(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self::plain(OperationKind::Freeze, resource, actor, capability)
    }

    pub fn grant_with_oracle(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        oracle: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self {
            kind: OperationKind::GrantWithOracle,
            resource: resource.into(),
            actor: actor.into(),
            oracle: Some(oracle.into()),
            capability: capability.into(),
        }
    }

    fn plain(
        kind: OperationKind,
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self {
            kind,
            resource: resource.into(),
            actor: actor.into(),
            oracle: None,
            capability: capability.into(),
        }
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            resource: self.resource.clone(),
            actor: self.actor.clone(),
            capability: self.capability.clone(),
        }
    }

    /// Oracle reference if this is a usable `GrantWithOracle`
    pub fn oracle_ref(&self) -> Option<&Address> {
        self.oracle.as_ref().filter(|oracle| !oracle.is_null())
    }

    /// Whether two operations on the same key would have different effects.
    ///
    /// Operations on different keys never conflict; exact duplicates do not
    /// conflict either.
    pub fn conflicts_with(&self, other: &PermissionOperation) -> bool {
        if self.resource != other.resource
            || self.actor != other.actor
            || self.capability != other.capability
        {
            return false;
        }
        if self.kind != other.kind {
            return true;
        }
        self.kind == OperationKind::GrantWithOracle && self.oracle_ref() != other.oracle_ref()
    }
}

impl fmt::Display for PermissionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({} on {} for {}",
            self.kind, self.capability, self.resource, self.actor
        )?;
        if let Some(oracle) = &self.oracle {
            write!(f, " via oracle {}", oracle)?;
        }
        f.write_str(")")
    }
}

/// Grant state of one matrix entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "oracle", rename_all = "snake_case")]
pub enum PermissionState {
    Ungranted,
    Granted,
    GrantedWithOracle(Address),
    Frozen,
}

impl PermissionState {
    pub fn is_frozen(&self) -> bool {
        matches!(self, PermissionState::Frozen)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionState::Ungranted => f.write_str("ungranted"),
            PermissionState::Granted => f.write_str("granted"),
            PermissionState::GrantedWithOracle(oracle) => {
                write!(f, "granted with oracle {}", oracle)
            }
            PermissionState::Frozen => f.write_str("frozen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_and_revoke_on_same_key_conflict() {
        let grant = PermissionOperation::grant("dao", "plugin", "EXECUTE_PERMISSION");
        let revoke = PermissionOperation::revoke("dao", "plugin", "EXECUTE_PERMISSION");
        assert!(grant.conflicts_with(&revoke));
        assert!(revoke.conflicts_with(&grant));
    }

    #[test]
    fn test_duplicates_do_not_conflict() {
        let a = PermissionOperation::grant("dao", "plugin", "EXECUTE_PERMISSION");
        assert!(!a.conflicts_with(&a.clone()));
    }

    #[test]
    fn test_different_actor_does_not_conflict() {
        let a = PermissionOperation::grant("dao", "alice", "EXECUTE_PERMISSION");
        let b = PermissionOperation::revoke("dao", "bob", "EXECUTE_PERMISSION");
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_oracle_grants_with_different_oracles_conflict() {
        let a = PermissionOperation::grant_with_oracle("dao", "alice", "0x01", "EXECUTE_PERMISSION");
        let b = PermissionOperation::grant_with_oracle("dao", "alice", "0x02", "EXECUTE_PERMISSION");
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&a.clone()));
    }

    #[test]
    fn test_operation_display() {
        let op = PermissionOperation::grant_with_oracle("dao", "alice", "gate", "EXECUTE_PERMISSION");
        assert_eq!(
            op.to_string(),
            "GrantWithOracle(EXECUTE_PERMISSION on dao for alice via oracle gate)"
        );
    }
}
