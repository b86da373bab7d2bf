//! Well-formedness checks for setup-produced permission batches

use crate::error::{SetupError, SetupResult};
use charter_permissions::{OperationKind, PermissionKey, PermissionOperation};
use std::collections::HashMap;

/// Batch validator
pub struct Validator;

impl Validator {
    /// Validate a batch before it ever reaches the matrix.
    ///
    /// Operations are checked in order and the first problem is reported.
    pub fn validate(operations: &[PermissionOperation]) -> SetupResult<()> {
        let mut seen: HashMap<PermissionKey, &PermissionOperation> = HashMap::new();

        for operation in operations {
            Self::validate_operation(operation)?;

            match seen.get(&operation.key()) {
                Some(first) if first.conflicts_with(operation) => {
                    return Err(SetupError::ConflictingOperations {
                        first: (*first).clone(),
                        second: operation.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(operation.key(), operation);
                }
            }
        }

        Ok(())
    }

    /// Validate a single operation in isolation
    pub fn validate_operation(operation: &PermissionOperation) -> SetupResult<()> {
        let reason = if operation.resource.is_null() {
            Some("resource is null")
        } else if operation.capability.is_empty() {
            Some("capability is empty")
        } else if operation.kind == OperationKind::GrantWithOracle && operation.oracle_ref().is_none() {
            Some("oracle grant without an oracle")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SetupError::MalformedOperation {
                operation: operation.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}
