//! Property tests for batch application

use charter_permissions::{
    assert_granted, Address, OperationKind, PermissionError, PermissionMatrix, PermissionOperation,
    PermissionState,
};
use proptest::prelude::*;

fn arb_name(prefix: &'static str) -> impl Strategy<Value = String> {
    (0u8..3).prop_map(move |i| format!("{}{}", prefix, i))
}

fn arb_kind() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Grant),
        Just(OperationKind::Revoke),
        Just(OperationKind::Freeze),
        Just(OperationKind::GrantWithOracle),
    ]
}

fn arb_operation() -> impl Strategy<Value = PermissionOperation> {
    (
        arb_kind(),
        arb_name("res"),
        arb_name("actor"),
        arb_name("oracle"),
        arb_name("CAP_"),
    )
        .prop_map(|(kind, resource, actor, oracle, capability)| match kind {
            OperationKind::Grant => PermissionOperation::grant(resource, actor, capability),
            OperationKind::Revoke => PermissionOperation::revoke(resource, actor, capability),
            OperationKind::Freeze => PermissionOperation::freeze(resource, actor, capability),
            OperationKind::GrantWithOracle => {
                PermissionOperation::grant_with_oracle(resource, actor, oracle, capability)
            }
        })
}

fn arb_non_freeze() -> impl Strategy<Value = PermissionOperation> {
    arb_operation().prop_filter("not a freeze", |op| op.kind != OperationKind::Freeze)
}

fn deployer() -> Address {
    Address::new("deployer")
}

proptest! {
    #[test]
    fn applying_a_batch_twice_is_idempotent(batch in prop::collection::vec(arb_operation(), 0..12)) {
        let mut matrix = PermissionMatrix::new("org");
        if matrix.apply_batch(&batch, &deployer()).is_ok() {
            let once = matrix.snapshot();
            // Any freeze in the batch now blocks the mutations in it
            let replay = matrix.apply_batch(&batch, &deployer());
            prop_assert_eq!(matrix.snapshot(), once);
            if batch.iter().all(|op| op.kind != OperationKind::Freeze) {
                prop_assert!(replay.is_ok());
            }
        }
    }

    #[test]
    fn rejected_batches_change_nothing(
        setup in prop::collection::vec(arb_operation(), 0..8),
        batch in prop::collection::vec(arb_operation(), 0..8),
    ) {
        let mut matrix = PermissionMatrix::new("org");
        let _ = matrix.apply_batch(&setup, &deployer());
        let before = matrix.snapshot();

        if matrix.apply_batch(&batch, &deployer()).is_err() {
            prop_assert_eq!(matrix.snapshot(), before);
        }
    }

    #[test]
    fn freeze_blocks_later_mutation_for_any_actor(
        freeze in arb_operation().prop_map(|op| PermissionOperation::freeze(op.resource, op.actor, op.capability)),
        later in arb_non_freeze(),
    ) {
        let mut matrix = PermissionMatrix::new("org");
        matrix.apply_batch(&[freeze.clone()], &deployer()).unwrap();

        let later = PermissionOperation {
            resource: freeze.resource.clone(),
            capability: freeze.capability.clone(),
            ..later
        };
        let is_frozen_error = matches!(
            matrix.apply_batch(&[later.clone()], &deployer()),
            Err(PermissionError::CapabilityFrozen { index: 0, .. })
        );
        prop_assert!(is_frozen_error);
        prop_assert_eq!(
            matrix.state(&later.resource, &later.actor, &later.capability),
            PermissionState::Frozen
        );
    }

    #[test]
    fn revoke_of_absent_entry_leaves_it_ungranted(revoke in arb_operation()) {
        let mut matrix = PermissionMatrix::new("org");
        let revoke = PermissionOperation::revoke(revoke.resource, revoke.actor, revoke.capability);

        prop_assert!(matrix.apply_batch(&[revoke.clone()], &deployer()).is_ok());
        prop_assert_eq!(
            matrix.state(&revoke.resource, &revoke.actor, &revoke.capability),
            PermissionState::Ungranted
        );
        prop_assert!(matrix.is_empty());
    }

    #[test]
    fn empty_expectation_list_always_passes(batch in prop::collection::vec(arb_operation(), 0..8)) {
        let mut matrix = PermissionMatrix::new("org");
        let _ = matrix.apply_batch(&batch, &deployer());
        prop_assert_eq!(assert_granted(&matrix, &[]), Ok(()));
    }
}
