//! Charter permission matrix
//!
//! An organization-owned matrix of (resource, actor, capability) grants with
//! atomic batch mutation, irreversible freezes, oracle-gated conditional
//! grants and a read-only verification probe.
//!
//! # Example
//!
//! ```
//! use charter_permissions::{assert_granted, Address, Expectation, PermissionMatrix, PermissionOperation};
//!
//! let deployer = Address::new("deployer");
//! let mut matrix = PermissionMatrix::new("orgA");
//! matrix
//!     .apply_batch(
//!         &[
//!             PermissionOperation::grant("orgA", "alice", "ROOT_PERMISSION"),
//!             PermissionOperation::freeze("orgA", "alice", "UPGRADE_DAO_PERMISSION"),
//!         ],
//!         &deployer,
//!     )
//!     .unwrap();
//!
//! assert!(assert_granted(&matrix, &[Expectation::granted("orgA", "alice", "ROOT_PERMISSION")]).is_ok());
//! ```

pub mod address;
pub mod audit;
pub mod capability;
pub mod matrix;
pub mod operation;
pub mod oracle;
pub mod presets;
pub mod verify;

pub use address::{Address, ZERO_ADDRESS};
pub use audit::{AuditEntry, AuditEvent, AuditLogger, MemoryAuditLogger, NullAuditLogger};
pub use capability::{
    Capability, EXECUTE_PERMISSION, REGISTER_DAO_PERMISSION, REGISTER_ENS_SUBDOMAIN_PERMISSION,
    REGISTER_PLUGIN_REPO_PERMISSION, REGISTER_STANDARD_CALLBACK_PERMISSION, ROOT_PERMISSION,
    SET_METADATA_PERMISSION, SET_SIGNATURE_VALIDATOR_PERMISSION, SET_TRUSTED_FORWARDER_PERMISSION,
    UPGRADE_DAO_PERMISSION,
};
pub use matrix::{
    FreezeKey, Grant, MatrixSnapshot, PermissionError, PermissionMatrix, PermissionResult,
    StagedBatch,
};
pub use operation::{OperationKind, PermissionKey, PermissionOperation, PermissionState};
pub use oracle::{OracleError, OracleGate, OracleRequest, PermissionOracle, DEFAULT_ORACLE_TIMEOUT};
pub use presets::{
    configured_expectations, framework_expectations, managing_dao_expectations, FrameworkAddresses,
};
pub use verify::{assert_granted, Expectation, FailedExpectation, VerificationProbe, VerificationReport};
