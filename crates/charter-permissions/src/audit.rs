//! Permission audit trail
//!
//! Structured record of every committed permission change, rejected batch,
//! oracle failure and plugin setup transition. The audit trail is a record
//! only; no operation reads its results back out of it.

use crate::address::Address;
use crate::capability::Capability;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Audit event types
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    PermissionGranted {
        resource: Address,
        actor: Address,
        capability: Capability,
        requested_by: Address,
    },
    PermissionGrantedWithOracle {
        resource: Address,
        actor: Address,
        capability: Capability,
        oracle: Address,
        requested_by: Address,
    },
    PermissionRevoked {
        resource: Address,
        actor: Address,
        capability: Capability,
        requested_by: Address,
    },
    /// Freeze is keyed by (resource, capability) only
    CapabilityFrozen {
        resource: Address,
        capability: Capability,
        requested_by: Address,
    },
    BatchRejected {
        organization: Address,
        requested_by: Address,
        reason: String,
    },
    /// A committed batch undone because its follow-up step failed
    BatchRolledBack {
        organization: Address,
        requested_by: Address,
        changes: usize,
        reason: String,
    },
    OracleEvaluationFailed {
        oracle: Address,
        resource: Address,
        actor: Address,
        capability: Capability,
        reason: String,
    },
    InstallationPrepared {
        organization: Address,
        plugin: Address,
        setup: Address,
        helpers: usize,
        operations: usize,
    },
    UpdatePrepared {
        organization: Address,
        plugin: Address,
        setup: Address,
        helpers: usize,
        operations: usize,
    },
    UninstallationPrepared {
        organization: Address,
        plugin: Address,
        setup: Address,
        operations: usize,
    },
    SetupApplied {
        organization: Address,
        plugin: Address,
    },
    SetupAborted {
        organization: Address,
        plugin: Address,
        reason: String,
    },
    VerificationFailed {
        resource: Address,
        actor: Address,
        capability: Capability,
        expected: bool,
        actual: bool,
    },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::PermissionGranted {
                resource,
                actor,
                capability,
                requested_by,
            } => write!(
                f,
                "Permission granted: {} on {} to {} (by {})",
                capability, resource, actor, requested_by
            ),
            AuditEvent::PermissionGrantedWithOracle {
                resource,
                actor,
                capability,
                oracle,
                requested_by,
            } => write!(
                f,
                "Permission granted: {} on {} to {} via oracle {} (by {})",
                capability, resource, actor, oracle, requested_by
            ),
            AuditEvent::PermissionRevoked {
                resource,
                actor,
                capability,
                requested_by,
            } => write!(
                f,
                "Permission revoked: {} on {} from {} (by {})",
                capability, resource, actor, requested_by
            ),
            AuditEvent::CapabilityFrozen {
                resource,
                capability,
                requested_by,
            } => write!(
                f,
                "Capability frozen: {} on {} (by {})",
                capability, resource, requested_by
            ),
            AuditEvent::BatchRejected {
                organization,
                requested_by,
                reason,
            } => write!(
                f,
                "Batch rejected for {} (by {}): {}",
                organization, requested_by, reason
            ),
            AuditEvent::BatchRolledBack {
                organization,
                requested_by,
                changes,
                reason,
            } => write!(
                f,
                "Batch rolled back for {} (by {}), {} change(s) undone: {}",
                organization, requested_by, changes, reason
            ),
            AuditEvent::OracleEvaluationFailed {
                oracle,
                resource,
                actor,
                capability,
                reason,
            } => write!(
                f,
                "Oracle {} failed for {} on {} for {}: {}",
                oracle, capability, resource, actor, reason
            ),
            AuditEvent::InstallationPrepared {
                organization,
                plugin,
                setup,
                helpers,
                operations,
            } => write!(
                f,
                "Installation prepared: plugin {} for {} via {} ({} helpers, {} operations)",
                plugin, organization, setup, helpers, operations
            ),
            AuditEvent::UpdatePrepared {
                organization,
                plugin,
                setup,
                helpers,
                operations,
            } => write!(
                f,
                "Update prepared: plugin {} for {} via {} ({} helpers, {} operations)",
                plugin, organization, setup, helpers, operations
            ),
            AuditEvent::UninstallationPrepared {
                organization,
                plugin,
                setup,
                operations,
            } => write!(
                f,
                "Uninstallation prepared: plugin {} for {} via {} ({} operations)",
                plugin, organization, setup, operations
            ),
            AuditEvent::SetupApplied {
                organization,
                plugin,
            } => write!(f, "Setup applied: plugin {} for {}", plugin, organization),
            AuditEvent::SetupAborted {
                organization,
                plugin,
                reason,
            } => write!(
                f,
                "Setup aborted: plugin {} for {}: {}",
                plugin, organization, reason
            ),
            AuditEvent::VerificationFailed {
                resource,
                actor,
                capability,
                expected,
                actual,
            } => write!(
                f,
                "Verification failed: {} on {} for {} (expected {}, actual {})",
                capability,
                resource,
                actor,
                grant_word(*expected),
                grant_word(*actual)
            ),
        }
    }
}

fn grant_word(granted: bool) -> &'static str {
    if granted {
        "granted"
    } else {
        "not granted"
    }
}

/// Audit log entry with timestamp
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Create a new audit entry with current timestamp
    pub fn new(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Format as log line
    pub fn to_log_line(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.event
        )
    }
}

/// Audit logger trait for customizable logging backends
pub trait AuditLogger: Send + Sync {
    /// Log an audit event
    fn log(&self, event: AuditEvent);

    /// Get all logged entries
    fn entries(&self) -> Vec<AuditEntry>;

    /// Clear all logged entries
    fn clear(&self);
}

/// In-memory audit logger
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLogger {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        // A poisoned log is still a readable log
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, event: AuditEvent) {
        self.lock().push(AuditEntry::new(event));
    }

    fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Null audit logger (no-op)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: AuditEvent) {}

    fn entries(&self) -> Vec<AuditEntry> {
        Vec::new()
    }

    fn clear(&self) {}
}
