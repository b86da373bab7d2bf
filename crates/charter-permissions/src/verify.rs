//! Post-deployment verification
//!
//! Compares the matrix against an expected configuration and reports every
//! mismatch in one pass.

use crate::address::Address;
use crate::audit::AuditEvent;
use crate::capability::Capability;
use crate::matrix::PermissionMatrix;
use charter_config::ResolvedVerifyEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One expected grant (or expected absence, when `granted` is false)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub resource: Address,
    pub actor: Address,
    pub capability: Capability,
    pub granted: bool,
}

impl Expectation {
    pub fn granted(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self {
            resource: resource.into(),
            actor: actor.into(),
            capability: capability.into(),
            granted: true,
        }
    }

    pub fn absent(
        resource: impl Into<Address>,
        actor: impl Into<Address>,
        capability: impl Into<Capability>,
    ) -> Self {
        Self {
            granted: false,
            ..Self::granted(resource, actor, capability)
        }
    }
}

impl From<ResolvedVerifyEntry> for Expectation {
    fn from(entry: ResolvedVerifyEntry) -> Self {
        Self {
            resource: Address::new(entry.resource),
            actor: Address::new(entry.actor),
            capability: Capability::new(entry.capability),
            granted: entry.granted,
        }
    }
}

/// A mismatch between expected and actual matrix state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedExpectation {
    pub resource: Address,
    pub actor: Address,
    pub capability: Capability,
    pub expected: bool,
    pub actual: bool,
}

impl fmt::Display for FailedExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} for {}: expected {}, found {}",
            self.capability,
            self.resource,
            self.actor,
            if self.expected { "granted" } else { "not granted" },
            if self.actual { "granted" } else { "not granted" }
        )
    }
}

/// Result of checking a full expectation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub organization: Address,
    pub checked: usize,
    pub failures: Vec<FailedExpectation>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert into the pass/fail form
    pub fn into_result(self) -> Result<(), Vec<FailedExpectation>> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self.failures)
        }
    }

    /// JSON form for CI tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} expectations met",
            self.organization,
            self.checked - self.failures.len(),
            self.checked
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

/// Read-only probe asserting the matrix matches an expected configuration
pub struct VerificationProbe<'a> {
    matrix: &'a PermissionMatrix,
    context: Value,
}

impl<'a> VerificationProbe<'a> {
    pub fn new(matrix: &'a PermissionMatrix) -> Self {
        Self {
            matrix,
            context: Value::Null,
        }
    }

    /// Context passed to oracles of oracle-gated grants
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Check every expectation and collect all mismatches, in input order
    pub fn report(&self, expectations: &[Expectation]) -> VerificationReport {
        let audit = self.matrix.audit_logger();
        let mut failures = Vec::new();

        for expectation in expectations {
            let actual = self.matrix.check(
                &expectation.resource,
                &expectation.actor,
                &expectation.capability,
                &self.context,
            );
            if actual == expectation.granted {
                continue;
            }

            let failure = FailedExpectation {
                resource: expectation.resource.clone(),
                actor: expectation.actor.clone(),
                capability: expectation.capability.clone(),
                expected: expectation.granted,
                actual,
            };
            tracing::warn!(organization = %self.matrix.organization(), "{}", failure);
            audit.log(AuditEvent::VerificationFailed {
                resource: failure.resource.clone(),
                actor: failure.actor.clone(),
                capability: failure.capability.clone(),
                expected: failure.expected,
                actual: failure.actual,
            });
            failures.push(failure);
        }

        VerificationReport {
            organization: self.matrix.organization().clone(),
            checked: expectations.len(),
            failures,
        }
    }

    /// Ok when every expectation holds, otherwise every failed expectation
    pub fn assert_granted(&self, expectations: &[Expectation]) -> Result<(), Vec<FailedExpectation>> {
        self.report(expectations).into_result()
    }
}

/// Shorthand for a probe without oracle context
pub fn assert_granted(
    matrix: &PermissionMatrix,
    expectations: &[Expectation],
) -> Result<(), Vec<FailedExpectation>> {
    VerificationProbe::new(matrix).assert_granted(expectations)
}
