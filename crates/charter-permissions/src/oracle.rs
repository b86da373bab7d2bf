//! Oracle-gated grants
//!
//! A `GrantWithOracle` entry is only active while its oracle says so. The
//! [`OracleGate`] owns the registry of oracles and evaluates them with a
//! bounded wait. Any failure (unknown oracle, error, timeout, panic) counts
//! as "not granted".
//!
//! A timed-out evaluation keeps running on its worker thread. Until it
//! returns, that oracle is reported busy instead of being evaluated again,
//! so a hung oracle holds at most one thread.

use crate::address::Address;
use crate::capability::Capability;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Default bound on one oracle evaluation
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_millis(250);

/// Oracle evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("no oracle registered at {0}")]
    NotRegistered(Address),

    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle {0} is still busy with a timed-out evaluation")]
    Busy(Address),

    #[error("oracle panicked")]
    Panicked,

    #[error("oracle failed: {0}")]
    Failed(String),
}

/// What an oracle is asked to decide
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub resource: Address,
    pub actor: Address,
    pub capability: Capability,
    /// Caller-supplied data, opaque to the matrix
    pub context: Value,
}

/// External predicate gating a conditional grant
pub trait PermissionOracle: Send + Sync {
    fn is_granted(&self, request: &OracleRequest) -> Result<bool, OracleError>;
}

impl<F> PermissionOracle for F
where
    F: Fn(&OracleRequest) -> Result<bool, OracleError> + Send + Sync,
{
    fn is_granted(&self, request: &OracleRequest) -> Result<bool, OracleError> {
        self(request)
    }
}

/// Registry and evaluator of permission oracles
#[derive(Clone)]
pub struct OracleGate {
    oracles: HashMap<Address, Arc<dyn PermissionOracle>>,
    timeout: Duration,
    in_flight: Arc<Mutex<HashSet<Address>>>,
}

/// Marks an oracle as in flight until its worker finishes or unwinds
struct InFlight {
    oracle: Address,
    set: Arc<Mutex<HashSet<Address>>>,
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<HashSet<Address>>>, oracle: &Address) -> Option<Self> {
        if !lock(set).insert(oracle.clone()) {
            return None;
        }
        Some(Self {
            oracle: oracle.clone(),
            set: Arc::clone(set),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.oracle);
    }
}

fn lock(set: &Mutex<HashSet<Address>>) -> MutexGuard<'_, HashSet<Address>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for OracleGate {
    fn default() -> Self {
        Self::new(DEFAULT_ORACLE_TIMEOUT)
    }
}

impl fmt::Debug for OracleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&Address> = self.oracles.keys().collect();
        registered.sort();
        f.debug_struct("OracleGate")
            .field("oracles", &registered)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OracleGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            oracles: HashMap::new(),
            timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register (or replace) the oracle reachable at `address`
    pub fn register(&mut self, address: impl Into<Address>, oracle: Arc<dyn PermissionOracle>) {
        self.oracles.insert(address.into(), oracle);
    }

    pub fn unregister(&mut self, address: &Address) -> bool {
        self.oracles.remove(address).is_some()
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.oracles.contains_key(address)
    }

    /// Evaluate an oracle, failing closed.
    ///
    /// Failures are logged and reported as `false`.
    pub fn evaluate(&self, oracle: &Address, request: &OracleRequest) -> bool {
        match self.try_evaluate(oracle, request) {
            Ok(granted) => granted,
            Err(err) => {
                tracing::warn!(
                    oracle = %oracle,
                    resource = %request.resource,
                    actor = %request.actor,
                    capability = %request.capability,
                    error = %err,
                    "oracle evaluation failed, treating as not granted"
                );
                false
            }
        }
    }

    /// Whether a timed-out evaluation of `oracle` is still running
    pub fn is_busy(&self, oracle: &Address) -> bool {
        lock(&self.in_flight).contains(oracle)
    }

    /// Evaluate an oracle on a worker thread, waiting at most the gate timeout
    pub fn try_evaluate(&self, oracle: &Address, request: &OracleRequest) -> Result<bool, OracleError> {
        let handle = self
            .oracles
            .get(oracle)
            .cloned()
            .ok_or_else(|| OracleError::NotRegistered(oracle.clone()))?;

        let guard = InFlight::acquire(&self.in_flight, oracle)
            .ok_or_else(|| OracleError::Busy(oracle.clone()))?;

        let (tx, rx) = mpsc::sync_channel(1);
        let request = request.clone();
        thread::Builder::new()
            .name("charter-oracle".to_string())
            .spawn(move || {
                let result = {
                    let _in_flight = guard;
                    handle.is_granted(&request)
                };
                // Receiver may have timed out already
                let _ = tx.send(result);
            })
            .map_err(|e| OracleError::Failed(format!("could not spawn evaluator: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(OracleError::Timeout(self.timeout)),
            // Sender dropped without sending: the oracle panicked
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Panicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(context: Value) -> OracleRequest {
        OracleRequest {
            resource: Address::new("dao"),
            actor: Address::new("alice"),
            capability: Capability::new("EXECUTE_PERMISSION"),
            context,
        }
    }

    fn gate_with(oracle: Arc<dyn PermissionOracle>) -> OracleGate {
        let mut gate = OracleGate::new(Duration::from_millis(200));
        gate.register("oracle-1", oracle);
        gate
    }

    #[test]
    fn test_oracle_sees_context() {
        let gate = gate_with(Arc::new(|req: &OracleRequest| -> Result<bool, OracleError> {
            Ok(req.context["amount"].as_u64().unwrap_or(0) < 100)
        }));

        assert!(gate.evaluate(&Address::new("oracle-1"), &request(json!({ "amount": 5 }))));
        assert!(!gate.evaluate(&Address::new("oracle-1"), &request(json!({ "amount": 500 }))));
    }

    #[test]
    fn test_unregistered_oracle_fails_closed() {
        let gate = OracleGate::default();
        let oracle = Address::new("oracle-missing");

        assert_eq!(
            gate.try_evaluate(&oracle, &request(Value::Null)),
            Err(OracleError::NotRegistered(oracle.clone()))
        );
        assert!(!gate.evaluate(&oracle, &request(Value::Null)));
    }

    #[test]
    fn test_erroring_oracle_fails_closed() {
        let gate = gate_with(Arc::new(|_: &OracleRequest| -> Result<bool, OracleError> {
            Err(OracleError::Failed("unreachable".to_string()))
        }));

        assert!(!gate.evaluate(&Address::new("oracle-1"), &request(Value::Null)));
    }

    #[test]
    fn test_slow_oracle_times_out() {
        let mut gate = OracleGate::new(Duration::from_millis(20));
        gate.register(
            "oracle-slow",
            Arc::new(|_: &OracleRequest| -> Result<bool, OracleError> {
                thread::sleep(Duration::from_millis(500));
                Ok(true)
            }),
        );

        assert_eq!(
            gate.try_evaluate(&Address::new("oracle-slow"), &request(Value::Null)),
            Err(OracleError::Timeout(Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_hung_oracle_is_busy_until_it_returns() {
        let (release, hold) = mpsc::channel::<()>();
        let hold = Mutex::new(hold);
        let mut gate = OracleGate::new(Duration::from_millis(100));
        gate.register(
            "oracle-hung",
            Arc::new(move |_: &OracleRequest| -> Result<bool, OracleError> {
                let _ = hold.lock().unwrap().recv();
                Ok(true)
            }),
        );
        let oracle = Address::new("oracle-hung");

        assert_eq!(
            gate.try_evaluate(&oracle, &request(Value::Null)),
            Err(OracleError::Timeout(Duration::from_millis(100)))
        );
        assert!(gate.is_busy(&oracle));
        assert_eq!(
            gate.try_evaluate(&oracle, &request(Value::Null)),
            Err(OracleError::Busy(oracle.clone()))
        );

        release.send(()).unwrap();
        let mut waited = 0;
        while gate.is_busy(&oracle) && waited < 100 {
            thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert!(!gate.is_busy(&oracle));

        release.send(()).unwrap();
        assert_eq!(gate.try_evaluate(&oracle, &request(Value::Null)), Ok(true));
    }

    #[test]
    fn test_panicking_oracle_fails_closed() {
        let gate = gate_with(Arc::new(|_: &OracleRequest| -> Result<bool, OracleError> {
            panic!("oracle exploded")
        }));

        assert_eq!(
            gate.try_evaluate(&Address::new("oracle-1"), &request(Value::Null)),
            Err(OracleError::Panicked)
        );
        assert!(!gate.is_busy(&Address::new("oracle-1")));
    }

    #[test]
    fn test_unregister() {
        let mut gate = gate_with(Arc::new(|_: &OracleRequest| -> Result<bool, OracleError> { Ok(true) }));
        assert!(gate.unregister(&Address::new("oracle-1")));
        assert!(!gate.is_registered(&Address::new("oracle-1")));
    }
}
