//! Lifecycle of one prepared setup

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which prepare call produced a setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupKind {
    Installation,
    Update,
    Uninstallation,
}

impl fmt::Display for SetupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupKind::Installation => f.write_str("installation"),
            SetupKind::Update => f.write_str("update"),
            SetupKind::Uninstallation => f.write_str("uninstallation"),
        }
    }
}

/// `Prepared -> Applied` or `Prepared -> Aborted`; both ends are terminal.
///
/// There is no idle state: a setup that has not been prepared has no handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    Prepared,
    Applied,
    Aborted,
}

impl SetupState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SetupState::Prepared)
    }
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupState::Prepared => f.write_str("prepared"),
            SetupState::Applied => f.write_str("applied"),
            SetupState::Aborted => f.write_str("aborted"),
        }
    }
}
