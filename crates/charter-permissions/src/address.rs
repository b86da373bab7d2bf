//! Address-like identifiers for resources, actors, oracles and plugins

use serde::{Deserialize, Serialize};
use std::fmt;

/// The all-zero address, treated as null
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Opaque identifier of a resource, actor, oracle, plugin or repository.
///
/// Hex addresses (`0x` followed by hex digits) are normalised to lower case
/// so that checksummed and plain spellings compare equal. Any other string
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let value = value.trim();
        if is_hex_address(value) {
            Address(value.to_ascii_lowercase())
        } else {
            Address(value.to_string())
        }
    }

    /// The null address
    pub fn zero() -> Self {
        Address(ZERO_ADDRESS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty string and for any all-zero hex address
    pub fn is_null(&self) -> bool {
        if self.0.is_empty() {
            return true;
        }
        match self.0.strip_prefix("0x") {
            Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b == b'0'),
            None => false,
        }
    }
}

fn is_hex_address(value: &str) -> bool {
    let digits = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => digits,
        None => return false,
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}
