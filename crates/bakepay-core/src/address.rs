//! Account addresses and operation hashes

use crate::constants::BURN_ADDRESS;
use serde::{Deserialize, Serialize};
use std::fmt;

const ADDRESS_LENGTH: usize = 36;
const IMPLICIT_PREFIXES: [&str; 4] = ["tz1", "tz2", "tz3", "tz4"];
const CONTRACT_PREFIX: &str = "KT1";

/// Kind of account behind an address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Key-controlled account
    Implicit,
    /// Originated smart contract
    Contract,
}

/// Base58 account address
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn burn() -> Self {
        Self(BURN_ADDRESS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kind(&self) -> AddressKind {
        if self.0.starts_with(CONTRACT_PREFIX) {
            AddressKind::Contract
        } else {
            AddressKind::Implicit
        }
    }

    pub fn is_contract(&self) -> bool {
        self.kind() == AddressKind::Contract
    }

    /// Prefix and length check only, no checksum.
    pub fn is_valid(&self) -> bool {
        self.0.len() == ADDRESS_LENGTH
            && self.0.is_ascii()
            && (self.0.starts_with(CONTRACT_PREFIX)
                || IMPLICIT_PREFIXES.iter().any(|p| self.0.starts_with(p)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Hash of a broadcast operation
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpHash(String);

impl OpHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OpHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kind() {
        let kt = Address::from("KT1DeAV3dNc5JUNS8G5R1cqFdEsVDsrH6dwv");
        assert!(kt.is_contract());
        assert!(kt.is_valid());

        let tz = Address::from("tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM");
        assert_eq!(tz.kind(), AddressKind::Implicit);
        assert!(tz.is_valid());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!Address::from("").is_valid());
        assert!(!Address::from("tz9P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM").is_valid());
        assert!(!Address::from("tz1short").is_valid());
    }

    #[test]
    fn test_burn_address_is_valid() {
        assert!(Address::burn().is_valid());
        assert!(!Address::burn().is_contract());
    }
}
