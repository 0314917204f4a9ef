//! Account and token identifiers
//!
//! Identifiers are opaque uppercase strings. Normalization happens in the
//! constructor so map lookups never depend on caller casing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account (user, vault, treasury, pool, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account id, normalized to uppercase.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_uppercase())
    }

    /// The null account. LP units locked at pool creation are parked here.
    pub fn null() -> Self {
        Self("NULL".to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a token/asset (e.g. "USDT", "BTC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Create a new token id, normalized to uppercase.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_uppercase())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_normalized() {
        assert_eq!(AccountId::new("alice"), AccountId::new("ALICE"));
        assert_eq!(AccountId::new("alice").as_str(), "ALICE");
    }

    #[test]
    fn test_token_id_ordering() {
        // Canonical pool ordering relies on Ord
        assert!(TokenId::new("BTC") < TokenId::new("USDT"));
    }

    #[test]
    fn test_serde_transparent() {
        let id = AccountId::new("alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ALICE\"");
        let parsed: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
