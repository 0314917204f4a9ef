//! Administrator capability check
//!
//! Privileged operations (rate changes, loan approval, pausing, fee
//! configuration) take the acting account and consult an injected policy.
//! There is no embedded owner identity anywhere in the engines.

use crate::types::AccountId;
use std::collections::HashSet;

/// Decides whether an account may perform administrator-gated operations.
pub trait AdminPolicy: Send + Sync {
    /// Returns true if `actor` holds the administrator capability
    fn is_admin(&self, actor: &AccountId) -> bool;
}

/// Fixed set of administrator accounts.
#[derive(Debug, Default)]
pub struct StaticAdminPolicy {
    admins: HashSet<AccountId>,
}

impl StaticAdminPolicy {
    /// Create a policy from a list of admin accounts
    pub fn new(admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Policy with a single admin account
    pub fn single(admin: AccountId) -> Self {
        Self::new([admin])
    }
}

impl AdminPolicy for StaticAdminPolicy {
    fn is_admin(&self, actor: &AccountId) -> bool {
        self.admins.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_policy() {
        let policy = StaticAdminPolicy::single(AccountId::new("admin"));
        assert!(policy.is_admin(&AccountId::new("ADMIN")));
        assert!(!policy.is_admin(&AccountId::new("alice")));
    }
}
