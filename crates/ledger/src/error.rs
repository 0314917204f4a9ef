//! Ledger errors

use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account} in {token}: available {available}, required {required}")]
    InsufficientBalance {
        token: String,
        account: String,
        available: u128,
        required: u128,
    },

    #[error("Insufficient allowance for {spender} on {owner} in {token}: allowed {allowed}, required {required}")]
    InsufficientAllowance {
        token: String,
        owner: String,
        spender: String,
        allowed: u128,
        required: u128,
    },

    #[error("Balance overflow for {account} in {token}")]
    BalanceOverflow { token: String, account: String },
}
