//! Lending engine errors

use defibank_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Duration {duration}s outside allowed range [{min}s, {max}s]")]
    InvalidDuration { duration: u64, min: u64, max: u64 },

    #[error("Unsupported collateral token: {0}")]
    UnsupportedCollateral(String),

    #[error("Collateral {provided} below required {required}")]
    InsufficientCollateral { required: u128, provided: u128 },

    #[error("Borrower not eligible: tier {tier}, cap {max_amount}, requested {requested}")]
    NotEligible {
        tier: u8,
        max_amount: u128,
        requested: u128,
    },

    #[error("Loan request {0} not found")]
    RequestNotFound(u64),

    #[error("Loan request {0} already processed")]
    AlreadyProcessed(u64),

    #[error("Loan {0} not found")]
    LoanNotFound(u64),

    #[error("Loan {0} is not active")]
    LoanNotActive(u64),

    #[error("Account {0} may not perform this operation")]
    Unauthorized(String),

    #[error("Repayment {amount} exceeds outstanding {outstanding}")]
    RepaymentExceedsOwed { outstanding: u128, amount: u128 },

    #[error("Loan {0} is not overdue")]
    NotOverdue(u64),

    #[error("Loan repayment {repaid} at or above liquidation threshold {threshold}")]
    AboveLiquidationThreshold { repaid: u128, threshold: u128 },

    #[error("Lending engine is paused")]
    Paused,

    #[error("Interest computation overflowed")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
