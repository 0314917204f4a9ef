//! Savings engine errors

use defibank_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SavingsError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("No savings position for {0}")]
    PositionNotFound(String),

    #[error("Withdrawal of {requested} exceeds principal {principal}")]
    ExceedsPrincipal { principal: u128, requested: u128 },

    #[error("Rate {rate_bps} bps exceeds maximum {max_bps} bps")]
    RateTooHigh { rate_bps: u32, max_bps: u32 },

    #[error("Account {0} is not an administrator")]
    Unauthorized(String),

    #[error("Savings engine is paused")]
    Paused,

    #[error("Interest computation overflowed")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
