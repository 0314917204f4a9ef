//! Exchange errors

use defibank_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Pool tokens must differ")]
    IdenticalTokens,

    #[error("Pool {0} not found")]
    PoolNotFound(String),

    #[error("Pool {0} already exists")]
    PoolAlreadyExists(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Insufficient reserves for this trade")]
    InsufficientLiquidity,

    #[error("Deposit too small to mint any liquidity")]
    InsufficientLiquidityMinted,

    #[error("Liquidity too small to withdraw either token")]
    InsufficientLiquidityBurned,

    #[error("LP balance {available} below requested {requested}")]
    InsufficientLpBalance { available: u128, requested: u128 },

    #[error("Output {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("Deadline {deadline} passed (now {now})")]
    Expired { deadline: u64, now: u64 },

    #[error("Constant-product invariant violated")]
    KInvariantViolated,

    #[error("Re-entrant pool operation rejected")]
    Reentrancy,

    #[error("Account {0} is not an administrator")]
    Unauthorized(String),

    #[error("Exchange is paused")]
    Paused,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
