//! DefiBank Lending - Collateralized loan lifecycle
//!
//! State machine: `Requested -> Active -> {Repaid | Liquidated}`, both end
//! states terminal. Collateral is escrowed at request time and either
//! released on full repayment or forfeited on liquidation, never both.

pub mod engine;
pub mod error;
pub mod loan;

pub use engine::{LendingConfig, LendingEngine, TIER_RATE_TABLE_BPS};
pub use error::LendingError;
pub use loan::{Loan, LoanRequest, LoanStatus};
