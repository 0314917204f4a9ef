//! Loan and loan-request records
//!
//! Interest is simple and stops accruing once the term elapses:
//! `owed = principal + principal * rate_bps * min(elapsed, duration)
//!         / (10000 * seconds_per_year)`

use defibank_core::{mul_div, AccountId, TokenId, BPS_DENOMINATOR, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle state of a loan. Repaid and Liquidated are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum LoanStatus {
    Active,
    Repaid,
    Liquidated,
}

/// An approved, disbursed loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub borrower: AccountId,
    pub principal: u128,
    pub interest_rate_bps: u32,
    pub collateral_amount: u128,
    pub collateral_token: TokenId,
    /// Unix seconds of approval
    pub start_time: u64,
    /// Term length in seconds
    pub duration: u64,
    pub repaid_amount: u128,
    pub status: LoanStatus,
}

impl Loan {
    /// Principal plus interest owed at `now`. Interest is capped at the
    /// full term. `None` on arithmetic overflow.
    pub fn total_owed(&self, now: u64) -> Option<u128> {
        let elapsed = now.saturating_sub(self.start_time).min(self.duration) as u128;
        let rate_time = (self.interest_rate_bps as u128).checked_mul(elapsed)?;
        let interest = mul_div(self.principal, rate_time, BPS_DENOMINATOR * SECONDS_PER_YEAR)?;
        self.principal.checked_add(interest)
    }

    /// True once the term has fully elapsed
    pub fn is_overdue(&self, now: u64) -> bool {
        now > self.start_time.saturating_add(self.duration)
    }
}

/// A pending loan request; consumed by approval (one request, at most one
/// loan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: u64,
    pub borrower: AccountId,
    pub amount: u128,
    pub duration: u64,
    pub collateral_token: TokenId,
    pub collateral_amount: u128,
    pub processed: bool,
}
