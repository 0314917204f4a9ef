//! Event record types

use defibank_core::AccountId;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Kind of externally observable state change
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum EventKind {
    Deposit,
    Withdrawal,
    InterestAccrued,
    LoanRequested,
    LoanApproved,
    LoanRepaid,
    LoanLiquidated,
    PoolCreated,
    Mint,
    Burn,
    Swap,
    CreditScoreUpdated,
}

/// One externally observable state change.
///
/// `entity_id` names the affected entity (account, loan id, pool key);
/// `amounts` carries the kind-specific figures in a fixed order, e.g.
/// `[amount_in, amount_out]` for a Swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub entity_id: String,
    pub actor: AccountId,
    pub amounts: Vec<u128>,
    /// Unix seconds from the injected clock
    pub timestamp: u64,
}

impl EventRecord {
    /// Build a record
    pub fn new(
        kind: EventKind,
        entity_id: impl Into<String>,
        actor: AccountId,
        amounts: Vec<u128>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            actor,
            amounts,
            timestamp,
        }
    }
}
