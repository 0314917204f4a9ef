//! DefiBank Ledger - Token balance and allowance store
//!
//! This is the HEART of DefiBank. Every token movement in savings, lending
//! and the exchange goes through this crate.
//!
//! # Key Types
//! - `Ledger`: interior-locked balance/allowance store shared via `Arc`
//! - `LedgerOp`: single transfer/mint/burn leg
//! - `Ledger::execute`: all-or-nothing batch of legs

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{Ledger, LedgerOp};
