//! DefiBank Savings - Time-weighted interest accrual over deposits
//!
//! Positions checkpoint lazily against a rate-change history: accrual before
//! a rate change always uses the rate that was in force at the time, so a
//! rate change never needs to touch every position synchronously.

pub mod engine;
pub mod error;
pub mod position;

pub use engine::{SavingsConfig, SavingsEngine};
pub use error::SavingsError;
pub use position::{RatePoint, SavingsPosition};
