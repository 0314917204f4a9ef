//! DefiBank Core - Domain types
//!
//! This crate contains the fundamental types used across DefiBank:
//! - `AccountId` / `TokenId`: Type-safe account and token identifiers
//! - `Clock`: Injected time source (unix seconds)
//! - `AdminPolicy`: Injected administrator-capability check

pub mod auth;
pub mod math;
pub mod time;
pub mod types;

pub use auth::{AdminPolicy, StaticAdminPolicy};
pub use math::{isqrt, mul_div};
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{AccountId, TokenId};

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Seconds in a (non-leap) year, used by all interest formulas.
pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;

/// Allowance sentinel meaning "unlimited" - never decremented on spend.
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;
