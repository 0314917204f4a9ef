//! DefiBank Credit - Creditworthiness scoring
//!
//! Aggregates per-account activity reported by the other engines and keeps
//! a score in [100, 1000]. The lending engine consults the derived tier and
//! borrowing cap before approving a loan.

pub mod engine;
pub mod profile;

pub use engine::{CreditScoreEngine, Eligibility};
pub use profile::{tier_for_score, ActivityKind, CreditProfile, BASE_SCORE, MAX_SCORE, MIN_SCORE};
