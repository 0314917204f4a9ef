//! Credit profile and score formula
//!
//! The score is assembled from capped per-aggregate components on top of a
//! base of 300, plus a tenure bonus, minus 100 per recorded default. Each
//! component is clamped before summing; the caps sum exactly to the 1000
//! ceiling. Intermediate arithmetic is saturating so the default penalty
//! can never wrap below zero before the final clamp.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Floor of the score range
pub const MIN_SCORE: u16 = 100;
/// Ceiling of the score range
pub const MAX_SCORE: u16 = 1000;
/// Score a freshly created profile starts from
pub const BASE_SCORE: u16 = 300;

/// Penalty per recorded default
const DEFAULT_PENALTY: u64 = 100;
/// Seconds per tenure month
const SECONDS_PER_MONTH: u64 = 30 * 24 * 60 * 60;

/// Kind of activity reported into the score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ActivityKind {
    Savings,
    Lending,
    Repayment,
    DexVolume,
    Governance,
}

/// Per-account credit profile. Created lazily, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub score: u16,
    pub total_savings: u128,
    pub total_lent: u128,
    pub total_repaid: u128,
    pub total_dex_volume: u128,
    pub governance_participation: u64,
    /// Unix seconds of first recorded activity
    pub created_at: u64,
    pub default_count: u32,
}

impl CreditProfile {
    /// Fresh profile at the base score
    pub fn new(created_at: u64) -> Self {
        Self {
            score: BASE_SCORE,
            total_savings: 0,
            total_lent: 0,
            total_repaid: 0,
            total_dex_volume: 0,
            governance_participation: 0,
            created_at,
            default_count: 0,
        }
    }

    /// Fold one activity into the aggregates (score not yet recomputed)
    pub fn record(&mut self, kind: ActivityKind, amount: u128) {
        match kind {
            ActivityKind::Savings => {
                self.total_savings = self.total_savings.saturating_add(amount)
            }
            ActivityKind::Lending => self.total_lent = self.total_lent.saturating_add(amount),
            ActivityKind::Repayment => {
                self.total_repaid = self.total_repaid.saturating_add(amount)
            }
            ActivityKind::DexVolume => {
                self.total_dex_volume = self.total_dex_volume.saturating_add(amount)
            }
            ActivityKind::Governance => {
                self.governance_participation = self.governance_participation.saturating_add(1)
            }
        }
    }

    /// Recompute the score from the aggregates at time `now`
    pub fn compute_score(&self, now: u64) -> u16 {
        let mut score = BASE_SCORE as u64;
        score += capped(self.total_savings, 1_000, 150);
        score += capped(self.total_lent, 1_000, 100);
        score += capped(self.total_repaid, 500, 200);
        score += capped(self.total_dex_volume, 2_000, 100);
        score += self.governance_participation.saturating_mul(10).min(50);
        score += self.tenure_bonus(now);

        let penalty = DEFAULT_PENALTY.saturating_mul(self.default_count as u64);
        score
            .saturating_sub(penalty)
            .clamp(MIN_SCORE as u64, MAX_SCORE as u64) as u16
    }

    /// Tenure bonus: 5 points per full month since creation, capped at 100
    fn tenure_bonus(&self, now: u64) -> u64 {
        let months = now.saturating_sub(self.created_at) / SECONDS_PER_MONTH;
        months.saturating_mul(5).min(100)
    }
}

/// Component contribution: `value / unit`, clamped to `cap`
fn capped(value: u128, unit: u128, cap: u64) -> u64 {
    (value / unit).min(cap as u128) as u64
}

/// Map a score to its credit tier (0 = unscored/ineligible, 5 = best)
pub fn tier_for_score(score: u16) -> u8 {
    match score {
        s if s >= 900 => 5,
        s if s >= 750 => 4,
        s if s >= 600 => 3,
        s if s >= 450 => 2,
        s if s >= 300 => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_profile_base_score() {
        let profile = CreditProfile::new(0);
        assert_eq!(profile.score, BASE_SCORE);
        assert_eq!(profile.compute_score(0), BASE_SCORE);
    }

    #[test]
    fn test_component_caps() {
        let mut profile = CreditProfile::new(0);
        // Huge savings only ever contribute 150 points
        profile.record(ActivityKind::Savings, u128::MAX / 2);
        assert_eq!(profile.compute_score(0), 450);
    }

    #[test]
    fn test_tenure_bonus_caps_at_100() {
        let profile = CreditProfile::new(0);
        let ten_years = 10 * 365 * 24 * 3600;
        assert_eq!(profile.compute_score(ten_years), 400);
    }

    #[test]
    fn test_defaults_floor_at_min_score() {
        let mut profile = CreditProfile::new(0);
        profile.default_count = 50;
        // 300 - 5000 saturates, then clamps up to the floor
        assert_eq!(profile.compute_score(0), MIN_SCORE);
    }

    #[test]
    fn test_score_never_exceeds_ceiling() {
        let mut profile = CreditProfile::new(0);
        profile.record(ActivityKind::Savings, u128::MAX / 2);
        profile.record(ActivityKind::Lending, u128::MAX / 2);
        profile.record(ActivityKind::Repayment, u128::MAX / 2);
        profile.record(ActivityKind::DexVolume, u128::MAX / 2);
        for _ in 0..100 {
            profile.record(ActivityKind::Governance, 0);
        }
        let ten_years = 10 * 365 * 24 * 3600;
        assert_eq!(profile.compute_score(ten_years), MAX_SCORE);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(tier_for_score(1000), 5);
        assert_eq!(tier_for_score(900), 5);
        assert_eq!(tier_for_score(899), 4);
        assert_eq!(tier_for_score(750), 4);
        assert_eq!(tier_for_score(600), 3);
        assert_eq!(tier_for_score(450), 2);
        assert_eq!(tier_for_score(300), 1);
        assert_eq!(tier_for_score(299), 0);
        assert_eq!(tier_for_score(100), 0);
    }

    #[test]
    fn test_governance_counts_events_not_amounts() {
        let mut profile = CreditProfile::new(0);
        profile.record(ActivityKind::Governance, 999_999);
        assert_eq!(profile.governance_participation, 1);
        assert_eq!(profile.compute_score(0), 310);
    }
}
