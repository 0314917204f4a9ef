//! Savings positions and the rate history
//!
//! Interest formula per segment (truncating division):
//! `principal * rate_bps * elapsed / (10000 * seconds_per_year)`

use defibank_core::{mul_div, BPS_DENOMINATOR, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};

/// One savings position. Removed from the active set at principal 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsPosition {
    pub principal: u128,
    pub accrued_interest: u128,
    /// Unix seconds of the last settlement
    pub last_checkpoint: u64,
}

impl SavingsPosition {
    /// Empty position checkpointed at `now`
    pub fn new(now: u64) -> Self {
        Self {
            principal: 0,
            accrued_interest: 0,
            last_checkpoint: now,
        }
    }
}

/// A rate taking effect at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePoint {
    pub effective_from: u64,
    pub rate_bps: u32,
}

/// Interest earned by `principal` between `from` and `to`, integrating over
/// the rate segments in force during that window.
///
/// `rates` must be sorted ascending by `effective_from` with the first point
/// at or before `from`. Each segment truncates independently. Returns `None`
/// on overflow.
pub fn interest_between(principal: u128, from: u64, to: u64, rates: &[RatePoint]) -> Option<u128> {
    if to <= from || principal == 0 {
        return Some(0);
    }

    let mut total: u128 = 0;
    for (i, point) in rates.iter().enumerate() {
        let seg_start = point.effective_from.max(from);
        let seg_end = rates
            .get(i + 1)
            .map(|next| next.effective_from)
            .unwrap_or(to)
            .min(to);
        if seg_end <= seg_start {
            continue;
        }
        let elapsed = (seg_end - seg_start) as u128;
        let rate_time = (point.rate_bps as u128).checked_mul(elapsed)?;
        let interest = mul_div(principal, rate_time, BPS_DENOMINATOR * SECONDS_PER_YEAR)?;
        total = total.checked_add(interest)?;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: u64 = 365 * 24 * 3600;

    fn flat(rate_bps: u32) -> Vec<RatePoint> {
        vec![RatePoint {
            effective_from: 0,
            rate_bps,
        }]
    }

    #[test]
    fn test_one_year_at_500_bps() {
        // 1000 at 5%/yr for exactly 365 days -> 50
        assert_eq!(interest_between(1_000, 0, YEAR, &flat(500)), Some(50));
    }

    #[test]
    fn test_truncating_division() {
        // 999 * 500 * YEAR / (10000 * YEAR) = 49.95 -> 49
        assert_eq!(interest_between(999, 0, YEAR, &flat(500)), Some(49));
    }

    #[test]
    fn test_zero_elapsed_is_zero() {
        assert_eq!(interest_between(1_000, YEAR, YEAR, &flat(500)), Some(0));
    }

    #[test]
    fn test_rate_change_splits_segments() {
        // Half a year at 500 bps, half at 1000 bps over 1000 principal:
        // 25 + 50 = 75
        let rates = vec![
            RatePoint {
                effective_from: 0,
                rate_bps: 500,
            },
            RatePoint {
                effective_from: YEAR / 2,
                rate_bps: 1_000,
            },
        ];
        assert_eq!(interest_between(1_000, 0, YEAR, &rates), Some(75));
    }

    #[test]
    fn test_rate_change_after_window_ignored() {
        let rates = vec![
            RatePoint {
                effective_from: 0,
                rate_bps: 500,
            },
            RatePoint {
                effective_from: 2 * YEAR,
                rate_bps: 5_000,
            },
        ];
        assert_eq!(interest_between(1_000, 0, YEAR, &rates), Some(50));
    }
}
