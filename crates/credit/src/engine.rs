//! Credit score engine
//!
//! Shared store consulted by the lending engine and written to by every
//! other engine. Profiles are created lazily on first recorded activity and
//! the score is recomputed on every update.

use crate::profile::{tier_for_score, ActivityKind, CreditProfile};
use defibank_core::{AccountId, Clock};
use defibank_events::{EventKind, EventRecord, EventSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Result of a lending eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub tier: u8,
    /// Borrowing cap implied by savings history and tier
    pub max_amount: u128,
}

/// Per-account activity aggregation and score computation
pub struct CreditScoreEngine {
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    profiles: Mutex<HashMap<AccountId, CreditProfile>>,
}

impl CreditScoreEngine {
    /// Create an empty engine
    pub fn new(clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            clock,
            events,
            profiles: Mutex::new(HashMap::new()),
        }
    }

    /// Record one activity and return the recomputed score
    pub fn record_activity(&self, account: &AccountId, kind: ActivityKind, amount: u128) -> u16 {
        let now = self.clock.now();
        let score = {
            let mut profiles = self.lock();
            let profile = profiles
                .entry(account.clone())
                .or_insert_with(|| CreditProfile::new(now));
            profile.record(kind, amount);
            profile.score = profile.compute_score(now);
            profile.score
        };

        info!(account = %account, kind = %kind, amount, score, "credit activity recorded");
        self.events.emit(EventRecord::new(
            EventKind::CreditScoreUpdated,
            account.to_string(),
            account.clone(),
            vec![amount, score as u128],
            now,
        ));
        score
    }

    /// Record a default (liquidated loan) and return the recomputed score
    pub fn record_default(&self, account: &AccountId, amount: u128) -> u16 {
        let now = self.clock.now();
        let score = {
            let mut profiles = self.lock();
            let profile = profiles
                .entry(account.clone())
                .or_insert_with(|| CreditProfile::new(now));
            profile.default_count = profile.default_count.saturating_add(1);
            profile.score = profile.compute_score(now);
            profile.score
        };

        info!(account = %account, amount, score, "default recorded");
        self.events.emit(EventRecord::new(
            EventKind::CreditScoreUpdated,
            account.to_string(),
            account.clone(),
            vec![amount, score as u128],
            now,
        ));
        score
    }

    /// Current stored score, if the account has a profile
    pub fn score(&self, account: &AccountId) -> Option<u16> {
        self.lock().get(account).map(|p| p.score)
    }

    /// Snapshot of the full profile
    pub fn profile(&self, account: &AccountId) -> Option<CreditProfile> {
        self.lock().get(account).cloned()
    }

    /// Credit tier of the account (0 when unscored)
    pub fn tier_of(&self, account: &AccountId) -> u8 {
        self.score(account).map(tier_for_score).unwrap_or(0)
    }

    /// Check whether `account` may borrow `requested`.
    ///
    /// Tier 0 is never eligible; otherwise the cap is
    /// `2 * total_savings * tier / 5`.
    pub fn check_lending_eligibility(&self, account: &AccountId, requested: u128) -> Eligibility {
        let profiles = self.lock();
        let Some(profile) = profiles.get(account) else {
            return Eligibility {
                eligible: false,
                tier: 0,
                max_amount: 0,
            };
        };

        let tier = tier_for_score(profile.score);
        if tier == 0 {
            return Eligibility {
                eligible: false,
                tier,
                max_amount: 0,
            };
        }

        let max_amount = profile
            .total_savings
            .saturating_mul(2)
            .saturating_mul(tier as u128)
            / 5;

        Eligibility {
            eligible: requested <= max_amount,
            tier,
            max_amount,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, CreditProfile>> {
        self.profiles.lock().unwrap_or_else(|e| e.into_inner())
    }
}
