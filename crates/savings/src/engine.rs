//! Savings engine
//!
//! Deposits move tokens into a vault account; withdrawals pay principal back
//! from the vault and mint the settled interest on top. Every balance-
//! affecting action settles pending interest first.

use crate::error::SavingsError;
use crate::position::{interest_between, RatePoint, SavingsPosition};
use defibank_core::{AccountId, AdminPolicy, Clock, TokenId};
use defibank_credit::{ActivityKind, CreditScoreEngine};
use defibank_events::{EventKind, EventRecord, EventSink};
use defibank_ledger::{Ledger, LedgerOp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Savings engine configuration
#[derive(Debug, Clone)]
pub struct SavingsConfig {
    /// Annual rate in force at construction
    pub initial_rate_bps: u32,
    /// Hard cap for `set_interest_rate`
    pub max_rate_bps: u32,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            initial_rate_bps: 500,
            max_rate_bps: 5_000,
        }
    }
}

#[derive(Debug)]
struct SavingsState {
    positions: HashMap<AccountId, SavingsPosition>,
    /// Sorted ascending by `effective_from`; never empty
    rates: Vec<RatePoint>,
}

/// Per-account time-weighted interest accrual over deposits
pub struct SavingsEngine {
    ledger: Arc<Ledger>,
    credit: Arc<CreditScoreEngine>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    admin: Arc<dyn AdminPolicy>,
    token: TokenId,
    vault: AccountId,
    max_rate_bps: u32,
    state: Mutex<SavingsState>,
    paused: AtomicBool,
}

impl SavingsEngine {
    /// Create a savings engine over `token`, escrowing principal in `vault`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<Ledger>,
        credit: Arc<CreditScoreEngine>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        admin: Arc<dyn AdminPolicy>,
        token: TokenId,
        vault: AccountId,
        config: SavingsConfig,
    ) -> Self {
        Self {
            ledger,
            credit,
            events,
            clock,
            admin,
            token,
            vault,
            max_rate_bps: config.max_rate_bps,
            state: Mutex::new(SavingsState {
                positions: HashMap::new(),
                rates: vec![RatePoint {
                    effective_from: 0,
                    rate_bps: config.initial_rate_bps,
                }],
            }),
            paused: AtomicBool::new(false),
        }
    }

    /// Deposit `amount` into the caller's position.
    ///
    /// Settles pending interest, then moves the tokens account -> vault and
    /// increases principal. Fails before any mutation on a bad amount or an
    /// uncovered balance.
    pub fn deposit(&self, account: &AccountId, amount: u128) -> Result<(), SavingsError> {
        self.ensure_running()?;
        if amount == 0 {
            return Err(SavingsError::ZeroAmount);
        }
        let now = self.clock.now();

        let settled = {
            let mut state = self.lock();
            let (pending, new_interest, new_principal) = match state.positions.get(account) {
                Some(position) => {
                    let pending = pending_for(position, now, &state.rates)?;
                    let interest = position
                        .accrued_interest
                        .checked_add(pending)
                        .ok_or(SavingsError::Overflow)?;
                    let principal = position
                        .principal
                        .checked_add(amount)
                        .ok_or(SavingsError::Overflow)?;
                    (pending, interest, principal)
                }
                None => (0, 0, amount),
            };

            // All sums validated above; the ledger leg is the last fallible
            // step, so a failed deposit never strands tokens in the vault
            self.ledger
                .transfer(&self.token, account, &self.vault, amount)?;

            let position = state
                .positions
                .entry(account.clone())
                .or_insert_with(|| SavingsPosition::new(now));
            position.accrued_interest = new_interest;
            position.principal = new_principal;
            position.last_checkpoint = now;
            pending
        };

        self.credit
            .record_activity(account, ActivityKind::Savings, amount);
        info!(account = %account, amount, "savings deposit");
        self.emit_interest(account, settled, now);
        self.events.emit(EventRecord::new(
            EventKind::Deposit,
            account.to_string(),
            account.clone(),
            vec![amount],
            now,
        ));
        Ok(())
    }

    /// Withdraw `amount` of principal (0 = everything) plus all settled
    /// interest. The position is removed when principal reaches zero.
    pub fn withdraw(&self, account: &AccountId, amount: u128) -> Result<(), SavingsError> {
        self.ensure_running()?;
        let now = self.clock.now();

        let (paid_principal, paid_interest) = {
            let mut state = self.lock();
            let position = state
                .positions
                .get(account)
                .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
            let pending = pending_for(position, now, &state.rates)?;
            let interest = position
                .accrued_interest
                .checked_add(pending)
                .ok_or(SavingsError::Overflow)?;

            let requested = if amount == 0 { position.principal } else { amount };
            if requested > position.principal {
                return Err(SavingsError::ExceedsPrincipal {
                    principal: position.principal,
                    requested,
                });
            }

            // Principal comes back out of the vault; interest is minted
            let mut ops = vec![LedgerOp::Transfer {
                token: self.token.clone(),
                from: self.vault.clone(),
                to: account.clone(),
                amount: requested,
            }];
            if interest > 0 {
                ops.push(LedgerOp::Mint {
                    token: self.token.clone(),
                    to: account.clone(),
                    amount: interest,
                });
            }
            self.ledger.execute(&ops)?;

            let position = state
                .positions
                .get_mut(account)
                .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
            position.principal -= requested;
            position.accrued_interest = 0;
            position.last_checkpoint = now;
            if position.principal == 0 {
                state.positions.remove(account);
            }
            (requested, interest)
        };

        info!(account = %account, paid_principal, paid_interest, "savings withdrawal");
        self.emit_interest(account, paid_interest, now);
        self.events.emit(EventRecord::new(
            EventKind::Withdrawal,
            account.to_string(),
            account.clone(),
            vec![paid_principal, paid_interest],
            now,
        ));
        Ok(())
    }

    /// Settle pending interest into the position without moving funds.
    ///
    /// Idempotent: a second call with no elapsed time adds zero. Returns the
    /// newly settled interest.
    pub fn checkpoint(&self, account: &AccountId) -> Result<u128, SavingsError> {
        self.ensure_running()?;
        let now = self.clock.now();
        let settled = {
            let mut state = self.lock();
            let pending = {
                let position = state
                    .positions
                    .get(account)
                    .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
                pending_for(position, now, &state.rates)?
            };
            let position = state
                .positions
                .get_mut(account)
                .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
            position.accrued_interest = position
                .accrued_interest
                .checked_add(pending)
                .ok_or(SavingsError::Overflow)?;
            position.last_checkpoint = now;
            pending
        };

        self.emit_interest(account, settled, now);
        Ok(settled)
    }

    /// Change the annual rate, effective now (admin-only, capped).
    ///
    /// Accrual for time before the change keeps the old rate via the rate
    /// history, so no position needs to be touched here.
    pub fn set_interest_rate(&self, actor: &AccountId, rate_bps: u32) -> Result<(), SavingsError> {
        self.ensure_admin(actor)?;
        if rate_bps > self.max_rate_bps {
            return Err(SavingsError::RateTooHigh {
                rate_bps,
                max_bps: self.max_rate_bps,
            });
        }

        let now = self.clock.now();
        let mut state = self.lock();
        match state.rates.last_mut() {
            Some(last) if last.effective_from == now => last.rate_bps = rate_bps,
            _ => state.rates.push(RatePoint {
                effective_from: now,
                rate_bps,
            }),
        }
        info!(actor = %actor, rate_bps, "interest rate changed");
        Ok(())
    }

    /// Admin escape hatch: pay out principal only, dropping all interest
    pub fn emergency_withdraw(
        &self,
        actor: &AccountId,
        account: &AccountId,
    ) -> Result<u128, SavingsError> {
        self.ensure_admin(actor)?;
        let now = self.clock.now();

        let principal = {
            let mut state = self.lock();
            let position = state
                .positions
                .get(account)
                .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
            let principal = position.principal;

            self.ledger
                .transfer(&self.token, &self.vault, account, principal)?;
            state.positions.remove(account);
            principal
        };

        info!(actor = %actor, account = %account, principal, "emergency withdrawal");
        self.events.emit(EventRecord::new(
            EventKind::Withdrawal,
            account.to_string(),
            actor.clone(),
            vec![principal, 0],
            now,
        ));
        Ok(principal)
    }

    /// Pause or resume mutating operations (admin-only)
    pub fn set_paused(&self, actor: &AccountId, paused: bool) -> Result<(), SavingsError> {
        self.ensure_admin(actor)?;
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot of an account's position
    pub fn position(&self, account: &AccountId) -> Option<SavingsPosition> {
        self.lock().positions.get(account).cloned()
    }

    /// Interest that a checkpoint right now would settle (plus already
    /// accrued interest)
    pub fn pending_interest(&self, account: &AccountId) -> Result<u128, SavingsError> {
        let now = self.clock.now();
        let state = self.lock();
        let position = state
            .positions
            .get(account)
            .ok_or_else(|| SavingsError::PositionNotFound(account.to_string()))?;
        let pending = pending_for(position, now, &state.rates)?;
        position
            .accrued_interest
            .checked_add(pending)
            .ok_or(SavingsError::Overflow)
    }

    /// Annual rate currently in force, in bps
    pub fn current_rate_bps(&self) -> u32 {
        self.lock().rates.last().map(|p| p.rate_bps).unwrap_or(0)
    }

    fn emit_interest(&self, account: &AccountId, interest: u128, now: u64) {
        if interest > 0 {
            self.events.emit(EventRecord::new(
                EventKind::InterestAccrued,
                account.to_string(),
                account.clone(),
                vec![interest],
                now,
            ));
        }
    }

    fn ensure_running(&self) -> Result<(), SavingsError> {
        if self.paused.load(Ordering::SeqCst) {
            return Err(SavingsError::Paused);
        }
        Ok(())
    }

    fn ensure_admin(&self, actor: &AccountId) -> Result<(), SavingsError> {
        if !self.admin.is_admin(actor) {
            return Err(SavingsError::Unauthorized(actor.to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SavingsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn pending_for(
    position: &SavingsPosition,
    now: u64,
    rates: &[RatePoint],
) -> Result<u128, SavingsError> {
    interest_between(position.principal, position.last_checkpoint, now, rates)
        .ok_or(SavingsError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use defibank_core::{ManualClock, StaticAdminPolicy};
    use defibank_events::MemorySink;

    const YEAR: u64 = 365 * 24 * 3600;

    struct Fixture {
        engine: SavingsEngine,
        ledger: Arc<Ledger>,
        clock: Arc<ManualClock>,
        sink: Arc<MemorySink>,
        usdt: TokenId,
        alice: AccountId,
        admin: AccountId,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(Ledger::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let sink = Arc::new(MemorySink::new());
        let admin = AccountId::new("admin");
        let credit = Arc::new(CreditScoreEngine::new(clock.clone(), sink.clone()));
        let usdt = TokenId::new("USDT");
        let alice = AccountId::new("alice");

        ledger.mint(&usdt, &alice, 1_000_000).unwrap();

        let engine = SavingsEngine::new(
            ledger.clone(),
            credit,
            sink.clone(),
            clock.clone(),
            Arc::new(StaticAdminPolicy::single(admin.clone())),
            usdt.clone(),
            AccountId::new("savings-vault"),
            SavingsConfig::default(),
        );

        Fixture {
            engine,
            ledger,
            clock,
            sink,
            usdt,
            alice,
            admin,
        }
    }

    #[test]
    fn test_one_year_accrual_is_exact() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        assert_eq!(f.engine.checkpoint(&f.alice).unwrap(), 50);
        let position = f.engine.position(&f.alice).unwrap();
        assert_eq!(position.accrued_interest, 50);
        assert_eq!(position.principal, 1_000);
    }

    #[test]
    fn test_checkpoint_idempotent_with_no_elapsed_time() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        assert_eq!(f.engine.checkpoint(&f.alice).unwrap(), 50);
        assert_eq!(f.engine.checkpoint(&f.alice).unwrap(), 0);
        assert_eq!(f.engine.checkpoint(&f.alice).unwrap(), 0);
        assert_eq!(f.engine.position(&f.alice).unwrap().accrued_interest, 50);
    }

    #[test]
    fn test_deposit_overflow_leaves_ledger_untouched() {
        let f = fixture();
        f.ledger
            .mint(&f.usdt, &f.alice, u128::MAX - 1_000_000)
            .unwrap();
        f.engine.deposit(&f.alice, u128::MAX).unwrap();
        f.ledger.mint(&f.usdt, &f.alice, 500).unwrap();

        // Principal is already at the ceiling; the sum fails before the
        // transfer, so no tokens are stranded in the vault
        assert!(matches!(
            f.engine.deposit(&f.alice, 500),
            Err(SavingsError::Overflow)
        ));
        assert_eq!(f.ledger.balance_of(&f.usdt, &f.alice), 500);
        assert_eq!(f.engine.position(&f.alice).unwrap().principal, u128::MAX);
    }

    #[test]
    fn test_paused_blocks_checkpoint_but_not_emergency_withdraw() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.engine.set_paused(&f.admin, true).unwrap();

        assert!(matches!(
            f.engine.checkpoint(&f.alice),
            Err(SavingsError::Paused)
        ));
        // The admin escape hatch works precisely while paused
        assert_eq!(f.engine.emergency_withdraw(&f.admin, &f.alice).unwrap(), 1_000);
    }

    #[test]
    fn test_deposit_settles_before_raising_principal() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);
        // Second deposit must not retro-earn on the new principal
        f.engine.deposit(&f.alice, 9_000).unwrap();
        f.clock.advance(YEAR);

        // 50 from year one on 1000, 500 from year two on 10000
        assert_eq!(f.engine.pending_interest(&f.alice).unwrap(), 550);
    }

    #[test]
    fn test_withdraw_pays_principal_plus_interest() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        let before = f.ledger.balance_of(&f.usdt, &f.alice);
        f.engine.withdraw(&f.alice, 0).unwrap();
        let after = f.ledger.balance_of(&f.usdt, &f.alice);

        assert_eq!(after - before, 1_050);
        // Position removed at principal zero
        assert!(f.engine.position(&f.alice).is_none());
    }

    #[test]
    fn test_partial_withdraw_keeps_position() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        f.engine.withdraw(&f.alice, 400).unwrap();
        let position = f.engine.position(&f.alice).unwrap();
        assert_eq!(position.principal, 600);
        assert_eq!(position.accrued_interest, 0);
    }

    #[test]
    fn test_withdraw_over_principal_rejected() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();

        let result = f.engine.withdraw(&f.alice, 1_001);
        assert!(matches!(
            result,
            Err(SavingsError::ExceedsPrincipal {
                principal: 1_000,
                requested: 1_001,
            })
        ));
    }

    #[test]
    fn test_rate_change_not_retroactive() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        // Raise to 10% after one year; the first year stays at 5%
        f.engine.set_interest_rate(&f.admin, 1_000).unwrap();
        f.clock.advance(YEAR);

        assert_eq!(f.engine.pending_interest(&f.alice).unwrap(), 150);
    }

    #[test]
    fn test_rate_change_gated_and_capped() {
        let f = fixture();
        assert!(matches!(
            f.engine.set_interest_rate(&f.alice, 100),
            Err(SavingsError::Unauthorized(_))
        ));
        assert!(matches!(
            f.engine.set_interest_rate(&f.admin, 5_001),
            Err(SavingsError::RateTooHigh { .. })
        ));
        f.engine.set_interest_rate(&f.admin, 5_000).unwrap();
        assert_eq!(f.engine.current_rate_bps(), 5_000);
    }

    #[test]
    fn test_emergency_withdraw_drops_interest() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();
        f.clock.advance(YEAR);

        let before = f.ledger.balance_of(&f.usdt, &f.alice);
        let paid = f.engine.emergency_withdraw(&f.admin, &f.alice).unwrap();
        assert_eq!(paid, 1_000);
        assert_eq!(f.ledger.balance_of(&f.usdt, &f.alice) - before, 1_000);
        assert!(f.engine.position(&f.alice).is_none());
    }

    #[test]
    fn test_paused_blocks_mutations() {
        let f = fixture();
        f.engine.set_paused(&f.admin, true).unwrap();
        assert!(matches!(
            f.engine.deposit(&f.alice, 100),
            Err(SavingsError::Paused)
        ));
        f.engine.set_paused(&f.admin, false).unwrap();
        f.engine.deposit(&f.alice, 100).unwrap();
    }

    #[test]
    fn test_zero_deposit_rejected() {
        let f = fixture();
        assert!(matches!(
            f.engine.deposit(&f.alice, 0),
            Err(SavingsError::ZeroAmount)
        ));
    }

    #[test]
    fn test_deposit_emits_events() {
        let f = fixture();
        f.engine.deposit(&f.alice, 1_000).unwrap();

        let kinds: Vec<_> = f.sink.snapshot().into_iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&EventKind::Deposit));
        assert!(kinds.contains(&EventKind::CreditScoreUpdated));
    }
}
