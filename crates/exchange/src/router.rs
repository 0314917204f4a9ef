//! Exchange router
//!
//! The single entry point to pool mutations. Quotes and slippage/deadline
//! checks happen before any token moves; the router fee comes off the input
//! before forwarding to the pool; a failing pool step refunds the already-
//! transferred input so every operation stays all-or-nothing.

use crate::error::ExchangeError;
use crate::pool::{LiquidityPool, PoolKey, PoolSnapshot};
use defibank_core::{mul_div, AccountId, AdminPolicy, Clock, TokenId, BPS_DENOMINATOR};
use defibank_credit::{ActivityKind, CreditScoreEngine};
use defibank_events::{EventKind, EventRecord, EventSink};
use defibank_ledger::{Ledger, LedgerOp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug)]
struct RouterState {
    pools: HashMap<PoolKey, LiquidityPool>,
    fee_bps: u32,
}

/// Routing and fee logic over the pool set
pub struct ExchangeRouter {
    ledger: Arc<Ledger>,
    credit: Arc<CreditScoreEngine>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    admin: Arc<dyn AdminPolicy>,
    fee_collector: AccountId,
    state: Mutex<RouterState>,
    paused: AtomicBool,
}

impl ExchangeRouter {
    /// Default router-level fee in bps (on top of the 0.3% pool fee)
    pub const DEFAULT_FEE_BPS: u32 = 10;

    /// Create a router with no pools
    pub fn new(
        ledger: Arc<Ledger>,
        credit: Arc<CreditScoreEngine>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        admin: Arc<dyn AdminPolicy>,
        fee_collector: AccountId,
    ) -> Self {
        Self {
            ledger,
            credit,
            events,
            clock,
            admin,
            fee_collector,
            state: Mutex::new(RouterState {
                pools: HashMap::new(),
                fee_bps: Self::DEFAULT_FEE_BPS,
            }),
            paused: AtomicBool::new(false),
        }
    }

    /// Create the pool for an unordered pair. One pool per pair.
    pub fn create_pool(
        &self,
        creator: &AccountId,
        token_a: &TokenId,
        token_b: &TokenId,
    ) -> Result<PoolKey, ExchangeError> {
        self.ensure_running()?;
        let key = PoolKey::new(token_a, token_b)?;
        let now = self.clock.now();

        {
            let mut state = self.lock();
            if state.pools.contains_key(&key) {
                return Err(ExchangeError::PoolAlreadyExists(key.to_string()));
            }
            state.pools.insert(key.clone(), LiquidityPool::new(key.clone(), now));
        }

        info!(pool = %key, creator = %creator, "pool created");
        self.events.emit(EventRecord::new(
            EventKind::PoolCreated,
            key.to_string(),
            creator.clone(),
            vec![],
            now,
        ));
        Ok(key)
    }

    /// Add liquidity in the pool's current reserve proportion.
    ///
    /// Returns `(amount_a, amount_b, liquidity)`; the deposited amounts are
    /// the optimal amounts at or under the desired figures, never below the
    /// caller's minimums.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &self,
        caller: &AccountId,
        token_a: &TokenId,
        token_b: &TokenId,
        amount_a_desired: u128,
        amount_b_desired: u128,
        amount_a_min: u128,
        amount_b_min: u128,
        deadline: u64,
    ) -> Result<(u128, u128, u128), ExchangeError> {
        self.ensure_running()?;
        let now = self.ensure_deadline(deadline)?;
        let key = PoolKey::new(token_a, token_b)?;

        let (amount_a, amount_b, liquidity) = {
            let mut state = self.lock();
            let pool = state
                .pools
                .get_mut(&key)
                .ok_or_else(|| ExchangeError::PoolNotFound(key.to_string()))?;

            let (reserve_a, reserve_b) = pool.reserves_for(token_a);
            let (amount_a, amount_b) = optimal_amounts(
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
                reserve_a,
                reserve_b,
            )?;

            let pool_account = pool.account.clone();
            let deposit = [
                LedgerOp::Transfer {
                    token: token_a.clone(),
                    from: caller.clone(),
                    to: pool_account.clone(),
                    amount: amount_a,
                },
                LedgerOp::Transfer {
                    token: token_b.clone(),
                    from: caller.clone(),
                    to: pool_account.clone(),
                    amount: amount_b,
                },
            ];
            self.ledger.execute(&deposit)?;

            let ledger = &self.ledger;
            match pool.guarded(|p| p.mint(ledger, caller, now)) {
                Ok(liquidity) => (amount_a, amount_b, liquidity),
                Err(err) => {
                    self.refund(&deposit);
                    return Err(err);
                }
            }
        };

        info!(pool = %key, caller = %caller, amount_a, amount_b, liquidity, "liquidity added");
        self.events.emit(EventRecord::new(
            EventKind::Mint,
            key.to_string(),
            caller.clone(),
            vec![amount_a, amount_b, liquidity],
            now,
        ));
        Ok((amount_a, amount_b, liquidity))
    }

    /// Burn `liquidity` of the caller's LP units and withdraw both tokens
    /// proportionally. Returns `(amount_a, amount_b)`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &self,
        caller: &AccountId,
        token_a: &TokenId,
        token_b: &TokenId,
        liquidity: u128,
        amount_a_min: u128,
        amount_b_min: u128,
        deadline: u64,
    ) -> Result<(u128, u128), ExchangeError> {
        self.ensure_running()?;
        if liquidity == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        let now = self.ensure_deadline(deadline)?;
        let key = PoolKey::new(token_a, token_b)?;

        let (amount_a, amount_b) = {
            let mut state = self.lock();
            let pool = state
                .pools
                .get_mut(&key)
                .ok_or_else(|| ExchangeError::PoolNotFound(key.to_string()))?;

            // Validate the payout before anything moves
            let (amount0, amount1) = pool.preview_burn(&self.ledger, liquidity)?;
            let (amount_a, amount_b) = if token_a == &key.token0 {
                (amount0, amount1)
            } else {
                (amount1, amount0)
            };
            if amount_a < amount_a_min {
                return Err(ExchangeError::SlippageExceeded {
                    minimum: amount_a_min,
                    actual: amount_a,
                });
            }
            if amount_b < amount_b_min {
                return Err(ExchangeError::SlippageExceeded {
                    minimum: amount_b_min,
                    actual: amount_b,
                });
            }

            let pool_account = pool.account.clone();
            pool.transfer_lp(caller, &pool_account, liquidity)?;

            let ledger = &self.ledger;
            match pool.guarded(|p| p.burn(ledger, caller, now)) {
                Ok(amounts) => {
                    let _ = amounts;
                    (amount_a, amount_b)
                }
                Err(err) => {
                    // Hand the parked units back
                    let _ = pool.transfer_lp(&pool_account, caller, liquidity);
                    return Err(err);
                }
            }
        };

        info!(pool = %key, caller = %caller, liquidity, amount_a, amount_b, "liquidity removed");
        self.events.emit(EventRecord::new(
            EventKind::Burn,
            key.to_string(),
            caller.clone(),
            vec![amount_a, amount_b, liquidity],
            now,
        ));
        Ok((amount_a, amount_b))
    }

    /// Swap an exact input for at least `min_amount_out` of the output
    /// token. The router fee is deducted from the input before the pool
    /// quote.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &self,
        caller: &AccountId,
        token_in: &TokenId,
        token_out: &TokenId,
        amount_in: u128,
        min_amount_out: u128,
        deadline: u64,
    ) -> Result<u128, ExchangeError> {
        self.ensure_running()?;
        if amount_in == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        let now = self.ensure_deadline(deadline)?;
        let key = PoolKey::new(token_in, token_out)?;

        let amount_out = {
            let mut state = self.lock();
            let fee_bps = state.fee_bps;
            let pool = state
                .pools
                .get_mut(&key)
                .ok_or_else(|| ExchangeError::PoolNotFound(key.to_string()))?;

            let fee = mul_div(amount_in, fee_bps as u128, BPS_DENOMINATOR)
                .ok_or(ExchangeError::Overflow)?;
            let net_in = amount_in.saturating_sub(fee);
            if net_in == 0 {
                return Err(ExchangeError::ZeroAmount);
            }

            // Quote first so slippage rejects before any transfer
            let (reserve_in, reserve_out) = pool.reserves_for(token_in);
            let quoted = LiquidityPool::get_amount_out(net_in, reserve_in, reserve_out)?;
            if quoted < min_amount_out {
                return Err(ExchangeError::SlippageExceeded {
                    minimum: min_amount_out,
                    actual: quoted,
                });
            }

            let pool_account = pool.account.clone();
            let mut deposit = vec![LedgerOp::Transfer {
                token: token_in.clone(),
                from: caller.clone(),
                to: pool_account,
                amount: net_in,
            }];
            if fee > 0 {
                deposit.push(LedgerOp::Transfer {
                    token: token_in.clone(),
                    from: caller.clone(),
                    to: self.fee_collector.clone(),
                    amount: fee,
                });
            }
            self.ledger.execute(&deposit)?;

            let ledger = &self.ledger;
            match pool.guarded(|p| p.swap(ledger, token_in, net_in, caller, now)) {
                Ok(amount_out) => amount_out,
                Err(err) => {
                    self.refund(&deposit);
                    return Err(err);
                }
            }
        };

        self.credit
            .record_activity(caller, ActivityKind::DexVolume, amount_in);
        info!(pool = %key, caller = %caller, amount_in, amount_out, "swap executed");
        self.events.emit(EventRecord::new(
            EventKind::Swap,
            key.to_string(),
            caller.clone(),
            vec![amount_in, amount_out],
            now,
        ));
        Ok(amount_out)
    }

    /// Quote a swap without executing it (router fee included)
    pub fn quote_swap(
        &self,
        token_in: &TokenId,
        token_out: &TokenId,
        amount_in: u128,
    ) -> Result<u128, ExchangeError> {
        let key = PoolKey::new(token_in, token_out)?;
        let state = self.lock();
        let pool = state
            .pools
            .get(&key)
            .ok_or_else(|| ExchangeError::PoolNotFound(key.to_string()))?;
        let fee = mul_div(amount_in, state.fee_bps as u128, BPS_DENOMINATOR)
            .ok_or(ExchangeError::Overflow)?;
        let (reserve_in, reserve_out) = pool.reserves_for(token_in);
        LiquidityPool::get_amount_out(amount_in.saturating_sub(fee), reserve_in, reserve_out)
    }

    /// Set the router-level fee (admin-only). A fee at or above 100% would
    /// consume the whole input, so it is rejected as overflow.
    pub fn set_fee(&self, actor: &AccountId, fee_bps: u32) -> Result<(), ExchangeError> {
        self.ensure_admin(actor)?;
        if fee_bps as u128 >= BPS_DENOMINATOR {
            return Err(ExchangeError::Overflow);
        }
        self.lock().fee_bps = fee_bps;
        Ok(())
    }

    /// Current router-level fee in bps
    pub fn fee_bps(&self) -> u32 {
        self.lock().fee_bps
    }

    /// Pause or resume mutating operations (admin-only)
    pub fn set_paused(&self, actor: &AccountId, paused: bool) -> Result<(), ExchangeError> {
        self.ensure_admin(actor)?;
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    /// Read-only view of a pool
    pub fn pool(&self, token_a: &TokenId, token_b: &TokenId) -> Option<PoolSnapshot> {
        let key = PoolKey::new(token_a, token_b).ok()?;
        self.lock().pools.get(&key).map(|p| p.snapshot())
    }

    /// LP units `holder` owns in the pool for this pair
    pub fn lp_balance(
        &self,
        token_a: &TokenId,
        token_b: &TokenId,
        holder: &AccountId,
    ) -> Option<u128> {
        let key = PoolKey::new(token_a, token_b).ok()?;
        self.lock().pools.get(&key).map(|p| p.lp_balance(holder))
    }

    /// Best-effort compensation for legs applied before a failed pool step
    fn refund(&self, applied: &[LedgerOp]) {
        let reversed: Vec<LedgerOp> = applied
            .iter()
            .map(|op| match op.clone() {
                LedgerOp::Transfer {
                    token,
                    from,
                    to,
                    amount,
                } => LedgerOp::Transfer {
                    token,
                    from: to,
                    to: from,
                    amount,
                },
                other => other,
            })
            .collect();
        if let Err(err) = self.ledger.execute(&reversed) {
            warn!(error = %err, "refund after failed pool operation did not apply");
        }
    }

    fn ensure_deadline(&self, deadline: u64) -> Result<u64, ExchangeError> {
        let now = self.clock.now();
        if deadline < now {
            return Err(ExchangeError::Expired { deadline, now });
        }
        Ok(now)
    }

    fn ensure_running(&self) -> Result<(), ExchangeError> {
        if self.paused.load(Ordering::SeqCst) {
            return Err(ExchangeError::Paused);
        }
        Ok(())
    }

    fn ensure_admin(&self, actor: &AccountId) -> Result<(), ExchangeError> {
        if !self.admin.is_admin(actor) {
            return Err(ExchangeError::Unauthorized(actor.to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Optimal deposit amounts against the current reserve proportion
fn optimal_amounts(
    amount_a_desired: u128,
    amount_b_desired: u128,
    amount_a_min: u128,
    amount_b_min: u128,
    reserve_a: u128,
    reserve_b: u128,
) -> Result<(u128, u128), ExchangeError> {
    if amount_a_desired == 0 || amount_b_desired == 0 {
        return Err(ExchangeError::ZeroAmount);
    }
    if reserve_a == 0 && reserve_b == 0 {
        return Ok((amount_a_desired, amount_b_desired));
    }

    let b_optimal =
        mul_div(amount_a_desired, reserve_b, reserve_a).ok_or(ExchangeError::Overflow)?;
    if b_optimal <= amount_b_desired {
        if b_optimal < amount_b_min {
            return Err(ExchangeError::SlippageExceeded {
                minimum: amount_b_min,
                actual: b_optimal,
            });
        }
        Ok((amount_a_desired, b_optimal))
    } else {
        let a_optimal =
            mul_div(amount_b_desired, reserve_a, reserve_b).ok_or(ExchangeError::Overflow)?;
        if a_optimal < amount_a_min {
            return Err(ExchangeError::SlippageExceeded {
                minimum: amount_a_min,
                actual: a_optimal,
            });
        }
        Ok((a_optimal, amount_b_desired))
    }
}
