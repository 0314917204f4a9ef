//! Constant-product liquidity pool
//!
//! Reserves are reconciled against the pool account's actual ledger
//! balances, so deposits arrive as balance deltas. Swap output:
//! `floor(in * 997 * reserve_out / (reserve_in * 1000 + in * 997))`
//! (0.3% pool fee), with the fee-adjusted product checked after every swap.

use crate::error::ExchangeError;
use defibank_core::{isqrt, mul_div, AccountId, TokenId};
use defibank_ledger::{Ledger, LedgerOp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// LP units permanently locked to the null account on first mint
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

/// Fixed-point scale for the time-weighted price accumulators
const PRICE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Canonically ordered token pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub token0: TokenId,
    pub token1: TokenId,
}

impl PoolKey {
    /// Build the canonical key for an unordered pair
    pub fn new(a: &TokenId, b: &TokenId) -> Result<Self, ExchangeError> {
        if a == b {
            return Err(ExchangeError::IdenticalTokens);
        }
        let (token0, token1) = if a < b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        Ok(Self { token0, token1 })
    }

    /// True if `token` is one of the pair
    pub fn contains(&self, token: &TokenId) -> bool {
        &self.token0 == token || &self.token1 == token
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token0, self.token1)
    }
}

/// Read-only view of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub key: PoolKey,
    pub reserve0: u128,
    pub reserve1: u128,
    pub lp_total_supply: u128,
    pub price0_cumulative: u128,
    pub price1_cumulative: u128,
    pub last_update: u64,
}

/// One constant-product pool. Mutators are crate-private; the router is the
/// only caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub key: PoolKey,
    /// The pool's own ledger account holding both reserves
    pub account: AccountId,
    reserve0: u128,
    reserve1: u128,
    lp_total_supply: u128,
    lp_balances: HashMap<AccountId, u128>,
    price0_cumulative: u128,
    price1_cumulative: u128,
    last_update: u64,
    #[serde(skip)]
    entered: bool,
}

impl LiquidityPool {
    pub(crate) fn new(key: PoolKey, now: u64) -> Self {
        let account = AccountId::new(format!("POOL:{}", key));
        Self {
            key,
            account,
            reserve0: 0,
            reserve1: 0,
            lp_total_supply: 0,
            lp_balances: HashMap::new(),
            price0_cumulative: 0,
            price1_cumulative: 0,
            last_update: now,
            entered: false,
        }
    }

    /// Read-only view
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            key: self.key.clone(),
            reserve0: self.reserve0,
            reserve1: self.reserve1,
            lp_total_supply: self.lp_total_supply,
            price0_cumulative: self.price0_cumulative,
            price1_cumulative: self.price1_cumulative,
            last_update: self.last_update,
        }
    }

    /// Reserves oriented so the first element matches `token`
    pub fn reserves_for(&self, token: &TokenId) -> (u128, u128) {
        if token == &self.key.token0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    /// LP units held by `holder`
    pub fn lp_balance(&self, holder: &AccountId) -> u128 {
        self.lp_balances.get(holder).copied().unwrap_or(0)
    }

    /// Total LP supply
    pub fn lp_total_supply(&self) -> u128 {
        self.lp_total_supply
    }

    /// Quote the swap output for `amount_in` with the 0.3% pool fee
    pub fn get_amount_out(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
    ) -> Result<u128, ExchangeError> {
        if amount_in == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Err(ExchangeError::InsufficientLiquidity);
        }
        let amount_in_with_fee = amount_in.checked_mul(997).ok_or(ExchangeError::Overflow)?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .ok_or(ExchangeError::Overflow)?;
        let denominator = reserve_in
            .checked_mul(1_000)
            .and_then(|d| d.checked_add(amount_in_with_fee))
            .ok_or(ExchangeError::Overflow)?;
        Ok(numerator / denominator)
    }

    /// Run `f` under the pool's mutual-exclusion flag; a re-entrant call is
    /// rejected outright.
    pub(crate) fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut LiquidityPool) -> Result<T, ExchangeError>,
    ) -> Result<T, ExchangeError> {
        if self.entered {
            return Err(ExchangeError::Reentrancy);
        }
        self.entered = true;
        let result = f(self);
        self.entered = false;
        result
    }

    /// Mint LP units for the balance deltas since the last reconciliation.
    pub(crate) fn mint(&mut self, ledger: &Ledger, to: &AccountId, now: u64) -> Result<u128, ExchangeError> {
        let balance0 = ledger.balance_of(&self.key.token0, &self.account);
        let balance1 = ledger.balance_of(&self.key.token1, &self.account);
        let amount0 = balance0
            .checked_sub(self.reserve0)
            .ok_or(ExchangeError::Overflow)?;
        let amount1 = balance1
            .checked_sub(self.reserve1)
            .ok_or(ExchangeError::Overflow)?;

        let liquidity = if self.lp_total_supply == 0 {
            let product = amount0.checked_mul(amount1).ok_or(ExchangeError::Overflow)?;
            let liquidity = isqrt(product)
                .checked_sub(MINIMUM_LIQUIDITY)
                .ok_or(ExchangeError::InsufficientLiquidityMinted)?;
            if liquidity == 0 {
                return Err(ExchangeError::InsufficientLiquidityMinted);
            }
            // Lock the minimum forever to block zero-liquidity griefing
            *self.lp_balances.entry(AccountId::null()).or_insert(0) += MINIMUM_LIQUIDITY;
            self.lp_total_supply = MINIMUM_LIQUIDITY;
            liquidity
        } else {
            let by0 = mul_div(amount0, self.lp_total_supply, self.reserve0)
                .ok_or(ExchangeError::Overflow)?;
            let by1 = mul_div(amount1, self.lp_total_supply, self.reserve1)
                .ok_or(ExchangeError::Overflow)?;
            let liquidity = by0.min(by1);
            if liquidity == 0 {
                return Err(ExchangeError::InsufficientLiquidityMinted);
            }
            liquidity
        };

        // Both sums validated before either is written, so an error exit
        // keeps sum(lp_balances) == lp_total_supply
        let new_supply = self
            .lp_total_supply
            .checked_add(liquidity)
            .ok_or(ExchangeError::Overflow)?;
        let new_holding = self
            .lp_balance(to)
            .checked_add(liquidity)
            .ok_or(ExchangeError::Overflow)?;

        self.update_accumulators(now);
        self.lp_balances.insert(to.clone(), new_holding);
        self.lp_total_supply = new_supply;
        self.reserve0 = balance0;
        self.reserve1 = balance1;
        Ok(liquidity)
    }

    /// Swap `amount_in` (already transferred to the pool account) of
    /// `token_in` and send the output to `to`. The fee-adjusted invariant
    /// and all arithmetic are validated against the post-transfer balances
    /// before any tokens leave the pool, so an error exit never strands a
    /// partial transfer.
    pub(crate) fn swap(
        &mut self,
        ledger: &Ledger,
        token_in: &TokenId,
        amount_in: u128,
        to: &AccountId,
        now: u64,
    ) -> Result<u128, ExchangeError> {
        let in_is_0 = token_in == &self.key.token0;
        let (reserve_in, reserve_out) = self.reserves_for(token_in);
        let amount_out = Self::get_amount_out(amount_in, reserve_in, reserve_out)?;
        if amount_out == 0 {
            return Err(ExchangeError::InsufficientLiquidity);
        }
        if amount_out >= reserve_out {
            return Err(ExchangeError::InsufficientLiquidity);
        }

        // Balances the pool account will hold once the output leaves
        let held0 = ledger.balance_of(&self.key.token0, &self.account);
        let held1 = ledger.balance_of(&self.key.token1, &self.account);
        let (balance0, balance1) = if in_is_0 {
            (
                held0,
                held1
                    .checked_sub(amount_out)
                    .ok_or(ExchangeError::InsufficientLiquidity)?,
            )
        } else {
            (
                held0
                    .checked_sub(amount_out)
                    .ok_or(ExchangeError::InsufficientLiquidity)?,
                held1,
            )
        };
        let (in0, in1) = if in_is_0 { (amount_in, 0) } else { (0, amount_in) };

        // Fee-adjusted K check: (b0*1000 - in0*3)(b1*1000 - in1*3) >= r0*r1*1000^2
        let adjusted0 = balance0
            .checked_mul(1_000)
            .and_then(|b| b.checked_sub(in0.checked_mul(3)?))
            .ok_or(ExchangeError::Overflow)?;
        let adjusted1 = balance1
            .checked_mul(1_000)
            .and_then(|b| b.checked_sub(in1.checked_mul(3)?))
            .ok_or(ExchangeError::Overflow)?;
        let k_after = adjusted0
            .checked_mul(adjusted1)
            .ok_or(ExchangeError::Overflow)?;
        let k_before = self
            .reserve0
            .checked_mul(self.reserve1)
            .and_then(|k| k.checked_mul(1_000_000))
            .ok_or(ExchangeError::Overflow)?;
        if k_after < k_before {
            return Err(ExchangeError::KInvariantViolated);
        }

        let token_out = if in_is_0 {
            &self.key.token1
        } else {
            &self.key.token0
        };
        ledger.transfer(token_out, &self.account, to, amount_out)?;

        self.update_accumulators(now);
        self.reserve0 = balance0;
        self.reserve1 = balance1;
        Ok(amount_out)
    }

    /// Amounts a burn of `liquidity` would pay out right now
    pub(crate) fn preview_burn(
        &self,
        ledger: &Ledger,
        liquidity: u128,
    ) -> Result<(u128, u128), ExchangeError> {
        if self.lp_total_supply == 0 {
            return Err(ExchangeError::InsufficientLiquidity);
        }
        let balance0 = ledger.balance_of(&self.key.token0, &self.account);
        let balance1 = ledger.balance_of(&self.key.token1, &self.account);
        let amount0 =
            mul_div(liquidity, balance0, self.lp_total_supply).ok_or(ExchangeError::Overflow)?;
        let amount1 =
            mul_div(liquidity, balance1, self.lp_total_supply).ok_or(ExchangeError::Overflow)?;
        Ok((amount0, amount1))
    }

    /// Burn the LP units parked on the pool's own holding and pay the
    /// proportional share of both reserves to `to`.
    pub(crate) fn burn(
        &mut self,
        ledger: &Ledger,
        to: &AccountId,
        now: u64,
    ) -> Result<(u128, u128), ExchangeError> {
        let liquidity = self.lp_balance(&self.account);
        let (amount0, amount1) = self.preview_burn(ledger, liquidity)?;
        if amount0 == 0 || amount1 == 0 {
            return Err(ExchangeError::InsufficientLiquidityBurned);
        }

        ledger.execute(&[
            LedgerOp::Transfer {
                token: self.key.token0.clone(),
                from: self.account.clone(),
                to: to.clone(),
                amount: amount0,
            },
            LedgerOp::Transfer {
                token: self.key.token1.clone(),
                from: self.account.clone(),
                to: to.clone(),
                amount: amount1,
            },
        ])?;

        self.lp_balances.remove(&self.account);
        self.lp_total_supply -= liquidity;

        self.update_accumulators(now);
        self.reserve0 = ledger.balance_of(&self.key.token0, &self.account);
        self.reserve1 = ledger.balance_of(&self.key.token1, &self.account);
        Ok((amount0, amount1))
    }

    /// Move LP units between holders inside this pool
    pub(crate) fn transfer_lp(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError> {
        let available = self.lp_balance(from);
        if available < amount {
            return Err(ExchangeError::InsufficientLpBalance {
                available,
                requested: amount,
            });
        }
        if available == amount {
            self.lp_balances.remove(from);
        } else {
            self.lp_balances.insert(from.clone(), available - amount);
        }
        *self.lp_balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    /// Advance the time-weighted price accumulators using the reserves in
    /// force since the last update.
    fn update_accumulators(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.last_update) as u128;
        if elapsed > 0 && self.reserve0 > 0 && self.reserve1 > 0 {
            if let Some(price0) = mul_div(self.reserve1, PRICE_PRECISION, self.reserve0) {
                self.price0_cumulative = self
                    .price0_cumulative
                    .saturating_add(price0.saturating_mul(elapsed));
            }
            if let Some(price1) = mul_div(self.reserve0, PRICE_PRECISION, self.reserve1) {
                self.price1_cumulative = self
                    .price1_cumulative
                    .saturating_add(price1.saturating_mul(elapsed));
            }
        }
        self.last_update = now;
    }

    #[cfg(test)]
    pub(crate) fn lp_balance_sum(&self) -> u128 {
        self.lp_balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_key_canonical_order() {
        let usdt = TokenId::new("USDT");
        let btc = TokenId::new("BTC");
        let k1 = PoolKey::new(&usdt, &btc).unwrap();
        let k2 = PoolKey::new(&btc, &usdt).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.token0, btc);
        assert_eq!(k1.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_pool_key_identical_tokens_rejected() {
        let usdt = TokenId::new("USDT");
        assert!(matches!(
            PoolKey::new(&usdt, &usdt),
            Err(ExchangeError::IdenticalTokens)
        ));
    }

    #[test]
    fn test_get_amount_out_reference_value() {
        // (1000, 1000) reserves, 100 in:
        // floor(100*997*1000 / (1000*1000 + 100*997)) = 90
        assert_eq!(
            LiquidityPool::get_amount_out(100, 1_000, 1_000).unwrap(),
            90
        );
    }

    #[test]
    fn test_get_amount_out_empty_reserves() {
        assert!(matches!(
            LiquidityPool::get_amount_out(100, 0, 1_000),
            Err(ExchangeError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn test_guard_rejects_reentry() {
        let key = PoolKey::new(&TokenId::new("A"), &TokenId::new("B")).unwrap();
        let mut pool = LiquidityPool::new(key, 0);
        let result = pool.guarded(|p| p.guarded(|_| Ok(())));
        assert!(matches!(result, Err(ExchangeError::Reentrancy)));
        // Flag released after the outer call
        assert!(pool.guarded(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_first_mint_locks_minimum_liquidity() {
        let ledger = Ledger::new();
        let a = TokenId::new("A");
        let b = TokenId::new("B");
        let key = PoolKey::new(&a, &b).unwrap();
        let mut pool = LiquidityPool::new(key, 0);
        let lp = AccountId::new("lp");

        ledger.mint(&a, &pool.account, 100_000).unwrap();
        ledger.mint(&b, &pool.account, 100_000).unwrap();

        let liquidity = pool.mint(&ledger, &lp, 10).unwrap();
        // isqrt(1e10) = 100_000, minus the locked 1000
        assert_eq!(liquidity, 99_000);
        assert_eq!(pool.lp_balance(&AccountId::null()), MINIMUM_LIQUIDITY);
        assert_eq!(pool.lp_total_supply(), 100_000);
        assert_eq!(pool.lp_balance_sum(), pool.lp_total_supply());
    }

    #[test]
    fn test_failed_swap_moves_nothing() {
        let ledger = Ledger::new();
        let a = TokenId::new("A");
        let b = TokenId::new("B");
        let key = PoolKey::new(&a, &b).unwrap();
        let mut pool = LiquidityPool::new(key, 0);
        let lp = AccountId::new("lp");
        let trader = AccountId::new("trader");

        // Reserves large enough that the scaled product check overflows u128
        let reserve = 20_000_000_000_000_000u128;
        ledger.mint(&a, &pool.account, reserve).unwrap();
        ledger.mint(&b, &pool.account, reserve).unwrap();
        pool.mint(&ledger, &lp, 0).unwrap();

        let amount_in = 1_000_000_000_000u128;
        ledger.mint(&a, &pool.account, amount_in).unwrap();
        assert!(matches!(
            pool.swap(&ledger, &a, amount_in, &trader, 0),
            Err(ExchangeError::Overflow)
        ));

        // The output never left the pool and the reserves are untouched
        assert_eq!(ledger.balance_of(&b, &trader), 0);
        assert_eq!(ledger.balance_of(&b, &pool.account), reserve);
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.reserve0, reserve);
        assert_eq!(snapshot.reserve1, reserve);
    }

    #[test]
    fn test_failed_mint_keeps_lp_sum_equal_to_supply() {
        let ledger = Ledger::new();
        let a = TokenId::new("A");
        let b = TokenId::new("B");
        let key = PoolKey::new(&a, &b).unwrap();
        let mut pool = LiquidityPool::new(key, 0);
        let lp = AccountId::new("lp");

        ledger.mint(&a, &pool.account, 100_000).unwrap();
        ledger.mint(&b, &pool.account, 100_000).unwrap();
        pool.mint(&ledger, &lp, 0).unwrap();

        // No new deposit: zero deltas mint zero liquidity
        assert!(matches!(
            pool.mint(&ledger, &lp, 10),
            Err(ExchangeError::InsufficientLiquidityMinted)
        ));
        assert_eq!(pool.lp_total_supply(), 100_000);
        assert_eq!(pool.lp_balance_sum(), pool.lp_total_supply());
        assert_eq!(pool.lp_balance(&lp), 99_000);
    }

    #[test]
    fn test_dust_first_mint_rejected() {
        let ledger = Ledger::new();
        let a = TokenId::new("A");
        let b = TokenId::new("B");
        let key = PoolKey::new(&a, &b).unwrap();
        let mut pool = LiquidityPool::new(key, 0);
        let lp = AccountId::new("lp");

        ledger.mint(&a, &pool.account, 10).unwrap();
        ledger.mint(&b, &pool.account, 10).unwrap();

        assert!(matches!(
            pool.mint(&ledger, &lp, 0),
            Err(ExchangeError::InsufficientLiquidityMinted)
        ));
    }
}
