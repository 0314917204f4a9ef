//! Balance and allowance store
//!
//! Balances are unsigned integers keyed by (token, account). All mutations
//! are atomic: a multi-leg `execute` batch either applies fully or not at
//! all (undo-log rollback on the first failing leg).

use crate::error::LedgerError;
use defibank_core::{AccountId, TokenId, UNLIMITED_ALLOWANCE};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// One balance-moving leg of a batch.
#[derive(Debug, Clone)]
pub enum LedgerOp {
    Transfer {
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    Mint {
        token: TokenId,
        to: AccountId,
        amount: u128,
    },
    Burn {
        token: TokenId,
        from: AccountId,
        amount: u128,
    },
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<(TokenId, AccountId), u128>,
    allowances: HashMap<(TokenId, AccountId, AccountId), u128>,
}

impl LedgerState {
    fn balance(&self, token: &TokenId, account: &AccountId) -> u128 {
        self.balances
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn credit(&mut self, token: &TokenId, account: &AccountId, amount: u128) -> Result<(), LedgerError> {
        let entry = self
            .balances
            .entry((token.clone(), account.clone()))
            .or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                token: token.to_string(),
                account: account.to_string(),
            })?;
        Ok(())
    }

    fn debit(&mut self, token: &TokenId, account: &AccountId, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance(token, account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token: token.to_string(),
                account: account.to_string(),
                available,
                required: amount,
            });
        }
        self.balances
            .insert((token.clone(), account.clone()), available - amount);
        Ok(())
    }

    fn apply(&mut self, op: &LedgerOp) -> Result<(), LedgerError> {
        match op {
            LedgerOp::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                self.debit(token, from, *amount)?;
                self.credit(token, to, *amount)
            }
            LedgerOp::Mint { token, to, amount } => self.credit(token, to, *amount),
            LedgerOp::Burn {
                token,
                from,
                amount,
            } => self.debit(token, from, *amount),
        }
    }

    /// Inverse of `apply`, used to roll back already-applied legs.
    /// Only called on legs that previously succeeded, so this cannot fail
    /// short of a logic error.
    fn unapply(&mut self, op: &LedgerOp) {
        let inverse = match op.clone() {
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
            LedgerOp::Mint { token, to, amount } => LedgerOp::Burn {
                token,
                from: to,
                amount,
            },
            LedgerOp::Burn {
                token,
                from,
                amount,
            } => LedgerOp::Mint {
                token,
                to: from,
                amount,
            },
        };
        let _ = self.apply(&inverse);
    }
}

/// Interior-locked token ledger, shared across engines via `Arc`.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: Mutex<LedgerState>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance of `account` in `token` (0 if never touched)
    pub fn balance_of(&self, token: &TokenId, account: &AccountId) -> u128 {
        self.lock().balance(token, account)
    }

    /// Create `amount` new units of `token` for `to`
    pub fn mint(&self, token: &TokenId, to: &AccountId, amount: u128) -> Result<(), LedgerError> {
        self.lock().apply(&LedgerOp::Mint {
            token: token.clone(),
            to: to.clone(),
            amount,
        })
    }

    /// Destroy `amount` units of `token` held by `from`
    pub fn burn(&self, token: &TokenId, from: &AccountId, amount: u128) -> Result<(), LedgerError> {
        self.lock().apply(&LedgerOp::Burn {
            token: token.clone(),
            from: from.clone(),
            amount,
        })
    }

    /// Move `amount` of `token` from `from` to `to`
    pub fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.lock().apply(&LedgerOp::Transfer {
            token: token.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
        })
    }

    /// Set the allowance of `spender` over `owner`'s balance.
    /// `UNLIMITED_ALLOWANCE` (u128::MAX) is the unlimited sentinel.
    pub fn approve(&self, token: &TokenId, owner: &AccountId, spender: &AccountId, amount: u128) {
        self.lock()
            .allowances
            .insert((token.clone(), owner.clone(), spender.clone()), amount);
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub fn allowance(&self, token: &TokenId, owner: &AccountId, spender: &AccountId) -> u128 {
        self.lock()
            .allowances
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Spend `spender`'s allowance to move `owner`'s tokens.
    ///
    /// Fails `InsufficientAllowance` unless the allowance covers `amount`
    /// or is the unlimited sentinel; the sentinel is never decremented.
    pub fn transfer_from(
        &self,
        token: &TokenId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        let key = (token.clone(), from.clone(), spender.clone());
        let allowed = state.allowances.get(&key).copied().unwrap_or(0);
        if allowed != UNLIMITED_ALLOWANCE && allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                token: token.to_string(),
                owner: from.to_string(),
                spender: spender.to_string(),
                allowed,
                required: amount,
            });
        }
        state.apply(&LedgerOp::Transfer {
            token: token.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
        })?;
        if allowed != UNLIMITED_ALLOWANCE {
            state.allowances.insert(key, allowed - amount);
        }
        Ok(())
    }

    /// Apply a batch of legs all-or-nothing.
    ///
    /// On the first failing leg every already-applied leg is rolled back
    /// and the error is returned; the store is untouched.
    pub fn execute(&self, ops: &[LedgerOp]) -> Result<(), LedgerError> {
        let mut state = self.lock();
        let mut applied: Vec<&LedgerOp> = Vec::with_capacity(ops.len());
        for op in ops {
            if let Err(err) = state.apply(op) {
                for done in applied.into_iter().rev() {
                    state.unapply(done);
                }
                debug!(error = %err, "ledger batch rolled back");
                return Err(err);
            }
            applied.push(op);
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // Balance math cannot panic mid-mutation, so the lock cannot be
        // poisoned by this crate; recover the guard either way.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
