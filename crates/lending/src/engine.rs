//! Lending engine
//!
//! Collateral is escrowed in a vault at request time. Approval is admin-
//! gated, consults the credit engine for eligibility, and prices the loan
//! from a tier-indexed rate table. Repayment and liquidation are the two
//! mutually exclusive ways out of the Active state.

use crate::error::LendingError;
use crate::loan::{Loan, LoanRequest, LoanStatus};
use defibank_core::{mul_div, AccountId, AdminPolicy, Clock, TokenId, BPS_DENOMINATOR};
use defibank_credit::{ActivityKind, CreditScoreEngine};
use defibank_events::{EventKind, EventRecord, EventSink};
use defibank_ledger::{Ledger, LedgerOp};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Annual rate by credit tier, in bps (tier 0 never borrows but keeps the
/// table total)
pub const TIER_RATE_TABLE_BPS: [u32; 6] = [2_000, 1_600, 1_300, 1_000, 800, 600];

/// Lending engine configuration
#[derive(Debug, Clone)]
pub struct LendingConfig {
    /// Required collateral as bps of principal (15000 = 150%)
    pub collateral_ratio_bps: u32,
    /// Overdue loans repaid below this fraction of owed may be liquidated
    pub liquidation_threshold_bps: u32,
    /// Minimum loan term in seconds
    pub min_duration: u64,
    /// Maximum loan term in seconds
    pub max_duration: u64,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            collateral_ratio_bps: 15_000,
            liquidation_threshold_bps: 8_000,
            min_duration: 24 * 3600,
            max_duration: 365 * 24 * 3600,
        }
    }
}

#[derive(Debug)]
struct LendingState {
    requests: HashMap<u64, LoanRequest>,
    loans: HashMap<u64, Loan>,
    supported_collateral: HashSet<TokenId>,
    next_request_id: u64,
    next_loan_id: u64,
    config: LendingConfig,
}

/// Loan lifecycle, collateral custody and liquidation
pub struct LendingEngine {
    ledger: Arc<Ledger>,
    credit: Arc<CreditScoreEngine>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    admin: Arc<dyn AdminPolicy>,
    /// Token loans are denominated and repaid in
    loan_token: TokenId,
    /// Principal source and repayment destination
    treasury: AccountId,
    /// Escrow for collateral of requested/active loans
    collateral_vault: AccountId,
    /// Destination of forfeited collateral
    insurance: AccountId,
    state: Mutex<LendingState>,
    paused: AtomicBool,
}

impl LendingEngine {
    /// Create a lending engine
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<Ledger>,
        credit: Arc<CreditScoreEngine>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        admin: Arc<dyn AdminPolicy>,
        loan_token: TokenId,
        treasury: AccountId,
        collateral_vault: AccountId,
        insurance: AccountId,
        config: LendingConfig,
    ) -> Self {
        Self {
            ledger,
            credit,
            events,
            clock,
            admin,
            loan_token,
            treasury,
            collateral_vault,
            insurance,
            state: Mutex::new(LendingState {
                requests: HashMap::new(),
                loans: HashMap::new(),
                supported_collateral: HashSet::new(),
                next_request_id: 1,
                next_loan_id: 1,
                config,
            }),
            paused: AtomicBool::new(false),
        }
    }

    /// Request a loan, escrowing collateral. Returns the request id.
    pub fn request_loan(
        &self,
        borrower: &AccountId,
        amount: u128,
        duration: u64,
        collateral_token: &TokenId,
        collateral_amount: u128,
    ) -> Result<u64, LendingError> {
        self.ensure_running()?;
        if amount == 0 {
            return Err(LendingError::ZeroAmount);
        }
        let now = self.clock.now();

        let request_id = {
            let mut state = self.lock();
            let config = &state.config;
            if duration < config.min_duration || duration > config.max_duration {
                return Err(LendingError::InvalidDuration {
                    duration,
                    min: config.min_duration,
                    max: config.max_duration,
                });
            }
            if !state.supported_collateral.contains(collateral_token) {
                return Err(LendingError::UnsupportedCollateral(
                    collateral_token.to_string(),
                ));
            }
            let required = mul_div(
                amount,
                state.config.collateral_ratio_bps as u128,
                BPS_DENOMINATOR,
            )
            .ok_or(LendingError::Overflow)?;
            if collateral_amount < required {
                return Err(LendingError::InsufficientCollateral {
                    required,
                    provided: collateral_amount,
                });
            }

            self.ledger.transfer(
                collateral_token,
                borrower,
                &self.collateral_vault,
                collateral_amount,
            )?;

            let request_id = state.next_request_id;
            state.next_request_id += 1;
            state.requests.insert(
                request_id,
                LoanRequest {
                    id: request_id,
                    borrower: borrower.clone(),
                    amount,
                    duration,
                    collateral_token: collateral_token.clone(),
                    collateral_amount,
                    processed: false,
                },
            );
            request_id
        };

        info!(borrower = %borrower, request_id, amount, "loan requested");
        self.events.emit(EventRecord::new(
            EventKind::LoanRequested,
            request_id.to_string(),
            borrower.clone(),
            vec![amount, collateral_amount],
            now,
        ));
        Ok(request_id)
    }

    /// Approve a pending request (admin-only). Prices the loan from the
    /// borrower's credit tier, pays out principal and activates the loan.
    pub fn approve_loan(&self, actor: &AccountId, request_id: u64) -> Result<u64, LendingError> {
        self.ensure_running()?;
        self.ensure_admin(actor)?;
        let now = self.clock.now();

        let (loan_id, borrower, amount, rate_bps) = {
            let mut state = self.lock();
            let request = state
                .requests
                .get(&request_id)
                .ok_or(LendingError::RequestNotFound(request_id))?;
            if request.processed {
                return Err(LendingError::AlreadyProcessed(request_id));
            }

            let eligibility = self
                .credit
                .check_lending_eligibility(&request.borrower, request.amount);
            if !eligibility.eligible {
                return Err(LendingError::NotEligible {
                    tier: eligibility.tier,
                    max_amount: eligibility.max_amount,
                    requested: request.amount,
                });
            }
            let rate_bps = TIER_RATE_TABLE_BPS[eligibility.tier.min(5) as usize];

            self.ledger
                .transfer(&self.loan_token, &self.treasury, &request.borrower, request.amount)?;

            let (borrower, amount, duration, collateral_token, collateral_amount) = (
                request.borrower.clone(),
                request.amount,
                request.duration,
                request.collateral_token.clone(),
                request.collateral_amount,
            );
            if let Some(request) = state.requests.get_mut(&request_id) {
                request.processed = true;
            }

            let loan_id = state.next_loan_id;
            state.next_loan_id += 1;
            state.loans.insert(
                loan_id,
                Loan {
                    id: loan_id,
                    borrower: borrower.clone(),
                    principal: amount,
                    interest_rate_bps: rate_bps,
                    collateral_amount,
                    collateral_token,
                    start_time: now,
                    duration,
                    repaid_amount: 0,
                    status: LoanStatus::Active,
                },
            );
            (loan_id, borrower, amount, rate_bps)
        };

        self.credit
            .record_activity(&borrower, ActivityKind::Lending, amount);
        info!(actor = %actor, loan_id, borrower = %borrower, amount, rate_bps, "loan approved");
        self.events.emit(EventRecord::new(
            EventKind::LoanApproved,
            loan_id.to_string(),
            borrower,
            vec![amount, rate_bps as u128],
            now,
        ));
        Ok(loan_id)
    }

    /// Repay part or all of an active loan (borrower-only).
    ///
    /// Full repayment transitions to Repaid and releases collateral in the
    /// same atomic batch as the repayment transfer.
    pub fn repay_loan(
        &self,
        borrower: &AccountId,
        loan_id: u64,
        amount: u128,
    ) -> Result<(), LendingError> {
        self.ensure_running()?;
        if amount == 0 {
            return Err(LendingError::ZeroAmount);
        }
        let now = self.clock.now();

        let (closed, outstanding_after) = {
            let mut state = self.lock();
            let loan = state
                .loans
                .get(&loan_id)
                .ok_or(LendingError::LoanNotFound(loan_id))?;
            if loan.status != LoanStatus::Active {
                return Err(LendingError::LoanNotActive(loan_id));
            }
            if &loan.borrower != borrower {
                return Err(LendingError::Unauthorized(borrower.to_string()));
            }

            let owed = loan.total_owed(now).ok_or(LendingError::Overflow)?;
            let outstanding = owed - loan.repaid_amount;
            if amount > outstanding {
                return Err(LendingError::RepaymentExceedsOwed {
                    outstanding,
                    amount,
                });
            }

            let closes = amount == outstanding;
            let mut ops = vec![LedgerOp::Transfer {
                token: self.loan_token.clone(),
                from: borrower.clone(),
                to: self.treasury.clone(),
                amount,
            }];
            if closes {
                // Release collateral together with the closing payment
                ops.push(LedgerOp::Transfer {
                    token: loan.collateral_token.clone(),
                    from: self.collateral_vault.clone(),
                    to: borrower.clone(),
                    amount: loan.collateral_amount,
                });
            }
            self.ledger.execute(&ops)?;

            let loan = state
                .loans
                .get_mut(&loan_id)
                .ok_or(LendingError::LoanNotFound(loan_id))?;
            loan.repaid_amount += amount;
            if closes {
                loan.status = LoanStatus::Repaid;
            }
            (closes, outstanding - amount)
        };

        self.credit
            .record_activity(borrower, ActivityKind::Repayment, amount);
        info!(borrower = %borrower, loan_id, amount, closed, "loan repayment");
        self.events.emit(EventRecord::new(
            EventKind::LoanRepaid,
            loan_id.to_string(),
            borrower.clone(),
            vec![amount, outstanding_after],
            now,
        ));
        Ok(())
    }

    /// Liquidate an overdue, under-repaid loan. Callable by anyone; the
    /// collateral is forfeited to the insurance account and a default is
    /// recorded against the borrower.
    pub fn liquidate_loan(&self, caller: &AccountId, loan_id: u64) -> Result<(), LendingError> {
        self.ensure_running()?;
        let now = self.clock.now();

        let (borrower, shortfall, collateral_amount) = {
            let mut state = self.lock();
            let threshold_bps = state.config.liquidation_threshold_bps;
            let loan = state
                .loans
                .get(&loan_id)
                .ok_or(LendingError::LoanNotFound(loan_id))?;
            if loan.status != LoanStatus::Active {
                return Err(LendingError::LoanNotActive(loan_id));
            }
            if !loan.is_overdue(now) {
                return Err(LendingError::NotOverdue(loan_id));
            }

            let owed = loan.total_owed(now).ok_or(LendingError::Overflow)?;
            let threshold =
                mul_div(owed, threshold_bps as u128, BPS_DENOMINATOR).ok_or(LendingError::Overflow)?;
            if loan.repaid_amount >= threshold {
                return Err(LendingError::AboveLiquidationThreshold {
                    repaid: loan.repaid_amount,
                    threshold,
                });
            }

            self.ledger.transfer(
                &loan.collateral_token,
                &self.collateral_vault,
                &self.insurance,
                loan.collateral_amount,
            )?;

            let shortfall = owed - loan.repaid_amount;
            let (borrower, collateral_amount) = (loan.borrower.clone(), loan.collateral_amount);
            let loan = state
                .loans
                .get_mut(&loan_id)
                .ok_or(LendingError::LoanNotFound(loan_id))?;
            loan.status = LoanStatus::Liquidated;
            (borrower, shortfall, collateral_amount)
        };

        self.credit.record_default(&borrower, shortfall);
        info!(caller = %caller, loan_id, borrower = %borrower, shortfall, "loan liquidated");
        self.events.emit(EventRecord::new(
            EventKind::LoanLiquidated,
            loan_id.to_string(),
            caller.clone(),
            vec![collateral_amount, shortfall],
            now,
        ));
        Ok(())
    }

    /// Allow a token as loan collateral (admin-only)
    pub fn add_supported_collateral(
        &self,
        actor: &AccountId,
        token: &TokenId,
    ) -> Result<(), LendingError> {
        self.ensure_admin(actor)?;
        self.lock().supported_collateral.insert(token.clone());
        Ok(())
    }

    /// Change the required collateral ratio (admin-only)
    pub fn set_collateral_ratio(&self, actor: &AccountId, bps: u32) -> Result<(), LendingError> {
        self.ensure_admin(actor)?;
        self.lock().config.collateral_ratio_bps = bps;
        Ok(())
    }

    /// Change the liquidation threshold (admin-only)
    pub fn set_liquidation_threshold(
        &self,
        actor: &AccountId,
        bps: u32,
    ) -> Result<(), LendingError> {
        self.ensure_admin(actor)?;
        self.lock().config.liquidation_threshold_bps = bps;
        Ok(())
    }

    /// Pause or resume mutating operations (admin-only)
    pub fn set_paused(&self, actor: &AccountId, paused: bool) -> Result<(), LendingError> {
        self.ensure_admin(actor)?;
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot of a loan
    pub fn loan(&self, loan_id: u64) -> Option<Loan> {
        self.lock().loans.get(&loan_id).cloned()
    }

    /// Snapshot of a request
    pub fn request(&self, request_id: u64) -> Option<LoanRequest> {
        self.lock().requests.get(&request_id).cloned()
    }

    /// Amount still owed on a loan right now (0 for closed loans)
    pub fn outstanding(&self, loan_id: u64) -> Result<u128, LendingError> {
        let now = self.clock.now();
        let state = self.lock();
        let loan = state
            .loans
            .get(&loan_id)
            .ok_or(LendingError::LoanNotFound(loan_id))?;
        if loan.status != LoanStatus::Active {
            return Ok(0);
        }
        let owed = loan.total_owed(now).ok_or(LendingError::Overflow)?;
        Ok(owed - loan.repaid_amount)
    }

    fn ensure_running(&self) -> Result<(), LendingError> {
        if self.paused.load(Ordering::SeqCst) {
            return Err(LendingError::Paused);
        }
        Ok(())
    }

    fn ensure_admin(&self, actor: &AccountId) -> Result<(), LendingError> {
        if !self.admin.is_admin(actor) {
            return Err(LendingError::Unauthorized(actor.to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LendingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
