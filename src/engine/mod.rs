//! Hedge engine: the day-by-day driver that composes a yield curve, a
//! portfolio of loan/deposit contracts, and a swap book, with quarterly
//! clearing and an optional CVaR-rebalancing hook.

mod state;
pub use state::EngineState;

use chrono::{Datelike, NaiveDate};
use log::{debug, trace, warn};

use crate::curves::YieldCurve;
use crate::error::{require_finite, EngineError, EngineResult};
use crate::optimizer::Decision;
use crate::portfolio::Portfolio;
use crate::swaps::SwapBook;

/// Length of a quarter in the engine's day-driven clock.
pub const QUARTER_LEN_DAYS: u32 = 91;
/// Average days per calendar month, used for continuous ageing of
/// `remaining_months` fields.
pub const DAYS_PER_MONTH: f64 = 365.25 / 12.0;

/// Anything that can turn the engine's current state into a rebalancing
/// decision. Implemented by [`crate::optimizer::CvarOptimizer`]; the engine
/// never depends on the concrete optimizer, only on this capability.
pub trait Optimizer {
    fn rebalance_once(&mut self, engine: &HedgeEngine) -> Decision;
}

/// Adds `months` calendar months to `date`, clamping the day-of-month to the
/// last valid day of the target month (mirrors `dateutil.relativedelta`'s
/// month-end preservation).
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() as i64 * 12 + (date.month() as i64 - 1) + months as i64;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let last_day = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, date.day().min(last_day))
        .expect("year/month/day computed from a valid prior date")
}

/// Subtracts `months` calendar months from `date`, with the same month-end
/// clamping as [`add_months`].
pub fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() as i64 * 12 + (date.month() as i64 - 1) - months as i64;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let last_day = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, date.day().min(last_day))
        .expect("year/month/day computed from a valid prior date")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
    let this = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (next - this).num_days() as u32
}

/// Checks that a `remaining_months` field moved by about one day's worth of
/// continuous ageing (`1 / DAYS_PER_MONTH`), within a tolerance of twice
/// that. Guards against state corruption, not anything the day loop does on
/// purpose.
pub fn check_remaining_months_drift(prev: f64, next: f64) -> EngineResult<()> {
    let expected = prev - 1.0 / DAYS_PER_MONTH;
    if (next - expected).abs() > 2.0 / DAYS_PER_MONTH {
        return Err(EngineError::InvariantViolation(format!(
            "remaining_months drifted from {prev} to {next}, expected near {expected}"
        )));
    }
    Ok(())
}

/// A day's worth of mutable engine state, cloned before each simulated day
/// so a failed day can be rolled back without leaving partial mutations.
#[derive(Clone)]
struct DaySnapshot {
    t_curr: NaiveDate,
    bank_account: f64,
    swap_account: f64,
    accrued_swap: f64,
    days_since_quarter_start: u32,
    portfolio: Portfolio,
    swaps: SwapBook,
    curve: Box<dyn YieldCurve>,
}

/// The asset-liability hedging engine: owns the portfolio, swap book and
/// curve, and drives them forward one simulated day at a time.
pub struct HedgeEngine {
    t0: NaiveDate,
    t_curr: NaiveDate,
    bank_account: f64,
    swap_account: f64,
    accrued_swap: f64,
    days_since_quarter_start: u32,
    portfolio: Portfolio,
    swaps: SwapBook,
    curve: Box<dyn YieldCurve>,
    optimizer: Option<Box<dyn Optimizer>>,
}

impl HedgeEngine {
    /// Builds a new engine. `t_curr` starts at `portfolio.t0`, both accounts
    /// start at zero, and the swap book starts empty.
    pub fn new(
        portfolio: Portfolio,
        curve: Box<dyn YieldCurve>,
        optimizer: Option<Box<dyn Optimizer>>,
    ) -> Self {
        let t0 = portfolio.t0;
        Self {
            t0,
            t_curr: t0,
            bank_account: 0.0,
            swap_account: 0.0,
            accrued_swap: 0.0,
            days_since_quarter_start: 0,
            portfolio,
            swaps: SwapBook::new(),
            curve,
            optimizer,
        }
    }

    pub fn t0(&self) -> NaiveDate {
        self.t0
    }

    pub fn t_curr(&self) -> NaiveDate {
        self.t_curr
    }

    pub fn days_since_quarter_start(&self) -> u32 {
        self.days_since_quarter_start
    }

    pub fn curve(&self) -> &dyn YieldCurve {
        self.curve.as_ref()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn swaps(&self) -> &SwapBook {
        &self.swaps
    }

    /// Opens a new swap at the current date off the engine's own curve.
    pub fn add_swap(&mut self, direction: &str, term_months: u32, notional: f64) -> EngineResult<u64> {
        self.swaps.add_swap(direction, term_months, notional, self.t_curr, self.curve.as_ref())
    }

    /// Advances the simulation `n` days.
    pub fn step(&mut self, n: u32) -> EngineResult<()> {
        for _ in 0..n {
            self.step_one_day()?;
        }
        Ok(())
    }

    /// Advances exactly as many days as remain until the next quarterly
    /// settle, so that settle fires on the final day of the call.
    pub fn step_to_quarter_end(&mut self) -> EngineResult<()> {
        let days_left = QUARTER_LEN_DAYS - self.days_since_quarter_start;
        if days_left > 0 {
            self.step(days_left)?;
        }
        Ok(())
    }

    fn snapshot_for_rollback(&self) -> DaySnapshot {
        DaySnapshot {
            t_curr: self.t_curr,
            bank_account: self.bank_account,
            swap_account: self.swap_account,
            accrued_swap: self.accrued_swap,
            days_since_quarter_start: self.days_since_quarter_start,
            portfolio: self.portfolio.clone(),
            swaps: self.swaps.clone(),
            curve: self.curve.clone(),
        }
    }

    fn restore(&mut self, snap: DaySnapshot) {
        self.t_curr = snap.t_curr;
        self.bank_account = snap.bank_account;
        self.swap_account = snap.swap_account;
        self.accrued_swap = snap.accrued_swap;
        self.days_since_quarter_start = snap.days_since_quarter_start;
        self.portfolio = snap.portfolio;
        self.swaps = snap.swaps;
        self.curve = snap.curve;
    }

    /// Runs one simulated day per the ordering in the component design:
    /// accrue swaps, realize due contract payouts, age contracts, roll
    /// matured contracts, age/roll swaps, quarterly settle, overnight
    /// compounding, step the curve, advance the clock. Commits only if every
    /// step succeeds; otherwise rolls back to the state at the start of the
    /// day.
    fn step_one_day(&mut self) -> EngineResult<()> {
        let rollback = self.snapshot_for_rollback();
        match self.try_step_one_day() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.restore(rollback);
                Err(e)
            }
        }
    }

    fn try_step_one_day(&mut self) -> EngineResult<()> {
        let r_overnight = self.curve.rate_overnight();

        // 1. Accrue swaps, then overnight-compound the swap account.
        self.accrued_swap += self.swaps.daily_accrual_total();
        self.swap_account *= 1.0 + r_overnight / 365.0;

        // 2. Contract monthly payouts.
        self.realize_due_payouts();

        // 3. Age contracts.
        for c in self.portfolio.contracts_mut() {
            let prev = c.remaining_months;
            c.remaining_months -= 1.0 / DAYS_PER_MONTH;
            check_remaining_months_drift(prev, c.remaining_months)?;
        }

        // 4. Roll matured contracts.
        self.roll_matured_contracts()?;

        // 5. Age and roll swaps.
        self.swaps.age_and_rollover(self.t_curr, self.curve.as_ref())?;

        // 6. Quarterly settle.
        self.quarterly_settle()?;

        // 7. Overnight compounding of the bank account.
        self.bank_account *= 1.0 + r_overnight / 365.0;

        // 8. Step the curve.
        self.curve.step(1);

        // 9. Advance the clock.
        self.t_curr += chrono::Duration::days(1);

        trace!(target: "alm_hedge_engine::engine", "day {} settled: bank={:.4} swap={:.4}", self.t_curr, self.bank_account, self.swap_account);
        Ok(())
    }

    fn realize_due_payouts(&mut self) {
        let t_curr = self.t_curr;
        let mut cash_delta = 0.0;
        for c in self.portfolio.contracts_mut() {
            if c.next_payout_date <= t_curr {
                cash_delta += c.monthly_coupon();
                c.next_payout_date = add_months(c.next_payout_date, 1);
            }
        }
        self.bank_account += cash_delta;
    }

    fn roll_matured_contracts(&mut self) -> EngineResult<()> {
        let t_curr = self.t_curr;
        let curve = self.curve.as_ref();
        let mut cash_delta = 0.0;
        for c in self.portfolio.contracts_mut() {
            if c.remaining_months <= 0.0 {
                cash_delta += c.monthly_coupon();
                let new_rate = require_finite("contract rate", curve.rate(c.contract_months)?)?;
                c.start_date = t_curr;
                c.maturity_date = add_months(t_curr, c.contract_months);
                c.remaining_months = c.contract_months as f64;
                c.rate = new_rate;
            }
        }
        self.bank_account += cash_delta;
        Ok(())
    }

    fn quarterly_settle(&mut self) -> EngineResult<()> {
        self.days_since_quarter_start += 1;
        if self.days_since_quarter_start < QUARTER_LEN_DAYS {
            return Ok(());
        }

        if let Some(mut optimizer) = self.optimizer.take() {
            let decision = optimizer.rebalance_once(self);
            self.optimizer = Some(optimizer);
            self.apply_decision(decision)?;
        }

        debug!(
            target: "alm_hedge_engine::engine",
            "quarterly settle at {}: accrued_swap={:.4} -> swap_account",
            self.t_curr, self.accrued_swap
        );
        self.swap_account += self.accrued_swap;
        self.accrued_swap = 0.0;

        if !self.swaps.is_empty() {
            self.swaps.reset_float_quarterly(self.curve.as_ref())?;
        }

        self.days_since_quarter_start = 0;
        Ok(())
    }

    fn apply_decision(&mut self, decision: Decision) -> EngineResult<()> {
        let t_curr = self.t_curr;
        let curve = self.curve.clone();
        for (term, notional) in [(6, decision.x_6), (12, decision.x_12), (24, decision.x_24)] {
            if notional == 0.0 {
                continue;
            }
            self.swaps.add_signed_swap(term, notional, t_curr, curve.as_ref())?;
        }
        if decision.x_6 == 0.0 && decision.x_12 == 0.0 && decision.x_24 == 0.0 {
            warn!(target: "alm_hedge_engine::engine", "rebalance at {t_curr} returned an all-zero decision");
        }
        Ok(())
    }

    /// Read-only snapshot of the engine's state, as of the last committed
    /// day boundary.
    pub fn snapshot_state(&self) -> EngineState {
        EngineState {
            date: self.t_curr,
            bank_account: self.bank_account,
            swap_account: self.swap_account,
            accrued_swap: self.accrued_swap,
            curve: self.curve.snapshot(),
            total_loan_volume: self.portfolio.total_loan_volume(),
            total_deposit_volume: self.portfolio.total_deposit_volume(),
            swap_count: self.swaps.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::MeanRevertingCurve;
    use crate::portfolio::{Contract, ContractType};
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;

    fn anchors() -> BTreeMap<u32, f64> {
        BTreeMap::from([(0, 0.09), (3, 0.095), (6, 0.10), (12, 0.105), (24, 0.11)])
    }

    fn test_engine(n_loans: usize, n_deps: usize) -> HedgeEngine {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = MeanRevertingCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        let mut contracts = Vec::new();
        for i in 0..n_loans {
            contracts.push(Contract::new(i as u64 + 1, ContractType::Loan, 10_000.0, 12, 6.0, t0, 0.08).unwrap());
        }
        for i in 0..n_deps {
            contracts.push(Contract::new(n_loans as u64 + i as u64 + 1, ContractType::Deposit, 8_000.0, 12, 6.0, t0, 0.03).unwrap());
        }
        let portfolio = Portfolio::new(t0, Some(100_000.0), contracts);
        HedgeEngine::new(portfolio, Box::new(curve), None)
    }

    #[test]
    fn account_continuity_with_no_swaps_no_payouts_no_settle() {
        let mut engine = test_engine(0, 0);
        let r0 = engine.curve().rate_overnight();
        let before = engine.snapshot_state().bank_account;
        engine.step(1).unwrap();
        let after = engine.snapshot_state().bank_account;
        assert_abs_diff_eq!(after, before * (1.0 + r0 / 365.0), epsilon = 1e-9);
    }

    #[test]
    fn e3_step_to_quarter_end_lands_on_boundary() {
        let mut engine = test_engine(5, 5);
        engine.step(17).unwrap();
        engine.step_to_quarter_end().unwrap();
        assert_eq!(engine.days_since_quarter_start(), 0);
    }

    #[test]
    fn e2_quarterly_clearing_zeroes_accrued_swap() {
        let mut engine = test_engine(10, 10);
        engine.add_swap("pay_fixed", 12, 50_000.0).unwrap();
        let days_left = QUARTER_LEN_DAYS - engine.days_since_quarter_start();
        engine.step(days_left).unwrap();
        assert!(engine.snapshot_state().accrued_swap.abs() < 1e-6);
    }

    #[test]
    fn e4_contracts_roll_over_within_200_days() {
        let mut engine = test_engine(5, 5);
        let t0 = engine.t0();
        engine.step(200).unwrap();
        let t_curr = engine.t_curr();
        let rolled = engine
            .portfolio()
            .contracts()
            .iter()
            .any(|c| c.start_date >= t0 && c.start_date < t_curr);
        assert!(rolled);
    }

    #[test]
    fn remaining_months_drift_within_tolerance_is_accepted() {
        let prev = 6.0;
        let next = prev - 1.0 / DAYS_PER_MONTH;
        assert!(check_remaining_months_drift(prev, next).is_ok());
    }

    #[test]
    fn remaining_months_drift_beyond_tolerance_is_rejected() {
        let err = check_remaining_months_drift(6.0, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn float_reset_matches_curve_after_settle() {
        let mut engine = test_engine(4, 4);
        engine.add_swap("receive_fixed", 6, 20_000.0).unwrap();
        let days_left = QUARTER_LEN_DAYS - engine.days_since_quarter_start();
        engine.step(days_left).unwrap();
        let expected = engine.curve().rate(3).unwrap();
        for s in engine.swaps().swaps() {
            assert_abs_diff_eq!(s.float_rate_q, expected, epsilon = 1e-12);
        }
    }
}
