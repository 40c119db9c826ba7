//! Swap book: plain-vanilla pay/receive-fixed interest-rate swaps, their
//! daily accrual, and quarterly/maturity roll-over.

use chrono::NaiveDate;

use crate::curves::YieldCurve;
use crate::engine::check_remaining_months_drift;
use crate::error::{require_finite, EngineError, EngineResult};

/// Floating leg tenor, in months (the 3-month curve rate).
pub const SWAP_FLOAT_TERM: u32 = 3;

/// Direction of the fixed leg, from the holder's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    PayFixed,
    ReceiveFixed,
}

impl SwapDirection {
    /// Parses the two accepted spellings, `"pay_fixed"` / `"receive_fixed"`.
    pub fn parse(s: &str) -> EngineResult<Self> {
        match s {
            "pay_fixed" => Ok(SwapDirection::PayFixed),
            "receive_fixed" => Ok(SwapDirection::ReceiveFixed),
            other => Err(EngineError::BadDirection(other.to_string())),
        }
    }

    /// +1 for receive_fixed, -1 for pay_fixed.
    pub fn sign(self) -> f64 {
        match self {
            SwapDirection::ReceiveFixed => 1.0,
            SwapDirection::PayFixed => -1.0,
        }
    }

    pub fn from_signed_notional(x: f64) -> Self {
        if x >= 0.0 {
            SwapDirection::ReceiveFixed
        } else {
            SwapDirection::PayFixed
        }
    }
}

/// A single plain-vanilla interest-rate swap position.
#[derive(Debug, Clone)]
pub struct Swap {
    pub id: u64,
    pub direction: SwapDirection,
    pub notional: f64,
    pub term_months: u32,
    pub remaining_months: f64,
    pub fixed_rate: f64,
    pub float_rate_q: f64,
    pub start_date: NaiveDate,
    pub maturity_date: NaiveDate,
}

impl Swap {
    /// Daily net accrual contribution, added to `accrued_swap`.
    pub fn daily_accrual(&self) -> f64 {
        self.direction.sign() * self.notional * (self.fixed_rate - self.float_rate_q) / 365.0
    }
}

/// The set of active swaps. The engine mutates this in place; like the
/// portfolio, the set's size is constant over the simulation — matured
/// swaps roll over rather than vanish.
#[derive(Debug, Clone, Default)]
pub struct SwapBook {
    swaps: Vec<Swap>,
    next_id: u64,
}

impl SwapBook {
    pub fn new() -> Self {
        Self { swaps: Vec::new(), next_id: 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn swaps(&self) -> &[Swap] {
        &self.swaps
    }

    /// Opens a new swap: fixed leg locked at `curve.rate(term_months)`,
    /// floating leg initialized at `curve.rate(SWAP_FLOAT_TERM)`, both read
    /// at `t_curr`.
    pub fn add_swap(
        &mut self,
        direction: &str,
        term_months: u32,
        notional: f64,
        t_curr: NaiveDate,
        curve: &dyn YieldCurve,
    ) -> EngineResult<u64> {
        let direction = SwapDirection::parse(direction)?;
        if term_months == 0 {
            return Err(EngineError::InvariantViolation(
                "swap term_months must be nonzero".to_string(),
            ));
        }
        if !notional.is_finite() || notional < 0.0 {
            return Err(EngineError::InvariantViolation(format!(
                "swap notional must be finite and non-negative, got {notional}"
            )));
        }
        let fixed_rate = require_finite("swap fixed rate", curve.rate(term_months)?)?;
        let float_rate_q = require_finite("swap float rate", curve.rate(SWAP_FLOAT_TERM)?)?;
        let id = self.next_id;
        self.next_id += 1;

        self.swaps.push(Swap {
            id,
            direction,
            notional,
            term_months,
            remaining_months: term_months as f64,
            fixed_rate,
            float_rate_q,
            start_date: t_curr,
            maturity_date: crate::engine::add_months(t_curr, term_months),
        });
        Ok(id)
    }

    /// Opens a swap with a pre-signed notional: positive opens receive_fixed,
    /// negative opens pay_fixed, zero is a no-op. Used by the engine when
    /// applying an optimizer `Decision`.
    pub fn add_signed_swap(
        &mut self,
        term_months: u32,
        signed_notional: f64,
        t_curr: NaiveDate,
        curve: &dyn YieldCurve,
    ) -> EngineResult<Option<u64>> {
        if signed_notional == 0.0 {
            return Ok(None);
        }
        let direction = SwapDirection::from_signed_notional(signed_notional);
        let label = match direction {
            SwapDirection::PayFixed => "pay_fixed",
            SwapDirection::ReceiveFixed => "receive_fixed",
        };
        self.add_swap(label, term_months, signed_notional.abs(), t_curr, curve)
            .map(Some)
    }

    /// Sum of each active swap's daily accrual.
    pub fn daily_accrual_total(&self) -> f64 {
        self.swaps.iter().map(Swap::daily_accrual).sum()
    }

    /// Ages every swap by one day and rolls over any that matured.
    pub fn age_and_rollover(&mut self, t_curr: NaiveDate, curve: &dyn YieldCurve) -> EngineResult<()> {
        for s in &mut self.swaps {
            let prev = s.remaining_months;
            s.remaining_months -= 1.0 / crate::engine::DAYS_PER_MONTH;
            check_remaining_months_drift(prev, s.remaining_months)?;
            if s.remaining_months <= 0.0 {
                s.remaining_months = s.term_months as f64;
                s.start_date = t_curr;
                s.maturity_date = crate::engine::add_months(t_curr, s.term_months);
                s.fixed_rate = require_finite("swap fixed rate", curve.rate(s.term_months)?)?;
                s.float_rate_q = require_finite("swap float rate", curve.rate(SWAP_FLOAT_TERM)?)?;
            }
        }
        Ok(())
    }

    /// Resets every active swap's floating leg to the current 3-month rate.
    /// Independent of roll-over; fires at every quarterly boundary.
    pub fn reset_float_quarterly(&mut self, curve: &dyn YieldCurve) -> EngineResult<()> {
        let flt = require_finite("swap float rate", curve.rate(SWAP_FLOAT_TERM)?)?;
        for s in &mut self.swaps {
            s.float_rate_q = flt;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::MeanRevertingCurve;
    use std::collections::BTreeMap;

    fn curve() -> MeanRevertingCurve {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let anchors = BTreeMap::from([(0, 0.09), (3, 0.095), (6, 0.10), (12, 0.105), (24, 0.11)]);
        MeanRevertingCurve::new(t0, anchors, None, None, Some(42)).unwrap()
    }

    #[test]
    fn e5_bad_direction_is_rejected() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut book = SwapBook::new();
        let err = book.add_swap("fixed_pay", 12, 1000.0, t0, &curve()).unwrap_err();
        assert!(matches!(err, EngineError::BadDirection(_)));
    }

    #[test]
    fn rollover_resets_term_and_rate_to_curve() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let c = curve();
        let mut book = SwapBook::new();
        book.add_swap("pay_fixed", 6, 1_000.0, t0, &c).unwrap();

        let days = (6.0 * crate::engine::DAYS_PER_MONTH).ceil() as u32 + 2;
        let mut t = t0;
        let mut c2 = c.clone();
        let mut rate_at_rollover = None;
        for _ in 0..days {
            book.age_and_rollover(t, &c2).unwrap();
            if rate_at_rollover.is_none() && book.swaps()[0].start_date == t {
                rate_at_rollover = Some(c2.rate(6).unwrap());
            }
            t += chrono::Duration::days(1);
            c2.step(1);
        }
        let s = &book.swaps()[0];
        assert_eq!(s.remaining_months, s.term_months as f64);
        assert_eq!(Some(s.fixed_rate), rate_at_rollover);
    }
}
