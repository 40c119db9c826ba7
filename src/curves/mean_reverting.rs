//! Mean-reverting (AR(1)) yield curve.
//!
//! Each tenor on the grid evolves independently as an AR(1) process:
//! `r(t+1) = mu + phi * (r(t) - mu) + sigma * eps`, `eps ~ N(0,1)`, with
//! the result floored at zero.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_tenor, validate_tenor_map, CurveSnapshot, YieldCurve, TENOR_GRID};
use crate::error::EngineResult;

/// Default autoregressive coefficient.
pub const DEFAULT_PHI: f64 = 0.97;

fn default_sigma() -> BTreeMap<u32, f64> {
    BTreeMap::from([(0, 8e-4), (3, 6e-4), (6, 6e-4), (12, 5e-4), (24, 5e-4)])
}

/// Mean-reverting stochastic curve over the fixed tenor grid.
#[derive(Debug, Clone)]
pub struct MeanRevertingCurve {
    mu: BTreeMap<u32, f64>,
    phi: f64,
    sigma: BTreeMap<u32, f64>,
    current: BTreeMap<u32, f64>,
    date: NaiveDate,
    rng: StdRng,
}

impl MeanRevertingCurve {
    /// `base` must cover exactly the tenor grid `{0,3,6,12,24}`.
    /// `sigma` defaults to the spec's reference shock stdevs when `None`.
    /// `phi` defaults to 0.97. `seed` defaults to a fixed constant so that
    /// callers who don't care about reproducibility still get deterministic
    /// behavior.
    pub fn new(
        t0: NaiveDate,
        base: BTreeMap<u32, f64>,
        phi: Option<f64>,
        sigma: Option<BTreeMap<u32, f64>>,
        seed: Option<u64>,
    ) -> EngineResult<Self> {
        validate_tenor_map(&base)?;
        let sigma = sigma.unwrap_or_else(default_sigma);
        validate_tenor_map(&sigma)?;

        Ok(Self {
            mu: base.clone(),
            phi: phi.unwrap_or(DEFAULT_PHI),
            sigma,
            current: base,
            date: t0,
            rng: StdRng::seed_from_u64(seed.unwrap_or(42)),
        })
    }
}

impl YieldCurve for MeanRevertingCurve {
    fn rate(&self, term_months: u32) -> EngineResult<f64> {
        check_tenor(term_months)?;
        Ok(self.current[&term_months])
    }

    fn rate_overnight(&self) -> f64 {
        self.current[&0]
    }

    fn step(&mut self, days: u32) {
        for _ in 0..days {
            for m in TENOR_GRID {
                let mu = self.mu[&m];
                let prev = self.current[&m];
                let eps: f64 = StandardNormal.sample(&mut self.rng);
                let next = mu + self.phi * (prev - mu) + self.sigma[&m] * eps;
                self.current.insert(m, next.max(0.0));
            }
            self.date += chrono::Duration::days(1);
        }
    }

    fn snapshot(&self) -> CurveSnapshot {
        CurveSnapshot::new(self.date, self.current.clone())
    }

    fn box_clone(&self) -> Box<dyn YieldCurve> {
        Box::new(self.clone())
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors() -> BTreeMap<u32, f64> {
        BTreeMap::from([(0, 0.09), (3, 0.095), (6, 0.10), (12, 0.105), (24, 0.11)])
    }

    #[test]
    fn e1_overnight_rate_after_zero_steps() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = MeanRevertingCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        assert_eq!(curve.rate_overnight(), 0.09);
    }

    #[test]
    fn rejects_incomplete_tenor_set() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut bad = anchors();
        bad.remove(&24);
        let err = MeanRevertingCurve::new(t0, bad, None, None, None).unwrap_err();
        matches!(err, crate::error::EngineError::InvalidTenorSet { .. });
    }

    #[test]
    fn rejects_unsupported_tenor() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = MeanRevertingCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        assert!(curve.rate(9).is_err());
    }

    #[test]
    fn rates_never_go_negative_over_many_steps() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut curve = MeanRevertingCurve::new(t0, anchors(), None, None, Some(7)).unwrap();
        for _ in 0..2000 {
            curve.step(1);
            for m in TENOR_GRID {
                assert!(curve.rate(m).unwrap() >= 0.0);
            }
        }
    }

    #[test]
    fn same_seed_is_reproducible() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut a = MeanRevertingCurve::new(t0, anchors(), None, None, Some(123)).unwrap();
        let mut b = MeanRevertingCurve::new(t0, anchors(), None, None, Some(123)).unwrap();
        a.step(50);
        b.step(50);
        assert_eq!(a.snapshot(), b.snapshot());
    }
}
