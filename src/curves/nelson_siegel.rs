//! Nelson-Siegel three-factor parametric yield curve.
//!
//! `y(T) = b0 + b1 * ((1 - e^{-T/tau}) / (T/tau)) + b2 * (((1 - e^{-T/tau}) / (T/tau)) - e^{-T/tau})`
//! with the `T -> 0` limit `y(0) = b0 + b1`.
//!
//! The three factors are fit to the anchor tenor points by a grid search
//! over `tau` followed by closed-form linear regression for `(b0, b1, b2)`
//! at each candidate `tau`. After fitting, `tau` is held fixed and the
//! factors evolve as independent AR(1) processes around their fitted means.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use super::{validate_tenor_map, CurveSnapshot, YieldCurve, TENOR_GRID};
use crate::error::{EngineError, EngineResult};

/// Default autoregressive coefficient applied to all three factors.
pub const DEFAULT_PHI: f64 = 0.97;
/// Default per-step shock stdev applied to all three factors.
const DEFAULT_FACTOR_SIGMA: f64 = 4e-4;
/// Upper bound of the grid search over tau, in months.
const DEFAULT_TAU_MAX: f64 = 60.0;
/// Number of candidate tau values scanned during the fit.
const TAU_GRID_POINTS: usize = 400;
/// Fit-quality gate: MSE on the anchor points must be below this.
const FIT_MSE_TOLERANCE: f64 = 1e-4;

fn basis(term_months: f64, tau: f64) -> (f64, f64, f64) {
    if term_months <= 0.0 {
        return (1.0, 1.0, 0.0);
    }
    let x = term_months / tau;
    let decay = (-x).exp();
    let slope = (1.0 - decay) / x;
    let curvature = slope - decay;
    (1.0, slope, curvature)
}

/// Solve the 3x3 normal-equations system `m * beta = v` via Cramer's rule.
/// Returns `None` if `m` is singular.
fn solve_3x3(m: [[f64; 3]; 3], v: [f64; 3]) -> Option<[f64; 3]> {
    let det3 = |a: [[f64; 3]; 3]| -> f64 {
        a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
            - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
            + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
    };
    let d = det3(m);
    if d.abs() < 1e-14 {
        return None;
    }
    let mut beta = [0.0; 3];
    for col in 0..3 {
        let mut replaced = m;
        for row in 0..3 {
            replaced[row][col] = v[row];
        }
        beta[col] = det3(replaced) / d;
    }
    Some(beta)
}

/// Fit `(b0, b1, b2)` by OLS for a fixed `tau`, plus the residual MSE.
fn fit_betas(anchors: &BTreeMap<u32, f64>, tau: f64) -> Option<([f64; 3], f64)> {
    let mut mtm = [[0.0; 3]; 3];
    let mut mty = [0.0; 3];
    let mut rows = Vec::with_capacity(anchors.len());

    for (&term, &rate) in anchors {
        let row = basis(term as f64, tau);
        rows.push((row, rate));
        let r = [row.0, row.1, row.2];
        for i in 0..3 {
            mty[i] += r[i] * rate;
            for j in 0..3 {
                mtm[i][j] += r[i] * r[j];
            }
        }
    }

    let beta = solve_3x3(mtm, mty)?;
    let mse = rows
        .iter()
        .map(|(row, rate)| {
            let fitted = beta[0] * row.0 + beta[1] * row.1 + beta[2] * row.2;
            (fitted - rate).powi(2)
        })
        .sum::<f64>()
        / rows.len() as f64;

    Some((beta, mse))
}

/// Nelson-Siegel stochastic curve. `rate()` accepts any non-negative term in
/// months, not just the tenor grid.
#[derive(Debug, Clone)]
pub struct NelsonSiegelCurve {
    tau: f64,
    mean_factors: [f64; 3],
    phi: f64,
    sigma: [f64; 3],
    factors: [f64; 3],
    date: NaiveDate,
    rng: StdRng,
}

impl NelsonSiegelCurve {
    /// `anchors` must cover exactly the tenor grid `{0,3,6,12,24}`.
    pub fn new(
        t0: NaiveDate,
        anchors: BTreeMap<u32, f64>,
        phi: Option<f64>,
        sigma: Option<[f64; 3]>,
        seed: Option<u64>,
    ) -> EngineResult<Self> {
        validate_tenor_map(&anchors)?;

        let mut best: Option<([f64; 3], f64, f64)> = None;
        for i in 1..=TAU_GRID_POINTS {
            let tau = DEFAULT_TAU_MAX * (i as f64) / (TAU_GRID_POINTS as f64);
            if let Some((beta, mse)) = fit_betas(&anchors, tau) {
                if best.as_ref().map(|(_, best_mse, _)| mse < *best_mse).unwrap_or(true) {
                    best = Some((beta, mse, tau));
                }
            }
        }

        let (beta, mse, tau) = best.ok_or_else(|| EngineError::DegenerateFit {
            reason: "no candidate tau produced a solvable regression".to_string(),
        })?;

        if mse >= FIT_MSE_TOLERANCE {
            return Err(EngineError::DegenerateFit {
                reason: format!("anchor fit MSE {mse:.3e} exceeds tolerance {FIT_MSE_TOLERANCE:e}"),
            });
        }
        if tau <= 0.0 {
            return Err(EngineError::DegenerateFit {
                reason: "fitted tau is not strictly positive".to_string(),
            });
        }

        Ok(Self {
            tau,
            mean_factors: beta,
            phi: phi.unwrap_or(DEFAULT_PHI),
            sigma: sigma.unwrap_or([DEFAULT_FACTOR_SIGMA; 3]),
            factors: beta,
            date: t0,
            rng: StdRng::seed_from_u64(seed.unwrap_or(42)),
        })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Analytic rate at an arbitrary term (in months), using the current
    /// factor state. Clamped at zero.
    fn rate_at(&self, term_months: f64) -> f64 {
        let (x1, x2, x3) = basis(term_months, self.tau);
        (self.factors[0] * x1 + self.factors[1] * x2 + self.factors[2] * x3).max(0.0)
    }
}

impl YieldCurve for NelsonSiegelCurve {
    fn rate(&self, term_months: u32) -> EngineResult<f64> {
        Ok(self.rate_at(term_months as f64))
    }

    fn rate_overnight(&self) -> f64 {
        self.rate_at(0.0)
    }

    fn step(&mut self, days: u32) {
        for _ in 0..days {
            for i in 0..3 {
                let mu = self.mean_factors[i];
                let prev = self.factors[i];
                let eps: f64 = StandardNormal.sample(&mut self.rng);
                self.factors[i] = mu + self.phi * (prev - mu) + self.sigma[i] * eps;
            }
            self.date += chrono::Duration::days(1);
        }
    }

    fn snapshot(&self) -> CurveSnapshot {
        let rates = TENOR_GRID
            .into_iter()
            .map(|m| (m, self.rate_at(m as f64)))
            .collect();
        CurveSnapshot::new(self.date, rates)
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
    use approx::assert_abs_diff_eq;

    fn anchors() -> BTreeMap<u32, f64> {
        BTreeMap::from([(0, 0.09), (3, 0.095), (6, 0.10), (12, 0.105), (24, 0.11)])
    }

    #[test]
    fn e6_fits_anchors_and_has_positive_tau() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = NelsonSiegelCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        assert!(curve.tau() > 0.0);
        for (&term, &expected) in &anchors() {
            let got = curve.rate(term).unwrap();
            assert_abs_diff_eq!(got, expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn e6_rate_changes_after_stepping() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut curve = NelsonSiegelCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        let before = curve.rate(12).unwrap();
        curve.step(30);
        let after = curve.rate(12).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn anchor_fit_mse_within_tolerance() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = NelsonSiegelCurve::new(t0, anchors(), None, None, Some(1)).unwrap();
        let mse: f64 = anchors()
            .iter()
            .map(|(&t, &r)| (curve.rate(t).unwrap() - r).powi(2))
            .sum::<f64>()
            / anchors().len() as f64;
        assert!(mse < FIT_MSE_TOLERANCE);
    }

    #[test]
    fn accepts_arbitrary_non_grid_term() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = NelsonSiegelCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        assert!(curve.rate(18).is_ok());
    }

    #[test]
    fn discount_factors_are_monotone_non_increasing() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let curve = NelsonSiegelCurve::new(t0, anchors(), None, None, Some(42)).unwrap();
        let terms = [1u32, 3, 6, 12, 18, 24, 36];
        let mut prev_df = f64::INFINITY;
        for &t in &terms {
            let y = curve.rate(t).unwrap();
            let df = (-y * t as f64 / 12.0).exp();
            assert!(df <= prev_df + 1e-10, "discount factor increased at term {t}");
            prev_df = df;
        }
    }

    #[test]
    fn rejects_incomplete_anchor_set() {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let mut bad = anchors();
        bad.remove(&6);
        assert!(NelsonSiegelCurve::new(t0, bad, None, None, None).is_err());
    }
}
