//! Yield curve models: a shared snapshot type and trait, plus two concrete
//! stochastic curve implementations (mean-reverting and Nelson-Siegel).

mod mean_reverting;
mod nelson_siegel;

pub use mean_reverting::MeanRevertingCurve;
pub use nelson_siegel::NelsonSiegelCurve;

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};

/// Fixed tenor grid, in months. Tenor 0 is the overnight rate.
pub const TENOR_GRID: [u32; 5] = [0, 3, 6, 12, 24];

/// A read-only snapshot of a curve's rates at the tenor grid plus the date
/// the snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSnapshot {
    pub date: NaiveDate,
    rates: BTreeMap<u32, f64>,
}

impl CurveSnapshot {
    pub fn new(date: NaiveDate, rates: BTreeMap<u32, f64>) -> Self {
        Self { date, rates }
    }

    /// Rate at a grid tenor. Panics if `tenor` is not one of `TENOR_GRID` —
    /// snapshots are always built from the grid internally, so this is an
    /// internal-use accessor, not the fallible public `rate()` API.
    pub fn at(&self, tenor: u32) -> f64 {
        self.rates[&tenor]
    }

    pub fn overnight(&self) -> f64 {
        self.at(0)
    }

    pub fn rates(&self) -> &BTreeMap<u32, f64> {
        &self.rates
    }
}

/// Common behavior shared by the mean-reverting and Nelson-Siegel curves.
///
/// Both curves are stochastic, own their own RNG, and evolve one calendar
/// day at a time. `rate` is restricted to the tenor grid for the
/// mean-reverting curve (no interpolation) but the Nelson-Siegel curve
/// accepts arbitrary non-negative terms via its analytic form.
pub trait YieldCurve {
    /// Annualized rate at `term_months`. Negative rates are clamped to zero
    /// at the point they are generated, never at read time.
    fn rate(&self, term_months: u32) -> EngineResult<f64>;

    /// The overnight (zero-tenor) rate.
    fn rate_overnight(&self) -> f64;

    /// Advance the curve `days` calendar days.
    fn step(&mut self, days: u32);

    /// Current date and tenor-grid rates.
    fn snapshot(&self) -> CurveSnapshot;

    /// Clones this curve (including its RNG state) behind a fresh box. Used
    /// by the engine to roll back a failed simulated day, and by the
    /// scenario tree to branch independent curve copies from a snapshot.
    fn box_clone(&self) -> Box<dyn YieldCurve>;

    /// Replaces this curve's RNG with a fresh one seeded from `seed`,
    /// leaving the current rate levels untouched. Used by the scenario tree
    /// to turn one curve snapshot into several independently-evolving
    /// branches.
    fn reseed(&mut self, seed: u64);
}

impl Clone for Box<dyn YieldCurve> {
    fn clone(&self) -> Self {
        self.as_ref().box_clone()
    }
}

pub(crate) fn validate_tenor_map(map: &BTreeMap<u32, f64>) -> EngineResult<()> {
    let mut got: Vec<u32> = map.keys().copied().collect();
    got.sort_unstable();
    let expected: Vec<u32> = TENOR_GRID.to_vec();
    if got != expected {
        return Err(EngineError::InvalidTenorSet { expected, got });
    }
    Ok(())
}

pub(crate) fn check_tenor(term_months: u32) -> EngineResult<()> {
    if TENOR_GRID.contains(&term_months) {
        Ok(())
    } else {
        Err(EngineError::UnsupportedTenor(term_months))
    }
}
