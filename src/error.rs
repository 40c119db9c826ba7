//! Error taxonomy for the hedging engine.

use thiserror::Error;

/// Errors raised by curves, the portfolio, the swap book, the hedge engine
/// and the CVaR optimizer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A curve constructor received an anchor (or shock stdev) map that did
    /// not cover exactly the tenor grid `{0, 3, 6, 12, 24}`.
    #[error("invalid tenor set: expected {expected:?}, got {got:?}")]
    InvalidTenorSet {
        expected: Vec<u32>,
        got: Vec<u32>,
    },

    /// `rate(term)` was called on a grid-only curve with a term outside the
    /// tenor grid.
    #[error("unsupported tenor: {0} months")]
    UnsupportedTenor(u32),

    /// `add_swap` was given a direction other than `pay_fixed`/`receive_fixed`.
    #[error("bad swap direction: {0}")]
    BadDirection(String),

    /// Nelson-Siegel fit could not find a positive decay `tau`, or the
    /// residual MSE on the anchor points exceeded tolerance.
    #[error("degenerate Nelson-Siegel fit: {reason}")]
    DegenerateFit { reason: String },

    /// Internal invariant violated (negative volume, non-finite rate,
    /// remaining-months drift, zero-term swap). Fatal: the caller should
    /// abort the simulation rather than retry.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Boundary check used wherever a rate comes off the curve or in from a
/// caller: rejects NaN/infinite values rather than letting them propagate
/// into account balances.
pub(crate) fn require_finite(label: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvariantViolation(format!("{label} is not finite: {value}")))
    }
}
