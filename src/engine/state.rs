//! Read-only snapshot of engine state, exposed at day boundaries only.

use chrono::NaiveDate;

use crate::curves::CurveSnapshot;

/// A read-only view of the engine's state, as returned by
/// `HedgeEngine::snapshot_state`. Intra-day intermediate states are not part
/// of the contract — this is only ever taken between simulated days.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub date: NaiveDate,
    pub bank_account: f64,
    pub swap_account: f64,
    pub accrued_swap: f64,
    pub curve: CurveSnapshot,
    pub total_loan_volume: f64,
    pub total_deposit_volume: f64,
    pub swap_count: usize,
}
