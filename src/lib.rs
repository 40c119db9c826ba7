//! Asset-liability hedging engine - day-by-day simulation of a fixed-rate
//! loan/deposit book hedged with interest-rate swaps
//!
//! This library provides:
//! - Stochastic yield curve models (mean-reverting and Nelson-Siegel)
//! - A fixed-rate loan/deposit portfolio with monthly payouts and roll-over
//! - A pay/receive-fixed swap book with daily accrual and quarterly settle
//! - A day-driven hedge engine tying curve, portfolio and swap book together
//! - A Monte Carlo scenario tree over the curve
//! - A CVaR grid-search optimizer for quarterly rebalancing decisions

pub mod error;
pub mod curves;
pub mod portfolio;
pub mod swaps;
pub mod engine;
pub mod scenarios;
pub mod optimizer;
pub mod demos;

pub use error::{EngineError, EngineResult};
pub use curves::{CurveSnapshot, MeanRevertingCurve, NelsonSiegelCurve, YieldCurve};
pub use portfolio::{Contract, ContractType, Portfolio};
pub use swaps::{Swap, SwapBook, SwapDirection};
pub use engine::{EngineState, HedgeEngine, Optimizer};
pub use scenarios::{build_tree, ScenarioNode};
pub use optimizer::{CvarConfig, CvarOptimizer, Decision};
