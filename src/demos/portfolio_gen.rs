//! Toy portfolio generator, out of scope for the engine itself. Reproduces
//! the original book-building heuristic (uniform volume split across
//! contracts, uniform term choice, toy loan/deposit rate curves with
//! Gaussian noise) so tests and doc examples can build a realistic
//! [`Portfolio`] without hand-writing one contract at a time.
//!
//! Every entry point here takes an explicit seed; nothing in this module
//! reaches for thread-local or OS randomness.

use chrono::NaiveDate;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;

use crate::engine::{sub_months, DAYS_PER_MONTH};
use crate::error::EngineResult;
use crate::portfolio::{ContractType, Portfolio, REMAINING_MONTHS_FLOOR};

const LOAN_TERM_OPTS: [u32; 3] = [6, 12, 24];
const DEP_TERM_OPTS: [u32; 3] = [3, 6, 12];

fn loan_curve(rng: &mut StdRng, term_months: u32, noise: f64) -> f64 {
    let base = 0.10 - 0.003 * term_months as f64 / 12.0;
    let eps: f64 = Normal::new(0.0, noise).unwrap().sample(rng);
    base + eps
}

fn dep_curve(rng: &mut StdRng, term_months: u32, noise: f64) -> f64 {
    let base = 0.08 - 0.0025 * term_months as f64 / 12.0;
    let eps: f64 = Normal::new(0.0, noise).unwrap().sample(rng);
    base + eps
}

/// Generates a toy portfolio of `n_loans` loans and `n_deposits` deposits
/// whose combined loan (and separately deposit) volumes each sum to `v`.
/// `t0` is the valuation date contracts are aged relative to.
pub fn generate(n_loans: usize, n_deposits: usize, v: f64, t0: NaiveDate, seed: u64) -> EngineResult<Portfolio> {
    let mut rng = StdRng::seed_from_u64(seed);
    let unit = Uniform::new(0.0f64, 1.0);

    let u_loans: Vec<f64> = (0..n_loans).map(|_| unit.sample(&mut rng)).collect();
    let u_deps: Vec<f64> = (0..n_deposits).map(|_| unit.sample(&mut rng)).collect();
    let loan_sum: f64 = u_loans.iter().sum();
    let dep_sum: f64 = u_deps.iter().sum();

    let term_idx = Uniform::new(0usize, 3);
    let mut portfolio = Portfolio::new(t0, Some(v), Vec::new());

    for &u in &u_loans {
        let volume = if loan_sum > 0.0 { v * u / loan_sum } else { 0.0 };
        let term = LOAN_TERM_OPTS[term_idx.sample(&mut rng)];
        let remaining = (term as f64 * unit.sample(&mut rng)).max(REMAINING_MONTHS_FLOOR);
        let maturity = t0 + chrono::Duration::days((remaining * DAYS_PER_MONTH).round() as i64);
        let start = sub_months(maturity, term);
        let rate = loan_curve(&mut rng, term, 0.0005);

        portfolio.add_contract(ContractType::Loan, volume, term, remaining, start, rate)?;
    }

    for &u in &u_deps {
        let volume = if dep_sum > 0.0 { v * u / dep_sum } else { 0.0 };
        let term = DEP_TERM_OPTS[term_idx.sample(&mut rng)];
        let remaining = (term as f64 * unit.sample(&mut rng)).max(REMAINING_MONTHS_FLOOR);
        let maturity = t0 + chrono::Duration::days((remaining * DAYS_PER_MONTH).round() as i64);
        let start = sub_months(maturity, term);
        let rate = dep_curve(&mut rng, term, 0.0005);

        portfolio.add_contract(ContractType::Deposit, volume, term, remaining, start, rate)?;
    }

    Ok(portfolio)
}
