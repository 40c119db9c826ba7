//! Portfolio state: the set of fixed-rate loan/deposit contracts the engine
//! ages, pays out, and rolls over day by day.

use chrono::NaiveDate;

use crate::error::{require_finite, EngineError, EngineResult};

/// Loan or deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractType {
    Loan,
    Deposit,
}

/// Floor applied to `remaining_months` at contract creation so that a
/// freshly-started contract is never exactly zero-aged.
pub const REMAINING_MONTHS_FLOOR: f64 = 1e-6;

/// A single fixed-rate loan or deposit contract.
#[derive(Debug, Clone)]
pub struct Contract {
    pub id: u64,
    pub kind: ContractType,
    pub volume: f64,
    pub contract_months: u32,
    pub remaining_months: f64,
    pub start_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub rate: f64,
    pub next_payout_date: NaiveDate,
}

impl Contract {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        kind: ContractType,
        volume: f64,
        contract_months: u32,
        remaining_months: f64,
        start_date: NaiveDate,
        rate: f64,
    ) -> EngineResult<Self> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(EngineError::InvariantViolation(format!(
                "contract volume must be finite and non-negative, got {volume}"
            )));
        }
        let rate = require_finite("contract rate", rate)?;
        let maturity_date = crate::engine::add_months(start_date, contract_months);
        let next_payout_date = crate::engine::add_months(start_date, 1);
        Ok(Self {
            id,
            kind,
            volume,
            contract_months,
            remaining_months: remaining_months.max(REMAINING_MONTHS_FLOOR),
            start_date,
            maturity_date,
            rate,
            next_payout_date,
        })
    }

    /// Monthly coupon for this contract: positive cash into the bank account
    /// for a loan, negative for a deposit.
    pub fn monthly_coupon(&self) -> f64 {
        let coupon = self.volume * self.rate / 12.0;
        match self.kind {
            ContractType::Loan => coupon,
            ContractType::Deposit => -coupon,
        }
    }
}

/// Owns the full set of loan and deposit contracts. The engine mutates this
/// in place; the set's size never changes over the life of a simulation —
/// matured contracts are rolled over, not removed.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub t0: NaiveDate,
    /// Optional aggregate notional used by the optimizer for unit sizing.
    pub v: Option<f64>,
    contracts: Vec<Contract>,
    next_id: u64,
}

impl Portfolio {
    pub fn new(t0: NaiveDate, v: Option<f64>, contracts: Vec<Contract>) -> Self {
        let next_id = contracts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self { t0, v, contracts, next_id }
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn contracts_mut(&mut self) -> &mut [Contract] {
        &mut self.contracts
    }

    pub fn loans(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter().filter(|c| c.kind == ContractType::Loan)
    }

    pub fn deposits(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter().filter(|c| c.kind == ContractType::Deposit)
    }

    pub fn total_loan_volume(&self) -> f64 {
        self.loans().map(|c| c.volume).sum()
    }

    pub fn total_deposit_volume(&self) -> f64 {
        self.deposits().map(|c| c.volume).sum()
    }

    /// Aggregate size parameter the optimizer uses for unit sizing, falling
    /// back to a flat notional when `v` was not supplied.
    pub fn unit_size_base(&self) -> f64 {
        self.v.unwrap_or(DEFAULT_UNIT_SIZE_BASE)
    }

    /// Adds a contract to the book, assigning it a fresh id and ignoring
    /// whatever id the caller set on it.
    pub fn add_contract(
        &mut self,
        kind: ContractType,
        volume: f64,
        contract_months: u32,
        remaining_months: f64,
        start_date: NaiveDate,
        rate: f64,
    ) -> EngineResult<u64> {
        let id = self.next_id;
        let contract = Contract::new(id, kind, volume, contract_months, remaining_months, start_date, rate)?;
        self.next_id += 1;
        self.contracts.push(contract);
        Ok(id)
    }
}

/// Fallback aggregate notional used by [`Portfolio::unit_size_base`] when the
/// portfolio carries no explicit `v`.
pub const DEFAULT_UNIT_SIZE_BASE: f64 = 1_000_000.0;
