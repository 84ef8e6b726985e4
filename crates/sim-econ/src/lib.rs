#![deny(warnings)]

//! Economic models: commodity pricing, financing and settlement for Astromine.
//!
//! This module provides validated utilities for:
//! - The price-oracle contract consumed at settlement time
//! - Loan interest accrual and payoff (pure, day-granular)
//! - The one-time financial settlement of a completed mission
//! - Repair cost pricing from accumulated hull damage
//!
//! Unit convention: all prices are quoted in USD per kilogram and cargo
//! value is `sum(mass_kg * price_per_kg)`.

use rust_decimal::Decimal;
use sim_core::{FinalResults, Loan, LoanId, LoanState, MissionCosts};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// The oracle has no quote for an element present in cargo.
    #[error("no price quoted for element: {0}")]
    UnknownElement(String),
    /// Quoted prices must never be negative.
    #[error("negative price quoted for element: {0}")]
    NegativePrice(String),
    /// Referenced loan does not exist in the ledger.
    #[error("unknown loan: {0}")]
    UnknownLoan(String),
}

/// Read-only commodity price lookup.
///
/// Implementations must return a non-negative quote for every element
/// name that can appear in mission cargo.
pub trait PriceOracle {
    /// Current price for one kilogram of the named element, in USD.
    fn price_per_kg(&self, element: &str) -> Result<Decimal, EconError>;
}

/// In-memory oracle with a fixed quote table; used by tests and the CLI.
#[derive(Clone, Debug)]
pub struct FixedPriceOracle {
    quotes: BTreeMap<String, Decimal>,
}

impl FixedPriceOracle {
    /// Build an oracle from an explicit quote table.
    pub fn new(quotes: BTreeMap<String, Decimal>) -> Self {
        Self { quotes }
    }

    /// Insert or replace a quote.
    pub fn set_quote(&mut self, element: &str, price_per_kg: Decimal) {
        self.quotes.insert(element.to_string(), price_per_kg);
    }
}

impl Default for FixedPriceOracle {
    /// Canonical commodity table, USD per kg.
    fn default() -> Self {
        let mut quotes = BTreeMap::new();
        quotes.insert("Gold".to_string(), Decimal::new(60_000, 0));
        quotes.insert("Platinum".to_string(), Decimal::new(30_000, 0));
        quotes.insert("Palladium".to_string(), Decimal::new(40_000, 0));
        quotes.insert("Silver".to_string(), Decimal::new(800, 0));
        quotes.insert("Copper".to_string(), Decimal::new(8, 0));
        quotes.insert("Lithium".to_string(), Decimal::new(15, 0));
        quotes.insert("Cobalt".to_string(), Decimal::new(80, 0));
        quotes.insert("Nickel".to_string(), Decimal::new(20, 0));
        quotes.insert("Iron".to_string(), Decimal::new(1, 1)); // 0.1
        Self { quotes }
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price_per_kg(&self, element: &str) -> Result<Decimal, EconError> {
        let price = self
            .quotes
            .get(element)
            .copied()
            .ok_or_else(|| EconError::UnknownElement(element.to_string()))?;
        if price < Decimal::ZERO {
            return Err(EconError::NegativePrice(element.to_string()));
        }
        Ok(price)
    }
}

/// Interest accrued on a loan as of a mission day.
///
/// `principal * (apr / 100) * (elapsed_days / 365)`.
///
/// Example:
/// let loan = ...; // principal 1_000_000 at 8% APR
/// let i = accrued_interest(&loan, 40);
/// assert_eq!(i.round_dp(2), Decimal::new(876_712, 2)); // $8,767.12
pub fn accrued_interest(loan: &Loan, as_of_day: u32) -> Decimal {
    let rate = loan.apr_percent / Decimal::new(100, 0);
    let elapsed = Decimal::from(as_of_day) / Decimal::new(365, 0);
    loan.principal * rate * elapsed
}

/// Full payoff amount as of a mission day: principal plus accrued interest.
pub fn payoff_amount(loan: &Loan, as_of_day: u32) -> Decimal {
    loan.principal + accrued_interest(loan, as_of_day)
}

/// Repair charge for accumulated hull damage, capped at `max_cost`.
pub fn repair_cost(hull_damage: u32, cost_per_point: Decimal, max_cost: Decimal) -> Decimal {
    (Decimal::from(hull_damage) * cost_per_point).min(max_cost)
}

/// Ledger of financing instruments.
///
/// Loans are immutable once `Repaid`; both `mark_repaid` and
/// `mark_defaulted` are idempotent and never resurrect a settled loan.
#[derive(Debug, Default)]
pub struct FinancingLedger {
    loans: BTreeMap<LoanId, Loan>,
    next_seq: u64,
}

impl FinancingLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Originate a new active loan and return it.
    pub fn create_loan(&mut self, principal: Decimal, apr_percent: Decimal, term_days: u32) -> Loan {
        self.next_seq += 1;
        let loan = Loan {
            id: LoanId(format!("loan-{}", self.next_seq)),
            principal,
            apr_percent,
            term_days,
            created_at: chrono::Utc::now(),
            state: LoanState::Active,
        };
        debug!(loan = %loan.id.0, %principal, %apr_percent, term_days, "loan originated");
        self.loans.insert(loan.id.clone(), loan.clone());
        loan
    }

    /// Register an externally created loan (planning flow).
    pub fn admit(&mut self, loan: Loan) {
        self.loans.insert(loan.id.clone(), loan);
    }

    /// Look up a loan.
    pub fn get(&self, id: &LoanId) -> Result<Loan, EconError> {
        self.loans
            .get(id)
            .cloned()
            .ok_or_else(|| EconError::UnknownLoan(id.0.clone()))
    }

    /// Mark a loan repaid. Idempotent; a defaulted loan stays defaulted.
    pub fn mark_repaid(&mut self, id: &LoanId) -> Result<LoanState, EconError> {
        let loan = self
            .loans
            .get_mut(id)
            .ok_or_else(|| EconError::UnknownLoan(id.0.clone()))?;
        if loan.state == LoanState::Active {
            loan.state = LoanState::Repaid;
        }
        Ok(loan.state)
    }

    /// Mark a loan defaulted. Idempotent; a repaid loan stays repaid.
    pub fn mark_defaulted(&mut self, id: &LoanId) -> Result<LoanState, EconError> {
        let loan = self
            .loans
            .get_mut(id)
            .ok_or_else(|| EconError::UnknownLoan(id.0.clone()))?;
        if loan.state == LoanState::Active {
            loan.state = LoanState::Defaulted;
        }
        Ok(loan.state)
    }
}

/// Compute the one-time financial settlement of a completed mission.
///
/// Pure in everything but the oracle lookup: queries the oracle once per
/// cargo element, then derives net profit and ROI from the accumulated
/// mission costs and the loan payoff (zero without financing).
pub fn settle(
    cargo: &BTreeMap<String, Decimal>,
    costs: &MissionCosts,
    loan: Option<(&Loan, u32)>,
    oracle: &dyn PriceOracle,
) -> Result<FinalResults, EconError> {
    let mut cargo_value = Decimal::ZERO;
    for (element, mass_kg) in cargo {
        let price = oracle.price_per_kg(element)?;
        cargo_value += *mass_kg * price;
    }

    let loan_payoff = match loan {
        Some((loan, as_of_day)) if loan.principal > Decimal::ZERO => {
            payoff_amount(loan, as_of_day)
        }
        _ => Decimal::ZERO,
    };

    let net_profit = cargo_value - costs.total - loan_payoff;
    let roi_percentage = if costs.total > Decimal::ZERO {
        net_profit / costs.total * Decimal::new(100, 0)
    } else {
        Decimal::ZERO
    };

    Ok(FinalResults {
        cargo_value,
        net_profit,
        roi_percentage,
        loan_payoff,
        loans_repaid: loan_payoff > Decimal::ZERO,
    })
}
