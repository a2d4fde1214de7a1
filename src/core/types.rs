use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::SimulationError;

pub type Year = i32;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct YearRange {
    pub first: Year,
    pub last: Year,
}

impl YearRange {
    pub fn new(first: Year, last: Year) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, year: Year) -> bool {
        (self.first..=self.last).contains(&year)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Year-indexed numeric series. Years need not be contiguous.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlySeries {
    values: BTreeMap<Year, f64>,
}

impl YearlySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: Year, value: f64) -> Option<f64> {
        self.values.insert(year, value)
    }

    pub fn get(&self, year: Year) -> Option<f64> {
        self.values.get(&year).copied()
    }

    pub fn contains(&self, year: Year) -> bool {
        self.values.contains_key(&year)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Year, f64)> + '_ {
        self.values.iter().map(|(year, value)| (*year, *value))
    }

    pub fn first_year(&self) -> Option<Year> {
        self.values.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<Year> {
        self.values.keys().next_back().copied()
    }

    pub fn range(&self) -> Option<YearRange> {
        Some(YearRange::new(self.first_year()?, self.last_year()?))
    }

    /// Every requested year absent from the series, sorted and deduplicated.
    pub fn missing_years<I>(&self, years: I) -> Vec<Year>
    where
        I: IntoIterator<Item = Year>,
    {
        let mut missing = years
            .into_iter()
            .filter(|year| !self.contains(*year))
            .collect::<Vec<_>>();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

impl FromIterator<(Year, f64)> for YearlySeries {
    fn from_iter<T: IntoIterator<Item = (Year, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assumptions {
    /// Share of the purchase price paid up front; the rest is mortgaged.
    pub down_payment_fraction: f64,
    pub maintenance_fraction: f64,
    pub initial_exchange_fee_rate: f64,
    /// Fee on every monthly portfolio contribution.
    pub transaction_fee_rate: f64,
    pub management_fee_rate: f64,
    pub liquidation_fee_rate: f64,
    pub capital_gains_tax_rate: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            down_payment_fraction: 0.25,
            maintenance_fraction: 0.15,
            initial_exchange_fee_rate: 0.005,
            transaction_fee_rate: 0.005,
            management_fee_rate: 0.0003,
            liquidation_fee_rate: 0.002,
            capital_gains_tax_rate: 0.25,
        }
    }
}

impl Assumptions {
    pub fn down_payment(&self, price: f64) -> f64 {
        price * self.down_payment_fraction
    }

    pub fn mortgage_amount(&self, price: f64) -> f64 {
        price * (1.0 - self.down_payment_fraction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRequest {
    pub region: String,
    pub rooms: String,
    pub start_year: Year,
    pub loan_term_years: u32,
    /// Percentage of the portfolio held in equities, 0 to 100.
    pub equity_allocation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentYearRecord {
    pub year: Year,
    pub elapsed_years: i32,
    pub price: f64,
    pub mortgage_balance: f64,
    pub equity: f64,
    pub cumulative_payments: f64,
    pub yearly_net_rent: f64,
    pub cumulative_rent: f64,
    pub inflation_factor: f64,
    pub nominal_return: f64,
    pub real_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioYearRecord {
    pub year: Year,
    pub elapsed_years: i32,
    pub equity_allocation: f64,
    /// Value after this year's management fee, before liquidation.
    pub portfolio_value: f64,
    pub cumulative_principal: f64,
    pub management_fee: f64,
    pub transaction_fees: f64,
    pub cumulative_management_fees: f64,
    pub cumulative_transaction_fees: f64,
    pub initial_exchange_fee: f64,
    pub liquidation_fee: f64,
    pub total_fees: f64,
    pub value_after_fees: f64,
    pub pre_tax_profit: f64,
    pub tax: f64,
    pub net_nominal_return: f64,
    pub inflation_factor: f64,
    pub real_return: f64,
}

/// Rejects year lists that are not strictly ascending or that start before
/// the purchase year.
pub(crate) fn ensure_simulated_years(
    purchase_year: Year,
    years: &[Year],
) -> Result<(), SimulationError> {
    if years.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(SimulationError::InvalidParameter(
            "simulated years must be strictly ascending".to_string(),
        ));
    }
    if let Some(first) = years.first() {
        if *first < purchase_year {
            return Err(SimulationError::InvalidParameter(format!(
                "simulated year {first} precedes purchase year {purchase_year}"
            )));
        }
    }
    Ok(())
}
