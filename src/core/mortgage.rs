use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::SimulationError;

/// Fixed monthly payment of an amortizing loan.
///
/// `term_years` must be positive. A zero rate falls back to straight-line
/// repayment.
pub fn monthly_payment(principal: f64, annual_rate: f64, term_years: u32) -> f64 {
    let months = f64::from(term_years) * 12.0;
    let monthly_rate = annual_rate / 12.0;
    if monthly_rate == 0.0 {
        return principal / months;
    }

    let growth = (1.0 + monthly_rate).powf(months);
    principal * monthly_rate * growth / (growth - 1.0)
}

pub fn remaining_balance(
    elapsed_years: i32,
    principal: f64,
    annual_rate: f64,
    annual_payment: f64,
    term_years: u32,
) -> f64 {
    if elapsed_years <= 0 {
        return principal;
    }
    if elapsed_years.unsigned_abs() >= term_years {
        return 0.0;
    }

    let months = f64::from(elapsed_years) * 12.0;
    let monthly_rate = annual_rate / 12.0;
    let monthly_payment = annual_payment / 12.0;
    if monthly_rate == 0.0 {
        return principal - monthly_payment * months;
    }

    let growth = (1.0 + monthly_rate).powf(months);
    principal * growth - monthly_payment * (growth - 1.0) / monthly_rate
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MortgageTerms {
    pub principal: f64,
    pub annual_rate: f64,
    pub term_years: u32,
    pub monthly_payment: f64,
}

impl MortgageTerms {
    pub fn new(principal: f64, annual_rate: f64, term_years: u32) -> Result<Self, SimulationError> {
        if term_years == 0 {
            return Err(SimulationError::InvalidParameter(
                "loan term must be at least one year".to_string(),
            ));
        }
        if !principal.is_finite() || principal < 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "loan principal must be a non-negative amount, got {principal}"
            )));
        }
        if !annual_rate.is_finite() || annual_rate <= -1.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "annual interest rate must be above -100%, got {annual_rate}"
            )));
        }

        Ok(Self {
            principal,
            annual_rate,
            term_years,
            monthly_payment: monthly_payment(principal, annual_rate, term_years),
        })
    }

    pub fn annual_payment(&self) -> f64 {
        self.monthly_payment * 12.0
    }

    pub fn total_scheduled_payments(&self) -> f64 {
        self.annual_payment() * f64::from(self.term_years)
    }

    pub fn balance_after(&self, elapsed_years: i32) -> f64 {
        remaining_balance(
            elapsed_years,
            self.principal,
            self.annual_rate,
            self.annual_payment(),
            self.term_years,
        )
    }

    /// Payments made once `elapsed_years` have passed, capped at the term.
    pub fn payments_through(&self, elapsed_years: i32) -> f64 {
        let paid_years = elapsed_years.clamp(0, i32::try_from(self.term_years).unwrap_or(i32::MAX));
        self.annual_payment() * f64::from(paid_years)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateBand {
    UpToOne,
    OneToFive,
    FiveToTen,
    TenToFifteen,
    FifteenToTwenty,
    TwentyToTwentyFive,
    OverTwentyFive,
}

impl RateBand {
    pub const ALL: [RateBand; 7] = [
        RateBand::UpToOne,
        RateBand::OneToFive,
        RateBand::FiveToTen,
        RateBand::TenToFifteen,
        RateBand::FifteenToTwenty,
        RateBand::TwentyToTwentyFive,
        RateBand::OverTwentyFive,
    ];

    /// Band whose half-open interval `(lower, upper]` contains the term.
    pub fn for_term(term_years: u32) -> Option<Self> {
        match term_years {
            0 => None,
            1 => Some(RateBand::UpToOne),
            2..=5 => Some(RateBand::OneToFive),
            6..=10 => Some(RateBand::FiveToTen),
            11..=15 => Some(RateBand::TenToFifteen),
            16..=20 => Some(RateBand::FifteenToTwenty),
            21..=25 => Some(RateBand::TwentyToTwentyFive),
            _ => Some(RateBand::OverTwentyFive),
        }
    }
}

/// Average annual mortgage rate (as a fraction) per term band.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestRateTable {
    band_rates: BTreeMap<RateBand, f64>,
    overall_average: f64,
}

impl InterestRateTable {
    pub fn new(band_rates: BTreeMap<RateBand, f64>, overall_average: f64) -> Self {
        Self {
            band_rates,
            overall_average,
        }
    }

    pub fn from_observations<I>(observations: I) -> Option<Self>
    where
        I: IntoIterator<Item = (RateBand, f64)>,
    {
        let mut sums: BTreeMap<RateBand, (f64, u32)> = BTreeMap::new();
        let mut total = 0.0;
        let mut count = 0u32;
        for (band, rate) in observations {
            let entry = sums.entry(band).or_insert((0.0, 0));
            entry.0 += rate;
            entry.1 += 1;
            total += rate;
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let band_rates = sums
            .into_iter()
            .map(|(band, (sum, n))| (band, sum / f64::from(n)))
            .collect();
        Some(Self::new(band_rates, total / f64::from(count)))
    }

    pub fn band_rate(&self, band: RateBand) -> Option<f64> {
        self.band_rates.get(&band).copied()
    }

    pub fn overall_average(&self) -> f64 {
        self.overall_average
    }

    /// Rate for a loan term, falling back to the overall average when no
    /// band matches or the band has no published rate.
    pub fn rate_for_term(&self, term_years: u32) -> f64 {
        RateBand::for_term(term_years)
            .and_then(|band| self.band_rate(band))
            .unwrap_or(self.overall_average)
    }
}
