use std::collections::BTreeSet;

use crate::core::inflation::InflationFactors;
use crate::core::mortgage::MortgageTerms;
use crate::core::rent::RentalCashFlow;
use crate::core::types::{ApartmentYearRecord, Assumptions, Year, YearlySeries, ensure_simulated_years};
use crate::error::{DataSeries, SimulationError};

#[derive(Debug, Clone, Copy)]
pub struct ApartmentInputs<'a> {
    pub prices: &'a YearlySeries,
    pub gross_rent: &'a YearlySeries,
    pub inflation: &'a InflationFactors,
    pub purchase_year: Year,
    pub initial_price: f64,
    pub annual_rate: f64,
    pub term_years: u32,
    pub assumptions: Assumptions,
}

/// Yearly value of buying the apartment with a mortgage and renting it out.
///
/// Every price, rent and inflation year the run needs is validated up front,
/// so the result is either complete or an error naming all missing years.
pub fn simulate_apartment(
    inputs: &ApartmentInputs<'_>,
    years: &[Year],
) -> Result<Vec<ApartmentYearRecord>, SimulationError> {
    ensure_simulated_years(inputs.purchase_year, years)?;
    let Some(&last_year) = years.last() else {
        return Ok(Vec::new());
    };

    let missing_prices = inputs.prices.missing_years(years.iter().copied());
    if !missing_prices.is_empty() {
        return Err(SimulationError::missing(
            DataSeries::ApartmentPrice,
            missing_prices,
        ));
    }

    // Yearly rent is reported for every simulated year and accumulated over
    // every calendar year before the last one.
    let rent_years = (inputs.purchase_year..last_year)
        .chain(years.iter().copied())
        .collect::<BTreeSet<_>>();
    let missing_rent = inputs.gross_rent.missing_years(rent_years);
    if !missing_rent.is_empty() {
        return Err(SimulationError::missing(DataSeries::Rent, missing_rent));
    }

    inputs.inflation.require(years)?;

    let assumptions = &inputs.assumptions;
    let down_payment = assumptions.down_payment(inputs.initial_price);
    let mortgage = MortgageTerms::new(
        assumptions.mortgage_amount(inputs.initial_price),
        inputs.annual_rate,
        inputs.term_years,
    )?;

    let rent = RentalCashFlow::new(inputs.gross_rent, assumptions.maintenance_fraction);
    let cumulative_rents = rent.cumulative_series(inputs.purchase_year, years)?;

    let mut records = Vec::with_capacity(years.len());
    for (&year, cumulative_rent) in years.iter().zip(cumulative_rents) {
        let elapsed_years = year - inputs.purchase_year;
        let price = inputs
            .prices
            .get(year)
            .ok_or_else(|| SimulationError::missing(DataSeries::ApartmentPrice, vec![year]))?;
        let mortgage_balance = mortgage.balance_after(elapsed_years);
        let equity = price - mortgage_balance;
        let cumulative_payments = down_payment + mortgage.payments_through(elapsed_years);
        let nominal_return = equity - cumulative_payments + cumulative_rent;
        let inflation_factor = inputs.inflation.factor_or_missing(year)?;

        records.push(ApartmentYearRecord {
            year,
            elapsed_years,
            price,
            mortgage_balance,
            equity,
            cumulative_payments,
            yearly_net_rent: rent.net_rent(year)?,
            cumulative_rent,
            inflation_factor,
            nominal_return,
            real_return: nominal_return * inflation_factor,
        });
    }

    Ok(records)
}
