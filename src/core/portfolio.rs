use crate::core::inflation::InflationFactors;
use crate::core::mortgage::MortgageTerms;
use crate::core::types::{Assumptions, PortfolioYearRecord, Year, YearlySeries, ensure_simulated_years};
use crate::error::{DataSeries, SimulationError};

#[derive(Debug, Clone, Copy)]
pub struct PortfolioInputs<'a> {
    pub stock_returns: &'a YearlySeries,
    pub bond_returns: &'a YearlySeries,
    pub inflation: &'a InflationFactors,
    pub purchase_year: Year,
    pub initial_price: f64,
    pub annual_rate: f64,
    pub term_years: u32,
    /// Percentage held in equities, 0 to 100.
    pub equity_allocation: f64,
    pub assumptions: Assumptions,
}

#[derive(Debug, Default)]
struct PortfolioState {
    value: f64,
    cumulative_principal: f64,
    initial_exchange_fee: f64,
    cumulative_transaction_fees: f64,
    cumulative_management_fees: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct YearFees {
    transaction: f64,
    management: f64,
}

/// Yearly value of investing the apartment's cash flows in a stock/bond mix
/// instead: the down payment up front, then the mortgage payment every month
/// until the loan term ends.
///
/// Market returns must cover every calendar year after the purchase year up
/// to the last simulated year; gaps are reported before anything is simulated.
pub fn simulate_portfolio(
    inputs: &PortfolioInputs<'_>,
    years: &[Year],
) -> Result<Vec<PortfolioYearRecord>, SimulationError> {
    if !(0.0..=100.0).contains(&inputs.equity_allocation) {
        return Err(SimulationError::InvalidParameter(format!(
            "equity allocation must be between 0 and 100, got {}",
            inputs.equity_allocation
        )));
    }
    ensure_simulated_years(inputs.purchase_year, years)?;
    let Some(&last_year) = years.last() else {
        return Ok(Vec::new());
    };

    // The purchase year itself earns no return.
    let growth_years = inputs.purchase_year + 1..=last_year;
    let mut missing_market = inputs.stock_returns.missing_years(growth_years.clone());
    missing_market.extend(inputs.bond_returns.missing_years(growth_years));
    missing_market.sort_unstable();
    missing_market.dedup();
    if !missing_market.is_empty() {
        return Err(SimulationError::missing(
            DataSeries::MarketReturns,
            missing_market,
        ));
    }

    inputs.inflation.require(years)?;

    let assumptions = &inputs.assumptions;
    let down_payment = assumptions.down_payment(inputs.initial_price);
    let mortgage = MortgageTerms::new(
        assumptions.mortgage_amount(inputs.initial_price),
        inputs.annual_rate,
        inputs.term_years,
    )?;

    let initial_exchange_fee = down_payment * assumptions.initial_exchange_fee_rate;
    let mut state = PortfolioState {
        value: down_payment - initial_exchange_fee,
        cumulative_principal: down_payment,
        initial_exchange_fee,
        ..PortfolioState::default()
    };

    let mut records = Vec::with_capacity(years.len());
    let mut pending = years.iter().copied().peekable();
    for year in inputs.purchase_year..=last_year {
        let elapsed_years = year - inputs.purchase_year;
        let fees = if elapsed_years == 0 {
            YearFees::default()
        } else {
            let annual_return = blended_return(inputs, year)?;
            let contributing = elapsed_years.unsigned_abs() <= inputs.term_years;
            advance_year(
                &mut state,
                annual_return,
                contributing.then_some(mortgage.monthly_payment),
                assumptions,
            )
        };

        if pending.next_if_eq(&year).is_some() {
            let inflation_factor = inputs.inflation.factor_or_missing(year)?;
            records.push(build_record(
                &state,
                fees,
                year,
                elapsed_years,
                inputs.equity_allocation,
                inflation_factor,
                assumptions,
            ));
        }
    }

    Ok(records)
}

fn blended_return(inputs: &PortfolioInputs<'_>, year: Year) -> Result<f64, SimulationError> {
    let stock = inputs
        .stock_returns
        .get(year)
        .ok_or_else(|| SimulationError::missing(DataSeries::MarketReturns, vec![year]))?;
    let bond = inputs
        .bond_returns
        .get(year)
        .ok_or_else(|| SimulationError::missing(DataSeries::MarketReturns, vec![year]))?;
    let allocation = inputs.equity_allocation;
    Ok((allocation * stock + (100.0 - allocation) * bond) / 100.0 / 100.0)
}

fn monthly_rate(annual_return: f64) -> f64 {
    // A loss of 100% or more wipes the portfolio out.
    (1.0 + annual_return).max(0.0).powf(1.0 / 12.0) - 1.0
}

fn advance_year(
    state: &mut PortfolioState,
    annual_return: f64,
    monthly_contribution: Option<f64>,
    assumptions: &Assumptions,
) -> YearFees {
    let mut fees = YearFees::default();

    match monthly_contribution {
        Some(contribution) => {
            let rate = monthly_rate(annual_return);
            let fee = contribution * assumptions.transaction_fee_rate;
            for _ in 0..12 {
                state.value *= 1.0 + rate;
                state.value += contribution - fee;
                state.cumulative_principal += contribution;
                fees.transaction += fee;
            }
        }
        None => {
            state.value *= (1.0 + annual_return).max(0.0);
        }
    }

    fees.management = state.value * assumptions.management_fee_rate;
    state.value -= fees.management;
    state.cumulative_transaction_fees += fees.transaction;
    state.cumulative_management_fees += fees.management;
    fees
}

fn build_record(
    state: &PortfolioState,
    fees: YearFees,
    year: Year,
    elapsed_years: i32,
    equity_allocation: f64,
    inflation_factor: f64,
    assumptions: &Assumptions,
) -> PortfolioYearRecord {
    let liquidation_fee = state.value * assumptions.liquidation_fee_rate;
    let value_after_fees = state.value - liquidation_fee;
    let pre_tax_profit = value_after_fees - state.cumulative_principal;
    let tax = if pre_tax_profit > 0.0 {
        pre_tax_profit * assumptions.capital_gains_tax_rate
    } else {
        0.0
    };
    let net_nominal_return = pre_tax_profit - tax;

    PortfolioYearRecord {
        year,
        elapsed_years,
        equity_allocation,
        portfolio_value: state.value,
        cumulative_principal: state.cumulative_principal,
        management_fee: fees.management,
        transaction_fees: fees.transaction,
        cumulative_management_fees: state.cumulative_management_fees,
        cumulative_transaction_fees: state.cumulative_transaction_fees,
        initial_exchange_fee: state.initial_exchange_fee,
        liquidation_fee,
        total_fees: state.initial_exchange_fee
            + state.cumulative_transaction_fees
            + state.cumulative_management_fees
            + liquidation_fee,
        value_after_fees,
        pre_tax_profit,
        tax,
        net_nominal_return,
        inflation_factor,
        real_return: net_nominal_return * inflation_factor,
    }
}
