use serde::Serialize;

use crate::core::apartment::{ApartmentInputs, simulate_apartment};
use crate::core::inflation::InflationFactors;
use crate::core::mortgage::MortgageTerms;
use crate::core::portfolio::{PortfolioInputs, simulate_portfolio};
use crate::core::types::{
    ApartmentYearRecord, Assumptions, PortfolioYearRecord, ScenarioRequest, Year, YearRange,
    YearlySeries,
};
use crate::data::{DatasetKey, ReferenceData};
use crate::error::{DataSeries, SimulationError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioState {
    NoOverlap,
    StartYearOutOfRange,
    EmptyAfterFilter,
    Ok,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Apartment,
    Portfolio,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinnerBasis {
    /// Sum of yearly real returns over every simulated year.
    CumulativeArea,
}

#[derive(Debug, Clone)]
pub struct ScenarioWindow<'a> {
    pub key: DatasetKey,
    pub prices: &'a YearlySeries,
    pub gross_rent: &'a YearlySeries,
    /// Shared price/rent years from the first year with CPI and market data.
    pub valid_range: YearRange,
    pub years: Vec<Year>,
}

impl ScenarioWindow<'_> {
    pub fn purchase_year(&self) -> Option<Year> {
        self.years.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub year: Year,
    pub apartment_real_return: f64,
    pub portfolio_real_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub purchase_year: Year,
    pub initial_price: f64,
    pub down_payment: f64,
    pub mortgage_amount: f64,
    pub loan_term_years: u32,
    pub interest_rate: f64,
    pub monthly_payment: f64,
    pub real_purchase_price: f64,
    pub final_year: Year,
    pub apartment_final_real_return: f64,
    pub portfolio_final_real_return: f64,
    pub apartment_area: f64,
    pub portfolio_area: f64,
    pub winner: Strategy,
    pub winner_basis: WinnerBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub request: ScenarioRequest,
    pub apartment: Vec<ApartmentYearRecord>,
    pub portfolio: Vec<PortfolioYearRecord>,
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
}

/// Picks the years to simulate for `request`.
///
/// Simulated years are those present in both the price and rent datasets,
/// no earlier than the start year and within the years covered by CPI, stock
/// and bond data alike.
pub fn resolve_scenario<'a>(
    reference: &'a ReferenceData,
    request: &ScenarioRequest,
) -> Result<ScenarioWindow<'a>, SimulationError> {
    let key = DatasetKey::new(request.region.as_str(), request.rooms.as_str());
    let prices = reference.price_series(&key);
    let rents = reference.rent_series(&key);

    let (prices, gross_rent) = match (prices, rents) {
        (None, None) => {
            return Err(SimulationError::UnknownDataset {
                region: request.region.clone(),
                rooms: request.rooms.clone(),
            });
        }
        (Some(prices), Some(rents)) => (prices, rents),
        (prices, rents) => {
            return Err(SimulationError::NoOverlap {
                price_years: prices.and_then(YearlySeries::range),
                rent_years: rents.and_then(YearlySeries::range),
            });
        }
    };

    let common = prices
        .years()
        .filter(|year| gross_rent.contains(*year))
        .collect::<Vec<_>>();
    let (Some(&first), Some(&last)) = (common.first(), common.last()) else {
        return Err(SimulationError::NoOverlap {
            price_years: prices.range(),
            rent_years: gross_rent.range(),
        });
    };

    // Start years before the CPI and market data begin cannot be simulated.
    let lower = reference.market_start().map_or(first, |start| start.max(first));
    if lower > last {
        return Err(SimulationError::EmptyAfterFilter {
            start_year: request.start_year,
        });
    }
    let valid_range = YearRange::new(lower, last);
    if !valid_range.contains(request.start_year) {
        return Err(SimulationError::InvalidRange {
            requested: request.start_year,
            valid: valid_range,
        });
    }

    let horizon = reference.market_horizon();
    let years = common
        .into_iter()
        .filter(|year| *year >= request.start_year)
        .filter(|year| horizon.is_some_and(|horizon| *year <= horizon))
        .collect::<Vec<_>>();
    if years.is_empty() {
        return Err(SimulationError::EmptyAfterFilter {
            start_year: request.start_year,
        });
    }

    Ok(ScenarioWindow {
        key,
        prices,
        gross_rent,
        valid_range,
        years,
    })
}

pub fn compare(
    reference: &ReferenceData,
    request: &ScenarioRequest,
    assumptions: &Assumptions,
) -> Result<Comparison, SimulationError> {
    tracing::debug!(
        region = %request.region,
        rooms = %request.rooms,
        start_year = request.start_year,
        loan_term = request.loan_term_years,
        equity_allocation = request.equity_allocation,
        "comparing scenario"
    );

    let window = resolve_scenario(reference, request)?;
    let Some(purchase_year) = window.purchase_year() else {
        return Err(SimulationError::EmptyAfterFilter {
            start_year: request.start_year,
        });
    };
    let initial_price = window
        .prices
        .get(purchase_year)
        .ok_or_else(|| SimulationError::missing(DataSeries::ApartmentPrice, vec![purchase_year]))?;

    let inflation = InflationFactors::from_changes(reference.cpi_changes());
    let annual_rate = reference
        .interest_rates()
        .rate_for_term(request.loan_term_years);

    let apartment = simulate_apartment(
        &ApartmentInputs {
            prices: window.prices,
            gross_rent: window.gross_rent,
            inflation: &inflation,
            purchase_year,
            initial_price,
            annual_rate,
            term_years: request.loan_term_years,
            assumptions: *assumptions,
        },
        &window.years,
    )?;
    let portfolio = simulate_portfolio(
        &PortfolioInputs {
            stock_returns: reference.stock_returns(),
            bond_returns: reference.bond_returns(),
            inflation: &inflation,
            purchase_year,
            initial_price,
            annual_rate,
            term_years: request.loan_term_years,
            equity_allocation: request.equity_allocation,
            assumptions: *assumptions,
        },
        &window.years,
    )?;

    let rows = apartment
        .iter()
        .zip(&portfolio)
        .map(|(apartment, portfolio)| ComparisonRow {
            year: apartment.year,
            apartment_real_return: apartment.real_return,
            portfolio_real_return: portfolio.real_return,
        })
        .collect::<Vec<_>>();

    let mortgage = MortgageTerms::new(
        assumptions.mortgage_amount(initial_price),
        annual_rate,
        request.loan_term_years,
    )?;
    let apartment_area = area_under_curve(apartment.iter().map(|record| record.real_return));
    let portfolio_area = area_under_curve(portfolio.iter().map(|record| record.real_return));
    let (final_year, apartment_final, portfolio_final) = match (apartment.last(), portfolio.last()) {
        (Some(apartment), Some(portfolio)) => {
            (apartment.year, apartment.real_return, portfolio.real_return)
        }
        _ => {
            return Err(SimulationError::EmptyAfterFilter {
                start_year: request.start_year,
            });
        }
    };

    let summary = ComparisonSummary {
        purchase_year,
        initial_price,
        down_payment: assumptions.down_payment(initial_price),
        mortgage_amount: mortgage.principal,
        loan_term_years: request.loan_term_years,
        interest_rate: annual_rate,
        monthly_payment: mortgage.monthly_payment,
        real_purchase_price: initial_price * inflation.factor_or_missing(purchase_year)?,
        final_year,
        apartment_final_real_return: apartment_final,
        portfolio_final_real_return: portfolio_final,
        apartment_area,
        portfolio_area,
        winner: winner_by_area(apartment_area, portfolio_area),
        winner_basis: WinnerBasis::CumulativeArea,
    };

    tracing::debug!(
        years = rows.len(),
        winner = ?summary.winner,
        apartment_area,
        portfolio_area,
        "scenario compared"
    );

    Ok(Comparison {
        request: request.clone(),
        apartment,
        portfolio,
        rows,
        summary,
    })
}

pub fn area_under_curve<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().sum()
}

/// The apartment wins only with a strictly larger area.
pub fn winner_by_area(apartment_area: f64, portfolio_area: f64) -> Strategy {
    if apartment_area > portfolio_area {
        Strategy::Apartment
    } else {
        Strategy::Portfolio
    }
}
