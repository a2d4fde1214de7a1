mod apartment;
mod compare;
mod inflation;
mod mortgage;
mod portfolio;
mod rent;
mod types;

pub use apartment::{ApartmentInputs, simulate_apartment};
pub use compare::{
    Comparison, ComparisonRow, ComparisonSummary, ScenarioState, ScenarioWindow, Strategy,
    WinnerBasis, area_under_curve, compare, resolve_scenario, winner_by_area,
};
pub use inflation::{INDEX_BASE, InflationFactors};
pub use mortgage::{InterestRateTable, MortgageTerms, RateBand, monthly_payment, remaining_balance};
pub use portfolio::{PortfolioInputs, simulate_portfolio};
pub use rent::RentalCashFlow;
pub use types::{
    ApartmentYearRecord, Assumptions, PortfolioYearRecord, ScenarioRequest, Year, YearRange,
    YearlySeries,
};
