use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::{ScenarioState, Year, YearRange};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSeries {
    ApartmentPrice,
    Rent,
    Inflation,
    MarketReturns,
}

impl fmt::Display for DataSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSeries::ApartmentPrice => "apartment-price",
            DataSeries::Rent => "rent",
            DataSeries::Inflation => "inflation",
            DataSeries::MarketReturns => "market-return",
        };
        f.write_str(name)
    }
}

fn describe_range(range: &Option<YearRange>) -> String {
    match range {
        Some(range) => range.to_string(),
        None => "none".to_string(),
    }
}

/// Errors raised while resolving or simulating a scenario.
///
/// `MissingData` is a defect in the reference data and is fatal to the run.
/// Every other variant is caused by the caller's parameters and can be shown
/// to the user as an actionable message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("missing {series} data for years {years:?}")]
    MissingData { series: DataSeries, years: Vec<Year> },

    #[error("start year {requested} is outside the available range {valid}")]
    InvalidRange { requested: Year, valid: YearRange },

    #[error(
        "no overlapping years between apartment prices ({}) and rent ({})",
        describe_range(.price_years),
        describe_range(.rent_years)
    )]
    NoOverlap {
        price_years: Option<YearRange>,
        rent_years: Option<YearRange>,
    },

    #[error("no data available from {start_year} onwards")]
    EmptyAfterFilter { start_year: Year },

    #[error("no dataset for region {region:?} with {rooms:?} rooms")]
    UnknownDataset { region: String, rooms: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SimulationError {
    pub fn missing(series: DataSeries, years: Vec<Year>) -> Self {
        SimulationError::MissingData { series, years }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimulationError::MissingData { .. })
    }

    pub fn scenario_state(&self) -> Option<ScenarioState> {
        match self {
            SimulationError::NoOverlap { .. } => Some(ScenarioState::NoOverlap),
            SimulationError::InvalidRange { .. } => Some(ScenarioState::StartYearOutOfRange),
            SimulationError::EmptyAfterFilter { .. } => Some(ScenarioState::EmptyAfterFilter),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {file}: {source}")]
    Csv { file: String, source: csv::Error },

    #[error("{file}: duplicate entry for {what} in {year}")]
    Duplicate {
        file: String,
        what: String,
        year: Year,
    },

    #[error("{file}: non-finite value for {what} in {year}")]
    NonFinite {
        file: String,
        what: String,
        year: Year,
    },

    #[error("{file}: contains no usable rows")]
    Empty { file: String },
}
