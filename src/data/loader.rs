use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::core::{InterestRateTable, RateBand, Year, YearlySeries};
use crate::data::{DatasetKey, ReferenceData};
use crate::error::DataError;

pub const APARTMENT_PRICES_FILE: &str = "apartment_prices.csv";
pub const RENT_PRICES_FILE: &str = "rent_prices.csv";
pub const INTEREST_RATES_FILE: &str = "interest_rates.csv";
pub const CPI_FILE: &str = "cpi.csv";
pub const MARKET_RETURNS_FILE: &str = "market_returns.csv";

#[derive(Debug, Deserialize)]
struct PriceRow {
    region: String,
    rooms: String,
    year: Year,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct RentRow {
    region: String,
    rooms: String,
    year: Year,
    monthly_rent: f64,
}

#[derive(Debug, Deserialize)]
struct CpiRow {
    year: Year,
    change_percent: f64,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    year: Year,
    stock_return: f64,
    bond_return: f64,
}

#[derive(Debug, Deserialize)]
struct InterestRateRow {
    up_to_1: Option<f64>,
    from_1_to_5: Option<f64>,
    from_5_to_10: Option<f64>,
    from_10_to_15: Option<f64>,
    from_15_to_20: Option<f64>,
    from_20_to_25: Option<f64>,
    over_25: Option<f64>,
}

impl InterestRateRow {
    fn observations(&self) -> impl Iterator<Item = (RateBand, f64)> + '_ {
        [
            (RateBand::UpToOne, self.up_to_1),
            (RateBand::OneToFive, self.from_1_to_5),
            (RateBand::FiveToTen, self.from_5_to_10),
            (RateBand::TenToFifteen, self.from_10_to_15),
            (RateBand::FifteenToTwenty, self.from_15_to_20),
            (RateBand::TwentyToTwentyFive, self.from_20_to_25),
            (RateBand::OverTwentyFive, self.over_25),
        ]
        .into_iter()
        .filter_map(|(band, rate)| rate.map(|pct| (band, pct / 100.0)))
    }
}

pub fn load_reference_data(dir: &Path) -> Result<ReferenceData, DataError> {
    let prices = read_apartment_prices(open(dir, APARTMENT_PRICES_FILE)?)?;
    let rents = read_rent_prices(open(dir, RENT_PRICES_FILE)?)?;
    let interest_rates = read_interest_rates(open(dir, INTEREST_RATES_FILE)?)?;
    let cpi_changes = read_cpi_changes(open(dir, CPI_FILE)?)?;
    let (stock_returns, bond_returns) = read_market_returns(open(dir, MARKET_RETURNS_FILE)?)?;

    tracing::info!(
        datasets = prices.len(),
        rent_datasets = rents.len(),
        cpi_years = cpi_changes.len(),
        market_years = stock_returns.len(),
        "loaded reference data from {}",
        dir.display()
    );

    Ok(ReferenceData::new(
        prices,
        rents,
        interest_rates,
        cpi_changes,
        stock_returns,
        bond_returns,
    ))
}

fn open(dir: &Path, file: &str) -> Result<File, DataError> {
    let path = dir.join(file);
    File::open(&path).map_err(|source| DataError::Io { path, source })
}

fn read_rows<R, T>(reader: R, file: &str) -> Result<Vec<T>, DataError>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| DataError::Csv {
            file: file.to_string(),
            source,
        })?;
    if rows.is_empty() {
        return Err(DataError::Empty {
            file: file.to_string(),
        });
    }
    Ok(rows)
}

fn insert_checked(
    series: &mut YearlySeries,
    year: Year,
    value: f64,
    file: &str,
    what: &str,
) -> Result<(), DataError> {
    if !value.is_finite() {
        return Err(DataError::NonFinite {
            file: file.to_string(),
            what: what.to_string(),
            year,
        });
    }
    if series.insert(year, value).is_some() {
        return Err(DataError::Duplicate {
            file: file.to_string(),
            what: what.to_string(),
            year,
        });
    }
    Ok(())
}

fn describe(key: &DatasetKey) -> String {
    format!("{} / {}", key.region, key.rooms)
}

pub fn read_apartment_prices<R: Read>(
    reader: R,
) -> Result<BTreeMap<DatasetKey, YearlySeries>, DataError> {
    let mut datasets: BTreeMap<DatasetKey, YearlySeries> = BTreeMap::new();
    for row in read_rows::<_, PriceRow>(reader, APARTMENT_PRICES_FILE)? {
        let key = DatasetKey::new(row.region, row.rooms);
        let what = describe(&key);
        let series = datasets.entry(key).or_default();
        insert_checked(series, row.year, row.price, APARTMENT_PRICES_FILE, &what)?;
    }
    Ok(datasets)
}

/// Reads `region,rooms,year,monthly_rent` rows; the series hold yearly rent.
pub fn read_rent_prices<R: Read>(
    reader: R,
) -> Result<BTreeMap<DatasetKey, YearlySeries>, DataError> {
    let mut datasets: BTreeMap<DatasetKey, YearlySeries> = BTreeMap::new();
    for row in read_rows::<_, RentRow>(reader, RENT_PRICES_FILE)? {
        let key = DatasetKey::new(row.region, row.rooms);
        let what = describe(&key);
        let series = datasets.entry(key).or_default();
        insert_checked(series, row.year, row.monthly_rent * 12.0, RENT_PRICES_FILE, &what)?;
    }
    Ok(datasets)
}

pub fn read_interest_rates<R: Read>(reader: R) -> Result<InterestRateTable, DataError> {
    let rows = read_rows::<_, InterestRateRow>(reader, INTEREST_RATES_FILE)?;
    let observations = rows
        .iter()
        .flat_map(InterestRateRow::observations)
        .collect::<Vec<_>>();
    InterestRateTable::from_observations(observations).ok_or_else(|| DataError::Empty {
        file: INTEREST_RATES_FILE.to_string(),
    })
}

pub fn read_cpi_changes<R: Read>(reader: R) -> Result<YearlySeries, DataError> {
    let mut series = YearlySeries::new();
    for row in read_rows::<_, CpiRow>(reader, CPI_FILE)? {
        insert_checked(&mut series, row.year, row.change_percent, CPI_FILE, "CPI change")?;
    }
    Ok(series)
}

pub fn read_market_returns<R: Read>(reader: R) -> Result<(YearlySeries, YearlySeries), DataError> {
    let mut stocks = YearlySeries::new();
    let mut bonds = YearlySeries::new();
    for row in read_rows::<_, MarketRow>(reader, MARKET_RETURNS_FILE)? {
        insert_checked(&mut stocks, row.year, row.stock_return, MARKET_RETURNS_FILE, "stock return")?;
        insert_checked(&mut bonds, row.year, row.bond_return, MARKET_RETURNS_FILE, "bond return")?;
    }
    Ok((stocks, bonds))
}
