
mod loader;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::{InterestRateTable, Year, YearlySeries};

pub use loader::{
    load_reference_data, read_apartment_prices, read_cpi_changes, read_interest_rates,
    read_market_returns, read_rent_prices,
};

const HIDDEN_ROOM_CATEGORIES: [&str; 2] = ["4-5", "5-6"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DatasetKey {
    pub region: String,
    pub rooms: String,
}

impl DatasetKey {
    pub fn new(region: impl Into<String>, rooms: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            rooms: rooms.into(),
        }
    }
}

/// All datasets a comparison reads from. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    prices: BTreeMap<DatasetKey, YearlySeries>,
    rents: BTreeMap<DatasetKey, YearlySeries>,
    interest_rates: InterestRateTable,
    cpi_changes: YearlySeries,
    stock_returns: YearlySeries,
    bond_returns: YearlySeries,
}

impl ReferenceData {
    pub fn new(
        prices: BTreeMap<DatasetKey, YearlySeries>,
        rents: BTreeMap<DatasetKey, YearlySeries>,
        interest_rates: InterestRateTable,
        cpi_changes: YearlySeries,
        stock_returns: YearlySeries,
        bond_returns: YearlySeries,
    ) -> Self {
        Self {
            prices,
            rents,
            interest_rates,
            cpi_changes,
            stock_returns,
            bond_returns,
        }
    }

    pub fn price_series(&self, key: &DatasetKey) -> Option<&YearlySeries> {
        self.prices.get(key)
    }

    pub fn rent_series(&self, key: &DatasetKey) -> Option<&YearlySeries> {
        self.rents.get(key)
    }

    pub fn interest_rates(&self) -> &InterestRateTable {
        &self.interest_rates
    }

    pub fn cpi_changes(&self) -> &YearlySeries {
        &self.cpi_changes
    }

    pub fn stock_returns(&self) -> &YearlySeries {
        &self.stock_returns
    }

    pub fn bond_returns(&self) -> &YearlySeries {
        &self.bond_returns
    }

    pub fn dataset_count(&self) -> usize {
        self.prices.len()
    }

    pub fn regions(&self) -> Vec<String> {
        self.prices
            .keys()
            .map(|key| key.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Selectable room categories. The sparse `4-5` and `5-6` series are
    /// left out.
    pub fn room_categories(&self) -> Vec<String> {
        self.prices
            .keys()
            .filter(|key| !HIDDEN_ROOM_CATEGORIES.contains(&key.rooms.as_str()))
            .map(|key| key.rooms.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn market_horizon(&self) -> Option<Year> {
        [
            self.cpi_changes.last_year(),
            self.stock_returns.last_year(),
            self.bond_returns.last_year(),
        ]
        .into_iter()
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .min()
    }

    pub fn market_start(&self) -> Option<Year> {
        [
            self.cpi_changes.first_year(),
            self.stock_returns.first_year(),
            self.bond_returns.first_year(),
        ]
        .into_iter()
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()
    }

    /// Years with apartment prices (in any dataset), CPI, stock and bond
    /// data. Falls back to the CPI years when nothing overlaps.
    pub fn available_years(&self) -> Vec<Year> {
        let apartment_years = self
            .prices
            .values()
            .flat_map(|series| series.years())
            .collect::<BTreeSet<_>>();

        let common = apartment_years
            .into_iter()
            .filter(|year| {
                self.cpi_changes.contains(*year)
                    && self.stock_returns.contains(*year)
                    && self.bond_returns.contains(*year)
            })
            .collect::<Vec<_>>();

        if common.is_empty() {
            tracing::warn!("no common years across apartment, CPI and market data");
            return self.cpi_changes.years().collect();
        }
        common
    }

    pub fn default_start_year(&self) -> Option<Year> {
        self.available_years().first().copied()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::core::RateBand;

    pub fn flat_series(first: Year, last: Year, value: f64) -> YearlySeries {
        (first..=last).map(|year| (year, value)).collect()
    }

    pub fn growing_series(first: Year, last: Year, start: f64, growth: f64) -> YearlySeries {
        (first..=last)
            .map(|year| (year, start * (1.0 + growth).powi(year - first)))
            .collect()
    }

    /// Two datasets over 1995-2023 with market data through 2022.
    pub fn sample_reference() -> ReferenceData {
        let mut prices = BTreeMap::new();
        let mut rents = BTreeMap::new();

        prices.insert(
            DatasetKey::new("כולם", "הכל"),
            growing_series(1995, 2023, 500_000.0, 0.06),
        );
        rents.insert(
            DatasetKey::new("כולם", "הכל"),
            growing_series(1998, 2023, 24_000.0, 0.04),
        );

        prices.insert(
            DatasetKey::new("חיפה", "3-3.5"),
            growing_series(2005, 2010, 700_000.0, 0.05),
        );
        rents.insert(
            DatasetKey::new("חיפה", "3-3.5"),
            growing_series(2012, 2020, 36_000.0, 0.03),
        );

        let interest_rates = InterestRateTable::from_observations(
            RateBand::ALL
                .into_iter()
                .enumerate()
                .map(|(idx, band)| (band, 0.03 + 0.002 * idx as f64)),
        )
        .expect("observations");

        ReferenceData::new(
            prices,
            rents,
            interest_rates,
            flat_series(1990, 2022, 2.0),
            flat_series(1990, 2022, 9.0),
            flat_series(1990, 2022, 3.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_reference;
    use super::*;

    #[test]
    fn options_are_sorted_and_unique() {
        let reference = sample_reference();
        assert_eq!(reference.regions(), vec!["חיפה".to_string(), "כולם".to_string()]);
        assert_eq!(
            reference.room_categories(),
            vec!["3-3.5".to_string(), "הכל".to_string()]
        );
        assert_eq!(reference.dataset_count(), 2);
    }

    #[test]
    fn wide_room_ranges_are_not_offered() {
        let mut prices = BTreeMap::new();
        for rooms in ["3-3.5", "4-5", "5-6", "הכל"] {
            prices.insert(DatasetKey::new("כולם", rooms), fixtures::flat_series(2000, 2001, 1.0));
        }
        let base = sample_reference();
        let reference = ReferenceData::new(
            prices,
            BTreeMap::new(),
            base.interest_rates().clone(),
            base.cpi_changes().clone(),
            base.stock_returns().clone(),
            base.bond_returns().clone(),
        );
        assert_eq!(
            reference.room_categories(),
            vec!["3-3.5".to_string(), "הכל".to_string()]
        );
        assert_eq!(reference.dataset_count(), 4);
    }

    #[test]
    fn available_years_intersect_prices_with_market_data() {
        let reference = sample_reference();
        let years = reference.available_years();
        assert_eq!(years.first(), Some(&1995));
        assert_eq!(years.last(), Some(&2022));
        assert_eq!(reference.default_start_year(), Some(1995));
    }

    #[test]
    fn market_horizon_is_the_shortest_series_end() {
        let reference = sample_reference();
        assert_eq!(reference.market_horizon(), Some(2022));

        let truncated = ReferenceData::new(
            BTreeMap::new(),
            BTreeMap::new(),
            reference.interest_rates().clone(),
            reference.cpi_changes().clone(),
            reference.stock_returns().clone(),
            YearlySeries::new(),
        );
        assert_eq!(truncated.market_horizon(), None);
        assert_eq!(truncated.market_start(), None);
    }

    #[test]
    fn market_start_is_the_latest_series_start() {
        let reference = ReferenceData::new(
            BTreeMap::new(),
            BTreeMap::new(),
            sample_reference().interest_rates().clone(),
            fixtures::flat_series(1990, 2020, 1.0),
            fixtures::flat_series(1996, 2020, 8.0),
            fixtures::flat_series(1993, 2018, 3.0),
        );
        assert_eq!(reference.market_start(), Some(1996));
        assert_eq!(reference.market_horizon(), Some(2018));
    }

    #[test]
    fn available_years_fall_back_to_cpi_years() {
        let reference = ReferenceData::new(
            BTreeMap::new(),
            BTreeMap::new(),
            sample_reference().interest_rates().clone(),
            fixtures::flat_series(2000, 2002, 1.0),
            YearlySeries::new(),
            YearlySeries::new(),
        );
        assert_eq!(reference.available_years(), vec![2000, 2001, 2002]);
    }
}
