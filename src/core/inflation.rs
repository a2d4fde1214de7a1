use std::collections::BTreeMap;

use crate::core::types::{Year, YearlySeries};
use crate::error::{DataSeries, SimulationError};

/// Seed of the cumulative price index. Only ratios of levels are used, so
/// the value is arbitrary.
pub const INDEX_BASE: f64 = 100.0;

/// Per-year multipliers that express a nominal amount from that year in the
/// money of the latest year with CPI data.
#[derive(Debug, Clone, PartialEq)]
pub struct InflationFactors {
    index_levels: BTreeMap<Year, f64>,
    factors: BTreeMap<Year, f64>,
}

impl InflationFactors {
    /// Builds factors from yearly percentage changes of the price index,
    /// e.g. `2.8` for a 2.8% rise. Each year's change is applied to that
    /// year's index level.
    pub fn from_changes(changes: &YearlySeries) -> Self {
        let mut index_levels = BTreeMap::new();
        let mut level = INDEX_BASE;
        // YearlySeries iterates in ascending year order, which the running
        // product relies on.
        for (year, pct) in changes.iter() {
            level *= 1.0 + pct / 100.0;
            index_levels.insert(year, level);
        }

        let latest_level = index_levels.values().next_back().copied();
        let factors = match latest_level {
            Some(latest) => index_levels
                .iter()
                .map(|(year, level)| (*year, latest / level))
                .collect(),
            None => BTreeMap::new(),
        };

        Self {
            index_levels,
            factors,
        }
    }

    pub fn factor(&self, year: Year) -> Option<f64> {
        self.factors.get(&year).copied()
    }

    pub fn index_level(&self, year: Year) -> Option<f64> {
        self.index_levels.get(&year).copied()
    }

    pub fn latest_year(&self) -> Option<Year> {
        self.factors.keys().next_back().copied()
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.factors.keys().copied()
    }

    pub fn require(&self, years: &[Year]) -> Result<(), SimulationError> {
        let mut missing = years
            .iter()
            .copied()
            .filter(|year| !self.factors.contains_key(year))
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        missing.dedup();
        Err(SimulationError::missing(DataSeries::Inflation, missing))
    }

    pub(crate) fn factor_or_missing(&self, year: Year) -> Result<f64, SimulationError> {
        self.factor(year)
            .ok_or_else(|| SimulationError::missing(DataSeries::Inflation, vec![year]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_changes() -> YearlySeries {
        [(2020, 2.0), (2021, 3.0), (2022, -1.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn index_levels_are_a_running_product() {
        let factors = InflationFactors::from_changes(&sample_changes());
        assert_approx(factors.index_level(2020).unwrap(), 102.0);
        assert_approx(factors.index_level(2021).unwrap(), 105.06);
        assert_approx(factors.index_level(2022).unwrap(), 104.0094);
    }

    #[test]
    fn factors_are_relative_to_latest_year() {
        let factors = InflationFactors::from_changes(&sample_changes());
        assert_eq!(factors.latest_year(), Some(2022));
        assert_eq!(factors.factor(2022), Some(1.0));
        assert_approx(factors.factor(2020).unwrap(), 104.0094 / 102.0);
        assert_approx(factors.factor(2021).unwrap(), 0.99);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let shuffled = [(2022, -1.0), (2020, 2.0), (2021, 3.0)]
            .into_iter()
            .collect::<YearlySeries>();
        assert_eq!(
            InflationFactors::from_changes(&shuffled),
            InflationFactors::from_changes(&sample_changes())
        );
    }

    #[test]
    fn require_names_every_missing_year() {
        let factors = InflationFactors::from_changes(&sample_changes());
        assert!(factors.require(&[2020, 2022]).is_ok());
        let err = factors
            .require(&[2019, 2020, 2023, 2025])
            .expect_err("years outside the CPI data");
        assert_eq!(
            err,
            SimulationError::missing(DataSeries::Inflation, vec![2019, 2023, 2025])
        );
    }

    #[test]
    fn empty_changes_give_no_factors() {
        let factors = InflationFactors::from_changes(&YearlySeries::new());
        assert_eq!(factors.latest_year(), None);
        assert_eq!(factors.factor(2020), None);
    }
}
