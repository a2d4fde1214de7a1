use crate::core::types::{Year, YearlySeries};
use crate::error::{DataSeries, SimulationError};

#[derive(Debug, Clone, Copy)]
pub struct RentalCashFlow<'a> {
    gross_yearly_rent: &'a YearlySeries,
    maintenance_fraction: f64,
}

impl<'a> RentalCashFlow<'a> {
    pub fn new(gross_yearly_rent: &'a YearlySeries, maintenance_fraction: f64) -> Self {
        Self {
            gross_yearly_rent,
            maintenance_fraction,
        }
    }

    pub fn net_rent(&self, year: Year) -> Result<f64, SimulationError> {
        self.gross_yearly_rent
            .get(year)
            .map(|gross| self.net_of_maintenance(gross))
            .ok_or_else(|| SimulationError::missing(DataSeries::Rent, vec![year]))
    }

    pub fn cumulative_rent(
        &self,
        purchase_year: Year,
        target_year: Year,
    ) -> Result<f64, SimulationError> {
        self.ensure_covered(purchase_year..target_year)?;
        Ok((purchase_year..target_year)
            .filter_map(|year| self.gross_yearly_rent.get(year))
            .map(|gross| self.net_of_maintenance(gross))
            .sum())
    }

    /// Cumulative rent over `[purchase_year, target)` for each ascending
    /// target. The whole interval is validated before anything is summed.
    pub fn cumulative_series(
        &self,
        purchase_year: Year,
        target_years: &[Year],
    ) -> Result<Vec<f64>, SimulationError> {
        if target_years.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(SimulationError::InvalidParameter(
                "cumulative rent target years must be ascending".to_string(),
            ));
        }
        let Some(&last_target) = target_years.last() else {
            return Ok(Vec::new());
        };
        self.ensure_covered(purchase_year..last_target)?;

        let mut cumulative = Vec::with_capacity(target_years.len());
        let mut running = 0.0;
        let mut cursor = purchase_year;
        for &target in target_years {
            while cursor < target {
                running += self.net_rent(cursor)?;
                cursor += 1;
            }
            cumulative.push(running);
        }
        Ok(cumulative)
    }

    fn net_of_maintenance(&self, gross: f64) -> f64 {
        gross * (1.0 - self.maintenance_fraction)
    }

    fn ensure_covered<I>(&self, years: I) -> Result<(), SimulationError>
    where
        I: IntoIterator<Item = Year>,
    {
        let missing = self.gross_yearly_rent.missing_years(years);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SimulationError::missing(DataSeries::Rent, missing))
        }
    }
}
