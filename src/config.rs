use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::{ScenarioRequest, Year};

pub const DEFAULT_REGION: &str = "כולם";
pub const DEFAULT_ROOMS: &str = "הכל";
pub const DEFAULT_LOAN_TERM_YEARS: u32 = 25;
pub const DEFAULT_EQUITY_ALLOCATION: f64 = 80.0;
pub const MAX_LOAN_TERM_YEARS: u32 = 50;

#[derive(Parser, Debug)]
#[command(
    name = "apt-compare",
    about = "Compare a mortgaged rental apartment with a stock/bond portfolio on Israeli data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve(ServeArgs),
    /// Run one comparison and print it as JSON.
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    #[arg(
        long,
        env = "APT_COMPARE_DATA_DIR",
        default_value = "data",
        help = "Directory holding the reference CSV files"
    )]
    pub data_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 8050)]
    pub port: u16,
    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ScenarioArgs {
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,
    #[arg(long, default_value = DEFAULT_ROOMS)]
    pub rooms: String,
    #[arg(
        long,
        help = "First year to simulate; defaults to the earliest year with complete data"
    )]
    pub start_year: Option<Year>,
    #[arg(long, default_value_t = DEFAULT_LOAN_TERM_YEARS, help = "Mortgage term in years")]
    pub loan_term: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_EQUITY_ALLOCATION,
        help = "Share of the portfolio held in equities, in percent"
    )]
    pub equity_allocation: f64,
}

impl Default for ScenarioArgs {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            rooms: DEFAULT_ROOMS.to_string(),
            start_year: None,
            loan_term: DEFAULT_LOAN_TERM_YEARS,
            equity_allocation: DEFAULT_EQUITY_ALLOCATION,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    #[command(flatten)]
    pub data: DataArgs,
}

/// Validates scenario arguments. `default_start_year` fills in a missing
/// start year.
pub fn build_request(
    args: ScenarioArgs,
    default_start_year: Option<Year>,
) -> Result<ScenarioRequest, String> {
    if args.region.trim().is_empty() {
        return Err("--region must not be empty".to_string());
    }

    if args.rooms.trim().is_empty() {
        return Err("--rooms must not be empty".to_string());
    }

    if !(1..=MAX_LOAN_TERM_YEARS).contains(&args.loan_term) {
        return Err(format!(
            "--loan-term must be between 1 and {MAX_LOAN_TERM_YEARS}"
        ));
    }

    if !args.equity_allocation.is_finite() || !(0.0..=100.0).contains(&args.equity_allocation) {
        return Err("--equity-allocation must be between 0 and 100".to_string());
    }

    let start_year = args
        .start_year
        .or(default_start_year)
        .ok_or_else(|| "--start-year is required: no year has complete data".to_string())?;

    Ok(ScenarioRequest {
        region: args.region,
        rooms: args.rooms,
        start_year,
        loan_term_years: args.loan_term,
        equity_allocation: args.equity_allocation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_subcommand_applies_defaults() {
        let cli = Cli::try_parse_from(["apt-compare", "compare", "--start-year", "2005"])
            .expect("valid args");
        let Command::Compare(args) = cli.command else {
            panic!("expected compare subcommand");
        };
        assert_eq!(args.scenario.region, DEFAULT_REGION);
        assert_eq!(args.scenario.rooms, DEFAULT_ROOMS);
        assert_eq!(args.scenario.start_year, Some(2005));
        assert_eq!(args.scenario.loan_term, 25);
        assert_eq!(args.scenario.equity_allocation, 80.0);
    }

    #[test]
    fn build_request_uses_default_start_year() {
        let request = build_request(ScenarioArgs::default(), Some(1998)).expect("valid request");
        assert_eq!(request.start_year, 1998);
        assert_eq!(request.loan_term_years, DEFAULT_LOAN_TERM_YEARS);
    }

    #[test]
    fn build_request_rejects_out_of_range_loan_term() {
        for loan_term in [0, 51] {
            let args = ScenarioArgs {
                loan_term,
                ..ScenarioArgs::default()
            };
            let err = build_request(args, Some(2000)).expect_err("must reject loan term");
            assert!(err.contains("--loan-term"));
        }
    }

    #[test]
    fn build_request_rejects_out_of_range_allocation() {
        for equity_allocation in [-1.0, 100.5, f64::NAN] {
            let args = ScenarioArgs {
                equity_allocation,
                ..ScenarioArgs::default()
            };
            let err = build_request(args, Some(2000)).expect_err("must reject allocation");
            assert!(err.contains("--equity-allocation"));
        }
    }

    #[test]
    fn build_request_needs_some_start_year() {
        let err = build_request(ScenarioArgs::default(), None).expect_err("no start year");
        assert!(err.contains("--start-year"));
    }
}
