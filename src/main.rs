use std::process::ExitCode;
use std::sync::Arc;

use apt_compare::config::{Cli, Command, CompareArgs, ServeArgs, build_request};
use apt_compare::core::{Assumptions, compare};
use apt_compare::data::{ReferenceData, load_reference_data};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load(data_dir: &std::path::Path) -> Option<ReferenceData> {
    match load_reference_data(data_dir) {
        Ok(reference) => {
            match reference.available_years().as_slice() {
                [first, .., last] => {
                    tracing::info!(first_year = first, last_year = last, "available start years")
                }
                [only] => tracing::info!(first_year = only, "single available start year"),
                [] => tracing::warn!("no start year has complete data"),
            }
            Some(reference)
        }
        Err(e) => {
            tracing::error!("failed to load reference data: {e}");
            None
        }
    }
}

async fn serve(args: ServeArgs) -> ExitCode {
    let Some(reference) = load(&args.data.data_dir) else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = apt_compare::api::run_http_server(args.port, Arc::new(reference)).await {
        tracing::error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_compare(args: CompareArgs) -> ExitCode {
    let Some(reference) = load(&args.data.data_dir) else {
        return ExitCode::FAILURE;
    };
    let request = match build_request(args.scenario, reference.default_start_year()) {
        Ok(request) => request,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let comparison = match compare(&reference, &request, &Assumptions::default()) {
        Ok(comparison) => comparison,
        Err(e) if e.is_recoverable() => {
            tracing::warn!("scenario rejected: {e}");
            eprintln!("{e}");
            return ExitCode::from(2);
        }
        Err(e) => {
            tracing::error!("comparison failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&comparison) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("failed to serialize comparison: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Compare(args) => run_compare(args),
    }
}
