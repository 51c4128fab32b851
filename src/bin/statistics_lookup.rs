//! Statistics Lookup - read side of the snapshot
//!
//! Prints JSON to stdout. Exits with code 2 when the requested group has no
//! statistics (fewer than `min_postings` valid postings at the last run) and
//! 64 for a blank job id.
//!
//! Usage:
//!   cargo run --bin statistics_lookup -- --standard-job-id <id> [--country-code US]
//!   cargo run --bin statistics_lookup -- --list-jobs
//!   cargo run --bin statistics_lookup -- --list-countries <id>

use clap::Parser;
use dotenv::dotenv;
use log::error;
use hirestats::config::StatsConfig;
use hirestats::statistics::{SnapshotReader, StatisticsError, StatisticsSummary};
use serde::Serialize;
use std::process::ExitCode;

const EXIT_NOT_FOUND: u8 = 2;
/// sysexits EX_USAGE
const EXIT_USAGE: u8 = 64;

#[derive(Parser, Debug)]
#[command(name = "statistics_lookup", about = "Look up days-to-hire statistics")]
struct Args {
    /// Standard job id to look up
    #[arg(long, required_unless_present_any = ["list_jobs", "list_countries"])]
    standard_job_id: Option<String>,

    /// Country code; omit for the global statistics of the job
    #[arg(long, requires = "standard_job_id")]
    country_code: Option<String>,

    /// Print the full snapshot row instead of the summary
    #[arg(long, requires = "standard_job_id")]
    detailed: bool,

    /// List job ids that have statistics
    #[arg(long, conflicts_with_all = ["standard_job_id", "list_countries"])]
    list_jobs: bool,

    /// List countries with statistics for a job id
    #[arg(long, value_name = "STANDARD_JOB_ID", conflicts_with = "standard_job_id")]
    list_countries: Option<String>,
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(StatisticsError::NotFound(key)) => {
            error!("No statistics found for {}", key);
            ExitCode::from(EXIT_NOT_FOUND)
        }
        Err(e) if e.is_input_error() => {
            error!("❌ Invalid lookup: {}", e);
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            error!("❌ Lookup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), StatisticsError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StatisticsError::Io(std::io::Error::other(e)))?;
    println!("{}", json);
    Ok(())
}

fn run(args: Args) -> Result<(), StatisticsError> {
    let config = StatsConfig::from_env();
    let reader = SnapshotReader::open(&config.db_path)?;

    if args.list_jobs {
        return print_json(&reader.available_jobs()?);
    }

    if let Some(job) = args.list_countries.as_deref() {
        return print_json(&reader.available_countries(job)?);
    }

    let job = args.standard_job_id.as_deref().unwrap_or_default();
    let snapshot = reader.get_statistics(job, args.country_code.as_deref())?;

    if args.detailed {
        print_json(&snapshot)
    } else {
        print_json(&StatisticsSummary::from(&snapshot))
    }
}
