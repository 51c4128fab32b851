//! Compute Statistics - batch job
//!
//! Recomputes the days-to-hire snapshot (country and global rows) in one
//! transaction and exits. Exit code is 64 for invalid input (threshold or
//! outlier multiplier), 1 for any other failure.
//!
//! Usage:
//!   cargo run --release --bin compute_statistics -- --min-postings 5
//!
//! Environment variables:
//!   HIRESTATS_DB_PATH - SQLite database path (default: data/hirestats.db)
//!   HIRESTATS_SCHEMA_DIR - Schema directory (default: sql)
//!   MIN_POSTINGS - Threshold when --min-postings is not given (default: 5)
//!   OUTLIER_IQR_MULTIPLIER - IQR fence multiplier (default: 1.5)

use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use hirestats::config::{StatsConfig, DEFAULT_MIN_POSTINGS};
use hirestats::statistics::{
    run_schema_migrations, MinPostings, SqliteSnapshotStore, StatisticsEngine, StatisticsError,
    StatisticsParams,
};
use rusqlite::Connection;
use std::process::ExitCode;
use std::sync::Arc;

/// sysexits EX_USAGE
const EXIT_USAGE: u8 = 64;

#[derive(Parser, Debug)]
#[command(name = "compute_statistics", about = "Recompute days-to-hire statistics")]
struct Args {
    /// Minimum number of valid postings a group needs to be materialized
    #[arg(
        long,
        env = "MIN_POSTINGS",
        default_value_t = DEFAULT_MIN_POSTINGS,
        allow_negative_numbers = true
    )]
    min_postings: i64,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_input_error() => {
            error!("❌ Invalid input: {}", e);
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            error!("❌ Statistics computation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), StatisticsError> {
    let config = StatsConfig::from_env();

    // Reject bad input before touching the database
    StatisticsParams::new(MinPostings::new(args.min_postings)?, config.outlier_multiplier)?;

    info!("🚀 Days-to-hire statistics");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Min postings: {}", args.min_postings);
    info!("   └─ Outlier multiplier: {}", config.outlier_multiplier);

    let store = SqliteSnapshotStore::open(&config.db_path)?;

    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    drop(conn);

    let engine = StatisticsEngine::new(Arc::new(store), config.outlier_multiplier);
    let summary = engine.compute_statistics(args.min_postings).await?;

    if summary.excluded_measures > 0 {
        info!(
            "   {} postings had unusable days_to_hire values and were skipped",
            summary.excluded_measures
        );
    }

    Ok(())
}
