//! Load Postings - JSONL importer
//!
//! Reads one JSON posting per line into `job_posting`. Malformed rows are
//! reported and skipped; I/O or database failures abort with a non-zero exit.
//!
//! Usage:
//!   cargo run --release --bin load_postings -- --input postings.jsonl
//!
//! Environment variables:
//!   HIRESTATS_DB_PATH - SQLite database path (default: data/hirestats.db)
//!   HIRESTATS_SCHEMA_DIR - Schema directory (default: sql)

use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use hirestats::config::StatsConfig;
use hirestats::statistics::{
    load_postings_jsonl, run_schema_migrations, SqlitePostingWriter, StatisticsError,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "load_postings", about = "Load job postings from a JSONL file")]
struct Args {
    /// JSONL file, one posting object per line
    #[arg(short, long)]
    input: PathBuf,

    /// Rows per insert transaction
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Loading postings failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), StatisticsError> {
    let config = StatsConfig::from_env();
    info!("🔧 Database: {}", config.db_path);

    let mut writer = SqlitePostingWriter::open(&config.db_path)?.with_batch_size(args.batch_size);

    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    drop(conn);

    let report = load_postings_jsonl(&args.input, &mut writer)?;

    info!("   ├─ Lines read: {}", report.lines_read);
    info!("   ├─ Postings written: {}", report.postings_written);
    info!("   ├─ Rows skipped: {}", report.rows_skipped);
    info!("   └─ Measures set to NULL: {}", report.measures_nulled);

    Ok(())
}
