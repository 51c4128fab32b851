//! Runtime configuration from environment variables

use std::env;

/// Default IQR multiplier for the outlier fences (Tukey's 1.5)
pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 1.5;

/// Default minimum number of valid postings a group needs
pub const DEFAULT_MIN_POSTINGS: i64 = 5;

/// Configuration shared by the binaries
///
/// Loaded from environment variables (and `.env` via dotenv) with defaults.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `.sql` schema files
    pub schema_dir: String,

    /// k in `[Q1 - k*IQR, Q3 + k*IQR]`
    pub outlier_multiplier: f64,
}

impl StatsConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HIRESTATS_DB_PATH` (default: data/hirestats.db)
    /// - `HIRESTATS_SCHEMA_DIR` (default: sql)
    /// - `OUTLIER_IQR_MULTIPLIER` (default: 1.5)
    ///
    /// A set but unparseable multiplier becomes NaN so that
    /// `StatisticsParams::new` rejects it instead of silently using 1.5.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("HIRESTATS_DB_PATH")
                .unwrap_or_else(|_| "data/hirestats.db".to_string()),

            schema_dir: env::var("HIRESTATS_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            outlier_multiplier: env::var("OUTLIER_IQR_MULTIPLIER")
                .ok()
                .map(|s| parse_multiplier(&s))
                .unwrap_or(DEFAULT_OUTLIER_MULTIPLIER),
        }
    }
}

fn parse_multiplier(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or_else(|_| {
        log::warn!("⚠️  OUTLIER_IQR_MULTIPLIER={:?} is not a number", raw);
        f64::NAN
    })
}
