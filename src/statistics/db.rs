//! Snapshot store: schema migrations and the all-or-nothing snapshot swap
//!
//! Tables written (see `/sql/` directory):
//! - `days_to_hire_statistics` - fully replaced on every run
//! - `statistics_runs` - INSERT (append-only run history)

use super::error::StatisticsError;
use super::query::{statistics_sql, GroupStatistics, EXCLUDED_MEASURES_SQL};
use super::types::{Distribution, GroupScope, RunSummary, StatisticsParams};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{named_params, params, Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir`, sorted by filename (00_, 01_, ...),
/// and executes them. Every file must use "IF NOT EXISTS" so reruns are no-ops.
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: impl AsRef<Path>,
) -> Result<(), StatisticsError> {
    let schema_path = schema_dir.as_ref();

    if !schema_path.is_dir() {
        return Err(StatisticsError::Migration(format!(
            "schema directory not found: {}",
            schema_path.display()
        )));
    }

    apply_optimized_pragmas(conn)?;

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_path.display());

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::debug!("   ├─ Executing: {}", filename);

        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ Schema migrations completed");

    Ok(())
}

/// Store that recomputes and swaps the statistics snapshot
///
/// Implementations must make the swap atomic for readers: either the whole
/// new snapshot becomes visible or the previous one stays in place.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Compute statistics for every eligible group and replace the snapshot
    async fn replace_snapshot(
        &self,
        params: &StatisticsParams,
        computed_at: i64,
    ) -> Result<RunSummary, StatisticsError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// SQLite implementation of SnapshotStore
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Open the store
    ///
    /// Creates the parent directory if needed. Does NOT create the schema;
    /// call `run_schema_migrations` first.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StatisticsError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run the statistics query of one scope inside the open transaction
    fn compute_scope(
        tx: &Transaction<'_>,
        scope: GroupScope,
        run_params: &StatisticsParams,
    ) -> Result<Vec<GroupStatistics>, StatisticsError> {
        let mut stmt = tx.prepare(&statistics_sql(scope))?;
        let groups = stmt
            .query_map(
                named_params! {
                    ":min_postings": run_params.min_postings.get(),
                    ":k": run_params.outlier_multiplier,
                },
                GroupStatistics::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        log::debug!("   ├─ {} scope: {} eligible groups", scope.as_str(), groups.len());

        Ok(groups)
    }

    fn insert_snapshot_row(
        tx: &Transaction<'_>,
        run_id: i64,
        computed_at: i64,
        group: &GroupStatistics,
        min_postings: u32,
    ) -> Result<(), StatisticsError> {
        let raw = &group.raw;
        let trimmed = group.trimmed.as_ref();
        let trimmed_count = trimmed.map(|d| d.sample_count).unwrap_or(0);
        let trimmed_field = |f: fn(&Distribution) -> f64| trimmed.map(f);
        let below_threshold = trimmed_count < i64::from(min_postings);

        tx.execute(
            r#"
            INSERT INTO days_to_hire_statistics (
                run_id, standard_job_id, country_code,
                job_postings_number, mean_days, stddev_days, lowest_days, highest_days,
                p10_days, p25_days, p50_days, p75_days, p90_days, p95_days,
                lower_fence_days, upper_fence_days,
                trimmed_postings_number, trimmed_mean_days, trimmed_stddev_days,
                trimmed_lowest_days, trimmed_highest_days,
                trimmed_p10_days, trimmed_p25_days, trimmed_p50_days,
                trimmed_p75_days, trimmed_p90_days, trimmed_p95_days,
                trimmed_below_threshold, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                run_id,
                group.key.standard_job_id,
                group.key.country_code,
                raw.sample_count,
                raw.mean,
                raw.stddev,
                raw.lowest,
                raw.highest,
                raw.p10,
                raw.p25,
                raw.p50,
                raw.p75,
                raw.p90,
                raw.p95,
                group.fences.lower,
                group.fences.upper,
                trimmed_count,
                trimmed_field(|d| d.mean),
                trimmed_field(|d| d.stddev),
                trimmed_field(|d| d.lowest),
                trimmed_field(|d| d.highest),
                trimmed_field(|d| d.p10),
                trimmed_field(|d| d.p25),
                trimmed_field(|d| d.p50),
                trimmed_field(|d| d.p75),
                trimmed_field(|d| d.p90),
                trimmed_field(|d| d.p95),
                below_threshold,
                computed_at,
            ],
        )?;

        if below_threshold {
            log::debug!(
                "   ├─ {}: {} of {} postings left after outlier removal (below threshold)",
                group.key,
                trimmed_count,
                raw.sample_count
            );
        }

        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    /// Compute and swap the snapshot in one IMMEDIATE transaction
    ///
    /// IMMEDIATE takes the write lock up front, so concurrent runs queue on
    /// the busy timeout and the later one wins. Any error drops the
    /// transaction, which rolls back and keeps the previous snapshot.
    async fn replace_snapshot(
        &self,
        run_params: &StatisticsParams,
        computed_at: i64,
    ) -> Result<RunSummary, StatisticsError> {
        let mut conn = self.conn.lock().map_err(|_| StatisticsError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let excluded_measures: i64 = tx.query_row(EXCLUDED_MEASURES_SQL, [], |row| row.get(0))?;
        if excluded_measures > 0 {
            log::warn!(
                "⚠️  Excluding {} anomalous days_to_hire values (negative or non-numeric)",
                excluded_measures
            );
        }

        let country_groups = Self::compute_scope(&tx, GroupScope::Country, run_params)?;
        let global_groups = Self::compute_scope(&tx, GroupScope::Global, run_params)?;

        tx.execute(
            r#"
            INSERT INTO statistics_runs (
                computed_at, min_postings, outlier_multiplier,
                country_groups, global_groups, excluded_measures
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                computed_at,
                run_params.min_postings.get(),
                run_params.outlier_multiplier,
                country_groups.len() as i64,
                global_groups.len() as i64,
                excluded_measures,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        let cleared = tx.execute("DELETE FROM days_to_hire_statistics", [])?;
        log::debug!("   ├─ Cleared {} previous snapshot rows", cleared);

        for group in country_groups.iter().chain(global_groups.iter()) {
            Self::insert_snapshot_row(&tx, run_id, computed_at, group, run_params.min_postings.get())?;
        }

        tx.commit()?;

        Ok(RunSummary {
            run_id,
            computed_at,
            min_postings: run_params.min_postings.get(),
            outlier_multiplier: run_params.outlier_multiplier,
            country_groups: country_groups.len(),
            global_groups: global_groups.len(),
            excluded_measures,
        })
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
