//! Read side over the materialized snapshot
//!
//! Pure key lookups against `days_to_hire_statistics`; nothing is ever
//! recomputed here. A group that never reached the threshold has no row and
//! is reported as `NotFound`, never as a zero-filled statistic.

use super::error::StatisticsError;
use super::types::{Distribution, GroupKey, OutlierFences, RunSummary, StatisticsSnapshot};
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

const SNAPSHOT_COLUMNS: &str = "run_id, standard_job_id, country_code, computed_at, \
     job_postings_number, mean_days, stddev_days, lowest_days, highest_days, \
     p10_days, p25_days, p50_days, p75_days, p90_days, p95_days, \
     lower_fence_days, upper_fence_days, \
     trimmed_postings_number, trimmed_mean_days, trimmed_stddev_days, \
     trimmed_lowest_days, trimmed_highest_days, \
     trimmed_p10_days, trimmed_p25_days, trimmed_p50_days, \
     trimmed_p75_days, trimmed_p90_days, trimmed_p95_days, \
     trimmed_below_threshold";

/// Compact response shape for API consumers
///
/// `min_days`/`max_days` are the 10th/90th percentiles of the full sample so
/// a single extreme posting does not dominate; `avg_days` is the mean after
/// outlier removal (the raw mean if nothing survived the fences).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub standard_job_id: String,
    pub country_code: Option<String>,
    pub min_days: f64,
    pub avg_days: f64,
    pub max_days: f64,
    pub job_postings_number: i64,
}

impl From<&StatisticsSnapshot> for StatisticsSummary {
    fn from(snapshot: &StatisticsSnapshot) -> Self {
        Self {
            standard_job_id: snapshot.key.standard_job_id.clone(),
            country_code: snapshot.key.country_code.clone(),
            min_days: snapshot.raw.p10,
            avg_days: snapshot
                .trimmed
                .as_ref()
                .map(|d| d.mean)
                .unwrap_or(snapshot.raw.mean),
            max_days: snapshot.raw.p90,
            job_postings_number: snapshot.raw.sample_count,
        }
    }
}

/// Read-only snapshot reader
pub struct SnapshotReader {
    conn: Connection,
}

impl SnapshotReader {
    /// Open an existing database read-only
    ///
    /// Fails with `StoreUnavailable` if the file does not exist; the reader
    /// never creates a database.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StatisticsError> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        apply_optimized_pragmas(&conn)?;

        // Read-only from here on (must be after PRAGMAs)
        conn.execute("PRAGMA query_only = ON", [])?;

        Ok(Self { conn })
    }

    /// Snapshot row for one group
    ///
    /// `country_code = None` selects the global row of the job. A blank job
    /// id is `InvalidGroupKey`; a missing row is `NotFound`.
    pub fn get_statistics(
        &self,
        standard_job_id: &str,
        country_code: Option<&str>,
    ) -> Result<StatisticsSnapshot, StatisticsError> {
        let standard_job_id = standard_job_id.trim();
        if standard_job_id.is_empty() {
            return Err(StatisticsError::InvalidGroupKey(
                "standard_job_id is required and cannot be empty".to_string(),
            ));
        }
        let country_code = country_code.map(str::trim).filter(|c| !c.is_empty());

        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM days_to_hire_statistics \
             WHERE standard_job_id = ?1 AND country_code IS ?2"
        );

        self.conn
            .query_row(&sql, params![standard_job_id, country_code], snapshot_from_row)
            .optional()?
            .ok_or_else(|| StatisticsError::NotFound(GroupKey::new(standard_job_id, country_code)))
    }

    /// Distinct job ids that have statistics, sorted
    pub fn available_jobs(&self) -> Result<Vec<String>, StatisticsError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT standard_job_id FROM days_to_hire_statistics ORDER BY standard_job_id",
        )?;
        let jobs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(jobs)
    }

    /// Countries with country-specific statistics for a job, sorted
    pub fn available_countries(&self, standard_job_id: &str) -> Result<Vec<String>, StatisticsError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT country_code FROM days_to_hire_statistics
             WHERE standard_job_id = ?1 AND country_code IS NOT NULL
             ORDER BY country_code",
        )?;
        let countries = stmt
            .query_map([standard_job_id.trim()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(countries)
    }

    /// Most recent successful run, if any
    pub fn latest_run(&self) -> Result<Option<RunSummary>, StatisticsError> {
        let run = self
            .conn
            .query_row(
                "SELECT id, computed_at, min_postings, outlier_multiplier,
                        country_groups, global_groups, excluded_measures
                 FROM statistics_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunSummary {
                        run_id: row.get(0)?,
                        computed_at: row.get(1)?,
                        min_postings: row.get(2)?,
                        outlier_multiplier: row.get(3)?,
                        country_groups: row.get::<_, i64>(4)? as usize,
                        global_groups: row.get::<_, i64>(5)? as usize,
                        excluded_measures: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<StatisticsSnapshot> {
    let raw = Distribution {
        sample_count: row.get("job_postings_number")?,
        mean: row.get("mean_days")?,
        stddev: row.get("stddev_days")?,
        lowest: row.get("lowest_days")?,
        highest: row.get("highest_days")?,
        p10: row.get("p10_days")?,
        p25: row.get("p25_days")?,
        p50: row.get("p50_days")?,
        p75: row.get("p75_days")?,
        p90: row.get("p90_days")?,
        p95: row.get("p95_days")?,
    };

    let trimmed_count: i64 = row.get("trimmed_postings_number")?;
    let trimmed_mean: Option<f64> = row.get("trimmed_mean_days")?;
    let trimmed = match trimmed_mean {
        Some(mean) if trimmed_count > 0 => Some(Distribution {
            sample_count: trimmed_count,
            mean,
            stddev: row.get("trimmed_stddev_days")?,
            lowest: row.get("trimmed_lowest_days")?,
            highest: row.get("trimmed_highest_days")?,
            p10: row.get("trimmed_p10_days")?,
            p25: row.get("trimmed_p25_days")?,
            p50: row.get("trimmed_p50_days")?,
            p75: row.get("trimmed_p75_days")?,
            p90: row.get("trimmed_p90_days")?,
            p95: row.get("trimmed_p95_days")?,
        }),
        _ => None,
    };

    Ok(StatisticsSnapshot {
        key: GroupKey {
            standard_job_id: row.get("standard_job_id")?,
            country_code: row.get("country_code")?,
        },
        run_id: row.get("run_id")?,
        computed_at: row.get("computed_at")?,
        raw,
        fences: OutlierFences {
            lower: row.get("lower_fence_days")?,
            upper: row.get("upper_fence_days")?,
        },
        trimmed,
        trimmed_below_threshold: row.get("trimmed_below_threshold")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::db::run_schema_migrations;
    use tempfile::tempdir;

    fn setup_test_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let mut conn = Connection::open(&db_path).unwrap();
        run_schema_migrations(&mut conn, concat!(env!("CARGO_MANIFEST_DIR"), "/sql")).unwrap();

        for (job, country) in [("job1", Some("US")), ("job1", Some("DE")), ("job1", None), ("job2", None)] {
            conn.execute(
                "INSERT INTO days_to_hire_statistics (
                    run_id, standard_job_id, country_code, job_postings_number,
                    mean_days, stddev_days, lowest_days, highest_days,
                    p10_days, p25_days, p50_days, p75_days, p90_days, p95_days,
                    lower_fence_days, upper_fence_days,
                    trimmed_postings_number, trimmed_mean_days, trimmed_stddev_days,
                    trimmed_lowest_days, trimmed_highest_days,
                    trimmed_p10_days, trimmed_p25_days, trimmed_p50_days,
                    trimmed_p75_days, trimmed_p90_days, trimmed_p95_days,
                    trimmed_below_threshold, computed_at
                ) VALUES (1, ?1, ?2, 5, 50.8, 84.3, 10, 200, 10.4, 11, 12, 13, 125.2, 162.6,
                          8, 16, 4, 11.5, 1.29, 10, 13, 10.3, 10.75, 11.5, 12.25, 12.7, 12.85,
                          1, 1700000000)",
                params![job, country],
            )
            .unwrap();
        }

        (dir, db_path)
    }

    #[test]
    fn test_get_country_and_global_rows() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        let us = reader.get_statistics("job1", Some("US")).unwrap();
        assert_eq!(us.key, GroupKey::new("job1", Some("US")));
        assert_eq!(us.raw.sample_count, 5);
        assert_eq!(us.trimmed_count(), 4);
        assert!(us.trimmed_below_threshold);

        let global = reader.get_statistics("job1", None).unwrap();
        assert_eq!(global.key, GroupKey::global("job1"));
    }

    #[test]
    fn test_missing_group_is_not_found() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        let err = reader.get_statistics("job2", Some("US")).unwrap_err();
        assert!(matches!(err, StatisticsError::NotFound(ref key) if key.country_code.as_deref() == Some("US")));

        let err = reader.get_statistics("unknown", None).unwrap_err();
        assert!(matches!(err, StatisticsError::NotFound(_)));
    }

    #[test]
    fn test_blank_job_id_rejected() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        assert!(matches!(
            reader.get_statistics("   ", None),
            Err(StatisticsError::InvalidGroupKey(_))
        ));
    }

    #[test]
    fn test_blank_country_means_global() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        let row = reader.get_statistics("job2", Some("")).unwrap();
        assert_eq!(row.key.country_code, None);
    }

    #[test]
    fn test_available_jobs_and_countries() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        assert_eq!(reader.available_jobs().unwrap(), vec!["job1", "job2"]);
        assert_eq!(reader.available_countries("job1").unwrap(), vec!["DE", "US"]);
        assert!(reader.available_countries("job2").unwrap().is_empty());
    }

    #[test]
    fn test_summary_shape() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        let snapshot = reader.get_statistics("job1", Some("DE")).unwrap();
        let summary = StatisticsSummary::from(&snapshot);

        assert_eq!(summary.min_days, 10.4);
        assert_eq!(summary.avg_days, 11.5);
        assert_eq!(summary.max_days, 125.2);
        assert_eq!(summary.job_postings_number, 5);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["country_code"], "DE");
    }

    #[test]
    fn test_latest_run_empty() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();
        assert!(reader.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_read_only_mode() {
        let (_dir, db_path) = setup_test_db();
        let reader = SnapshotReader::open(&db_path).unwrap();

        let result = reader.conn.execute("DELETE FROM days_to_hire_statistics", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_database_not_created() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("missing.db");

        let result = SnapshotReader::open(&db_path);
        assert!(matches!(result, Err(StatisticsError::StoreUnavailable(_))));
        assert!(!db_path.exists());
    }
}
