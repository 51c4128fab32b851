//! Property-based tests: SQL statistics against an in-memory reference.

use hirestats::statistics::{
    run_schema_migrations, Distribution, MinPostings, SnapshotReader, SnapshotStore,
    SqliteSnapshotStore, StatisticsError, StatisticsParams,
};
use proptest::prelude::*;
use rusqlite::{params, Connection};

const K: f64 = 1.5;
const TOLERANCE: f64 = 1e-6;

/// Linear interpolation between closest ranks over a sorted sample
fn reference_percentile(sorted: &[f64], p: f64) -> f64 {
    let h = p * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * (1.0 + b.abs())
}

/// In-memory statistics of one sample, sorted ascending
struct Reference {
    count: i64,
    mean: f64,
    stddev: f64,
    lowest: f64,
    highest: f64,
    percentiles: [f64; 6],
}

impl Reference {
    fn of(sorted: &[f64]) -> Self {
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let sum_sq_dev: f64 = sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
        let stddev = if sorted.len() > 1 {
            (sum_sq_dev / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            count: sorted.len() as i64,
            mean,
            stddev,
            lowest: sorted[0],
            highest: sorted[sorted.len() - 1],
            percentiles: [0.10, 0.25, 0.50, 0.75, 0.90, 0.95]
                .map(|p| reference_percentile(sorted, p)),
        }
    }

    fn check(&self, actual: &Distribution) -> Result<(), TestCaseError> {
        prop_assert_eq!(actual.sample_count, self.count);
        prop_assert!(close(actual.mean, self.mean), "mean {} != {}", actual.mean, self.mean);
        prop_assert!(close(actual.stddev, self.stddev), "stddev {} != {}", actual.stddev, self.stddev);
        prop_assert_eq!(actual.lowest, self.lowest);
        prop_assert_eq!(actual.highest, self.highest);
        for (got, want) in actual.percentiles().iter().zip(&self.percentiles) {
            prop_assert!(close(*got, *want), "percentile {} != {}", got, want);
        }
        Ok(())
    }
}

fn groups_strategy() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(0i64..400, 0..15), 1..5)
}

/// Load one country group per sample, run the store, return a reader
fn materialize(groups: &[Vec<i64>], min_postings: i64) -> (tempfile::TempDir, SnapshotReader) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("props.db");

    let mut conn = Connection::open(&db_path).expect("open db");
    run_schema_migrations(&mut conn, concat!(env!("CARGO_MANIFEST_DIR"), "/sql"))
        .expect("migrations");
    for (g, days) in groups.iter().enumerate() {
        for (i, d) in days.iter().enumerate() {
            conn.execute(
                "INSERT INTO job_posting (id, standard_job_id, country_code, days_to_hire)
                 VALUES (?1, ?2, 'US', ?3)",
                params![format!("{g}-{i}"), format!("job{g}"), d],
            )
            .expect("insert posting");
        }
    }
    drop(conn);

    let store = SqliteSnapshotStore::open(&db_path).expect("store");
    let run_params =
        StatisticsParams::new(MinPostings::new(min_postings).expect("threshold"), K).expect("params");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    runtime
        .block_on(store.replace_snapshot(&run_params, 1_700_000_000))
        .expect("replace snapshot");

    let reader = SnapshotReader::open(&db_path).expect("reader");
    (dir, reader)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn row_exists_iff_threshold_reached(groups in groups_strategy(), min_postings in 1i64..8) {
        let (_dir, reader) = materialize(&groups, min_postings);

        for (g, days) in groups.iter().enumerate() {
            let result = reader.get_statistics(&format!("job{g}"), Some("US"));
            if days.len() as i64 >= min_postings {
                let row = result.expect("eligible group missing");
                prop_assert_eq!(row.raw.sample_count, days.len() as i64);
            } else {
                prop_assert!(matches!(result, Err(StatisticsError::NotFound(_))));
            }
        }
    }

    #[test]
    fn statistics_match_reference(groups in groups_strategy()) {
        let (_dir, reader) = materialize(&groups, 1);

        for (g, days) in groups.iter().enumerate().filter(|(_, d)| !d.is_empty()) {
            let row = reader.get_statistics(&format!("job{g}"), Some("US")).expect("row");

            let mut sorted: Vec<f64> = days.iter().map(|&d| d as f64).collect();
            sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite"));

            let raw = Reference::of(&sorted);
            raw.check(&row.raw)?;

            let iqr = raw.percentiles[3] - raw.percentiles[1];
            let (lower, upper) = (raw.percentiles[1] - K * iqr, raw.percentiles[3] + K * iqr);
            let kept: Vec<f64> = sorted.iter().copied().filter(|&v| v >= lower && v <= upper).collect();

            prop_assert_eq!(row.trimmed_count(), kept.len() as i64);
            prop_assert!(row.trimmed_count() <= row.raw.sample_count);
            match &row.trimmed {
                Some(trimmed) => Reference::of(&kept).check(trimmed)?,
                None => {
                    prop_assert!(kept.is_empty());
                }
            }
        }
    }

    #[test]
    fn percentiles_are_ordered(groups in groups_strategy()) {
        let (_dir, reader) = materialize(&groups, 1);

        for (g, _) in groups.iter().enumerate().filter(|(_, d)| !d.is_empty()) {
            let row = reader.get_statistics(&format!("job{g}"), Some("US")).expect("row");

            for dist in std::iter::once(&row.raw).chain(row.trimmed.as_ref()) {
                let p = dist.percentiles();
                prop_assert!(dist.lowest <= p[0], "lowest {} > p10 {}", dist.lowest, p[0]);
                for pair in p.windows(2) {
                    prop_assert!(pair[0] <= pair[1], "percentiles not ordered: {:?}", p);
                }
                prop_assert!(p[5] <= dist.highest, "p95 {} > highest {}", p[5], dist.highest);
                prop_assert!(dist.stddev >= 0.0);
            }

            if let Some(trimmed) = &row.trimmed {
                prop_assert!(trimmed.lowest >= row.fences.lower);
                prop_assert!(trimmed.highest <= row.fences.upper);
            }
        }
    }

    #[test]
    fn constant_group_percentiles_equal_value(value in 0i64..400, count in 1usize..30) {
        let (_dir, reader) = materialize(&[vec![value; count]], 1);
        let row = reader.get_statistics("job0", Some("US")).expect("row");
        let v = value as f64;

        prop_assert_eq!(row.raw.percentiles(), [v; 6]);
        prop_assert_eq!(row.raw.lowest, v);
        prop_assert_eq!(row.raw.highest, v);
        prop_assert_eq!(row.raw.stddev, 0.0);
        prop_assert_eq!(row.trimmed_count(), count as i64);
    }
}
