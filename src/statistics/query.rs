//! Set-based statistics query
//!
//! Builds the single SQL statement that computes every statistic of one
//! scope inside SQLite. The application only receives one row per eligible
//! group; no posting row ever leaves the store.
//!
//! ## Query shape
//!
//! ```text
//! job_posting
//!     ↓ sample            valid measures only (numeric, >= 0)
//!     ↓ ranked            ROW_NUMBER / COUNT windows per group
//!     ↓ eligible          n >= :min_postings
//!     ↓ raw_stats         COUNT, AVG, MIN, MAX, interpolated percentiles
//!     ↓ raw_spread        Σ(v - mean)²
//!     ↓ trimmed           v within [p25 - k·IQR, p75 + k·IQR]
//!     ↓ trimmed_ranked / trimmed_stats / trimmed_spread
//!     ↓ final SELECT      raw_* , fences, trimmed_* (LEFT JOIN, may be NULL)
//! ```
//!
//! ## Percentile rule
//!
//! Linear interpolation between closest ranks (same as PostgreSQL
//! `percentile_cont`): with 0-based rank `rn`, group size `n` and
//! `h = p·(n−1)`, the result is `x[⌊h⌋] + f·(x[⌊h⌋ + 1] − x[⌊h⌋])` where
//! `f = h − ⌊h⌋`. `CAST(h AS INTEGER)` is the floor because `h >= 0`.

use super::types::{Distribution, GroupKey, GroupScope, OutlierFences};
use rusqlite::Row;

/// Percentile rank and the column alias it is computed into
#[derive(Debug, Clone, Copy)]
pub struct PercentileColumn {
    pub rank: f64,
    pub name: &'static str,
}

/// Percentiles stored per snapshot, ascending by rank
pub const PERCENTILE_COLUMNS: [PercentileColumn; 6] = [
    PercentileColumn { rank: 0.10, name: "p10" },
    PercentileColumn { rank: 0.25, name: "p25" },
    PercentileColumn { rank: 0.50, name: "p50" },
    PercentileColumn { rank: 0.75, name: "p75" },
    PercentileColumn { rank: 0.90, name: "p90" },
    PercentileColumn { rank: 0.95, name: "p95" },
];

/// Per-group aggregate columns produced by `distribution_select`
const STAT_COLUMNS: [&str; 4] = ["sample_count", "mean", "lowest", "highest"];

/// Predicate on `days_to_hire` selecting usable measures.
///
/// NULL (still open), text and negative values are all left out here, which
/// is how row-level anomalies are excluded without aborting the run.
pub const VALID_MEASURE: &str = "days_to_hire IS NOT NULL \
     AND typeof(days_to_hire) IN ('integer', 'real') \
     AND days_to_hire >= 0";

/// Count of non-null measures that `VALID_MEASURE` rejects
pub const EXCLUDED_MEASURES_SQL: &str = "SELECT COUNT(*) FROM job_posting \
     WHERE days_to_hire IS NOT NULL \
       AND NOT (typeof(days_to_hire) IN ('integer', 'real') AND days_to_hire >= 0)";

/// `x[lo] + f·(x[hi] − x[lo])`; never leaves `[x[lo], x[hi]]`, so equal
/// neighbours give the value itself and ranks stay ordered.
fn percentile_expr(rank: f64) -> String {
    let pos = format!("({rank:.2} * (n - 1))");
    let lo = format!("CAST({pos} AS INTEGER)");
    let x_lo = format!("MAX(CASE WHEN rn = {lo} THEN v END)");
    let x_hi = format!("COALESCE(MAX(CASE WHEN rn = {lo} + 1 THEN v END), {x_lo})");
    format!("({x_lo} + MAX({pos} - {lo}) * ({x_hi} - {x_lo}))")
}

fn sample_select(scope: GroupScope) -> String {
    let (country, filter) = match scope {
        GroupScope::Country => ("country_code", "AND country_code IS NOT NULL"),
        GroupScope::Global => ("NULL", ""),
    };
    format!(
        "SELECT standard_job_id, {country} AS country_code, CAST(days_to_hire AS REAL) AS v \
         FROM job_posting \
         WHERE {VALID_MEASURE} {filter}"
    )
}

fn ranked_select(source: &str) -> String {
    format!(
        "SELECT standard_job_id, country_code, v, \
         ROW_NUMBER() OVER (PARTITION BY standard_job_id, country_code ORDER BY v) - 1 AS rn, \
         COUNT(*) OVER (PARTITION BY standard_job_id, country_code) AS n \
         FROM {source}"
    )
}

fn distribution_select(source: &str) -> String {
    let mut columns = vec![
        "standard_job_id".to_string(),
        "country_code".to_string(),
        "COUNT(*) AS sample_count".to_string(),
        "AVG(v) AS mean".to_string(),
        "MIN(v) AS lowest".to_string(),
        "MAX(v) AS highest".to_string(),
    ];
    for p in PERCENTILE_COLUMNS {
        columns.push(format!("{} AS {}", percentile_expr(p.rank), p.name));
    }
    format!(
        "SELECT {} FROM {source} GROUP BY standard_job_id, country_code",
        columns.join(", ")
    )
}

fn spread_select(source: &str, stats: &str) -> String {
    format!(
        "SELECT x.standard_job_id, x.country_code, \
         SUM((x.v - s.mean) * (x.v - s.mean)) AS sum_sq_dev \
         FROM {source} x JOIN {stats} s \
           ON x.standard_job_id = s.standard_job_id AND x.country_code IS s.country_code \
         GROUP BY x.standard_job_id, x.country_code"
    )
}

fn projected_columns(stats: &str, spread: &str, prefix: &str) -> Vec<String> {
    let mut columns: Vec<String> = STAT_COLUMNS
        .iter()
        .map(|c| format!("{stats}.{c} AS {prefix}_{c}"))
        .collect();
    for p in PERCENTILE_COLUMNS {
        columns.push(format!("{stats}.{name} AS {prefix}_{name}", name = p.name));
    }
    columns.push(format!("{spread}.sum_sq_dev AS {prefix}_sum_sq_dev"));
    columns
}

const LOWER_FENCE: &str = "s.p25 - :k * (s.p75 - s.p25)";
const UPPER_FENCE: &str = "s.p75 + :k * (s.p75 - s.p25)";

/// Full statistics query for one scope.
///
/// Named parameters: `:min_postings` (integer) and `:k` (outlier multiplier).
/// Rows are ordered by group key so repeated runs produce identical output.
pub fn statistics_sql(scope: GroupScope) -> String {
    let join = |a: &str, b: &str| {
        format!(
            "{a}.standard_job_id = {b}.standard_job_id AND {a}.country_code IS {b}.country_code"
        )
    };

    let mut select = vec![
        "s.standard_job_id AS standard_job_id".to_string(),
        "s.country_code AS country_code".to_string(),
    ];
    select.extend(projected_columns("s", "rs", "raw"));
    select.push(format!("{LOWER_FENCE} AS lower_fence"));
    select.push(format!("{UPPER_FENCE} AS upper_fence"));
    select.extend(projected_columns("t", "ts", "trimmed"));

    format!(
        "WITH sample AS ({sample}), \
         ranked AS ({ranked}), \
         eligible AS (SELECT * FROM ranked WHERE n >= :min_postings), \
         raw_stats AS ({raw_stats}), \
         raw_spread AS ({raw_spread}), \
         trimmed AS ( \
             SELECT e.standard_job_id, e.country_code, e.v \
             FROM eligible e JOIN raw_stats s ON {join_es} \
             WHERE e.v >= {LOWER_FENCE} AND e.v <= {UPPER_FENCE}), \
         trimmed_ranked AS ({trimmed_ranked}), \
         trimmed_stats AS ({trimmed_stats}), \
         trimmed_spread AS ({trimmed_spread}) \
         SELECT {select} \
         FROM raw_stats s \
         JOIN raw_spread rs ON {join_rs} \
         LEFT JOIN trimmed_stats t ON {join_t} \
         LEFT JOIN trimmed_spread ts ON {join_ts} \
         ORDER BY s.standard_job_id, s.country_code",
        sample = sample_select(scope),
        ranked = ranked_select("sample"),
        raw_stats = distribution_select("eligible"),
        raw_spread = spread_select("eligible", "raw_stats"),
        join_es = join("e", "s"),
        trimmed_ranked = ranked_select("trimmed"),
        trimmed_stats = distribution_select("trimmed_ranked"),
        trimmed_spread = spread_select("trimmed_ranked", "trimmed_stats"),
        select = select.join(", "),
        join_rs = join("rs", "s"),
        join_t = join("t", "s"),
        join_ts = join("ts", "s"),
    )
}

/// Sample standard deviation from the sum of squared deviations
pub fn sample_stddev(sum_sq_dev: f64, count: i64) -> f64 {
    if count > 1 {
        (sum_sq_dev.max(0.0) / (count - 1) as f64).sqrt()
    } else {
        0.0
    }
}

/// Read the `{prefix}_*` columns of a result row.
///
/// Returns None when the LEFT JOIN produced no trimmed sample.
fn distribution_from_row(row: &Row<'_>, prefix: &str) -> rusqlite::Result<Option<Distribution>> {
    let col = |name: &str| format!("{prefix}_{name}");

    let sample_count: Option<i64> = row.get(col("sample_count").as_str())?;
    let Some(sample_count) = sample_count else {
        return Ok(None);
    };
    let sum_sq_dev: f64 = row.get(col("sum_sq_dev").as_str())?;

    Ok(Some(Distribution {
        sample_count,
        mean: row.get(col("mean").as_str())?,
        stddev: sample_stddev(sum_sq_dev, sample_count),
        lowest: row.get(col("lowest").as_str())?,
        highest: row.get(col("highest").as_str())?,
        p10: row.get(col("p10").as_str())?,
        p25: row.get(col("p25").as_str())?,
        p50: row.get(col("p50").as_str())?,
        p75: row.get(col("p75").as_str())?,
        p90: row.get(col("p90").as_str())?,
        p95: row.get(col("p95").as_str())?,
    }))
}

/// One computed group, before it is stamped with a run id
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatistics {
    pub key: GroupKey,
    pub raw: Distribution,
    pub fences: OutlierFences,
    pub trimmed: Option<Distribution>,
}

impl GroupStatistics {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let Some(raw) = distribution_from_row(row, "raw")? else {
            return Err(rusqlite::Error::InvalidColumnType(
                row.as_ref().column_index("raw_sample_count")?,
                "raw_sample_count".to_string(),
                rusqlite::types::Type::Null,
            ));
        };

        Ok(Self {
            key: GroupKey {
                standard_job_id: row.get("standard_job_id")?,
                country_code: row.get("country_code")?,
            },
            raw,
            fences: OutlierFences {
                lower: row.get("lower_fence")?,
                upper: row.get("upper_fence")?,
            },
            trimmed: distribution_from_row(row, "trimmed")?,
        })
    }
}
