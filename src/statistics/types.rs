//! Core data structures for the statistics engine
//!
//! Field names follow the SQL schema in `/sql/`:
//! - `job_posting` → `Posting`
//! - `days_to_hire_statistics` → `StatisticsSnapshot`
//! - `statistics_runs` → `RunSummary`

use super::error::StatisticsError;
use crate::config::{DEFAULT_MIN_POSTINGS, DEFAULT_OUTLIER_MULTIPLIER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One job posting as stored in `job_posting`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub title: Option<String>,
    pub standard_job_id: String,
    pub country_code: Option<String>,
    /// None while the posting is still open
    pub days_to_hire: Option<i64>,
}

/// Aggregation scope of a snapshot row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupScope {
    /// One group per (standard_job_id, country_code)
    Country,
    /// One group per standard_job_id across all countries
    Global,
}

impl GroupScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupScope::Country => "country",
            GroupScope::Global => "global",
        }
    }
}

/// Key of one group: a role, optionally narrowed to a country
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub standard_job_id: String,
    /// None for the global row of the job
    pub country_code: Option<String>,
}

impl GroupKey {
    pub fn new(standard_job_id: impl Into<String>, country_code: Option<&str>) -> Self {
        Self {
            standard_job_id: standard_job_id.into(),
            country_code: country_code.map(str::to_string),
        }
    }

    pub fn global(standard_job_id: impl Into<String>) -> Self {
        Self::new(standard_job_id, None)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country_code {
            Some(country) => write!(f, "{}/{}", self.standard_job_id, country),
            None => write!(f, "{}/global", self.standard_job_id),
        }
    }
}

/// Minimum number of valid postings a group needs to get a snapshot row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinPostings(u32);

impl MinPostings {
    /// Validate a raw threshold; anything below 1 is `InvalidThreshold`
    pub fn new(value: i64) -> Result<Self, StatisticsError> {
        match u32::try_from(value) {
            Ok(v) if v >= 1 => Ok(Self(v)),
            _ => Err(StatisticsError::InvalidThreshold(value)),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MinPostings {
    fn default() -> Self {
        Self(DEFAULT_MIN_POSTINGS as u32)
    }
}

/// Validated inputs of one engine run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsParams {
    pub min_postings: MinPostings,
    pub outlier_multiplier: f64,
}

impl StatisticsParams {
    pub fn new(min_postings: MinPostings, outlier_multiplier: f64) -> Result<Self, StatisticsError> {
        if !outlier_multiplier.is_finite() || outlier_multiplier < 0.0 {
            return Err(StatisticsError::InvalidOutlierMultiplier(outlier_multiplier));
        }
        Ok(Self {
            min_postings,
            outlier_multiplier,
        })
    }
}

impl Default for StatisticsParams {
    fn default() -> Self {
        Self {
            min_postings: MinPostings::default(),
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
        }
    }
}

/// Statistics over one sample of days-to-hire values
///
/// Percentiles use linear interpolation between closest ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub sample_count: i64,
    pub mean: f64,
    /// Sample standard deviation (n - 1), 0.0 for a single value
    pub stddev: f64,
    pub lowest: f64,
    pub highest: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl Distribution {
    /// Percentiles in ascending rank order (p10..p95)
    pub fn percentiles(&self) -> [f64; 6] {
        [self.p10, self.p25, self.p50, self.p75, self.p90, self.p95]
    }
}

/// Inclusive outlier bounds `[Q1 - k*IQR, Q3 + k*IQR]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierFences {
    pub lower: f64,
    pub upper: f64,
}

/// One row of `days_to_hire_statistics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub key: GroupKey,
    pub run_id: i64,
    /// Unix seconds
    pub computed_at: i64,
    /// Full sample, before outlier removal
    pub raw: Distribution,
    pub fences: OutlierFences,
    /// Sample inside the fences; None when no value survived
    pub trimmed: Option<Distribution>,
    /// Outlier removal left fewer values than `min_postings`
    pub trimmed_below_threshold: bool,
}

impl StatisticsSnapshot {
    pub fn trimmed_count(&self) -> i64 {
        self.trimmed.as_ref().map(|d| d.sample_count).unwrap_or(0)
    }

    pub fn outliers_removed(&self) -> i64 {
        self.raw.sample_count - self.trimmed_count()
    }
}

/// Outcome of one run, persisted in `statistics_runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub computed_at: i64,
    pub min_postings: u32,
    pub outlier_multiplier: f64,
    pub country_groups: usize,
    pub global_groups: usize,
    /// Non-null measures skipped as anomalies (negative or non-numeric)
    pub excluded_measures: i64,
}

impl RunSummary {
    pub fn total_groups(&self) -> usize {
        self.country_groups + self.global_groups
    }
}
