//! # Days-to-Hire Statistics
//!
//! Batch computation of time-to-hire statistics per job and per country,
//! materialized into a snapshot table that API-style lookups read directly.
//!
//! ## Architecture
//!
//! ```text
//! JSONL → ingestion → job_posting
//!                          ↓
//!        StatisticsEngine::compute_statistics(min_postings)
//!                          ↓ SnapshotStore::replace_snapshot (one transaction)
//!                          ↓   ├─ country scope (job, country)
//!                          ↓   └─ global scope (job)
//!              days_to_hire_statistics + statistics_runs
//!                          ↓
//!                   SnapshotReader (read-only lookups)
//! ```
//!
//! Percentiles use linear interpolation between closest ranks. Outliers are
//! values outside `[Q1 - k*IQR, Q3 + k*IQR]` (k = 1.5 by default). A group is
//! materialized only if its valid sample reaches `min_postings`.
//!
//! ## Schema Reference
//!
//! All types match SQL schema in `/sql/`:
//! - `job_posting` → `Posting`
//! - `days_to_hire_statistics` → `StatisticsSnapshot`
//! - `statistics_runs` → `RunSummary`
//!
//! ## Module Organization
//!
//! - `types` - Core data structures and validated parameters
//! - `error` - `StatisticsError`
//! - `query` - SQL generation for one aggregation scope
//! - `db` - Schema migrations and the `SnapshotStore` trait
//! - `engine` - Run orchestration
//! - `reader` - Read-only snapshot lookups
//! - `ingestion` - JSONL posting loader

pub mod types;
pub mod error;
pub mod query;
pub mod db;
pub mod engine;
pub mod reader;
pub mod ingestion;

// Re-export commonly used types
pub use types::{
    Distribution, GroupKey, GroupScope, MinPostings, OutlierFences, Posting, RunSummary,
    StatisticsParams, StatisticsSnapshot,
};
pub use error::StatisticsError;
pub use db::{run_schema_migrations, SnapshotStore, SqliteSnapshotStore};
pub use engine::StatisticsEngine;
pub use reader::{SnapshotReader, StatisticsSummary};
pub use ingestion::{load_postings_jsonl, IngestionReport, PostingAnomaly, SqlitePostingWriter};
