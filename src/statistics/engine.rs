//! Statistics Engine - orchestration of one batch run
//!
//! ```text
//! compute_statistics(min_postings)
//!     ↓ validate threshold (no store access on failure)
//!     ↓ SnapshotStore::replace_snapshot()
//!     ↓ RunSummary
//! ```
//!
//! The engine itself holds no posting data. All computation happens in the
//! store; the engine validates input, stamps the run time and logs.

use super::db::SnapshotStore;
use super::error::StatisticsError;
use super::types::{MinPostings, RunSummary, StatisticsParams};
use std::sync::Arc;
use std::time::Instant;

pub struct StatisticsEngine {
    store: Arc<dyn SnapshotStore>,

    /// k in `[Q1 - k*IQR, Q3 + k*IQR]`
    outlier_multiplier: f64,

    /// Timestamp function (for testing with mock time)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl StatisticsEngine {
    /// Create an engine stamping runs with `chrono::Utc::now()`
    pub fn new(store: Arc<dyn SnapshotStore>, outlier_multiplier: f64) -> Self {
        Self::new_with_timestamp_fn(
            store,
            outlier_multiplier,
            Box::new(|| chrono::Utc::now().timestamp()),
        )
    }

    /// Create an engine with a custom timestamp function
    ///
    /// Used for testing with deterministic timestamps.
    pub fn new_with_timestamp_fn(
        store: Arc<dyn SnapshotStore>,
        outlier_multiplier: f64,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            store,
            outlier_multiplier,
            now_fn,
        }
    }

    /// Recompute the statistics snapshot
    ///
    /// Rejects a threshold below 1 (and a bad outlier multiplier) before the
    /// store is touched. On success every group with at least `min_postings`
    /// valid measures has exactly one snapshot row per scope; on failure the
    /// previous snapshot is untouched.
    pub async fn compute_statistics(&self, min_postings: i64) -> Result<RunSummary, StatisticsError> {
        let params = StatisticsParams::new(MinPostings::new(min_postings)?, self.outlier_multiplier)?;

        log::info!(
            "📊 Computing days-to-hire statistics (min_postings: {}, outlier k: {}, backend: {})",
            params.min_postings.get(),
            params.outlier_multiplier,
            self.store.backend_type()
        );

        let started = Instant::now();
        let computed_at = (self.now_fn)();

        let summary = self.store.replace_snapshot(&params, computed_at).await?;

        log::info!(
            "✅ Run {} completed in {:.2?}: {} snapshot rows",
            summary.run_id,
            started.elapsed(),
            summary.total_groups()
        );
        log::info!("   ├─ Country-specific statistics: {}", summary.country_groups);
        log::info!("   └─ Global statistics: {}", summary.global_groups);

        Ok(summary)
    }
}
