use super::types::GroupKey;
use thiserror::Error;

/// Errors surfaced by the engine, the store and the read side.
///
/// Per-row data anomalies are not represented here: they are excluded from
/// the sample and counted, never propagated.
#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("invalid threshold {0}: min_postings must be a positive integer")]
    InvalidThreshold(i64),

    #[error("invalid outlier multiplier {0}: must be finite and non-negative")]
    InvalidOutlierMultiplier(f64),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    LockPoisoned,

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no statistics found for {0}")]
    NotFound(GroupKey),

    #[error("invalid group key: {0}")]
    InvalidGroupKey(String),
}

impl StatisticsError {
    /// True for errors caused by caller input rather than the store
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StatisticsError::InvalidThreshold(_)
                | StatisticsError::InvalidOutlierMultiplier(_)
                | StatisticsError::InvalidGroupKey(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StatisticsError::InvalidThreshold(0);
        assert_eq!(
            err.to_string(),
            "invalid threshold 0: min_postings must be a positive integer"
        );
        assert!(err.is_input_error());

        let err = StatisticsError::NotFound(GroupKey::new("job1", Some("US")));
        assert_eq!(err.to_string(), "no statistics found for job1/US");
        assert!(!err.is_input_error());

        assert!(StatisticsError::InvalidOutlierMultiplier(f64::NAN).is_input_error());
        assert!(StatisticsError::InvalidGroupKey("blank".to_string()).is_input_error());

        let err: StatisticsError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StatisticsError::StoreUnavailable(_)));
        assert!(!err.is_input_error());
    }
}
