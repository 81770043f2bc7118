//! Error taxonomy for label processing, aggregation, and writing.
//!
//! Mirrors `database::common::DatabaseError` and `object_store_reader::ReaderError`:
//! one enum per concern, `#[from]` conversions at the seams that already
//! return someone else's error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("malformed label JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Reader(#[from] object_store_reader::ReaderError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Chunk(#[from] chunk_worker::ChunkError),

    #[error("too many rows failed validation in {component}: {dropped} of {total}")]
    TooManyDataErrors {
        component: &'static str,
        dropped: usize,
        total: usize,
    },

    #[error("arrow error: {0}")]
    Arrow(String),
}

/// Fraction of a batch that may fail a post-read invariant before the
/// component is considered unhealthy (spec §7: "if `DataError` count per
/// component exceeds a threshold, the run fails after its current phase").
pub const DATA_ERROR_THRESHOLD: f64 = 0.05;

/// Below this many rows, a single batch's drop ratio is too noisy to judge
/// — a two-row test fixture with one malformed row is not a sick feed.
pub const DATA_ERROR_MIN_SAMPLE: usize = 1_000;

/// Log a row-drop count at `warn!` (never per-row, per spec §7/ambient
/// logging guidance) and turn it into `TooManyDataErrors` once the drop
/// ratio crosses [`DATA_ERROR_THRESHOLD`] on a big-enough sample.
pub fn check_data_error_rate(component: &'static str, dropped: usize, total: usize) -> Result<(), AggregateError> {
    if dropped == 0 {
        return Ok(());
    }
    tracing::warn!(component, dropped, total, "rows dropped for failing a post-read invariant");
    if total >= DATA_ERROR_MIN_SAMPLE && (dropped as f64 / total as f64) > DATA_ERROR_THRESHOLD {
        return Err(AggregateError::TooManyDataErrors { component, dropped, total });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error(transparent)]
    Database(#[from] database::common::DatabaseError),

    #[error("failed to encode output rows as CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_drops_is_always_fine() {
        assert!(check_data_error_rate("pod_usage", 0, 10_000).is_ok());
    }

    #[test]
    fn small_batches_tolerate_a_high_drop_ratio() {
        assert!(check_data_error_rate("pod_usage", 1, 2).is_ok());
    }

    #[test]
    fn large_batches_fail_once_the_ratio_crosses_the_threshold() {
        let err = check_data_error_rate("storage_usage", 51, 1_000).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::TooManyDataErrors { component: "storage_usage", dropped: 51, total: 1_000 }
        ));
    }

    #[test]
    fn large_batches_at_exactly_the_threshold_are_fine() {
        assert!(check_data_error_rate("storage_usage", 50, 1_000).is_ok());
    }
}
