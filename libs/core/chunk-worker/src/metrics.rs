//! Metrics module for chunk executor observability.
//!
//! ## Available Metrics
//!
//! - `chunk_worker_chunks_processed_total` - Counter of chunks processed by status
//! - `chunk_worker_chunk_duration_seconds` - Histogram of per-chunk processing time
//! - `chunk_worker_active_workers` - Gauge of chunks currently in flight

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metric names as constants for consistency.
pub mod names {
    pub const CHUNKS_PROCESSED: &str = "chunk_worker_chunks_processed_total";
    pub const CHUNK_DURATION: &str = "chunk_worker_chunk_duration_seconds";
    pub const ACTIVE_WORKERS: &str = "chunk_worker_active_workers";
}

/// Outcome label for a processed chunk.
#[derive(Debug, Clone, Copy)]
pub enum ChunkStatus {
    Success,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Record a chunk as processed with the given status.
pub fn record_chunk_processed(processor: &str, status: ChunkStatus) {
    counter!(
        names::CHUNKS_PROCESSED,
        "processor" => processor.to_string(),
        "status" => status.as_str().to_string()
    )
    .increment(1);
}

/// Record how long a single chunk took to process.
pub fn record_chunk_duration(processor: &str, duration: Duration) {
    histogram!(
        names::CHUNK_DURATION,
        "processor" => processor.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Update the in-flight chunk gauge (concurrent processing).
pub fn set_active_workers(processor: &str, count: f64) {
    gauge!(
        names::ACTIVE_WORKERS,
        "processor" => processor.to_string()
    )
    .set(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_status_as_str() {
        assert_eq!(ChunkStatus::Success.as_str(), "success");
        assert_eq!(ChunkStatus::Failed.as_str(), "failed");
    }
}
