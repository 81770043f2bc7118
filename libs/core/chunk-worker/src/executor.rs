//! Bounded-concurrency chunk executor.
//!
//! Drives a stream of input chunks through a processor with at most
//! `max_workers` chunks in flight at a time. Backpressure comes from the
//! semaphore: the executor does not pull the next chunk off the stream
//! until a worker slot is free, so an upstream reader producing chunks
//! faster than they can be processed blocks naturally instead of
//! buffering unboundedly in memory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::ChunkError;
use crate::metrics::{self, ChunkStatus};

/// Processes one chunk of input into one partial result.
///
/// Implementors are typically the pod/storage aggregator fold step: each
/// chunk becomes one partial aggregate, later merged by the caller. Results
/// are handed back in completion order, not input order, so the merge must
/// be order-invariant.
#[async_trait]
pub trait ChunkProcessor<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn process(&self, chunk: I) -> Result<O, ChunkError>;

    /// Name used for metrics labeling and log lines.
    fn name(&self) -> &'static str;
}

/// Runs chunks through a `ChunkProcessor` with bounded parallelism.
pub struct ChunkExecutor {
    max_workers: usize,
}

impl ChunkExecutor {
    /// `max_workers` is clamped to at least 1 — zero workers would deadlock
    /// the executor forever on the first chunk.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Consume `chunks` to completion, returning one result per chunk.
    ///
    /// A panicking or cancelled worker task surfaces as
    /// `Err(ChunkError::Internal)` rather than propagating the panic, so a
    /// single bad chunk never brings down the whole run.
    pub async fn run<I, O, P, S>(
        &self,
        mut chunks: S,
        processor: Arc<P>,
    ) -> Vec<Result<O, ChunkError>>
    where
        I: Send + 'static,
        O: Send + 'static,
        P: ChunkProcessor<I, O> + 'static,
        S: Stream<Item = I> + Unpin,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut join_set: JoinSet<Result<O, ChunkError>> = JoinSet::new();
        let mut results = Vec::new();

        loop {
            tokio::select! {
                biased;

                maybe_chunk = chunks.next() => {
                    let Some(chunk) = maybe_chunk else { break };

                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .expect("chunk executor semaphore closed");
                    let processor = Arc::clone(&processor);
                    let in_flight = Arc::clone(&in_flight);
                    let name = processor.name();

                    join_set.spawn(async move {
                        let active = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        metrics::set_active_workers(name, active as f64);

                        let start = std::time::Instant::now();
                        let outcome = processor.process(chunk).await;
                        metrics::record_chunk_duration(name, start.elapsed());
                        metrics::record_chunk_processed(
                            name,
                            if outcome.is_ok() { ChunkStatus::Success } else { ChunkStatus::Failed },
                        );

                        let active = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                        metrics::set_active_workers(name, active as f64);
                        drop(permit);

                        outcome
                    });
                }

                Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                    results.push(Self::unwrap_joined(joined));
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            results.push(Self::unwrap_joined(joined));
        }

        results
    }

    fn unwrap_joined<O>(
        joined: Result<Result<O, ChunkError>, tokio::task::JoinError>,
    ) -> Result<O, ChunkError> {
        match joined {
            Ok(result) => result,
            Err(join_err) => {
                warn!(error = %join_err, "chunk worker task did not complete normally");
                Err(ChunkError::Internal(join_err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    struct DoubleIt;

    #[async_trait]
    impl ChunkProcessor<u32, u32> for DoubleIt {
        async fn process(&self, chunk: u32) -> Result<u32, ChunkError> {
            Ok(chunk * 2)
        }

        fn name(&self) -> &'static str {
            "double_it"
        }
    }

    struct FailOddChunks;

    #[async_trait]
    impl ChunkProcessor<u32, u32> for FailOddChunks {
        async fn process(&self, chunk: u32) -> Result<u32, ChunkError> {
            if chunk % 2 == 1 {
                Err(ChunkError::Processing(format!("odd chunk: {chunk}")))
            } else {
                Ok(chunk)
            }
        }

        fn name(&self) -> &'static str {
            "fail_odd_chunks"
        }
    }

    struct TrackConcurrency {
        current: Arc<StdAtomicUsize>,
        peak: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl ChunkProcessor<u32, ()> for TrackConcurrency {
        async fn process(&self, _chunk: u32) -> Result<(), ChunkError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "track_concurrency"
        }
    }

    #[tokio::test]
    async fn processes_every_chunk() {
        let executor = ChunkExecutor::new(4);
        let chunks = stream::iter(0..10u32);
        let results = executor.run(chunks, Arc::new(DoubleIt)).await;

        assert_eq!(results.len(), 10);
        let mut doubled: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
        doubled.sort_unstable();
        assert_eq!(doubled, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn surfaces_per_chunk_errors_without_losing_other_chunks() {
        let executor = ChunkExecutor::new(2);
        let chunks = stream::iter(0..5u32);
        let results = executor.run(chunks, Arc::new(FailOddChunks)).await;

        let (ok, err): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        assert_eq!(ok.len(), 3);
        assert_eq!(err.len(), 2);
    }

    #[tokio::test]
    async fn never_exceeds_max_workers_in_flight() {
        let max_workers = 3;
        let executor = ChunkExecutor::new(max_workers);
        let current = Arc::new(StdAtomicUsize::new(0));
        let peak = Arc::new(StdAtomicUsize::new(0));
        let processor = Arc::new(TrackConcurrency {
            current: Arc::clone(&current),
            peak: Arc::clone(&peak),
        });

        let chunks = stream::iter(0..20u32);
        executor.run(chunks, processor).await;

        assert!(peak.load(Ordering::SeqCst) <= max_workers);
    }

    #[test]
    fn new_clamps_zero_to_one_worker() {
        assert_eq!(ChunkExecutor::new(0).max_workers(), 1);
    }
}
