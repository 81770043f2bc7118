//! Bounded-concurrency chunk execution for streaming aggregation runs.
//!
//! Generalizes a worker-pool pattern — semaphore-bounded concurrency,
//! `JoinSet` task tracking, Prometheus metrics per unit of work — to drive
//! a stream of table chunks through a processor with backpressure, instead
//! of a message-queue job. Each in-flight chunk produces one partial
//! result; the caller is responsible for merging partial results back
//! together in an order-invariant way, since chunks complete in whatever
//! order their work finishes, not the order they were read.
//!
//! # Example
//!
//! ```rust,ignore
//! use chunk_worker::{ChunkExecutor, ChunkProcessor};
//!
//! struct SumChunk;
//!
//! #[async_trait::async_trait]
//! impl ChunkProcessor<Vec<u32>, u32> for SumChunk {
//!     async fn process(&self, chunk: Vec<u32>) -> Result<u32, chunk_worker::ChunkError> {
//!         Ok(chunk.into_iter().sum())
//!     }
//!     fn name(&self) -> &'static str { "sum_chunk" }
//! }
//!
//! let executor = ChunkExecutor::new(4);
//! let partials = executor.run(chunk_stream, Arc::new(SumChunk)).await;
//! ```

mod error;
mod executor;
pub mod metrics;

pub use error::ChunkError;
pub use executor::{ChunkExecutor, ChunkProcessor};

/// Result type alias for chunk execution.
pub type ChunkResult<T> = Result<T, ChunkError>;
