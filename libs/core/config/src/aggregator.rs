//! Knobs controlling which execution mode and optimization paths a run
//! takes. Everything here is orthogonal to *what* gets computed; flipping
//! any of these must never change an output row, only how fast it is
//! produced.

use crate::{env_or_default, ConfigError, FromEnv};

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<bool>().map_err(|e| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    env_or_default(key, &default.to_string())
        .parse::<usize>()
        .map_err(|e| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        })
}

/// Execution-mode and optimization toggles for a single run.
///
/// - `use_streaming = false`: Mode A, everything read into memory at once.
/// - `use_streaming = true, parallel_chunks = false`: Mode B, serial
///   streaming over chunks.
/// - `use_streaming = true, parallel_chunks = true`: Mode C, bounded
///   worker-pool streaming with order-invariant merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub use_streaming: bool,
    pub parallel_chunks: bool,
    pub max_workers: usize,
    pub chunk_size: usize,
    pub column_filtering: bool,
    pub use_categorical: bool,
    pub use_arrow_compute: bool,
    pub use_bulk_copy: bool,
    pub batch_size: usize,
    pub truncate: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            use_streaming: false,
            parallel_chunks: false,
            max_workers: 4,
            chunk_size: 100_000,
            column_filtering: true,
            use_categorical: true,
            use_arrow_compute: true,
            use_bulk_copy: true,
            batch_size: 1_000,
            truncate: false,
        }
    }
}

impl FromEnv for AggregatorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            use_streaming: env_bool("AGG_USE_STREAMING", defaults.use_streaming)?,
            parallel_chunks: env_bool("AGG_PARALLEL_CHUNKS", defaults.parallel_chunks)?,
            max_workers: env_usize("AGG_MAX_WORKERS", defaults.max_workers)?,
            chunk_size: env_usize("AGG_CHUNK_SIZE", defaults.chunk_size)?,
            column_filtering: env_bool("AGG_COLUMN_FILTERING", defaults.column_filtering)?,
            use_categorical: env_bool("AGG_USE_CATEGORICAL", defaults.use_categorical)?,
            use_arrow_compute: env_bool("AGG_USE_ARROW_COMPUTE", defaults.use_arrow_compute)?,
            use_bulk_copy: env_bool("AGG_USE_BULK_COPY", defaults.use_bulk_copy)?,
            batch_size: env_usize("AGG_BATCH_SIZE", defaults.batch_size)?,
            truncate: env_bool("AGG_TRUNCATE", defaults.truncate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_mode_a() {
        let cfg = AggregatorConfig::default();
        assert!(!cfg.use_streaming);
        assert!(!cfg.parallel_chunks);
    }

    #[test]
    fn from_env_overrides_selected_mode() {
        temp_env::with_vars(
            [
                ("AGG_USE_STREAMING", Some("true")),
                ("AGG_PARALLEL_CHUNKS", Some("true")),
                ("AGG_MAX_WORKERS", Some("8")),
                ("AGG_CHUNK_SIZE", Some("50000")),
            ],
            || {
                let cfg = AggregatorConfig::from_env().unwrap();
                assert!(cfg.use_streaming);
                assert!(cfg.parallel_chunks);
                assert_eq!(cfg.max_workers, 8);
                assert_eq!(cfg.chunk_size, 50_000);
            },
        );
    }

    #[test]
    fn from_env_rejects_invalid_bool() {
        temp_env::with_var("AGG_USE_STREAMING", Some("maybe"), || {
            assert!(AggregatorConfig::from_env().is_err());
        });
    }
}
