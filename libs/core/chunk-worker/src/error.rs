//! Error types for chunk execution.

use thiserror::Error;

/// Errors that can occur while driving chunks through a processor.
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The processor returned an error for a given chunk.
    #[error("chunk processing failed: {0}")]
    Processing(String),

    /// The worker task itself panicked or was cancelled.
    #[error("internal executor error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChunkError::Processing("bad row group".to_string());
        assert_eq!(err.to_string(), "chunk processing failed: bad row group");
    }
}
