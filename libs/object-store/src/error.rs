//! Error taxonomy for the object-store reader.
//!
//! Matches the three fatal categories the aggregator's reader component is
//! specified to raise: a transient I/O fault (retried before surfacing), an
//! unparseable file, and a rejected credential. Individual missing files are
//! never an error here — callers see an empty row-set instead (see
//! `Reader::list_files`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    /// Transient network/object-store fault. Retried up to the configured
    /// budget by the caller before this is ever surfaced.
    #[error("object store I/O error: {0}")]
    Io(#[from] object_store::Error),

    /// A file's Parquet footer or schema could not be parsed, or a column
    /// requested in a projection does not exist in the file's schema.
    #[error("unparseable file or schema at {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// Credential rejection surfaced by the object store client.
    #[error("object store authentication failed: {0}")]
    Auth(String),

    /// The object store client itself could not be constructed from the
    /// supplied configuration (missing/invalid bucket, region, endpoint).
    #[error("object store misconfigured: {0}")]
    Config(String),
}

pub type ReaderResult<T> = Result<T, ReaderError>;
