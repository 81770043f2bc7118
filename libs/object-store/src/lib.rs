//! Partition discovery and columnar reads of the OpenShift usage tables
//! from an S3-compatible object store, with column projection and
//! categorical normalization pushed down to the Parquet layer.

pub mod client;
pub mod error;
pub mod partition;
pub mod reader;
pub mod schema;

pub use client::build_store;
pub use error::{ReaderError, ReaderResult};
pub use partition::{PartitionScope, Table};
pub use reader::ObjectStoreReader;
