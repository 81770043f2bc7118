//! Lists partition files and reads them with column projection pushed down
//! to the Parquet reader, either fully materialized or as a chunked,
//! non-restartable stream.

use std::sync::Arc;

use std::future::Future;
use std::time::Duration;

use arrow::compute::{cast, concat_batches};
use arrow::record_batch::RecordBatch;
use database::common::RetryConfig;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::{ObjectMeta, ObjectStore};
use parquet::arrow::async_reader::{ParquetObjectReader, ParquetRecordBatchStreamBuilder};
use parquet::arrow::ProjectionMask;
use tracing::{debug, warn};

use crate::client::is_auth_error;
use crate::error::{ReaderError, ReaderResult};
use crate::partition::{PartitionScope, Table};
use crate::schema;

/// Classify a raw `object_store::Error` as a credential rejection
/// (`ReaderError::Auth`, never retried) or a generic transient I/O fault
/// (`ReaderError::Io`, retried up to the configured budget).
fn classify_object_store_error(err: object_store::Error) -> ReaderError {
    if is_auth_error(&err.to_string()) {
        ReaderError::Auth(err.to_string())
    } else {
        ReaderError::Io(err)
    }
}

/// Default batch size for the in-memory (Mode A) read path. Only affects
/// how many rows Parquet decodes per internal batch before concatenation;
/// the caller never observes these batch boundaries.
const IN_MEMORY_BATCH_SIZE: usize = 64 * 1024;

/// Retry a reader operation that may fail with a transient
/// `ReaderError::Io`, using the same exponential-backoff shape as
/// `database::common::retry_with_backoff`. Only `Io` failures are retried
/// (spec §4.1: "`SchemaError` for an unparseable file, `AuthError` for
/// credential rejection" are fatal immediately, never retried).
async fn retry_on_io_error<F, Fut, T>(config: &RetryConfig, mut operation: F) -> ReaderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReaderResult<T>>,
{
    let mut attempt = 0u32;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(ReaderError::Io(err)) if attempt < config.max_retries => {
                attempt += 1;
                warn!(attempt, max_retries = config.max_retries, error = %err, "retrying object store I/O fault");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = ((delay_ms as f64 * config.backoff_multiplier) as u64).min(config.max_delay_ms);
            }
            Err(other) => return Err(other),
        }
    }
}

pub struct ObjectStoreReader {
    store: Arc<dyn ObjectStore>,
    scope: PartitionScope,
    use_categorical: bool,
    retry: RetryConfig,
}

impl ObjectStoreReader {
    pub fn new(store: Arc<dyn ObjectStore>, scope: PartitionScope, use_categorical: bool) -> Self {
        Self::with_max_retries(store, scope, use_categorical, 3)
    }

    pub fn with_max_retries(
        store: Arc<dyn ObjectStore>,
        scope: PartitionScope,
        use_categorical: bool,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            scope,
            use_categorical,
            retry: RetryConfig::new().with_max_retries(max_retries),
        }
    }

    /// List every `.parquet` file for `table` within this reader's scope,
    /// across all days. An empty result is not an error — it means the
    /// table had no data for this billing period (spec §4.1).
    pub async fn list_files(&self, table: Table) -> ReaderResult<Vec<ObjectMeta>> {
        let mut files = retry_on_io_error(&self.retry, || self.list_files_once(table)).await?;

        if files.is_empty() {
            warn!(table = table.name(), "no partition files found for table");
        } else {
            debug!(table = table.name(), count = files.len(), "listed partition files");
        }

        files.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(files)
    }

    async fn list_files_once(&self, table: Table) -> ReaderResult<Vec<ObjectMeta>> {
        let prefix = self.scope.month_prefix();
        let mut listing = self.store.list(Some(&prefix));
        let mut files = Vec::new();

        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(classify_object_store_error)?;
            if meta.location.as_ref().ends_with(".parquet")
                && self.scope.matches_table(&meta.location, table)
            {
                files.push(meta);
            }
        }

        Ok(files)
    }

    /// Read `table` fully into one `RecordBatch`, with `columns` pushed
    /// down as a projection at the file level.
    pub async fn read_table(&self, table: Table, columns: &[&str]) -> ReaderResult<RecordBatch> {
        let files = self.list_files(table).await?;
        let schema = schema::empty_schema(columns);

        if files.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }

        let owned_columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut batches = Vec::new();
        let mut out_schema = schema;

        for meta in files {
            let mut stream = self
                .open_projected_stream(&meta, &owned_columns, IN_MEMORY_BATCH_SIZE)
                .await?;

            while let Some(batch) = stream.next().await {
                let batch = batch.map_err(|source| ReaderError::Schema {
                    path: meta.location.to_string(),
                    source,
                })?;
                let normalized = self.normalize_batch(batch)?;
                out_schema = normalized.schema();
                batches.push(normalized);
            }
        }

        if batches.is_empty() {
            return Ok(RecordBatch::new_empty(out_schema));
        }

        concat_batches(&out_schema, &batches).map_err(|err| ReaderError::Schema {
            path: format!("<concat of {} batches>", batches.len()),
            source: parquet::errors::ParquetError::ArrowError(err.to_string()),
        })
    }

    /// Read `table` as a finite, non-restartable sequence of row-sets, each
    /// holding at most `chunk_size` rows, yielded in file-traversal order.
    pub async fn read_table_streaming(
        &self,
        table: Table,
        columns: &[&str],
        chunk_size: usize,
    ) -> ReaderResult<BoxStream<'static, ReaderResult<RecordBatch>>> {
        let files = self.list_files(table).await?;
        let owned_columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let store = Arc::clone(&self.store);
        let use_categorical = self.use_categorical;
        let retry = self.retry.clone();

        let stream = stream::iter(files)
            .then(move |meta| {
                let store = Arc::clone(&store);
                let columns = owned_columns.clone();
                let retry = retry.clone();
                async move { Self::open_file_chunks(store, meta, columns, chunk_size, retry).await }
            })
            .flatten()
            .map(move |batch| batch.and_then(|b| Self::normalize_batch_with(b, use_categorical)));

        Ok(stream.boxed())
    }

    async fn open_projected_stream(
        &self,
        meta: &ObjectMeta,
        columns: &[String],
        batch_size: usize,
    ) -> ReaderResult<
        parquet::arrow::async_reader::ParquetRecordBatchStream<ParquetObjectReader>,
    > {
        let builder = retry_on_io_error(&self.retry, || {
            Self::open_builder(Arc::clone(&self.store), meta.clone())
        })
        .await?;

        let projection = Self::projection_mask(&builder, columns).map_err(|source| ReaderError::Schema {
            path: meta.location.to_string(),
            source,
        })?;

        builder
            .with_projection(projection)
            .with_batch_size(batch_size)
            .build()
            .map_err(|source| ReaderError::Schema {
                path: meta.location.to_string(),
                source,
            })
    }

    /// Open a Parquet stream builder for `meta`, classifying the handshake
    /// error (connection refused, timeout, credential rejection, ...) into
    /// the right `ReaderError` variant so only genuinely transient faults
    /// get retried.
    async fn open_builder(
        store: Arc<dyn ObjectStore>,
        meta: ObjectMeta,
    ) -> ReaderResult<ParquetRecordBatchStreamBuilder<ParquetObjectReader>> {
        let object_reader = ParquetObjectReader::new(store, meta.clone());
        ParquetRecordBatchStreamBuilder::new(object_reader)
            .await
            .map_err(|source| {
                if is_auth_error(&source.to_string()) {
                    ReaderError::Auth(source.to_string())
                } else {
                    ReaderError::Schema {
                        path: meta.location.to_string(),
                        source,
                    }
                }
            })
    }

    /// Build a per-file stream of `ReaderResult<RecordBatch>`, boxed so it
    /// can be `.flatten()`-ed alongside every other file's stream
    /// regardless of the concrete reader type, and so an error opening one
    /// file surfaces as a single stream item rather than aborting the
    /// whole listing.
    async fn open_file_chunks(
        store: Arc<dyn ObjectStore>,
        meta: ObjectMeta,
        columns: Vec<String>,
        chunk_size: usize,
        retry: RetryConfig,
    ) -> BoxStream<'static, ReaderResult<RecordBatch>> {
        let builder = match retry_on_io_error(&retry, || Self::open_builder(Arc::clone(&store), meta.clone())).await {
            Ok(b) => b,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };

        let projection = match Self::projection_mask(&builder, &columns) {
            Ok(p) => p,
            Err(source) => {
                let path = meta.location.to_string();
                return stream::once(async move { Err(ReaderError::Schema { path, source }) }).boxed();
            }
        };

        let path = meta.location.to_string();
        match builder
            .with_projection(projection)
            .with_batch_size(chunk_size)
            .build()
        {
            Ok(batch_stream) => batch_stream
                .map(move |batch| {
                    batch.map_err(|source| ReaderError::Schema {
                        path: path.clone(),
                        source,
                    })
                })
                .boxed(),
            Err(source) => stream::once(async move { Err(ReaderError::Schema { path, source }) }).boxed(),
        }
    }

    fn projection_mask(
        builder: &ParquetRecordBatchStreamBuilder<ParquetObjectReader>,
        columns: &[String],
    ) -> Result<ProjectionMask, parquet::errors::ParquetError> {
        let full_schema = builder.schema();
        let mut indices = Vec::with_capacity(columns.len());

        for name in columns {
            match full_schema.index_of(name) {
                Ok(idx) => indices.push(idx),
                Err(_) => {
                    debug!(column = name.as_str(), "column absent from file, skipping projection entry");
                }
            }
        }

        Ok(ProjectionMask::roots(builder.parquet_schema(), indices))
    }

    /// Cast categorical columns to a single logical representation
    /// (dictionary-encoded when `use_categorical`, plain `Utf8` otherwise)
    /// so row groups that disagree on physical encoding never surface mixed
    /// types to a caller concatenating chunks.
    fn normalize_batch(&self, batch: RecordBatch) -> ReaderResult<RecordBatch> {
        Self::normalize_batch_with(batch, self.use_categorical)
    }

    fn normalize_batch_with(batch: RecordBatch, use_categorical: bool) -> ReaderResult<RecordBatch> {
        use arrow_schema::{DataType, Field};

        let target_type = if use_categorical {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        } else {
            DataType::Utf8
        };

        let schema = batch.schema();
        let mut columns = Vec::with_capacity(batch.num_columns());
        let mut fields = Vec::with_capacity(batch.num_columns());
        let mut changed = false;

        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            if schema::is_categorical(field.name()) && *field.data_type() != target_type {
                let cast_column = cast(column, &target_type).map_err(|err| ReaderError::Schema {
                    path: "<in-memory normalization>".to_string(),
                    source: parquet::errors::ParquetError::ArrowError(err.to_string()),
                })?;
                fields.push(Field::new(field.name(), target_type.clone(), field.is_nullable()));
                columns.push(cast_column);
                changed = true;
            } else {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }

        if !changed {
            return Ok(batch);
        }

        let new_schema = Arc::new(arrow_schema::Schema::new(fields));
        RecordBatch::try_new(new_schema, columns).map_err(|err| ReaderError::Schema {
            path: "<in-memory normalization>".to_string(),
            source: parquet::errors::ParquetError::ArrowError(err.to_string()),
        })
    }
}
