//! Mode selection and execution: Mode A (in-memory), Mode B (serial
//! streaming), Mode C (parallel streaming via a bounded worker pool).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use chunk_worker::{ChunkError, ChunkExecutor, ChunkProcessor};
use core_config::aggregator::AggregatorConfig;
use futures::{Stream, StreamExt};
use object_store_reader::{schema, ObjectStoreReader, Table};

use crate::capacity::{self, ClusterCapacity, NodeCapacity};
use crate::error::AggregateError;
use crate::input::{self, PodUsageRow, StorageUsageRow};
use crate::labels::LabelsEncoding;
use crate::pod_aggregator::{self, LabelTieBreak, PodPartial};
use crate::storage_aggregator::{self, StoragePartial};

struct PodChunkProcessor {
    node_labels: Arc<HashMap<(NaiveDate, String), LabelsEncoding>>,
    namespace_labels: Arc<HashMap<(NaiveDate, String), LabelsEncoding>>,
    enabled_tag_keys: Arc<HashSet<String>>,
}

#[async_trait]
impl ChunkProcessor<Vec<PodUsageRow>, PodPartial> for PodChunkProcessor {
    async fn process(&self, chunk: Vec<PodUsageRow>) -> Result<PodPartial, ChunkError> {
        pod_aggregator::fold_chunk(&chunk, &self.node_labels, &self.namespace_labels, &self.enabled_tag_keys)
            .map_err(|err| ChunkError::Processing(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "pod_aggregator"
    }
}

struct StorageChunkProcessor {
    enabled_tag_keys: Arc<HashSet<String>>,
}

#[async_trait]
impl ChunkProcessor<Vec<StorageUsageRow>, StoragePartial> for StorageChunkProcessor {
    async fn process(&self, chunk: Vec<StorageUsageRow>) -> Result<StoragePartial, ChunkError> {
        storage_aggregator::fold_chunk(&chunk, &self.enabled_tag_keys)
            .map_err(|err| ChunkError::Processing(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "storage_aggregator"
    }
}

/// Wrap a reader's chunk stream so a read/schema failure is recorded on
/// the side rather than aborting iteration — the chunk executor needs an
/// infallible item stream, so a failing chunk is dropped from aggregation
/// and its error surfaces once the run completes. Every successfully
/// decoded row is tallied into `input_rows` as it passes through, so the
/// true input-row count survives regardless of which mode folds the
/// chunks downstream.
fn row_chunk_stream<T, F>(
    stream: impl Stream<Item = object_store_reader::ReaderResult<arrow::record_batch::RecordBatch>> + Send + 'static,
    decode: F,
    error_slot: Arc<Mutex<Option<AggregateError>>>,
    input_rows: Arc<AtomicUsize>,
) -> impl Stream<Item = Vec<T>> + Send + 'static
where
    T: Send + 'static,
    F: Fn(&arrow::record_batch::RecordBatch) -> Result<Vec<T>, AggregateError> + Send + Sync + 'static,
{
    stream.filter_map(move |batch| {
        let error_slot = Arc::clone(&error_slot);
        let input_rows = Arc::clone(&input_rows);
        let result = batch.map_err(AggregateError::from).and_then(|batch| decode(&batch));
        async move {
            match result {
                Ok(rows) => {
                    input_rows.fetch_add(rows.len(), Ordering::Relaxed);
                    Some(rows)
                }
                Err(err) => {
                    *error_slot.lock().expect("error slot poisoned") = Some(err);
                    None
                }
            }
        }
    })
}

fn take_error(slot: &Arc<Mutex<Option<AggregateError>>>) -> Option<AggregateError> {
    slot.lock().expect("error slot poisoned").take()
}

/// Capacity is always read in full (spec §4.8 step 3: streaming it would
/// force a second pass over the month's pod-usage set).
pub async fn compute_capacity(
    reader: &ObjectStoreReader,
    column_filtering: bool,
) -> Result<(Vec<NodeCapacity>, Vec<ClusterCapacity>), AggregateError> {
    let columns = if column_filtering {
        schema::pod_usage::CAPACITY_COLUMNS
    } else {
        schema::pod_usage::ALL
    };
    let batch = reader.read_table(Table::PodUsage, columns).await?;
    let rows = input::pod_usage_rows(&batch)?;
    let node_caps = capacity::node_capacity(&rows);
    let cluster_caps = capacity::cluster_capacity(&node_caps);
    Ok((node_caps, cluster_caps))
}

/// Run the pod aggregator under the mode selected by `config`. Returns the
/// merged partial alongside the true number of decoded input rows (not the
/// number of output groups), for the run summary (spec §4.8 step 9).
pub async fn run_pod_aggregation(
    reader: &ObjectStoreReader,
    config: &AggregatorConfig,
    node_labels: HashMap<(NaiveDate, String), LabelsEncoding>,
    namespace_labels: HashMap<(NaiveDate, String), LabelsEncoding>,
    enabled_tag_keys: HashSet<String>,
) -> Result<(PodPartial, usize), AggregateError> {
    let node_labels = Arc::new(node_labels);
    let namespace_labels = Arc::new(namespace_labels);
    let enabled_tag_keys = Arc::new(enabled_tag_keys);
    // `column_filtering` only shrinks the dedicated capacity pass (see
    // `compute_capacity`); every column here feeds the pod aggregator
    // itself, so there's nothing left to drop.
    let columns = schema::pod_usage::ALL;

    if !config.use_streaming {
        let batch = reader.read_table(Table::PodUsage, columns).await?;
        let rows = input::pod_usage_rows(&batch)?;
        let input_rows = rows.len();
        let partial = pod_aggregator::fold_chunk(&rows, &node_labels, &namespace_labels, &enabled_tag_keys)?;
        return Ok((partial, input_rows));
    }

    let reader_stream = reader.read_table_streaming(Table::PodUsage, columns, config.chunk_size).await?;
    let error_slot = Arc::new(Mutex::new(None));
    let input_rows = Arc::new(AtomicUsize::new(0));
    let chunks = row_chunk_stream(reader_stream, input::pod_usage_rows, Arc::clone(&error_slot), Arc::clone(&input_rows));

    let merged = if !config.parallel_chunks {
        let mut acc: PodPartial = HashMap::new();
        tokio::pin!(chunks);
        while let Some(rows) = chunks.next().await {
            let partial = pod_aggregator::fold_chunk(&rows, &node_labels, &namespace_labels, &enabled_tag_keys)?;
            acc = pod_aggregator::merge_partials(acc, partial, LabelTieBreak::FirstNonEmpty);
        }
        acc
    } else {
        let processor = Arc::new(PodChunkProcessor {
            node_labels: Arc::clone(&node_labels),
            namespace_labels: Arc::clone(&namespace_labels),
            enabled_tag_keys: Arc::clone(&enabled_tag_keys),
        });
        let executor = ChunkExecutor::new(config.max_workers);
        tokio::pin!(chunks);
        let partials = executor.run(chunks, processor).await;

        let mut acc: PodPartial = HashMap::new();
        for partial in partials {
            let partial = partial.map_err(AggregateError::from)?;
            acc = pod_aggregator::merge_partials(acc, partial, LabelTieBreak::LexicographicallySmallest);
        }
        acc
    };

    if let Some(err) = take_error(&error_slot) {
        return Err(err);
    }
    Ok((merged, input_rows.load(Ordering::Relaxed)))
}

/// Run the storage aggregator under the mode selected by `config`. Returns
/// the merged partial alongside the true number of decoded input rows (not
/// the number of output groups), for the run summary (spec §4.8 step 9).
pub async fn run_storage_aggregation(
    reader: &ObjectStoreReader,
    config: &AggregatorConfig,
    enabled_tag_keys: HashSet<String>,
) -> Result<(StoragePartial, usize), AggregateError> {
    let enabled_tag_keys = Arc::new(enabled_tag_keys);
    let columns = schema::storage_usage::ALL;

    if !config.use_streaming {
        let batch = reader.read_table(Table::StorageUsageDaily, columns).await?;
        let rows = input::storage_usage_rows(&batch)?;
        let input_rows = rows.len();
        let partial = storage_aggregator::fold_chunk(&rows, &enabled_tag_keys)?;
        return Ok((partial, input_rows));
    }

    let reader_stream = reader
        .read_table_streaming(Table::StorageUsageDaily, columns, config.chunk_size)
        .await?;
    let error_slot = Arc::new(Mutex::new(None));
    let input_rows = Arc::new(AtomicUsize::new(0));
    let chunks = row_chunk_stream(reader_stream, input::storage_usage_rows, Arc::clone(&error_slot), Arc::clone(&input_rows));

    let merged = if !config.parallel_chunks {
        let mut acc: StoragePartial = HashMap::new();
        tokio::pin!(chunks);
        while let Some(rows) = chunks.next().await {
            let partial = storage_aggregator::fold_chunk(&rows, &enabled_tag_keys)?;
            acc = storage_aggregator::merge_partials(acc, partial, LabelTieBreak::FirstNonEmpty);
        }
        acc
    } else {
        let processor = Arc::new(StorageChunkProcessor {
            enabled_tag_keys: Arc::clone(&enabled_tag_keys),
        });
        let executor = ChunkExecutor::new(config.max_workers);
        tokio::pin!(chunks);
        let partials = executor.run(chunks, processor).await;

        let mut acc: StoragePartial = HashMap::new();
        for partial in partials {
            let partial = partial.map_err(AggregateError::from)?;
            acc = storage_aggregator::merge_partials(acc, partial, LabelTieBreak::LexicographicallySmallest);
        }
        acc
    };

    if let Some(err) = take_error(&error_slot) {
        return Err(err);
    }
    Ok((merged, input_rows.load(Ordering::Relaxed)))
}
