//! Converts a `RecordBatch` read from the object store into the row
//! structs the aggregators fold over.
//!
//! The reader may hand back string columns either as plain UTF-8 or as a
//! dictionary encoding (`use_categorical`); every accessor here handles
//! both so the aggregators never need to know which one they got.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::AsArray;
use arrow::record_batch::RecordBatch;
use arrow_array::{Array, ArrayRef, DictionaryArray, Float64Array, MapArray, TimestampMicrosecondArray};
use arrow_array::types::Int32Type;
use chrono::NaiveDateTime;

use crate::error::AggregateError;
use crate::labels::LabelsEncoding;
use object_store_reader::schema;

fn column(batch: &RecordBatch, name: &str) -> Option<ArrayRef> {
    batch
        .schema()
        .index_of(name)
        .ok()
        .map(|idx| Arc::clone(batch.column(idx)))
}

fn string_at(column: &ArrayRef, idx: usize) -> Option<String> {
    if let Some(dict) = column
        .as_any()
        .downcast_ref::<DictionaryArray<Int32Type>>()
    {
        if dict.is_null(idx) {
            return None;
        }
        let key = dict.keys().value(idx) as usize;
        let values = dict.values().as_string::<i32>();
        return Some(values.value(key).to_string());
    }

    let strings = column.as_string::<i32>();
    if strings.is_null(idx) {
        None
    } else {
        Some(strings.value(idx).to_string())
    }
}

/// Decode a label column value at `idx` without assuming its physical
/// representation: a native Arrow `Map` column decodes straight into
/// `LabelsEncoding::Native` (no JSON round-trip, per spec §4.2's performance
/// contract); anything else is treated as a JSON-text column and deferred to
/// `LabelsEncoding::decode`.
fn labels_at(column: &ArrayRef, idx: usize) -> LabelsEncoding {
    if let Some(map_array) = column.as_any().downcast_ref::<MapArray>() {
        if map_array.is_null(idx) {
            return LabelsEncoding::empty();
        }
        let offsets = map_array.value_offsets();
        let start = offsets[idx] as usize;
        let end = offsets[idx + 1] as usize;
        let keys = map_array.keys().as_string::<i32>();
        let values = map_array.values().as_string::<i32>();

        let mut map = BTreeMap::new();
        for i in start..end {
            if keys.is_null(i) {
                continue;
            }
            let value = if values.is_null(i) { String::new() } else { values.value(i).to_string() };
            map.insert(keys.value(i).to_string(), value);
        }
        return LabelsEncoding::Native(map);
    }

    LabelsEncoding::JsonText(string_at(column, idx))
}

fn f64_at(column: &ArrayRef, idx: usize) -> f64 {
    match column.as_any().downcast_ref::<Float64Array>() {
        Some(arr) if !arr.is_null(idx) => arr.value(idx),
        _ => 0.0,
    }
}

fn timestamp_at(column: &ArrayRef, idx: usize) -> Option<NaiveDateTime> {
    let arr = column
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()?;
    if arr.is_null(idx) {
        return None;
    }
    chrono::DateTime::from_timestamp_micros(arr.value(idx)).map(|dt| dt.naive_utc())
}

#[derive(Debug, Clone)]
pub struct PodUsageRow {
    pub interval_start: NaiveDateTime,
    pub namespace: String,
    pub node: String,
    pub resource_id: String,
    pub pod_usage_cpu_core_seconds: f64,
    pub pod_request_cpu_core_seconds: f64,
    pub pod_limit_cpu_core_seconds: f64,
    pub pod_usage_memory_byte_seconds: f64,
    pub pod_request_memory_byte_seconds: f64,
    pub pod_limit_memory_byte_seconds: f64,
    pub node_capacity_cpu_core_seconds: f64,
    pub node_capacity_memory_byte_seconds: f64,
    pub pod_labels: LabelsEncoding,
}

#[derive(Debug, Clone)]
pub struct StorageUsageRow {
    pub interval_start: NaiveDateTime,
    pub namespace: String,
    pub persistentvolumeclaim: String,
    pub persistentvolume: String,
    pub storageclass: String,
    pub csi_volume_handle: String,
    pub persistentvolumeclaim_capacity_gigabyte: f64,
    pub volume_request_storage_gigabyte: f64,
    pub persistentvolumeclaim_usage_gigabyte: f64,
    pub volume_labels: LabelsEncoding,
}

#[derive(Debug, Clone)]
pub struct LabelRow {
    pub interval_start: NaiveDateTime,
    pub key: String,
    pub labels: LabelsEncoding,
}

pub fn pod_usage_rows(batch: &RecordBatch) -> Result<Vec<PodUsageRow>, AggregateError> {
    use schema::pod_usage::*;

    let interval_start = column(batch, INTERVAL_START);
    let namespace = column(batch, NAMESPACE);
    let node = column(batch, NODE);
    let resource_id = column(batch, RESOURCE_ID);
    let usage_cpu = column(batch, POD_USAGE_CPU_CORE_SECONDS);
    let request_cpu = column(batch, POD_REQUEST_CPU_CORE_SECONDS);
    let limit_cpu = column(batch, POD_LIMIT_CPU_CORE_SECONDS);
    let usage_mem = column(batch, POD_USAGE_MEMORY_BYTE_SECONDS);
    let request_mem = column(batch, POD_REQUEST_MEMORY_BYTE_SECONDS);
    let limit_mem = column(batch, POD_LIMIT_MEMORY_BYTE_SECONDS);
    let node_cap_cpu = column(batch, NODE_CAPACITY_CPU_CORE_SECONDS);
    let node_cap_mem = column(batch, NODE_CAPACITY_MEMORY_BYTE_SECONDS);
    let labels = column(batch, POD_LABELS);

    let total = batch.num_rows();
    let mut rows = Vec::with_capacity(total);
    for idx in 0..total {
        let Some(interval_start) = interval_start.as_ref().and_then(|c| timestamp_at(c, idx)) else {
            continue;
        };

        rows.push(PodUsageRow {
            interval_start,
            namespace: namespace.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            node: node.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            resource_id: resource_id.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            pod_usage_cpu_core_seconds: usage_cpu.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_request_cpu_core_seconds: request_cpu.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_limit_cpu_core_seconds: limit_cpu.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_usage_memory_byte_seconds: usage_mem.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_request_memory_byte_seconds: request_mem.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_limit_memory_byte_seconds: limit_mem.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            node_capacity_cpu_core_seconds: node_cap_cpu.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            node_capacity_memory_byte_seconds: node_cap_mem.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            pod_labels: labels.as_ref().map(|c| labels_at(c, idx)).unwrap_or_else(LabelsEncoding::empty),
        });
    }

    crate::error::check_data_error_rate("pod_usage", total - rows.len(), total)?;
    Ok(rows)
}

pub fn storage_usage_rows(batch: &RecordBatch) -> Result<Vec<StorageUsageRow>, AggregateError> {
    use schema::storage_usage::*;

    let interval_start = column(batch, INTERVAL_START);
    let namespace = column(batch, NAMESPACE);
    let pvc = column(batch, PERSISTENTVOLUMECLAIM);
    let pv = column(batch, PERSISTENTVOLUME);
    let storageclass = column(batch, STORAGECLASS);
    let csi = column(batch, CSI_VOLUME_HANDLE);
    let capacity = column(batch, PERSISTENTVOLUMECLAIM_CAPACITY_GIGABYTE);
    let request = column(batch, VOLUME_REQUEST_STORAGE_GIGABYTE);
    let usage = column(batch, PERSISTENTVOLUMECLAIM_USAGE_GIGABYTE);
    let labels = column(batch, VOLUME_LABELS);

    let total = batch.num_rows();
    let mut rows = Vec::with_capacity(total);
    for idx in 0..total {
        let Some(interval_start) = interval_start.as_ref().and_then(|c| timestamp_at(c, idx)) else {
            continue;
        };

        rows.push(StorageUsageRow {
            interval_start,
            namespace: namespace.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            persistentvolumeclaim: pvc.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            persistentvolume: pv.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            storageclass: storageclass.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            csi_volume_handle: csi.as_ref().and_then(|c| string_at(c, idx)).unwrap_or_default(),
            persistentvolumeclaim_capacity_gigabyte: capacity.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            volume_request_storage_gigabyte: request.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            persistentvolumeclaim_usage_gigabyte: usage.as_ref().map(|c| f64_at(c, idx)).unwrap_or(0.0),
            volume_labels: labels.as_ref().map(|c| labels_at(c, idx)).unwrap_or_else(LabelsEncoding::empty),
        });
    }

    crate::error::check_data_error_rate("storage_usage", total - rows.len(), total)?;
    Ok(rows)
}

/// Decode a node- or namespace-labels table, keyed by the `key_column`
/// (`"node"` or `"namespace"`). Rows are deduplicated by the caller before
/// joining, not here (spec §4.4 step 3: dedup happens at join time so it
/// applies uniformly whether the table came from one file or many).
pub fn label_rows(batch: &RecordBatch, key_column: &str) -> Result<Vec<LabelRow>, AggregateError> {
    use schema::label_table::{INTERVAL_START, LABELS};

    let interval_start = column(batch, INTERVAL_START);
    let key = column(batch, key_column);
    let labels = column(batch, LABELS);

    let total = batch.num_rows();
    let mut rows = Vec::with_capacity(total);
    for idx in 0..total {
        let Some(interval_start) = interval_start.as_ref().and_then(|c| timestamp_at(c, idx)) else {
            continue;
        };
        let Some(key) = key.as_ref().and_then(|c| string_at(c, idx)) else {
            continue;
        };

        rows.push(LabelRow {
            interval_start,
            key,
            labels: labels.as_ref().map(|c| labels_at(c, idx)).unwrap_or_else(LabelsEncoding::empty),
        });
    }

    crate::error::check_data_error_rate("label_table", total - rows.len(), total)?;
    Ok(rows)
}
