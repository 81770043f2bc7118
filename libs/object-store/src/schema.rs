//! Column name constants for the four source tables, plus the set of
//! columns known to repeat enough to be worth dictionary-encoding.

/// Columns used from `openshift_pod_usage_line_items`.
pub mod pod_usage {
    pub const INTERVAL_START: &str = "interval_start";
    pub const INTERVAL_END: &str = "interval_end";
    pub const NAMESPACE: &str = "namespace";
    pub const NODE: &str = "node";
    pub const POD: &str = "pod";
    pub const RESOURCE_ID: &str = "resource_id";
    pub const POD_USAGE_CPU_CORE_SECONDS: &str = "pod_usage_cpu_core_seconds";
    pub const POD_REQUEST_CPU_CORE_SECONDS: &str = "pod_request_cpu_core_seconds";
    pub const POD_LIMIT_CPU_CORE_SECONDS: &str = "pod_limit_cpu_core_seconds";
    pub const POD_USAGE_MEMORY_BYTE_SECONDS: &str = "pod_usage_memory_byte_seconds";
    pub const POD_REQUEST_MEMORY_BYTE_SECONDS: &str = "pod_request_memory_byte_seconds";
    pub const POD_LIMIT_MEMORY_BYTE_SECONDS: &str = "pod_limit_memory_byte_seconds";
    pub const NODE_CAPACITY_CPU_CORE_SECONDS: &str = "node_capacity_cpu_core_seconds";
    pub const NODE_CAPACITY_MEMORY_BYTE_SECONDS: &str = "node_capacity_memory_byte_seconds";
    pub const POD_LABELS: &str = "pod_labels";

    /// All columns this engine ever reads from the table; used for the
    /// "read whole row" fallback when a caller does not project.
    pub const ALL: &[&str] = &[
        INTERVAL_START,
        INTERVAL_END,
        NAMESPACE,
        NODE,
        POD,
        RESOURCE_ID,
        POD_USAGE_CPU_CORE_SECONDS,
        POD_REQUEST_CPU_CORE_SECONDS,
        POD_LIMIT_CPU_CORE_SECONDS,
        POD_USAGE_MEMORY_BYTE_SECONDS,
        POD_REQUEST_MEMORY_BYTE_SECONDS,
        POD_LIMIT_MEMORY_BYTE_SECONDS,
        NODE_CAPACITY_CPU_CORE_SECONDS,
        NODE_CAPACITY_MEMORY_BYTE_SECONDS,
        POD_LABELS,
    ];

    /// Columns needed to compute node/cluster capacity alone (spec §4.8
    /// step 3's "implementations MAY short-circuit by reading only the
    /// capacity columns").
    pub const CAPACITY_COLUMNS: &[&str] = &[
        INTERVAL_START,
        NODE,
        NODE_CAPACITY_CPU_CORE_SECONDS,
        NODE_CAPACITY_MEMORY_BYTE_SECONDS,
    ];
}

/// Columns used from `openshift_storage_usage_line_items_daily`.
pub mod storage_usage {
    pub const INTERVAL_START: &str = "interval_start";
    pub const NAMESPACE: &str = "namespace";
    pub const POD: &str = "pod";
    pub const PERSISTENTVOLUMECLAIM: &str = "persistentvolumeclaim";
    pub const PERSISTENTVOLUME: &str = "persistentvolume";
    pub const STORAGECLASS: &str = "storageclass";
    pub const CSI_VOLUME_HANDLE: &str = "csi_volume_handle";
    pub const PERSISTENTVOLUMECLAIM_CAPACITY_GIGABYTE: &str =
        "persistentvolumeclaim_capacity_gigabyte";
    pub const VOLUME_REQUEST_STORAGE_GIGABYTE: &str = "volume_request_storage_gigabyte";
    pub const PERSISTENTVOLUMECLAIM_USAGE_GIGABYTE: &str = "persistentvolumeclaim_usage_gigabyte";
    pub const VOLUME_LABELS: &str = "volume_labels";

    pub const ALL: &[&str] = &[
        INTERVAL_START,
        NAMESPACE,
        POD,
        PERSISTENTVOLUMECLAIM,
        PERSISTENTVOLUME,
        STORAGECLASS,
        CSI_VOLUME_HANDLE,
        PERSISTENTVOLUMECLAIM_CAPACITY_GIGABYTE,
        VOLUME_REQUEST_STORAGE_GIGABYTE,
        PERSISTENTVOLUMECLAIM_USAGE_GIGABYTE,
        VOLUME_LABELS,
    ];
}

/// Columns used from `openshift_node_labels_line_items` and
/// `openshift_namespace_labels_line_items` — identical shape, keyed by
/// `node` or `namespace` respectively.
pub mod label_table {
    pub const INTERVAL_START: &str = "interval_start";
    pub const NODE: &str = "node";
    pub const NAMESPACE: &str = "namespace";
    pub const LABELS: &str = "labels";

    pub const NODE_COLUMNS: &[&str] = &[INTERVAL_START, NODE, LABELS];
    pub const NAMESPACE_COLUMNS: &[&str] = &[INTERVAL_START, NAMESPACE, LABELS];
}

/// Columns known to repeat heavily across rows, worth dictionary-encoding
/// in memory when `use_categorical` is enabled (spec §4.1, §6.3).
pub const CATEGORICAL_COLUMNS: &[&str] = &[
    "namespace",
    "node",
    "pod",
    "cluster_id",
    "persistentvolumeclaim",
    "persistentvolume",
    "storageclass",
    "resource_id",
];

pub fn is_categorical(column: &str) -> bool {
    CATEGORICAL_COLUMNS.contains(&column)
}

/// Best-effort logical type for a column by name, used only to build an
/// empty (zero-file) `RecordBatch` with a stable schema when a day or month
/// has no partition files at all.
pub fn data_type_for_column(column: &str) -> arrow_schema::DataType {
    use arrow_schema::{DataType, TimeUnit};

    if column == "interval_start" || column == "interval_end" {
        DataType::Timestamp(TimeUnit::Microsecond, None)
    } else if column.ends_with("_seconds")
        || column.ends_with("_gigabyte")
        || column.ends_with("_cores")
    {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

/// Build a zero-row schema for `columns`, nullable throughout (every source
/// column may legitimately be absent for a given row).
pub fn empty_schema(columns: &[&str]) -> arrow_schema::SchemaRef {
    use arrow_schema::{Field, Schema};
    std::sync::Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(*name, data_type_for_column(name), true))
            .collect::<Vec<_>>(),
    ))
}
