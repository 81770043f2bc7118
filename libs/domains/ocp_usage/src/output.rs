//! The fixed output row schema shared by the pod and storage aggregators,
//! and its CSV encoding for the bulk-copy write path.

use chrono::NaiveDate;
use uuid::Uuid;

/// Column order as the target table (`reporting_ocpusagelineitem_daily_summary`)
/// declares them; the bulk-copy path's CSV frame must match this exactly.
pub const COLUMNS: &[&str] = &[
    "source_uuid",
    "cluster_id",
    "cluster_alias",
    "year",
    "month",
    "usage_start",
    "usage_end",
    "data_source",
    "namespace",
    "node",
    "resource_id",
    "pod_usage_cpu_core_hours",
    "pod_request_cpu_core_hours",
    "pod_effective_usage_cpu_core_hours",
    "pod_limit_cpu_core_hours",
    "pod_usage_memory_gigabyte_hours",
    "pod_request_memory_gigabyte_hours",
    "pod_effective_usage_memory_gigabyte_hours",
    "pod_limit_memory_gigabyte_hours",
    "node_capacity_cpu_cores",
    "node_capacity_cpu_core_hours",
    "node_capacity_memory_gigabytes",
    "node_capacity_memory_gigabyte_hours",
    "cluster_capacity_cpu_core_hours",
    "cluster_capacity_memory_gigabyte_hours",
    "pod_labels",
    "persistentvolumeclaim",
    "persistentvolume",
    "storageclass",
    "csi_volume_handle",
    "persistentvolumeclaim_capacity_gigabyte_months",
    "volume_request_storage_gigabyte_months",
    "persistentvolumeclaim_usage_gigabyte_months",
    "volume_labels",
    "cost_category_id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Pod,
    Storage,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Pod => "Pod",
            DataSource::Storage => "Storage",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub source_uuid: Uuid,
    pub cluster_id: String,
    pub cluster_alias: Option<String>,
    pub year: i32,
    pub month: u32,
    pub usage_start: NaiveDate,
    pub usage_end: NaiveDate,
    pub data_source: DataSource,
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub resource_id: Option<String>,

    // Pod-only metrics; null for storage rows.
    pub pod_usage_cpu_core_hours: Option<f64>,
    pub pod_request_cpu_core_hours: Option<f64>,
    pub pod_effective_usage_cpu_core_hours: Option<f64>,
    pub pod_limit_cpu_core_hours: Option<f64>,
    pub pod_usage_memory_gigabyte_hours: Option<f64>,
    pub pod_request_memory_gigabyte_hours: Option<f64>,
    pub pod_effective_usage_memory_gigabyte_hours: Option<f64>,
    pub pod_limit_memory_gigabyte_hours: Option<f64>,
    pub node_capacity_cpu_cores: Option<f64>,
    pub node_capacity_cpu_core_hours: Option<f64>,
    pub node_capacity_memory_gigabytes: Option<f64>,
    pub node_capacity_memory_gigabyte_hours: Option<f64>,
    pub cluster_capacity_cpu_core_hours: Option<f64>,
    pub cluster_capacity_memory_gigabyte_hours: Option<f64>,
    pub pod_labels: Option<String>,

    // Storage-only columns; null for pod rows.
    pub persistentvolumeclaim: Option<String>,
    pub persistentvolume: Option<String>,
    pub storageclass: Option<String>,
    pub csi_volume_handle: Option<String>,
    pub persistentvolumeclaim_capacity_gigabyte_months: Option<f64>,
    pub volume_request_storage_gigabyte_months: Option<f64>,
    pub persistentvolumeclaim_usage_gigabyte_months: Option<f64>,
    pub volume_labels: Option<String>,

    pub cost_category_id: Option<i32>,
}

impl OutputRow {
    /// Every metric column is either absent or finite and non-negative
    /// (spec §3.3 invariant 3). Violations are the writer's `DataError`
    /// trigger, not a hard failure here.
    pub fn has_valid_metrics(&self) -> bool {
        [
            self.pod_usage_cpu_core_hours,
            self.pod_request_cpu_core_hours,
            self.pod_effective_usage_cpu_core_hours,
            self.pod_limit_cpu_core_hours,
            self.pod_usage_memory_gigabyte_hours,
            self.pod_request_memory_gigabyte_hours,
            self.pod_effective_usage_memory_gigabyte_hours,
            self.pod_limit_memory_gigabyte_hours,
            self.node_capacity_cpu_cores,
            self.node_capacity_cpu_core_hours,
            self.node_capacity_memory_gigabytes,
            self.node_capacity_memory_gigabyte_hours,
            self.cluster_capacity_cpu_core_hours,
            self.cluster_capacity_memory_gigabyte_hours,
            self.persistentvolumeclaim_capacity_gigabyte_months,
            self.volume_request_storage_gigabyte_months,
            self.persistentvolumeclaim_usage_gigabyte_months,
        ]
        .into_iter()
        .flatten()
        .all(|value| value.is_finite() && value >= 0.0)
    }

    /// The uniqueness key of spec §3.3 invariant 4.
    pub fn uniqueness_key(&self) -> (Uuid, NaiveDate, &'static str, Option<&str>, Option<&str>, Option<&str>, Option<&str>) {
        (
            self.source_uuid,
            self.usage_start,
            self.data_source.as_str(),
            self.namespace.as_deref(),
            self.node.as_deref(),
            self.persistentvolumeclaim.as_deref(),
            self.resource_id.as_deref(),
        )
    }

    /// Render this row as a CSV record in `COLUMNS` order for the bulk-copy
    /// write path. NaN is never emitted: `Option` absence and NaN-valued
    /// metrics both render as an empty CSV field, which Postgres's `COPY
    /// ... FORMAT csv` reads back as `NULL`.
    pub fn to_csv_record(&self) -> Vec<String> {
        vec![
            self.source_uuid.to_string(),
            self.cluster_id.clone(),
            self.cluster_alias.clone().unwrap_or_default(),
            self.year.to_string(),
            format!("{:02}", self.month),
            self.usage_start.format("%Y-%m-%d").to_string(),
            self.usage_end.format("%Y-%m-%d").to_string(),
            self.data_source.as_str().to_string(),
            self.namespace.clone().unwrap_or_default(),
            self.node.clone().unwrap_or_default(),
            self.resource_id.clone().unwrap_or_default(),
            render_metric(self.pod_usage_cpu_core_hours),
            render_metric(self.pod_request_cpu_core_hours),
            render_metric(self.pod_effective_usage_cpu_core_hours),
            render_metric(self.pod_limit_cpu_core_hours),
            render_metric(self.pod_usage_memory_gigabyte_hours),
            render_metric(self.pod_request_memory_gigabyte_hours),
            render_metric(self.pod_effective_usage_memory_gigabyte_hours),
            render_metric(self.pod_limit_memory_gigabyte_hours),
            render_metric(self.node_capacity_cpu_cores),
            render_metric(self.node_capacity_cpu_core_hours),
            render_metric(self.node_capacity_memory_gigabytes),
            render_metric(self.node_capacity_memory_gigabyte_hours),
            render_metric(self.cluster_capacity_cpu_core_hours),
            render_metric(self.cluster_capacity_memory_gigabyte_hours),
            render_labels(&self.pod_labels),
            self.persistentvolumeclaim.clone().unwrap_or_default(),
            self.persistentvolume.clone().unwrap_or_default(),
            self.storageclass.clone().unwrap_or_default(),
            self.csi_volume_handle.clone().unwrap_or_default(),
            render_metric(self.persistentvolumeclaim_capacity_gigabyte_months),
            render_metric(self.volume_request_storage_gigabyte_months),
            render_metric(self.persistentvolumeclaim_usage_gigabyte_months),
            render_labels(&self.volume_labels),
            self.cost_category_id.map(|id| id.to_string()).unwrap_or_default(),
        ]
    }
}

impl OutputRow {
    /// Render this row as typed `sea_orm::Value`s in `COLUMNS` order, for
    /// the parametric-insert write path. NaN collapses to `NULL` here the
    /// same way it collapses to an empty CSV field in
    /// [`OutputRow::to_csv_record`].
    pub fn to_values(&self) -> Vec<sea_orm::Value> {
        fn metric(value: Option<f64>) -> sea_orm::Value {
            match value {
                Some(v) if v.is_finite() => sea_orm::Value::Double(Some(v)),
                _ => sea_orm::Value::Double(None),
            }
        }

        fn text(value: &Option<String>) -> sea_orm::Value {
            sea_orm::Value::String(value.clone().map(Box::new))
        }

        fn labels(value: &Option<String>) -> sea_orm::Value {
            let json = match value {
                Some(text) if !text.is_empty() => {
                    serde_json::from_str(text).unwrap_or(serde_json::Value::Object(Default::default()))
                }
                _ => serde_json::Value::Object(Default::default()),
            };
            sea_orm::Value::Json(Some(Box::new(json)))
        }

        vec![
            sea_orm::Value::Uuid(Some(Box::new(self.source_uuid))),
            sea_orm::Value::String(Some(Box::new(self.cluster_id.clone()))),
            text(&self.cluster_alias),
            sea_orm::Value::Int(Some(self.year)),
            sea_orm::Value::String(Some(Box::new(format!("{:02}", self.month)))),
            sea_orm::Value::ChronoDate(Some(Box::new(self.usage_start))),
            sea_orm::Value::ChronoDate(Some(Box::new(self.usage_end))),
            sea_orm::Value::String(Some(Box::new(self.data_source.as_str().to_string()))),
            text(&self.namespace),
            text(&self.node),
            text(&self.resource_id),
            metric(self.pod_usage_cpu_core_hours),
            metric(self.pod_request_cpu_core_hours),
            metric(self.pod_effective_usage_cpu_core_hours),
            metric(self.pod_limit_cpu_core_hours),
            metric(self.pod_usage_memory_gigabyte_hours),
            metric(self.pod_request_memory_gigabyte_hours),
            metric(self.pod_effective_usage_memory_gigabyte_hours),
            metric(self.pod_limit_memory_gigabyte_hours),
            metric(self.node_capacity_cpu_cores),
            metric(self.node_capacity_cpu_core_hours),
            metric(self.node_capacity_memory_gigabytes),
            metric(self.node_capacity_memory_gigabyte_hours),
            metric(self.cluster_capacity_cpu_core_hours),
            metric(self.cluster_capacity_memory_gigabyte_hours),
            labels(&self.pod_labels),
            text(&self.persistentvolumeclaim),
            text(&self.persistentvolume),
            text(&self.storageclass),
            text(&self.csi_volume_handle),
            metric(self.persistentvolumeclaim_capacity_gigabyte_months),
            metric(self.volume_request_storage_gigabyte_months),
            metric(self.persistentvolumeclaim_usage_gigabyte_months),
            labels(&self.volume_labels),
            sea_orm::Value::Int(self.cost_category_id),
        ]
    }
}

fn render_metric(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

/// A label column is only ever absent (never NaN after the aggregators run,
/// since `labels::canonicalize` always returns a string) but the writer
/// still normalizes defensively here in case a row was built without going
/// through the label pipeline (e.g. a future pass-through path).
fn render_labels(value: &Option<String>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.clone(),
        _ => "{}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pod_row() -> OutputRow {
        OutputRow {
            source_uuid: Uuid::nil(),
            cluster_id: "cluster-1".to_string(),
            cluster_alias: None,
            year: 2026,
            month: 7,
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            usage_end: NaiveDate::from_ymd_opt(2026, 7, 2).unwrap(),
            data_source: DataSource::Pod,
            namespace: Some("ns-1".to_string()),
            node: Some("node-A".to_string()),
            resource_id: Some("res-1".to_string()),
            pod_usage_cpu_core_hours: Some(48.0),
            pod_request_cpu_core_hours: Some(72.0),
            pod_effective_usage_cpu_core_hours: Some(72.0),
            pod_limit_cpu_core_hours: None,
            pod_usage_memory_gigabyte_hours: None,
            pod_request_memory_gigabyte_hours: None,
            pod_effective_usage_memory_gigabyte_hours: None,
            pod_limit_memory_gigabyte_hours: None,
            node_capacity_cpu_cores: Some(5.0),
            node_capacity_cpu_core_hours: Some(120.0),
            node_capacity_memory_gigabytes: None,
            node_capacity_memory_gigabyte_hours: None,
            cluster_capacity_cpu_core_hours: Some(120.0),
            cluster_capacity_memory_gigabyte_hours: None,
            pod_labels: Some("{}".to_string()),
            persistentvolumeclaim: None,
            persistentvolume: None,
            storageclass: None,
            csi_volume_handle: None,
            persistentvolumeclaim_capacity_gigabyte_months: None,
            volume_request_storage_gigabyte_months: None,
            persistentvolumeclaim_usage_gigabyte_months: None,
            volume_labels: None,
            cost_category_id: None,
        }
    }

    #[test]
    fn pod_row_leaves_storage_columns_empty_in_csv() {
        let row = minimal_pod_row();
        let record = row.to_csv_record();
        let pvc_idx = COLUMNS.iter().position(|c| *c == "persistentvolumeclaim").unwrap();
        assert_eq!(record[pvc_idx], "");
    }

    #[test]
    fn nan_metric_renders_as_empty_field() {
        let mut row = minimal_pod_row();
        row.pod_usage_cpu_core_hours = Some(f64::NAN);
        let record = row.to_csv_record();
        let idx = COLUMNS.iter().position(|c| *c == "pod_usage_cpu_core_hours").unwrap();
        assert_eq!(record[idx], "");
    }

    #[test]
    fn absent_labels_render_as_empty_object() {
        let mut row = minimal_pod_row();
        row.pod_labels = None;
        let record = row.to_csv_record();
        let idx = COLUMNS.iter().position(|c| *c == "pod_labels").unwrap();
        assert_eq!(record[idx], "{}");
    }

    #[test]
    fn usage_end_is_one_day_after_usage_start() {
        let row = minimal_pod_row();
        assert_eq!(row.usage_end, row.usage_start + chrono::Duration::days(1));
    }
}
