//! Writes aggregated output rows to the target database: a batched
//! parametric-insert path, or a single streamed bulk `COPY`.

use database::postgres::{copy_in_csv, truncate_identity_scope as bulk_truncate_identity_scope};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::info;

use crate::error::WriterError;
use crate::output::{OutputRow, COLUMNS};

const TABLE: &str = "reporting_ocpusagelineitem_daily_summary";

/// Truncate this run's identity scope ahead of a fresh write (spec §4.7
/// "optional truncate"). Runs in its own transaction, as
/// `database::postgres::bulk::truncate_identity_scope` already does.
pub async fn truncate_identity_scope(
    db: &DatabaseConnection,
    source_uuid: uuid::Uuid,
    year: i32,
    month: u32,
) -> Result<(), WriterError> {
    bulk_truncate_identity_scope(db, TABLE, source_uuid, year, month)
        .await
        .map_err(WriterError::from)
}

/// Write `rows` via the configured path. An empty `rows` is a no-op, not
/// an error (spec §8 boundary behavior: "zero input rows produce zero
/// output rows and a success exit").
pub async fn write_rows(
    db: &DatabaseConnection,
    rows: &[OutputRow],
    use_bulk_copy: bool,
    batch_size: usize,
) -> Result<u64, WriterError> {
    if rows.is_empty() {
        return Ok(0);
    }

    if use_bulk_copy {
        write_bulk_copy(db, rows).await
    } else {
        write_batched_insert(db, rows, batch_size).await
    }
}

async fn write_bulk_copy(db: &DatabaseConnection, rows: &[OutputRow]) -> Result<u64, WriterError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
    for row in rows {
        csv_writer.write_record(row.to_csv_record())?;
    }
    let payload = csv_writer
        .into_inner()
        .map_err(|err| WriterError::Csv(err.into_error()))?;

    let written = copy_in_csv(db, TABLE, COLUMNS, payload).await?;
    info!(rows = written, "bulk copy finished");
    Ok(written)
}

async fn write_batched_insert(
    db: &DatabaseConnection,
    rows: &[OutputRow],
    batch_size: usize,
) -> Result<u64, WriterError> {
    let mut written = 0u64;
    for chunk in rows.chunks(batch_size.max(1)) {
        written += insert_batch(db, chunk).await?;
    }
    Ok(written)
}

async fn insert_batch(db: &DatabaseConnection, rows: &[OutputRow]) -> Result<u64, WriterError> {
    let mut placeholder_groups = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len() * COLUMNS.len());
    let mut placeholder_index = 1usize;

    for row in rows {
        let row_values = row.to_values();
        let placeholders: Vec<String> = (0..row_values.len())
            .map(|_| {
                let placeholder = format!("${placeholder_index}");
                placeholder_index += 1;
                placeholder
            })
            .collect();
        placeholder_groups.push(format!("({})", placeholders.join(", ")));
        values.extend(row_values);
    }

    let column_list = COLUMNS.join(", ");
    let sql = format!(
        "INSERT INTO {TABLE} ({column_list}) VALUES {}",
        placeholder_groups.join(", ")
    );
    let stmt = Statement::from_sql_and_values(DatabaseBackend::Postgres, &sql, values);

    let result = db.execute(stmt).await.map_err(database::common::DatabaseError::from)?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DataSource;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_row() -> OutputRow {
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
            pod_usage_cpu_core_hours: Some(1.0),
            pod_request_cpu_core_hours: None,
            pod_effective_usage_cpu_core_hours: None,
            pod_limit_cpu_core_hours: None,
            pod_usage_memory_gigabyte_hours: None,
            pod_request_memory_gigabyte_hours: None,
            pod_effective_usage_memory_gigabyte_hours: None,
            pod_limit_memory_gigabyte_hours: None,
            node_capacity_cpu_cores: None,
            node_capacity_cpu_core_hours: None,
            node_capacity_memory_gigabytes: None,
            node_capacity_memory_gigabyte_hours: None,
            cluster_capacity_cpu_core_hours: None,
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
    fn to_values_produces_one_value_per_column() {
        let row = sample_row();
        assert_eq!(row.to_values().len(), COLUMNS.len());
    }

    #[tokio::test]
    async fn write_rows_is_a_no_op_for_empty_input() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres).into_connection();
        let written = write_rows(&db, &[], true, 1000).await.unwrap();
        assert_eq!(written, 0);
    }
}
