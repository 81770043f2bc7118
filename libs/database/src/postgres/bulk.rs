//! Server-side bulk load (`COPY ... FROM STDIN`) support.
//!
//! SeaORM's `DatabaseConnection` does not expose `COPY` directly, so this
//! module drops down to the underlying `sqlx::PgPool` it wraps (available
//! whenever the connection was established against a Postgres backend with
//! the `sqlx-postgres` runtime, which is how `connector::connect*` always
//! builds it).

use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::common::DatabaseError;

/// Stream a pre-formatted delimited text frame into `table` via
/// `COPY table (columns) FROM STDIN WITH (FORMAT csv)`.
///
/// `csv_payload` must already be a valid CSV frame (header-less, matching
/// `columns` in order); the caller owns normalization (NaN stripping, date
/// coercion, etc.) before calling this.
///
/// The copy runs as a single statement: Postgres aborts the whole load if
/// any row fails to parse, so there is no partial-write state to clean up
/// on error.
pub async fn copy_in_csv(
    db: &DatabaseConnection,
    table: &str,
    columns: &[&str],
    csv_payload: Vec<u8>,
) -> Result<u64, DatabaseError> {
    let pool = db.get_postgres_connection_pool();
    let column_list = columns.join(", ");
    let sql = format!(
        "COPY {table} ({column_list}) FROM STDIN WITH (FORMAT csv, HEADER false)",
    );

    debug!(table, rows_bytes = csv_payload.len(), "starting bulk copy");

    let mut copy_in = pool.copy_in_raw(&sql).await?;
    copy_in.send(csv_payload).await?;
    let rows = copy_in.finish().await?;

    info!(table, rows, "bulk copy complete");
    Ok(rows)
}

/// Truncate all rows for a given `(source_uuid, year, month)` identity scope
/// ahead of a fresh write. Runs inside its own transaction so the truncate
/// and the subsequent insert/copy are never both partially visible.
pub async fn truncate_identity_scope(
    db: &DatabaseConnection,
    table: &str,
    source_uuid: uuid::Uuid,
    year: i32,
    month: u32,
) -> Result<(), DatabaseError> {
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    let sql = format!(
        "DELETE FROM {table} WHERE source_uuid = $1 AND year = $2 AND month = $3",
    );
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        &sql,
        [
            source_uuid.into(),
            year.into(),
            format!("{month:02}").into(),
        ],
    );

    db.execute(stmt).await?;
    Ok(())
}
