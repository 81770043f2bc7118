//! Reads the two side tables the orchestrator fetches once per run: the
//! enabled-tag-key allow-list and the cost-category rules (spec §3.2,
//! §4.8 step 2).

use std::collections::HashSet;

use database::common::DatabaseError;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::cost_category::CostCategoryRule;
use crate::error::WriterError;

pub async fn fetch_enabled_tag_keys(db: &DatabaseConnection) -> Result<HashSet<String>, WriterError> {
    let stmt = Statement::from_string(
        DatabaseBackend::Postgres,
        "SELECT key FROM reporting_ocpenabledtagkeys WHERE enabled = true".to_string(),
    );
    let rows = db.query_all(stmt).await.map_err(DatabaseError::from)?;

    rows.into_iter()
        .map(|row| row.try_get::<String>("", "key").map_err(DatabaseError::from).map_err(WriterError::from))
        .collect()
}

pub async fn fetch_cost_category_rules(db: &DatabaseConnection) -> Result<Vec<CostCategoryRule>, WriterError> {
    let stmt = Statement::from_string(
        DatabaseBackend::Postgres,
        "SELECT id, namespace_pattern FROM reporting_ocp_cost_category".to_string(),
    );
    let rows = db.query_all(stmt).await.map_err(DatabaseError::from)?;

    rows.into_iter()
        .map(|row| {
            let id: i32 = row.try_get("", "id").map_err(DatabaseError::from)?;
            let namespace_pattern: String = row.try_get("", "namespace_pattern").map_err(DatabaseError::from)?;
            Ok(CostCategoryRule { id, namespace_pattern })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()
        .map_err(WriterError::from)
}
