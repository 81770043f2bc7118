//! Drives a single aggregation run through its fixed phase order:
//! connectivity check, side-table fetch, capacity calculation, pod
//! aggregation, storage aggregation, concatenation, write, summary.

use std::sync::Arc;

use database::postgres::{check_health, DatabaseConnection};
use domain_ocp_usage::pod_aggregator;
use domain_ocp_usage::storage_aggregator;
use domain_ocp_usage::{output::OutputRow, side_tables, streaming, writer};
use eyre::{Result, WrapErr};
use object_store_reader::{build_store, partition::PartitionScope, partition::Table, ObjectStoreReader};
use observability::{AggregatorMetrics, PhaseTimer, RunPhase};
use tracing::info;

use crate::config::Config;

/// Durations, row counts, and mode flags for one completed run, emitted as
/// the final orchestrator phase (spec §4.8 step 9).
#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
    pub input_pod_rows: usize,
    pub input_storage_rows: usize,
    pub output_rows: usize,
    pub rows_written: u64,
    pub use_streaming: bool,
    pub parallel_chunks: bool,
    pub use_bulk_copy: bool,
}

pub async fn run(config: Config, db: &DatabaseConnection) -> Result<RunSummary> {
    let store = build_store(&config.object_store).wrap_err("failed to build object store client")?;
    let scope = PartitionScope::new(
        config.identity.org_id.clone(),
        config.identity.source_uuid,
        config.identity.year,
        config.identity.month,
    );
    let reader = ObjectStoreReader::with_max_retries(
        Arc::clone(&store),
        scope,
        config.aggregator.use_categorical,
        config.object_store.max_retries,
    );

    // Phase 1: connectivity check to the object store and database; fail
    // fast on either.
    {
        let _timer = PhaseTimer::start(RunPhase::ConnectivityCheck);
        check_health(db).await.wrap_err("database health check failed")?;
        reader
            .list_files(Table::PodUsage)
            .await
            .wrap_err("object store connectivity check failed")?;
    }

    // Phase 2: fetch enabled_tag_keys and cost_category_rules once.
    let enabled_tag_keys = {
        let _timer = PhaseTimer::start(RunPhase::LoadLabelAllowList);
        side_tables::fetch_enabled_tag_keys(db)
            .await
            .wrap_err("failed to load enabled tag keys")?
    };
    let cost_category_rules = {
        let _timer = PhaseTimer::start(RunPhase::LoadCostCategoryRules);
        side_tables::fetch_cost_category_rules(db)
            .await
            .wrap_err("failed to load cost category rules")?
    };

    // Phase 3: capacity (always a full read, never streamed).
    let (node_capacity, cluster_capacity) = {
        let _timer = PhaseTimer::start(RunPhase::CapacityCalculation);
        let (node_caps, cluster_caps) =
            streaming::compute_capacity(&reader, config.aggregator.column_filtering).await?;
        let node_lookup = node_caps
            .iter()
            .map(|c| ((c.day, c.node.clone()), c.clone()))
            .collect();
        let cluster_lookup = cluster_caps.iter().map(|c| (c.day, c.clone())).collect();
        (node_lookup, cluster_lookup)
    };

    // Phase 4: pod aggregator.
    let node_label_rows = read_label_table(&reader, Table::NodeLabels, "node").await?;
    let namespace_label_rows = read_label_table(&reader, Table::NamespaceLabels, "namespace").await?;
    let (node_labels, namespace_labels) =
        pod_aggregator::prepare_label_lookups(&node_label_rows, &namespace_label_rows);

    let (pod_partial, input_pod_rows) = {
        let _timer = PhaseTimer::start(RunPhase::PodAggregation);
        streaming::run_pod_aggregation(
            &reader,
            &config.aggregator,
            node_labels,
            namespace_labels,
            enabled_tag_keys.clone(),
        )
        .await
        .wrap_err("pod aggregation failed")?
    };
    let pod_rows = pod_aggregator::finalize(
        pod_partial,
        &config.identity,
        &node_capacity,
        &cluster_capacity,
        &cost_category_rules,
    );

    // Phase 5: storage aggregator.
    let (storage_partial, input_storage_rows) = {
        let _timer = PhaseTimer::start(RunPhase::StorageAggregation);
        streaming::run_storage_aggregation(&reader, &config.aggregator, enabled_tag_keys)
            .await
            .wrap_err("storage aggregation failed")?
    };
    let storage_rows = storage_aggregator::finalize(storage_partial, &config.identity, &cost_category_rules);

    // Phase 6: concatenate.
    let mut rows: Vec<OutputRow> = Vec::with_capacity(pod_rows.len() + storage_rows.len());
    rows.extend(pod_rows);
    rows.extend(storage_rows);

    // Phase 7: row-count invariant check.
    let invalid = rows.iter().filter(|row| !row.has_valid_metrics()).count();
    if invalid > 0 {
        return Err(eyre::eyre!(
            "{invalid} of {} output rows failed the non-negative/finite metric invariant",
            rows.len()
        ));
    }

    // Phase 8: write.
    let rows_written = {
        let _timer = PhaseTimer::start(RunPhase::Write);
        if config.aggregator.truncate {
            writer::truncate_identity_scope(
                db,
                config.identity.source_uuid,
                config.identity.year,
                config.identity.month,
            )
            .await
            .wrap_err("failed to truncate identity scope before write")?;
        }
        writer::write_rows(
            db,
            &rows,
            config.aggregator.use_bulk_copy,
            config.aggregator.batch_size,
        )
        .await
        .wrap_err("failed to write output rows")?
    };

    AggregatorMetrics::record_output_rows(rows_written);
    AggregatorMetrics::record_run_completed(true);

    // Phase 9: run summary.
    let summary = RunSummary {
        input_pod_rows,
        input_storage_rows,
        output_rows: rows.len(),
        rows_written,
        use_streaming: config.aggregator.use_streaming,
        parallel_chunks: config.aggregator.parallel_chunks,
        use_bulk_copy: config.aggregator.use_bulk_copy,
    };
    info!(?summary, "aggregation run complete");
    Ok(summary)
}

async fn read_label_table(
    reader: &ObjectStoreReader,
    table: Table,
    key_column: &str,
) -> Result<Vec<domain_ocp_usage::input::LabelRow>> {
    let columns = match key_column {
        "node" => object_store_reader::schema::label_table::NODE_COLUMNS,
        _ => object_store_reader::schema::label_table::NAMESPACE_COLUMNS,
    };
    let batch = reader.read_table(table, columns).await.wrap_err("failed to read label table")?;
    let rows = domain_ocp_usage::input::label_rows(&batch, key_column)?;
    Ok(rows)
}

/// Ensure the target schema exists before a run writes to it. Separate
/// from `run` so callers (and tests) can opt out of running migrations
/// against a database they don't own.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    use sea_orm_migration::MigratorTrait;
    migration::Migrator::up(db, None)
        .await
        .wrap_err("failed to run database migrations")?;
    Ok(())
}
