//! Per-day × (namespace, node, resource) grouping over pod usage rows.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use core_config::identity::RunIdentity;

use crate::capacity::{ClusterCapacity, NodeCapacity};
use crate::cost_category::{self, CostCategoryRule};
use crate::error::AggregateError;
use crate::input::{LabelRow, PodUsageRow};
use crate::joins;
use crate::labels::{self, LabelsEncoding};
use crate::output::{DataSource, OutputRow};

const SECONDS_PER_HOUR: f64 = 3600.0;
const BYTES_PER_GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;

/// Which rule resolves `pod_labels` when more than one row (or, during
/// partial merge, more than one chunk) contributes to the same group.
/// Mode A/B accumulate chunks in order and keep the first non-empty value
/// seen; Mode C merges partials that complete in an arbitrary order and
/// must fall back to a value that does not depend on that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTieBreak {
    FirstNonEmpty,
    LexicographicallySmallest,
}

pub(crate) fn update_label(current: &mut Option<String>, candidate: &str, rule: LabelTieBreak) {
    if candidate.is_empty() || candidate == "{}" {
        return;
    }
    match (current.as_ref(), rule) {
        (None, _) => *current = Some(candidate.to_string()),
        (Some(_), LabelTieBreak::FirstNonEmpty) => {}
        (Some(existing), LabelTieBreak::LexicographicallySmallest) => {
            if candidate < existing.as_str() {
                *current = Some(candidate.to_string());
            }
        }
    }
}

type PodKey = (NaiveDate, String, String, String);

#[derive(Debug, Clone, Default)]
pub struct PodAccumulator {
    pub usage_cpu_core_seconds: f64,
    pub request_cpu_core_seconds: f64,
    pub limit_cpu_core_seconds: f64,
    pub usage_memory_byte_seconds: f64,
    pub request_memory_byte_seconds: f64,
    pub limit_memory_byte_seconds: f64,
    pub effective_usage_cpu_core_seconds: f64,
    pub effective_usage_memory_byte_seconds: f64,
    pub pod_labels: Option<String>,
}

impl PodAccumulator {
    fn merge(&mut self, other: &PodAccumulator, rule: LabelTieBreak) {
        self.usage_cpu_core_seconds += other.usage_cpu_core_seconds;
        self.request_cpu_core_seconds += other.request_cpu_core_seconds;
        self.limit_cpu_core_seconds += other.limit_cpu_core_seconds;
        self.usage_memory_byte_seconds += other.usage_memory_byte_seconds;
        self.request_memory_byte_seconds += other.request_memory_byte_seconds;
        self.limit_memory_byte_seconds += other.limit_memory_byte_seconds;
        self.effective_usage_cpu_core_seconds += other.effective_usage_cpu_core_seconds;
        self.effective_usage_memory_byte_seconds += other.effective_usage_memory_byte_seconds;
        if let Some(label) = &other.pod_labels {
            update_label(&mut self.pod_labels, label, rule);
        }
    }
}

/// `HashMap<(day, namespace, node, resource_id), PodAccumulator>`: the
/// partial-aggregate type chunks fold into and that partials merge as.
pub type PodPartial = HashMap<PodKey, PodAccumulator>;

/// Fold one row-set (a full table in Mode A, or one chunk in Mode B/C) into
/// a partial aggregate. `node_labels`/`namespace_labels` must already be
/// deduplicated by `(day, key)` (spec §4.4 step 3).
pub fn fold_chunk(
    rows: &[PodUsageRow],
    node_labels: &HashMap<(NaiveDate, String), LabelsEncoding>,
    namespace_labels: &HashMap<(NaiveDate, String), LabelsEncoding>,
    enabled_tag_keys: &HashSet<String>,
) -> Result<PodPartial, AggregateError> {
    let mut partial: PodPartial = HashMap::new();

    for row in rows {
        if row.node.is_empty() {
            continue;
        }
        let day = row.interval_start.date();

        let empty = LabelsEncoding::empty();
        let node_map = node_labels.get(&(day, row.node.clone())).unwrap_or(&empty);
        let namespace_map = namespace_labels
            .get(&(day, row.namespace.clone()))
            .unwrap_or(&empty);

        let merged_labels = labels::process_row(node_map, namespace_map, &row.pod_labels, enabled_tag_keys)?;

        let key = (day, row.namespace.clone(), row.node.clone(), row.resource_id.clone());
        let entry = partial.entry(key).or_default();

        entry.usage_cpu_core_seconds += row.pod_usage_cpu_core_seconds;
        entry.request_cpu_core_seconds += row.pod_request_cpu_core_seconds;
        entry.limit_cpu_core_seconds += row.pod_limit_cpu_core_seconds;
        entry.usage_memory_byte_seconds += row.pod_usage_memory_byte_seconds;
        entry.request_memory_byte_seconds += row.pod_request_memory_byte_seconds;
        entry.limit_memory_byte_seconds += row.pod_limit_memory_byte_seconds;
        entry.effective_usage_cpu_core_seconds +=
            row.pod_usage_cpu_core_seconds.max(row.pod_request_cpu_core_seconds);
        entry.effective_usage_memory_byte_seconds +=
            row.pod_usage_memory_byte_seconds.max(row.pod_request_memory_byte_seconds);

        update_label(&mut entry.pod_labels, &merged_labels, LabelTieBreak::FirstNonEmpty);
    }

    Ok(partial)
}

/// Merge two partial aggregates (spec §4.6: "merge is associative and
/// commutative over the metric columns"). `rule` controls label
/// resolution — callers merging Mode C's out-of-order partials must pass
/// `LexicographicallySmallest`.
pub fn merge_partials(mut a: PodPartial, b: PodPartial, rule: LabelTieBreak) -> PodPartial {
    for (key, acc) in b {
        a.entry(key).or_default().merge(&acc, rule);
    }
    a
}

/// Build final output rows from a fully merged partial, enriching with
/// capacity and cost-category data.
pub fn finalize(
    partial: PodPartial,
    identity: &RunIdentity,
    node_capacity: &HashMap<(NaiveDate, String), NodeCapacity>,
    cluster_capacity: &HashMap<NaiveDate, ClusterCapacity>,
    cost_category_rules: &[CostCategoryRule],
) -> Vec<OutputRow> {
    partial
        .into_iter()
        .map(|((day, namespace, node, resource_id), acc)| {
            let node_cap = node_capacity.get(&(day, node.clone()));
            let cluster_cap = cluster_capacity.get(&day);
            let matched_rule = cost_category::match_rule(cost_category_rules, &namespace);

            OutputRow {
                source_uuid: identity.source_uuid,
                cluster_id: identity.cluster_id.clone(),
                cluster_alias: identity.cluster_alias.clone(),
                year: identity.year,
                month: identity.month,
                usage_start: day,
                usage_end: day + chrono::Duration::days(1),
                data_source: DataSource::Pod,
                namespace: Some(namespace),
                node: Some(node),
                resource_id: Some(resource_id),

                pod_usage_cpu_core_hours: Some(acc.usage_cpu_core_seconds / SECONDS_PER_HOUR),
                pod_request_cpu_core_hours: Some(acc.request_cpu_core_seconds / SECONDS_PER_HOUR),
                pod_effective_usage_cpu_core_hours: Some(
                    acc.effective_usage_cpu_core_seconds / SECONDS_PER_HOUR,
                ),
                pod_limit_cpu_core_hours: Some(acc.limit_cpu_core_seconds / SECONDS_PER_HOUR),
                pod_usage_memory_gigabyte_hours: Some(
                    acc.usage_memory_byte_seconds / SECONDS_PER_HOUR / BYTES_PER_GIGABYTE,
                ),
                pod_request_memory_gigabyte_hours: Some(
                    acc.request_memory_byte_seconds / SECONDS_PER_HOUR / BYTES_PER_GIGABYTE,
                ),
                pod_effective_usage_memory_gigabyte_hours: Some(
                    acc.effective_usage_memory_byte_seconds / SECONDS_PER_HOUR / BYTES_PER_GIGABYTE,
                ),
                pod_limit_memory_gigabyte_hours: Some(
                    acc.limit_memory_byte_seconds / SECONDS_PER_HOUR / BYTES_PER_GIGABYTE,
                ),

                node_capacity_cpu_cores: node_cap.map(|c| c.cpu_cores),
                node_capacity_cpu_core_hours: node_cap.map(|c| c.cpu_core_hours),
                node_capacity_memory_gigabytes: node_cap.map(|c| c.memory_gigabytes),
                node_capacity_memory_gigabyte_hours: node_cap.map(|c| c.memory_gigabyte_hours),
                cluster_capacity_cpu_core_hours: cluster_cap.map(|c| c.cpu_core_hours),
                cluster_capacity_memory_gigabyte_hours: cluster_cap.map(|c| c.memory_gigabyte_hours),
                pod_labels: Some(acc.pod_labels.unwrap_or_else(|| "{}".to_string())),

                persistentvolumeclaim: None,
                persistentvolume: None,
                storageclass: None,
                csi_volume_handle: None,
                persistentvolumeclaim_capacity_gigabyte_months: None,
                volume_request_storage_gigabyte_months: None,
                persistentvolumeclaim_usage_gigabyte_months: None,
                volume_labels: None,

                cost_category_id: matched_rule.map(|rule| rule.id),
            }
        })
        .collect()
}

/// Build the `(day, key) -> labels` lookups the fold step needs from raw
/// label tables, deduplicating each on its join key.
pub fn prepare_label_lookups(
    node_labels: &[LabelRow],
    namespace_labels: &[LabelRow],
) -> (
    HashMap<(NaiveDate, String), LabelsEncoding>,
    HashMap<(NaiveDate, String), LabelsEncoding>,
) {
    (
        joins::dedup_by_day_and_key(node_labels),
        joins::dedup_by_day_and_key(namespace_labels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use uuid::Uuid;

    fn identity() -> RunIdentity {
        RunIdentity {
            source_uuid: Uuid::nil(),
            cluster_id: "cluster-1".to_string(),
            cluster_alias: None,
            org_id: "org-1".to_string(),
            year: 2026,
            month: 7,
        }
    }

    fn hourly_row(hour: i64, cpu_usage_seconds: f64, cpu_request_seconds: f64) -> PodUsageRow {
        let base = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        PodUsageRow {
            interval_start: base + chrono::Duration::hours(hour),
            namespace: "ns-1".to_string(),
            node: "node-A".to_string(),
            resource_id: "res-1".to_string(),
            pod_usage_cpu_core_seconds: cpu_usage_seconds,
            pod_request_cpu_core_seconds: cpu_request_seconds,
            pod_limit_cpu_core_seconds: 0.0,
            pod_usage_memory_byte_seconds: 0.0,
            pod_request_memory_byte_seconds: 0.0,
            pod_limit_memory_byte_seconds: 0.0,
            node_capacity_cpu_core_seconds: 5.0 * SECONDS_PER_HOUR,
            node_capacity_memory_byte_seconds: 0.0,
            pod_labels: LabelsEncoding::empty(),
        }
    }

    #[test]
    fn minimal_scenario_matches_spec_example() {
        let rows: Vec<PodUsageRow> = (0..24).map(|h| hourly_row(h, 2.0 * SECONDS_PER_HOUR, 3.0 * SECONDS_PER_HOUR)).collect();
        let allow = HashSet::new();
        let partial = fold_chunk(&rows, &HashMap::new(), &HashMap::new(), &allow).unwrap();
        assert_eq!(partial.len(), 1);

        let node_caps = crate::capacity::node_capacity(&rows);
        let node_cap_lookup: HashMap<_, _> = node_caps
            .iter()
            .map(|c| ((c.day, c.node.clone()), c.clone()))
            .collect();
        let cluster_caps = crate::capacity::cluster_capacity(&node_caps);
        let cluster_cap_lookup: HashMap<_, _> = cluster_caps.iter().map(|c| (c.day, c.clone())).collect();

        let identity = identity();
        let rows_out = finalize(partial, &identity, &node_cap_lookup, &cluster_cap_lookup, &[]);
        assert_eq!(rows_out.len(), 1);
        let row = &rows_out[0];
        assert!((row.pod_usage_cpu_core_hours.unwrap() - 48.0).abs() < 1e-6);
        assert!((row.pod_request_cpu_core_hours.unwrap() - 72.0).abs() < 1e-6);
        assert!((row.pod_effective_usage_cpu_core_hours.unwrap() - 72.0).abs() < 1e-6);
        assert!((row.node_capacity_cpu_core_hours.unwrap() - 120.0).abs() < 1e-6);
        assert!((row.cluster_capacity_cpu_core_hours.unwrap() - 120.0).abs() < 1e-6);
    }

    #[test]
    fn empty_node_name_produces_no_group() {
        let mut row = hourly_row(0, 1.0, 1.0);
        row.node = String::new();
        let allow = HashSet::new();
        let partial = fold_chunk(&[row], &HashMap::new(), &HashMap::new(), &allow).unwrap();
        assert!(partial.is_empty());
    }

    #[test]
    fn merge_is_commutative_over_metrics() {
        let rows_a = vec![hourly_row(0, 10.0, 0.0)];
        let rows_b = vec![hourly_row(1, 20.0, 0.0)];
        let allow = HashSet::new();

        let pa = fold_chunk(&rows_a, &HashMap::new(), &HashMap::new(), &allow).unwrap();
        let pb = fold_chunk(&rows_b, &HashMap::new(), &HashMap::new(), &allow).unwrap();

        let merged_ab = merge_partials(pa.clone(), pb.clone(), LabelTieBreak::LexicographicallySmallest);
        let merged_ba = merge_partials(pb, pa, LabelTieBreak::LexicographicallySmallest);

        let key = merged_ab.keys().next().unwrap().clone();
        assert_eq!(
            merged_ab[&key].usage_cpu_core_seconds,
            merged_ba[&key].usage_cpu_core_seconds
        );
    }

    #[test]
    fn label_tie_break_picks_lexicographically_smallest_on_merge() {
        let mut a = PodAccumulator::default();
        a.pod_labels = Some(r#"{"z":"1"}"#.to_string());
        let mut b = PodAccumulator::default();
        b.pod_labels = Some(r#"{"a":"1"}"#.to_string());

        a.merge(&b, LabelTieBreak::LexicographicallySmallest);
        assert_eq!(a.pod_labels.as_deref(), Some(r#"{"a":"1"}"#));
    }
}
