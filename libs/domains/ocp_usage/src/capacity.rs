//! Per-node and per-cluster daily capacity, derived from the capacity
//! columns carried on every pod-usage row.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::input::PodUsageRow;

const SECONDS_PER_HOUR: f64 = 3600.0;
const BYTES_PER_GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;
const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCapacity {
    pub day: NaiveDate,
    pub node: String,
    pub cpu_core_hours: f64,
    pub cpu_cores: f64,
    pub memory_gigabyte_hours: f64,
    pub memory_gigabytes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCapacity {
    pub day: NaiveDate,
    pub cpu_core_hours: f64,
    pub memory_gigabyte_hours: f64,
}

/// Compute per-node daily capacity from raw pod-usage rows.
///
/// Rows with an empty `node` are excluded. Within a (day, node,
/// interval_start) group, the reported capacity is de-duplicated by MAX
/// (every pod on that node reports the same capacity for a given interval,
/// so summing would overcount by a factor of "pods on the node").
pub fn node_capacity(rows: &[PodUsageRow]) -> Vec<NodeCapacity> {
    let mut per_interval: HashMap<(NaiveDate, String, chrono::NaiveDateTime), (f64, f64)> =
        HashMap::new();

    for row in rows {
        if row.node.is_empty() {
            continue;
        }
        let day = row.interval_start.date();
        let key = (day, row.node.clone(), row.interval_start);
        let entry = per_interval.entry(key).or_insert((0.0, 0.0));
        entry.0 = entry.0.max(row.node_capacity_cpu_core_seconds);
        entry.1 = entry.1.max(row.node_capacity_memory_byte_seconds);
    }

    let mut per_day_node: HashMap<(NaiveDate, String), (f64, f64)> = HashMap::new();
    for ((day, node, _interval), (cpu_seconds, mem_bytes)) in per_interval {
        let entry = per_day_node.entry((day, node)).or_insert((0.0, 0.0));
        entry.0 += cpu_seconds;
        entry.1 += mem_bytes;
    }

    per_day_node
        .into_iter()
        .map(|((day, node), (cpu_seconds, mem_bytes))| {
            let cpu_core_hours = cpu_seconds / SECONDS_PER_HOUR;
            let memory_gigabyte_hours = mem_bytes / BYTES_PER_GIGABYTE;
            NodeCapacity {
                day,
                node,
                cpu_core_hours,
                cpu_cores: cpu_core_hours / HOURS_PER_DAY,
                memory_gigabyte_hours,
                memory_gigabytes: memory_gigabyte_hours / HOURS_PER_DAY,
            }
        })
        .collect()
}

/// Sum per-node capacities into a per-cluster daily total.
pub fn cluster_capacity(node_capacities: &[NodeCapacity]) -> Vec<ClusterCapacity> {
    let mut per_day: HashMap<NaiveDate, (f64, f64)> = HashMap::new();

    for capacity in node_capacities {
        let entry = per_day.entry(capacity.day).or_insert((0.0, 0.0));
        entry.0 += capacity.cpu_core_hours;
        entry.1 += capacity.memory_gigabyte_hours;
    }

    per_day
        .into_iter()
        .map(|(day, (cpu_core_hours, memory_gigabyte_hours))| ClusterCapacity {
            day,
            cpu_core_hours,
            memory_gigabyte_hours,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelsEncoding;
    use chrono::NaiveDateTime;

    fn sample_row(interval_start: NaiveDateTime, node: &str, cap_cpu_seconds: f64, cap_mem_bytes: f64) -> PodUsageRow {
        PodUsageRow {
            interval_start,
            namespace: "ns-1".to_string(),
            node: node.to_string(),
            resource_id: "res-1".to_string(),
            pod_usage_cpu_core_seconds: 0.0,
            pod_request_cpu_core_seconds: 0.0,
            pod_limit_cpu_core_seconds: 0.0,
            pod_usage_memory_byte_seconds: 0.0,
            pod_request_memory_byte_seconds: 0.0,
            pod_limit_memory_byte_seconds: 0.0,
            node_capacity_cpu_core_seconds: cap_cpu_seconds,
            node_capacity_memory_byte_seconds: cap_mem_bytes,
            pod_labels: LabelsEncoding::empty(),
        }
    }

    #[test]
    fn minimal_scenario_yields_120_core_hours_for_24_hourly_samples() {
        let base = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let five_cores_seconds = 5.0 * SECONDS_PER_HOUR;
        let five_gib_bytes = 5.0 * BYTES_PER_GIGABYTE;

        let rows: Vec<PodUsageRow> = (0..24)
            .map(|hour| sample_row(base + chrono::Duration::hours(hour), "node-A", five_cores_seconds, five_gib_bytes))
            .collect();

        let node_caps = node_capacity(&rows);
        assert_eq!(node_caps.len(), 1);
        assert!((node_caps[0].cpu_core_hours - 120.0).abs() < 1e-6);

        let cluster_caps = cluster_capacity(&node_caps);
        assert_eq!(cluster_caps.len(), 1);
        assert!((cluster_caps[0].cpu_core_hours - 120.0).abs() < 1e-6);
    }

    #[test]
    fn empty_node_name_is_excluded() {
        let base = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let rows = vec![sample_row(base, "", 100.0, 100.0)];
        assert!(node_capacity(&rows).is_empty());
    }

    #[test]
    fn repeated_reports_within_an_interval_are_deduplicated_by_max() {
        let base = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        // Two pods on the same node report the same capacity for the same interval.
        let rows = vec![
            sample_row(base, "node-A", 3600.0, 0.0),
            sample_row(base, "node-A", 3600.0, 0.0),
        ];
        let caps = node_capacity(&rows);
        assert_eq!(caps.len(), 1);
        assert!((caps[0].cpu_core_hours - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cluster_capacity_equals_sum_of_node_capacities_per_day() {
        let base = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let rows = vec![
            sample_row(base, "node-A", 3600.0, 0.0),
            sample_row(base, "node-B", 7200.0, 0.0),
        ];
        let node_caps = node_capacity(&rows);
        let cluster_caps = cluster_capacity(&node_caps);
        assert_eq!(cluster_caps.len(), 1);
        assert!((cluster_caps[0].cpu_core_hours - 3.0).abs() < 1e-6);
    }
}
