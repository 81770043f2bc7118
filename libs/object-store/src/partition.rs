//! Partition path layout: `data/<org-id>/OCP/source=<source-uuid>/year=<yyyy>/month=<mm>/day=<dd>/<table-name>/...`
//!
//! The day-level directories are not enumerated individually: the object
//! store's `list` already returns every object nested under a prefix, so
//! listing the month-level prefix once and filtering by table name covers
//! every day in one round trip.

use object_store::path::Path as ObjectPath;
use strum::{Display, EnumIter};

/// The upstream provider type segment in the partition path. This engine
/// only ever reads OpenShift usage data (see spec non-goal: no
/// cross-provider joins), so the segment is fixed rather than configurable.
const PROVIDER_KIND: &str = "OCP";

/// The four source tables the aggregator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Table {
    #[strum(serialize = "openshift_pod_usage_line_items")]
    PodUsage,
    #[strum(serialize = "openshift_storage_usage_line_items_daily")]
    StorageUsageDaily,
    #[strum(serialize = "openshift_node_labels_line_items")]
    NodeLabels,
    #[strum(serialize = "openshift_namespace_labels_line_items")]
    NamespaceLabels,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::PodUsage => "openshift_pod_usage_line_items",
            Table::StorageUsageDaily => "openshift_storage_usage_line_items_daily",
            Table::NodeLabels => "openshift_node_labels_line_items",
            Table::NamespaceLabels => "openshift_namespace_labels_line_items",
        }
    }
}

/// Identifies which source, org, and billing period a set of partitioned
/// files belongs to. Mirrors `core_config::identity::RunIdentity` but only
/// carries the fields the partition path itself encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionScope {
    pub org_id: String,
    pub source_uuid: uuid::Uuid,
    pub year: i32,
    pub month: u32,
}

impl PartitionScope {
    pub fn new(org_id: impl Into<String>, source_uuid: uuid::Uuid, year: i32, month: u32) -> Self {
        Self {
            org_id: org_id.into(),
            source_uuid,
            year,
            month,
        }
    }

    /// The month-level prefix every file for this scope lives under,
    /// regardless of table or day.
    pub fn month_prefix(&self) -> ObjectPath {
        ObjectPath::from(format!(
            "data/{org}/{provider}/source={source}/year={year:04}/month={month:02}",
            org = self.org_id,
            provider = PROVIDER_KIND,
            source = self.source_uuid,
            year = self.year,
            month = self.month,
        ))
    }

    /// Whether `path` belongs to `table` within this scope: it falls under
    /// this scope's month prefix and has a path segment matching the
    /// table's directory name.
    pub fn matches_table(&self, path: &ObjectPath, table: Table) -> bool {
        let path_str = path.as_ref();
        path_str.starts_with(self.month_prefix().as_ref())
            && path_str
                .split('/')
                .any(|segment| segment == table.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_prefix_is_zero_padded() {
        let scope = PartitionScope::new("org-1", uuid::Uuid::nil(), 2026, 3);
        assert_eq!(
            scope.month_prefix().as_ref(),
            "data/org-1/OCP/source=00000000-0000-0000-0000-000000000000/year=2026/month=03"
        );
    }

    #[test]
    fn matches_table_checks_prefix_and_table_segment() {
        let scope = PartitionScope::new("org-1", uuid::Uuid::nil(), 2026, 3);
        let path = ObjectPath::from(format!(
            "{}/day=05/openshift_pod_usage_line_items/part-0.parquet",
            scope.month_prefix()
        ));
        assert!(scope.matches_table(&path, Table::PodUsage));
        assert!(!scope.matches_table(&path, Table::StorageUsageDaily));
    }

    #[test]
    fn matches_table_rejects_other_scopes() {
        let scope = PartitionScope::new("org-1", uuid::Uuid::nil(), 2026, 3);
        let other_month = ObjectPath::from(
            "data/org-1/OCP/source=00000000-0000-0000-0000-000000000000/year=2026/month=04/day=01/openshift_pod_usage_line_items/part-0.parquet",
        );
        assert!(!scope.matches_table(&other_month, Table::PodUsage));
    }
}
