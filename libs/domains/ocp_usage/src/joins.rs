//! Label-table deduplication shared by the pod aggregator's node/namespace
//! joins.
//!
//! Spec §4.4 step 3: "both label relations are deduplicated on their join
//! keys keeping the first occurrence; this prevents the join from
//! exploding the row count." Keying by `(day, key)` rather than the raw
//! `interval_start` collapses same-day duplicates regardless of which
//! hourly interval happened to be read first.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::input::LabelRow;
use crate::labels::LabelsEncoding;

/// Build a `(day, key) -> labels` lookup, keeping the first row seen for
/// each key (input order is whatever the reader yielded it in).
pub fn dedup_by_day_and_key(rows: &[LabelRow]) -> HashMap<(NaiveDate, String), LabelsEncoding> {
    let mut map = HashMap::new();
    for row in rows {
        let day = row.interval_start.date();
        map.entry((day, row.key.clone()))
            .or_insert_with(|| row.labels.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn keeps_first_occurrence_per_day_and_key() {
        let t0 = NaiveDateTime::parse_from_str("2026-07-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let t1 = NaiveDateTime::parse_from_str("2026-07-01 01:00:00", "%Y-%m-%d %H:%M:%S").unwrap();

        let rows = vec![
            LabelRow {
                interval_start: t0,
                key: "node-A".to_string(),
                labels: LabelsEncoding::JsonText(Some(r#"{"a":"1"}"#.to_string())),
            },
            LabelRow {
                interval_start: t1,
                key: "node-A".to_string(),
                labels: LabelsEncoding::JsonText(Some(r#"{"a":"2"}"#.to_string())),
            },
        ];

        let deduped = dedup_by_day_and_key(&rows);
        assert_eq!(deduped.len(), 1);
        let labels = deduped.get(&(t0.date(), "node-A".to_string())).unwrap();
        assert_eq!(labels.decode().unwrap().get("a"), Some(&"1".to_string()));
    }
}
