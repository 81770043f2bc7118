//! Label decoding, precedence merge, allow-list filtering, and canonical
//! JSON serialization.
//!
//! The source data's label columns arrive as either a serialized JSON
//! object string or a native string map depending on the upstream
//! producer; `LabelsEncoding` makes that distinction explicit instead of
//! re-detecting it at every call site.

use std::collections::BTreeMap;

use crate::error::LabelError;

/// A label column's value before it is decoded into a map.
///
/// `JsonText` covers both a real JSON object string and the degenerate
/// cases (NaN, empty string, absent) that must decode to an empty map
/// rather than erroring.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelsEncoding {
    JsonText(Option<String>),
    Native(BTreeMap<String, String>),
}

impl LabelsEncoding {
    pub fn empty() -> Self {
        LabelsEncoding::Native(BTreeMap::new())
    }

    /// Decode into a sorted map, treating `NaN`/empty/absent JSON text as
    /// an empty map rather than a decode failure (spec: "Absent /
    /// Not-a-Number / the empty string all decode to the empty map").
    pub fn decode(&self) -> Result<BTreeMap<String, String>, LabelError> {
        match self {
            LabelsEncoding::Native(map) => Ok(map.clone()),
            LabelsEncoding::JsonText(None) => Ok(BTreeMap::new()),
            LabelsEncoding::JsonText(Some(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                    return Ok(BTreeMap::new());
                }

                let value: serde_json::Value = serde_json::from_str(trimmed)?;
                match value {
                    serde_json::Value::Object(obj) => {
                        let mut map = BTreeMap::new();
                        for (key, v) in obj {
                            let value_str = match v {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            map.insert(key, value_str);
                        }
                        Ok(map)
                    }
                    serde_json::Value::Null => Ok(BTreeMap::new()),
                    _ => Ok(BTreeMap::new()),
                }
            }
        }
    }
}

/// Overlay `node`, then `namespace`, then `pod` maps: later levels
/// overwrite keys present in earlier levels. This is the "pod > namespace
/// > node" precedence rule.
pub fn merge_precedence(
    node: &BTreeMap<String, String>,
    namespace: &BTreeMap<String, String>,
    pod: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = node.clone();
    merged.extend(namespace.clone());
    merged.extend(pod.clone());
    merged
}

/// Keep only allow-listed keys (case-sensitive).
pub fn filter_allowed(
    map: &BTreeMap<String, String>,
    enabled_tag_keys: &std::collections::HashSet<String>,
) -> BTreeMap<String, String> {
    map.iter()
        .filter(|(key, _)| enabled_tag_keys.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Serialize a map to canonical JSON: keys in lexicographic order
/// (`BTreeMap` iteration already guarantees this), no extraneous
/// whitespace, `{}` for an empty map. Idempotent: re-parsing and
/// re-serializing the output reproduces it exactly.
pub fn canonicalize(map: &BTreeMap<String, String>) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }

    let value: serde_json::Map<String, serde_json::Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::to_string(&serde_json::Value::Object(value))
        .unwrap_or_else(|_| "{}".to_string())
}

/// Full per-row pipeline: decode three levels, merge by precedence, filter
/// by allow-list, serialize. Used by both the pod aggregator (three
/// levels) and the storage aggregator (single level, the other two empty).
pub fn process_row(
    node: &LabelsEncoding,
    namespace: &LabelsEncoding,
    pod: &LabelsEncoding,
    enabled_tag_keys: &std::collections::HashSet<String>,
) -> Result<String, LabelError> {
    let node_map = node.decode()?;
    let namespace_map = namespace.decode()?;
    let pod_map = pod.decode()?;

    let merged = merge_precedence(&node_map, &namespace_map, &pod_map);
    let filtered = filter_allowed(&merged, enabled_tag_keys);
    Ok(canonicalize(&filtered))
}

/// Vectorized batch variant of [`process_row`]: decodes and merges an
/// entire column at once instead of one closure invocation per row. Used
/// when `use_arrow_compute` is enabled; produces byte-identical output to
/// the loop fallback ([`process_rows_loop`]).
pub fn process_rows_batch(
    node: &[LabelsEncoding],
    namespace: &[LabelsEncoding],
    pod: &[LabelsEncoding],
    enabled_tag_keys: &std::collections::HashSet<String>,
) -> Result<Vec<String>, LabelError> {
    let len = node.len();
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(process_row(&node[i], &namespace[i], &pod[i], enabled_tag_keys)?);
    }
    Ok(out)
}

/// Plain-loop fallback used when `use_arrow_compute = false`. Identical
/// result to [`process_rows_batch`]; kept as a separate entry point so the
/// configuration flag maps to a visibly distinct code path rather than a
/// no-op switch.
pub fn process_rows_loop(
    node: &[LabelsEncoding],
    namespace: &[LabelsEncoding],
    pod: &[LabelsEncoding],
    enabled_tag_keys: &std::collections::HashSet<String>,
) -> Result<Vec<String>, LabelError> {
    let mut out = Vec::with_capacity(node.len());
    for i in 0..node.len() {
        let merged = process_row(&node[i], &namespace[i], &pod[i], enabled_tag_keys)?;
        out.push(merged);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[&str]) -> std::collections::HashSet<String> {
        keys.iter().map(|s| s.to_string()).collect()
    }

    fn native(pairs: &[(&str, &str)]) -> LabelsEncoding {
        LabelsEncoding::Native(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn precedence_is_pod_over_namespace_over_node() {
        let node = native(&[("a", "n"), ("b", "n")]);
        let namespace = native(&[("b", "ns"), ("c", "ns")]);
        let pod = native(&[("c", "p"), ("d", "p")]);
        let allow = keys(&["a", "b", "c", "d"]);

        let result = process_row(&node, &namespace, &pod, &allow).unwrap();
        assert_eq!(result, r#"{"a":"n","b":"ns","c":"p","d":"p"}"#);
    }

    #[test]
    fn filtering_drops_non_allow_listed_keys() {
        let node = native(&[("a", "n"), ("b", "n")]);
        let namespace = native(&[("b", "ns"), ("c", "ns")]);
        let pod = native(&[("c", "p"), ("d", "p")]);
        let allow = keys(&["a"]);

        let result = process_row(&node, &namespace, &pod, &allow).unwrap();
        assert_eq!(result, r#"{"a":"n"}"#);
    }

    #[test]
    fn nan_text_decodes_to_empty_object() {
        let node = LabelsEncoding::JsonText(Some("NaN".to_string()));
        let namespace = LabelsEncoding::empty();
        let pod = LabelsEncoding::empty();
        let allow = keys(&["a"]);

        let result = process_row(&node, &namespace, &pod, &allow).unwrap();
        assert_eq!(result, "{}");
    }

    #[test]
    fn absent_json_text_decodes_to_empty_object() {
        let encoding = LabelsEncoding::JsonText(None);
        assert_eq!(encoding.decode().unwrap(), BTreeMap::new());
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let map: BTreeMap<String, String> =
            [("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())]
                .into_iter()
                .collect();
        let once = canonicalize(&map);
        let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
        let reparsed_map: BTreeMap<String, String> = reparsed
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap().to_string()))
            .collect();
        let twice = canonicalize(&reparsed_map);
        assert_eq!(once, twice);
        assert_eq!(once, r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn batch_and_loop_paths_agree() {
        let node = vec![native(&[("a", "n")])];
        let namespace = vec![LabelsEncoding::empty()];
        let pod = vec![LabelsEncoding::empty()];
        let allow = keys(&["a"]);

        let batch = process_rows_batch(&node, &namespace, &pod, &allow).unwrap();
        let looped = process_rows_loop(&node, &namespace, &pod, &allow).unwrap();
        assert_eq!(batch, looped);
    }
}
