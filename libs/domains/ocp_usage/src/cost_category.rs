//! Cost category matching: a row's `namespace` is matched against a set of
//! wildcard patterns, and the highest-`id` matching rule wins.
//!
//! Only `*` is treated as a wildcard (spec §9 open question: `?` support is
//! unconfirmed in the source, so it is deliberately not implemented here).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostCategoryRule {
    pub id: i32,
    pub namespace_pattern: String,
}

/// Return the matching rule with the highest `id`, or `None` if no rule's
/// pattern matches `namespace`.
pub fn match_rule<'a>(rules: &'a [CostCategoryRule], namespace: &str) -> Option<&'a CostCategoryRule> {
    rules
        .iter()
        .filter(|rule| glob_match::glob_match(&rule.namespace_pattern, namespace))
        .max_by_key(|rule| rule.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_star_matches_any_sequence() {
        let rules = vec![CostCategoryRule {
            id: 1,
            namespace_pattern: "kube-*".to_string(),
        }];
        assert!(match_rule(&rules, "kube-system").is_some());
        assert!(match_rule(&rules, "default").is_none());
    }

    #[test]
    fn tie_break_picks_max_id() {
        let rules = vec![
            CostCategoryRule { id: 1, namespace_pattern: "*".to_string() },
            CostCategoryRule { id: 5, namespace_pattern: "prod-*".to_string() },
            CostCategoryRule { id: 3, namespace_pattern: "prod-*".to_string() },
        ];
        let matched = match_rule(&rules, "prod-billing").unwrap();
        assert_eq!(matched.id, 5);
    }

    #[test]
    fn no_rule_matches_returns_none() {
        let rules = vec![CostCategoryRule { id: 1, namespace_pattern: "prod-*".to_string() }];
        assert!(match_rule(&rules, "staging").is_none());
    }
}
