//! Search filter construction from the protected-label safety rules

use std::collections::HashSet;
use std::fmt;

use crate::config::SearchConfig;

/// Gmail search string, assembled once per run and never modified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchFilter(String);

impl SearchFilter {
    /// Append one `-label:` clause per protected label to `base`.
    ///
    /// Labels keep their given order; repeats collapse to the first
    /// occurrence. Names containing whitespace are quoted.
    pub fn build<S: AsRef<str>>(base: &str, protected_labels: &[S]) -> Self {
        let mut query = base.trim().to_string();
        let mut seen = HashSet::new();

        for label in protected_labels {
            let label = label.as_ref().trim();
            if label.is_empty() || !seen.insert(label) {
                continue;
            }

            if label.chars().any(char::is_whitespace) {
                query.push_str(&format!(" -label:\"{}\"", label));
            } else {
                query.push_str(&format!(" -label:{}", label));
            }
        }

        Self(query)
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::build(&config.base_query, &config.protected_labels)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str =
        "is:unread older_than:1y -is:starred -is:important -in:drafts -in:spam -in:trash";

    #[test]
    fn test_build_appends_one_clause_per_label() {
        let filter = SearchFilter::build(BASE, &["Keep", "Tax"]);

        assert!(filter.as_str().starts_with(BASE));
        assert_eq!(filter.as_str().matches("-label:Keep").count(), 1);
        assert_eq!(filter.as_str().matches("-label:Tax").count(), 1);
        assert_eq!(
            filter.as_str(),
            format!("{} -label:Keep -label:Tax", BASE)
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = SearchFilter::build(BASE, &["Keep", "Tax"]);
        let second = SearchFilter::build(BASE, &["Keep", "Tax"]);
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_build_collapses_duplicates() {
        let filter = SearchFilter::build(BASE, &["Keep", "Tax", "Keep"]);
        assert_eq!(filter.as_str().matches("-label:Keep").count(), 1);
    }

    #[test]
    fn test_build_quotes_labels_with_spaces() {
        let filter = SearchFilter::build("is:unread", &["Tax Docs"]);
        assert_eq!(filter.as_str(), "is:unread -label:\"Tax Docs\"");
    }

    #[test]
    fn test_build_without_labels_is_base() {
        let filter = SearchFilter::build(BASE, &[] as &[&str]);
        assert_eq!(filter.as_str(), BASE);
    }

    #[test]
    fn test_from_config_uses_default_rules() {
        let filter = SearchFilter::from_config(&SearchConfig::default());
        for label in ["Keep", "Tax", "Receipts", "Legal", "School", "Work", "Banking"] {
            assert_eq!(
                filter.as_str().matches(&format!("-label:{}", label)).count(),
                1,
                "missing clause for {}",
                label
            );
        }
    }

    proptest! {
        #[test]
        fn prop_every_label_excluded_exactly_once(
            labels in proptest::collection::vec("[A-Za-z][A-Za-z0-9_]{0,10}", 0..8)
        ) {
            let filter = SearchFilter::build("is:unread", &labels);
            let clauses: Vec<&str> = filter.as_str().split(' ').filter(|c| c.starts_with("-label:")).collect();
            let unique: HashSet<&String> = labels.iter().collect();

            prop_assert_eq!(clauses.len(), unique.len());
            for label in &labels {
                let clause = format!("-label:{}", label);
                prop_assert_eq!(clauses.iter().filter(|c| **c == clause).count(), 1);
            }
            prop_assert_eq!(filter.clone(), SearchFilter::build("is:unread", &labels));
        }
    }
}
