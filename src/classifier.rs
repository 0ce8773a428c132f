//! Category classification from Gmail label identifiers

use crate::config::CategoryRule;
use crate::models::MailCategory;

/// Ordered label -> category lookup table
///
/// Entries are checked in table order, so when a message carries several
/// category labels the earliest table entry decides.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
}

impl CategoryTable {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn classify<S: AsRef<str>>(&self, label_ids: &[S]) -> MailCategory {
        self.rules
            .iter()
            .find(|rule| label_ids.iter().any(|label| label.as_ref() == rule.label_id))
            .map(|rule| rule.category)
            .unwrap_or_default()
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(crate::config::Config::default().categories)
    }
}
