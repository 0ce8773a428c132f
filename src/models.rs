use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a message returned by the search stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(String);

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Metadata returned by a `format=metadata` message fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    pub size_estimate: u64,
    pub label_ids: Vec<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub list_unsubscribe: Option<String>,
}

/// Human-readable category derived from Gmail's category labels
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum MailCategory {
    Promotions,
    Social,
    Updates,
    Forums,
    Personal,
    #[default]
    General,
}

impl MailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailCategory::Promotions => "Promotions",
            MailCategory::Social => "Social",
            MailCategory::Updates => "Updates",
            MailCategory::Forums => "Forums",
            MailCategory::Personal => "Personal",
            MailCategory::General => "General",
        }
    }
}

impl fmt::Display for MailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message summary built during batch analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub size: u64,
    pub category: MailCategory,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub unsubscribe: Option<String>,
}

/// Aggregate of one analysis run
///
/// `total_size` and `samples` only reflect messages whose metadata was
/// fetched successfully; `failed_ids` lists the candidates that were not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    pub total_size: u64,
    pub samples: Vec<MessageSummary>,
    pub candidates: usize,
    pub failed_ids: Vec<String>,
}

impl AnalysisResult {
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    /// Fold one successfully fetched summary into the totals
    pub fn record(&mut self, summary: MessageSummary) {
        self.total_size += summary.size;
        self.samples.push(summary);
    }

    pub fn record_failure(&mut self, id: impl Into<String>) {
        self.failed_ids.push(id.into());
    }

    pub fn analyzed(&self) -> usize {
        self.samples.len()
    }

    /// True when some candidates are missing from the statistics
    pub fn is_partial(&self) -> bool {
        self.analyzed() < self.candidates
    }
}
