//! Batch metadata analysis of the search candidates

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::classifier::CategoryTable;
use crate::client::{GmailClient, ProgressCallback};
use crate::config::{AnalysisConfig, MAX_BATCH_SIZE};
use crate::models::{AnalysisResult, MessageMetadata, MessageRef, MessageSummary};

/// Fetches metadata for candidates in bounded chunks and aggregates it
///
/// Chunks run one after another. Inside a chunk every fetch is issued
/// concurrently and the whole chunk is collected before the next starts.
pub struct BatchAnalyzer<'a, C: GmailClient + ?Sized> {
    client: &'a C,
    categories: &'a CategoryTable,
    batch_size: usize,
    concurrency: usize,
    on_progress: Option<ProgressCallback>,
}

impl<'a, C: GmailClient + ?Sized> BatchAnalyzer<'a, C> {
    pub fn new(client: &'a C, categories: &'a CategoryTable) -> Self {
        Self {
            client,
            categories,
            batch_size: MAX_BATCH_SIZE,
            concurrency: MAX_BATCH_SIZE,
            on_progress: None,
        }
    }

    pub fn from_config(client: &'a C, categories: &'a CategoryTable, config: &AnalysisConfig) -> Self {
        Self::new(client, categories)
            .with_batch_size(config.batch_size)
            .with_concurrency(config.max_concurrent_requests)
    }

    /// Chunk size, clamped to 1..=100
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub async fn analyze(&self, refs: &[MessageRef]) -> AnalysisResult {
        let mut result = AnalysisResult::new(refs.len());
        let chunk_count = (refs.len() + self.batch_size - 1) / self.batch_size;

        info!(
            "Analyzing {} messages in {} batches of up to {}",
            refs.len(),
            chunk_count,
            self.batch_size
        );

        for (index, chunk) in refs.chunks(self.batch_size).enumerate() {
            debug!("Batch {}/{}: {} messages", index + 1, chunk_count, chunk.len());

            let fetched: Vec<(&MessageRef, crate::error::Result<MessageMetadata>)> =
                stream::iter(chunk)
                    .map(|message| async move {
                        let outcome = self.client.get_message_metadata(message.id()).await;
                        if let Some(cb) = &self.on_progress {
                            cb();
                        }
                        (message, outcome)
                    })
                    .buffer_unordered(self.concurrency)
                    .collect()
                    .await;

            for (message, outcome) in fetched {
                match outcome {
                    Ok(metadata) => result.record(self.summarize(metadata)),
                    Err(e) => {
                        warn!("Failed to fetch metadata for message {}: {}", message, e);
                        result.record_failure(message.id());
                    }
                }
            }
        }

        if !result.failed_ids.is_empty() {
            warn!(
                "{} of {} messages could not be analyzed",
                result.failed_ids.len(),
                result.candidates
            );
        }
        info!(
            "Analyzed {} messages, {} bytes total",
            result.analyzed(),
            result.total_size
        );

        result
    }

    fn summarize(&self, metadata: MessageMetadata) -> MessageSummary {
        let category = self.categories.classify(&metadata.label_ids);
        MessageSummary {
            id: metadata.id,
            size: metadata.size_estimate,
            category,
            from: metadata.from,
            subject: metadata.subject,
            date: metadata.date,
            unsubscribe: metadata.list_unsubscribe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GmailError, Result};
    use crate::models::MailCategory;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Serves metadata from ids; ids listed in `failing` return an error
    #[derive(Default)]
    struct StubClient {
        failing: HashSet<String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GmailClient for StubClient {
        async fn list_message_ids(&self, _query: &str, _max: u32) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(id.to_string());

            if self.failing.contains(id) {
                return Err(GmailError::MessageNotFound(id.to_string()));
            }
            Ok(MessageMetadata {
                id: id.to_string(),
                size_estimate: id.trim_start_matches('m').parse().unwrap_or(1),
                label_ids: vec!["CATEGORY_SOCIAL".to_string()],
                from: Some(format!("sender-{}@example.com", id)),
                ..Default::default()
            })
        }

        async fn trash_message(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn refs(count: usize) -> Vec<MessageRef> {
        (1..=count).map(|i| MessageRef::new(format!("m{}", i))).collect()
    }

    #[tokio::test]
    async fn test_analyze_totals_and_classifies() {
        let client = StubClient::default();
        let table = CategoryTable::default();

        let result = BatchAnalyzer::new(&client, &table).analyze(&refs(3)).await;

        assert_eq!(result.candidates, 3);
        assert_eq!(result.analyzed(), 3);
        assert_eq!(result.total_size, 1 + 2 + 3);
        assert!(result.samples.iter().all(|s| s.category == MailCategory::Social));
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_analyze_skips_failed_items() {
        let client = StubClient {
            failing: ["m2".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let table = CategoryTable::default();

        let result = BatchAnalyzer::new(&client, &table).analyze(&refs(3)).await;

        assert_eq!(result.analyzed(), 2);
        assert_eq!(result.total_size, 1 + 3);
        assert_eq!(result.failed_ids, vec!["m2".to_string()]);
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn test_analyze_chunks_are_sequential() {
        let client = StubClient::default();
        let table = CategoryTable::default();

        let result = BatchAnalyzer::new(&client, &table)
            .with_batch_size(2)
            .analyze(&refs(5))
            .await;
        assert_eq!(result.analyzed(), 5);

        // Each chunk finishes before the next one starts
        let order = client.order.lock().unwrap().clone();
        let position = |id: &str| order.iter().position(|o| o == id).unwrap();
        for first_chunk in ["m1", "m2"] {
            for later in ["m3", "m4", "m5"] {
                assert!(position(first_chunk) < position(later));
            }
        }
        assert!(client.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let client = StubClient::default();
        let table = CategoryTable::default();

        BatchAnalyzer::new(&client, &table)
            .with_concurrency(3)
            .analyze(&refs(20))
            .await;

        assert!(client.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_progress_called_per_item() {
        let client = StubClient {
            failing: ["m1".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let table = CategoryTable::default();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        BatchAnalyzer::new(&client, &table)
            .with_progress(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .analyze(&refs(4))
            .await;

        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_analyze_empty() {
        let client = StubClient::default();
        let table = CategoryTable::default();

        let result = BatchAnalyzer::new(&client, &table).analyze(&[]).await;
        assert_eq!(result.candidates, 0);
        assert_eq!(result.total_size, 0);
        assert!(client.order.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let client = StubClient::default();
        let table = CategoryTable::default();

        assert_eq!(BatchAnalyzer::new(&client, &table).with_batch_size(500).batch_size, 100);
        assert_eq!(BatchAnalyzer::new(&client, &table).with_batch_size(0).batch_size, 1);
    }
}
