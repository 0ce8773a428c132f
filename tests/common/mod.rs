//! Common test utilities and fixtures
#![allow(dead_code)]

use gmail_cleanup::cli::ProgressReporter;
use gmail_cleanup::client::GmailClient;
use gmail_cleanup::error::Result;
use gmail_cleanup::models::{MessageMetadata, MessageRef};
use indicatif::{MultiProgress, ProgressDrawTarget};
use mockall::mock;
use serde_json::json;

/// Create test metadata with the given size and label ids
pub fn create_test_metadata(id: &str, size: u64, labels: &[&str], from: &str) -> MessageMetadata {
    MessageMetadata {
        id: id.to_string(),
        size_estimate: size,
        label_ids: labels.iter().map(|l| l.to_string()).collect(),
        from: Some(from.to_string()),
        subject: Some(format!("Subject of {}", id)),
        date: Some("Mon, 1 Jan 2024 10:00:00 -0800".to_string()),
        list_unsubscribe: None,
    }
}

pub fn message_refs(ids: &[&str]) -> Vec<MessageRef> {
    ids.iter().map(|id| MessageRef::from(*id)).collect()
}

/// Create mock Gmail API message response (JSON) for a metadata fetch
pub fn mock_gmail_metadata_response(
    id: &str,
    size: i32,
    labels: &[&str],
    from: &str,
    unsubscribe: Option<&str>,
) -> serde_json::Value {
    let mut headers = vec![
        json!({"name": "From", "value": from}),
        json!({"name": "Subject", "value": format!("Subject of {}", id)}),
        json!({"name": "Date", "value": "Mon, 1 Jan 2024 10:00:00 -0800"}),
    ];
    if let Some(value) = unsubscribe {
        headers.push(json!({"name": "List-Unsubscribe", "value": value}));
    }

    json!({
        "id": id,
        "threadId": format!("thread_{}", id),
        "labelIds": labels,
        "sizeEstimate": size,
        "payload": { "headers": headers }
    })
}

/// Reporter whose bars are never drawn
pub fn quiet_reporter() -> ProgressReporter {
    ProgressReporter::with_multi_progress(MultiProgress::with_draw_target(
        ProgressDrawTarget::hidden(),
    ))
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;
        async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata>;
        async fn trash_message(&self, id: &str) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_metadata() {
        let msg = create_test_metadata("msg1", 100, &["CATEGORY_SOCIAL"], "a@example.com");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.size_estimate, 100);
        assert_eq!(msg.label_ids, vec!["CATEGORY_SOCIAL"]);
    }

    #[test]
    fn test_mock_gmail_metadata_response() {
        let response = mock_gmail_metadata_response(
            "msg1",
            1234,
            &["UNREAD"],
            "test@example.com",
            Some("<https://example.com/u>"),
        );
        assert_eq!(response["id"], "msg1");
        assert_eq!(response["sizeEstimate"], 1234);
        assert_eq!(response["payload"]["headers"].as_array().unwrap().len(), 4);
    }
}
