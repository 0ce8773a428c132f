//! Gmail API client used by the cleanup pipeline

use async_trait::async_trait;
use google_gmail1::api::Message;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::auth::{GmailHub, MODIFY_SCOPE};
use crate::error::{GmailError, Result};
use crate::models::MessageMetadata;
use crate::rate_limiter::{QuotaCost, QuotaRateLimiter, QuotaStats};

/// Invoked once per finished item of a bulk operation
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Headers requested with every metadata fetch
pub const METADATA_HEADERS: [&str; 4] = ["From", "Subject", "Date", "List-Unsubscribe"];

/// Provider operations the pipeline depends on
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List at most `max_results` message ids matching `query` (one page, no pagination)
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;

    /// Fetch size estimate, label ids and the metadata headers of one message
    async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata>;

    /// Move one message to trash
    async fn trash_message(&self, id: &str) -> Result<()>;
}

/// Production Gmail client
///
/// A semaphore bounds the requests in flight and a quota token bucket paces
/// them. No retries happen here; failures go straight back to the caller.
pub struct ProductionGmailClient {
    hub: GmailHub,
    in_flight: Arc<Semaphore>,
    quota: QuotaRateLimiter,
}

impl ProductionGmailClient {
    /// # Arguments
    /// * `hub` - Authenticated Gmail hub
    /// * `max_concurrent` - Maximum requests in flight at once
    pub fn new(hub: GmailHub, max_concurrent: usize) -> Self {
        Self::with_quota(hub, max_concurrent, QuotaRateLimiter::new())
    }

    pub fn with_quota(hub: GmailHub, max_concurrent: usize, quota: QuotaRateLimiter) -> Self {
        Self {
            hub,
            in_flight: Arc::new(Semaphore::new(max_concurrent.max(1))),
            quota,
        }
    }

    /// Quota used by this client so far
    pub async fn quota_stats(&self) -> QuotaStats {
        self.quota.stats().await
    }

    /// Email address of the authenticated account
    pub async fn account_email(&self) -> Result<String> {
        self.quota.acquire(QuotaCost::Profile).await;
        let (_, profile) = self
            .hub
            .users()
            .get_profile("me")
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;
        Ok(profile.email_address.unwrap_or_default())
    }

    async fn acquire(&self, cost: QuotaCost) -> Result<tokio::sync::SemaphorePermit<'_>> {
        let permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| GmailError::Unknown(format!("Failed to acquire request permit: {}", e)))?;
        self.quota.acquire(cost).await;
        Ok(permit)
    }
}

/// Reduce a Gmail API message to the fields the analyzer needs
pub fn parse_message_metadata(msg: Message) -> Result<MessageMetadata> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let size_estimate = msg.size_estimate.map(|s| s.max(0) as u64).unwrap_or(0);
    let label_ids = msg.label_ids.unwrap_or_default();

    let mut metadata = MessageMetadata {
        id,
        size_estimate,
        label_ids,
        ..Default::default()
    };

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default();

    // Gmail echoes header names as sent by the origin server, so match loosely.
    // The first occurrence of a repeated header wins.
    for header in headers {
        if let (Some(name), Some(value)) = (header.name, header.value) {
            let slot = match name.to_ascii_lowercase().as_str() {
                "from" => &mut metadata.from,
                "subject" => &mut metadata.subject,
                "date" => &mut metadata.date,
                "list-unsubscribe" => &mut metadata.list_unsubscribe,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }

    Ok(metadata)
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let _permit = self.acquire(QuotaCost::List).await?;

        let (_, response) = self
            .hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(max_results)
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        if response.next_page_token.is_some() {
            debug!("More than {} messages match; only the first page is used", max_results);
        }

        Ok(ids)
    }

    async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata> {
        let _permit = self.acquire(QuotaCost::Get).await?;

        let mut call = self.hub.users().messages_get("me", id).format("metadata");
        for header in METADATA_HEADERS {
            call = call.add_metadata_headers(header);
        }

        let (_, msg) = call.add_scope(MODIFY_SCOPE).doit().await?;
        parse_message_metadata(msg)
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        let _permit = self.acquire(QuotaCost::Trash).await?;

        self.hub
            .users()
            .messages_trash("me", id)
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        Ok(())
    }
}

// Implement GmailClient for Arc<T> to allow shared ownership
#[async_trait]
impl<T: GmailClient + ?Sized> GmailClient for Arc<T> {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        self.as_ref().list_message_ids(query, max_results).await
    }

    async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata> {
        self.as_ref().get_message_metadata(id).await
    }

    async fn trash_message(&self, id: &str) -> Result<()> {
        self.as_ref().trash_message(id).await
    }
}
