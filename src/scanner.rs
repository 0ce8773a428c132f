//! Candidate search: resolves the search filter to message handles

use tracing::{debug, info};

use crate::client::GmailClient;
use crate::error::Result;
use crate::models::MessageRef;
use crate::query::SearchFilter;

/// Outcome of the single list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub candidates: Vec<MessageRef>,
    /// True when the page came back full, so more matches may exist
    pub capped: bool,
}

/// Run one search with at most `max_results` results
///
/// Pagination is not followed; callers needing more than one page run again
/// after trashing.
pub async fn search_candidates<C: GmailClient + ?Sized>(
    client: &C,
    filter: &SearchFilter,
    max_results: u32,
) -> Result<SearchResult> {
    debug!("Searching with query: {}", filter);

    let ids = client.list_message_ids(filter.as_str(), max_results).await?;
    let capped = max_results > 0 && ids.len() >= max_results as usize;

    let candidates: Vec<MessageRef> = ids.into_iter().map(MessageRef::new).collect();

    if capped {
        info!(
            "Search returned the maximum of {} messages; older matches remain for a later run",
            max_results
        );
    } else {
        info!("Search found {} candidate messages", candidates.len());
    }

    Ok(SearchResult { candidates, capped })
}
