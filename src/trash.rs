//! Confirmation gate and the destructive trash stage

use std::io::BufRead;
use tracing::{debug, warn};

use crate::client::GmailClient;
use crate::error::Result;
use crate::models::MessageRef;

/// Word the user must type to authorize trashing
pub const CONFIRMATION_TOKEN: &str = "PROCEED";

/// Case-insensitive match of the confirmation token, surrounding whitespace ignored
pub fn is_confirmed(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(CONFIRMATION_TOKEN)
}

/// Read one line of confirmation; end of input counts as a refusal
pub fn read_confirmation<R: BufRead>(reader: &mut R) -> Result<bool> {
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    Ok(read > 0 && is_confirmed(&line))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrashSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Message id and error text of every failed trash call
    pub failures: Vec<(String, String)>,
}

impl TrashSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct TrashExecutor<'a, C: GmailClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: GmailClient + ?Sized> TrashExecutor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Trash every candidate in order, one call each
    ///
    /// A failed call is recorded and the loop moves on. `on_progress`
    /// receives (processed, total) after each message.
    pub async fn trash_all<F>(&self, refs: &[MessageRef], mut on_progress: F) -> TrashSummary
    where
        F: FnMut(usize, usize),
    {
        let total = refs.len();
        let mut summary = TrashSummary::default();

        for (index, message) in refs.iter().enumerate() {
            summary.attempted += 1;
            match self.client.trash_message(message.id()).await {
                Ok(()) => {
                    debug!("Trashed message {}", message);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("Error trashing message {}: {}", message, e);
                    summary.failures.push((message.id().to_string(), e.to_string()));
                }
            }
            on_progress(index + 1, total);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GmailError;
    use crate::models::MessageMetadata;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        fail_on: Option<String>,
        trashed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GmailClient for RecordingClient {
        async fn list_message_ids(&self, _query: &str, _max: u32) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_message_metadata(&self, id: &str) -> Result<MessageMetadata> {
            Err(GmailError::MessageNotFound(id.to_string()))
        }

        async fn trash_message(&self, id: &str) -> Result<()> {
            self.trashed.lock().unwrap().push(id.to_string());
            if self.fail_on.as_deref() == Some(id) {
                return Err(GmailError::Forbidden("insufficient permission".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_is_confirmed_accepts_token() {
        assert!(is_confirmed("PROCEED"));
        assert!(is_confirmed("proceed"));
        assert!(is_confirmed("  Proceed \n"));
    }

    #[test]
    fn test_is_confirmed_rejects_others() {
        assert!(!is_confirmed(""));
        assert!(!is_confirmed("yes"));
        assert!(!is_confirmed("PROCEED!"));
        assert!(!is_confirmed("PRO CEED"));
    }

    #[test]
    fn test_read_confirmation() {
        assert!(read_confirmation(&mut Cursor::new("proceed\n")).unwrap());
        assert!(!read_confirmation(&mut Cursor::new("no\n")).unwrap());
        assert!(!read_confirmation(&mut Cursor::new("")).unwrap());
        // Only the first line counts
        assert!(!read_confirmation(&mut Cursor::new("\nPROCEED\n")).unwrap());
    }

    #[tokio::test]
    async fn test_trash_all_continues_after_failure() {
        let client = RecordingClient {
            fail_on: Some("b".to_string()),
            ..Default::default()
        };
        let refs: Vec<MessageRef> = ["a", "b", "c"].into_iter().map(MessageRef::from).collect();
        let mut progress = Vec::new();

        let summary = TrashExecutor::new(&client)
            .trash_all(&refs, |done, total| progress.push((done, total)))
            .await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures[0].0, "b");
        assert_eq!(*client.trashed.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_trash_all_empty() {
        let client = RecordingClient::default();
        let summary = TrashExecutor::new(&client).trash_all(&[], |_, _| {}).await;
        assert_eq!(summary, TrashSummary::default());
    }
}
