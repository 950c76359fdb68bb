//! Paged retrieval of past conversation messages.

use std::collections::HashSet;
use std::sync::Arc;

use task_backend::{ChatBackend, ChatMessage, CredentialSource};
use tracing::debug;

use crate::clock::parse_rfc3339;
use crate::error::PipelineError;
use crate::retry::{self, RetryOptions};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One window of history, oldest message first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWindow {
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
    pub total: usize,
    pub offset: usize,
}

impl HistoryWindow {
    /// Offset of the next older window.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + self.messages.len()
    }
}

pub struct HistoryLoader {
    backend: Arc<dyn ChatBackend>,
    credentials: Arc<dyn CredentialSource>,
    retry: RetryOptions,
}

impl std::fmt::Debug for HistoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLoader")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HistoryLoader {
    pub fn new(backend: Arc<dyn ChatBackend>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            backend,
            credentials,
            retry: RetryOptions::default(),
        }
    }

    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Loads `limit` messages skipping the `offset` most recent ones.
    pub async fn load(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryWindow, PipelineError> {
        let limit = limit.max(1);
        let Some(credential) = self.credentials.bearer() else {
            return Err(PipelineError::AuthenticationExpired {
                message: "no credential available".to_string(),
            });
        };

        let backend = Arc::clone(&self.backend);
        let page = retry::execute(
            || backend.fetch_history(&credential, conversation_id, limit, offset),
            &self.retry,
        )
        .await
        .map_err(PipelineError::from_retry)?;

        let returned = page.messages.len();
        let messages = oldest_first(page.messages);
        let has_more = offset + returned < page.total;
        debug!(
            conversation_id,
            offset,
            returned,
            total = page.total,
            has_more,
            "history window loaded"
        );

        Ok(HistoryWindow {
            messages,
            has_more,
            total: page.total,
            offset,
        })
    }
}

/// Normalizes a window to oldest-to-newest order and drops repeated ids.
fn oldest_first(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let newest_first = match (messages.first(), messages.last()) {
        (Some(first), Some(last)) => match (
            parse_rfc3339(&first.timestamp),
            parse_rfc3339(&last.timestamp),
        ) {
            (Some(first), Some(last)) => first > last,
            _ => false,
        },
        _ => false,
    };
    if newest_first {
        messages.reverse();
    }

    let mut seen = HashSet::new();
    messages.retain(|message| seen.insert(message.id.clone()));
    messages
}
