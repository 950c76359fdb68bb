//! The message list a chat surface displays.

use std::collections::HashSet;

use task_backend::{ChatMessage, MessageMetadata, OperationStatus, Role};

use crate::clock::{local_id, now_rfc3339};
use crate::history::HistoryWindow;

/// Displayed messages plus the pagination cursor into server history.
#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    conversation_id: Option<String>,
    messages: Vec<ChatMessage>,
    /// Locally generated ids (optimistic and guidance messages).
    local_ids: HashSet<String>,
    has_more: bool,
    /// Server-side messages known to this view, counted from the newest.
    loaded: usize,
}

impl ConversationView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn set_conversation_id(&mut self, conversation_id: impl Into<String>) {
        let conversation_id = conversation_id.into();
        if self.conversation_id.as_deref() != Some(conversation_id.as_str()) {
            self.conversation_id = Some(conversation_id.clone());
            for message in &mut self.messages {
                if message.conversation_id.is_empty() {
                    message.conversation_id = conversation_id.clone();
                }
            }
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Offset for the next "load more" request.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.loaded
    }

    /// Shows the user's message before the server has it. Returns its local id.
    pub fn push_optimistic_user(&mut self, text: &str) -> String {
        let id = local_id("local");
        let message = ChatMessage::new(
            id.clone(),
            self.conversation_id.clone().unwrap_or_default(),
            Role::User,
            text,
            now_rfc3339(),
        )
        .with_metadata(status(OperationStatus::Pending));
        self.local_ids.insert(id.clone());
        self.messages.push(message);
        id
    }

    /// Marks an optimistic message as accepted by the server.
    pub fn confirm_user(&mut self, local_id: &str) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == local_id) else {
            return false;
        };
        let mut confirmed = message.clone().with_metadata(status(OperationStatus::Success));
        if let Some(conversation_id) = &self.conversation_id {
            confirmed.conversation_id = conversation_id.clone();
        }
        *message = confirmed;
        self.loaded += 1;
        true
    }

    /// Removes a local message that never made it to the server.
    pub fn retract(&mut self, local_id: &str) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|m| m.id == local_id)?;
        self.local_ids.remove(local_id);
        Some(self.messages.remove(index))
    }

    /// Appends a locally generated assistant-style message.
    pub fn push_guidance(&mut self, content: impl Into<String>) -> String {
        let id = local_id("guide");
        let message = ChatMessage::new(
            id.clone(),
            self.conversation_id.clone().unwrap_or_default(),
            Role::Assistant,
            content,
            now_rfc3339(),
        );
        self.local_ids.insert(id.clone());
        self.messages.push(message);
        id
    }

    /// Appends a server message unless it is already shown.
    pub fn push_assistant(&mut self, message: ChatMessage) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.messages.push(message);
        self.loaded += 1;
        true
    }

    /// Replaces everything with the newest history window.
    pub fn reset_with(&mut self, window: HistoryWindow) {
        self.messages.clear();
        self.local_ids.clear();
        self.loaded = window.next_offset();
        self.has_more = window.has_more;
        self.messages = window.messages;
    }

    /// Prepends an older window, skipping messages already shown.
    pub fn prepend_history(&mut self, window: HistoryWindow) -> usize {
        self.has_more = window.has_more;
        self.loaded = self.loaded.max(window.next_offset());
        let older = window
            .messages
            .into_iter()
            .filter(|message| !self.contains(&message.id))
            .collect::<Vec<_>>();
        let added = older.len();
        self.messages.splice(0..0, older);
        added
    }

    fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|message| message.id == id)
    }

    #[must_use]
    pub fn is_local(&self, id: &str) -> bool {
        self.local_ids.contains(id)
    }
}

fn status(status: OperationStatus) -> MessageMetadata {
    MessageMetadata {
        status: Some(status),
        ..MessageMetadata::default()
    }
}
