//! Backend-agnostic contract between the taskpilot pipeline and its remote collaborators.
//!
//! This crate defines the wire shapes exchanged with the chat/agent backend and
//! the task backend, the failure classification every transport must report,
//! and the credential seam. It carries no transport code.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

mod error;
mod wire;

pub use error::{classify_status, BackendError, FailureClass};
pub use wire::{
    ChatMessage, ChatReply, ChatRequest, HistoryPage, MessageMetadata, OperationStatus,
    OperationType, Priority, Role, TaskDraft, TaskDto, TaskKey, TaskOperation, TaskPatch,
};

/// Natural-language command endpoint plus its conversation history.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends one user message; the backend executes zero or more task operations.
    async fn send_message(
        &self,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, BackendError>;

    /// Fetches one window of messages. `offset` counts back from the newest message.
    async fn fetch_history(
        &self,
        credential: &str,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, BackendError>;
}

/// CRUD surface over the authenticated principal's task collection.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list_tasks(&self, credential: &str) -> Result<Vec<TaskDto>, BackendError>;

    async fn create_task(&self, credential: &str, draft: &TaskDraft)
        -> Result<TaskDto, BackendError>;

    async fn update_task(
        &self,
        credential: &str,
        id: TaskKey,
        patch: &TaskPatch,
    ) -> Result<TaskDto, BackendError>;

    async fn set_completed(
        &self,
        credential: &str,
        id: TaskKey,
        completed: bool,
    ) -> Result<TaskDto, BackendError>;

    async fn delete_task(&self, credential: &str, id: TaskKey) -> Result<(), BackendError>;
}

/// Supplies the current bearer credential, if any.
pub trait CredentialSource: Send + Sync {
    fn bearer(&self) -> Option<String>;
}

/// Mutable credential slot shared between the pipeline and whoever re-authenticates.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential {
    slot: Arc<Mutex<Option<String>>>,
}

impl SharedCredential {
    #[must_use]
    pub fn new(initial: Option<String>) -> Self {
        let shared = Self::default();
        if let Some(token) = initial {
            shared.set(token);
        }
        shared
    }

    /// Stores a new credential. Blank values clear the slot.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let trimmed = token.trim();
        *lock_unpoisoned(&self.slot) = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        };
    }

    pub fn clear(&self) {
        *lock_unpoisoned(&self.slot) = None;
    }
}

impl CredentialSource for SharedCredential {
    fn bearer(&self) -> Option<String> {
        lock_unpoisoned(&self.slot).clone()
    }
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every shared slot in these crates holds plain data that stays valid after
/// a panic mid-update, so poisoning is ignored.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
