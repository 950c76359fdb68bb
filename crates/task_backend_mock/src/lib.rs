//! Deterministic in-memory implementation of the `task_backend` contracts.
//!
//! This crate contains no transport logic and is intended for local
//! development and contract-level testing of the taskpilot pipeline. Replies
//! and failures are scripted up front; every call is recorded so tests can
//! assert on exactly how many requests reached the backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use task_backend::{
    lock_unpoisoned, BackendError, ChatBackend, ChatMessage, ChatReply, ChatRequest, HistoryPage,
    MessageMetadata, OperationStatus, Role, TaskBackend, TaskDraft, TaskDto, TaskKey, TaskPatch,
};

/// Conversation id assigned when a request does not carry one.
pub const MOCK_CONVERSATION_ID: &str = "mock-conversation";

const MOCK_TIMESTAMP: &str = "2025-01-01T00:00:00Z";
const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// One recorded `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChat {
    pub credential: String,
    pub request: ChatRequest,
}

/// One recorded `fetch_history` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedHistory {
    pub conversation_id: String,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default)]
struct MockState {
    accepted_credential: Option<String>,
    chat_script: VecDeque<Result<ChatReply, BackendError>>,
    chat_calls: Vec<RecordedChat>,
    chat_delay: Option<Duration>,
    history: HashMap<String, Vec<ChatMessage>>,
    history_failures: VecDeque<BackendError>,
    history_calls: Vec<RecordedHistory>,
    tasks: Vec<TaskDto>,
    next_task_id: TaskKey,
    task_failures: VecDeque<BackendError>,
    task_calls: Vec<String>,
    next_message: u64,
}

impl MockState {
    fn check_credential(&self, credential: &str) -> Result<(), BackendError> {
        match self.accepted_credential.as_deref() {
            Some(accepted) if accepted != credential => Err(BackendError::Unauthorized {
                message: INVALID_CREDENTIALS.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn next_message_id(&mut self) -> String {
        self.next_message += 1;
        format!("mock-m-{}", self.next_message)
    }

    fn echo_reply(&mut self, request: &ChatRequest) -> ChatReply {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| MOCK_CONVERSATION_ID.to_string());
        let id = self.next_message_id();
        let message = ChatMessage::new(
            id,
            conversation_id.clone(),
            Role::Assistant,
            format!("Echo: {}", request.message),
            MOCK_TIMESTAMP,
        )
        .with_metadata(MessageMetadata {
            status: Some(OperationStatus::Success),
            ..MessageMetadata::default()
        });

        ChatReply {
            conversation_id,
            message,
            operations: Vec::new(),
        }
    }

    /// Keeps the stored conversation in step with successful chat turns.
    fn record_turn(&mut self, request: &ChatRequest, reply: &ChatReply) {
        let user_id = self.next_message_id();
        let user = ChatMessage::new(
            user_id,
            reply.conversation_id.clone(),
            Role::User,
            request.message.clone(),
            MOCK_TIMESTAMP,
        );
        let log = self
            .history
            .entry(reply.conversation_id.clone())
            .or_default();
        log.push(user);
        log.push(reply.message.clone());
    }

    fn take_task_failure(&mut self) -> Result<(), BackendError> {
        match self.task_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn task_mut(&mut self, id: TaskKey) -> Result<&mut TaskDto, BackendError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| task_not_found(id))
    }
}

/// Scripted chat and task backend shared by pipeline tests and local runs.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_task_id: 1,
                ..MockState::default()
            }),
        }
    }

    /// Rejects every credential other than `credential` with a 401.
    #[must_use]
    pub fn accept_only(self, credential: impl Into<String>) -> Self {
        self.set_accepted_credential(credential);
        self
    }

    /// Delays every chat reply; useful for overlapping sends.
    #[must_use]
    pub fn with_chat_delay(self, delay: Duration) -> Self {
        lock_unpoisoned(&self.state).chat_delay = Some(delay);
        self
    }

    /// Seeds a stored conversation, oldest message first.
    #[must_use]
    pub fn with_history(self, conversation_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        lock_unpoisoned(&self.state)
            .history
            .insert(conversation_id.into(), messages);
        self
    }

    #[must_use]
    pub fn seed_tasks(self, tasks: Vec<TaskDto>) -> Self {
        {
            let mut state = lock_unpoisoned(&self.state);
            let max_id = tasks.iter().map(|task| task.id).max().unwrap_or(0);
            state.next_task_id = state.next_task_id.max(max_id + 1);
            state.tasks = tasks;
        }
        self
    }

    pub fn set_accepted_credential(&self, credential: impl Into<String>) {
        lock_unpoisoned(&self.state).accepted_credential = Some(credential.into());
    }

    /// Queues the reply for the next accepted chat call.
    pub fn push_chat_reply(&self, reply: ChatReply) {
        lock_unpoisoned(&self.state).chat_script.push_back(Ok(reply));
    }

    /// Queues a failure for the next accepted chat call.
    pub fn push_chat_error(&self, error: BackendError) {
        lock_unpoisoned(&self.state).chat_script.push_back(Err(error));
    }

    pub fn push_history_error(&self, error: BackendError) {
        lock_unpoisoned(&self.state).history_failures.push_back(error);
    }

    /// Queues a failure for the next task CRUD call.
    pub fn push_task_error(&self, error: BackendError) {
        lock_unpoisoned(&self.state).task_failures.push_back(error);
    }

    /// Number of chat calls that reached the backend, including rejected ones.
    #[must_use]
    pub fn chat_call_count(&self) -> usize {
        lock_unpoisoned(&self.state).chat_calls.len()
    }

    #[must_use]
    pub fn chat_calls(&self) -> Vec<RecordedChat> {
        lock_unpoisoned(&self.state).chat_calls.clone()
    }

    #[must_use]
    pub fn history_calls(&self) -> Vec<RecordedHistory> {
        lock_unpoisoned(&self.state).history_calls.clone()
    }

    /// Task calls in arrival order, as `"<verb> <id>"` labels.
    #[must_use]
    pub fn task_calls(&self) -> Vec<String> {
        lock_unpoisoned(&self.state).task_calls.clone()
    }

    /// Current server-side task collection.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskDto> {
        lock_unpoisoned(&self.state).tasks.clone()
    }

    /// Adds a task directly on the "server", bypassing the call log.
    pub fn insert_task(&self, draft: TaskDraft) -> TaskDto {
        let mut state = lock_unpoisoned(&self.state);
        let task = task_from_draft(state.next_task_id, draft);
        state.next_task_id += 1;
        state.tasks.push(task.clone());
        task
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn send_message(
        &self,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, BackendError> {
        let delay = {
            let mut state = lock_unpoisoned(&self.state);
            state.chat_calls.push(RecordedChat {
                credential: credential.to_string(),
                request: request.clone(),
            });
            state.chat_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock_unpoisoned(&self.state);
        state.check_credential(credential)?;
        let reply = match state.chat_script.pop_front() {
            Some(scripted) => scripted?,
            None => state.echo_reply(request),
        };
        state.record_turn(request, &reply);
        Ok(reply)
    }

    async fn fetch_history(
        &self,
        credential: &str,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.history_calls.push(RecordedHistory {
            conversation_id: conversation_id.to_string(),
            limit,
            offset,
        });
        state.check_credential(credential)?;
        if let Some(error) = state.history_failures.pop_front() {
            return Err(error);
        }

        let Some(log) = state.history.get(conversation_id) else {
            return Err(BackendError::from_status(
                404,
                "Conversation not found or you don't have access",
            ));
        };

        let total = log.len();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok(HistoryPage {
            messages: log[start..end].to_vec(),
            total,
            limit,
            offset,
            has_more: start > 0,
        })
    }
}

#[async_trait]
impl TaskBackend for MockBackend {
    async fn list_tasks(&self, credential: &str) -> Result<Vec<TaskDto>, BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.task_calls.push("list".to_string());
        state.check_credential(credential)?;
        state.take_task_failure()?;
        Ok(state.tasks.clone())
    }

    async fn create_task(
        &self,
        credential: &str,
        draft: &TaskDraft,
    ) -> Result<TaskDto, BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.task_calls.push(format!("create {}", draft.title));
        state.check_credential(credential)?;
        state.take_task_failure()?;

        let task = task_from_draft(state.next_task_id, draft.clone());
        state.next_task_id += 1;
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        credential: &str,
        id: TaskKey,
        patch: &TaskPatch,
    ) -> Result<TaskDto, BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.task_calls.push(format!("update {id}"));
        state.check_credential(credential)?;
        state.take_task_failure()?;

        let task = state.task_mut(id)?;
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(due_date) = &patch.due_date {
            task.due_date = Some(due_date.clone());
        }
        Ok(task.clone())
    }

    async fn set_completed(
        &self,
        credential: &str,
        id: TaskKey,
        completed: bool,
    ) -> Result<TaskDto, BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.task_calls.push(format!("complete {id}"));
        state.check_credential(credential)?;
        state.take_task_failure()?;

        let task = state.task_mut(id)?;
        task.completed = completed;
        Ok(task.clone())
    }

    async fn delete_task(&self, credential: &str, id: TaskKey) -> Result<(), BackendError> {
        let mut state = lock_unpoisoned(&self.state);
        state.task_calls.push(format!("delete {id}"));
        state.check_credential(credential)?;
        state.take_task_failure()?;

        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != id);
        if state.tasks.len() == before {
            return Err(task_not_found(id));
        }
        Ok(())
    }
}

fn task_from_draft(id: TaskKey, draft: TaskDraft) -> TaskDto {
    TaskDto {
        id,
        title: draft.title,
        description: draft.description,
        priority: draft.priority,
        completed: false,
        due_date: draft.due_date,
    }
}

fn task_not_found(id: TaskKey) -> BackendError {
    BackendError::from_status(404, format!("Task {id} not found"))
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use task_backend::{
        BackendError, ChatBackend, ChatMessage, ChatRequest, FailureClass, Role, TaskBackend,
        TaskDraft, TaskPatch,
    };

    use super::{MockBackend, MOCK_CONVERSATION_ID};

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            conversation_id: None,
            message: message.to_string(),
            timezone: "UTC".to_string(),
        }
    }

    fn numbered_history(count: usize) -> Vec<ChatMessage> {
        (0..count)
            .map(|index| {
                ChatMessage::new(
                    format!("m-{index}"),
                    "c-1",
                    Role::User,
                    format!("message {index}"),
                    "2025-01-01T00:00:00Z",
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn unscripted_chat_echoes_and_records_the_turn() {
        let backend = MockBackend::new();
        let reply = backend
            .send_message("tok", &request("hello there"))
            .await
            .expect("echo reply");

        assert_eq!(reply.conversation_id, MOCK_CONVERSATION_ID);
        assert_eq!(reply.message.content, "Echo: hello there");
        assert_eq!(backend.chat_call_count(), 1);

        let page = backend
            .fetch_history("tok", MOCK_CONVERSATION_ID, 50, 0)
            .await
            .expect("history");
        assert_eq!(page.total, 2);
        assert_eq!(page.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn foreign_credential_is_rejected_without_consuming_script() {
        let backend = MockBackend::new().accept_only("fresh");
        backend.push_chat_error(BackendError::from_status(500, "boom"));

        let error = backend
            .send_message("stale", &request("hi"))
            .await
            .expect_err("stale credential");
        assert_eq!(error.class(), FailureClass::Authentication);

        let error = backend
            .send_message("fresh", &request("hi"))
            .await
            .expect_err("scripted failure");
        assert_eq!(error.status(), Some(500));
        assert_eq!(backend.chat_call_count(), 2);
    }

    #[tokio::test]
    async fn history_windows_count_back_from_newest() {
        let backend = MockBackend::new().with_history("c-1", numbered_history(120));

        let newest = backend
            .fetch_history("tok", "c-1", 50, 0)
            .await
            .expect("first window");
        assert_eq!(newest.messages.first().map(|m| m.id.as_str()), Some("m-70"));
        assert_eq!(newest.messages.last().map(|m| m.id.as_str()), Some("m-119"));
        assert!(newest.has_more);

        let oldest = backend
            .fetch_history("tok", "c-1", 50, 100)
            .await
            .expect("last window");
        assert_eq!(oldest.messages.len(), 20);
        assert_eq!(oldest.messages[0].id, "m-0");
        assert!(!oldest.has_more);
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let backend = MockBackend::new();
        let error = backend
            .fetch_history("tok", "missing", 50, 0)
            .await
            .expect_err("missing conversation");
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn task_crud_tracks_server_state() {
        let backend = MockBackend::new();
        let created = backend
            .create_task("tok", &TaskDraft::new("Buy milk"))
            .await
            .expect("create");
        assert_eq!(created.id, 1);

        let completed = backend
            .set_completed("tok", created.id, true)
            .await
            .expect("complete");
        assert!(completed.completed);

        let renamed = backend
            .update_task(
                "tok",
                created.id,
                &TaskPatch {
                    title: Some("Buy oat milk".to_string()),
                    ..TaskPatch::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(renamed.title, "Buy oat milk");

        backend.delete_task("tok", created.id).await.expect("delete");
        assert!(backend.tasks().is_empty());

        let error = backend
            .delete_task("tok", created.id)
            .await
            .expect_err("already deleted");
        assert_eq!(error.message(), "Task 1 not found");
        assert_eq!(
            backend.task_calls(),
            vec![
                "create Buy milk".to_string(),
                "complete 1".to_string(),
                "update 1".to_string(),
                "delete 1".to_string(),
                "delete 1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn scripted_task_failure_applies_once() {
        let backend = MockBackend::new();
        backend.push_task_error(BackendError::Connection("refused".to_string()));

        assert!(backend.list_tasks("tok").await.is_err());
        assert!(backend.list_tasks("tok").await.is_ok());
    }
}
