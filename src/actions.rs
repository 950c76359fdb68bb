//! UI-originated task mutations: optimistic locally, confirmed remotely.

use std::sync::Arc;

use task_backend::{
    BackendError, CredentialSource, TaskBackend, TaskDraft, TaskDto, TaskKey, TaskPatch,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::retry::{self, RetryError, RetryOptions};
use crate::store::{TaskId, TaskRecord, TaskStore};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// A rejected mutation. `previous` holds the record as it was before the
/// optimistic change so the caller can decide whether to restore it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct MutationFailed {
    pub error: PipelineError,
    pub previous: Option<TaskRecord>,
}

impl MutationFailed {
    fn new(error: PipelineError, previous: Option<TaskRecord>) -> Self {
        Self { error, previous }
    }
}

/// Trims the title and drops a blank description.
pub fn validate_draft(draft: &TaskDraft) -> Result<TaskDraft, PipelineError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(PipelineError::ValidationRejected {
            reason: "Title cannot be empty or whitespace only".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(PipelineError::ValidationRejected {
            reason: format!("Title cannot exceed {MAX_TITLE_CHARS} characters"),
        });
    }
    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty());
    if description.is_some_and(|description| description.chars().count() > MAX_DESCRIPTION_CHARS) {
        return Err(PipelineError::ValidationRejected {
            reason: format!("Description cannot exceed {MAX_DESCRIPTION_CHARS} characters"),
        });
    }

    Ok(TaskDraft {
        title: title.to_string(),
        description: description.map(str::to_owned),
        priority: draft.priority,
        due_date: draft.due_date.clone(),
    })
}

pub struct TaskActions {
    backend: Arc<dyn TaskBackend>,
    credentials: Arc<dyn CredentialSource>,
    store: TaskStore,
    retry: RetryOptions,
}

impl std::fmt::Debug for TaskActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskActions")
            .field("tasks", &self.store.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TaskActions {
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        credentials: Arc<dyn CredentialSource>,
        store: TaskStore,
    ) -> Self {
        Self {
            backend,
            credentials,
            store,
            retry: RetryOptions::default(),
        }
    }

    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Creates a task. The optimistic record is confirmed or rolled back
    /// before this returns.
    pub async fn create(&self, draft: &TaskDraft) -> Result<TaskRecord, PipelineError> {
        let draft = validate_draft(draft)?;
        let temp_id = self.store.add_optimistic(&draft);
        let backend = Arc::clone(&self.backend);

        match self
            .call(|credential| {
                let backend = Arc::clone(&backend);
                let draft = draft.clone();
                async move { backend.create_task(&credential, &draft).await }
            })
            .await
        {
            Ok(task) => {
                let record = TaskRecord::from_dto(task.clone());
                if let Err(error) = self.store.confirm(&temp_id, task) {
                    warn!(%error, "could not confirm optimistic task");
                }
                debug!(task_id = %record.id, "task created");
                Ok(record)
            }
            Err(error) => {
                self.store.rollback(&temp_id);
                warn!(%error, "task create failed; rolled back");
                Err(error)
            }
        }
    }

    /// Marks a task done or not done.
    pub async fn set_completed(&self, id: TaskKey, completed: bool) -> Result<TaskRecord, MutationFailed> {
        let previous = self
            .store
            .update_status(id, &TaskPatch::completed(completed))
            .ok();
        let backend = Arc::clone(&self.backend);

        let result = self
            .call(|credential| {
                let backend = Arc::clone(&backend);
                async move { backend.set_completed(&credential, id, completed).await }
            })
            .await;
        self.settle(id, result, previous)
    }

    pub async fn update(&self, id: TaskKey, patch: &TaskPatch) -> Result<TaskRecord, MutationFailed> {
        if patch.is_empty() {
            return match self.store.get(&TaskId::Server(id)) {
                Some(record) => Ok(record),
                None => Err(MutationFailed::new(
                    PipelineError::ValidationRejected {
                        reason: format!("Task {id} not found"),
                    },
                    None,
                )),
            };
        }
        let previous = self.store.update_status(id, patch).ok();
        let backend = Arc::clone(&self.backend);

        let result = self
            .call(|credential| {
                let backend = Arc::clone(&backend);
                let patch = patch.clone();
                async move { backend.update_task(&credential, id, &patch).await }
            })
            .await;
        self.settle(id, result, previous)
    }

    /// Deletes on the server first; the local record goes only after success.
    pub async fn delete(&self, id: TaskKey) -> Result<Option<TaskRecord>, MutationFailed> {
        let backend = Arc::clone(&self.backend);
        let result = self
            .call(|credential| {
                let backend = Arc::clone(&backend);
                async move { backend.delete_task(&credential, id).await }
            })
            .await;

        match result {
            Ok(()) => Ok(self.store.remove(id)),
            Err(error) => {
                warn!(task_id = id, %error, "task delete failed");
                Err(MutationFailed::new(error, self.store.get(&TaskId::Server(id))))
            }
        }
    }

    /// Replaces the collection with the server's list.
    pub async fn refresh(&self) -> Result<usize, PipelineError> {
        let backend = Arc::clone(&self.backend);
        let tasks = self
            .call(|credential| {
                let backend = Arc::clone(&backend);
                async move { backend.list_tasks(&credential).await }
            })
            .await?;
        let count = tasks.len();
        self.store.replace_all(tasks);
        debug!(count, "task list refreshed");
        Ok(count)
    }

    fn settle(
        &self,
        id: TaskKey,
        result: Result<TaskDto, PipelineError>,
        previous: Option<TaskRecord>,
    ) -> Result<TaskRecord, MutationFailed> {
        match result {
            Ok(task) => {
                self.store.upsert(task.clone());
                Ok(TaskRecord::from_dto(task))
            }
            Err(error) => {
                warn!(task_id = id, %error, "task mutation rejected; local change kept");
                Err(MutationFailed::new(error, previous))
            }
        }
    }

    async fn call<T, F, Fut>(&self, mut operation: F) -> Result<T, PipelineError>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendError>>,
    {
        let Some(credential) = self.credentials.bearer() else {
            return Err(PipelineError::AuthenticationExpired {
                message: "no credential available".to_string(),
            });
        };
        retry::execute(|| operation(credential.clone()), &self.retry)
            .await
            .map_err(|error: RetryError<BackendError>| PipelineError::from_retry(error))
    }
}
