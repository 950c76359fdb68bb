//! `task_backend` contract implementation over [`TaskApiClient`].

use async_trait::async_trait;
use task_backend::{
    BackendError, ChatBackend, ChatReply, ChatRequest, HistoryPage, TaskBackend, TaskDraft,
    TaskDto, TaskKey, TaskPatch,
};

use crate::client::TaskApiClient;

#[async_trait]
impl ChatBackend for TaskApiClient {
    async fn send_message(
        &self,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, BackendError> {
        self.send_chat(credential, request)
            .await
            .map_err(BackendError::from)
    }

    async fn fetch_history(
        &self,
        credential: &str,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, BackendError> {
        TaskApiClient::fetch_history(self, credential, conversation_id, limit, offset)
            .await
            .map_err(BackendError::from)
    }
}

#[async_trait]
impl TaskBackend for TaskApiClient {
    async fn list_tasks(&self, credential: &str) -> Result<Vec<TaskDto>, BackendError> {
        TaskApiClient::list_tasks(self, credential)
            .await
            .map_err(BackendError::from)
    }

    async fn create_task(
        &self,
        credential: &str,
        draft: &TaskDraft,
    ) -> Result<TaskDto, BackendError> {
        TaskApiClient::create_task(self, credential, draft)
            .await
            .map_err(BackendError::from)
    }

    async fn update_task(
        &self,
        credential: &str,
        id: TaskKey,
        patch: &TaskPatch,
    ) -> Result<TaskDto, BackendError> {
        TaskApiClient::update_task(self, credential, id, patch)
            .await
            .map_err(BackendError::from)
    }

    async fn set_completed(
        &self,
        credential: &str,
        id: TaskKey,
        completed: bool,
    ) -> Result<TaskDto, BackendError> {
        TaskApiClient::set_completed(self, credential, id, completed)
            .await
            .map_err(BackendError::from)
    }

    async fn delete_task(&self, credential: &str, id: TaskKey) -> Result<(), BackendError> {
        TaskApiClient::delete_task(self, credential, id)
            .await
            .map_err(BackendError::from)
    }
}
