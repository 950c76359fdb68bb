use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use task_backend::{ChatReply, ChatRequest, HistoryPage, TaskDraft, TaskDto, TaskKey, TaskPatch};
use tracing::{debug, warn};

use crate::config::TaskApiConfig;
use crate::error::{parse_error_message, TaskApiError};
use crate::headers::build_headers;
use crate::url::{endpoint, history_path, task_path, CHAT_PATH, TASKS_PATH};

#[derive(Debug, Clone)]
pub struct TaskApiClient {
    http: Client,
    config: TaskApiConfig,
}

impl TaskApiClient {
    pub fn new(config: TaskApiConfig) -> Result<Self, TaskApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TaskApiConfig {
        &self.config
    }

    pub fn build_headers(
        &self,
        credential: &str,
        timezone: Option<&str>,
    ) -> Result<HeaderMap, TaskApiError> {
        let headers = build_headers(&self.config, credential, timezone)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| TaskApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    TaskApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_chat_request(
        &self,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<RequestBuilder, TaskApiError> {
        let headers = self.build_headers(credential, Some(&request.timezone))?;
        Ok(self
            .http
            .post(endpoint(&self.config.base_url, CHAT_PATH))
            .headers(headers)
            .json(request))
    }

    pub fn build_history_request(
        &self,
        credential: &str,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<RequestBuilder, TaskApiError> {
        let headers = self.build_headers(credential, None)?;
        Ok(self
            .http
            .get(endpoint(&self.config.base_url, &history_path(conversation_id)))
            .headers(headers)
            .query(&[("limit", limit), ("offset", offset)]))
    }

    pub fn build_task_request(
        &self,
        method: Method,
        path: &str,
        credential: &str,
    ) -> Result<RequestBuilder, TaskApiError> {
        let headers = self.build_headers(credential, None)?;
        Ok(self
            .http
            .request(method, endpoint(&self.config.base_url, path))
            .headers(headers))
    }

    pub async fn send_chat(
        &self,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, TaskApiError> {
        let builder = self.build_chat_request(credential, request)?;
        execute_json(builder, "POST", CHAT_PATH).await
    }

    pub async fn fetch_history(
        &self,
        credential: &str,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, TaskApiError> {
        let builder = self.build_history_request(credential, conversation_id, limit, offset)?;
        execute_json(builder, "GET", &history_path(conversation_id)).await
    }

    pub async fn list_tasks(&self, credential: &str) -> Result<Vec<TaskDto>, TaskApiError> {
        let builder = self.build_task_request(Method::GET, TASKS_PATH, credential)?;
        execute_json(builder, "GET", TASKS_PATH).await
    }

    pub async fn create_task(
        &self,
        credential: &str,
        draft: &TaskDraft,
    ) -> Result<TaskDto, TaskApiError> {
        let builder = self
            .build_task_request(Method::POST, TASKS_PATH, credential)?
            .json(draft);
        execute_json(builder, "POST", TASKS_PATH).await
    }

    pub async fn update_task(
        &self,
        credential: &str,
        id: TaskKey,
        patch: &TaskPatch,
    ) -> Result<TaskDto, TaskApiError> {
        let path = task_path(id);
        let builder = self
            .build_task_request(Method::PUT, &path, credential)?
            .json(patch);
        execute_json(builder, "PUT", &path).await
    }

    pub async fn set_completed(
        &self,
        credential: &str,
        id: TaskKey,
        completed: bool,
    ) -> Result<TaskDto, TaskApiError> {
        let path = task_path(id);
        let builder = self
            .build_task_request(Method::PATCH, &path, credential)?
            .json(&TaskPatch::completed(completed));
        execute_json(builder, "PATCH", &path).await
    }

    pub async fn delete_task(&self, credential: &str, id: TaskKey) -> Result<(), TaskApiError> {
        let path = task_path(id);
        let builder = self.build_task_request(Method::DELETE, &path, credential)?;
        execute(builder, "DELETE", &path).await.map(|_| ())
    }
}

async fn execute(
    builder: RequestBuilder,
    method: &'static str,
    path: &str,
) -> Result<String, TaskApiError> {
    let started = Instant::now();
    let response = match builder.send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(
                method,
                path,
                duration_ms = started.elapsed().as_millis() as u64,
                %error,
                "backend call failed"
            );
            return Err(TaskApiError::from(error));
        }
    };

    let status = response.status();
    debug!(
        method,
        path,
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "backend call completed"
    );

    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    Err(TaskApiError::Status {
        status,
        message: parse_error_message(status, &body),
    })
}

async fn execute_json<T>(
    builder: RequestBuilder,
    method: &'static str,
    path: &str,
) -> Result<T, TaskApiError>
where
    T: DeserializeOwned,
{
    let body = execute(builder, method, path).await?;
    Ok(serde_json::from_str(&body)?)
}
