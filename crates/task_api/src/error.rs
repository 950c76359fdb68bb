use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use task_backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskApiError {
    #[error("bearer credential is required")]
    MissingCredential,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<TaskApiError> for BackendError {
    fn from(error: TaskApiError) -> Self {
        match error {
            TaskApiError::MissingCredential => BackendError::Unauthorized {
                message: TaskApiError::MissingCredential.to_string(),
            },
            TaskApiError::Status { status, message } => {
                BackendError::from_status(status.as_u16(), message)
            }
            TaskApiError::Request(error) => {
                if error.is_timeout() {
                    BackendError::Timeout(error.to_string())
                } else if error.is_connect() {
                    BackendError::Connection(error.to_string())
                } else if error.is_decode() {
                    BackendError::Decode(error.to_string())
                } else if let Some(status) = error.status() {
                    BackendError::from_status(status.as_u16(), error.to_string())
                } else if error.is_request() || error.is_body() {
                    BackendError::Connection(error.to_string())
                } else {
                    BackendError::Other(error.to_string())
                }
            }
            TaskApiError::Serde(error) => BackendError::Decode(error.to_string()),
            TaskApiError::InvalidHeader(message) => BackendError::Other(message),
        }
    }
}

/// The error body shapes the backends emit.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: Option<Value>,
    message: Option<String>,
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

/// Extract a user-facing message from a non-success response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    if let Some(detail) = parsed.detail.as_ref().and_then(detail_message) {
        return detail;
    }
    if let Some(message) = parsed.message.as_deref().and_then(non_empty_string) {
        return message.to_owned();
    }
    if let Some(message) = parsed
        .error
        .and_then(|fields| fields.message)
        .filter(|message| !message.trim().is_empty())
    {
        return message;
    }

    fallback()
}

/// `detail` is either a plain string or a list of validation entries with `msg`.
fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) => non_empty_string(text).map(str::to_owned),
        Value::Array(entries) => {
            let messages = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .filter(|msg| !msg.trim().is_empty())
                .collect::<Vec<_>>();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
