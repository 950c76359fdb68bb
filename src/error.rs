//! User-facing failure taxonomy for the command pipeline.

use task_backend::{BackendError, FailureClass};
use thiserror::Error;

use crate::retry::RetryError;
use crate::store::{OperationReport, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Empty or too-short input. Never reaches the network.
    #[error("{reason}")]
    ValidationRejected { reason: String },

    /// Ambiguous or unsupported input. Never reaches the network.
    #[error("{message}")]
    GuidanceNeeded { message: String },

    /// A destructive command is waiting for an explicit decision.
    #[error("{message}")]
    ConfirmationRequired { message: String },

    #[error("session expired: {message}")]
    AuthenticationExpired { message: String },

    #[error("network unavailable after {attempts} attempts: {message}")]
    NetworkExhausted { attempts: u32, message: String },

    #[error("{message}")]
    ServerRejected { status: Option<u16>, message: String },

    #[error("{failed} of {total} operations failed")]
    OperationPartialFailure { failed: usize, total: usize },
}

impl PipelineError {
    /// Maps a finished retry run onto the taxonomy.
    #[must_use]
    pub fn from_retry(error: RetryError<BackendError>) -> Self {
        match error {
            RetryError::Terminal { attempts, error } => match error.class() {
                FailureClass::Authentication => Self::AuthenticationExpired {
                    message: error.message().to_string(),
                },
                FailureClass::Retryable => Self::NetworkExhausted {
                    attempts,
                    message: error.message().to_string(),
                },
                FailureClass::Terminal => Self::ServerRejected {
                    status: error.status(),
                    message: error.message().to_string(),
                },
            },
            RetryError::Exhausted {
                attempts,
                last_error,
            } => Self::NetworkExhausted {
                attempts,
                message: last_error.message().to_string(),
            },
        }
    }

    /// Summary of failed operations, `None` when every one succeeded.
    #[must_use]
    pub fn from_reports(reports: &[OperationReport]) -> Option<Self> {
        let failed = reports.iter().filter(|report| report.is_failure()).count();
        if failed == 0 {
            return None;
        }
        Some(Self::OperationPartialFailure {
            failed,
            total: reports.len(),
        })
    }

    /// Whether the user can meaningfully resubmit the same command.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::NetworkExhausted { .. } | Self::ServerRejected { .. }
        )
    }
}

/// Misuse of the task store API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("task {0} is not in the collection")]
    UnknownTask(TaskId),

    #[error("task {0} is not a temporary record")]
    NotTemporary(TaskId),
}
