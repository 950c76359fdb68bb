use thiserror::Error;

/// How a failed backend call should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The credential is missing or expired (HTTP 401).
    Authentication,
    /// Transient: timeouts, refused connections, 5xx responses.
    Retryable,
    /// Definitive rejection; repeating the call cannot succeed.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Builds the error for a non-success HTTP status. 401 maps to [`BackendError::Unauthorized`].
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 401 {
            Self::Unauthorized { message }
        } else {
            Self::Status { status, message }
        }
    }

    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Unauthorized { .. } => FailureClass::Authentication,
            Self::Status { status, .. } => classify_status(*status),
            Self::Timeout(_) | Self::Connection(_) => FailureClass::Retryable,
            Self::Decode(_) | Self::Other(_) => FailureClass::Terminal,
        }
    }

    /// HTTP status behind the error, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend-provided message without the status prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message,
            Self::Timeout(message)
            | Self::Connection(message)
            | Self::Decode(message)
            | Self::Other(message) => message,
        }
    }
}

/// 408 and 429 are network-layer conditions and retry like 5xx.
#[must_use]
pub fn classify_status(status: u16) -> FailureClass {
    match status {
        401 => FailureClass::Authentication,
        408 | 429 => FailureClass::Retryable,
        500..=599 => FailureClass::Retryable,
        _ => FailureClass::Terminal,
    }
}
