//! HTTP transport for the taskpilot chat and task backends.
//!
//! This crate owns request building, header construction, and response/error
//! parsing for the `/chat`, `/conversations/{id}/messages` and `/tasks/`
//! endpoints. Every call is a single attempt: retry policy and session
//! recovery live in the `taskpilot` pipeline, above this layer.
//!
//! [`TaskApiClient`] implements both [`task_backend::ChatBackend`] and
//! [`task_backend::TaskBackend`], mapping transport failures onto
//! [`task_backend::BackendError`] so the pipeline can classify them.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod url;

pub use client::TaskApiClient;
pub use config::TaskApiConfig;
pub use error::TaskApiError;
pub use url::{endpoint, normalize_base_url};
