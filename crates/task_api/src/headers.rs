use std::collections::BTreeMap;

use crate::config::TaskApiConfig;
use crate::error::TaskApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_TIMEZONE: &str = "x-timezone";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for an authenticated request.
///
/// `timezone` is attached only to chat requests; the task endpoints do not
/// interpret relative dates.
pub fn build_headers(
    config: &TaskApiConfig,
    credential: &str,
    timezone: Option<&str>,
) -> Result<BTreeMap<String, String>, TaskApiError> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(TaskApiError::MissingCredential);
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {credential}"),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), "application/json".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = match config.user_agent.as_deref() {
        Some(explicit) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    if let Some(timezone) = timezone.map(str::trim).filter(|value| !value.is_empty()) {
        headers.insert(HEADER_TIMEZONE.to_owned(), timezone.to_owned());
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn default_user_agent() -> String {
    format!(
        "taskpilot/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" => "x64".to_owned(),
        "x86" | "i386" | "i686" => "ia32".to_owned(),
        "aarch64" => "arm64".to_owned(),
        normalized => normalized.to_owned(),
    }
}
