//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryOptions;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    NotPositive { key: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timezone: String,
    pub timeout: Option<Duration>,
    pub retry: RetryOptions,
    pub panel_state_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut retry = RetryOptions::default();
        if let Some(max_retries) = env_parse::<u32>("TASKPILOT_MAX_RETRIES")? {
            retry = retry.with_max_retries(max_retries);
        }
        if let Some(millis) = env_parse::<u64>("TASKPILOT_INITIAL_DELAY_MS")? {
            retry = retry.with_initial_delay(Duration::from_millis(millis));
        }
        if let Some(millis) = env_parse::<u64>("TASKPILOT_MAX_DELAY_MS")? {
            retry = retry.with_max_delay(Duration::from_millis(millis));
        }

        let timeout = match env_parse::<u64>("TASKPILOT_TIMEOUT_SEC")? {
            Some(0) => {
                return Err(ConfigError::NotPositive {
                    key: "TASKPILOT_TIMEOUT_SEC",
                })
            }
            Some(seconds) => Some(Duration::from_secs(seconds)),
            None => None,
        };

        Ok(Self {
            api_url: env_string_opt("TASKPILOT_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token: env_string_opt("TASKPILOT_TOKEN"),
            timezone: env_string_opt("TASKPILOT_TIMEZONE")
                .or_else(|| env_string_opt("TZ"))
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            timeout,
            retry,
            panel_state_path: env_string_opt("TASKPILOT_PANEL_STATE").map(PathBuf::from),
        })
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string_opt(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(None),
    }
}
