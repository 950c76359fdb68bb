//! Bounded exponential-backoff retry for outbound calls.
//!
//! Authentication failures and definitive rejections are returned after the
//! first attempt; only transient failures are retried. Delays follow
//! `initial_delay * multiplier^n`, capped at `max_delay`, without jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use task_backend::{BackendError, FailureClass};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryOptions {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(8_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// The sleeps a fully failing run would take, in order.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let mut current = self.initial_delay;
        (0..self.max_retries)
            .map(|_| {
                let delay = current.min(self.max_delay);
                current = self.grow(current);
                delay
            })
            .collect()
    }

    fn grow(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Reported to the observer before each backoff sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based number of the attempt that just failed.
    pub attempt_number: u32,
    /// Sleep before the next attempt.
    pub next_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// The failure is not retryable; no further attempt was made.
    #[error("{error}")]
    Terminal { attempts: u32, error: E },

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Terminal { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn error(&self) -> &E {
        match self {
            Self::Terminal { error, .. } => error,
            Self::Exhausted { last_error, .. } => last_error,
        }
    }

    #[must_use]
    pub fn into_error(self) -> E {
        match self {
            Self::Terminal { error, .. } => error,
            Self::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Decides whether a failure may be retried.
pub trait Classify {
    fn failure_class(&self) -> FailureClass;
}

impl Classify for BackendError {
    fn failure_class(&self) -> FailureClass {
        self.class()
    }
}

pub async fn execute<T, E, F, Fut>(operation: F, options: &RetryOptions) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    execute_with_observer(operation, options, |_| {}).await
}

pub async fn execute_with_observer<T, E, F, Fut, Obs>(
    mut operation: F,
    options: &RetryOptions,
    mut observer: Obs,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
    Obs: FnMut(RetryAttempt),
{
    let mut attempt: u32 = 0;
    let mut current_delay = options.initial_delay;

    loop {
        attempt = attempt.saturating_add(1);
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.failure_class() != FailureClass::Retryable {
            debug!(attempt, %error, "terminal failure; not retrying");
            return Err(RetryError::Terminal {
                attempts: attempt,
                error,
            });
        }

        if attempt > options.max_retries {
            warn!(attempt, %error, "retry budget exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        let delay = current_delay.min(options.max_delay);
        warn!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            %error,
            "transient failure; backing off"
        );
        observer(RetryAttempt {
            attempt_number: attempt,
            next_delay: delay,
        });
        tokio::time::sleep(delay).await;
        current_delay = options.grow(current_delay);
    }
}
