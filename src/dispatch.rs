//! Sends one chat command through retry and session recovery.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use task_backend::{
    lock_unpoisoned, BackendError, ChatBackend, ChatReply, ChatRequest, CredentialSource,
    FailureClass,
};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::recovery::{PendingCommand, RecoveryState, SessionRecoveryController};
use crate::retry::{self, RetryAttempt, RetryError, RetryOptions};

/// Single-flight key for a command that has no conversation yet.
const NEW_CONVERSATION_KEY: &str = "";

type RetryObserver = Arc<dyn Fn(RetryAttempt) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(ChatReply),
    /// The credential expired; the command is held until re-authentication.
    PendingRecovery(PendingCommand),
    Failed(PipelineError),
    /// Another command for the same conversation is still outstanding.
    Busy,
}

pub struct CommandDispatcher {
    backend: Arc<dyn ChatBackend>,
    credentials: Arc<dyn CredentialSource>,
    timezone: String,
    retry: RetryOptions,
    observer: Option<RetryObserver>,
    recovery: Mutex<SessionRecoveryController>,
    in_flight: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("timezone", &self.timezone)
            .field("retry", &self.retry)
            .field("recovery", &*lock_unpoisoned(&self.recovery))
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        credentials: Arc<dyn CredentialSource>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            credentials,
            timezone: timezone.into(),
            retry: RetryOptions::default(),
            observer: None,
            recovery: Mutex::new(SessionRecoveryController::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Called before every backoff sleep, so retries are never silent.
    #[must_use]
    pub fn with_retry_observer(mut self, observer: impl Fn(RetryAttempt) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    #[must_use]
    pub fn recovery_state(&self) -> RecoveryState {
        lock_unpoisoned(&self.recovery).state().clone()
    }

    /// Sends `text`. While re-authentication is outstanding the command
    /// replaces the held one and nothing is sent.
    pub async fn send(&self, text: &str, conversation_id: Option<&str>) -> DispatchOutcome {
        let command = PendingCommand::new(text.trim(), conversation_id.map(str::to_owned));
        {
            let mut recovery = lock_unpoisoned(&self.recovery);
            if recovery.is_awaiting_reauth() {
                return match recovery.suspend(command.clone()) {
                    Ok(_) => DispatchOutcome::PendingRecovery(command),
                    Err(error) => {
                        warn!(%error, "could not hold command");
                        DispatchOutcome::Busy
                    }
                };
            }
            if matches!(recovery.state(), RecoveryState::Replaying(_)) {
                return DispatchOutcome::Busy;
            }
        }

        let Some(_guard) = self.acquire(conversation_id) else {
            debug!(
                conversation_id = conversation_id.unwrap_or(NEW_CONVERSATION_KEY),
                "command already in flight"
            );
            return DispatchOutcome::Busy;
        };

        match self.attempt(&command).await {
            Ok(reply) => DispatchOutcome::Completed(reply),
            Err(RetryError::Terminal { error, .. })
                if error.class() == FailureClass::Authentication =>
            {
                match lock_unpoisoned(&self.recovery).suspend(command.clone()) {
                    Ok(_) => DispatchOutcome::PendingRecovery(command),
                    Err(recovery_error) => {
                        warn!(%recovery_error, "could not hold command");
                        DispatchOutcome::Failed(PipelineError::AuthenticationExpired {
                            message: error.message().to_string(),
                        })
                    }
                }
            }
            Err(error) => DispatchOutcome::Failed(PipelineError::from_retry(error)),
        }
    }

    /// Resends the held command exactly once. `None` when nothing is held.
    ///
    /// The controller returns to `Active` whatever the outcome; an
    /// authentication failure here is reported as a rejection instead of
    /// starting another recovery cycle.
    pub async fn resume_after_reauth(&self) -> Option<DispatchOutcome> {
        let conversation_id = {
            let recovery = lock_unpoisoned(&self.recovery);
            match recovery.state() {
                RecoveryState::AwaitingReauth(command) => command.conversation_id.clone(),
                _ => return None,
            }
        };

        let Some(_guard) = self.acquire(conversation_id.as_deref()) else {
            return Some(DispatchOutcome::Busy);
        };
        let command = lock_unpoisoned(&self.recovery).begin_replay()?;

        let outcome = match self.attempt(&command).await {
            Ok(reply) => DispatchOutcome::Completed(reply),
            Err(RetryError::Terminal { error, .. })
                if error.class() == FailureClass::Authentication =>
            {
                warn!("replay rejected after re-authentication");
                DispatchOutcome::Failed(PipelineError::ServerRejected {
                    status: error.status(),
                    message: error.message().to_string(),
                })
            }
            Err(error) => DispatchOutcome::Failed(PipelineError::from_retry(error)),
        };

        lock_unpoisoned(&self.recovery).finish_replay();
        Some(outcome)
    }

    /// Drops the held command without sending it.
    pub fn cancel_recovery(&self) -> Option<PendingCommand> {
        lock_unpoisoned(&self.recovery).cancel()
    }

    async fn attempt(&self, command: &PendingCommand) -> Result<ChatReply, RetryError<BackendError>> {
        let Some(credential) = self.credentials.bearer() else {
            return Err(RetryError::Terminal {
                attempts: 0,
                error: BackendError::Unauthorized {
                    message: "no credential available".to_string(),
                },
            });
        };

        let request = ChatRequest {
            conversation_id: command.conversation_id.clone(),
            message: command.text.clone(),
            timezone: self.timezone.clone(),
        };
        let backend = Arc::clone(&self.backend);
        let observer = self.observer.clone();

        debug!(
            conversation_id = request.conversation_id.as_deref().unwrap_or(""),
            "dispatching chat command"
        );
        retry::execute_with_observer(
            || backend.send_message(&credential, &request),
            &self.retry,
            |attempt| {
                if let Some(observer) = &observer {
                    observer(attempt);
                }
            },
        )
        .await
    }

    fn acquire(&self, conversation_id: Option<&str>) -> Option<InFlightGuard<'_>> {
        let key = conversation_id.unwrap_or(NEW_CONVERSATION_KEY).to_string();
        let mut in_flight = lock_unpoisoned(&self.in_flight);
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key,
        })
    }
}

/// Releases the conversation's single-flight slot on drop.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(self.in_flight).remove(&self.key);
    }
}
