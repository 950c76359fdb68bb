//! The chat surface's entry point.
//!
//! [`ChatPipeline`] wires the intent gate, the confirmation gate, the
//! dispatcher with its recovery controller, the history loader and the shared
//! task store behind a handful of user-level operations. Each operation
//! updates the displayed conversation and the banner before it returns.

use std::sync::Arc;

use task_backend::{ChatBackend, ChatMessage, SharedCredential};
use tracing::{debug, info};

use crate::confirm::{ConfirmationGate, PendingConfirmation};
use crate::conversation::ConversationView;
use crate::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::error::PipelineError;
use crate::history::{HistoryLoader, DEFAULT_HISTORY_LIMIT};
use crate::intent::{DestructiveIntent, Guidance, IntentDecision, IntentGate, IntentPolicy};
use crate::recovery::RecoveryState;
use crate::retry::{RetryAttempt, RetryOptions};
use crate::store::{OperationReport, TaskStore};

const SESSION_EXPIRED: &str = "Your session has expired. Sign in again to send your message.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Network,
    Authentication,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerAction {
    Retry,
    Reauthenticate,
    Dismiss,
}

/// Failure notice shown above the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    pub action: BannerAction,
}

impl Banner {
    fn for_error(error: &PipelineError) -> Option<Self> {
        let (kind, action) = match error {
            PipelineError::AuthenticationExpired { .. } => {
                (BannerKind::Authentication, BannerAction::Reauthenticate)
            }
            PipelineError::NetworkExhausted { .. } => (BannerKind::Network, BannerAction::Retry),
            PipelineError::ServerRejected { .. } => (BannerKind::Server, BannerAction::Retry),
            _ => return None,
        };
        Some(Self {
            kind,
            message: error.to_string(),
            action,
        })
    }

    fn session_expired() -> Self {
        Self {
            kind: BannerKind::Authentication,
            message: SESSION_EXPIRED.to_string(),
            action: BannerAction::Reauthenticate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to do: blank input or no pending work.
    Ignored,
    Guided(Guidance),
    NeedsConfirmation(DestructiveIntent),
    Completed {
        message: ChatMessage,
        reports: Vec<OperationReport>,
    },
    /// Held until re-authentication.
    AwaitingReauth,
    Busy,
    Failed(PipelineError),
}

impl SubmitOutcome {
    /// Set when at least one reported operation failed.
    #[must_use]
    pub fn partial_failure(&self) -> Option<PipelineError> {
        match self {
            Self::Completed { reports, .. } => PipelineError::from_reports(reports),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ChatPipeline {
    gate: IntentGate,
    confirmation: ConfirmationGate,
    dispatcher: CommandDispatcher,
    history: HistoryLoader,
    store: TaskStore,
    view: ConversationView,
    banner: Option<Banner>,
    last_failed: Option<String>,
    credential: SharedCredential,
    history_limit: usize,
}

impl ChatPipeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        credential: SharedCredential,
        timezone: impl Into<String>,
    ) -> Self {
        let credentials = Arc::new(credential.clone());
        Self {
            gate: IntentGate::new(),
            confirmation: ConfirmationGate::new(),
            dispatcher: CommandDispatcher::new(Arc::clone(&backend), credentials.clone(), timezone),
            history: HistoryLoader::new(backend, credentials),
            store: TaskStore::new(),
            view: ConversationView::new(),
            banner: None,
            last_failed: None,
            credential,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.dispatcher = self.dispatcher.with_retry_options(retry);
        self.history = self.history.with_retry_options(retry);
        self
    }

    #[must_use]
    pub fn with_retry_observer(
        mut self,
        observer: impl Fn(RetryAttempt) + Send + Sync + 'static,
    ) -> Self {
        self.dispatcher = self.dispatcher.with_retry_observer(observer);
        self
    }

    #[must_use]
    pub fn with_intent_policy(mut self, policy: impl IntentPolicy + 'static) -> Self {
        self.gate = IntentGate::with_policy(policy);
        self
    }

    /// Shares `store` with other mutation sources such as direct UI actions.
    #[must_use]
    pub fn with_store(mut self, store: TaskStore) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Continues an existing conversation.
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.view.set_conversation_id(conversation_id);
        self
    }

    #[must_use]
    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    #[must_use]
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    #[must_use]
    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    #[must_use]
    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.confirmation.pending()
    }

    #[must_use]
    pub fn recovery_state(&self) -> RecoveryState {
        self.dispatcher.recovery_state()
    }

    /// Text of the last command that failed and may be retried.
    #[must_use]
    pub fn last_failed(&self) -> Option<&str> {
        self.last_failed.as_deref()
    }

    #[must_use]
    pub fn timezone(&self) -> &str {
        self.dispatcher.timezone()
    }

    /// Classifies `text` and dispatches it when the gate allows.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        if let Some(pending) = self.confirmation.pending() {
            return SubmitOutcome::Failed(PipelineError::ConfirmationRequired {
                message: pending.intent.confirmation_message.clone(),
            });
        }

        match self.gate.classify(text) {
            IntentDecision::Reject(rejection) => match rejection.guidance {
                Some(guidance) => self.guide(guidance),
                None => SubmitOutcome::Ignored,
            },
            IntentDecision::Guide(guidance) => self.guide(guidance),
            IntentDecision::ConfirmDestructive(intent) => {
                match self.confirmation.open(text, intent.clone()) {
                    Ok(_) => {
                        self.view.push_guidance(intent.confirmation_message.clone());
                        SubmitOutcome::NeedsConfirmation(intent)
                    }
                    Err(error) => SubmitOutcome::Failed(error),
                }
            }
            IntentDecision::Dispatchable(command) => self.dispatch(command).await,
        }
    }

    /// Sends the held destructive command exactly as it was typed.
    pub async fn confirm_destructive(&mut self) -> SubmitOutcome {
        match self.confirmation.accept() {
            Some(text) => self.dispatch(text).await,
            None => SubmitOutcome::Ignored,
        }
    }

    /// Drops the held destructive command and returns its text unmodified.
    pub fn cancel_destructive(&mut self) -> Option<String> {
        self.confirmation.cancel()
    }

    /// Installs a fresh credential and replays the held command once.
    pub async fn reauthenticated(&mut self, credential: &str) -> SubmitOutcome {
        self.credential.set(credential);
        if self.banner.as_ref().map(|banner| banner.kind) == Some(BannerKind::Authentication) {
            self.banner = None;
        }

        let RecoveryState::AwaitingReauth(command) = self.dispatcher.recovery_state() else {
            return SubmitOutcome::Ignored;
        };
        info!("replaying command after re-authentication");
        let local_id = self.view.push_optimistic_user(&command.text);
        let outcome = self
            .dispatcher
            .resume_after_reauth()
            .await
            .unwrap_or(DispatchOutcome::Busy);
        self.settle(&local_id, command.text, outcome)
    }

    /// Abandons the held command. Returns its text.
    pub fn cancel_recovery(&mut self) -> Option<String> {
        let command = self.dispatcher.cancel_recovery()?;
        self.banner = None;
        Some(command.text)
    }

    /// Resends the last failed command.
    pub async fn retry_last(&mut self) -> SubmitOutcome {
        match self.last_failed.take() {
            Some(text) => {
                self.banner = None;
                self.dispatch(text).await
            }
            None => SubmitOutcome::Ignored,
        }
    }

    /// Loads the newest history window. Returns the number of messages shown.
    pub async fn open_panel(&mut self) -> Result<usize, PipelineError> {
        let Some(conversation_id) = self.view.conversation_id().map(str::to_owned) else {
            return Ok(0);
        };
        let window = self
            .history
            .load(&conversation_id, self.history_limit, 0)
            .await
            .inspect_err(|error| self.banner = Banner::for_error(error))?;
        let count = window.messages.len();
        self.view.reset_with(window);
        Ok(count)
    }

    /// Prepends the next older window. Returns how many messages were added.
    pub async fn load_more_history(&mut self) -> Result<usize, PipelineError> {
        let Some(conversation_id) = self.view.conversation_id().map(str::to_owned) else {
            return Ok(0);
        };
        if !self.view.has_more() {
            return Ok(0);
        }
        let window = self
            .history
            .load(&conversation_id, self.history_limit, self.view.next_offset())
            .await
            .inspect_err(|error| self.banner = Banner::for_error(error))?;
        Ok(self.view.prepend_history(window))
    }

    fn guide(&mut self, guidance: Guidance) -> SubmitOutcome {
        self.view.push_guidance(guidance.render());
        SubmitOutcome::Guided(guidance)
    }

    async fn dispatch(&mut self, text: String) -> SubmitOutcome {
        let local_id = self.view.push_optimistic_user(text.trim());
        let conversation_id = self.view.conversation_id().map(str::to_owned);
        let outcome = self.dispatcher.send(&text, conversation_id.as_deref()).await;
        self.settle(&local_id, text, outcome)
    }

    fn settle(&mut self, local_id: &str, text: String, outcome: DispatchOutcome) -> SubmitOutcome {
        match outcome {
            DispatchOutcome::Completed(reply) => {
                self.view.set_conversation_id(reply.conversation_id.clone());
                self.view.confirm_user(local_id);
                self.view.push_assistant(reply.message.clone());
                let reports = self.store.apply_operations(&reply.operations);
                self.banner = None;
                self.last_failed = None;
                debug!(operations = reports.len(), "chat command completed");
                SubmitOutcome::Completed {
                    message: reply.message,
                    reports,
                }
            }
            DispatchOutcome::PendingRecovery(_) => {
                self.view.retract(local_id);
                self.banner = Some(Banner::session_expired());
                SubmitOutcome::AwaitingReauth
            }
            DispatchOutcome::Failed(error) => {
                self.view.retract(local_id);
                self.banner = Banner::for_error(&error);
                if error.is_retriable() {
                    self.last_failed = Some(text);
                }
                SubmitOutcome::Failed(error)
            }
            DispatchOutcome::Busy => {
                self.view.retract(local_id);
                SubmitOutcome::Busy
            }
        }
    }
}
