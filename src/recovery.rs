//! Credential-expiry recovery as an explicit three-state machine.

use thiserror::Error;
use tracing::info;

use crate::clock::now_rfc3339;

/// The command held while re-authentication is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub text: String,
    pub conversation_id: Option<String>,
    pub created_at: String,
}

impl PendingCommand {
    #[must_use]
    pub fn new(text: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id,
            created_at: now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecoveryState {
    #[default]
    Active,
    AwaitingReauth(PendingCommand),
    Replaying(PendingCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    #[error("a replay is already in progress")]
    ReplayInProgress,
}

#[derive(Debug, Default)]
pub struct SessionRecoveryController {
    state: RecoveryState,
}

impl SessionRecoveryController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    #[must_use]
    pub fn is_awaiting_reauth(&self) -> bool {
        matches!(self.state, RecoveryState::AwaitingReauth(_))
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingCommand> {
        match &self.state {
            RecoveryState::Active => None,
            RecoveryState::AwaitingReauth(command) | RecoveryState::Replaying(command) => {
                Some(command)
            }
        }
    }

    /// Enters `AwaitingReauth` holding `command`. A previously held command
    /// is overwritten and returned.
    pub fn suspend(
        &mut self,
        command: PendingCommand,
    ) -> Result<Option<PendingCommand>, RecoveryError> {
        let replaced = match std::mem::take(&mut self.state) {
            RecoveryState::Active => None,
            RecoveryState::AwaitingReauth(previous) => Some(previous),
            replaying @ RecoveryState::Replaying(_) => {
                self.state = replaying;
                return Err(RecoveryError::ReplayInProgress);
            }
        };
        info!(
            conversation_id = command.conversation_id.as_deref().unwrap_or(""),
            replaced = replaced.is_some(),
            "session expired; holding command for replay"
        );
        self.state = RecoveryState::AwaitingReauth(command);
        Ok(replaced)
    }

    /// `AwaitingReauth -> Replaying`. Returns the command to resend once.
    pub fn begin_replay(&mut self) -> Option<PendingCommand> {
        match std::mem::take(&mut self.state) {
            RecoveryState::AwaitingReauth(command) => {
                info!("re-authenticated; replaying held command");
                self.state = RecoveryState::Replaying(command.clone());
                Some(command)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// `Replaying -> Active`, whatever the replay's outcome.
    pub fn finish_replay(&mut self) {
        if matches!(self.state, RecoveryState::Replaying(_)) {
            self.state = RecoveryState::Active;
        }
    }

    /// `AwaitingReauth -> Active`; the held command is discarded unsent.
    pub fn cancel(&mut self) -> Option<PendingCommand> {
        match std::mem::take(&mut self.state) {
            RecoveryState::AwaitingReauth(command) => {
                info!("recovery cancelled; discarding held command");
                Some(command)
            }
            other => {
                self.state = other;
                None
            }
        }
    }
}
