//! Client-side command pipeline for a chat-driven task manager.
//!
//! Chat input passes through an intent gate before it can reach the network.
//! Dispatchable commands go to the chat backend through a bounded retry
//! executor; an expired credential parks the command until the user signs in
//! again, after which it is replayed once. Operations the backend reports are
//! reconciled into a single [`TaskStore`] that direct UI actions share.
//!
//! # Public API Overview
//! - [`ChatPipeline`] is the entry point for a chat surface.
//! - [`IntentGate`] and [`ConfirmationGate`] classify and hold input locally.
//! - [`CommandDispatcher`] and [`SessionRecoveryController`] send and recover.
//! - [`TaskStore`] and [`TaskActions`] keep the task list consistent.
//! - [`HistoryLoader`] and [`ConversationView`] page through past messages.

pub mod actions;
pub mod clock;
pub mod config;
pub mod confirm;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod intent;
pub mod logging;
pub mod pipeline;
pub mod recovery;
pub mod retry;
pub mod store;

pub use crate::actions::{validate_draft, MutationFailed, TaskActions};
pub use crate::config::{ConfigError, EnvConfig};
pub use crate::confirm::{ConfirmationGate, PendingConfirmation};
pub use crate::conversation::ConversationView;
pub use crate::dispatch::{CommandDispatcher, DispatchOutcome};
pub use crate::error::{PipelineError, ReconcileError};
pub use crate::history::{HistoryLoader, HistoryWindow, DEFAULT_HISTORY_LIMIT};
pub use crate::intent::{
    DestructiveCategory, DestructiveIntent, DestructiveOperation, DestructiveScope, Guidance,
    GuidanceKind, IntentDecision, IntentGate, IntentPolicy, LexicalPolicy, RejectReason,
    Rejection, UnsupportedCategory,
};
pub use crate::pipeline::{Banner, BannerAction, BannerKind, ChatPipeline, SubmitOutcome};
pub use crate::recovery::{PendingCommand, RecoveryError, RecoveryState, SessionRecoveryController};
pub use crate::retry::{Classify, RetryAttempt, RetryError, RetryOptions};
pub use crate::store::{OperationReport, ReportOutcome, TaskId, TaskRecord, TaskStore};

pub use task_backend::{
    BackendError, ChatBackend, ChatMessage, ChatReply, CredentialSource, FailureClass, Priority,
    SharedCredential, TaskBackend, TaskDraft, TaskDto, TaskKey, TaskOperation, TaskPatch,
};
