use std::sync::Arc;

use pretty_assertions::assert_eq;
use task_backend::{ChatBackend, Role, SharedCredential};
use task_backend_mock::MockBackend;
use taskpilot::{BannerAction, ChatPipeline, PipelineError, RecoveryState, SubmitOutcome};

fn pipeline(backend: &Arc<MockBackend>, token: &str) -> ChatPipeline {
    ChatPipeline::new(
        Arc::clone(backend) as Arc<dyn ChatBackend>,
        SharedCredential::new(Some(token.to_string())),
        "UTC",
    )
}

#[tokio::test(start_paused = true)]
async fn expired_session_holds_command_and_replays_exactly_once() {
    let backend = Arc::new(MockBackend::new().accept_only("fresh"));
    let mut pipeline = pipeline(&backend, "stale");

    let outcome = pipeline.submit("add a task to renew passport").await;
    assert_eq!(outcome, SubmitOutcome::AwaitingReauth);
    assert_eq!(backend.chat_call_count(), 1);
    assert!(pipeline.view().messages().is_empty(), "optimistic message retracted");
    assert_eq!(
        pipeline.banner().map(|banner| banner.action),
        Some(BannerAction::Reauthenticate)
    );
    assert!(matches!(
        pipeline.recovery_state(),
        RecoveryState::AwaitingReauth(ref command) if command.text == "add a task to renew passport"
    ));

    let replay = pipeline.reauthenticated("fresh").await;
    let SubmitOutcome::Completed { message, .. } = replay else {
        panic!("expected replay to complete, got {replay:?}");
    };
    assert_eq!(message.content, "Echo: add a task to renew passport");
    assert_eq!(backend.chat_call_count(), 2);
    assert_eq!(pipeline.recovery_state(), RecoveryState::Active);
    assert!(pipeline.banner().is_none());

    let roles = pipeline
        .view()
        .messages()
        .iter()
        .map(|message| message.role)
        .collect::<Vec<_>>();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);

    assert_eq!(pipeline.reauthenticated("fresh").await, SubmitOutcome::Ignored);
    assert_eq!(backend.chat_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_recovery_discards_without_replay() {
    let backend = Arc::new(MockBackend::new().accept_only("fresh"));
    let mut pipeline = pipeline(&backend, "stale");

    pipeline.submit("show my tasks").await;
    assert_eq!(pipeline.cancel_recovery().as_deref(), Some("show my tasks"));
    assert_eq!(pipeline.recovery_state(), RecoveryState::Active);
    assert!(pipeline.banner().is_none());

    assert_eq!(pipeline.reauthenticated("fresh").await, SubmitOutcome::Ignored);
    assert_eq!(backend.chat_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn latest_command_wins_while_awaiting_reauth() {
    let backend = Arc::new(MockBackend::new().accept_only("fresh"));
    let mut pipeline = pipeline(&backend, "stale");

    pipeline.submit("add a task to buy milk").await;
    assert_eq!(
        pipeline.submit("add a task to buy eggs").await,
        SubmitOutcome::AwaitingReauth
    );
    assert_eq!(backend.chat_call_count(), 1, "no send while awaiting re-auth");

    pipeline.reauthenticated("fresh").await;
    let sent = backend
        .chat_calls()
        .into_iter()
        .map(|call| call.request.message)
        .collect::<Vec<_>>();
    assert_eq!(sent, vec!["add a task to buy milk", "add a task to buy eggs"]);
}

#[tokio::test(start_paused = true)]
async fn second_auth_failure_after_replay_is_an_ordinary_error() {
    let backend = Arc::new(MockBackend::new().accept_only("fresh"));
    let mut pipeline = pipeline(&backend, "stale");

    pipeline.submit("show my tasks").await;
    let outcome = pipeline.reauthenticated("still-wrong").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Failed(PipelineError::ServerRejected {
            status: Some(401),
            message: "Could not validate credentials".to_string(),
        })
    );
    assert_eq!(pipeline.recovery_state(), RecoveryState::Active);
    assert_eq!(backend.chat_call_count(), 2);
    assert_eq!(pipeline.last_failed(), Some("show my tasks"));
}
