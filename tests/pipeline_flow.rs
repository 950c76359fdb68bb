use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use task_backend::{BackendError, ChatBackend, OperationStatus, Role, SharedCredential};
use task_backend_mock::MockBackend;
use taskpilot::{
    BannerAction, BannerKind, ChatPipeline, DestructiveScope, GuidanceKind, PipelineError,
    SubmitOutcome,
};

fn pipeline(backend: &Arc<MockBackend>) -> ChatPipeline {
    ChatPipeline::new(
        Arc::clone(backend) as Arc<dyn ChatBackend>,
        SharedCredential::new(Some("token".to_string())),
        "America/New_York",
    )
}

#[tokio::test(start_paused = true)]
async fn local_classification_never_reaches_the_network() {
    let backend = Arc::new(MockBackend::new());
    let mut pipeline = pipeline(&backend);

    assert_eq!(pipeline.submit("   ").await, SubmitOutcome::Ignored);
    let SubmitOutcome::Guided(short) = pipeline.submit("k").await else {
        panic!("expected too-short guidance");
    };
    assert_eq!(short.kind, GuidanceKind::TooShort);
    assert!(matches!(pipeline.submit("good morning").await, SubmitOutcome::Guided(_)));
    assert!(matches!(
        pipeline.submit("play some jazz").await,
        SubmitOutcome::Guided(_)
    ));

    assert_eq!(backend.chat_call_count(), 0);
    assert!(pipeline
        .view()
        .messages()
        .iter()
        .all(|message| message.role == Role::Assistant));
    assert_eq!(pipeline.view().messages().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn accepted_confirmation_sends_the_original_text() {
    let backend = Arc::new(MockBackend::new());
    let mut pipeline = pipeline(&backend);

    let SubmitOutcome::NeedsConfirmation(intent) = pipeline.submit("delete all tasks").await else {
        panic!("expected confirmation");
    };
    assert_eq!(intent.scope, DestructiveScope::All);
    assert_eq!(backend.chat_call_count(), 0);
    assert!(pipeline.pending_confirmation().is_some());

    let outcome = pipeline.confirm_destructive().await;
    assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
    let calls = backend.chat_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.message, "delete all tasks");
    assert_eq!(calls[0].request.timezone, "America/New_York");
    assert!(pipeline.pending_confirmation().is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelled_confirmation_hands_back_the_text() {
    let backend = Arc::new(MockBackend::new());
    let mut pipeline = pipeline(&backend);

    let text = "Clear   ALL completed tasks please";
    assert!(matches!(
        pipeline.submit(text).await,
        SubmitOutcome::NeedsConfirmation(_)
    ));
    assert_eq!(pipeline.cancel_destructive().as_deref(), Some(text));
    assert_eq!(pipeline.confirm_destructive().await, SubmitOutcome::Ignored);
    assert_eq!(backend.chat_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn successful_turn_confirms_the_user_message() {
    let backend = Arc::new(MockBackend::new());
    let mut pipeline = pipeline(&backend);

    let outcome = pipeline.submit("add a task to call the dentist").await;
    let SubmitOutcome::Completed { message, reports } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "Echo: add a task to call the dentist");
    assert!(reports.is_empty());

    let messages = pipeline.view().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].status(), Some(OperationStatus::Success));
    assert_eq!(pipeline.view().conversation_id(), Some("mock-conversation"));

    pipeline.submit("show my tasks").await;
    assert_eq!(
        backend.chat_calls()[1].request.conversation_id.as_deref(),
        Some("mock-conversation")
    );
}

#[tokio::test(start_paused = true)]
async fn network_exhaustion_shows_a_retry_banner() {
    let backend = Arc::new(MockBackend::new());
    for _ in 0..4 {
        backend.push_chat_error(BackendError::from_status(503, "Service unavailable"));
    }
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    let mut pipeline = pipeline(&backend).with_retry_observer(move |attempt| {
        sink.lock().expect("notices").push(attempt.next_delay);
    });
    let started = tokio::time::Instant::now();

    let outcome = pipeline.submit("show my tasks").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Failed(PipelineError::NetworkExhausted {
            attempts: 4,
            message: "Service unavailable".to_string(),
        })
    );
    assert_eq!(started.elapsed(), Duration::from_millis(7_000));
    assert_eq!(
        *notices.lock().expect("notices"),
        vec![
            Duration::from_millis(1_000),
            Duration::from_millis(2_000),
            Duration::from_millis(4_000),
        ]
    );
    let banner = pipeline.banner().expect("banner");
    assert_eq!(banner.kind, BannerKind::Network);
    assert_eq!(banner.action, BannerAction::Retry);
    assert!(pipeline.view().messages().is_empty());

    assert!(matches!(
        pipeline.retry_last().await,
        SubmitOutcome::Completed { .. }
    ));
    assert_eq!(backend.chat_call_count(), 5);
    assert_eq!(pipeline.last_failed(), None);
}

#[tokio::test(start_paused = true)]
async fn dismissed_banner_stays_dismissed() {
    let backend = Arc::new(MockBackend::new());
    backend.push_chat_error(BackendError::from_status(400, "Message cannot be empty"));
    let mut pipeline = pipeline(&backend);

    pipeline.submit("show my tasks").await;
    assert!(pipeline.banner().is_some());
    pipeline.dismiss_banner();
    assert!(pipeline.banner().is_none());
    assert_eq!(pipeline.last_failed(), Some("show my tasks"));
}
