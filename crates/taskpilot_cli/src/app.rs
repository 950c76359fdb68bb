use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use panel_state::{default_state_path, PanelStateStore};
use task_api::{TaskApiClient, TaskApiConfig};
use task_backend::{
    lock_unpoisoned, ChatBackend, ChatMessage, Role, SharedCredential, TaskBackend, TaskDraft,
    TaskKey,
};
use task_backend_mock::MockBackend;
use taskpilot::{
    Banner, BannerAction, BannerKind, ChatPipeline, EnvConfig, PipelineError, RecoveryState,
    SubmitOutcome, TaskActions, TaskRecord,
};
use tracing::warn;

use crate::commands::{parse_slash_command, SlashCommand};

pub const BACKEND_ENV_VAR: &str = "TASKPILOT_BACKEND";

const HELP_TEXT: &str = "Commands: /help, /tasks, /add <title>, /done <id>, /delete <id>, /history, /more, /reauth <token>, /cancel, /retry, /panel, /quit";
const PROMPT: &str = "> ";
const CONFIRM_PROMPT: &str = "confirm [y/N]> ";
const REAUTH_PROMPT: &str = "sign in (/reauth <token>)> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Mock,
}

pub fn backend_kind_from_env() -> BackendKind {
    match env::var(BACKEND_ENV_VAR) {
        Ok(value) if value.trim().eq_ignore_ascii_case("mock") => BackendKind::Mock,
        _ => BackendKind::Http,
    }
}

/// Builds the app for `config`, wiring one credential and one task store
/// through both the chat and the direct task path.
pub fn app_from_config(config: &EnvConfig, kind: BackendKind) -> anyhow::Result<App> {
    let (chat, tasks): (Arc<dyn ChatBackend>, Arc<dyn TaskBackend>) = match kind {
        BackendKind::Mock => {
            let mock = Arc::new(MockBackend::new());
            (mock.clone(), mock)
        }
        BackendKind::Http => {
            let mut api = TaskApiConfig::new(config.api_url.clone());
            if let Some(timeout) = config.timeout {
                api = api.with_timeout(timeout);
            }
            let client = Arc::new(TaskApiClient::new(api).context("failed to build HTTP client")?);
            (client.clone(), client)
        }
    };

    let credential = SharedCredential::new(config.token.clone());
    let mut app = App::new(chat, tasks, credential, &config.timezone, config.retry);

    let panel_path = config.panel_state_path.clone().or_else(|| {
        env::var_os("HOME").map(|home| default_state_path(Path::new(&home)))
    });
    if let Some(path) = panel_path {
        app = app.with_panel_state_path(&path);
    }
    Ok(app)
}

pub struct App {
    pipeline: ChatPipeline,
    actions: TaskActions,
    panel: Option<PanelStateStore>,
    notices: Arc<Mutex<Vec<String>>>,
    pub should_exit: bool,
}

impl App {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        tasks: Arc<dyn TaskBackend>,
        credential: SharedCredential,
        timezone: &str,
        retry: taskpilot::RetryOptions,
    ) -> Self {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        let pipeline = ChatPipeline::new(chat, credential.clone(), timezone)
            .with_retry_options(retry)
            .with_retry_observer(move |attempt| {
                lock_unpoisoned(&sink).push(format!(
                    "Connection problem; retrying in {}s (attempt {} failed)",
                    attempt.next_delay.as_secs_f64(),
                    attempt.attempt_number
                ));
            });
        let actions = TaskActions::new(tasks, Arc::new(credential), pipeline.store().clone())
            .with_retry_options(retry);

        Self {
            pipeline,
            actions,
            panel: None,
            notices,
            should_exit: false,
        }
    }

    /// Enables the persisted panel flag. An unreadable file is logged and ignored.
    #[must_use]
    pub fn with_panel_state_path(mut self, path: &Path) -> Self {
        match PanelStateStore::open(path) {
            Ok(store) => self.panel = Some(store),
            Err(error) => warn!(%error, "panel state unavailable"),
        }
        self
    }

    #[must_use]
    pub fn pipeline(&self) -> &ChatPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn prompt(&self) -> &'static str {
        if self.pipeline.pending_confirmation().is_some() {
            CONFIRM_PROMPT
        } else if matches!(self.pipeline.recovery_state(), RecoveryState::AwaitingReauth(_)) {
            REAUTH_PROMPT
        } else {
            PROMPT
        }
    }

    /// Startup output: help plus the conversation when the panel was left open.
    pub async fn start(&mut self) -> Vec<String> {
        let mut out = vec![HELP_TEXT.to_string()];
        if self.panel.as_ref().is_some_and(PanelStateStore::is_open) {
            self.show_history(&mut out).await;
        }
        out
    }

    pub async fn on_line(&mut self, line: &str) -> Vec<String> {
        let mut out = Vec::new();
        match parse_slash_command(line) {
            Some(command) => self.on_command(command, &mut out).await,
            None if self.pipeline.pending_confirmation().is_some() => {
                self.on_confirmation_reply(line, &mut out).await;
            }
            None => {
                let outcome = self.pipeline.submit(line).await;
                self.render_outcome(outcome, &mut out);
            }
        }
        out
    }

    async fn on_confirmation_reply(&mut self, line: &str, out: &mut Vec<String>) {
        let answer = line.trim().to_ascii_lowercase();
        if answer == "y" || answer == "yes" {
            let outcome = self.pipeline.confirm_destructive().await;
            self.render_outcome(outcome, out);
        } else if let Some(text) = self.pipeline.cancel_destructive() {
            out.push(format!("Cancelled. Nothing was changed. Your command was: {text}"));
        }
    }

    async fn on_command(&mut self, command: SlashCommand, out: &mut Vec<String>) {
        match command {
            SlashCommand::Help => out.push(HELP_TEXT.to_string()),
            SlashCommand::Quit => self.should_exit = true,
            SlashCommand::Tasks => match self.actions.refresh().await {
                Ok(0) => out.push("No tasks yet.".to_string()),
                Ok(_) => out.extend(self.actions.store().snapshot().iter().map(render_task)),
                Err(error) => out.push(render_error(&error)),
            },
            SlashCommand::Add(title) => match self.actions.create(&TaskDraft::new(title)).await {
                Ok(record) => out.push(format!("Added '{}' (#{})", record.title, record.id)),
                Err(error) => out.push(render_error(&error)),
            },
            SlashCommand::Done(argument) => {
                let Some(id) = parse_task_id(&argument, "/done", out) else {
                    return;
                };
                match self.actions.set_completed(id, true).await {
                    Ok(record) => out.push(format!("Completed '{}'", record.title)),
                    Err(failure) => {
                        out.push(render_error(&failure.error));
                        if let Some(previous) = failure.previous {
                            self.actions.store().restore(previous);
                            out.push(format!("Task {id} was restored to its previous state."));
                        }
                    }
                }
            }
            SlashCommand::Delete(argument) => {
                let Some(id) = parse_task_id(&argument, "/delete", out) else {
                    return;
                };
                match self.actions.delete(id).await {
                    Ok(Some(record)) => out.push(format!("Deleted '{}'", record.title)),
                    Ok(None) => out.push(format!("Deleted task {id}")),
                    Err(failure) => out.push(render_error(&failure.error)),
                }
            }
            SlashCommand::History => self.show_history(out).await,
            SlashCommand::More => match self.pipeline.load_more_history().await {
                Ok(0) => out.push("No older messages.".to_string()),
                Ok(added) => {
                    out.push(format!("Loaded {added} older messages:"));
                    out.extend(self.pipeline.view().messages()[..added].iter().map(render_message));
                }
                Err(error) => out.push(render_error(&error)),
            },
            SlashCommand::Reauth(token) => {
                if token.is_empty() {
                    out.push("usage: /reauth <token>".to_string());
                    return;
                }
                match self.pipeline.reauthenticated(&token).await {
                    SubmitOutcome::Ignored => out.push("Signed in.".to_string()),
                    outcome => self.render_outcome(outcome, out),
                }
            }
            SlashCommand::Cancel => match self.pipeline.cancel_recovery() {
                Some(text) => out.push(format!("Dropped held command: {text}")),
                None => out.push("Nothing to cancel.".to_string()),
            },
            SlashCommand::Retry => match self.pipeline.retry_last().await {
                SubmitOutcome::Ignored => out.push("Nothing to retry.".to_string()),
                outcome => self.render_outcome(outcome, out),
            },
            SlashCommand::Panel => self.toggle_panel(out).await,
            SlashCommand::Unknown(name) => out.push(format!("Unknown command {name}. {HELP_TEXT}")),
        }
    }

    async fn toggle_panel(&mut self, out: &mut Vec<String>) {
        let Some(panel) = self.panel.as_mut() else {
            out.push("Panel state is not persisted in this session.".to_string());
            return;
        };
        match panel.toggle() {
            Ok(true) => self.show_history(out).await,
            Ok(false) => out.push("Panel closed.".to_string()),
            Err(error) => out.push(format!("error: {error}")),
        }
    }

    async fn show_history(&mut self, out: &mut Vec<String>) {
        match self.pipeline.open_panel().await {
            Ok(0) => out.push("No conversation yet.".to_string()),
            Ok(_) => {
                out.extend(self.pipeline.view().messages().iter().map(render_message));
                if self.pipeline.view().has_more() {
                    out.push("(/more for older messages)".to_string());
                }
            }
            Err(error) => out.push(render_error(&error)),
        }
    }

    fn render_outcome(&mut self, outcome: SubmitOutcome, out: &mut Vec<String>) {
        out.append(&mut lock_unpoisoned(&self.notices));
        match outcome {
            SubmitOutcome::Ignored => {}
            SubmitOutcome::Guided(guidance) => out.push(guidance.render()),
            SubmitOutcome::NeedsConfirmation(intent) => {
                out.push(intent.confirmation_message);
                out.push(format!("Affected: {}", intent.estimated_affected));
                out.push("Type y to confirm, anything else to cancel.".to_string());
            }
            SubmitOutcome::Completed { message, reports } => {
                out.push(render_message(&message));
                out.extend(reports.iter().map(|report| format!("  - {}", report.line())));
            }
            SubmitOutcome::AwaitingReauth => {
                if let Some(banner) = self.pipeline.banner() {
                    out.push(render_banner(banner));
                }
            }
            SubmitOutcome::Busy => out.push("Still sending your previous message.".to_string()),
            SubmitOutcome::Failed(error) => match self.pipeline.banner() {
                Some(banner) => out.push(render_banner(banner)),
                None => out.push(render_error(&error)),
            },
        }
    }
}

fn parse_task_id(argument: &str, command: &str, out: &mut Vec<String>) -> Option<TaskKey> {
    match argument.trim_start_matches('#').parse::<TaskKey>() {
        Ok(id) => Some(id),
        Err(_) => {
            out.push(format!("usage: {command} <task id>"));
            None
        }
    }
}

fn render_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!("{speaker}: {}", message.content)
}

fn render_task(record: &TaskRecord) -> String {
    let mark = if record.completed { "x" } else { " " };
    let mut line = format!("[{mark}] #{} {} ({:?})", record.id, record.title, record.priority);
    if let Some(due) = &record.due_date {
        line.push_str(&format!(" due {due}"));
    }
    line
}

fn render_banner(banner: &Banner) -> String {
    let label = match banner.kind {
        BannerKind::Network => "network",
        BannerKind::Authentication => "session",
        BannerKind::Server => "server",
    };
    let hint = match banner.action {
        BannerAction::Retry => "/retry to send it again",
        BannerAction::Reauthenticate => "/reauth <token> to continue, /cancel to drop it",
        BannerAction::Dismiss => "",
    };
    if hint.is_empty() {
        format!("[{label}] {}", banner.message)
    } else {
        format!("[{label}] {} ({hint})", banner.message)
    }
}

fn render_error(error: &PipelineError) -> String {
    format!("error: {error}")
}

