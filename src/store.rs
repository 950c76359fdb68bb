//! The shared task collection and its reconciliation rules.
//!
//! Every mutation, whether it comes from a direct UI action or from an
//! operation reported by the chat backend, goes through [`TaskStore`]. Clones
//! share one collection, so both sources converge on the same instance.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use task_backend::{
    lock_unpoisoned, OperationStatus, OperationType, Priority, TaskDraft, TaskDto, TaskKey,
    TaskOperation, TaskPatch,
};
use tracing::{debug, warn};

use crate::clock::local_id;
use crate::error::ReconcileError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Local id of an optimistic create awaiting confirmation.
    Temp(String),
    Server(TaskKey),
}

impl TaskId {
    #[must_use]
    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    #[must_use]
    pub fn server_id(&self) -> Option<TaskKey> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temp(id) => write!(f, "{id}"),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub completed: bool,
    pub due_date: Option<String>,
}

impl TaskRecord {
    #[must_use]
    pub fn from_dto(task: TaskDto) -> Self {
        Self {
            id: TaskId::Server(task.id),
            title: task.title,
            description: task.description,
            priority: task.priority,
            completed: task.completed,
            due_date: task.due_date,
        }
    }

    fn optimistic(id: String, draft: &TaskDraft) -> Self {
        Self {
            id: TaskId::Temp(id),
            title: draft.title.clone(),
            description: draft.description.clone(),
            priority: draft.priority,
            completed: false,
            due_date: draft.due_date.clone(),
        }
    }

    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.id.is_temp()
    }

    fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = Some(due_date.clone());
        }
    }

    fn same_title(&self, title: &str) -> bool {
        self.title.trim().eq_ignore_ascii_case(title.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied,
    /// Reported as failed by the backend; the collection was not reverted
    /// unless the failure was a create.
    Failed(String),
    /// Nothing to apply (pending status or no payload).
    Skipped,
}

/// Per-operation result of [`TaskStore::apply_operations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub kind: OperationType,
    pub task_id: Option<TaskKey>,
    pub title: Option<String>,
    pub outcome: ReportOutcome,
}

impl OperationReport {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Failed(_))
    }

    /// One user-facing line describing this operation.
    #[must_use]
    pub fn line(&self) -> String {
        let subject = match (&self.title, self.task_id) {
            (Some(title), _) => format!("'{title}'"),
            (None, Some(id)) => format!("task {id}"),
            (None, None) => "task".to_string(),
        };
        let verb = match self.kind {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::MarkComplete => "complete",
            OperationType::List => "list",
        };
        match &self.outcome {
            ReportOutcome::Applied if self.kind == OperationType::List => "Listed tasks".to_string(),
            ReportOutcome::Applied => format!("{} {subject}", past_tense(self.kind)),
            ReportOutcome::Failed(message) => format!("Failed to {verb} {subject}: {message}"),
            ReportOutcome::Skipped => format!("No change for {subject} ({verb} pending)"),
        }
    }
}

fn past_tense(kind: OperationType) -> &'static str {
    match kind {
        OperationType::Create => "Created",
        OperationType::Update => "Updated",
        OperationType::Delete => "Deleted",
        OperationType::MarkComplete => "Completed",
        OperationType::List => "Listed",
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<TaskRecord>,
    revision: u64,
}

impl StoreInner {
    fn position(&self, id: &TaskId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn upsert(&mut self, task: TaskDto) {
        let record = TaskRecord::from_dto(task);
        match self.position(&record.id) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        self.touch();
    }

    /// Swaps a temporary record for its server copy in place.
    fn confirm(&mut self, temp_id: &TaskId, task: TaskDto) {
        let server_id = TaskId::Server(task.id);
        let temp_index = self.position(temp_id);
        let server_index = self.position(&server_id);
        match (temp_index, server_index) {
            (Some(temp), None) => self.records[temp] = TaskRecord::from_dto(task),
            (Some(temp), Some(_)) => {
                self.records.remove(temp);
                self.upsert(task);
            }
            (None, _) => self.upsert(task),
        }
        self.touch();
    }

    fn remove(&mut self, id: &TaskId) -> Option<TaskRecord> {
        let index = self.position(id)?;
        self.touch();
        Some(self.records.remove(index))
    }

    fn temp_matching(&self, title: &str) -> Option<TaskId> {
        self.records
            .iter()
            .find(|record| record.is_optimistic() && record.same_title(title))
            .map(|record| record.id.clone())
    }

    fn sole_temp(&self) -> Option<TaskId> {
        let mut temps = self.records.iter().filter(|record| record.is_optimistic());
        match (temps.next(), temps.next()) {
            (Some(only), None) => Some(only.id.clone()),
            _ => None,
        }
    }

    fn apply(&mut self, operation: &TaskOperation) -> OperationReport {
        let mut report = OperationReport {
            kind: operation.kind,
            task_id: operation.target_id(),
            title: operation.task.as_ref().map(|task| task.title.clone()),
            outcome: ReportOutcome::Applied,
        };

        match operation.status {
            OperationStatus::Pending => report.outcome = ReportOutcome::Skipped,
            OperationStatus::Error => {
                let message = operation
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "operation failed".to_string());
                if operation.kind == OperationType::Create {
                    let temp = match &operation.task {
                        Some(task) => self.temp_matching(&task.title),
                        None => self.sole_temp(),
                    };
                    if let Some(temp) = temp {
                        if let Some(removed) = self.remove(&temp) {
                            report.title.get_or_insert(removed.title);
                        }
                    }
                }
                warn!(
                    operation = operation.kind.as_str(),
                    task_id = report.task_id.unwrap_or_default(),
                    %message,
                    "backend reported failed operation"
                );
                report.outcome = ReportOutcome::Failed(message);
            }
            OperationStatus::Success => self.apply_success(operation, &mut report),
        }
        report
    }

    fn apply_success(&mut self, operation: &TaskOperation, report: &mut OperationReport) {
        match (operation.kind, &operation.task) {
            (OperationType::Create, Some(task)) => match self.temp_matching(&task.title) {
                Some(temp) => self.confirm(&temp, task.clone()),
                None => self.upsert(task.clone()),
            },
            (OperationType::Update | OperationType::MarkComplete, Some(task)) => {
                self.upsert(task.clone());
            }
            (OperationType::MarkComplete, None) => {
                let Some(id) = operation.task_id else {
                    report.outcome = ReportOutcome::Skipped;
                    return;
                };
                if let Some(index) = self.position(&TaskId::Server(id)) {
                    self.records[index].completed = true;
                    report.title = Some(self.records[index].title.clone());
                    self.touch();
                }
            }
            (OperationType::Delete, _) => {
                if let Some(id) = operation.target_id() {
                    if let Some(removed) = self.remove(&TaskId::Server(id)) {
                        report.title.get_or_insert(removed.title);
                    }
                }
            }
            (OperationType::List, _) => {}
            (OperationType::Create | OperationType::Update, None) => {
                report.outcome = ReportOutcome::Skipped;
            }
        }
        debug!(operation = operation.kind.as_str(), "applied reported operation");
    }
}

/// Cloneable handle over the one shared task collection.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl TaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a temporary record for `draft` and returns its id.
    pub fn add_optimistic(&self, draft: &TaskDraft) -> TaskId {
        let mut inner = self.lock();
        let record = TaskRecord::optimistic(local_id("temp"), draft);
        let id = record.id.clone();
        inner.records.push(record);
        inner.touch();
        id
    }

    /// Replaces the temporary record with the server's copy. The two never coexist.
    pub fn confirm(&self, temp_id: &TaskId, task: TaskDto) -> Result<(), ReconcileError> {
        if !temp_id.is_temp() {
            return Err(ReconcileError::NotTemporary(temp_id.clone()));
        }
        self.lock().confirm(temp_id, task);
        Ok(())
    }

    /// Removes a temporary record after its create failed.
    pub fn rollback(&self, temp_id: &TaskId) -> Option<TaskRecord> {
        if !temp_id.is_temp() {
            return None;
        }
        self.lock().remove(temp_id)
    }

    /// Applies `patch` and returns the record as it was before, for an
    /// explicit [`TaskStore::restore`] if the server rejects the change.
    pub fn update_status(&self, id: TaskKey, patch: &TaskPatch) -> Result<TaskRecord, ReconcileError> {
        let mut inner = self.lock();
        let task_id = TaskId::Server(id);
        let index = inner
            .position(&task_id)
            .ok_or(ReconcileError::UnknownTask(task_id))?;
        let previous = inner.records[index].clone();
        inner.records[index].apply_patch(patch);
        inner.touch();
        Ok(previous)
    }

    /// Puts a snapshot back, replacing any record with the same id.
    pub fn restore(&self, snapshot: TaskRecord) {
        let mut inner = self.lock();
        match inner.position(&snapshot.id) {
            Some(index) => inner.records[index] = snapshot,
            None => inner.records.push(snapshot),
        }
        inner.touch();
    }

    pub fn remove(&self, id: TaskKey) -> Option<TaskRecord> {
        self.lock().remove(&TaskId::Server(id))
    }

    pub fn upsert(&self, task: TaskDto) {
        self.lock().upsert(task);
    }

    /// Replaces all confirmed records with `tasks`. Unconfirmed temporary
    /// records are kept unless the server already lists a task with the same
    /// title; a later `confirm` for such a temp id upserts the server copy.
    pub fn replace_all(&self, tasks: Vec<TaskDto>) {
        let mut inner = self.lock();
        inner.records.retain(|record| {
            record.is_optimistic() && !tasks.iter().any(|task| record.same_title(&task.title))
        });
        let temps = std::mem::take(&mut inner.records);
        inner.records = tasks.into_iter().map(TaskRecord::from_dto).collect();
        inner.records.extend(temps);
        inner.touch();
    }

    /// Applies backend-reported operations in order, one report each.
    pub fn apply_operations(&self, operations: &[TaskOperation]) -> Vec<OperationReport> {
        let mut inner = self.lock();
        operations
            .iter()
            .map(|operation| inner.apply(operation))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.lock().records.clone()
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        let inner = self.lock();
        inner.position(id).map(|index| inner.records[index].clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Bumped on every mutation; lets a view skip redundant redraws.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        lock_unpoisoned(&self.inner)
    }
}
