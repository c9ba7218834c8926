/// Client-side preconditions, checked before anything reaches the engine.
///
/// The engine only accepts the newtypes produced here, so an unvalidated name
/// or draft cannot be sent to the server.
use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

use crate::error::ValidationError;
use crate::state::BoardState;
use crate::types::{is_placeholder, Priority, TaskDraft, TaskPatch, MAX_COLUMN_NAME_CHARS, MAX_TASK_TITLE_CHARS};

/// A trimmed column name that is non-empty, short enough and unique on the
/// board it was validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A task draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTask(TaskDraft);

impl ValidTask {
    pub fn into_draft(self) -> TaskDraft {
        self.0
    }
}

/// A task edit whose resulting fields are valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPatch(TaskPatch);

impl ValidPatch {
    pub fn patch(&self) -> &TaskPatch {
        &self.0
    }
}

/// Raw form input for a new task.
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub assignee: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
}

fn fold_name(name: &str) -> String {
    name.nfc().collect::<String>().to_lowercase()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn column_name(board: &BoardState, raw: &str) -> Result<ColumnName, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyColumnName);
    }
    if name.chars().count() > MAX_COLUMN_NAME_CHARS {
        return Err(ValidationError::ColumnNameTooLong);
    }
    let folded = fold_name(name);
    if board.columns().iter().any(|c| fold_name(&c.name) == folded) {
        return Err(ValidationError::DuplicateColumn(name.to_string()));
    }
    Ok(ColumnName(name.to_string()))
}

pub fn task(board: &BoardState, input: TaskInput) -> Result<ValidTask, ValidationError> {
    if board.columns().is_empty() {
        return Err(ValidationError::NoColumns);
    }
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TASK_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong);
    }
    let status = input.status.trim();
    if board.column_index(status).is_none() {
        return Err(ValidationError::UnknownColumn(status.to_string()));
    }
    if is_placeholder(status) {
        return Err(ValidationError::PendingColumn(status.to_string()));
    }
    Ok(ValidTask(TaskDraft {
        title: title.to_string(),
        description: non_empty(&input.description),
        priority: input.priority.unwrap_or_default(),
        assignee: non_empty(&input.assignee),
        due_date: input.due_date,
        status: status.to_string(),
    }))
}

/// Check an edit against the board. Title and status are validated the same
/// way as for a new task; cleared optional text becomes `None`.
pub fn task_patch(board: &BoardState, mut patch: TaskPatch) -> Result<ValidPatch, ValidationError> {
    if let Some(title) = patch.title.take() {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if title.chars().count() > MAX_TASK_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong);
        }
        patch.title = Some(title.to_string());
    }
    if let Some(status) = patch.status.take() {
        let status = status.trim();
        if board.column_index(status).is_none() {
            return Err(ValidationError::UnknownColumn(status.to_string()));
        }
        if is_placeholder(status) {
            return Err(ValidationError::PendingColumn(status.to_string()));
        }
        patch.status = Some(status.to_string());
    }
    patch.description = patch.description.map(|d| d.as_deref().and_then(non_empty));
    patch.assignee = patch.assignee.map(|a| a.as_deref().and_then(non_empty));
    Ok(ValidPatch(patch))
}
