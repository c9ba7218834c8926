/// Error types shared by the store seam, validation and the mutation engine.
use crate::types::{MAX_COLUMN_NAME_CHARS, MAX_TASK_TITLE_CHARS};

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Failure reported by a `RemoteStore` call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The credential was rejected. Fatal to the session, never retried.
    #[error("Unauthorized")]
    Unauthorized,

    /// Server rejection (`status` set) or transport failure (`status` None).
    #[error("Request failed{}: {message}", status_suffix(.status))]
    RequestFailed { status: Option<u16>, message: String },
}

impl StoreError {
    pub fn request(status: Option<u16>, message: impl Into<String>) -> Self {
        StoreError::RequestFailed {
            status,
            message: message.into(),
        }
    }
}

/// Client-side precondition violation, caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Column name cannot be empty.")]
    EmptyColumnName,

    #[error("Column name must be {} characters or less.", MAX_COLUMN_NAME_CHARS)]
    ColumnNameTooLong,

    #[error("A column named \"{0}\" already exists.")]
    DuplicateColumn(String),

    #[error("Task title is required.")]
    EmptyTitle,

    #[error("Title must be {} characters or less.", MAX_TASK_TITLE_CHARS)]
    TitleTooLong,

    #[error("Please select a column for this task.")]
    UnknownColumn(String),

    #[error("Column {0} is still being created.")]
    PendingColumn(String),

    #[error("Please create a column first before adding tasks.")]
    NoColumns,
}

/// Terminal failure of a mutation engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Session is no longer authorized")]
    Unauthorized,

    #[error("Request failed{}: {message}", status_suffix(.status))]
    Request { status: Option<u16>, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The column's create has not reached the server yet.
    #[error("Column {0} is still being created.")]
    PendingColumn(String),

    #[error("Session has ended")]
    SessionEnded,
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthorized => EngineError::Unauthorized,
            StoreError::RequestFailed { status, message } => EngineError::Request { status, message },
        }
    }
}
