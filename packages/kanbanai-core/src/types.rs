use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix carried by ids of entities created optimistically and not yet
/// confirmed by the server.
pub const PLACEHOLDER_PREFIX: &str = "local-";

/// Column id the overdue check treats as "finished".
pub const DONE_COLUMN_ID: &str = "done";

pub const MAX_COLUMN_NAME_CHARS: usize = 40;
pub const MAX_TASK_TITLE_CHARS: usize = 120;

/// Mint a local placeholder id for an optimistic create.
pub fn placeholder_id() -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, uuid::Uuid::new_v4())
}

/// Whether `id` was minted locally and has no server counterpart yet.
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// A named bucket of tasks. Its position is its index in the board's column
/// sequence; the server's `order` field is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// The server stores priority as free text; accept any casing and fall back to
// the default for empty or unrecognised values.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        match raw.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "" | "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => {
                log::warn!("[board] Unknown priority {:?}, using Medium", other);
                Ok(Priority::Medium)
            }
        }
    }
}

/// A work item. `status` is the id of the column the task belongs to; order
/// within a column is load/insertion order and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
}

impl Task {
    pub fn from_draft(id: String, draft: TaskDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            assignee: draft.assignee,
            due_date: draft.due_date,
            status: draft.status,
        }
    }

    /// The full body the server expects for create/update.
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            assignee: self.assignee.clone(),
            due_date: self.due_date,
            status: self.status.clone(),
        }
    }

    /// Case-insensitive substring match over title, assignee and description.
    /// An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let hit = |field: Option<&str>| {
            field.map_or(false, |value| value.to_lowercase().contains(&query))
        };
        hit(Some(&self.title)) || hit(self.assignee.as_deref()) || hit(self.description.as_deref())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due.date_naive() < today && self.status != DONE_COLUMN_ID,
            None => false,
        }
    }
}

/// Everything about a task except its id: the body of create and update
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
}

/// Per-field replacement. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<String>,
}

impl TaskPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, task: &Task) -> Task {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            next.assignee = assignee.clone();
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }
        if let Some(status) = &self.status {
            next.status = status.clone();
        }
        next
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(d)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(status: &str) -> Task {
        Task {
            id: "t1".to_string(),
            title: "Write release notes".to_string(),
            description: Some("Covers the sync rewrite".to_string()),
            priority: Priority::High,
            assignee: Some("Dana Reyes".to_string()),
            due_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_task_deserializes_server_shape() {
        let json = r#"{
            "id": "abc",
            "title": "Fix login",
            "description": "",
            "status": "todo",
            "priority": "high",
            "assignee": "",
            "created_at": "2024-01-01T10:00:00.123456"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "abc");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description, None);
        assert_eq!(task.assignee, None);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn test_priority_defaults_to_medium() {
        let json = r#"{"id": "a", "title": "x", "status": "todo", "priority": null}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(serde_json::from_str::<Priority>("\"Someday\"").unwrap(), Priority::Medium);
    }

    #[test]
    fn test_unknown_priority_does_not_reject_task_list() {
        let json = r#"[
            {"id": "a", "title": "x", "status": "todo", "priority": "Urgent"},
            {"id": "b", "title": "y", "status": "todo", "priority": "LOW"}
        ]"#;
        let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[1].priority, Priority::Low);
    }

    #[test]
    fn test_column_ignores_order_field() {
        let col: Column = serde_json::from_str(r#"{"id": "todo", "name": "To Do", "order": 0}"#).unwrap();
        assert_eq!(col.id, "todo");
        assert_eq!(col.name, "To Do");
    }

    #[test]
    fn test_matches_searches_title_assignee_description() {
        let t = task("todo");
        assert!(t.matches(""));
        assert!(t.matches("RELEASE"));
        assert!(t.matches("dana"));
        assert!(t.matches("sync rewrite"));
        assert!(!t.matches("payroll"));
    }

    #[test]
    fn test_is_overdue_skips_done_column() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert!(task("todo").is_overdue(today));
        assert!(!task(DONE_COLUMN_ID).is_overdue(today));
        assert!(!task("todo").is_overdue(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_patch_applies_only_given_fields() {
        let t = task("todo");
        let patch = TaskPatch {
            assignee: Some(None),
            status: Some("review".to_string()),
            ..TaskPatch::default()
        };
        let next = patch.apply_to(&t);
        assert_eq!(next.assignee, None);
        assert_eq!(next.status, "review");
        assert_eq!(next.title, t.title);
        assert_eq!(next.to_draft().status, "review");
    }

    #[test]
    fn test_placeholder_ids() {
        let id = placeholder_id();
        assert!(is_placeholder(&id));
        assert!(!is_placeholder("todo"));
        assert_ne!(id, placeholder_id());
    }
}
