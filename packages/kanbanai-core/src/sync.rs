/// Push channel wire types.
///
/// The server sends `{"type": "columns_changed"}` or `{"type": "tasks_changed"}`
/// after every write. Messages carry no data; they only tell the client which
/// slice to re-fetch.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    ColumnsChanged,
    TasksChanged,
}

impl PushMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    #[default]
    Offline,
}
