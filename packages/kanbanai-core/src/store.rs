/// The remote store seam. The engine reaches the server only through this
/// trait; implementations return data and never touch board state.
use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Column, Task, TaskDraft};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Columns in persisted order.
    async fn list_columns(&self) -> Result<Vec<Column>, StoreError>;

    async fn create_column(&self, name: &str) -> Result<Column, StoreError>;

    /// The server reassigns the column's tasks before removing it.
    async fn delete_column(&self, id: &str) -> Result<(), StoreError>;

    /// Persist the complete column order, never a delta.
    async fn reorder_columns(&self, ids_in_order: &[String]) -> Result<(), StoreError>;

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, StoreError>;

    /// Full replacement of the task's fields.
    async fn update_task(&self, id: &str, draft: &TaskDraft) -> Result<(), StoreError>;

    async fn delete_task(&self, id: &str) -> Result<(), StoreError>;
}
