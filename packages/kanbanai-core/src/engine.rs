/// Optimistic mutation engine.
///
/// Every user change follows the same protocol: capture a `Mutation` against
/// the current board, apply it locally and render, then persist it through the
/// `RemoteStore`. Success keeps the optimistic state (reconciling server ids
/// for creates). `Unauthorized` ends the session without rolling back. Any
/// other failure reverts exactly the captured delta, renders, and notifies.
///
/// The board lock is never held across an `.await`, so a push-triggered
/// refresh can land between an optimistic apply and its persistence result.
/// Refreshes replace whole slices and become the new baseline; a later
/// rollback only undoes its own delta and is a no-op when the entity is gone.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::drag::DropAction;
use crate::error::{EngineError, StoreError};
use crate::host::{BoardHost, NoticeKind};
use crate::state::{column_move, BoardState, Mutation};
use crate::store::RemoteStore;
use crate::sync::PushMessage;
use crate::types::{is_placeholder, placeholder_id, Column, Task};
use crate::validate::{ColumnName, ValidPatch, ValidTask};

/// Result of a destructive operation behind the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

pub struct MutationEngine<S, H> {
    store: Arc<S>,
    host: Arc<H>,
    board: Mutex<BoardState>,
    ended: AtomicBool,
}

impl<S: RemoteStore, H: BoardHost> MutationEngine<S, H> {
    pub fn new(store: Arc<S>, host: Arc<H>) -> Self {
        Self {
            store,
            host,
            board: Mutex::new(BoardState::new()),
            ended: AtomicBool::new(false),
        }
    }

    /// Copy of the current board for readers that need to hold it.
    pub fn snapshot(&self) -> BoardState {
        self.lock().clone()
    }

    /// Run a read-only closure against the current board.
    pub fn read<R>(&self, f: impl FnOnce(&BoardState) -> R) -> R {
        f(&self.lock())
    }

    /// True once any store call reported `Unauthorized`.
    pub fn is_session_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Initial load of the board.
    pub async fn load(&self) -> Result<(), EngineError> {
        self.refresh_columns().await
    }

    /// Re-fetch columns and then tasks, installing both in one step with a
    /// single render. Nothing is installed unless both fetches succeed.
    pub async fn refresh_columns(&self) -> Result<(), EngineError> {
        self.ensure_live()?;
        let columns = match self.store.list_columns().await {
            Ok(columns) => columns,
            Err(e) => return Err(self.fail(None, e, "Load Error: Could not load columns. Please refresh.")),
        };
        let tasks = match self.store.list_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => return Err(self.fail(None, e, "Load Error: Could not load tasks. Please refresh.")),
        };
        log::debug!(
            "[engine] Refreshed {} column(s), {} task(s)",
            columns.len(),
            tasks.len()
        );
        self.commit(|board| board.replace_all(columns, tasks));
        Ok(())
    }

    pub async fn refresh_tasks(&self) -> Result<(), EngineError> {
        self.ensure_live()?;
        let tasks = match self.store.list_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => return Err(self.fail(None, e, "Load Error: Could not load tasks. Please refresh.")),
        };
        log::debug!("[engine] Refreshed {} task(s)", tasks.len());
        self.commit(|board| board.replace_tasks(tasks));
        Ok(())
    }

    /// React to a push-channel invalidation.
    pub async fn handle_push(&self, message: PushMessage) -> Result<(), EngineError> {
        log::debug!("[engine] Push message {:?}", message);
        match message {
            PushMessage::ColumnsChanged => self.refresh_columns().await,
            PushMessage::TasksChanged => self.refresh_tasks().await,
        }
    }

    // ── Columns ─────────────────────────────────────────────────────────

    pub async fn create_column(&self, name: ColumnName) -> Result<Column, EngineError> {
        self.ensure_live()?;
        let placeholder = Column {
            id: placeholder_id(),
            name: name.into_inner(),
        };
        let mutation = Mutation::InsertColumn {
            column: placeholder.clone(),
        };
        self.apply(&mutation)?;

        let result = self.store.create_column(&placeholder.name).await;
        let created = self.settle(&mutation, result, "Create Failed: Could not create column.")?;
        self.commit(|board| board.reconcile_created_column(&placeholder.id, created.clone()));
        self.host.notify(
            NoticeKind::Success,
            &format!("Column Created: \"{}\" column is ready.", created.name),
        );
        Ok(created)
    }

    /// Delete a column after confirmation.
    ///
    /// Columns are refreshed first so the confirmation reports the real task
    /// count. The delete itself is not optimistic: the server moves the
    /// column's tasks to a column of its choosing, so after success the tasks
    /// are re-fetched and installed together with the column removal.
    pub async fn delete_column(&self, id: &str) -> Result<DeleteOutcome, EngineError> {
        self.ensure_live()?;
        self.refresh_columns().await?;

        let (name, task_count) = self.read(|board| {
            board
                .column_by_id(id)
                .map(|c| (c.name.clone(), board.tasks_in(id).count()))
        })
        .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let detail = if task_count > 0 {
            format!("{} task(s) will move to the first remaining column.", task_count)
        } else {
            "This action cannot be undone.".to_string()
        };
        if !self.host.confirm(&format!("Delete \"{}\"? {}", name, detail)).await {
            return Ok(DeleteOutcome::Declined);
        }
        self.ensure_live()?;

        if let Err(e) = self.store.delete_column(id).await {
            return Err(self.fail(None, e, "Delete Failed: Could not delete column. Please try again."));
        }
        log::info!("[engine] Deleted column {}", id);

        match self.store.list_tasks().await {
            Ok(tasks) => {
                self.commit(|board| {
                    board.remove_column(id);
                    board.replace_tasks(tasks);
                });
                self.host.notify(
                    NoticeKind::Success,
                    &format!("Column Deleted: \"{}\" has been removed.", name),
                );
            }
            Err(StoreError::Unauthorized) => {
                self.end_session();
                return Err(EngineError::Unauthorized);
            }
            Err(e) => {
                log::warn!("[engine] Task reload after deleting column {} failed: {}", id, e);
                self.commit(|board| {
                    board.remove_column(id);
                });
                self.host.notify(
                    NoticeKind::Error,
                    &format!("Column Deleted: \"{}\" was removed, but its tasks could not be reloaded. Please refresh.", name),
                );
            }
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Move column `source` onto `target` and persist the full resulting order.
    ///
    /// Refused while any column create is in flight: the persisted order must
    /// only name server ids.
    pub async fn reorder_column(&self, source: &str, target: &str) -> Result<(), EngineError> {
        self.ensure_live()?;
        let pending = self.read(|board| {
            board
                .columns()
                .iter()
                .map(|c| c.id.as_str())
                .chain([source, target])
                .find(|id| is_placeholder(id))
                .map(str::to_string)
        });
        if let Some(id) = pending {
            return Err(EngineError::PendingColumn(id));
        }
        let planned = self.read(|board| column_move(board.columns(), source, target));
        let Some((from, to)) = planned else {
            return Ok(());
        };
        let mutation = Mutation::MoveColumn {
            column_id: source.to_string(),
            from,
            to,
        };
        let order = self.commit_checked(&mutation, |board| board.column_ids())?;

        let result = self.store.reorder_columns(&order).await;
        self.settle(&mutation, result, "Reorder Failed: Could not save column order.")?;
        self.host.notify(NoticeKind::Success, "Column order saved.");
        Ok(())
    }

    // ── Tasks ───────────────────────────────────────────────────────────

    pub async fn create_task(&self, task: ValidTask) -> Result<Task, EngineError> {
        self.ensure_live()?;
        let draft = task.into_draft();
        let placeholder = Task::from_draft(placeholder_id(), draft.clone());
        let mutation = Mutation::InsertTask {
            task: placeholder.clone(),
        };
        self.apply(&mutation)?;

        let result = self.store.create_task(&draft).await;
        let created = self.settle(&mutation, result, "Create Failed: Could not create task.")?;
        let column_name = self.commit(|board| {
            board.reconcile_created_task(&placeholder.id, created.clone());
            board
                .column_by_id(&created.status)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "board".to_string())
        });
        self.host.notify(
            NoticeKind::Success,
            &format!("Task Created: \"{}\" added to {}.", created.title, column_name),
        );
        Ok(created)
    }

    /// Move a task to another column. No-op when it is already there.
    pub async fn move_task(&self, task_id: &str, new_status: &str) -> Result<(), EngineError> {
        self.ensure_live()?;
        if is_placeholder(new_status) {
            return Err(EngineError::PendingColumn(new_status.to_string()));
        }
        let current = self.persisted_task(task_id)?;
        if current.status == new_status {
            return Ok(());
        }
        let mutation = Mutation::MoveTask {
            task_id: task_id.to_string(),
            from: current.status.clone(),
            to: new_status.to_string(),
        };
        let draft = Task {
            status: new_status.to_string(),
            ..current
        }
        .to_draft();
        self.commit_checked(&mutation, |_| ())?;

        let result = self.store.update_task(task_id, &draft).await;
        self.settle(&mutation, result, "Move Failed: Could not move task. Please try again.")?;
        self.host.notify(NoticeKind::Success, &format!("Task Moved: \"{}\".", draft.title));
        Ok(())
    }

    /// Apply an edit optimistically and persist the full task.
    pub async fn update_task(&self, task_id: &str, patch: ValidPatch) -> Result<(), EngineError> {
        self.ensure_live()?;
        let before = self.persisted_task(task_id)?;
        let after = patch.patch().apply_to(&before);
        if after == before {
            return Ok(());
        }
        let draft = after.to_draft();
        let mutation = Mutation::UpdateTask { before, after };
        self.commit_checked(&mutation, |_| ())?;

        let result = self.store.update_task(task_id, &draft).await;
        self.settle(&mutation, result, "Update Failed: Could not save task. Please try again.")?;
        self.host.notify(NoticeKind::Success, &format!("Task Updated: \"{}\".", draft.title));
        Ok(())
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<DeleteOutcome, EngineError> {
        self.ensure_live()?;
        let title = self.persisted_task(task_id)?.title;
        let prompt = format!("Delete task? \"{}\" will be permanently removed.", title);
        if !self.host.confirm(&prompt).await {
            return Ok(DeleteOutcome::Declined);
        }
        self.ensure_live()?;

        // The board may have changed while the dialog was open.
        let mutation = self
            .read(|board| {
                let index = board.tasks().iter().position(|t| t.id == task_id)?;
                Some(Mutation::RemoveTask {
                    task: board.tasks()[index].clone(),
                    index,
                })
            })
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))?;
        self.apply(&mutation)?;

        let result = self.store.delete_task(task_id).await;
        self.settle(&mutation, result, "Delete Failed: Could not delete task. Please try again.")?;
        self.host.notify(
            NoticeKind::Success,
            &format!("Task Deleted: \"{}\" has been removed.", title),
        );
        Ok(DeleteOutcome::Deleted)
    }

    /// Carry out what a drop on the drag coordinator asked for.
    pub async fn apply_drop(&self, action: DropAction) -> Result<(), EngineError> {
        match action {
            DropAction::None => Ok(()),
            DropAction::ReorderColumns { column_id, target_id } => {
                self.reorder_column(&column_id, &target_id).await
            }
            DropAction::MoveTask { task_id, new_status } => {
                self.move_task(&task_id, &new_status).await
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the board and render while still holding the lock, so renders
    /// observe changes in the order they were made.
    fn commit<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let mut board = self.lock();
        let out = f(&mut board);
        self.host.render(&board);
        out
    }

    /// Apply an optimistic delta and render, then read from the new state.
    fn commit_checked<R>(
        &self,
        mutation: &Mutation,
        after: impl FnOnce(&BoardState) -> R,
    ) -> Result<R, EngineError> {
        let mut board = self.lock();
        if !board.apply_local(mutation) {
            log::debug!("[engine] Delta no longer applies: {:?}", mutation);
            return Err(EngineError::NotFound(mutation_subject(mutation)));
        }
        self.host.render(&board);
        Ok(after(&board))
    }

    fn apply(&self, mutation: &Mutation) -> Result<(), EngineError> {
        self.commit_checked(mutation, |_| ())
    }

    /// A task that exists on the server (not a pending create).
    fn persisted_task(&self, task_id: &str) -> Result<Task, EngineError> {
        if is_placeholder(task_id) {
            return Err(EngineError::NotFound(task_id.to_string()));
        }
        self.read(|board| board.task_by_id(task_id).cloned())
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))
    }

    fn settle<T>(
        &self,
        mutation: &Mutation,
        result: Result<T, StoreError>,
        failure: &str,
    ) -> Result<T, EngineError> {
        result.map_err(|e| self.fail(Some(mutation), e, failure))
    }

    /// Route a store failure: end the session on `Unauthorized`, otherwise
    /// undo `mutation` (if any), render, and notify once.
    fn fail(&self, mutation: Option<&Mutation>, error: StoreError, failure: &str) -> EngineError {
        if error == StoreError::Unauthorized {
            self.end_session();
            return EngineError::Unauthorized;
        }
        log::warn!("[engine] {} ({})", failure, error);
        if let Some(mutation) = mutation {
            self.commit(|board| board.revert_local(mutation));
        }
        self.host.notify(NoticeKind::Error, failure);
        error.into()
    }

    fn end_session(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            log::warn!("[engine] Credential rejected, ending session");
            self.host.on_unauthorized();
        }
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.is_session_ended() {
            Err(EngineError::SessionEnded)
        } else {
            Ok(())
        }
    }
}

fn mutation_subject(mutation: &Mutation) -> String {
    match mutation {
        Mutation::MoveTask { task_id, .. } => task_id.clone(),
        Mutation::MoveColumn { column_id, .. } => column_id.clone(),
        Mutation::InsertColumn { column } => column.id.clone(),
        Mutation::InsertTask { task } => task.status.clone(),
        Mutation::RemoveTask { task, .. } => task.id.clone(),
        Mutation::UpdateTask { after, .. } => after.status.clone(),
    }
}
