/// Drag-and-drop coordinator for columns and tasks.
///
/// Columns and task lists are nested, so one pointer gesture can reach both a
/// column handler and a task-list handler. The coordinator holds the single
/// pending drag and decides which interpretation applies at every step.
/// A task drag always takes precedence over a column drag.
use std::collections::HashSet;

use crate::state::{column_move, BoardState};
use crate::types::is_placeholder;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    DraggingColumn(String),
    DraggingTask(String),
}

/// Element under the pointer. A task list is identified by its column id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Column(String),
    TaskList(String),
}

/// Answer to a dragover event. `Decline` leaves the event to the other
/// handler so the browser's default "no drop" does not block it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOver {
    Accept,
    Decline,
}

/// Mutation requested by a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropAction {
    None,
    ReorderColumns { column_id: String, target_id: String },
    MoveTask { task_id: String, new_status: String },
}

/// Visual drag state the view renders: the element being dragged and the
/// targets currently highlighted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragAffordances {
    pub dragging: Option<String>,
    pub highlighted: HashSet<DropTarget>,
}

impl DragAffordances {
    pub fn is_clear(&self) -> bool {
        self.dragging.is_none() && self.highlighted.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DragCoordinator {
    state: DragState,
    affordances: DragAffordances,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn affordances(&self) -> &DragAffordances {
        &self.affordances
    }

    /// Drag start on a column. Declined while a task drag is in flight, which
    /// is the case when the gesture started on a task nested in the column.
    pub fn begin_column_drag(&mut self, column_id: &str) -> bool {
        if matches!(self.state, DragState::DraggingTask(_)) {
            log::debug!("[drag] Column drag of {} ignored, task drag active", column_id);
            return false;
        }
        self.state = DragState::DraggingColumn(column_id.to_string());
        self.affordances = DragAffordances {
            dragging: Some(column_id.to_string()),
            highlighted: HashSet::new(),
        };
        true
    }

    /// Drag start on a task. Always wins, replacing a column drag that the
    /// same gesture may have registered on an enclosing column.
    pub fn begin_task_drag(&mut self, task_id: &str) {
        self.state = DragState::DraggingTask(task_id.to_string());
        self.affordances = DragAffordances {
            dragging: Some(task_id.to_string()),
            highlighted: HashSet::new(),
        };
    }

    pub fn drag_over(&mut self, target: &DropTarget) -> DragOver {
        let accepted = matches!(
            (&self.state, target),
            (DragState::DraggingColumn(_), DropTarget::Column(_))
                | (DragState::DraggingTask(_), DropTarget::TaskList(_))
        );
        if accepted {
            self.affordances.highlighted.insert(target.clone());
            DragOver::Accept
        } else {
            DragOver::Decline
        }
    }

    pub fn drag_leave(&mut self, target: &DropTarget) {
        self.affordances.highlighted.remove(target);
    }

    /// Resolve a drop into the mutation it requests. The coordinator is back
    /// to `Idle` with no affordances afterwards, whatever the outcome.
    pub fn drop(&mut self, target: &DropTarget, board: &BoardState) -> DropAction {
        let state = std::mem::take(&mut self.state);
        self.affordances = DragAffordances::default();

        match (state, target) {
            (DragState::DraggingColumn(source), DropTarget::Column(target_id)) => {
                if is_placeholder(&source)
                    || is_placeholder(target_id)
                    || column_move(board.columns(), &source, target_id).is_none()
                {
                    return DropAction::None;
                }
                DropAction::ReorderColumns {
                    column_id: source,
                    target_id: target_id.clone(),
                }
            }
            (DragState::DraggingTask(task_id), DropTarget::TaskList(new_status)) => {
                let Some(task) = board.task_by_id(&task_id) else {
                    return DropAction::None;
                };
                if task.status == *new_status
                    || is_placeholder(&task_id)
                    || is_placeholder(new_status)
                    || board.column_index(new_status).is_none()
                {
                    return DropAction::None;
                }
                DropAction::MoveTask {
                    task_id,
                    new_status: new_status.clone(),
                }
            }
            _ => DropAction::None,
        }
    }

    /// Drag end, cancel, or the window losing the drag.
    pub fn end(&mut self) {
        self.state = DragState::Idle;
        self.affordances = DragAffordances::default();
    }
}
