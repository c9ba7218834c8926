/// In-memory board snapshot: ordered columns plus tasks in load order.
///
/// Only the mutation engine writes to a `BoardState`. Every optimistic change
/// goes through `apply_local` with a `Mutation` that carries enough of the
/// prior state for `revert_local` to undo it exactly, including position.
use std::collections::HashSet;

use crate::types::{Column, Task};

/// An optimistic delta, captured at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    MoveTask {
        task_id: String,
        from: String,
        to: String,
    },
    MoveColumn {
        column_id: String,
        from: usize,
        to: usize,
    },
    InsertColumn {
        column: Column,
    },
    InsertTask {
        task: Task,
    },
    RemoveTask {
        task: Task,
        index: usize,
    },
    UpdateTask {
        before: Task,
        after: Task,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    columns: Vec<Column>,
    tasks: Vec<Task>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn column_ids(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn column_by_id(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks whose status is `column_id`, in load/insertion order.
    pub fn tasks_in<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.status == column_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.matches(query))
    }

    /// Install a fresh column list. Tasks left pointing at a column that no
    /// longer exists are dropped.
    pub fn replace_columns(&mut self, columns: Vec<Column>) {
        self.columns = dedup_by_id(columns, |c| &c.id);
        self.prune_orphans();
    }

    /// Install a fresh task list, keeping only tasks whose column exists.
    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = dedup_by_id(tasks, |t| &t.id);
        self.prune_orphans();
    }

    pub fn replace_all(&mut self, columns: Vec<Column>, tasks: Vec<Task>) {
        self.columns = dedup_by_id(columns, |c| &c.id);
        self.tasks = dedup_by_id(tasks, |t| &t.id);
        self.prune_orphans();
    }

    /// Remove a column and every task that references it.
    pub fn remove_column(&mut self, id: &str) -> Option<Column> {
        let index = self.column_index(id)?;
        let column = self.columns.remove(index);
        self.tasks.retain(|t| t.status != id);
        Some(column)
    }

    /// Swap an optimistic placeholder column for the server's canonical one.
    pub fn reconcile_created_column(&mut self, placeholder_id: &str, canonical: Column) {
        let canonical_present = self.column_index(&canonical.id).is_some();
        match self.column_index(placeholder_id) {
            Some(index) if canonical_present => {
                self.columns.remove(index);
            }
            Some(index) => self.columns[index] = canonical.clone(),
            None if canonical_present => return,
            None => self.columns.push(canonical.clone()),
        }
        for task in self.tasks.iter_mut().filter(|t| t.status == placeholder_id) {
            task.status = canonical.id.clone();
        }
    }

    /// Swap an optimistic placeholder task for the server's canonical one.
    pub fn reconcile_created_task(&mut self, placeholder_id: &str, canonical: Task) {
        if self.column_index(&canonical.status).is_none() {
            self.tasks.retain(|t| t.id != placeholder_id);
            return;
        }
        let canonical_present = self.task_by_id(&canonical.id).is_some();
        match self.tasks.iter().position(|t| t.id == placeholder_id) {
            Some(index) if canonical_present => {
                self.tasks.remove(index);
            }
            Some(index) => self.tasks[index] = canonical,
            None if canonical_present => {}
            None => self.tasks.push(canonical),
        }
    }

    /// Apply an optimistic delta. Returns false when the delta does not fit
    /// the current state, in which case nothing changed.
    pub fn apply_local(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::MoveTask { task_id, from, to } => {
                if self.column_index(to).is_none() {
                    return false;
                }
                match self.task_mut(task_id) {
                    Some(task) if task.status == *from => {
                        task.status = to.clone();
                        true
                    }
                    _ => false,
                }
            }
            Mutation::MoveColumn { column_id, from, to } => {
                if self.columns.get(*from).map(|c| &c.id) != Some(column_id)
                    || *to >= self.columns.len()
                {
                    return false;
                }
                let column = self.columns.remove(*from);
                self.columns.insert(*to, column);
                true
            }
            Mutation::InsertColumn { column } => {
                if self.column_index(&column.id).is_some() {
                    return false;
                }
                self.columns.push(column.clone());
                true
            }
            Mutation::InsertTask { task } => {
                if self.task_by_id(&task.id).is_some() || self.column_index(&task.status).is_none() {
                    return false;
                }
                self.tasks.push(task.clone());
                true
            }
            Mutation::RemoveTask { task, index } => {
                match self.tasks.get(*index) {
                    Some(current) if current.id == task.id => {
                        self.tasks.remove(*index);
                        true
                    }
                    _ => false,
                }
            }
            Mutation::UpdateTask { before, after } => {
                if self.column_index(&after.status).is_none() {
                    return false;
                }
                match self.task_mut(&before.id) {
                    Some(task) if *task == *before => {
                        *task = after.clone();
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Undo a delta previously applied with `apply_local`.
    ///
    /// The inverse is computed from what the delta captured, not from the
    /// current contents. If a refresh has since removed the entity (or the
    /// column it would return to), this is a no-op.
    pub fn revert_local(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::MoveTask { task_id, from, .. } => {
                if self.column_index(from).is_none() {
                    return;
                }
                if let Some(task) = self.task_mut(task_id) {
                    task.status = from.clone();
                }
            }
            Mutation::MoveColumn { column_id, from, .. } => {
                if let Some(current) = self.column_index(column_id) {
                    let column = self.columns.remove(current);
                    let target = (*from).min(self.columns.len());
                    self.columns.insert(target, column);
                }
            }
            Mutation::InsertColumn { column } => {
                self.remove_column(&column.id);
            }
            Mutation::InsertTask { task } => {
                self.tasks.retain(|t| t.id != task.id);
            }
            Mutation::RemoveTask { task, index } => {
                if self.task_by_id(&task.id).is_some() || self.column_index(&task.status).is_none() {
                    return;
                }
                let target = (*index).min(self.tasks.len());
                self.tasks.insert(target, task.clone());
            }
            Mutation::UpdateTask { before, .. } => {
                let status_ok = self.column_index(&before.status).is_some();
                if let Some(task) = self.task_mut(&before.id) {
                    let status = if status_ok {
                        before.status.clone()
                    } else {
                        task.status.clone()
                    };
                    *task = Task {
                        status,
                        ..before.clone()
                    };
                }
            }
        }
    }

    fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn prune_orphans(&mut self) {
        let known: HashSet<&str> = self.columns.iter().map(|c| c.id.as_str()).collect();
        let before = self.tasks.len();
        self.tasks.retain(|t| known.contains(t.status.as_str()));
        let dropped = before - self.tasks.len();
        if dropped > 0 {
            log::warn!("[board] Dropped {} task(s) referencing unknown columns", dropped);
        }
    }
}

fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &String) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(id(&item).clone()) {
            out.push(item);
        } else {
            log::warn!("[board] Ignoring duplicate id {}", id(&item));
        }
    }
    out
}

/// Column id sequence after moving `source` onto `target`: the source is
/// spliced out and reinserted at the index the target held before the
/// removal. `None` when either id is unknown or they are the same.
pub fn column_move(columns: &[Column], source: &str, target: &str) -> Option<(usize, usize)> {
    if source == target {
        return None;
    }
    let from = columns.iter().position(|c| c.id == source)?;
    let to = columns.iter().position(|c| c.id == target)?;
    Some((from, to))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Priority;

    pub(crate) fn col(id: &str) -> Column {
        Column {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }

    pub(crate) fn task(id: &str, status: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: None,
            priority: Priority::Medium,
            assignee: None,
            due_date: None,
            status: status.to_string(),
        }
    }

    pub(crate) fn board() -> BoardState {
        let mut state = BoardState::new();
        state.replace_all(
            vec![col("a"), col("b"), col("c")],
            vec![task("t1", "a"), task("t2", "b")],
        );
        state
    }

    fn ids(state: &BoardState) -> Vec<String> {
        state.column_ids()
    }

    #[test]
    fn test_derived_views() {
        let state = board();
        assert_eq!(state.column_index("c"), Some(2));
        assert_eq!(state.task_by_id("t2").map(|t| t.status.as_str()), Some("b"));
        assert_eq!(state.tasks_in("a").count(), 1);
        assert_eq!(state.tasks_in("c").count(), 0);
        assert_eq!(state.search("task t").count(), 2);
        assert_eq!(state.task_count(), 2);
    }

    #[test]
    fn test_replace_tasks_drops_orphans() {
        let mut state = board();
        state.replace_tasks(vec![task("t1", "a"), task("t9", "gone")]);
        assert_eq!(state.task_count(), 1);
        assert!(state.task_by_id("t9").is_none());
    }

    #[test]
    fn test_replace_columns_prunes_tasks_of_removed_columns() {
        let mut state = board();
        state.replace_columns(vec![col("a"), col("c")]);
        assert!(state.task_by_id("t2").is_none());
        assert!(state.task_by_id("t1").is_some());
    }

    #[test]
    fn test_replace_ignores_duplicate_ids() {
        let mut state = BoardState::new();
        state.replace_all(vec![col("a"), col("a")], vec![task("t1", "a"), task("t1", "a")]);
        assert_eq!(state.columns().len(), 1);
        assert_eq!(state.task_count(), 1);
    }

    #[test]
    fn test_column_move_lands_on_target_index() {
        let mut state = board();
        let (from, to) = column_move(state.columns(), "c", "a").unwrap();
        let m = Mutation::MoveColumn {
            column_id: "c".to_string(),
            from,
            to,
        };
        assert!(state.apply_local(&m));
        assert_eq!(ids(&state), vec!["c", "a", "b"]);

        let mut state = board();
        let (from, to) = column_move(state.columns(), "a", "c").unwrap();
        state.apply_local(&Mutation::MoveColumn {
            column_id: "a".to_string(),
            from,
            to,
        });
        assert_eq!(ids(&state), vec!["b", "c", "a"]);
        assert_eq!(column_move(state.columns(), "a", "a"), None);
        assert_eq!(column_move(state.columns(), "a", "zz"), None);
    }

    #[test]
    fn test_column_moves_are_permutations() {
        let names = ["a", "b", "c", "d", "e"];
        for source in names {
            for target in names {
                let mut state = BoardState::new();
                state.replace_columns(names.iter().map(|n| col(n)).collect());
                let before = ids(&state);
                let Some((from, to)) = column_move(state.columns(), source, target) else {
                    assert_eq!(source, target);
                    continue;
                };
                let m = Mutation::MoveColumn {
                    column_id: source.to_string(),
                    from,
                    to,
                };
                assert!(state.apply_local(&m));
                let after = ids(&state);
                assert_eq!(after[to], source);
                let rest_before: Vec<_> = before.iter().filter(|id| *id != source).collect();
                let rest_after: Vec<_> = after.iter().filter(|id| *id != source).collect();
                assert_eq!(rest_before, rest_after);

                state.revert_local(&m);
                assert_eq!(ids(&state), before);
            }
        }
    }

    #[test]
    fn test_every_mutation_reverts_to_prior_snapshot() {
        let base = board();
        let t1 = base.task_by_id("t1").unwrap().clone();
        let mut edited = t1.clone();
        edited.title = "Renamed".to_string();
        edited.status = "c".to_string();
        let mutations = vec![
            Mutation::MoveTask {
                task_id: "t1".to_string(),
                from: "a".to_string(),
                to: "b".to_string(),
            },
            Mutation::MoveColumn {
                column_id: "b".to_string(),
                from: 1,
                to: 0,
            },
            Mutation::InsertColumn { column: col("local-x") },
            Mutation::InsertTask { task: task("local-t", "c") },
            Mutation::RemoveTask { task: t1.clone(), index: 0 },
            Mutation::UpdateTask {
                before: t1.clone(),
                after: edited,
            },
        ];
        for m in mutations {
            let mut state = base.clone();
            assert!(state.apply_local(&m), "{:?} should apply", m);
            assert_ne!(state, base);
            state.revert_local(&m);
            assert_eq!(state, base, "{:?} should revert exactly", m);
        }
    }

    #[test]
    fn test_apply_rejects_stale_delta() {
        let mut state = board();
        let stale = Mutation::MoveTask {
            task_id: "t1".to_string(),
            from: "b".to_string(),
            to: "c".to_string(),
        };
        assert!(!state.apply_local(&stale));
        let to_missing = Mutation::MoveTask {
            task_id: "t1".to_string(),
            from: "a".to_string(),
            to: "nope".to_string(),
        };
        assert!(!state.apply_local(&to_missing));
        assert_eq!(state, board());
    }

    #[test]
    fn test_revert_is_noop_when_refresh_removed_entity() {
        let mut state = board();
        let m = Mutation::MoveTask {
            task_id: "t1".to_string(),
            from: "a".to_string(),
            to: "b".to_string(),
        };
        state.apply_local(&m);
        state.replace_tasks(vec![task("t2", "b")]);
        let refreshed = state.clone();
        state.revert_local(&m);
        assert_eq!(state, refreshed);

        let removed = Mutation::RemoveTask {
            task: task("t1", "a"),
            index: 0,
        };
        let mut state = board();
        state.apply_local(&removed);
        state.replace_columns(vec![col("b"), col("c")]);
        let refreshed = state.clone();
        state.revert_local(&removed);
        assert_eq!(state, refreshed);
    }

    #[test]
    fn test_revert_move_task_skips_deleted_source_column() {
        let mut state = board();
        let m = Mutation::MoveTask {
            task_id: "t1".to_string(),
            from: "a".to_string(),
            to: "b".to_string(),
        };
        state.apply_local(&m);
        state.replace_columns(vec![col("b"), col("c")]);
        state.revert_local(&m);
        assert_eq!(state.task_by_id("t1").unwrap().status, "b");
    }

    #[test]
    fn test_remove_column_takes_its_tasks() {
        let mut state = board();
        assert_eq!(state.remove_column("a").map(|c| c.id), Some("a".to_string()));
        assert!(state.task_by_id("t1").is_none());
        assert!(state.remove_column("a").is_none());
    }

    #[test]
    fn test_reconcile_created_column_repoints_tasks() {
        let mut state = board();
        state.apply_local(&Mutation::InsertColumn { column: col("local-1") });
        state.apply_local(&Mutation::InsertTask { task: task("local-t", "local-1") });
        state.reconcile_created_column("local-1", col("d"));
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);
        assert_eq!(state.task_by_id("local-t").unwrap().status, "d");
    }

    #[test]
    fn test_reconcile_created_column_after_refresh_does_not_duplicate() {
        let mut state = board();
        state.apply_local(&Mutation::InsertColumn { column: col("local-1") });
        state.replace_columns(vec![col("a"), col("b"), col("c"), col("d")]);
        state.reconcile_created_column("local-1", col("d"));
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);

        let mut state = board();
        state.apply_local(&Mutation::InsertColumn { column: col("local-1") });
        state.replace_columns(vec![col("a"), col("b"), col("c")]);
        state.reconcile_created_column("local-1", col("d"));
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_reconcile_created_task_replaces_placeholder_in_place() {
        let mut state = board();
        state.apply_local(&Mutation::InsertTask { task: task("local-t", "c") });
        state.reconcile_created_task("local-t", task("t3", "c"));
        let order: Vec<_> = state.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["t1", "t2", "t3"]);

        state.apply_local(&Mutation::InsertTask { task: task("local-u", "c") });
        state.replace_tasks(vec![task("t1", "a"), task("t2", "b"), task("t3", "c"), task("t4", "c")]);
        state.reconcile_created_task("local-u", task("t4", "c"));
        assert_eq!(state.task_count(), 4);
    }
}
