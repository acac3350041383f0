use std::collections::HashMap;

use super::models::{Task, TaskId, TaskStatus};

/// In-memory view of every task on the board, keyed by id.
///
/// Iteration follows insertion order so columns render stably. The store
/// does no I/O and never fails; it assumes a single writer (the
/// `Synchronizer` holds it behind its state lock).
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task at the end of the order. An existing record with the
    /// same id is overwritten and moved to the end.
    pub fn insert(&mut self, task: Task) {
        if self.tasks.contains_key(&task.id) {
            self.order.retain(|id| id != &task.id);
        }
        self.order.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
    }

    /// Upsert by id, keeping the current position of an existing record.
    pub fn replace(&mut self, task: Task) {
        if !self.tasks.contains_key(&task.id) {
            self.order.push(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let removed = self.tasks.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn by_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks().filter(move |task| task.status == status)
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
