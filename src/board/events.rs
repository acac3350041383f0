use tokio::sync::broadcast;

use super::models::{Task, TaskId, TaskStatus};

/// Capacity of the synchronizer's event channel. Slow subscribers lag
/// rather than block mutations.
pub const EVENT_CAPACITY: usize = 256;

/// Which user-facing operation an event or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Load,
    Create,
    Move,
    Delete,
}

impl SyncOp {
    /// Transient message shown when the operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Load => "failed to load tasks",
            Self::Create => "failed to save task",
            Self::Move => "failed to move task",
            Self::Delete => "failed to delete task",
        }
    }
}

impl std::fmt::Display for SyncOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Create => "create",
            Self::Move => "move",
            Self::Delete => "delete",
        })
    }
}

/// Settled outcomes published by the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    TaskAdded {
        task: Task,
    },
    TaskMoved {
        task_id: TaskId,
        to: TaskStatus,
    },
    TaskDeleted {
        task_id: TaskId,
    },
    BoardRefreshed {
        tasks: usize,
        kept_local: usize,
    },
    /// A remote call failed; the optimistic change for this intent was reverted.
    SyncFailed {
        op: SyncOp,
        task_id: Option<TaskId>,
        reason: String,
    },
}

impl SyncEvent {
    /// One-line description suitable for a status bar or terminal.
    pub fn summary(&self) -> String {
        match self {
            SyncEvent::TaskAdded { task } => format!("added {} ({})", task.id, task.title),
            SyncEvent::TaskMoved { task_id, to } => format!("moved {} to {}", task_id, to.title()),
            SyncEvent::TaskDeleted { task_id } => format!("deleted {}", task_id),
            SyncEvent::BoardRefreshed { tasks, .. } => format!("loaded {} tasks", tasks),
            SyncEvent::SyncFailed {
                op,
                task_id: Some(id),
                reason,
            } => format!("{} {}: {}", op.failure_message(), id, reason),
            SyncEvent::SyncFailed {
                op,
                task_id: None,
                reason,
            } => format!("{}: {}", op.failure_message(), reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncEvent::SyncFailed { .. })
    }
}

/// Publish an event, ignoring the error when nobody is subscribed.
pub fn publish(tx: &broadcast::Sender<SyncEvent>, event: SyncEvent) {
    let _ = tx.send(event);
}
