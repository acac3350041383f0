use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::board::models::{Task, TaskId, TaskStatus};

/// The service's one SQLite connection, shared by every request handler.
///
/// Each request hands over a closure that runs on the blocking pool with
/// the connection to itself. Requests are therefore serialized, which keeps
/// the duplicate-id check and the insert atomic.
#[derive(Clone)]
pub struct SharedTaskDb {
    db: Arc<Mutex<TaskDb>>,
}

impl SharedTaskDb {
    pub fn new(db: TaskDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `op` for the request named by `action` (used in errors and logs).
    pub async fn run<F, R>(&self, action: &'static str, op: F) -> Result<R>
    where
        F: FnOnce(&TaskDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let outcome = tokio::task::spawn_blocking(move || {
            // Every statement commits on its own, so a panicked request
            // leaves no partial write behind the poisoned lock.
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            op(&db)
        })
        .await
        .with_context(|| format!("Task {} request aborted", action))?;
        debug!(action, ok = outcome.is_ok(), "Task database request finished");
        outcome
    }
}

const TASK_COLUMNS: &str = "id, title, description, status";

fn read_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let status = status.parse::<TaskStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Task {
        id: TaskId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        status,
    })
}

pub struct TaskDb {
    conn: Connection,
}

impl TaskDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database.
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS tasks (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'TODO'
                        CHECK (status IN ('TODO', 'IN_PROGRESS', 'DONE')),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// All tasks in creation order.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM tasks ORDER BY seq", TASK_COLUMNS))
            .context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map([], read_task)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id.as_str()],
                read_task,
            )
            .optional()
            .context("Failed to query task")
    }

    /// Insert a task under its client-assigned id. Returns `None` when the
    /// id is already taken.
    pub fn create_task(&self, task: &Task) -> Result<Option<Task>> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO tasks (id, title, description, status) VALUES (?1, ?2, ?3, ?4)",
                params![
                    task.id.as_str(),
                    task.title,
                    task.description,
                    task.status.as_str()
                ],
            )
            .context("Failed to insert task")?;
        if inserted == 0 {
            return Ok(None);
        }
        self.get_task(&task.id)?
            .context("Task not found after insert")
            .map(Some)
    }

    pub fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<Option<Task>> {
        let updated = self
            .conn
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id.as_str()],
            )
            .context("Failed to update task status")?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_task(id)
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }
}
