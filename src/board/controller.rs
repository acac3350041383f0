use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, error};

use super::client::TaskApi;
use super::events::SyncEvent;
use super::models::{BoardView, IdSource, Task, TaskId, TaskStatus, UuidIds};
use super::sync::{RefreshOutcome, StatusChange, Synchronizer};
use crate::errors::BoardError;

/// End of a drag gesture. `over` is the id of the column the card was
/// dropped on, or `None` when it was released outside every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub task_id: TaskId,
    pub over: Option<String>,
}

impl DragEnd {
    pub fn new(task_id: impl Into<TaskId>, over: Option<&str>) -> Self {
        Self {
            task_id: task_id.into(),
            over: over.map(str::to_string),
        }
    }
}

/// Contents of the add-task form as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
}

impl TaskForm {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Trim both fields and reject empty ones.
    fn validate(&self) -> Result<(String, String), BoardError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyField { field: "title" });
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(BoardError::EmptyField {
                field: "description",
            });
        }
        Ok((title.to_string(), description.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Ready,
    Failed(String),
}

/// Adapts user input into synchronizer operations.
pub struct BoardController<A> {
    sync: Synchronizer<A>,
    ids: Arc<dyn IdSource>,
    load: Arc<Mutex<LoadState>>,
}

impl<A> Clone for BoardController<A> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            ids: Arc::clone(&self.ids),
            load: Arc::clone(&self.load),
        }
    }
}

impl<A: TaskApi> BoardController<A> {
    pub fn new(sync: Synchronizer<A>) -> Self {
        Self::with_ids(sync, Arc::new(UuidIds))
    }

    pub fn with_ids(sync: Synchronizer<A>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            sync,
            ids,
            load: Arc::new(Mutex::new(LoadState::Unloaded)),
        }
    }

    pub fn sync(&self) -> &Synchronizer<A> {
        &self.sync
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.subscribe()
    }

    fn set_load(&self, state: LoadState) {
        *self.load.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Initial load. A failure puts the board into its error state.
    pub async fn load(&self) -> Result<BoardView, BoardError> {
        match self.sync.refresh().await {
            Ok(_) => {
                self.set_load(LoadState::Ready);
                Ok(self.sync.board())
            }
            Err(err) => {
                error!(error = %err, "Initial load failed");
                let reason = err.to_string();
                self.set_load(LoadState::Failed(reason.clone()));
                Err(BoardError::LoadFailed(reason))
            }
        }
    }

    /// On-demand refresh. A failure is reported but leaves a loaded board usable.
    pub async fn refresh(&self) -> Result<RefreshOutcome, BoardError> {
        let outcome = self.sync.refresh().await?;
        self.set_load(LoadState::Ready);
        Ok(outcome)
    }

    /// The board to render, or the reason there is none.
    pub fn view(&self) -> Result<BoardView, BoardError> {
        match &*self.load.lock().unwrap_or_else(PoisonError::into_inner) {
            LoadState::Unloaded => Err(BoardError::NotLoaded),
            LoadState::Failed(reason) => Err(BoardError::LoadFailed(reason.clone())),
            LoadState::Ready => Ok(self.sync.board()),
        }
    }

    pub async fn on_drag_end(&self, drag: DragEnd) -> Result<StatusChange, BoardError> {
        let Some(column) = drag.over else {
            debug!(task_id = %drag.task_id, "Dropped outside the board");
            return Ok(StatusChange::Unchanged);
        };
        let status: TaskStatus = column
            .parse()
            .map_err(|_| BoardError::UnknownColumn(column.clone()))?;
        self.move_task(&drag.task_id, status).await
    }

    pub async fn move_task(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<StatusChange, BoardError> {
        Ok(self.sync.update_status(id, status).await?)
    }

    /// Submit the add-task form. New tasks start in TODO.
    pub async fn submit(&self, form: &TaskForm) -> Result<Task, BoardError> {
        let (title, description) = form.validate()?;
        let task = Task::new(self.ids.next_id(), title, description);
        Ok(self.sync.create_task(task).await?)
    }

    pub async fn delete(&self, id: &TaskId) -> Result<(), BoardError> {
        Ok(self.sync.delete_task(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::mock::{
        FakeService, Request, Script, ScriptedApi, SequentialIds, task,
    };
    use crate::errors::{RemoteError, SyncError};

    fn controller(tasks: Vec<Task>) -> BoardController<FakeService> {
        let sync = Synchronizer::new(FakeService::with_tasks(tasks));
        BoardController::with_ids(sync, Arc::new(SequentialIds::default()))
    }

    fn scripted() -> (BoardController<ScriptedApi>, Script) {
        let (api, script) = ScriptedApi::new();
        let controller =
            BoardController::with_ids(Synchronizer::new(api), Arc::new(SequentialIds::default()));
        (controller, script)
    }

    #[tokio::test]
    async fn test_view_before_load_is_not_loaded() {
        let board = controller(vec![]);
        assert!(matches!(board.view(), Err(BoardError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_load_renders_columns() {
        let board = controller(vec![
            task("1", TaskStatus::Todo),
            task("2", TaskStatus::InProgress),
            task("3", TaskStatus::InProgress),
        ]);
        let view = board.load().await.unwrap();
        assert_eq!(view.column(TaskStatus::Todo).len(), 1);
        assert_eq!(view.column(TaskStatus::InProgress).len(), 2);
        assert!(view.column(TaskStatus::Done).is_empty());
        assert_eq!(board.view().unwrap(), view);
    }

    #[tokio::test]
    async fn test_failed_load_enters_error_state() {
        let board = controller(vec![task("1", TaskStatus::Todo)]);
        let service = board.sync().api();
        service.fail_next(RemoteError::Network("HTTP 500".into()));

        let err = board.load().await.unwrap_err();
        assert!(matches!(err, BoardError::LoadFailed(_)));
        match board.view() {
            Err(BoardError::LoadFailed(reason)) => assert!(reason.contains("HTTP 500")),
            other => panic!("expected load failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_recovers_from_failed_load() {
        let board = controller(vec![task("1", TaskStatus::Todo)]);
        board
            .sync()
            .api()
            .fail_next(RemoteError::Network("down".into()));
        assert!(board.load().await.is_err());

        board.refresh().await.unwrap();
        assert_eq!(board.view().unwrap().task_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_trims_and_starts_in_todo() {
        let board = controller(vec![]);
        board.load().await.unwrap();

        let created = board
            .submit(&TaskForm::new("  Write docs ", "\tfor the API\n"))
            .await
            .unwrap();
        assert_eq!(created.id, TaskId::new("task-1"));
        assert_eq!(created.title, "Write docs");
        assert_eq!(created.description, "for the API");
        assert_eq!(created.status, TaskStatus::Todo);
        assert_eq!(board.view().unwrap().column(TaskStatus::Todo), &[created]);
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_before_any_remote_call() {
        let (board, mut script) = scripted();

        let err = board.submit(&TaskForm::new("   ", "something")).await.unwrap_err();
        assert!(matches!(err, BoardError::EmptyField { field: "title" }));
        assert_eq!(err.to_string(), "Task title must not be empty");

        let err = board.submit(&TaskForm::new("title", "")).await.unwrap_err();
        assert!(matches!(err, BoardError::EmptyField { field: "description" }));

        script.assert_no_request();
        assert!(board.sync().api().calls().is_empty());
        assert!(board.sync().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_drag_outside_columns_is_a_no_op() {
        let board = controller(vec![task("1", TaskStatus::Todo)]);
        board.load().await.unwrap();
        let calls = board.sync().api().call_count();

        let change = board.on_drag_end(DragEnd::new("1", None)).await.unwrap();
        assert_eq!(change, StatusChange::Unchanged);
        assert_eq!(board.sync().api().call_count(), calls);
    }

    #[tokio::test]
    async fn test_drag_to_unknown_column_is_rejected() {
        let board = controller(vec![task("1", TaskStatus::Todo)]);
        board.load().await.unwrap();
        let calls = board.sync().api().call_count();

        let err = board
            .on_drag_end(DragEnd::new("1", Some("BLOCKED")))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownColumn(ref c) if c == "BLOCKED"));
        assert_eq!(board.sync().api().call_count(), calls);
    }

    #[tokio::test]
    async fn test_drag_done_onto_done_sends_nothing() {
        let (board, mut script) = scripted();
        let load = tokio::spawn({
            let board = board.clone();
            async move { board.load().await }
        });
        script
            .next()
            .await
            .reply_tasks(vec![task("1", TaskStatus::Done)]);
        load.await.unwrap().unwrap();
        let before = board.view().unwrap();

        let change = board
            .on_drag_end(DragEnd::new("1", Some("DONE")))
            .await
            .unwrap();

        assert_eq!(change, StatusChange::Unchanged);
        script.assert_no_request();
        assert_eq!(board.sync().api().calls(), vec![Request::List]);
        assert_eq!(board.view().unwrap(), before);
    }

    #[tokio::test]
    async fn test_drag_moves_task() {
        let board = controller(vec![task("1", TaskStatus::Todo)]);
        board.load().await.unwrap();

        let change = board
            .on_drag_end(DragEnd::new("1", Some("in_progress")))
            .await
            .unwrap();
        assert!(matches!(change, StatusChange::Moved(ref t) if t.status == TaskStatus::InProgress));
        assert_eq!(
            board.sync().api().tasks()[0].status,
            TaskStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_delete_removes_task_everywhere() {
        let board = controller(vec![task("1", TaskStatus::Todo), task("2", TaskStatus::Done)]);
        board.load().await.unwrap();

        board.delete(&TaskId::new("1")).await.unwrap();
        assert!(board.sync().task(&TaskId::new("1")).is_none());
        assert_eq!(board.sync().api().tasks(), vec![task("2", TaskStatus::Done)]);
    }

    #[tokio::test]
    async fn test_delete_unknown_task_is_reported() {
        let board = controller(vec![]);
        board.load().await.unwrap();
        let err = board.delete(&TaskId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, BoardError::Sync(SyncError::UnknownTask(_))));
    }
}
