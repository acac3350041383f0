//! Test doubles for `TaskApi`.
//!
//! `ScriptedApi` parks every call until the test answers it through the
//! paired `Script`, which makes response ordering fully controllable.
//! `FakeService` answers immediately from an in-memory task list with the
//! same rules as the reference service.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::client::TaskApi;
use super::models::{IdSource, Task, TaskId, TaskStatus};
use crate::errors::RemoteError;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    List,
    Create(Task),
    Update(TaskId, TaskStatus),
    Delete(TaskId),
}

#[derive(Debug)]
pub enum Reply {
    Tasks(Vec<Task>),
    Task(Task),
    Done,
}

/// A call waiting for the test to answer it.
pub struct PendingCall {
    pub request: Request,
    reply: oneshot::Sender<Result<Reply, RemoteError>>,
}

impl PendingCall {
    pub fn reply_tasks(self, tasks: Vec<Task>) {
        let _ = self.reply.send(Ok(Reply::Tasks(tasks)));
    }

    pub fn reply_task(self, task: Task) {
        let _ = self.reply.send(Ok(Reply::Task(task)));
    }

    pub fn reply_done(self) {
        let _ = self.reply.send(Ok(Reply::Done));
    }

    pub fn fail(self, err: RemoteError) {
        let _ = self.reply.send(Err(err));
    }

    /// Answer a create with the submitted task, or a delete with success.
    pub fn echo(self) {
        match self.request.clone() {
            Request::Create(task) => self.reply_task(task),
            Request::Delete(_) => self.reply_done(),
            other => panic!("cannot echo {:?}", other),
        }
    }
}

/// Test-side handle receiving the calls made on a `ScriptedApi`.
pub struct Script {
    rx: mpsc::UnboundedReceiver<PendingCall>,
}

impl Script {
    pub async fn next(&mut self) -> PendingCall {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a remote call")
            .expect("ScriptedApi dropped")
    }

    pub fn assert_no_request(&mut self) {
        if let Ok(call) = self.rx.try_recv() {
            panic!("unexpected remote call: {:?}", call.request);
        }
    }
}

pub struct ScriptedApi {
    tx: mpsc::UnboundedSender<PendingCall>,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedApi {
    pub fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let api = Self {
            tx,
            calls: Mutex::new(Vec::new()),
        };
        (api, Script { rx })
    }

    /// Every request made so far, in call order.
    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    async fn call(&self, request: Request) -> Result<Reply, RemoteError> {
        self.calls.lock().unwrap().push(request.clone());
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PendingCall { request, reply })
            .expect("Script dropped");
        rx.await
            .unwrap_or_else(|_| Err(RemoteError::Network("call abandoned by test".into())))
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        match self.call(Request::List).await? {
            Reply::Tasks(tasks) => Ok(tasks),
            other => panic!("list answered with {:?}", other),
        }
    }

    async fn create_task(&self, task: &Task) -> Result<Task, RemoteError> {
        match self.call(Request::Create(task.clone())).await? {
            Reply::Task(task) => Ok(task),
            other => panic!("create answered with {:?}", other),
        }
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, RemoteError> {
        match self.call(Request::Update(id.clone(), status)).await? {
            Reply::Task(task) => Ok(task),
            other => panic!("update answered with {:?}", other),
        }
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        match self.call(Request::Delete(id.clone())).await? {
            Reply::Done => Ok(()),
            other => panic!("delete answered with {:?}", other),
        }
    }
}

/// In-memory persistence service that answers every call after a yield.
#[derive(Default)]
pub struct FakeService {
    tasks: Mutex<Vec<Task>>,
    fail_next: Mutex<Option<RemoteError>>,
    calls: AtomicUsize,
}

impl FakeService {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: RemoteError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskApi for FakeService {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        self.enter().await?;
        Ok(self.tasks())
    }

    async fn create_task(&self, task: &Task) -> Result<Task, RemoteError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(RemoteError::Validation(format!("Task {} already exists", task.id)));
        }
        let stored = Task {
            title: task.title.trim().to_string(),
            description: task.description.trim().to_string(),
            ..task.clone()
        };
        tasks.push(stored.clone());
        Ok(stored)
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, RemoteError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        task.status = status;
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(RemoteError::NotFound(id.clone()));
        }
        Ok(())
    }
}

/// Deterministic ids: `task-1`, `task-2`, ...
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> TaskId {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        TaskId::new(format!("task-{}", n))
    }
}

pub fn task(id: &str, status: TaskStatus) -> Task {
    Task::new(TaskId::new(id), format!("Task {}", id), format!("Description {}", id))
        .with_status(status)
}

/// Yield to the scheduler until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
