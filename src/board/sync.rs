//! Optimistic task synchronization.
//!
//! Every mutation is applied to the [`TaskStore`] before its remote call is
//! issued, then reconciled when the call settles. Reconciliation is
//! "last optimistic intent wins":
//!
//! - each mutation takes a sequence number from a logical clock;
//! - each task with activity has a [`Ledger`] holding the last
//!   server-confirmed record (`base`), the sequence that produced it and
//!   the still-pending mutations;
//! - the visible record is `base` with every pending mutation newer than
//!   `base_seq` applied in order.
//!
//! A confirmation older than the current base is ignored, so an early
//! response arriving late never overwrites a newer intent. A failure drops
//! only its own mutation from the ledger, which reverts exactly that intent.
//!
//! Refreshes are stamped with the same clock. A refresh that resolves after
//! a newer one has been applied is discarded, and a refresh never
//! overwrites a task that had activity after the refresh started.
//!
//! A ledger lives only while it matters: once its last mutation settles and
//! no refresh is in flight, the store alone describes the task and the
//! ledger is dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::client::TaskApi;
use super::events::{EVENT_CAPACITY, SyncEvent, SyncOp, publish};
use super::models::{BoardView, Task, TaskId, TaskStatus};
use super::store::TaskStore;
use crate::errors::{RemoteError, SyncError};

/// Result of a status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The task was already in the target column; nothing was sent.
    Unchanged,
    /// The server confirmed the move with this record.
    Moved(Task),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { tasks: usize, kept_local: usize },
    /// A newer refresh had already been applied; this snapshot was dropped.
    Stale,
}

#[derive(Debug, Clone)]
enum Mutation {
    Create(Task),
    SetStatus(TaskStatus),
    Delete,
}

impl Mutation {
    fn apply(&self, task: Option<Task>) -> Option<Task> {
        match self {
            Mutation::Create(created) => Some(created.clone()),
            Mutation::SetStatus(status) => task.map(|t| t.with_status(*status)),
            Mutation::Delete => None,
        }
    }
}

enum Settlement {
    /// Server state after the call; `None` means the task no longer exists.
    Confirmed(Option<Task>),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Creation {
    Pending,
    Confirmed,
    Failed,
}

struct Ledger {
    base: Option<Task>,
    base_seq: u64,
    pending: BTreeMap<u64, Mutation>,
    /// Clock value of the last optimistic apply or settlement.
    touched: u64,
    /// Present while the task's own creation is in flight.
    creation: Option<watch::Receiver<Creation>>,
}

impl Ledger {
    fn new(base: Option<Task>) -> Self {
        Self {
            base,
            base_seq: 0,
            pending: BTreeMap::new(),
            touched: 0,
            creation: None,
        }
    }

    fn view(&self) -> Option<Task> {
        self.pending
            .range(self.base_seq + 1..)
            .fold(self.base.clone(), |task, (_, mutation)| mutation.apply(task))
    }

    fn busy_since(&self, stamp: u64) -> bool {
        !self.pending.is_empty() || self.touched > stamp
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.creation.is_none()
    }
}

#[derive(Default)]
struct SyncState {
    store: TaskStore,
    clock: u64,
    ledgers: HashMap<TaskId, Ledger>,
    refreshed_at: u64,
    /// Refreshes whose list call has not resolved yet.
    refreshing: usize,
}

impl SyncState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Record a mutation and apply it to the store.
    fn begin(&mut self, id: &TaskId, mutation: Mutation) -> u64 {
        let seq = self.tick();
        let current = self.store.get(id).cloned();
        let ledger = self
            .ledgers
            .entry(id.clone())
            .or_insert_with(|| Ledger::new(current));
        ledger.pending.insert(seq, mutation);
        ledger.touched = seq;
        self.project(id);
        seq
    }

    fn settle(&mut self, id: &TaskId, seq: u64, settlement: Settlement) {
        let touched = self.tick();
        if let Some(ledger) = self.ledgers.get_mut(id) {
            ledger.pending.remove(&seq);
            ledger.touched = touched;
            if let Settlement::Confirmed(record) = settlement
                && seq > ledger.base_seq
            {
                ledger.base = record;
                ledger.base_seq = seq;
            }
        }
        self.project(id);
        self.retire(id);
    }

    fn finish_creation(&mut self, id: &TaskId) {
        if let Some(ledger) = self.ledgers.get_mut(id) {
            ledger.creation = None;
        }
        self.retire(id);
    }

    /// Drop the ledger of `id` once nothing depends on it. An in-flight
    /// refresh still needs `touched` to tell it the task moved on.
    fn retire(&mut self, id: &TaskId) {
        if self.refreshing > 0 {
            return;
        }
        if self.ledgers.get(id).is_some_and(Ledger::is_idle) {
            self.ledgers.remove(id);
        }
    }

    fn start_refresh(&mut self) -> u64 {
        self.refreshing += 1;
        self.tick()
    }

    fn end_refresh(&mut self) {
        self.refreshing = self.refreshing.saturating_sub(1);
        if self.refreshing == 0 {
            self.ledgers.retain(|_, ledger| !ledger.is_idle());
        }
    }

    fn creation_gate(&self, id: &TaskId) -> Option<watch::Receiver<Creation>> {
        self.ledgers.get(id).and_then(|l| l.creation.clone())
    }

    /// Write the ledger's view of `id` into the store.
    fn project(&mut self, id: &TaskId) {
        let Some(ledger) = self.ledgers.get(id) else {
            return;
        };
        match ledger.view() {
            Some(task) => self.store.replace(task),
            None => {
                self.store.remove(id);
            }
        }
    }

    fn apply_snapshot(&mut self, stamp: u64, tasks: Vec<Task>) -> RefreshOutcome {
        if stamp < self.refreshed_at {
            return RefreshOutcome::Stale;
        }
        self.refreshed_at = stamp;

        let busy: HashSet<TaskId> = self
            .ledgers
            .iter()
            .filter(|(_, ledger)| ledger.busy_since(stamp))
            .map(|(id, _)| id.clone())
            .collect();
        let remote: HashSet<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();

        let gone: Vec<TaskId> = self
            .store
            .ids()
            .filter(|id| !busy.contains(*id) && !remote.contains(*id))
            .cloned()
            .collect();
        for id in &gone {
            self.store.remove(id);
        }
        for task in tasks {
            if !busy.contains(&task.id) {
                self.store.replace(task);
            }
        }
        // Idle ledgers are fully reflected by this snapshot.
        self.ledgers.retain(|id, _| busy.contains(id));

        RefreshOutcome::Applied {
            tasks: self.store.len(),
            kept_local: busy.len(),
        }
    }

    fn pending(&self) -> usize {
        self.ledgers.values().map(|l| l.pending.len()).sum()
    }
}

/// Marks a refresh as in flight until dropped, including when the list
/// call fails or the refresh future is cancelled.
struct RefreshGuard {
    state: Arc<Mutex<SyncState>>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .end_refresh();
    }
}

async fn wait_for_creation(gate: Option<watch::Receiver<Creation>>) -> Creation {
    let Some(mut rx) = gate else {
        return Creation::Confirmed;
    };
    match rx.wait_for(|state| *state != Creation::Pending).await {
        Ok(state) => *state,
        // Sender dropped: the create was abandoned before settling.
        Err(_) => Creation::Failed,
    }
}

/// Owns the task store and keeps it in step with the persistence service.
///
/// Cloning is cheap; clones share the same store and event channel. The
/// optimistic part of each operation runs before its first `.await`, so it
/// is visible as soon as the returned future is first polled.
pub struct Synchronizer<A> {
    api: Arc<A>,
    state: Arc<Mutex<SyncState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl<A> Clone for Synchronizer<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        }
    }
}

impl<A: TaskApi> Synchronizer<A> {
    pub fn new(api: A) -> Self {
        Self::with_api(Arc::new(api))
    }

    pub fn with_api(api: Arc<A>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            state: Arc::new(Mutex::new(SyncState::default())),
            events,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        // Store mutations cannot panic halfway, so a poisoned lock still
        // guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<Task> {
        self.state().store.tasks().cloned().collect()
    }

    pub fn tasks_in(&self, status: TaskStatus) -> Vec<Task> {
        self.state().store.by_status(status).cloned().collect()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state().store.get(id).cloned()
    }

    pub fn board(&self) -> BoardView {
        BoardView::from_tasks(self.state().store.tasks())
    }

    /// Number of mutations whose remote call has not settled.
    pub fn pending(&self) -> usize {
        self.state().pending()
    }

    #[cfg(test)]
    fn ledger_count(&self) -> usize {
        self.state().ledgers.len()
    }

    // ── Operations ────────────────────────────────────────────────────

    /// Fetch the full task list and merge it into the store.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        let stamp = self.state().start_refresh();
        let _in_flight = RefreshGuard {
            state: Arc::clone(&self.state),
        };
        debug!(stamp, "Refreshing tasks");
        let tasks = match self.api.list_tasks().await {
            Ok(tasks) => tasks,
            Err(err) => return Err(self.fail(SyncOp::Load, None, err)),
        };

        let outcome = self.state().apply_snapshot(stamp, tasks);
        match outcome {
            RefreshOutcome::Applied { tasks, kept_local } => {
                info!(tasks, kept_local, "Board refreshed");
                publish(&self.events, SyncEvent::BoardRefreshed { tasks, kept_local });
            }
            RefreshOutcome::Stale => debug!(stamp, "Discarded stale refresh"),
        }
        Ok(outcome)
    }

    /// Add `task` to the board and persist it.
    ///
    /// The task is not re-validated here; callers check title and
    /// description. Returns the server-confirmed record.
    pub async fn create_task(&self, task: Task) -> Result<Task, SyncError> {
        let id = task.id.clone();
        let (seq, gate) = {
            let mut state = self.state();
            let seq = state.begin(&id, Mutation::Create(task.clone()));
            let (gate, rx) = watch::channel(Creation::Pending);
            if let Some(ledger) = state.ledgers.get_mut(&id) {
                ledger.creation = Some(rx);
            }
            (seq, gate)
        };
        debug!(task_id = %id, seq, "Optimistically added task");

        match self.api.create_task(&task).await {
            Ok(mut confirmed) => {
                if confirmed.id != id {
                    warn!(task_id = %id, server_id = %confirmed.id, "Server echoed a different id; keeping the client id");
                    confirmed.id = id.clone();
                }
                {
                    let mut state = self.state();
                    state.settle(&id, seq, Settlement::Confirmed(Some(confirmed.clone())));
                    state.finish_creation(&id);
                }
                gate.send_replace(Creation::Confirmed);
                info!(task_id = %id, "Task created");
                publish(
                    &self.events,
                    SyncEvent::TaskAdded {
                        task: confirmed.clone(),
                    },
                );
                Ok(confirmed)
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    state.settle(&id, seq, Settlement::Failed);
                    state.finish_creation(&id);
                }
                gate.send_replace(Creation::Failed);
                Err(self.fail(SyncOp::Create, Some(&id), err))
            }
        }
    }

    /// Move a task to another column.
    ///
    /// A move to the task's current column is a no-op with no remote call.
    pub async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<StatusChange, SyncError> {
        let (seq, gate) = {
            let mut state = self.state();
            let current = state
                .store
                .get(id)
                .ok_or_else(|| SyncError::UnknownTask(id.clone()))?;
            if current.status == status {
                debug!(task_id = %id, %status, "Task already in column; nothing to do");
                return Ok(StatusChange::Unchanged);
            }
            let seq = state.begin(id, Mutation::SetStatus(status));
            (seq, state.creation_gate(id))
        };
        debug!(task_id = %id, seq, %status, "Optimistically moved task");

        if wait_for_creation(gate).await == Creation::Failed {
            self.state().settle(id, seq, Settlement::Failed);
            return Err(self.fail(SyncOp::Move, Some(id), RemoteError::NotFound(id.clone())));
        }

        match self.api.update_status(id, status).await {
            Ok(confirmed) => {
                self.state()
                    .settle(id, seq, Settlement::Confirmed(Some(confirmed.clone())));
                info!(task_id = %id, status = %confirmed.status, "Task moved");
                publish(
                    &self.events,
                    SyncEvent::TaskMoved {
                        task_id: id.clone(),
                        to: confirmed.status,
                    },
                );
                Ok(StatusChange::Moved(confirmed))
            }
            Err(err) => {
                // A task the server no longer has is dropped rather than restored.
                let settlement = match err {
                    RemoteError::NotFound(_) => Settlement::Confirmed(None),
                    _ => Settlement::Failed,
                };
                self.state().settle(id, seq, settlement);
                Err(self.fail(SyncOp::Move, Some(id), err))
            }
        }
    }

    /// Remove a task from the board and delete it remotely.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), SyncError> {
        let (seq, gate) = {
            let mut state = self.state();
            if !state.store.contains(id) {
                return Err(SyncError::UnknownTask(id.clone()));
            }
            let seq = state.begin(id, Mutation::Delete);
            (seq, state.creation_gate(id))
        };
        debug!(task_id = %id, seq, "Optimistically removed task");

        let result = match wait_for_creation(gate).await {
            // Never persisted, so there is nothing to delete remotely.
            Creation::Failed => Ok(()),
            _ => self.api.delete_task(id).await,
        };

        match result {
            Ok(()) => {
                self.state().settle(id, seq, Settlement::Confirmed(None));
                info!(task_id = %id, "Task deleted");
                publish(
                    &self.events,
                    SyncEvent::TaskDeleted {
                        task_id: id.clone(),
                    },
                );
                Ok(())
            }
            Err(err) => {
                // Already gone remotely: keep it removed, but still report.
                let settlement = match err {
                    RemoteError::NotFound(_) => Settlement::Confirmed(None),
                    _ => Settlement::Failed,
                };
                self.state().settle(id, seq, settlement);
                Err(self.fail(SyncOp::Delete, Some(id), err))
            }
        }
    }

    fn fail(&self, op: SyncOp, task_id: Option<&TaskId>, err: RemoteError) -> SyncError {
        match task_id {
            Some(id) => warn!(task_id = %id, %op, error = %err, "Remote call failed; reverted"),
            None => warn!(%op, error = %err, "Remote call failed"),
        }
        publish(
            &self.events,
            SyncEvent::SyncFailed {
                op,
                task_id: task_id.cloned(),
                reason: err.to_string(),
            },
        );
        SyncError::Remote(err)
    }
}
