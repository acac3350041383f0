//! Task board client: local task state kept in step with the persistence
//! service.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  drag / form / delete  ┌───────────────────────────────────┐
//! │   User   │ ─────────────────────> │  controller.rs  (BoardController) │
//! │ (render) │ <───────────────────── │         │                         │
//! └──────────┘  BoardView, SyncEvent  │         │ create / move / delete  │
//!                                     │         v                         │
//!                                     │  sync.rs  (Synchronizer, ledgers) │
//!                                     │     │               │             │
//!                                     │     │ optimistic    │ TaskApi     │
//!                                     │     v               v             │
//!                                     │  store.rs        client.rs        │
//!                                     │  (TaskStore)     (HttpTaskApi)    │
//!                                     └───────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module   | Responsibility                                            |
//! |----------|-----------------------------------------------------------|
//! | `models` | Shared types: `Task`, `TaskId`, `TaskStatus`, `BoardView` |
//! | `events` | `SyncEvent` enum + `publish()` helper                     |
//! | `mock`   | Test doubles for `TaskApi` (tests only)                   |
//!
//! ## Typical Flow (drag a card to "In Progress")
//!
//! 1. `BoardController::on_drag_end()` parses the destination column.
//! 2. `Synchronizer::update_status()` applies the move to the store and
//!    records it in the task's ledger.
//! 3. `TaskApi::update_status()` sends `PATCH /updatetask/{id}`.
//! 4. On response the ledger settles: a confirmation becomes the new base
//!    unless a newer confirmation already did, a failure drops the move.
//! 5. A `SyncEvent` is published for the renderer.

pub mod client;
pub mod controller;
pub mod events;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod store;
pub mod sync;

pub use client::{HttpTaskApi, TaskApi};
pub use controller::{BoardController, DragEnd, TaskForm};
pub use events::{SyncEvent, SyncOp};
pub use models::{BoardView, ColumnView, Task, TaskId, TaskStatus};
pub use sync::{RefreshOutcome, StatusChange, Synchronizer};
