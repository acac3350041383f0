//! Reference persistence service for the task board.
//!
//! Serves the REST surface below `/api/tasks` over SQLite:
//!
//! | Method | Path                     | Handler        |
//! |--------|--------------------------|----------------|
//! | GET    | `/api/tasks/gettasks`    | `list_tasks`   |
//! | POST   | `/api/tasks/addtasks`    | `add_task`     |
//! | PATCH  | `/api/tasks/updatetask/{id}` | `update_task` |
//! | DELETE | `/api/tasks/deletetask/{id}` | `delete_task` |
//! | GET    | `/health`                | `health_check` |
//!
//! `db` shares the SQLite connection through `SharedTaskDb`, `api` holds the handlers and
//! `server` wires the router, layers and listener.

pub mod api;
pub mod db;
pub mod server;

pub use server::{ServerConfig, build_router, spawn_ephemeral, start_server};
