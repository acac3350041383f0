use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use super::db::{SharedTaskDb, TaskDb};

/// Configuration for the reference persistence service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Keep tasks in memory only; `db_path` is ignored.
    pub in_memory: bool,
    /// Permissive CORS and bind on all interfaces, for a browser front-end
    /// served from elsewhere.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            db_path: PathBuf::from(".taskboard/tasks.db"),
            in_memory: false,
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        let host = if self.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
        format!("{}:{}", host, self.port)
    }

    /// Open the configured database, creating its directory when needed.
    pub fn open_db(&self) -> Result<TaskDb> {
        if self.in_memory {
            return TaskDb::new_in_memory();
        }
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        TaskDb::new(&self.db_path).context("Failed to initialize task database")
    }
}

/// Build the full application router with request tracing.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Serve `app` on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Bind an in-memory service on an ephemeral localhost port.
///
/// Returns the bound address and a handle to the serving task.
pub async fn spawn_ephemeral() -> Result<(SocketAddr, tokio::task::JoinHandle<Result<()>>)> {
    let db = TaskDb::new_in_memory()?;
    let app = build_router(Arc::new(AppState::new(SharedTaskDb::new(db))), false);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind ephemeral port")?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(serve(listener, app, std::future::pending()));
    Ok((addr, handle))
}

/// Start the service and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = config.open_db()?;
    let state = Arc::new(AppState::new(SharedTaskDb::new(db)));
    let app = build_router(state, config.dev_mode);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, in_memory = config.in_memory, db_path = %config.db_path.display(), "Service started");
    println!("Task service running at http://{}/api/tasks", local_addr);

    serve(listener, app, shutdown_signal()).await?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; shutting down");
    }
    println!("\nShutting down...");
}
