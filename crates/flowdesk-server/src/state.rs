//! Application state shared by every handler.
//!
//! [`AppState`] holds one SQLite-backed store behind a cloneable
//! [`SharedStore`] handle and the registry of open canvas sessions. Each
//! session owns a clone of the store handle, so all sessions and the task
//! endpoints write through the same connection.
//!
//! Sessions live behind `tokio::sync::Mutex` (async-aware) so handlers await
//! the lock without blocking the runtime.
//!
//! A session owns its diagram's undo history and stays open until the
//! diagram is deleted.

use std::sync::Arc;
use std::time::Duration;

use flowdesk_core::clock::{Clock, SystemClock};
use flowdesk_core::id::DiagramId;
use flowdesk_storage::{SharedStore, SqliteStore, TaskStore};

use crate::canvas::Canvas;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::session::{SessionRegistry, SharedCanvas};

pub type Store = SharedStore<SqliteStore>;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: Arc<SessionRegistry<Store>>,
    pub config: Arc<ServerConfig>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates a new `AppState` backed by the database at `config.db_path`.
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        let store = SqliteStore::new(&config.db_path)?;
        Ok(Self::with_store(store, config, Arc::new(SystemClock)))
    }

    /// Creates a new `AppState` with an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        let store = SqliteStore::in_memory()?;
        Ok(Self::with_store(store, ServerConfig::default(), Arc::new(SystemClock)))
    }

    pub fn with_store(store: SqliteStore, config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        AppState {
            store: SharedStore::new(store),
            sessions: Arc::new(SessionRegistry::new()),
            config: Arc::new(config),
            clock,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Returns the session for diagram `id`, opening it (with the current
    /// task list) on first use.
    pub fn canvas(&self, id: &DiagramId) -> Result<SharedCanvas<Store>, ApiError> {
        let session = self.sessions.get_or_open(id, || {
            let mut canvas = Canvas::open_with_clock(
                self.store.clone(),
                id,
                self.config.canvas.clone(),
                Arc::clone(&self.clock),
            )?;
            canvas.set_tasks(self.store.get_all_tasks()?);
            Ok(canvas)
        })?;
        Ok(session)
    }

    /// Saves `canvas`'s pending pan/zoom once its debounce window has
    /// passed. A newer pan/zoom in the meantime restarts the window; the
    /// request that made it schedules its own flush.
    pub fn schedule_viewport_flush(&self, canvas: &Canvas<Store>) {
        let Some(due_at) = canvas.viewport_due_at() else {
            return;
        };
        let id = canvas.id().clone();
        let state = self.clone();
        let wait = u64::try_from(due_at.saturating_sub(self.now())).unwrap_or(0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(wait)).await;
            let Some(session) = state.sessions.get(&id) else {
                return;
            };
            let mut canvas = session.lock().await;
            match canvas.flush_viewport(state.now().max(due_at)) {
                Ok(Some(_)) => tracing::debug!(diagram = %id, "viewport saved"),
                Ok(None) => {}
                Err(err) => tracing::warn!(diagram = %id, error = %err, "viewport not saved"),
            }
        });
    }

    /// Pushes the current task list into every open session. With `reload`,
    /// each session first re-reads its diagram (after references to a
    /// deleted task were cleared in storage).
    pub async fn refresh_tasks(&self, reload: bool) -> Result<(), ApiError> {
        let tasks = self.store.get_all_tasks()?;
        for session in self.sessions.all() {
            let mut canvas = session.lock().await;
            if reload {
                canvas.reload()?;
            }
            canvas.set_tasks(tasks.clone());
        }
        Ok(())
    }
}
