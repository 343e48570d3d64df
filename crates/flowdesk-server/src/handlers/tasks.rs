//! Task store handlers. Every write is pushed to open sessions so their
//! resolved styles follow the task list.

use axum::extract::{Path, State};
use axum::Json;

use flowdesk_core::id::TaskId;
use flowdesk_core::task::Task;
use flowdesk_storage::TaskStore;

use crate::error::ApiError;
use crate::schema::tasks::{DeleteTaskResponse, ListTasksResponse, TaskResponse, UpsertTaskRequest};
use crate::state::AppState;

/// Lists all tasks.
///
/// `GET /tasks`
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<ListTasksResponse>, ApiError> {
    let tasks = state.store.get_all_tasks()?;
    Ok(Json(ListTasksResponse { tasks }))
}

/// Creates or replaces a task.
///
/// `PUT /tasks/{id}`
pub async fn upsert_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<UpsertTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = Task {
        id,
        title: req.title,
        status: req.status,
        priority: req.priority,
    };
    let mut store = state.store.clone();
    store.upsert_task(&task, state.now())?;
    state.refresh_tasks(false).await?;
    Ok(Json(TaskResponse { task }))
}

/// Deletes a task and clears every node reference to it.
///
/// `DELETE /tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Json<DeleteTaskResponse>, ApiError> {
    let mut store = state.store.clone();
    if !store.delete_task(&id, state.now())? {
        return Err(ApiError::NotFound(format!("task not found: {}", id)));
    }
    tracing::info!(task = %id, "task deleted");
    state.refresh_tasks(true).await?;
    Ok(Json(DeleteTaskResponse { deleted: true }))
}
