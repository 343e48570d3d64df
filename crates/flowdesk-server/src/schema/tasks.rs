//! Task store types.

use serde::{Deserialize, Serialize};

use flowdesk_core::task::{Priority, Task, TaskStatus};

#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}

/// Body of `PUT /tasks/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpsertTaskRequest {
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct DeleteTaskResponse {
    pub deleted: bool,
}
