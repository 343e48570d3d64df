//! Undo and redo handlers.

use axum::extract::{Path, State};
use axum::Json;

use flowdesk_core::id::DiagramId;

use crate::error::ApiError;
use crate::schema::diagrams::CanvasView;
use crate::schema::edits::HistoryResponse;
use crate::state::AppState;

/// Reverts the most recent action on the diagram.
///
/// `POST /diagrams/{id}/undo`
pub async fn undo(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let applied = canvas.undo()?;
    if applied {
        tracing::info!(diagram = %id, "undo");
    }
    Ok(Json(HistoryResponse {
        applied,
        view: CanvasView::of(&canvas),
    }))
}

/// Re-applies the most recently undone action.
///
/// `POST /diagrams/{id}/redo`
pub async fn redo(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let applied = canvas.redo()?;
    if applied {
        tracing::info!(diagram = %id, "redo");
    }
    Ok(Json(HistoryResponse {
        applied,
        view: CanvasView::of(&canvas),
    }))
}
