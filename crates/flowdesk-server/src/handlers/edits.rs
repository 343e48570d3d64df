//! Editing handlers. Each call is one user action on an open canvas.

use axum::extract::{Path, State};
use axum::Json;

use flowdesk_core::diagram::Viewport;
use flowdesk_core::id::DiagramId;

use crate::canvas::ConnectRequest;
use crate::error::ApiError;
use crate::schema::diagrams::CanvasView;
use crate::schema::edits::{
    ApplyPatchesRequest, ConnectResponse, HistoryResponse, MoveRequest, MoveResponse,
    RemoveRequest, RemoveResponse,
};
use crate::state::AppState;

/// Applies a raw patch batch as one undoable action. `updateViewport`
/// patches in the batch are debounced like a pan/zoom.
///
/// `POST /diagrams/{id}/patches`
pub async fn apply_patches(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Json(req): Json<ApplyPatchesRequest>,
) -> Result<Json<CanvasView>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    canvas.apply_user_patches(req.patches)?;
    state.schedule_viewport_flush(&canvas);
    Ok(Json(CanvasView::of(&canvas)))
}

/// Records a pan/zoom. It shows in the returned frame at once and is saved
/// when no other pan/zoom follows within the debounce window.
///
/// `POST /diagrams/{id}/viewport`
pub async fn pan_zoom(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Json(viewport): Json<Viewport>,
) -> Result<Json<CanvasView>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    canvas.pan_zoom(viewport, state.now())?;
    state.schedule_viewport_flush(&canvas);
    Ok(Json(CanvasView::of(&canvas)))
}

/// Connects two nodes after the cycle and duplicate checks.
///
/// `POST /diagrams/{id}/connect`
pub async fn connect(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let edge_id = canvas.connect(req)?;
    Ok(Json(ConnectResponse {
        edge_id,
        view: CanvasView::of(&canvas),
    }))
}

/// Removes nodes (with incident edges) and edges in one batch.
///
/// `POST /diagrams/{id}/remove`
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>, ApiError> {
    if req.nodes.is_empty() && req.edges.is_empty() {
        return Err(ApiError::BadRequest("nothing to remove".to_string()));
    }
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let (removed_nodes, removed_edges) = canvas.remove(&req.nodes, &req.edges)?;
    Ok(Json(RemoveResponse {
        removed_nodes,
        removed_edges,
        view: CanvasView::of(&canvas),
    }))
}

/// Replays one drag gesture and commits its final position.
///
/// `POST /diagrams/{id}/move`
pub async fn move_node(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let patch = if canvas.begin_drag(&req.node_id)? {
        for position in req.path {
            canvas.drag_to(&req.node_id, position)?;
        }
        canvas.drag_to(&req.node_id, req.to)?;
        canvas.end_drag(&req.node_id)?
    } else {
        None
    };
    Ok(Json(MoveResponse {
        patch,
        view: CanvasView::of(&canvas),
    }))
}

/// Commits the batch kept by an earlier failed save.
///
/// `POST /diagrams/{id}/retry`
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    let applied = canvas.retry_unsaved()?;
    Ok(Json(HistoryResponse {
        applied,
        view: CanvasView::of(&canvas),
    }))
}
