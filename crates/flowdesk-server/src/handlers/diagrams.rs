//! Diagram management handlers (list, create, get, delete, render).

use axum::extract::{Path, Query, State};
use axum::Json;

use flowdesk_core::diagram::{DiagramDocument, NewDiagram};
use flowdesk_core::id::DiagramId;
use flowdesk_storage::DiagramGateway;

use crate::error::ApiError;
use crate::schema::diagrams::{
    CanvasView, CreateDiagramResponse, DeleteDiagramResponse, ListDiagramsResponse, RenderQuery,
};
use crate::state::AppState;

/// Lists all diagrams.
///
/// `GET /diagrams`
pub async fn list_diagrams(
    State(state): State<AppState>,
) -> Result<Json<ListDiagramsResponse>, ApiError> {
    let diagrams = state.store.list_diagrams()?;
    Ok(Json(ListDiagramsResponse { diagrams }))
}

/// Creates an empty diagram.
///
/// `POST /diagrams`
pub async fn create_diagram(
    State(state): State<AppState>,
    Json(req): Json<NewDiagram>,
) -> Result<Json<CreateDiagramResponse>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("diagram name must not be empty".to_string()));
    }
    if req.viewport.is_some_and(|v| !v.is_valid()) {
        return Err(ApiError::BadRequest("invalid viewport".to_string()));
    }
    let mut store = state.store.clone();
    let diagram = store.create_diagram(req, state.now())?;
    tracing::info!(diagram = %diagram.id, name = %diagram.name, "diagram created");
    Ok(Json(CreateDiagramResponse { diagram }))
}

/// Returns the persisted document of a diagram.
///
/// `GET /diagrams/{id}`
pub async fn get_diagram(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
) -> Result<Json<DiagramDocument>, ApiError> {
    let document = state
        .store
        .load_diagram(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("diagram not found: {}", id)))?;
    Ok(Json(document))
}

/// Deletes a diagram and closes its session.
///
/// `DELETE /diagrams/{id}`
pub async fn delete_diagram(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
) -> Result<Json<DeleteDiagramResponse>, ApiError> {
    if let Some(session) = state.sessions.get(&id) {
        // Wait for an in-flight edit to finish before the rows go away.
        drop(session.lock().await);
    }
    state.sessions.close(&id);
    let mut store = state.store.clone();
    if !store.delete_diagram(&id)? {
        return Err(ApiError::NotFound(format!("diagram not found: {}", id)));
    }
    // A request may have reopened the session between the close and the
    // delete.
    state.sessions.close(&id);
    tracing::info!(diagram = %id, "diagram deleted");
    Ok(Json(DeleteDiagramResponse { deleted: true }))
}

/// Renders the canvas: resolved, styled runtime nodes and edges.
///
/// `GET /diagrams/{id}/render?theme=light|dark`
pub async fn render_diagram(
    State(state): State<AppState>,
    Path(id): Path<DiagramId>,
    Query(query): Query<RenderQuery>,
) -> Result<Json<CanvasView>, ApiError> {
    let session = state.canvas(&id)?;
    let mut canvas = session.lock().await;
    if let Some(theme) = query.theme {
        canvas.set_theme(theme);
    }
    Ok(Json(CanvasView::of(&canvas)))
}
