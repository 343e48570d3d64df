//! Diagram management and rendering types.

use serde::{Deserialize, Serialize};

use flowdesk_core::diagram::DiagramMeta;
use flowdesk_storage::{DiagramGateway, DiagramSummary};
use flowdesk_view::runtime::RenderFrame;
use flowdesk_view::style::Theme;

use crate::canvas::Canvas;

/// Response listing all diagrams.
#[derive(Debug, Serialize)]
pub struct ListDiagramsResponse {
    pub diagrams: Vec<DiagramSummary>,
}

/// Response after creating a diagram.
#[derive(Debug, Serialize)]
pub struct CreateDiagramResponse {
    pub diagram: DiagramMeta,
}

/// Response after deleting a diagram.
#[derive(Debug, Serialize)]
pub struct DeleteDiagramResponse {
    pub deleted: bool,
}

/// Query string for `GET /diagrams/{id}/render`.
#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    /// Switches the session theme before rendering.
    #[serde(default)]
    pub theme: Option<Theme>,
}

/// What a client needs to draw the canvas after any call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasView {
    pub diagram: DiagramMeta,
    pub theme: Theme,
    pub frame: RenderFrame,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Number of patches in the batch waiting to be retried.
    pub unsaved: usize,
}

impl CanvasView {
    pub fn of<G: DiagramGateway>(canvas: &Canvas<G>) -> Self {
        CanvasView {
            diagram: canvas.snapshot().meta.clone(),
            theme: canvas.theme(),
            frame: canvas.frame(),
            can_undo: canvas.can_undo(),
            can_redo: canvas.can_redo(),
            unsaved: canvas.unsaved().map_or(0, <[_]>::len),
        }
    }
}
