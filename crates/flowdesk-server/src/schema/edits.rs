//! Editing and history types.

use serde::{Deserialize, Serialize};

use flowdesk_core::id::{EdgeId, NodeId};
use flowdesk_core::node::Position;
use flowdesk_core::patch::Patch;

use super::diagrams::CanvasView;

/// Request to apply a raw patch batch as one undoable action.
#[derive(Debug, Deserialize)]
pub struct ApplyPatchesRequest {
    pub patches: Vec<Patch>,
}

/// Response after connecting two nodes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub edge_id: EdgeId,
    pub view: CanvasView,
}

/// Request to remove nodes (with their incident edges) and edges.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub edges: Vec<EdgeId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub removed_nodes: usize,
    pub removed_edges: usize,
    pub view: CanvasView,
}

/// One drag gesture: optional intermediate positions, then the drop point.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub node_id: NodeId,
    #[serde(default)]
    pub path: Vec<Position>,
    pub to: Position,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    /// The committed `updateNode`, absent when the node did not move or is
    /// locked.
    pub patch: Option<Patch>,
    pub view: CanvasView,
}

/// Response for undo, redo and retry.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Whether anything was applied (false at either end of the stack).
    pub applied: bool,
    pub view: CanvasView,
}
