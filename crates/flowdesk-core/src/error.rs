//! Core error types for flowdesk-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! every way a patch batch can be rejected by the engine.

use thiserror::Error;

use crate::id::{EdgeId, NodeId};

/// Core errors produced by the flowdesk-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A node with this id already exists in the diagram.
    #[error("duplicate node id: '{id}'")]
    DuplicateNode { id: NodeId },

    /// An edge with this id already exists in the diagram.
    #[error("duplicate edge id: '{id}'")]
    DuplicateEdge { id: EdgeId },

    /// The patch targets a node that is not in the diagram.
    #[error("node not found: '{id}'")]
    NodeNotFound { id: NodeId },

    /// The patch targets an edge that is not in the diagram.
    #[error("edge not found: '{id}'")]
    EdgeNotFound { id: EdgeId },

    /// An edge endpoint references a node that does not exist.
    #[error("edge '{edge}' references missing node '{node}'")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    /// Another edge already carries the same source, target and type.
    #[error("edge '{edge}' duplicates the connection of edge '{existing}'")]
    DuplicateConnection { edge: EdgeId, existing: EdgeId },

    /// Position coordinates must be finite numbers.
    #[error("invalid position for node '{id}': ({x}, {y})")]
    InvalidPosition { id: NodeId, x: f64, y: f64 },

    /// Viewport pan must be finite and zoom strictly positive.
    #[error("invalid viewport: x={x}, y={y}, zoom={zoom}")]
    InvalidViewport { x: f64, y: f64, zoom: f64 },
}
