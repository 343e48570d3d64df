//! Persisted node types.
//!
//! A [`PersistedNode`] is exactly what the storage layer keeps for one shape
//! on a diagram: an id, a shape kind, a position and an opaque [`NodeData`]
//! bag. Task-derived fields (title, status colors) are never stored here; the
//! view layer recomputes them on every render.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, TaskId};

/// Node kind used for shapes that reference a task.
pub const TASK_NODE_KIND: &str = "task";

/// Node kind used when nothing more specific was requested.
pub const DEFAULT_NODE_KIND: &str = "default";

/// A 2-D canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Returns `true` when both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Custom style stored on a node. Any field set here wins over the
/// status-derived base style.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NodeStyle {
    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.border.is_none() && self.text.is_none()
    }
}

/// The opaque data bag attached to every node.
///
/// Known keys are typed; anything else the canvas stores survives a
/// load/save cycle untouched through `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Reference to an external task, if this shape stands for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Locked nodes ignore drag gestures.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeData {
    pub fn labelled(label: impl Into<String>) -> Self {
        NodeData {
            label: Some(label.into()),
            ..NodeData::default()
        }
    }

    pub fn for_task(task: TaskId) -> Self {
        NodeData {
            task_ref: Some(task),
            ..NodeData::default()
        }
    }
}

/// A node as stored by the persistence gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNode {
    pub id: NodeId,
    /// Shape kind tag ("task", "rectangle", "diamond", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl PersistedNode {
    /// Creates a node with empty data, stamped with `now` (ms since epoch).
    pub fn new(id: NodeId, kind: impl Into<String>, position: Position, now: i64) -> Self {
        PersistedNode {
            id,
            kind: kind.into(),
            position,
            data: NodeData::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    pub fn task_ref(&self) -> Option<&TaskId> {
        self.data.task_ref.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.data.locked
    }
}
