//! The patch vocabulary: atomic, serializable diagram mutations.
//!
//! Each [`Patch`] describes one change to a [`DiagramSnapshot`](crate::diagram::DiagramSnapshot).
//! Patches are plain values: they can be stored in history, sent over the
//! wire and replayed. Remove patches may carry the pre-removal snapshot of
//! the entity in `metadata`, which is what makes them invertible without
//! going back to storage.

use serde::{Deserialize, Deserializer, Serialize};

use crate::diagram::Viewport;
use crate::edge::{EdgeStyle, PersistedEdge};
use crate::id::{EdgeId, NodeId};
use crate::node::{NodeData, PersistedNode, Position};

/// Deserializes a present field (including `null`) as `Some(..)`, so that
/// `Option<Option<T>>` can tell "absent" from "set to null".
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// A single atomic diagram mutation.
///
/// Serialized with an internal `type` tag (`{"type": "addNode", ...}`).
/// Unknown tags fail deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Patch {
    /// A node was created. `index` places it at that position in the node
    /// order instead of at the end; undo uses it to put a node back where it was.
    AddNode {
        node: PersistedNode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    /// Some fields of a node changed; absent fields are left untouched.
    UpdateNode { id: NodeId, changes: NodeChanges },
    /// A node was removed (optionally capturing it for undo).
    RemoveNode {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<NodeRemoval>,
    },
    /// An edge was created, optionally at a given position in the edge order.
    AddEdge {
        edge: PersistedEdge,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    /// Some fields of an edge changed; absent fields are left untouched.
    UpdateEdge { id: EdgeId, changes: EdgeChanges },
    /// An edge was removed (optionally capturing it for undo).
    RemoveEdge {
        id: EdgeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<EdgeRemoval>,
    },
    /// The diagram viewport moved.
    UpdateViewport { viewport: Viewport },
    /// The diagram name or description changed.
    UpdateMetadata { changes: MetadataChanges },
}

/// The entity a patch acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget<'a> {
    Node(&'a NodeId),
    Edge(&'a EdgeId),
    Diagram,
}

impl Patch {
    pub fn add_node(node: PersistedNode) -> Self {
        Patch::AddNode { node, index: None }
    }

    /// Re-insertion at a known position in the node order.
    pub fn add_node_at(node: PersistedNode, index: Option<usize>) -> Self {
        Patch::AddNode { node, index }
    }

    pub fn update_node(id: NodeId, changes: NodeChanges) -> Self {
        Patch::UpdateNode { id, changes }
    }

    /// Removal with no captured snapshot (cannot be undone).
    pub fn remove_node(id: NodeId) -> Self {
        Patch::RemoveNode { id, metadata: None }
    }

    /// Removal capturing the node and its incident edges for undo.
    pub fn remove_node_captured(node: PersistedNode, incident_edges: Vec<PersistedEdge>) -> Self {
        Patch::RemoveNode {
            id: node.id.clone(),
            metadata: Some(NodeRemoval {
                node,
                incident_edges,
            }),
        }
    }

    pub fn add_edge(edge: PersistedEdge) -> Self {
        Patch::AddEdge { edge, index: None }
    }

    pub fn add_edge_at(edge: PersistedEdge, index: Option<usize>) -> Self {
        Patch::AddEdge { edge, index }
    }

    pub fn update_edge(id: EdgeId, changes: EdgeChanges) -> Self {
        Patch::UpdateEdge { id, changes }
    }

    /// Removal with no captured snapshot (cannot be undone).
    pub fn remove_edge(id: EdgeId) -> Self {
        Patch::RemoveEdge { id, metadata: None }
    }

    /// Removal capturing the edge for undo.
    pub fn remove_edge_captured(edge: PersistedEdge) -> Self {
        Patch::RemoveEdge {
            id: edge.id.clone(),
            metadata: Some(EdgeRemoval { edge }),
        }
    }

    /// Returns the entity this patch acts on.
    pub fn target(&self) -> PatchTarget<'_> {
        match self {
            Patch::AddNode { node, .. } => PatchTarget::Node(&node.id),
            Patch::UpdateNode { id, .. } | Patch::RemoveNode { id, .. } => PatchTarget::Node(id),
            Patch::AddEdge { edge, .. } => PatchTarget::Edge(&edge.id),
            Patch::UpdateEdge { id, .. } | Patch::RemoveEdge { id, .. } => PatchTarget::Edge(id),
            Patch::UpdateViewport { .. } | Patch::UpdateMetadata { .. } => PatchTarget::Diagram,
        }
    }

    /// Short human-readable description, used in logs and history listings.
    pub fn describe(&self) -> &'static str {
        match self {
            Patch::AddNode { .. } => "add node",
            Patch::UpdateNode { .. } => "update node",
            Patch::RemoveNode { .. } => "remove node",
            Patch::AddEdge { .. } => "add edge",
            Patch::UpdateEdge { .. } => "update edge",
            Patch::RemoveEdge { .. } => "remove edge",
            Patch::UpdateViewport { .. } => "update viewport",
            Patch::UpdateMetadata { .. } => "update metadata",
        }
    }

    /// Returns `true` for add patches that ask for a specific position.
    pub fn is_positioned_add(&self) -> bool {
        matches!(
            self,
            Patch::AddNode { index: Some(_), .. } | Patch::AddEdge { index: Some(_), .. }
        )
    }

    /// Returns `true` if applying this patch only moves the viewport.
    pub fn is_viewport_only(&self) -> bool {
        matches!(self, Patch::UpdateViewport { .. })
    }
}

/// Pre-removal snapshot carried by a `removeNode` patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemoval {
    pub node: PersistedNode,
    /// Edges that touched the node when it was removed.
    #[serde(default)]
    pub incident_edges: Vec<PersistedEdge>,
}

/// Pre-removal snapshot carried by a `removeEdge` patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRemoval {
    pub edge: PersistedEdge,
}

/// Partial update of a node. Only `Some` fields are applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeChanges {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Replaces the whole data bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,
    /// Stamp to write instead of the batch time. Set by inverse patches so
    /// undo restores the node's previous `updatedAt`.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl NodeChanges {
    pub fn position(position: Position) -> Self {
        NodeChanges {
            position: Some(position),
            ..NodeChanges::default()
        }
    }

    pub fn data(data: NodeData) -> Self {
        NodeChanges {
            data: Some(data),
            ..NodeChanges::default()
        }
    }

    /// `true` when no field would change. A bare `updated_at` does not count.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.position.is_none() && self.data.is_none()
    }
}

/// Partial update of an edge. Only `Some` fields are applied; the nested
/// `Option` lets a change clear an optional field.
///
/// Endpoints are deliberately not editable: reconnecting is a remove + add
/// so that the cycle guard runs on the new connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeChanges {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub label: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub style: Option<Option<EdgeStyle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl EdgeChanges {
    pub fn label(label: Option<String>) -> Self {
        EdgeChanges {
            label: Some(label),
            ..EdgeChanges::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.source_handle.is_none()
            && self.target_handle.is_none()
            && self.label.is_none()
            && self.style.is_none()
    }
}

/// Partial update of the diagram record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

impl MetadataChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_use_camel_case_tags() {
        let patch = Patch::remove_edge(EdgeId::from("e1"));
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["type"], "removeEdge");
        assert_eq!(value["id"], "e1");
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn unknown_patch_tag_fails_loudly() {
        let result: Result<Patch, _> =
            serde_json::from_str(r#"{"type":"teleportNode","id":"a"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_node_parses_partial_changes() {
        let patch: Patch = serde_json::from_str(
            r#"{"type":"updateNode","id":"a","changes":{"position":{"x":100,"y":50}}}"#,
        )
        .unwrap();
        match patch {
            Patch::UpdateNode { id, changes } => {
                assert_eq!(id, NodeId::from("a"));
                assert_eq!(changes.position, Some(Position::new(100.0, 50.0)));
                assert!(changes.data.is_none());
                assert!(changes.kind.is_none());
            }
            other => panic!("unexpected patch: {:?}", other),
        }
    }

    #[test]
    fn edge_changes_distinguish_absent_from_null() {
        let cleared: EdgeChanges = serde_json::from_str(r#"{"label":null}"#).unwrap();
        assert_eq!(cleared.label, Some(None));
        assert_eq!(cleared.source_handle, None);

        let absent: EdgeChanges = serde_json::from_str("{}").unwrap();
        assert!(absent.is_empty());

        let value = serde_json::to_value(&cleared).unwrap();
        assert!(value["label"].is_null());
        assert!(value.get("sourceHandle").is_none());
    }

    #[test]
    fn add_index_and_stamp_are_optional_on_the_wire() {
        let patch: Patch = serde_json::from_str(
            r#"{"type":"updateNode","id":"a","changes":{"position":{"x":1,"y":2}}}"#,
        )
        .unwrap();
        match &patch {
            Patch::UpdateNode { changes, .. } => assert_eq!(changes.updated_at, None),
            other => panic!("unexpected patch: {:?}", other),
        }
        let value = serde_json::to_value(&patch).unwrap();
        assert!(value["changes"].get("updatedAt").is_none());

        let stamped = NodeChanges {
            updated_at: Some(7),
            ..NodeChanges::default()
        };
        assert!(stamped.is_empty());
        assert_eq!(serde_json::to_value(&stamped).unwrap()["updatedAt"], 7);
    }

    #[test]
    fn targets() {
        let id = NodeId::from("n");
        assert_eq!(
            Patch::remove_node(id.clone()).target(),
            PatchTarget::Node(&id)
        );
        assert_eq!(
            Patch::UpdateViewport {
                viewport: Viewport::default()
            }
            .target(),
            PatchTarget::Diagram
        );
    }
}
