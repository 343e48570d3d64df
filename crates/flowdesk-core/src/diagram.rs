//! Diagram records and the persisted-layer snapshot.
//!
//! [`DiagramSnapshot`] is the in-memory image of one diagram that the patch
//! engine operates on. Nodes and edges live in `IndexMap`s keyed by id, which
//! keeps insertion order for rendering and gives O(1) lookup for patches.
//! [`DiagramDocument`] is the flat `{meta, nodes, edges}` shape used on the
//! wire and by the persistence gateway.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::edge::PersistedEdge;
use crate::error::CoreError;
use crate::id::{DiagramId, EdgeId, NodeId};
use crate::node::PersistedNode;

/// Canvas pan and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Viewport { x, y, zoom }
    }

    /// Pan must be finite and zoom strictly positive.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite() && self.zoom > 0.0
    }
}

/// The diagram record itself (everything except nodes and edges).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramMeta {
    pub id: DiagramId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub viewport: Viewport,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a diagram.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiagram {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl NewDiagram {
    pub fn named(name: impl Into<String>) -> Self {
        NewDiagram {
            name: name.into(),
            ..NewDiagram::default()
        }
    }

    /// Builds the diagram record for a freshly allocated id.
    pub fn into_meta(self, id: DiagramId, now: i64) -> DiagramMeta {
        DiagramMeta {
            id,
            name: self.name,
            description: self.description,
            viewport: self.viewport.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Flat, serializable form of a diagram: the result of `load_diagram`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDocument {
    pub meta: DiagramMeta,
    pub nodes: Vec<PersistedNode>,
    pub edges: Vec<PersistedEdge>,
}

impl DiagramDocument {
    /// Indexes the document, rejecting duplicate ids.
    pub fn into_snapshot(self) -> Result<DiagramSnapshot, CoreError> {
        DiagramSnapshot::from_parts(self.meta, self.nodes, self.edges)
    }
}

/// In-memory persisted-layer snapshot of one diagram.
///
/// Equality compares nodes and edges as maps (insertion order is ignored).
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSnapshot {
    pub meta: DiagramMeta,
    pub nodes: IndexMap<NodeId, PersistedNode>,
    pub edges: IndexMap<EdgeId, PersistedEdge>,
}

impl DiagramSnapshot {
    /// Creates an empty snapshot for a diagram record.
    pub fn new(meta: DiagramMeta) -> Self {
        DiagramSnapshot {
            meta,
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    /// Builds a snapshot from flat lists, rejecting duplicate node or edge ids.
    pub fn from_parts(
        meta: DiagramMeta,
        nodes: Vec<PersistedNode>,
        edges: Vec<PersistedEdge>,
    ) -> Result<Self, CoreError> {
        let mut snapshot = DiagramSnapshot::new(meta);
        for node in nodes {
            if snapshot.nodes.contains_key(&node.id) {
                return Err(CoreError::DuplicateNode { id: node.id });
            }
            snapshot.nodes.insert(node.id.clone(), node);
        }
        for edge in edges {
            if snapshot.edges.contains_key(&edge.id) {
                return Err(CoreError::DuplicateEdge { id: edge.id });
            }
            snapshot.edges.insert(edge.id.clone(), edge);
        }
        Ok(snapshot)
    }

    pub fn id(&self) -> &DiagramId {
        &self.meta.id
    }

    pub fn node(&self, id: &NodeId) -> Option<&PersistedNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&PersistedEdge> {
        self.edges.get(id)
    }

    /// All edges whose source or target is `node`, in insertion order.
    pub fn incident_edges(&self, node: &NodeId) -> Vec<&PersistedEdge> {
        self.edges.values().filter(|e| e.touches(node)).collect()
    }

    /// Finds the edge carrying the given connection hash, if any.
    pub fn find_connection(&self, hash: &str) -> Option<&PersistedEdge> {
        self.edges.values().find(|e| e.connection_hash == hash)
    }

    /// Edges whose source or target is missing, paired with the missing node.
    pub fn dangling_edges(&self) -> Vec<(&PersistedEdge, &NodeId)> {
        let mut dangling = Vec::new();
        for edge in self.edges.values() {
            if !self.nodes.contains_key(&edge.source) {
                dangling.push((edge, &edge.source));
            } else if !self.nodes.contains_key(&edge.target) {
                dangling.push((edge, &edge.target));
            }
        }
        dangling
    }

    /// Flattens the snapshot into its serializable document form.
    pub fn to_document(&self) -> DiagramDocument {
        DiagramDocument {
            meta: self.meta.clone(),
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }
}
