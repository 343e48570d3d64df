//! Persisted edge types and the connection hash.
//!
//! Every [`PersistedEdge`] carries a derived `connection_hash`: a blake3
//! digest of (source, target, type). Two edges with the same hash describe
//! the same connection, which lets storage and the canvas detect duplicates
//! without comparing every field. The hash is order-sensitive because edges
//! are directed.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId};

/// Edge kind used when nothing more specific was requested.
pub const DEFAULT_EDGE_KIND: &str = "default";

/// Number of hex characters kept from the blake3 digest.
const CONNECTION_HASH_LEN: usize = 16;

/// Computes the connection hash for a (source, target, type) triple.
///
/// Deterministic: same triple always produces the same hash. Fields are
/// separated by a NUL byte so that `("ab", "c")` and `("a", "bc")` differ.
pub fn connection_hash(source: &NodeId, target: &NodeId, kind: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(target.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(kind.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..CONNECTION_HASH_LEN].to_string()
}

/// Custom stroke style stored on an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dashed: bool,
}

/// An edge as stored by the persistence gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    pub connection_hash: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl PersistedEdge {
    /// Creates an edge between two nodes, computing its connection hash.
    pub fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        kind: impl Into<String>,
        now: i64,
    ) -> Self {
        let kind = kind.into();
        let connection_hash = connection_hash(&source, &target, &kind);
        PersistedEdge {
            id,
            source,
            target,
            source_handle: None,
            target_handle: None,
            kind,
            label: None,
            style: None,
            connection_hash,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_handles(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source_handle = source;
        self.target_handle = target;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Recomputes the connection hash from the current endpoints and kind.
    pub fn refresh_hash(&mut self) {
        self.connection_hash = connection_hash(&self.source, &self.target, &self.kind);
    }

    /// Returns `true` if this edge starts or ends at `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}
