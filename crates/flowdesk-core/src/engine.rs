//! The patch engine: pure application and inversion of patches.
//!
//! [`apply`] takes a snapshot and an ordered batch of patches and returns a
//! new snapshot; the input is never mutated, so a failed batch leaves every
//! reader's view intact. [`invert`] computes the patch that undoes another
//! one, given the state of the target entity before the patch ran.
//!
//! Validation happens per patch (duplicate ids, missing targets, endpoint
//! existence at the moment an edge is added, connection-hash uniqueness)
//! and once at the end of the batch (no edge may be left dangling).

use crate::diagram::{DiagramMeta, DiagramSnapshot};
use crate::edge::PersistedEdge;
use crate::error::CoreError;
use crate::node::PersistedNode;
use crate::patch::{EdgeChanges, MetadataChanges, NodeChanges, Patch, PatchTarget};

/// Applies `patches` in order to a copy of `snapshot`.
///
/// `now` (ms since epoch) stamps `updated_at` on every updated entity that
/// does not carry its own stamp and, for a non-empty batch, on the diagram
/// record.
pub fn apply(
    snapshot: &DiagramSnapshot,
    patches: &[Patch],
    now: i64,
) -> Result<DiagramSnapshot, CoreError> {
    let mut next = snapshot.clone();
    for patch in patches {
        apply_one(&mut next, patch, now)?;
    }
    finish_batch(&mut next, patches, now)?;
    Ok(next)
}

/// Like [`apply`], but also records, for every patch, the prior state of
/// the entity it updates.
///
/// Add patches invert without a prior and get an empty one. Remove patches
/// get one too, so a removal that arrived without `metadata` can still be
/// undone.
pub fn apply_recording(
    snapshot: &DiagramSnapshot,
    patches: &[Patch],
    now: i64,
) -> Result<(DiagramSnapshot, Vec<PriorState>), CoreError> {
    let mut next = snapshot.clone();
    let mut priors = Vec::with_capacity(patches.len());
    for patch in patches {
        let prior = match patch {
            Patch::AddNode { .. } | Patch::AddEdge { .. } => PriorState::default(),
            _ => PriorState::capture(patch, &next),
        };
        apply_one(&mut next, patch, now)?;
        priors.push(prior);
    }
    finish_batch(&mut next, patches, now)?;
    Ok((next, priors))
}

fn finish_batch(next: &mut DiagramSnapshot, patches: &[Patch], now: i64) -> Result<(), CoreError> {
    if let Some((edge, node)) = next.dangling_edges().first() {
        return Err(CoreError::DanglingEdge {
            edge: edge.id.clone(),
            node: (*node).clone(),
        });
    }
    if !patches.is_empty() {
        next.meta.updated_at = now;
    }
    Ok(())
}

fn apply_one(snapshot: &mut DiagramSnapshot, patch: &Patch, now: i64) -> Result<(), CoreError> {
    match patch {
        Patch::AddNode { node, index } => {
            if snapshot.nodes.contains_key(&node.id) {
                return Err(CoreError::DuplicateNode {
                    id: node.id.clone(),
                });
            }
            if !node.position.is_finite() {
                return Err(CoreError::InvalidPosition {
                    id: node.id.clone(),
                    x: node.position.x,
                    y: node.position.y,
                });
            }
            match *index {
                Some(at) if at <= snapshot.nodes.len() => {
                    snapshot.nodes.shift_insert(at, node.id.clone(), node.clone());
                }
                _ => {
                    snapshot.nodes.insert(node.id.clone(), node.clone());
                }
            }
        }
        Patch::UpdateNode { id, changes } => {
            let node = snapshot
                .nodes
                .get_mut(id)
                .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
            apply_node_changes(node, changes)?;
            node.updated_at = changes.updated_at.unwrap_or(now);
        }
        Patch::RemoveNode { id, .. } => {
            snapshot
                .nodes
                .shift_remove(id)
                .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        }
        Patch::AddEdge { edge, index } => {
            if snapshot.edges.contains_key(&edge.id) {
                return Err(CoreError::DuplicateEdge {
                    id: edge.id.clone(),
                });
            }
            for endpoint in [&edge.source, &edge.target] {
                if !snapshot.nodes.contains_key(endpoint) {
                    return Err(CoreError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            let mut edge = edge.clone();
            edge.refresh_hash();
            ensure_unique_connection(snapshot, &edge)?;
            match *index {
                Some(at) if at <= snapshot.edges.len() => {
                    snapshot.edges.shift_insert(at, edge.id.clone(), edge);
                }
                _ => {
                    snapshot.edges.insert(edge.id.clone(), edge);
                }
            }
        }
        Patch::UpdateEdge { id, changes } => {
            let mut edge = snapshot
                .edges
                .get(id)
                .cloned()
                .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
            apply_edge_changes(&mut edge, changes);
            if changes.kind.is_some() {
                edge.refresh_hash();
                ensure_unique_connection(snapshot, &edge)?;
            }
            edge.updated_at = changes.updated_at.unwrap_or(now);
            snapshot.edges.insert(id.clone(), edge);
        }
        Patch::RemoveEdge { id, .. } => {
            snapshot
                .edges
                .shift_remove(id)
                .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
        }
        Patch::UpdateViewport { viewport } => {
            if !viewport.is_valid() {
                return Err(CoreError::InvalidViewport {
                    x: viewport.x,
                    y: viewport.y,
                    zoom: viewport.zoom,
                });
            }
            snapshot.meta.viewport = *viewport;
        }
        Patch::UpdateMetadata { changes } => apply_metadata_changes(&mut snapshot.meta, changes),
    }
    Ok(())
}

fn apply_node_changes(node: &mut PersistedNode, changes: &NodeChanges) -> Result<(), CoreError> {
    if let Some(position) = changes.position {
        if !position.is_finite() {
            return Err(CoreError::InvalidPosition {
                id: node.id.clone(),
                x: position.x,
                y: position.y,
            });
        }
        node.position = position;
    }
    if let Some(kind) = &changes.kind {
        node.kind = kind.clone();
    }
    if let Some(data) = &changes.data {
        node.data = data.clone();
    }
    Ok(())
}

fn apply_edge_changes(edge: &mut PersistedEdge, changes: &EdgeChanges) {
    if let Some(kind) = &changes.kind {
        edge.kind = kind.clone();
    }
    if let Some(handle) = &changes.source_handle {
        edge.source_handle = handle.clone();
    }
    if let Some(handle) = &changes.target_handle {
        edge.target_handle = handle.clone();
    }
    if let Some(label) = &changes.label {
        edge.label = label.clone();
    }
    if let Some(style) = &changes.style {
        edge.style = style.clone();
    }
}

fn apply_metadata_changes(meta: &mut DiagramMeta, changes: &MetadataChanges) {
    if let Some(name) = &changes.name {
        meta.name = name.clone();
    }
    if let Some(description) = &changes.description {
        meta.description = description.clone();
    }
}

fn ensure_unique_connection(
    snapshot: &DiagramSnapshot,
    edge: &PersistedEdge,
) -> Result<(), CoreError> {
    let clash = snapshot
        .edges
        .values()
        .find(|other| other.id != edge.id && other.connection_hash == edge.connection_hash);
    match clash {
        Some(existing) => Err(CoreError::DuplicateConnection {
            edge: edge.id.clone(),
            existing: existing.id.clone(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Inversion
// ---------------------------------------------------------------------------

/// Borrowed "before" state used to invert a patch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Before<'a> {
    pub node: Option<&'a PersistedNode>,
    pub edge: Option<&'a PersistedEdge>,
    pub meta: Option<&'a DiagramMeta>,
    /// Position of the node or edge in its collection.
    pub index: Option<usize>,
}

/// Owned "before" state captured while a batch was applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorState {
    pub node: Option<PersistedNode>,
    pub edge: Option<PersistedEdge>,
    pub meta: Option<DiagramMeta>,
    pub index: Option<usize>,
}

impl PriorState {
    /// Captures the current state of the entity `patch` acts on.
    pub fn capture(patch: &Patch, snapshot: &DiagramSnapshot) -> Self {
        let before = snapshot_of(patch, snapshot);
        PriorState {
            node: before.node.cloned(),
            edge: before.edge.cloned(),
            meta: before.meta.cloned(),
            index: before.index,
        }
    }

    pub fn as_before(&self) -> Before<'_> {
        Before {
            node: self.node.as_ref(),
            edge: self.edge.as_ref(),
            meta: self.meta.as_ref(),
            index: self.index,
        }
    }
}

/// Looks up, in `snapshot`, the current state of the entity `patch` targets.
pub fn snapshot_of<'a>(patch: &Patch, snapshot: &'a DiagramSnapshot) -> Before<'a> {
    match patch.target() {
        PatchTarget::Node(id) => Before {
            node: snapshot.node(id),
            index: snapshot.nodes.get_index_of(id),
            ..Before::default()
        },
        PatchTarget::Edge(id) => Before {
            edge: snapshot.edge(id),
            index: snapshot.edges.get_index_of(id),
            ..Before::default()
        },
        PatchTarget::Diagram => Before {
            meta: Some(&snapshot.meta),
            ..Before::default()
        },
    }
}

/// Returns the patch that undoes `patch`, or `None` when the required
/// "before" state is unavailable.
///
/// Remove patches prefer the snapshot in their own `metadata` and fall back
/// to `before`; the inverse re-inserts at the recorded position. Inverse
/// updates carry the entity's previous `updated_at`.
pub fn invert(patch: &Patch, before: Before<'_>) -> Option<Patch> {
    match patch {
        Patch::AddNode { node, .. } => {
            Some(Patch::remove_node_captured(node.clone(), Vec::new()))
        }
        Patch::RemoveNode { id, metadata } => {
            let node = metadata
                .as_ref()
                .map(|m| &m.node)
                .or(before.node.filter(|n| &n.id == id))?;
            Some(Patch::add_node_at(node.clone(), before.index))
        }
        Patch::UpdateNode { id, changes } => {
            let node = before.node.filter(|n| &n.id == id)?;
            let restore = NodeChanges {
                kind: changes.kind.as_ref().map(|_| node.kind.clone()),
                position: changes.position.map(|_| node.position),
                data: changes.data.as_ref().map(|_| node.data.clone()),
                updated_at: Some(node.updated_at),
            };
            Some(Patch::update_node(id.clone(), restore))
        }
        Patch::AddEdge { edge, .. } => Some(Patch::remove_edge_captured(edge.clone())),
        Patch::RemoveEdge { id, metadata } => {
            let edge = metadata
                .as_ref()
                .map(|m| &m.edge)
                .or(before.edge.filter(|e| &e.id == id))?;
            Some(Patch::add_edge_at(edge.clone(), before.index))
        }
        Patch::UpdateEdge { id, changes } => {
            let edge = before.edge.filter(|e| &e.id == id)?;
            let restore = EdgeChanges {
                kind: changes.kind.as_ref().map(|_| edge.kind.clone()),
                source_handle: changes.source_handle.as_ref().map(|_| edge.source_handle.clone()),
                target_handle: changes.target_handle.as_ref().map(|_| edge.target_handle.clone()),
                label: changes.label.as_ref().map(|_| edge.label.clone()),
                style: changes.style.as_ref().map(|_| edge.style.clone()),
                updated_at: Some(edge.updated_at),
            };
            Some(Patch::update_edge(id.clone(), restore))
        }
        Patch::UpdateViewport { .. } => Some(Patch::UpdateViewport {
            viewport: before.meta?.viewport,
        }),
        Patch::UpdateMetadata { changes } => {
            let meta = before.meta?;
            Some(Patch::UpdateMetadata {
                changes: MetadataChanges {
                    name: changes.name.as_ref().map(|_| meta.name.clone()),
                    description: changes.description.as_ref().map(|_| meta.description.clone()),
                },
            })
        }
    }
}

/// Inverts a whole batch: patches are inverted individually and returned in
/// reverse (LIFO) order. `priors` must be aligned with `patches`, as produced
/// by [`apply_recording`].
///
/// On failure, returns the index of the last patch (in batch order) that
/// could not be inverted.
pub fn invert_batch(patches: &[Patch], priors: &[PriorState]) -> Result<Vec<Patch>, usize> {
    let mut inverse = Vec::with_capacity(patches.len());
    for (index, patch) in patches.iter().enumerate().rev() {
        let before = priors.get(index).map(PriorState::as_before).unwrap_or_default();
        match invert(patch, before) {
            Some(p) => inverse.push(p),
            None => return Err(index),
        }
    }
    Ok(inverse)
}
