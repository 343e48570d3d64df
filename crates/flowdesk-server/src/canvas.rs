//! The canvas orchestrator: one open diagram and everything the user does
//! to it.
//!
//! [`Canvas`] owns the adopted persisted snapshot, the undo history, the
//! current task list and the on-screen runtime nodes and edges. Every edit
//! follows the same path: build patches, validate them with the patch
//! engine against the adopted snapshot, commit them through the gateway, and
//! only then adopt the new snapshot and re-render. A batch the gateway fails
//! to save is kept for [`Canvas::retry_unsaved`] and the adopted snapshot is
//! left as it was.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use flowdesk_core::clock::{Clock, SystemClock};
use flowdesk_core::cycle::{cycle_path, has_cycle};
use flowdesk_core::diagram::{DiagramSnapshot, Viewport};
use flowdesk_core::edge::{connection_hash, PersistedEdge, DEFAULT_EDGE_KIND};
use flowdesk_core::engine::{self, PriorState};
use flowdesk_core::error::CoreError;
use flowdesk_core::history::HistoryManager;
use flowdesk_core::id::{DiagramId, EdgeId, NodeId};
use flowdesk_core::node::{NodeData, PersistedNode, Position};
use flowdesk_core::patch::{MetadataChanges, NodeChanges, Patch};
use flowdesk_core::task::Task;
use flowdesk_storage::{DiagramGateway, StorageError};
use flowdesk_view::resolve::ResolverCache;
use flowdesk_view::runtime::{
    apply_hover, merge_edges, merge_nodes, to_runtime, RenderFrame, RuntimeEdge, RuntimeNode,
};
use flowdesk_view::style::Theme;

use crate::config::CanvasConfig;
use crate::gesture::{DragTracker, ViewportDebouncer};

/// Errors surfaced by canvas operations. None of them changes the adopted
/// snapshot.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("diagram not found: {0}")]
    DiagramNotFound(DiagramId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// The new edge would close a dependency loop. `path` is the existing
    /// route from `to` back to `from`.
    #[error("connecting {from} -> {to} would create a cycle")]
    CycleRejected {
        from: NodeId,
        to: NodeId,
        path: Vec<NodeId>,
    },

    #[error("{from} -> {to} is already connected by edge {existing}")]
    DuplicateConnection {
        from: NodeId,
        to: NodeId,
        existing: EdgeId,
    },

    #[error("node {0} is not being dragged")]
    NotDragging(NodeId),

    #[error("cannot undo this action ({action})")]
    CannotUndo { action: &'static str },

    /// The gateway failed to commit the batch.
    #[error("changes not saved: {0}")]
    NotSaved(#[source] StorageError),

    #[error("an unsaved batch must be retried or discarded first")]
    UnsavedPending,

    #[error("patch rejected: {0}")]
    Rejected(#[from] CoreError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One undoable user action: the forward batch plus the state of every
/// entity it touched, captured when it was applied.
///
/// Undo commits the inverse at `stamp` and redo replays at `at`, so both
/// land on exactly the snapshot that existed, timestamps included.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub patches: Vec<Patch>,
    pub priors: Vec<PriorState>,
    /// The diagram's `updated_at` before the action.
    pub stamp: i64,
    /// When the action was applied.
    pub at: i64,
}

/// A request to draw an edge between two nodes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ConnectRequest {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        ConnectRequest {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: None,
            label: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Recorded in history and kept for retry when not saved.
    User,
    /// Undo or redo replay.
    History,
    Viewport,
}

impl Origin {
    fn as_str(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::History => "history",
            Origin::Viewport => "viewport",
        }
    }
}

#[derive(Debug, Clone)]
struct UnsavedBatch {
    patches: Vec<Patch>,
    now: i64,
}

pub struct Canvas<G> {
    gateway: G,
    clock: Arc<dyn Clock>,
    config: CanvasConfig,
    snapshot: Arc<DiagramSnapshot>,
    history: HistoryManager<HistoryEntry>,
    tasks: Arc<Vec<Task>>,
    theme: Theme,
    resolver: ResolverCache,
    nodes: Vec<RuntimeNode>,
    edges: Vec<RuntimeEdge>,
    hovered: Option<NodeId>,
    drags: DragTracker,
    viewport: ViewportDebouncer,
    unsaved: Option<UnsavedBatch>,
}

impl<G: DiagramGateway> Canvas<G> {
    /// Loads diagram `id` from `gateway` and renders it.
    pub fn open(gateway: G, id: &DiagramId, config: CanvasConfig) -> Result<Self, CanvasError> {
        Self::open_with_clock(gateway, id, config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        gateway: G,
        id: &DiagramId,
        config: CanvasConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CanvasError> {
        let snapshot = load_snapshot(&gateway, id)?;
        let history = HistoryManager::new(config.history_limit);
        let viewport = ViewportDebouncer::new(config.viewport_debounce_ms);
        let theme = config.theme;
        let mut canvas = Canvas {
            gateway,
            clock,
            config,
            snapshot: Arc::new(snapshot),
            history,
            tasks: Arc::new(Vec::new()),
            theme,
            resolver: ResolverCache::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            hovered: None,
            drags: DragTracker::new(),
            viewport,
            unsaved: None,
        };
        canvas.render();
        tracing::info!(
            diagram = %id,
            nodes = canvas.snapshot.nodes.len(),
            edges = canvas.snapshot.edges.len(),
            "canvas opened"
        );
        Ok(canvas)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &DiagramId {
        self.snapshot.id()
    }

    /// The adopted persisted snapshot.
    pub fn snapshot(&self) -> &DiagramSnapshot {
        &self.snapshot
    }

    pub fn nodes(&self) -> &[RuntimeNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RuntimeEdge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&RuntimeNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The viewport on screen: a pending pan/zoom if there is one, else the
    /// persisted viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
            .pending()
            .unwrap_or(self.snapshot.meta.viewport)
    }

    pub fn frame(&self) -> RenderFrame {
        RenderFrame {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            viewport: self.viewport(),
        }
    }

    pub fn history(&self) -> &HistoryManager<HistoryEntry> {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// When the pending pan/zoom becomes due for
    /// [`flush_viewport`](Self::flush_viewport).
    pub fn viewport_due_at(&self) -> Option<i64> {
        self.viewport.due_at()
    }

    /// The batch waiting for [`retry_unsaved`](Self::retry_unsaved).
    pub fn unsaved(&self) -> Option<&[Patch]> {
        self.unsaved.as_ref().map(|b| b.patches.as_slice())
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    // -----------------------------------------------------------------------
    // Inputs that only re-render
    // -----------------------------------------------------------------------

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = Arc::new(tasks);
        self.render();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            self.theme = theme;
            self.render();
        }
    }

    /// Re-reads the diagram from the gateway, for changes made behind the
    /// canvas (a deleted task clearing references, for example). History is
    /// kept.
    pub fn reload(&mut self) -> Result<(), CanvasError> {
        let snapshot = load_snapshot(&self.gateway, self.snapshot.id())?;
        self.snapshot = Arc::new(snapshot);
        self.render();
        Ok(())
    }

    fn render(&mut self) {
        let domain = self
            .resolver
            .resolve(&self.snapshot, &self.tasks, self.theme);
        let (nodes, edges) = to_runtime(&domain, self.snapshot.edges.values(), self.config.label_max);
        let mut nodes = merge_nodes(&self.nodes, nodes);
        let mut edges = merge_edges(&self.edges, edges);
        if self
            .hovered
            .as_ref()
            .is_some_and(|h| !self.snapshot.nodes.contains_key(h))
        {
            self.hovered = None;
        }
        apply_hover(&mut nodes, &mut edges, self.hovered.as_ref());
        self.nodes = nodes;
        self.edges = edges;
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Applies a raw batch as one undoable action.
    ///
    /// Position changes aimed at locked nodes are dropped first (unless the
    /// same patch unlocks the node). Every `addEdge` goes through the cycle
    /// guard. `updateViewport` patches are taken out of the batch and
    /// debounced like [`pan_zoom`](Self::pan_zoom) (the last one wins); they
    /// never enter history.
    pub fn apply_user_patches(&mut self, patches: Vec<Patch>) -> Result<(), CanvasError> {
        let (viewports, patches): (Vec<Patch>, Vec<Patch>) = self
            .strip_locked_moves(patches)
            .into_iter()
            .partition(Patch::is_viewport_only);
        let mut viewport = None;
        for patch in viewports {
            if let Patch::UpdateViewport { viewport: v } = patch {
                ensure_valid_viewport(&v)?;
                viewport = Some(v);
            }
        }
        self.guard_cycles(&patches)?;

        let now = self.clock.now_ms();
        self.commit(patches, Origin::User, now)?;
        if let Some(viewport) = viewport {
            self.viewport.push(viewport, now);
        }
        Ok(())
    }

    /// Rejects a batch in which some `addEdge` would close a dependency
    /// loop. Each new edge is checked against the edges as they stand at
    /// that point of the batch.
    fn guard_cycles(&self, patches: &[Patch]) -> Result<(), CanvasError> {
        if !patches.iter().any(|p| matches!(p, Patch::AddEdge { .. })) {
            return Ok(());
        }
        let mut edges = self.snapshot.edges.clone();
        for patch in patches {
            match patch {
                Patch::AddEdge { edge, .. } => {
                    if let Some(path) = cycle_path(edges.values(), &edge.source, &edge.target) {
                        tracing::debug!(edge = %edge.id, "batch rejected: cycle");
                        return Err(CanvasError::CycleRejected {
                            from: edge.source.clone(),
                            to: edge.target.clone(),
                            path,
                        });
                    }
                    edges.insert(edge.id.clone(), edge.clone());
                }
                Patch::RemoveEdge { id, .. } => {
                    edges.shift_remove(id);
                }
                Patch::RemoveNode { id, .. } => edges.retain(|_, e| !e.touches(id)),
                _ => {}
            }
        }
        Ok(())
    }

    fn strip_locked_moves(&self, patches: Vec<Patch>) -> Vec<Patch> {
        patches
            .into_iter()
            .filter_map(|patch| match patch {
                Patch::UpdateNode { id, mut changes }
                    if changes.position.is_some()
                        && stays_locked(&self.snapshot, &id, &changes) =>
                {
                    tracing::debug!(node = %id, "ignoring position change on locked node");
                    changes.position = None;
                    (!changes.is_empty()).then(|| Patch::update_node(id, changes))
                }
                other => Some(other),
            })
            .collect()
    }

    pub fn add_node(
        &mut self,
        kind: impl Into<String>,
        position: Position,
        data: NodeData,
    ) -> Result<NodeId, CanvasError> {
        let now = self.clock.now_ms();
        let node = PersistedNode::new(NodeId::generate(), kind, position, now).with_data(data);
        let id = node.id.clone();
        self.commit(vec![Patch::add_node(node)], Origin::User, now)?;
        Ok(id)
    }

    /// Starts dragging `id`. Returns `false` (and does nothing) for a locked
    /// node.
    pub fn begin_drag(&mut self, id: &NodeId) -> Result<bool, CanvasError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| CanvasError::NodeNotFound(id.clone()))?;
        if node.is_locked() {
            tracing::debug!(node = %id, "drag ignored on locked node");
            return Ok(false);
        }
        node.ui.dragging = true;
        self.drags.begin(id.clone(), node.persisted_position);
        Ok(true)
    }

    /// Moves the dragged node on screen. Nothing is persisted.
    pub fn drag_to(&mut self, id: &NodeId, position: Position) -> Result<(), CanvasError> {
        if !self.drags.update(id, position) {
            return Err(CanvasError::NotDragging(id.clone()));
        }
        if let Some(node) = self.node_mut(id) {
            node.position = position;
        }
        Ok(())
    }

    /// Finishes a drag, committing one `updateNode` with the final position.
    /// Returns `None` when the node ended where it started.
    pub fn end_drag(&mut self, id: &NodeId) -> Result<Option<Patch>, CanvasError> {
        let outcome = self
            .drags
            .end(id)
            .ok_or_else(|| CanvasError::NotDragging(id.clone()))?;
        if let Some(node) = self.node_mut(id) {
            node.ui.dragging = false;
        }
        if !outcome.moved() {
            self.snap_back(id);
            return Ok(None);
        }
        let patch = Patch::update_node(id.clone(), NodeChanges::position(outcome.end));
        let now = self.clock.now_ms();
        if let Err(err) = self.commit(vec![patch.clone()], Origin::User, now) {
            self.snap_back(id);
            return Err(err);
        }
        Ok(Some(patch))
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut RuntimeNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    fn snap_back(&mut self, id: &NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.position = node.persisted_position;
        }
    }

    /// Connects two nodes with a fresh edge.
    ///
    /// The cycle guard and the duplicate-connection check run before any
    /// patch is built.
    pub fn connect(&mut self, request: ConnectRequest) -> Result<EdgeId, CanvasError> {
        for endpoint in [&request.source, &request.target] {
            if self.snapshot.node(endpoint).is_none() {
                return Err(CanvasError::NodeNotFound(endpoint.clone()));
            }
        }
        if let Some(path) = cycle_path(self.snapshot.edges.values(), &request.source, &request.target)
        {
            tracing::debug!(
                source = %request.source,
                target = %request.target,
                "connection rejected: cycle"
            );
            return Err(CanvasError::CycleRejected {
                from: request.source,
                to: request.target,
                path,
            });
        }

        let kind = request
            .kind
            .unwrap_or_else(|| DEFAULT_EDGE_KIND.to_string());
        let hash = connection_hash(&request.source, &request.target, &kind);
        if let Some(existing) = self.snapshot.find_connection(&hash) {
            tracing::debug!(existing = %existing.id, "connection rejected: duplicate");
            return Err(CanvasError::DuplicateConnection {
                from: request.source,
                to: request.target,
                existing: existing.id.clone(),
            });
        }

        let now = self.clock.now_ms();
        let mut edge = PersistedEdge::new(EdgeId::generate(), request.source, request.target, kind, now)
            .with_handles(request.source_handle, request.target_handle);
        edge.label = request.label;
        let id = edge.id.clone();
        self.commit(vec![Patch::add_edge(edge)], Origin::User, now)?;
        Ok(id)
    }

    /// Removes nodes together with every edge touching them, as one batch.
    /// Returns the number of nodes removed.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Result<usize, CanvasError> {
        self.remove(ids, &[]).map(|(nodes, _)| nodes)
    }

    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> Result<usize, CanvasError> {
        self.remove(&[], ids).map(|(_, edges)| edges)
    }

    /// Removes edges and nodes (with their incident edges) as one undoable
    /// batch. Every removal captures the removed entity. Returns how many of
    /// the requested nodes and edges were removed.
    pub fn remove(
        &mut self,
        nodes: &[NodeId],
        edges: &[EdgeId],
    ) -> Result<(usize, usize), CanvasError> {
        let mut seen_edges: HashSet<&EdgeId> = HashSet::new();
        let mut batch = Vec::new();
        for id in edges {
            if !seen_edges.insert(id) {
                continue;
            }
            let edge = self
                .snapshot
                .edge(id)
                .ok_or_else(|| CanvasError::EdgeNotFound(id.clone()))?;
            batch.push(Patch::remove_edge_captured(edge.clone()));
        }
        let removed_edges = batch.len();

        let mut seen_nodes: HashSet<&NodeId> = HashSet::new();
        let mut node_patches = Vec::new();
        for id in nodes {
            if !seen_nodes.insert(id) {
                continue;
            }
            let node = self
                .snapshot
                .node(id)
                .ok_or_else(|| CanvasError::NodeNotFound(id.clone()))?;
            let incident = self.snapshot.incident_edges(id);
            for edge in incident.iter().copied() {
                if seen_edges.insert(&edge.id) {
                    batch.push(Patch::remove_edge_captured(edge.clone()));
                }
            }
            node_patches.push(Patch::remove_node_captured(
                node.clone(),
                incident.into_iter().cloned().collect(),
            ));
        }
        let removed_nodes = node_patches.len();
        batch.extend(node_patches);

        let now = self.clock.now_ms();
        self.commit(batch, Origin::User, now)?;
        for id in nodes {
            self.drags.cancel(id);
        }
        Ok((removed_nodes, removed_edges))
    }

    /// Replaces the data bag of a node (label, task reference, lock, style).
    pub fn update_node_data(&mut self, id: &NodeId, data: NodeData) -> Result<(), CanvasError> {
        if self.snapshot.node(id).is_none() {
            return Err(CanvasError::NodeNotFound(id.clone()));
        }
        let now = self.clock.now_ms();
        self.commit(
            vec![Patch::update_node(id.clone(), NodeChanges::data(data))],
            Origin::User,
            now,
        )
    }

    /// Changes the diagram name and/or description. `Some(None)` clears the
    /// description.
    pub fn rename(
        &mut self,
        name: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<(), CanvasError> {
        if name.is_none() && description.is_none() {
            return Ok(());
        }
        let now = self.clock.now_ms();
        self.commit(
            vec![Patch::UpdateMetadata {
                changes: MetadataChanges { name, description },
            }],
            Origin::User,
            now,
        )
    }

    // -----------------------------------------------------------------------
    // Viewport
    // -----------------------------------------------------------------------

    /// Records a pan/zoom observed at `at_ms`. It is persisted by a later
    /// [`flush_viewport`](Self::flush_viewport).
    pub fn pan_zoom(&mut self, viewport: Viewport, at_ms: i64) -> Result<(), CanvasError> {
        ensure_valid_viewport(&viewport)?;
        self.viewport.push(viewport, at_ms);
        Ok(())
    }

    /// Commits the pending viewport once the debounce window has passed.
    /// Viewport commits are not undoable.
    pub fn flush_viewport(&mut self, now_ms: i64) -> Result<Option<Patch>, CanvasError> {
        let Some(viewport) = self.viewport.due(now_ms) else {
            return Ok(None);
        };
        if viewport == self.snapshot.meta.viewport {
            return Ok(None);
        }
        let patch = Patch::UpdateViewport { viewport };
        let now = self.clock.now_ms();
        if let Err(err) = self.commit(vec![patch.clone()], Origin::Viewport, now) {
            if matches!(err, CanvasError::NotSaved(_)) {
                self.viewport.push(viewport, now_ms);
            }
            return Err(err);
        }
        Ok(Some(patch))
    }

    // -----------------------------------------------------------------------
    // Ephemeral UI state
    // -----------------------------------------------------------------------

    /// Hovers a node (highlighting its edges and neighbours), or clears
    /// hover with `None`.
    pub fn hover(&mut self, id: Option<&NodeId>) -> Result<(), CanvasError> {
        if let Some(id) = id {
            if self.snapshot.node(id).is_none() {
                return Err(CanvasError::NodeNotFound(id.clone()));
            }
        }
        self.hovered = id.cloned();
        apply_hover(&mut self.nodes, &mut self.edges, self.hovered.as_ref());
        Ok(())
    }

    /// Replaces the selection. Unknown ids are ignored; returns how many
    /// nodes and edges ended up selected.
    pub fn select(&mut self, nodes: &[NodeId], edges: &[EdgeId]) -> usize {
        let mut selected = 0;
        for node in &mut self.nodes {
            node.ui.selected = nodes.contains(&node.id);
            selected += usize::from(node.ui.selected);
        }
        for edge in &mut self.edges {
            edge.ui.selected = edges.contains(&edge.edge.id);
            selected += usize::from(edge.ui.selected);
        }
        selected
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Reverts the most recent action. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> Result<bool, CanvasError> {
        if self.unsaved.is_some() {
            return Err(CanvasError::UnsavedPending);
        }
        let (inverse, stamp) = match self.history.undo() {
            None => return Ok(false),
            Some(entry) => (
                engine::invert_batch(&entry.patches, &entry.priors)
                    .map_err(|index| entry.patches.get(index).map_or("patch", Patch::describe)),
                entry.stamp,
            ),
        };
        let inverse = match inverse {
            Ok(inverse) => inverse,
            Err(action) => {
                self.history.cancel_undo();
                return Err(CanvasError::CannotUndo { action });
            }
        };
        if let Err(err) = self.commit(inverse, Origin::History, stamp) {
            self.history.cancel_undo();
            return Err(err);
        }
        Ok(true)
    }

    /// Re-applies the most recently undone action. Returns `false` when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, CanvasError> {
        if self.unsaved.is_some() {
            return Err(CanvasError::UnsavedPending);
        }
        let (patches, at) = match self.history.redo() {
            None => return Ok(false),
            Some(entry) => (entry.patches.clone(), entry.at),
        };
        if let Err(err) = self.commit(patches, Origin::History, at) {
            self.history.cancel_redo();
            return Err(err);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Commit path
    // -----------------------------------------------------------------------

    /// Commits the batch kept by a failed save. Returns `false` if there was
    /// none.
    pub fn retry_unsaved(&mut self) -> Result<bool, CanvasError> {
        let Some(batch) = self.unsaved.take() else {
            return Ok(false);
        };
        self.commit_batch(batch, Origin::User)?;
        Ok(true)
    }

    /// Drops the batch kept by a failed save, returning it.
    pub fn discard_unsaved(&mut self) -> Option<Vec<Patch>> {
        let batch = self.unsaved.take()?;
        tracing::info!(diagram = %self.snapshot.id(), patches = batch.patches.len(), "unsaved batch discarded");
        Some(batch.patches)
    }

    fn commit(&mut self, patches: Vec<Patch>, origin: Origin, now: i64) -> Result<(), CanvasError> {
        if self.unsaved.is_some() {
            return Err(CanvasError::UnsavedPending);
        }
        if patches.is_empty() {
            return Ok(());
        }
        self.commit_batch(UnsavedBatch { patches, now }, origin)
    }

    /// apply, then commit, then adopt.
    fn commit_batch(&mut self, batch: UnsavedBatch, origin: Origin) -> Result<(), CanvasError> {
        let (next, priors) = engine::apply_recording(&self.snapshot, &batch.patches, batch.now)?;
        let stamp = self.snapshot.meta.updated_at;
        if let Err(err) =
            self.gateway
                .apply_patches_atomically(self.snapshot.id(), &batch.patches, batch.now)
        {
            return Err(match err {
                StorageError::Rejected(err) => CanvasError::Rejected(err),
                StorageError::DiagramNotFound(id) => CanvasError::DiagramNotFound(id),
                other => {
                    tracing::warn!(
                        diagram = %self.snapshot.id(),
                        patches = batch.patches.len(),
                        error = %other,
                        "batch not saved"
                    );
                    if origin == Origin::User {
                        self.unsaved = Some(batch);
                    }
                    CanvasError::NotSaved(other)
                }
            });
        }

        tracing::info!(
            diagram = %next.meta.id,
            patches = batch.patches.len(),
            origin = origin.as_str(),
            "batch committed"
        );
        self.snapshot = Arc::new(next);
        if origin == Origin::User {
            self.history.execute(HistoryEntry {
                patches: batch.patches,
                priors,
                stamp,
                at: batch.now,
            });
        }
        self.render();
        Ok(())
    }
}

fn load_snapshot<G: DiagramGateway>(gateway: &G, id: &DiagramId) -> Result<DiagramSnapshot, CanvasError> {
    let document = gateway
        .load_diagram(id)?
        .ok_or_else(|| CanvasError::DiagramNotFound(id.clone()))?;
    let snapshot = document.into_snapshot()?;
    if has_cycle(snapshot.edges.values()) {
        tracing::warn!(diagram = %id, "stored diagram contains a dependency cycle");
    }
    Ok(snapshot)
}

fn ensure_valid_viewport(viewport: &Viewport) -> Result<(), CanvasError> {
    if viewport.is_valid() {
        return Ok(());
    }
    Err(CoreError::InvalidViewport {
        x: viewport.x,
        y: viewport.y,
        zoom: viewport.zoom,
    }
    .into())
}

/// `true` if `id` is locked now and `changes` does not unlock it.
fn stays_locked(snapshot: &DiagramSnapshot, id: &NodeId, changes: &NodeChanges) -> bool {
    let locked = snapshot.node(id).is_some_and(PersistedNode::is_locked);
    locked && changes.data.as_ref().map_or(true, |data| data.locked)
}
