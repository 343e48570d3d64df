//! Gesture buffering between raw pointer input and committed patches.
//!
//! A drag produces many intermediate positions but only one persisted
//! `updateNode`; a pan/zoom burst produces one `updateViewport` once the
//! input has been quiet for the debounce window.

use std::collections::HashMap;

use flowdesk_core::diagram::Viewport;
use flowdesk_core::id::NodeId;
use flowdesk_core::node::Position;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    origin: Position,
    last: Position,
}

/// Start and end of a finished drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    pub origin: Position,
    pub end: Position,
}

impl DragOutcome {
    pub fn moved(&self) -> bool {
        self.origin != self.end
    }
}

/// Tracks in-flight drags, one per node.
#[derive(Debug, Default)]
pub struct DragTracker {
    active: HashMap<NodeId, DragState>,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a drag of `id` from `origin`.
    pub fn begin(&mut self, id: NodeId, origin: Position) {
        self.active.insert(
            id,
            DragState {
                origin,
                last: origin,
            },
        );
    }

    /// Buffers an intermediate position. Returns `false` if `id` is not
    /// being dragged.
    pub fn update(&mut self, id: &NodeId, position: Position) -> bool {
        match self.active.get_mut(id) {
            Some(state) => {
                state.last = position;
                true
            }
            None => false,
        }
    }

    /// Finishes the drag of `id`.
    pub fn end(&mut self, id: &NodeId) -> Option<DragOutcome> {
        self.active.remove(id).map(|state| DragOutcome {
            origin: state.origin,
            end: state.last,
        })
    }

    pub fn cancel(&mut self, id: &NodeId) {
        self.active.remove(id);
    }

    pub fn is_dragging(&self, id: &NodeId) -> bool {
        self.active.contains_key(id)
    }
}

/// Holds the latest viewport of a pan/zoom burst until it settles.
#[derive(Debug)]
pub struct ViewportDebouncer {
    delay_ms: i64,
    pending: Option<(Viewport, i64)>,
}

impl ViewportDebouncer {
    pub fn new(delay_ms: i64) -> Self {
        ViewportDebouncer {
            delay_ms: delay_ms.max(0),
            pending: None,
        }
    }

    /// Records a viewport change observed at `at_ms`. Later changes replace
    /// earlier ones and restart the window.
    pub fn push(&mut self, viewport: Viewport, at_ms: i64) {
        self.pending = Some((viewport, at_ms));
    }

    /// Takes the pending viewport once `delay_ms` have passed since the last
    /// change.
    pub fn due(&mut self, now_ms: i64) -> Option<Viewport> {
        match self.pending {
            Some((viewport, at)) if now_ms.saturating_sub(at) >= self.delay_ms => {
                self.pending = None;
                Some(viewport)
            }
            _ => None,
        }
    }

    /// The time at which the pending viewport becomes due, if any.
    pub fn due_at(&self) -> Option<i64> {
        self.pending.map(|(_, at)| at.saturating_add(self.delay_ms))
    }

    pub fn pending(&self) -> Option<Viewport> {
        self.pending.map(|(viewport, _)| viewport)
    }
}
