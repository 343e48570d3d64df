//! Registry of open canvas sessions, one per diagram.
//!
//! [`SessionRegistry`] maps a diagram id to its [`Canvas`] behind an
//! `Arc<tokio::sync::Mutex<..>>`. Holding the mutex serializes every edit
//! and commit on that diagram; different diagrams proceed independently.
//! Backed by `DashMap` so lookups from concurrent handler tasks never block
//! each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use flowdesk_core::id::DiagramId;

use crate::canvas::{Canvas, CanvasError};

pub type SharedCanvas<G> = Arc<Mutex<Canvas<G>>>;

pub struct SessionRegistry<G> {
    sessions: DashMap<DiagramId, SharedCanvas<G>>,
}

impl<G> SessionRegistry<G> {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &DiagramId) -> Option<SharedCanvas<G>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the session for `id`, opening it with `open` on first use.
    ///
    /// Two racing callers can never both open the same diagram: the entry
    /// stays locked while `open` runs.
    pub fn get_or_open<F>(&self, id: &DiagramId, open: F) -> Result<SharedCanvas<G>, CanvasError>
    where
        F: FnOnce() -> Result<Canvas<G>, CanvasError>,
    {
        let entry = self
            .sessions
            .entry(id.clone())
            .or_try_insert_with(|| open().map(|canvas| Arc::new(Mutex::new(canvas))))?;
        Ok(Arc::clone(entry.value()))
    }

    /// Drops the session for `id`. Returns `true` if one was open.
    pub fn close(&self, id: &DiagramId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Every open session, for broadcasting changes such as a new task list.
    pub fn all(&self) -> Vec<SharedCanvas<G>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<G> Default for SessionRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use flowdesk_core::diagram::NewDiagram;
    use flowdesk_storage::{DiagramGateway, InMemoryStore, SharedStore};

    #[tokio::test]
    async fn opens_once_and_closes() {
        let mut store = SharedStore::new(InMemoryStore::new());
        let id = store.create_diagram(NewDiagram::named("x"), 1).unwrap().id;
        let registry: SessionRegistry<SharedStore<InMemoryStore>> = SessionRegistry::new();

        let first = registry
            .get_or_open(&id, || Canvas::open(store.clone(), &id, CanvasConfig::default()))
            .unwrap();
        let second = registry
            .get_or_open(&id, || panic!("session should already be open"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().await.snapshot().meta.name, "x");
        assert_eq!(registry.len(), 1);

        assert!(registry.close(&id));
        assert!(registry.is_empty());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn failed_open_registers_nothing() {
        let store = SharedStore::new(InMemoryStore::new());
        let registry = SessionRegistry::new();
        let missing = DiagramId::from("missing");
        let err = registry
            .get_or_open(&missing, || {
                Canvas::open(store.clone(), &missing, CanvasConfig::default())
            })
            .err()
            .unwrap();
        assert!(matches!(err, CanvasError::DiagramNotFound(_)));
        assert!(registry.is_empty());
    }
}
