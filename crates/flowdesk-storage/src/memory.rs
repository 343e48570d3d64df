//! In-memory implementation of [`DiagramGateway`] and [`TaskStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and ephemeral
//! sessions. Batches are applied with the patch engine to a clone of the
//! stored snapshot, which is swapped in only when the whole batch succeeds,
//! so it has the same all-or-nothing semantics as the SQLite backend.

use indexmap::IndexMap;

use flowdesk_core::diagram::{DiagramDocument, DiagramMeta, DiagramSnapshot, NewDiagram};
use flowdesk_core::engine;
use flowdesk_core::id::{DiagramId, TaskId};
use flowdesk_core::node::NodeData;
use flowdesk_core::patch::{NodeChanges, Patch};
use flowdesk_core::task::Task;

use crate::error::StorageError;
use crate::traits::{DiagramGateway, TaskStore};
use crate::types::DiagramSummary;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    diagrams: IndexMap<DiagramId, DiagramSnapshot>,
    tasks: IndexMap<TaskId, Task>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the cleared snapshot of every diagram referencing `task`
    /// without touching the stored ones.
    fn cleared_snapshots(
        &self,
        task: &TaskId,
        now: i64,
    ) -> Result<(Vec<DiagramSnapshot>, usize), StorageError> {
        let mut updated = Vec::new();
        let mut touched = 0;
        for snapshot in self.diagrams.values() {
            let patches = clear_reference_patches(snapshot, task);
            if patches.is_empty() {
                continue;
            }
            touched += patches.len();
            updated.push(engine::apply(snapshot, &patches, now)?);
        }
        Ok((updated, touched))
    }
}

/// One `updateNode` per node referencing `task`, replacing its data bag with
/// a copy that has no `taskRef`.
pub(crate) fn clear_reference_patches(snapshot: &DiagramSnapshot, task: &TaskId) -> Vec<Patch> {
    snapshot
        .nodes
        .values()
        .filter(|node| node.task_ref() == Some(task))
        .map(|node| {
            let data = NodeData {
                task_ref: None,
                ..node.data.clone()
            };
            Patch::update_node(node.id.clone(), NodeChanges::data(data))
        })
        .collect()
}

impl DiagramGateway for InMemoryStore {
    fn create_diagram(&mut self, input: NewDiagram, now: i64) -> Result<DiagramMeta, StorageError> {
        let meta = input.into_meta(DiagramId::generate(), now);
        self.diagrams
            .insert(meta.id.clone(), DiagramSnapshot::new(meta.clone()));
        Ok(meta)
    }

    fn load_diagram(&self, id: &DiagramId) -> Result<Option<DiagramDocument>, StorageError> {
        Ok(self.diagrams.get(id).map(DiagramSnapshot::to_document))
    }

    fn list_diagrams(&self) -> Result<Vec<DiagramSummary>, StorageError> {
        Ok(self
            .diagrams
            .values()
            .map(|s| DiagramSummary {
                id: s.meta.id.clone(),
                name: s.meta.name.clone(),
                description: s.meta.description.clone(),
                node_count: s.nodes.len(),
                edge_count: s.edges.len(),
                created_at: s.meta.created_at,
                updated_at: s.meta.updated_at,
            })
            .collect())
    }

    fn delete_diagram(&mut self, id: &DiagramId) -> Result<bool, StorageError> {
        Ok(self.diagrams.shift_remove(id).is_some())
    }

    fn apply_patches_atomically(
        &mut self,
        id: &DiagramId,
        patches: &[Patch],
        now: i64,
    ) -> Result<(), StorageError> {
        let current = self
            .diagrams
            .get(id)
            .ok_or_else(|| StorageError::DiagramNotFound(id.clone()))?;
        let next = engine::apply(current, patches, now)?;
        self.diagrams.insert(id.clone(), next);
        Ok(())
    }

    fn clear_task_references(&mut self, task: &TaskId, now: i64) -> Result<usize, StorageError> {
        let (updated, touched) = self.cleared_snapshots(task, now)?;
        for snapshot in updated {
            self.diagrams.insert(snapshot.meta.id.clone(), snapshot);
        }
        Ok(touched)
    }
}

impl TaskStore for InMemoryStore {
    fn get_all_tasks(&self) -> Result<Vec<Task>, StorageError> {
        Ok(self.tasks.values().cloned().collect())
    }

    fn upsert_task(&mut self, task: &Task, _now: i64) -> Result<(), StorageError> {
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn delete_task(&mut self, id: &TaskId, now: i64) -> Result<bool, StorageError> {
        if !self.tasks.contains_key(id) {
            return Ok(false);
        }
        let (updated, _) = self.cleared_snapshots(id, now)?;
        self.tasks.shift_remove(id);
        for snapshot in updated {
            self.diagrams.insert(snapshot.meta.id.clone(), snapshot);
        }
        Ok(true)
    }
}
