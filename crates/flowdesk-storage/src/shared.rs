//! A cloneable handle sharing one backend between many callers.
//!
//! Each canvas session owns its gateway; [`SharedStore`] lets all sessions
//! (and the task endpoints) write through the same connection. The lock is
//! held for one call, so every call is still a single unit of work.

use std::sync::{Arc, Mutex, MutexGuard};

use flowdesk_core::diagram::{DiagramDocument, DiagramMeta, NewDiagram};
use flowdesk_core::id::{DiagramId, TaskId};
use flowdesk_core::patch::Patch;
use flowdesk_core::task::Task;

use crate::error::StorageError;
use crate::traits::{DiagramGateway, TaskStore};
use crate::types::DiagramSummary;

#[derive(Debug)]
pub struct SharedStore<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        SharedStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedStore<S> {
    pub fn new(store: S) -> Self {
        SharedStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::IntegrityError {
            reason: "store lock poisoned by a panicked writer".to_string(),
        })
    }
}

impl<S: DiagramGateway> DiagramGateway for SharedStore<S> {
    fn create_diagram(&mut self, input: NewDiagram, now: i64) -> Result<DiagramMeta, StorageError> {
        self.lock()?.create_diagram(input, now)
    }

    fn load_diagram(&self, id: &DiagramId) -> Result<Option<DiagramDocument>, StorageError> {
        self.lock()?.load_diagram(id)
    }

    fn list_diagrams(&self) -> Result<Vec<DiagramSummary>, StorageError> {
        self.lock()?.list_diagrams()
    }

    fn delete_diagram(&mut self, id: &DiagramId) -> Result<bool, StorageError> {
        self.lock()?.delete_diagram(id)
    }

    fn apply_patches_atomically(
        &mut self,
        id: &DiagramId,
        patches: &[Patch],
        now: i64,
    ) -> Result<(), StorageError> {
        self.lock()?.apply_patches_atomically(id, patches, now)
    }

    fn clear_task_references(&mut self, task: &TaskId, now: i64) -> Result<usize, StorageError> {
        self.lock()?.clear_task_references(task, now)
    }
}

impl<S: TaskStore> TaskStore for SharedStore<S> {
    fn get_all_tasks(&self) -> Result<Vec<Task>, StorageError> {
        self.lock()?.get_all_tasks()
    }

    fn upsert_task(&mut self, task: &Task, now: i64) -> Result<(), StorageError> {
        self.lock()?.upsert_task(task, now)
    }

    fn delete_task(&mut self, id: &TaskId, now: i64) -> Result<bool, StorageError> {
        self.lock()?.delete_task(id, now)
    }
}
