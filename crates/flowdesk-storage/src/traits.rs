//! The storage contracts consumed by the canvas.
//!
//! [`DiagramGateway`] persists diagrams; every write either commits as a
//! whole or leaves storage untouched. [`TaskStore`] is the point-in-time
//! task list the resolver reads, plus the writes that keep task references
//! consistent.
//!
//! Timestamps are passed in by the caller (ms since epoch) so that the
//! in-memory snapshot a caller keeps and the stored rows carry identical
//! `updatedAt` values.

use flowdesk_core::diagram::{DiagramDocument, DiagramMeta, NewDiagram};
use flowdesk_core::id::{DiagramId, TaskId};
use flowdesk_core::patch::Patch;
use flowdesk_core::task::Task;

use crate::error::StorageError;
use crate::types::DiagramSummary;

pub trait DiagramGateway {
    /// Creates an empty diagram under a freshly allocated id.
    fn create_diagram(&mut self, input: NewDiagram, now: i64) -> Result<DiagramMeta, StorageError>;

    /// Loads a diagram, or `None` if it does not exist.
    ///
    /// Malformed stored fields are replaced by safe defaults (with a logged
    /// warning) so the rest of the diagram still loads.
    fn load_diagram(&self, id: &DiagramId) -> Result<Option<DiagramDocument>, StorageError>;

    fn list_diagrams(&self) -> Result<Vec<DiagramSummary>, StorageError>;

    /// Deletes a diagram with its nodes and edges. Returns `false` if it did
    /// not exist.
    fn delete_diagram(&mut self, id: &DiagramId) -> Result<bool, StorageError>;

    /// Applies `patches` as one unit of work: all of them or none.
    fn apply_patches_atomically(
        &mut self,
        id: &DiagramId,
        patches: &[Patch],
        now: i64,
    ) -> Result<(), StorageError>;

    /// Strips `taskRef == task` from every node in every diagram. Nodes are
    /// kept. Returns the number of nodes touched.
    fn clear_task_references(&mut self, task: &TaskId, now: i64) -> Result<usize, StorageError>;
}

pub trait TaskStore {
    fn get_all_tasks(&self) -> Result<Vec<Task>, StorageError>;

    /// Inserts or replaces a task.
    fn upsert_task(&mut self, task: &Task, now: i64) -> Result<(), StorageError>;

    /// Deletes a task and clears every node reference to it in the same unit
    /// of work. Returns `false` if the task did not exist.
    fn delete_task(&mut self, id: &TaskId, now: i64) -> Result<bool, StorageError>;
}
