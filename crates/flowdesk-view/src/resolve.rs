//! Domain resolver: persisted nodes enriched with live task state.
//!
//! [`resolve`] is a pure function of (nodes, tasks, theme). Task fields are
//! never stored on the node; they are looked up by `taskRef` on every pass.
//! [`ResolverCache`] memoizes the last result by the identity of the shared
//! inputs, so re-rendering with an unchanged snapshot and task list is free.

use std::collections::HashMap;
use std::sync::Arc;

use flowdesk_core::diagram::DiagramSnapshot;
use flowdesk_core::id::TaskId;
use flowdesk_core::node::{NodeStyle, PersistedNode};
use flowdesk_core::task::{Priority, Task, TaskStatus};
use serde::Serialize;

use crate::style::{base_style_for_status, merge_custom, neutral_style, Theme};

/// Snapshot of the task fields a node displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTask {
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
}

impl From<&Task> for ResolvedTask {
    fn from(task: &Task) -> Self {
        ResolvedTask {
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
        }
    }
}

/// A persisted node plus derived task data. Never written back to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainNode {
    #[serde(flatten)]
    pub node: PersistedNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_task: Option<ResolvedTask>,
    pub computed_style: NodeStyle,
    /// The node references a task that no longer exists.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub task_missing: bool,
}

/// Resolves one node against an indexed task list.
pub fn resolve_node(
    node: &PersistedNode,
    tasks: &HashMap<&TaskId, &Task>,
    theme: Theme,
) -> DomainNode {
    let custom = node.data.style.as_ref();
    let (resolved_task, computed_style, task_missing) = match node.task_ref() {
        Some(task_ref) => match tasks.get(task_ref) {
            Some(task) => (
                Some(ResolvedTask::from(*task)),
                merge_custom(base_style_for_status(task.status, theme), custom),
                false,
            ),
            None => (None, merge_custom(neutral_style(theme), custom), true),
        },
        None => (None, merge_custom(neutral_style(theme), custom), false),
    };
    DomainNode {
        node: node.clone(),
        resolved_task,
        computed_style,
        task_missing,
    }
}

/// Resolves every node, preserving input order.
pub fn resolve<'a, I>(nodes: I, tasks: &[Task], theme: Theme) -> Vec<DomainNode>
where
    I: IntoIterator<Item = &'a PersistedNode>,
{
    let index: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();
    nodes
        .into_iter()
        .map(|node| resolve_node(node, &index, theme))
        .collect()
}

struct CacheEntry {
    snapshot: Arc<DiagramSnapshot>,
    tasks: Arc<Vec<Task>>,
    theme: Theme,
    nodes: Arc<Vec<DomainNode>>,
}

/// Single-entry memo for [`resolve`], keyed by pointer identity of the
/// snapshot and task list plus the theme.
///
/// The cache holds clones of the key `Arc`s, so a key pointer can never be
/// reused by a different allocation while it is cached.
#[derive(Default)]
pub struct ResolverCache {
    entry: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        snapshot: &Arc<DiagramSnapshot>,
        tasks: &Arc<Vec<Task>>,
        theme: Theme,
    ) -> Arc<Vec<DomainNode>> {
        if let Some(entry) = &self.entry {
            if Arc::ptr_eq(&entry.snapshot, snapshot)
                && Arc::ptr_eq(&entry.tasks, tasks)
                && entry.theme == theme
            {
                self.hits += 1;
                return Arc::clone(&entry.nodes);
            }
        }
        self.misses += 1;
        let nodes = Arc::new(resolve(snapshot.nodes.values(), tasks, theme));
        self.entry = Some(CacheEntry {
            snapshot: Arc::clone(snapshot),
            tasks: Arc::clone(tasks),
            theme,
            nodes: Arc::clone(&nodes),
        });
        nodes
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
