//! SQLite implementation of [`DiagramGateway`] and [`TaskStore`].
//!
//! [`SqliteStore`] keeps one row per node and per edge, so a patch batch
//! turns into a handful of row writes instead of a rewrite of the whole
//! diagram. Every write runs in a single transaction. Complex fields are
//! stored as JSON TEXT via serde_json.
//!
//! A batch is validated by replaying it with the patch engine against the
//! stored snapshot inside the transaction; only the rows of entities the
//! batch touches are then written.

use std::collections::HashSet;

use indexmap::IndexSet;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use flowdesk_core::diagram::{DiagramDocument, DiagramMeta, DiagramSnapshot, NewDiagram, Viewport};
use flowdesk_core::edge::{EdgeStyle, PersistedEdge};
use flowdesk_core::engine;
use flowdesk_core::id::{DiagramId, EdgeId, NodeId, TaskId};
use flowdesk_core::node::{NodeData, PersistedNode, Position};
use flowdesk_core::patch::{Patch, PatchTarget};
use flowdesk_core::task::{Priority, Task, TaskStatus};

use crate::error::StorageError;
use crate::traits::{DiagramGateway, TaskStore};
use crate::types::DiagramSummary;

/// SQLite-backed implementation of the storage contracts.
///
/// Every write operation is wrapped in a transaction for atomicity.
/// The database uses WAL mode for performance and foreign keys for integrity.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parses a stored JSON value, falling back to `T::default()` with a warning.
fn recover<T: DeserializeOwned + Default>(json: &str, diagram: &str, entity: &str, field: &str) -> T {
    match serde_json::from_str(json) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                diagram,
                entity,
                field,
                error = %err,
                "malformed stored value, using default"
            );
            T::default()
        }
    }
}

fn load_meta(conn: &Connection, id: &DiagramId) -> Result<Option<DiagramMeta>, StorageError> {
    let row = conn
        .query_row(
            "SELECT name, description, viewport_json, created_at, updated_at
             FROM diagrams WHERE id = ?1",
            params![id.as_str()],
            |row| {
                let name: String = row.get(0)?;
                let description: Option<String> = row.get(1)?;
                let viewport_json: String = row.get(2)?;
                let created_at: i64 = row.get(3)?;
                let updated_at: i64 = row.get(4)?;
                Ok((name, description, viewport_json, created_at, updated_at))
            },
        )
        .optional()?;
    Ok(row.map(|(name, description, viewport_json, created_at, updated_at)| {
        let viewport: Viewport = recover(&viewport_json, id.as_str(), id.as_str(), "viewport");
        let viewport = if viewport.is_valid() {
            viewport
        } else {
            tracing::warn!(diagram = id.as_str(), "invalid stored viewport, using default");
            Viewport::default()
        };
        DiagramMeta {
            id: id.clone(),
            name,
            description,
            viewport,
            created_at,
            updated_at,
        }
    }))
}

fn load_nodes(conn: &Connection, id: &DiagramId) -> Result<Vec<PersistedNode>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT node_id, kind, position_json, data_json, created_at, updated_at
         FROM diagram_nodes WHERE diagram_id = ?1 ORDER BY ordinal, rowid",
    )?;
    let rows = stmt.query_map(params![id.as_str()], |row| {
        let node_id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let position_json: String = row.get(2)?;
        let data_json: String = row.get(3)?;
        let created_at: i64 = row.get(4)?;
        let updated_at: i64 = row.get(5)?;
        Ok((node_id, kind, position_json, data_json, created_at, updated_at))
    })?;

    let mut nodes = Vec::new();
    for row in rows {
        let (node_id, kind, position_json, data_json, created_at, updated_at) = row?;
        let position: Position = recover(&position_json, id.as_str(), &node_id, "position");
        let position = if position.is_finite() {
            position
        } else {
            tracing::warn!(diagram = id.as_str(), node = %node_id, "non-finite stored position");
            Position::default()
        };
        let data: NodeData = recover(&data_json, id.as_str(), &node_id, "data");
        nodes.push(PersistedNode {
            id: NodeId::new(node_id),
            kind,
            position,
            data,
            created_at,
            updated_at,
        });
    }
    Ok(nodes)
}

fn load_edges(conn: &Connection, id: &DiagramId) -> Result<Vec<PersistedEdge>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT edge_id, source_id, target_id, source_handle, target_handle, kind, label,
                style_json, connection_hash, created_at, updated_at
         FROM diagram_edges WHERE diagram_id = ?1 ORDER BY ordinal, rowid",
    )?;
    let rows = stmt.query_map(params![id.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, i64>(9)?,
            row.get::<_, i64>(10)?,
        ))
    })?;

    let mut edges = Vec::new();
    for row in rows {
        let (
            edge_id,
            source,
            target,
            source_handle,
            target_handle,
            kind,
            label,
            style_json,
            connection_hash,
            created_at,
            updated_at,
        ) = row?;
        let style: Option<EdgeStyle> = match style_json {
            Some(json) => recover(&json, id.as_str(), &edge_id, "style"),
            None => None,
        };
        edges.push(PersistedEdge {
            id: EdgeId::new(edge_id),
            source: NodeId::new(source),
            target: NodeId::new(target),
            source_handle,
            target_handle,
            kind,
            label,
            style,
            connection_hash,
            created_at,
            updated_at,
        });
    }
    Ok(edges)
}

fn load_snapshot(conn: &Connection, id: &DiagramId) -> Result<Option<DiagramSnapshot>, StorageError> {
    let Some(meta) = load_meta(conn, id)? else {
        return Ok(None);
    };
    let nodes = load_nodes(conn, id)?;
    let edges = load_edges(conn, id)?;
    DiagramSnapshot::from_parts(meta, nodes, edges)
        .map(Some)
        .map_err(|e| StorageError::IntegrityError {
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn upsert_node(conn: &Connection, diagram: &DiagramId, node: &PersistedNode) -> Result<(), StorageError> {
    let position_json = serde_json::to_string(&node.position)?;
    let data_json = serde_json::to_string(&node.data)?;
    conn.execute(
        "INSERT INTO diagram_nodes
            (diagram_id, node_id, kind, position_json, data_json, task_ref, created_at, updated_at,
             ordinal)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
             (SELECT COALESCE(MAX(ordinal), -1) + 1 FROM diagram_nodes WHERE diagram_id = ?1))
         ON CONFLICT(diagram_id, node_id) DO UPDATE SET
            kind = excluded.kind,
            position_json = excluded.position_json,
            data_json = excluded.data_json,
            task_ref = excluded.task_ref,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at",
        params![
            diagram.as_str(),
            node.id.as_str(),
            node.kind,
            position_json,
            data_json,
            node.task_ref().map(TaskId::as_str),
            node.created_at,
            node.updated_at,
        ],
    )?;
    Ok(())
}

fn upsert_edge(conn: &Connection, diagram: &DiagramId, edge: &PersistedEdge) -> Result<(), StorageError> {
    let style_json = edge.style.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO diagram_edges
            (diagram_id, edge_id, source_id, target_id, source_handle, target_handle, kind,
             label, style_json, connection_hash, created_at, updated_at, ordinal)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
             (SELECT COALESCE(MAX(ordinal), -1) + 1 FROM diagram_edges WHERE diagram_id = ?1))
         ON CONFLICT(diagram_id, edge_id) DO UPDATE SET
            source_id = excluded.source_id,
            target_id = excluded.target_id,
            source_handle = excluded.source_handle,
            target_handle = excluded.target_handle,
            kind = excluded.kind,
            label = excluded.label,
            style_json = excluded.style_json,
            connection_hash = excluded.connection_hash,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at",
        params![
            diagram.as_str(),
            edge.id.as_str(),
            edge.source.as_str(),
            edge.target.as_str(),
            edge.source_handle,
            edge.target_handle,
            edge.kind,
            edge.label,
            style_json,
            edge.connection_hash,
            edge.created_at,
            edge.updated_at,
        ],
    )?;
    Ok(())
}

fn write_meta(conn: &Connection, meta: &DiagramMeta) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE diagrams SET name = ?2, description = ?3, viewport_json = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            meta.id.as_str(),
            meta.name,
            meta.description,
            serde_json::to_string(&meta.viewport)?,
            meta.updated_at,
        ],
    )?;
    Ok(())
}

/// Ids of the nodes and edges a batch touches, in first-touch order.
fn touched_ids(patches: &[Patch]) -> (IndexSet<&NodeId>, IndexSet<&EdgeId>) {
    let mut nodes = IndexSet::new();
    let mut edges = IndexSet::new();
    for patch in patches {
        match patch.target() {
            PatchTarget::Node(id) => {
                nodes.insert(id);
            }
            PatchTarget::Edge(id) => {
                edges.insert(id);
            }
            PatchTarget::Diagram => {}
        }
    }
    (nodes, edges)
}

/// Rewrites the stored order of every node and edge to match `next`.
fn renumber(conn: &Connection, next: &DiagramSnapshot) -> Result<(), StorageError> {
    let diagram = next.id().as_str();
    let mut nodes = conn.prepare_cached(
        "UPDATE diagram_nodes SET ordinal = ?3 WHERE diagram_id = ?1 AND node_id = ?2",
    )?;
    for (ordinal, id) in next.nodes.keys().enumerate() {
        nodes.execute(params![diagram, id.as_str(), ordinal as i64])?;
    }
    let mut edges = conn.prepare_cached(
        "UPDATE diagram_edges SET ordinal = ?3 WHERE diagram_id = ?1 AND edge_id = ?2",
    )?;
    for (ordinal, id) in next.edges.keys().enumerate() {
        edges.execute(params![diagram, id.as_str(), ordinal as i64])?;
    }
    Ok(())
}

/// Writes the final state of every touched entity.
///
/// New rows are appended to the stored order. A batch that inserts at a
/// given position renumbers the whole diagram.
///
/// Touched edges first get a placeholder connection hash (`~` + edge id,
/// never a valid hex digest) so that rewriting them in any order cannot trip
/// the per-diagram uniqueness constraint on intermediate states.
fn write_batch(
    conn: &Connection,
    next: &DiagramSnapshot,
    patches: &[Patch],
) -> Result<(), StorageError> {
    let diagram = next.id();
    let (nodes, edges) = touched_ids(patches);

    for id in nodes {
        match next.node(id) {
            Some(node) => upsert_node(conn, diagram, node)?,
            None => {
                conn.execute(
                    "DELETE FROM diagram_nodes WHERE diagram_id = ?1 AND node_id = ?2",
                    params![diagram.as_str(), id.as_str()],
                )?;
            }
        }
    }

    for id in &edges {
        conn.execute(
            "UPDATE diagram_edges SET connection_hash = '~' || edge_id
             WHERE diagram_id = ?1 AND edge_id = ?2",
            params![diagram.as_str(), id.as_str()],
        )?;
    }
    for id in edges {
        match next.edge(id) {
            Some(edge) => upsert_edge(conn, diagram, edge)?,
            None => {
                conn.execute(
                    "DELETE FROM diagram_edges WHERE diagram_id = ?1 AND edge_id = ?2",
                    params![diagram.as_str(), id.as_str()],
                )?;
            }
        }
    }

    if patches.iter().any(Patch::is_positioned_add) {
        renumber(conn, next)?;
    }
    if !patches.is_empty() {
        write_meta(conn, &next.meta)?;
    }
    Ok(())
}

/// Clears `taskRef == task` on every node row. Caller owns the transaction.
fn clear_refs(conn: &Connection, task: &TaskId, now: i64) -> Result<usize, StorageError> {
    let matches: Vec<(String, String, String)> = {
        let mut stmt = conn.prepare_cached(
            "SELECT diagram_id, node_id, data_json FROM diagram_nodes WHERE task_ref = ?1",
        )?;
        let rows = stmt.query_map(params![task.as_str()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let collected = rows.collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let mut diagrams: HashSet<String> = HashSet::new();
    for (diagram_id, node_id, data_json) in &matches {
        let mut data: NodeData = recover(data_json, diagram_id, node_id, "data");
        data.task_ref = None;
        conn.execute(
            "UPDATE diagram_nodes SET data_json = ?3, task_ref = NULL, updated_at = ?4
             WHERE diagram_id = ?1 AND node_id = ?2",
            params![diagram_id, node_id, serde_json::to_string(&data)?, now],
        )?;
        diagrams.insert(diagram_id.clone());
    }
    for diagram_id in &diagrams {
        conn.execute(
            "UPDATE diagrams SET updated_at = ?2 WHERE id = ?1",
            params![diagram_id, now],
        )?;
    }
    Ok(matches.len())
}

impl DiagramGateway for SqliteStore {
    fn create_diagram(&mut self, input: NewDiagram, now: i64) -> Result<DiagramMeta, StorageError> {
        let meta = input.into_meta(DiagramId::generate(), now);
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO diagrams (id, name, description, viewport_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meta.id.as_str(),
                meta.name,
                meta.description,
                serde_json::to_string(&meta.viewport)?,
                meta.created_at,
                meta.updated_at,
            ],
        )?;
        tx.commit()?;
        Ok(meta)
    }

    fn load_diagram(&self, id: &DiagramId) -> Result<Option<DiagramDocument>, StorageError> {
        Ok(load_snapshot(&self.conn, id)?.map(|s| s.to_document()))
    }

    fn list_diagrams(&self) -> Result<Vec<DiagramSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT d.id, d.name, d.description, d.created_at, d.updated_at,
                    (SELECT COUNT(*) FROM diagram_nodes n WHERE n.diagram_id = d.id),
                    (SELECT COUNT(*) FROM diagram_edges e WHERE e.diagram_id = d.id)
             FROM diagrams d ORDER BY d.created_at, d.rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let node_count: i64 = row.get(5)?;
            let edge_count: i64 = row.get(6)?;
            Ok(DiagramSummary {
                id: DiagramId::new(id),
                name: row.get(1)?,
                description: row.get(2)?,
                node_count: node_count as usize,
                edge_count: edge_count as usize,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn delete_diagram(&mut self, id: &DiagramId) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        // Node and edge rows go with it via ON DELETE CASCADE.
        let deleted = tx.execute("DELETE FROM diagrams WHERE id = ?1", params![id.as_str()])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn apply_patches_atomically(
        &mut self,
        id: &DiagramId,
        patches: &[Patch],
        now: i64,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let current =
            load_snapshot(&tx, id)?.ok_or_else(|| StorageError::DiagramNotFound(id.clone()))?;
        let next = engine::apply(&current, patches, now)?;
        write_batch(&tx, &next, patches)?;
        tx.commit()?;
        tracing::debug!(diagram = id.as_str(), patches = patches.len(), "batch committed");
        Ok(())
    }

    fn clear_task_references(&mut self, task: &TaskId, now: i64) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let cleared = clear_refs(&tx, task, now)?;
        tx.commit()?;
        Ok(cleared)
    }
}

impl TaskStore for SqliteStore {
    fn get_all_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, title, status, priority FROM tasks ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let status: String = row.get(2)?;
            let priority: String = row.get(3)?;
            Ok((id, title, status, priority))
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, status, priority) = row?;
            let status = status
                .parse::<TaskStatus>()
                .map_err(|reason| StorageError::IntegrityError { reason })?;
            let priority = priority
                .parse::<Priority>()
                .map_err(|reason| StorageError::IntegrityError { reason })?;
            tasks.push(Task {
                id: TaskId::new(id),
                title,
                status,
                priority,
            });
        }
        Ok(tasks)
    }

    fn upsert_task(&mut self, task: &Task, now: i64) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO tasks (id, title, status, priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                status = excluded.status,
                priority = excluded.priority,
                updated_at = excluded.updated_at",
            params![
                task.id.as_str(),
                task.title,
                task.status.as_str(),
                task.priority.as_str(),
                now,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_task(&mut self, id: &TaskId, now: i64) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
        if deleted == 0 {
            return Ok(false);
        }
        let cleared = clear_refs(&tx, id, now)?;
        tx.commit()?;
        tracing::info!(task = id.as_str(), cleared, "task deleted");
        Ok(true)
    }
}
