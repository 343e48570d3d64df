//! Runtime transform: domain nodes and persisted edges in canvas shape.
//!
//! Runtime objects carry ephemeral UI flags and display-safe text. They are
//! rebuilt on every render pass and never persisted. [`merge_nodes`] and
//! [`merge_edges`] carry on-screen state from the previous pass into the new
//! one so a re-render does not disturb what the user is doing.

use std::collections::{HashMap, HashSet};

use flowdesk_core::diagram::Viewport;
use flowdesk_core::edge::PersistedEdge;
use flowdesk_core::id::{EdgeId, NodeId};
use flowdesk_core::node::{NodeData, NodeStyle, PersistedNode, Position};
use flowdesk_core::task::{Task, TaskStatus};
use serde::Serialize;

use crate::resolve::{resolve, DomainNode, ResolvedTask};
use crate::style::Theme;

pub const DEFAULT_LABEL_MAX: usize = 32;

const ELLIPSIS: char = '\u{2026}';

/// Ephemeral interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiFlags {
    pub hovered: bool,
    pub dragging: bool,
    pub highlighted: bool,
    pub selected: bool,
}

/// A label cut to a display width, with the original kept alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayLabel {
    pub text: String,
    pub full: String,
    pub truncated: bool,
}

/// Truncates to at most `max` characters (not bytes), ending in an ellipsis
/// when cut.
pub fn truncate_label(label: &str, max: usize) -> DisplayLabel {
    let count = label.chars().count();
    if count <= max {
        return DisplayLabel {
            text: label.to_string(),
            full: label.to_string(),
            truncated: false,
        };
    }
    let mut text: String = label.chars().take(max.saturating_sub(1)).collect();
    if max > 0 {
        text.push(ELLIPSIS);
    }
    DisplayLabel {
        text,
        full: label.to_string(),
        truncated: true,
    }
}

/// Visual affordances attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Decoration {
    StatusBadge { status: TaskStatus },
    TaskDeleted,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    /// Where the node is drawn. May differ from the persisted position while
    /// a drag is in flight.
    pub position: Position,
    pub persisted_position: Position,
    pub data: NodeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_task: Option<ResolvedTask>,
    pub style: NodeStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<DisplayLabel>,
    pub decorations: Vec<Decoration>,
    pub ui: UiFlags,
}

impl RuntimeNode {
    pub fn from_domain(domain: &DomainNode, label_max: usize) -> Self {
        let node: &PersistedNode = &domain.node;
        let label_source = node
            .data
            .label
            .as_deref()
            .or(domain.resolved_task.as_ref().map(|t| t.title.as_str()));

        let mut decorations = Vec::new();
        if let Some(task) = &domain.resolved_task {
            decorations.push(Decoration::StatusBadge {
                status: task.status,
            });
        }
        if domain.task_missing {
            decorations.push(Decoration::TaskDeleted);
        }
        if node.is_locked() {
            decorations.push(Decoration::Locked);
        }

        RuntimeNode {
            id: node.id.clone(),
            kind: node.kind.clone(),
            position: node.position,
            persisted_position: node.position,
            data: node.data.clone(),
            resolved_task: domain.resolved_task.clone(),
            style: domain.computed_style.clone(),
            label: label_source.map(|l| truncate_label(l, label_max)),
            decorations,
            ui: UiFlags::default(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.data.locked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEdge {
    #[serde(flatten)]
    pub edge: PersistedEdge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_label: Option<DisplayLabel>,
    pub ui: UiFlags,
}

impl RuntimeEdge {
    pub fn from_persisted(edge: &PersistedEdge, label_max: usize) -> Self {
        RuntimeEdge {
            edge: edge.clone(),
            display_label: edge.label.as_deref().map(|l| truncate_label(l, label_max)),
            ui: UiFlags::default(),
        }
    }

    pub fn id(&self) -> &EdgeId {
        &self.edge.id
    }
}

/// Everything the canvas needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub nodes: Vec<RuntimeNode>,
    pub edges: Vec<RuntimeEdge>,
    pub viewport: Viewport,
}

/// Converts already-resolved domain nodes and persisted edges.
pub fn to_runtime<'a, E>(domain: &[DomainNode], edges: E, label_max: usize) -> (Vec<RuntimeNode>, Vec<RuntimeEdge>)
where
    E: IntoIterator<Item = &'a PersistedEdge>,
{
    let nodes = domain
        .iter()
        .map(|d| RuntimeNode::from_domain(d, label_max))
        .collect();
    let edges = edges
        .into_iter()
        .map(|e| RuntimeEdge::from_persisted(e, label_max))
        .collect();
    (nodes, edges)
}

/// Full pipeline for one stateless pass: resolve, then convert.
pub fn render<'a, N, E>(
    nodes: N,
    edges: E,
    tasks: &[Task],
    theme: Theme,
    viewport: Viewport,
    label_max: usize,
) -> RenderFrame
where
    N: IntoIterator<Item = &'a PersistedNode>,
    E: IntoIterator<Item = &'a PersistedEdge>,
{
    let domain = resolve(nodes, tasks, theme);
    let (nodes, edges) = to_runtime(&domain, edges, label_max);
    RenderFrame {
        nodes,
        edges,
        viewport,
    }
}

/// Carries on-screen state from `previous` into a freshly built pass.
///
/// A surviving node keeps its selection, hover and drag flags. It also keeps
/// its drawn position while it is being dragged, or when its persisted
/// position did not change between the two passes; otherwise (an undo of a
/// move, for example) it jumps to the new persisted position. New nodes take
/// the persisted position.
pub fn merge_nodes(previous: &[RuntimeNode], next: Vec<RuntimeNode>) -> Vec<RuntimeNode> {
    let by_id: HashMap<&NodeId, &RuntimeNode> = previous.iter().map(|n| (&n.id, n)).collect();
    next.into_iter()
        .map(|mut node| {
            if let Some(old) = by_id.get(&node.id) {
                if old.ui.dragging || old.persisted_position == node.persisted_position {
                    node.position = old.position;
                }
                node.ui.selected = old.ui.selected;
                node.ui.hovered = old.ui.hovered;
                node.ui.dragging = old.ui.dragging;
            }
            node
        })
        .collect()
}

/// Keeps selection and hover on edges that survive a re-render.
pub fn merge_edges(previous: &[RuntimeEdge], next: Vec<RuntimeEdge>) -> Vec<RuntimeEdge> {
    let by_id: HashMap<&EdgeId, &RuntimeEdge> = previous.iter().map(|e| (e.id(), e)).collect();
    next.into_iter()
        .map(|mut edge| {
            if let Some(old) = by_id.get(edge.id()) {
                edge.ui.selected = old.ui.selected;
                edge.ui.hovered = old.ui.hovered;
            }
            edge
        })
        .collect()
}

/// Marks `hovered` and highlights its incident edges and direct neighbours.
/// Passing `None` clears hover state.
pub fn apply_hover(nodes: &mut [RuntimeNode], edges: &mut [RuntimeEdge], hovered: Option<&NodeId>) {
    let mut neighbours: HashSet<NodeId> = HashSet::new();
    for edge in edges.iter_mut() {
        let touches = hovered.is_some_and(|h| edge.edge.touches(h));
        edge.ui.highlighted = touches;
        if touches {
            neighbours.insert(edge.edge.source.clone());
            neighbours.insert(edge.edge.target.clone());
        }
    }
    for node in nodes.iter_mut() {
        let is_hovered = hovered == Some(&node.id);
        node.ui.hovered = is_hovered;
        node.ui.highlighted = !is_hovered && neighbours.contains(&node.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdesk_core::id::TaskId;
    use flowdesk_core::task::TaskStatus;
    use proptest::prelude::*;

    fn node(id: &str, x: f64, y: f64) -> PersistedNode {
        PersistedNode::new(NodeId::from(id), "default", Position::new(x, y), 0)
    }

    fn edge(s: &str, t: &str) -> PersistedEdge {
        PersistedEdge::new(
            EdgeId::new(format!("{}{}", s, t)),
            NodeId::from(s),
            NodeId::from(t),
            "default",
            0,
        )
    }

    #[test]
    fn long_label_is_truncated_with_full_text_kept() {
        let label = truncate_label("Write the quarterly report draft", 10);
        assert_eq!(label.text, "Write the\u{2026}");
        assert_eq!(label.text.chars().count(), 10);
        assert_eq!(label.full, "Write the quarterly report draft");
        assert!(label.truncated);

        let short = truncate_label("ok", 10);
        assert!(!short.truncated);
        assert_eq!(short.text, "ok");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let label = truncate_label("ééééé", 3);
        assert_eq!(label.text, "éé\u{2026}");
    }

    #[test]
    fn render_labels_task_nodes_with_task_title_and_decorations() {
        let mut locked = node("b", 0.0, 0.0);
        locked.data.locked = true;
        let a = node("a", 0.0, 0.0).with_data(NodeData::for_task(TaskId::from("t1")));
        let gone = node("c", 0.0, 0.0).with_data(NodeData::for_task(TaskId::from("t9")));
        let tasks = vec![Task::new("t1", "Plan sprint", TaskStatus::InProgress)];

        let frame = render(
            [&a, &locked, &gone],
            &[edge("a", "b")],
            &tasks,
            Theme::Light,
            Viewport::default(),
            DEFAULT_LABEL_MAX,
        );
        assert_eq!(frame.nodes[0].label.as_ref().unwrap().text, "Plan sprint");
        assert_eq!(
            frame.nodes[0].decorations,
            vec![Decoration::StatusBadge {
                status: TaskStatus::InProgress
            }]
        );
        assert_eq!(frame.nodes[1].decorations, vec![Decoration::Locked]);
        assert_eq!(frame.nodes[2].decorations, vec![Decoration::TaskDeleted]);
        assert_eq!(frame.edges.len(), 1);
    }

    #[test]
    fn merge_keeps_screen_state_of_surviving_nodes() {
        let first = render([&node("a", 0.0, 0.0)], [], &[], Theme::Light, Viewport::default(), 32);
        let mut previous = first.nodes;
        previous[0].position = Position::new(40.0, 40.0);
        previous[0].ui.selected = true;
        previous[0].ui.dragging = true;

        let mut relabelled = node("a", 0.0, 0.0);
        relabelled.data.label = Some("renamed".into());
        let next = render(
            [&relabelled, &node("b", 5.0, 5.0)],
            [],
            &[],
            Theme::Light,
            Viewport::default(),
            32,
        );
        let merged = merge_nodes(&previous, next.nodes);

        assert_eq!(merged[0].position, Position::new(40.0, 40.0));
        assert!(merged[0].ui.selected && merged[0].ui.dragging);
        assert_eq!(merged[0].label.as_ref().unwrap().text, "renamed");
        assert_eq!(merged[1].position, Position::new(5.0, 5.0));
        assert!(!merged[1].ui.selected);
    }

    #[test]
    fn merge_follows_persisted_moves_when_not_dragging() {
        let previous = render([&node("a", 100.0, 50.0)], [], &[], Theme::Light, Viewport::default(), 32).nodes;
        let next = render([&node("a", 0.0, 0.0)], [], &[], Theme::Light, Viewport::default(), 32).nodes;
        let merged = merge_nodes(&previous, next);
        assert_eq!(merged[0].position, Position::new(0.0, 0.0));
    }

    #[test]
    fn hover_highlights_neighbourhood() {
        let frame = render(
            [&node("a", 0.0, 0.0), &node("b", 0.0, 0.0), &node("c", 0.0, 0.0)],
            &[edge("a", "b")],
            &[],
            Theme::Light,
            Viewport::default(),
            32,
        );
        let (mut nodes, mut edges) = (frame.nodes, frame.edges);
        apply_hover(&mut nodes, &mut edges, Some(&NodeId::from("a")));
        assert!(nodes[0].ui.hovered);
        assert!(nodes[1].ui.highlighted);
        assert!(!nodes[2].ui.highlighted);
        assert!(edges[0].ui.highlighted);

        apply_hover(&mut nodes, &mut edges, None);
        assert!(nodes.iter().all(|n| !n.ui.hovered && !n.ui.highlighted));
        assert!(!edges[0].ui.highlighted);
    }

    proptest! {
        #[test]
        fn truncated_label_fits_and_keeps_original(label in "\\PC{0,60}", max in 1usize..40) {
            let display = truncate_label(&label, max);
            prop_assert!(display.text.chars().count() <= max);
            prop_assert_eq!(&display.full, &label);
            prop_assert_eq!(display.truncated, label.chars().count() > max);
        }
    }
}
