//! Cycle guard for new connections.
//!
//! Edges are directed dependencies, so a diagram must stay a DAG. Before an
//! `addEdge` patch is built, [`would_create_cycle`] checks whether the
//! proposed source is already reachable from the proposed target; if it is,
//! the new edge would close a loop.
//!
//! The search is a breadth-first walk from the target over a petgraph
//! `DiGraphMap` view of the edges. Each reachable node and edge is visited
//! at most once.

use std::collections::{HashMap, VecDeque};

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;

use crate::edge::PersistedEdge;
use crate::id::NodeId;

fn graph_of<'a, I>(edges: I) -> DiGraphMap<&'a str, ()>
where
    I: IntoIterator<Item = &'a PersistedEdge>,
{
    let mut graph = DiGraphMap::new();
    for edge in edges {
        graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
    }
    graph
}

/// Returns `true` if adding `source -> target` would create a directed cycle.
///
/// A self-connection (`source == target`) always counts as a cycle.
pub fn would_create_cycle<'a, I>(edges: I, source: &NodeId, target: &NodeId) -> bool
where
    I: IntoIterator<Item = &'a PersistedEdge>,
{
    cycle_path(edges, source, target).is_some()
}

/// Returns the existing path `target -> ... -> source` that the proposed edge
/// `source -> target` would close into a loop, or `None` if the connection is
/// safe. For a self-connection the path is just `[source]`.
pub fn cycle_path<'a, I>(edges: I, source: &NodeId, target: &NodeId) -> Option<Vec<NodeId>>
where
    I: IntoIterator<Item = &'a PersistedEdge>,
{
    if source == target {
        return Some(vec![source.clone()]);
    }

    let graph: DiGraphMap<&str, ()> = graph_of(edges);
    let start = target.as_str();
    let goal = source.as_str();
    if !graph.contains_node(start) || !graph.contains_node(goal) {
        return None;
    }

    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    parent.insert(start, start);

    while let Some(current) = queue.pop_front() {
        if current == goal {
            let mut path = vec![NodeId::new(current)];
            let mut cursor = current;
            while cursor != start {
                cursor = parent[cursor];
                path.push(NodeId::new(cursor));
            }
            path.reverse();
            return Some(path);
        }
        for next in graph.neighbors(current) {
            if !parent.contains_key(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Returns `true` if the edge set already contains a directed cycle.
///
/// Used to flag diagrams that were persisted before the guard existed.
pub fn has_cycle<'a, I>(edges: I) -> bool
where
    I: IntoIterator<Item = &'a PersistedEdge>,
{
    let edges: Vec<&PersistedEdge> = edges.into_iter().collect();
    if edges.iter().any(|e| e.source == e.target) {
        return true;
    }
    is_cyclic_directed(&graph_of(edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EdgeId;
    use proptest::prelude::*;

    fn edge(s: &str, t: &str) -> PersistedEdge {
        PersistedEdge::new(
            EdgeId::new(format!("{}-{}", s, t)),
            NodeId::from(s),
            NodeId::from(t),
            "default",
            0,
        )
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn reverse_of_existing_edge_is_a_cycle() {
        let edges = vec![edge("a", "b")];
        assert!(would_create_cycle(&edges, &id("b"), &id("a")));
        assert!(!would_create_cycle(&edges, &id("b"), &id("c")));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let none: Vec<PersistedEdge> = Vec::new();
        assert!(would_create_cycle(&none, &id("a"), &id("a")));
        assert_eq!(cycle_path(&none, &id("a"), &id("a")), Some(vec![id("a")]));
    }

    #[test]
    fn long_path_is_detected_with_its_route() {
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d"), edge("x", "d")];
        let path = cycle_path(&edges, &id("d"), &id("a")).unwrap();
        assert_eq!(path, vec![id("a"), id("b"), id("c"), id("d")]);
        assert!(!would_create_cycle(&edges, &id("a"), &id("x")));
    }

    #[test]
    fn disconnected_components_are_safe() {
        let edges = vec![edge("a", "b"), edge("c", "d")];
        assert!(!would_create_cycle(&edges, &id("b"), &id("c")));
        assert!(!would_create_cycle(&edges, &id("d"), &id("a")));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let edges = vec![edge("a", "b"), edge("a", "c"), edge("b", "d")];
        assert!(!would_create_cycle(&edges, &id("c"), &id("d")));
        assert!(would_create_cycle(&edges, &id("d"), &id("a")));
    }

    #[test]
    fn has_cycle_flags_existing_loops() {
        assert!(!has_cycle(&vec![edge("a", "b"), edge("b", "c")]));
        assert!(has_cycle(&vec![edge("a", "b"), edge("b", "a")]));
        assert!(has_cycle(&vec![edge("a", "a")]));
    }

    /// Edges over node names `n0..n9` as `(from, to)` index pairs.
    fn edges_from(pairs: &[(u8, u8)]) -> Vec<PersistedEdge> {
        pairs
            .iter()
            .map(|(a, b)| edge(&format!("n{}", a), &format!("n{}", b)))
            .collect()
    }

    proptest! {
        #[test]
        fn closing_any_existing_path_is_rejected(len in 1usize..8) {
            let pairs: Vec<(u8, u8)> = (0..len as u8).map(|i| (i, i + 1)).collect();
            let edges = edges_from(&pairs);
            let first = id("n0");
            let last = NodeId::new(format!("n{}", len));
            prop_assert!(would_create_cycle(&edges, &last, &first));
            prop_assert!(!would_create_cycle(&edges, &first, &last));
        }

        #[test]
        fn accepted_edges_keep_graph_acyclic(
            proposals in proptest::collection::vec((0u8..10, 0u8..10), 0..40)
        ) {
            let mut edges: Vec<PersistedEdge> = Vec::new();
            for (a, b) in proposals {
                let s = NodeId::new(format!("n{}", a));
                let t = NodeId::new(format!("n{}", b));
                if !would_create_cycle(&edges, &s, &t) {
                    edges.push(edge(s.as_str(), t.as_str()));
                }
            }
            prop_assert!(!has_cycle(&edges));
        }

        #[test]
        fn separate_components_never_cycle(
            left in proptest::collection::vec((0u8..5, 0u8..5), 0..10),
            right in proptest::collection::vec((5u8..10, 5u8..10), 0..10),
            x in 0u8..5,
            y in 5u8..10,
        ) {
            let mut pairs: Vec<(u8, u8)> = left.into_iter().filter(|(a, b)| a < b).collect();
            pairs.extend(right.into_iter().filter(|(a, b)| a < b));
            let edges = edges_from(&pairs);
            let x = NodeId::new(format!("n{}", x));
            let y = NodeId::new(format!("n{}", y));
            prop_assert!(!would_create_cycle(&edges, &x, &y));
            prop_assert!(!would_create_cycle(&edges, &y, &x));
        }
    }
}
