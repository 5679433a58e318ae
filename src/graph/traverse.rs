//! Bounded multi-hop traversal and neighborhood extraction.
//!
//! BFS-based exploration from seed nodes with configurable hop limits,
//! weight thresholds, and result caps. Also hosts the hop-distance primitive
//! the selection pass uses for its diversity penalty.

use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::error::AlgoResult;

use super::store::ReasoningGraph;

/// Configuration for a neighborhood traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Maximum hop distance from the seed nodes.
    pub max_hops: u32,
    /// Only traverse edges with at least this weight.
    pub min_weight: f64,
    /// Follow incoming edges as well as outgoing ones.
    pub follow_incoming: bool,
    /// Maximum number of edges to collect.
    pub max_results: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            min_weight: 0.0,
            follow_incoming: true,
            max_results: 10_000,
        }
    }
}

/// Result of a neighborhood traversal.
#[derive(Debug, Clone)]
pub struct NeighborhoodResult {
    /// Ids of every node reached, seeds included.
    pub node_ids: Vec<String>,
    /// Ids of every edge traversed.
    pub edge_ids: Vec<String>,
    /// Maximum hop distance actually reached.
    pub hops_reached: u32,
}

/// Collect the neighborhood reachable from the seed nodes.
///
/// Unknown seed ids are skipped rather than erroring, matching the
/// empty-result convention for degenerate analysis input.
pub fn extract_neighborhood(
    kg: &ReasoningGraph,
    seeds: &[&str],
    config: &TraversalConfig,
) -> AlgoResult<NeighborhoodResult> {
    let graph = kg.read_graph();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut node_ids: Vec<String> = Vec::new();
    let mut edge_ids: Vec<String> = Vec::new();
    let mut seen_edges: HashSet<String> = HashSet::new();
    let mut hops_reached = 0;

    let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::new();
    for seed in seeds {
        if let Some(idx) = kg.index_of(seed)
            && visited.insert(idx)
        {
            if let Some(node) = graph.node_weight(idx) {
                node_ids.push(node.id.clone());
            }
            queue.push_back((idx, 0));
        }
    }

    while let Some((idx, hops)) = queue.pop_front() {
        if hops >= config.max_hops || edge_ids.len() >= config.max_results {
            continue;
        }

        let outgoing = graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight().clone(), e.target()));
        let incoming = graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.weight().clone(), e.source()));
        let steps: Vec<_> = if config.follow_incoming {
            outgoing.chain(incoming).collect()
        } else {
            outgoing.collect()
        };

        for (edge, neighbor) in steps {
            if edge.weight < config.min_weight {
                continue;
            }
            if edge_ids.len() >= config.max_results {
                break;
            }
            if seen_edges.insert(edge.id.clone()) {
                edge_ids.push(edge.id);
            }
            hops_reached = hops_reached.max(hops + 1);
            if visited.insert(neighbor) {
                if let Some(node) = graph.node_weight(neighbor) {
                    node_ids.push(node.id.clone());
                }
                queue.push_back((neighbor, hops + 1));
            }
        }
    }

    Ok(NeighborhoodResult {
        node_ids,
        edge_ids,
        hops_reached,
    })
}

/// Number of hops from `from` to `to` along outgoing edges, if `to` is
/// reachable within `max_hops`. Zero when the ids are equal.
pub(crate) fn hop_distance(
    kg: &ReasoningGraph,
    from: &str,
    to: &str,
    max_hops: u32,
) -> Option<u32> {
    let from_idx = kg.index_of(from)?;
    let to_idx = kg.index_of(to)?;
    if from_idx == to_idx {
        return Some(0);
    }

    let graph = kg.read_graph();
    let mut visited: HashSet<NodeIndex> = HashSet::from([from_idx]);
    let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(from_idx, 0)]);

    while let Some((idx, hops)) = queue.pop_front() {
        if hops >= max_hops {
            continue;
        }
        for edge in graph.edges_directed(idx, Direction::Outgoing) {
            let neighbor = edge.target();
            if neighbor == to_idx {
                return Some(hops + 1);
            }
            if visited.insert(neighbor) {
                queue.push_back((neighbor, hops + 1));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeDraft, EdgeType, NodeDraft};
    use crate::limits::DeploymentTier;

    fn chain_graph() -> ReasoningGraph {
        // a -> b -> c -> d
        let g = ReasoningGraph::new("traverse-test", DeploymentTier::Development);
        for id in ["a", "b", "c", "d"] {
            g.create_node(NodeDraft::new(format!("content {id}")).with_id(id))
                .unwrap();
        }
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "d")] {
            g.create_edge(EdgeDraft::new(from, to, EdgeType::LeadsTo, 0.8))
                .unwrap();
        }
        g
    }

    #[test]
    fn neighborhood_respects_hop_limit() {
        let g = chain_graph();
        let result = extract_neighborhood(
            &g,
            &["a"],
            &TraversalConfig {
                max_hops: 1,
                follow_incoming: false,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.node_ids, vec!["a", "b"]);
        assert_eq!(result.edge_ids.len(), 1);
        assert_eq!(result.hops_reached, 1);
    }

    #[test]
    fn neighborhood_full_chain() {
        let g = chain_graph();
        let result = extract_neighborhood(
            &g,
            &["a"],
            &TraversalConfig {
                max_hops: 10,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.node_ids.len(), 4);
        assert_eq!(result.edge_ids.len(), 3);
        assert_eq!(result.hops_reached, 3);
    }

    #[test]
    fn neighborhood_weight_filter() {
        let g = ReasoningGraph::new("traverse-test", DeploymentTier::Development);
        for id in ["a", "b", "c"] {
            g.create_node(NodeDraft::new(format!("content {id}")).with_id(id))
                .unwrap();
        }
        g.create_edge(EdgeDraft::new("a", "b", EdgeType::Supports, 0.9))
            .unwrap();
        g.create_edge(EdgeDraft::new("a", "c", EdgeType::Supports, 0.2))
            .unwrap();

        let result = extract_neighborhood(
            &g,
            &["a"],
            &TraversalConfig {
                min_weight: 0.5,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.node_ids, vec!["a", "b"]);
    }

    #[test]
    fn neighborhood_follows_incoming_when_asked() {
        let g = chain_graph();
        let without = extract_neighborhood(
            &g,
            &["c"],
            &TraversalConfig {
                follow_incoming: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(without.node_ids, vec!["c", "d"]);

        let with = extract_neighborhood(&g, &["c"], &TraversalConfig::default()).unwrap();
        assert_eq!(with.node_ids.len(), 4);
    }

    #[test]
    fn unknown_seeds_are_skipped() {
        let g = chain_graph();
        let result =
            extract_neighborhood(&g, &["ghost"], &TraversalConfig::default()).unwrap();
        assert!(result.node_ids.is_empty());
        assert_eq!(result.hops_reached, 0);
    }

    #[test]
    fn hop_distance_counts_directed_hops() {
        let g = chain_graph();
        assert_eq!(hop_distance(&g, "a", "a", 3), Some(0));
        assert_eq!(hop_distance(&g, "a", "b", 3), Some(1));
        assert_eq!(hop_distance(&g, "a", "c", 3), Some(2));
        assert_eq!(hop_distance(&g, "a", "d", 3), Some(3));
        // Beyond the cap, or against edge direction: unreachable.
        assert_eq!(hop_distance(&g, "a", "d", 2), None);
        assert_eq!(hop_distance(&g, "d", "a", 3), None);
    }
}
