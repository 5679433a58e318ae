//! Graph snapshots: complete JSON serialization with strict re-validation.
//!
//! A snapshot is the authoritative textual form of a graph: tier, graph id,
//! and every node and edge in insertion order, with sets materialized as
//! arrays. Loading is an untrusted-input path — structurally invalid
//! snapshots (orphan edges, dangling or cyclic parents, duplicate ids,
//! inconsistent sets, out-of-domain weights) are rejected with a descriptive
//! error, never silently repaired.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::limits::DeploymentTier;

use super::store::ReasoningGraph;
use super::{ReasoningEdge, ReasoningNode};

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Complete, order-preserving snapshot of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub graph_id: String,
    pub tier: DeploymentTier,
    pub nodes: Vec<ReasoningNode>,
    pub edges: Vec<ReasoningEdge>,
}

impl ReasoningGraph {
    /// Serialize the full graph state to a JSON snapshot.
    pub fn serialize(&self) -> GraphResult<String> {
        let snapshot = GraphSnapshot {
            version: FORMAT_VERSION,
            graph_id: self.graph_id().to_string(),
            tier: self.tier(),
            nodes: self.all_nodes(),
            edges: self.all_edges(),
        };
        serde_json::to_string(&snapshot).map_err(|e| GraphError::Snapshot {
            message: format!("failed to serialize graph: {e}"),
        })
    }

    /// Reconstruct a graph from a snapshot produced by [`serialize`].
    ///
    /// Every structural invariant is re-validated before the first entity is
    /// installed, so a failed load never yields a half-built graph.
    ///
    /// [`serialize`]: ReasoningGraph::serialize
    pub fn deserialize(input: &str) -> GraphResult<ReasoningGraph> {
        let snapshot: GraphSnapshot =
            serde_json::from_str(input).map_err(|e| GraphError::Snapshot {
                message: format!("failed to parse snapshot: {e}"),
            })?;
        validate(&snapshot)?;

        let graph = ReasoningGraph::new(snapshot.graph_id.clone(), snapshot.tier);
        for node in snapshot.nodes {
            graph.install_node(node);
        }
        for edge in snapshot.edges {
            graph.install_edge(edge)?;
        }
        tracing::info!(
            graph_id = %graph.graph_id(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "restored graph from snapshot"
        );
        Ok(graph)
    }
}

/// Check every structural invariant a well-formed snapshot must satisfy.
fn validate(snapshot: &GraphSnapshot) -> GraphResult<()> {
    if snapshot.version != FORMAT_VERSION {
        return Err(GraphError::Snapshot {
            message: format!(
                "unsupported snapshot version {} (expected {FORMAT_VERSION})",
                snapshot.version
            ),
        });
    }

    let limits = snapshot.tier.limits();
    if snapshot.nodes.len() > limits.max_nodes {
        return Err(GraphError::CapacityExceeded {
            current: snapshot.nodes.len(),
            max: limits.max_nodes,
            operation: "deserialize",
        });
    }
    if snapshot.edges.len() > limits.max_edges {
        return Err(GraphError::CapacityExceeded {
            current: snapshot.edges.len(),
            max: limits.max_edges,
            operation: "deserialize",
        });
    }

    let mut nodes: HashMap<&str, &ReasoningNode> = HashMap::with_capacity(snapshot.nodes.len());
    for node in &snapshot.nodes {
        if nodes.insert(node.id.as_str(), node).is_some() {
            return Err(GraphError::DuplicateId { id: node.id.clone() });
        }
    }

    let mut edges: HashMap<&str, &ReasoningEdge> = HashMap::with_capacity(snapshot.edges.len());
    for edge in &snapshot.edges {
        if edges.insert(edge.id.as_str(), edge).is_some() {
            return Err(GraphError::DuplicateId { id: edge.id.clone() });
        }
        if !(edge.weight > 0.0 && edge.weight <= 1.0) {
            return Err(GraphError::InvalidWeight { value: edge.weight });
        }
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !nodes.contains_key(endpoint.as_str()) {
                return Err(GraphError::OrphanEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    for node in &snapshot.nodes {
        validate_parent_chain(node, &nodes, snapshot.nodes.len())?;

        match &node.parent_id {
            None => {
                if node.depth != 0 {
                    return Err(GraphError::Snapshot {
                        message: format!(
                            "root node {} has depth {} (expected 0)",
                            node.id, node.depth
                        ),
                    });
                }
            }
            Some(pid) => {
                let parent = nodes.get(pid.as_str()).ok_or_else(|| GraphError::Snapshot {
                    message: format!("node {} references missing parent {pid}", node.id),
                })?;
                if node.depth != parent.depth + 1 {
                    return Err(GraphError::InvalidDepth {
                        node_id: node.id.clone(),
                        depth: node.depth,
                        max_depth: limits.max_depth,
                    });
                }
                if !parent.children.contains(&node.id) {
                    return Err(GraphError::Snapshot {
                        message: format!(
                            "parent {pid} does not list {} among its children",
                            node.id
                        ),
                    });
                }
            }
        }
        if node.depth > limits.max_depth {
            return Err(GraphError::InvalidDepth {
                node_id: node.id.clone(),
                depth: node.depth,
                max_depth: limits.max_depth,
            });
        }

        for child_id in &node.children {
            let child = nodes.get(child_id.as_str()).ok_or_else(|| GraphError::Snapshot {
                message: format!("node {} lists missing child {child_id}", node.id),
            })?;
            if child.parent_id.as_deref() != Some(node.id.as_str()) {
                return Err(GraphError::Snapshot {
                    message: format!(
                        "child {child_id} of {} does not point back to it",
                        node.id
                    ),
                });
            }
        }
    }

    // Edge sets on each node must mirror the edge list exactly.
    let mut expected_outgoing: HashMap<&str, BTreeSet<String>> = HashMap::new();
    let mut expected_incoming: HashMap<&str, BTreeSet<String>> = HashMap::new();
    for edge in &snapshot.edges {
        expected_outgoing
            .entry(edge.source_id.as_str())
            .or_default()
            .insert(edge.id.clone());
        expected_incoming
            .entry(edge.target_id.as_str())
            .or_default()
            .insert(edge.id.clone());
    }
    for node in &snapshot.nodes {
        let outgoing = expected_outgoing.remove(node.id.as_str()).unwrap_or_default();
        let incoming = expected_incoming.remove(node.id.as_str()).unwrap_or_default();
        if node.outgoing != outgoing || node.incoming != incoming {
            return Err(GraphError::Snapshot {
                message: format!("edge sets of node {} do not match the edge list", node.id),
            });
        }
    }

    Ok(())
}

/// Walk the parent chain from `node`, rejecting cycles.
///
/// A well-formed forest chain terminates within `node_count` steps; looping
/// longer than that means the links revisit a node.
fn validate_parent_chain(
    node: &ReasoningNode,
    nodes: &HashMap<&str, &ReasoningNode>,
    node_count: usize,
) -> GraphResult<()> {
    let mut cursor = node.parent_id.as_deref();
    let mut steps = 0;
    while let Some(pid) = cursor {
        if pid == node.id {
            return Err(GraphError::CircularParent {
                node_id: node.id.clone(),
            });
        }
        steps += 1;
        if steps > node_count {
            return Err(GraphError::CircularParent {
                node_id: node.id.clone(),
            });
        }
        cursor = nodes.get(pid).and_then(|parent| parent.parent_id.as_deref());
    }
    Ok(())
}
