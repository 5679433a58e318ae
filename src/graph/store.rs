//! Capacity-bounded reasoning graph store with dual-indexing.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for O(1) lookups by
//! node or edge id. A `StableDiGraph` keeps indices valid across removals,
//! which this store performs routinely (node removal cascades to every
//! referencing edge).
//!
//! Every mutation is atomic per call: all validation happens before the first
//! write, so a failed operation leaves the store untouched. Callers invoking
//! mutations from multiple tasks are responsible for serializing writes.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::error::{GraphError, GraphResult};
use crate::limits::{DeploymentTier, ResourceLimits};

use super::{
    EdgeDraft, EdgeMetadata, IdAllocator, NodeDraft, NodeMetadata, NodePatch, NodeScores,
    NodeType, ReasoningEdge, ReasoningNode, unix_now,
};

/// Capacity-bounded, integrity-enforcing container for reasoning nodes and
/// edges.
///
/// Nodes and edges are stored as petgraph weights; id → index side tables
/// give O(1) lookups. All query methods return clones, never references into
/// the structure.
pub struct ReasoningGraph {
    /// Session or graph id this store belongs to.
    graph_id: String,
    /// Deployment tier fixing the resource limits.
    tier: DeploymentTier,
    limits: ResourceLimits,
    /// The directed graph: node weights are full nodes, edge weights full edges.
    graph: RwLock<StableDiGraph<ReasoningNode, ReasoningEdge>>,
    /// Node id → NodeIndex.
    node_index: DashMap<String, NodeIndex>,
    /// Edge id → EdgeIndex.
    edge_index: DashMap<String, EdgeIndex>,
    ids: IdAllocator,
    /// Monotone per-store creation counter; orders `all_nodes`/`all_edges`.
    sequence: AtomicU64,
}

impl ReasoningGraph {
    /// Create an empty graph bound to the given id and tier.
    pub fn new(graph_id: impl Into<String>, tier: DeploymentTier) -> Self {
        let graph_id = graph_id.into();
        tracing::info!(graph_id = %graph_id, tier = %tier, "opening reasoning graph");
        Self {
            graph_id,
            tier,
            limits: tier.limits(),
            graph: RwLock::new(StableDiGraph::new()),
            node_index: DashMap::new(),
            edge_index: DashMap::new(),
            ids: IdAllocator::new(),
            sequence: AtomicU64::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Node mutations
    // -----------------------------------------------------------------------

    /// Create a node from a draft, returning its id.
    ///
    /// Capacity is checked before any mutation. A draft with a `parent_id`
    /// requires the parent to exist already; the new node registers into the
    /// parent's children and sits one level below it.
    pub fn create_node(&self, draft: NodeDraft) -> GraphResult<String> {
        if self.node_index.len() >= self.limits.max_nodes {
            return Err(GraphError::CapacityExceeded {
                current: self.node_index.len(),
                max: self.limits.max_nodes,
                operation: "create_node",
            });
        }

        let id = draft.id.unwrap_or_else(|| self.ids.node_id());
        if self.node_index.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }

        let mut graph = self.graph.write().expect("graph lock poisoned");

        // Resolve the parent (if any) before touching anything.
        let parent = match &draft.parent_id {
            Some(pid) => {
                let idx = self
                    .node_index
                    .get(pid)
                    .map(|e| *e.value())
                    .ok_or_else(|| GraphError::NodeNotFound { id: pid.clone() })?;
                let depth = graph
                    .node_weight(idx)
                    .map(|n| n.depth)
                    .ok_or_else(|| GraphError::NodeNotFound { id: pid.clone() })?;
                Some((idx, depth + 1))
            }
            None => None,
        };

        let depth = parent.map(|(_, d)| d).unwrap_or(0);
        if depth > self.limits.max_depth {
            return Err(GraphError::InvalidDepth {
                node_id: id,
                depth,
                max_depth: self.limits.max_depth,
            });
        }

        let node = ReasoningNode {
            id: id.clone(),
            content: draft.content,
            node_type: draft.node_type.unwrap_or(NodeType::Concept),
            depth,
            parent_id: draft.parent_id.clone(),
            children: Default::default(),
            incoming: Default::default(),
            outgoing: Default::default(),
            scores: NodeScores {
                confidence: draft.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                ..Default::default()
            },
            metadata: NodeMetadata {
                created_in_pass: draft.created_in_pass,
                last_modified: unix_now(),
                tags: draft.tags,
                pattern_used: draft.pattern_used,
                selected: false,
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            },
        };

        let idx = graph.add_node(node);
        if let Some((parent_idx, _)) = parent
            && let Some(parent_node) = graph.node_weight_mut(parent_idx)
        {
            parent_node.children.insert(id.clone());
        }
        drop(graph);

        self.node_index.insert(id.clone(), idx);
        Ok(id)
    }

    /// Merge a patch into an existing node.
    ///
    /// Unlike removal, updating an unknown id is a hard failure. Reparenting
    /// keeps both children sets in sync, re-bases the moved subtree's depths,
    /// and rejects cycles and depth-ceiling violations before mutating.
    pub fn update_node(&self, id: &str, patch: NodePatch) -> GraphResult<()> {
        let idx = self
            .node_index
            .get(id)
            .map(|e| *e.value())
            .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?;

        let mut graph = self.graph.write().expect("graph lock poisoned");

        // Validate the reparent fully before applying any field.
        let reparent = match &patch.parent {
            Some(new_parent) => Some(self.validate_reparent(&graph, id, idx, new_parent.as_deref())?),
            None => None,
        };

        let node = graph
            .node_weight_mut(idx)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?;

        if let Some(content) = patch.content {
            node.content = content;
        }
        if let Some(node_type) = patch.node_type {
            node.node_type = node_type;
        }
        if let Some(confidence) = patch.confidence {
            node.scores.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(centrality) = patch.centrality {
            node.scores.centrality = centrality.max(0.0);
        }
        if let Some(selected) = patch.selected {
            node.metadata.selected = selected;
        }
        if let Some(tags) = patch.tags {
            node.metadata.tags = tags;
        }
        if let Some(pattern) = patch.pattern_used {
            node.metadata.pattern_used = Some(pattern);
        }
        for (pass, score) in patch.pass_scores {
            node.scores.pass_scores.insert(pass, score);
        }
        node.metadata.last_modified = unix_now();

        if let Some((old_parent_idx, new_parent, new_depth)) = reparent {
            if let Some(node) = graph.node_weight_mut(idx) {
                node.parent_id = new_parent.as_ref().map(|(pid, _)| pid.clone());
            }
            if let Some(old_idx) = old_parent_idx
                && let Some(old_parent) = graph.node_weight_mut(old_idx)
            {
                old_parent.children.remove(id);
            }
            if let Some((_, new_idx)) = &new_parent
                && let Some(parent_node) = graph.node_weight_mut(*new_idx)
            {
                parent_node.children.insert(id.to_string());
            }
            self.rebase_depths(&mut graph, idx, new_depth);
        }

        Ok(())
    }

    /// Remove a node, cascading to everything that references it.
    ///
    /// Every edge with this node as source or target is deleted, the id is
    /// dropped from its parent's children, and former children become depth-0
    /// orphans (their subtrees re-based; reparenting is the caller's call).
    /// Returns `false` when the id is unknown.
    pub fn remove_node(&self, id: &str) -> bool {
        let Some(idx) = self.node_index.get(id).map(|e| *e.value()) else {
            return false;
        };

        let mut graph = self.graph.write().expect("graph lock poisoned");
        let Some(node) = graph.node_weight(idx) else {
            return false;
        };

        let parent_id = node.parent_id.clone();
        let children: Vec<String> = node.children.iter().cloned().collect();
        // Union of both sets so a self-loop is handled once.
        let mut edge_ids: std::collections::BTreeSet<String> = node.incoming.clone();
        edge_ids.extend(node.outgoing.iter().cloned());

        // Detach cascade edges from their far endpoints first.
        for edge_id in &edge_ids {
            let Some(edge_idx) = self.edge_index.get(edge_id).map(|e| *e.value()) else {
                continue;
            };
            if let Some((src, tgt)) = graph.edge_endpoints(edge_idx) {
                for endpoint in [src, tgt] {
                    if endpoint != idx
                        && let Some(far) = graph.node_weight_mut(endpoint)
                    {
                        far.incoming.remove(edge_id);
                        far.outgoing.remove(edge_id);
                    }
                }
            }
            self.edge_index.remove(edge_id);
        }

        if let Some(pid) = &parent_id
            && let Some(parent_idx) = self.node_index.get(pid).map(|e| *e.value())
            && let Some(parent_node) = graph.node_weight_mut(parent_idx)
        {
            parent_node.children.remove(id);
        }

        for child_id in &children {
            let Some(child_idx) = self.node_index.get(child_id).map(|e| *e.value()) else {
                continue;
            };
            if let Some(child) = graph.node_weight_mut(child_idx) {
                child.parent_id = None;
                child.metadata.last_modified = unix_now();
            }
            self.rebase_depths(&mut graph, child_idx, 0);
        }

        // Removes the node and any incident edges still in the structure.
        graph.remove_node(idx);
        drop(graph);

        self.node_index.remove(id);
        tracing::debug!(
            graph_id = %self.graph_id,
            node_id = %id,
            cascaded_edges = edge_ids.len(),
            orphaned_children = children.len(),
            "removed node"
        );
        true
    }

    // -----------------------------------------------------------------------
    // Edge mutations
    // -----------------------------------------------------------------------

    /// Create an edge from a draft, returning its id.
    ///
    /// Both endpoints must already exist; this is a hard precondition, not a
    /// soft validation. Weights outside (0, 1] are rejected outright.
    pub fn create_edge(&self, draft: EdgeDraft) -> GraphResult<String> {
        if self.edge_index.len() >= self.limits.max_edges {
            return Err(GraphError::CapacityExceeded {
                current: self.edge_index.len(),
                max: self.limits.max_edges,
                operation: "create_edge",
            });
        }

        let id = draft.id.unwrap_or_else(|| self.ids.edge_id());
        if self.edge_index.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }

        if !(draft.weight > 0.0 && draft.weight <= 1.0) {
            return Err(GraphError::InvalidWeight { value: draft.weight });
        }

        let source_idx = self
            .node_index
            .get(&draft.source_id)
            .map(|e| *e.value())
            .ok_or_else(|| GraphError::OrphanEdge {
                edge_id: id.clone(),
                node_id: draft.source_id.clone(),
            })?;
        let target_idx = self
            .node_index
            .get(&draft.target_id)
            .map(|e| *e.value())
            .ok_or_else(|| GraphError::OrphanEdge {
                edge_id: id.clone(),
                node_id: draft.target_id.clone(),
            })?;

        let edge = ReasoningEdge {
            id: id.clone(),
            source_id: draft.source_id,
            target_id: draft.target_id,
            edge_type: draft.edge_type,
            weight: draft.weight,
            metadata: EdgeMetadata {
                created_in_pass: draft.created_in_pass,
                confidence: draft.confidence.unwrap_or(draft.weight).clamp(0.0, 1.0),
                justification: draft.justification,
                bidirectional: draft.bidirectional,
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            },
        };

        let mut graph = self.graph.write().expect("graph lock poisoned");
        let edge_idx = graph.add_edge(source_idx, target_idx, edge);
        if source_idx == target_idx {
            if let Some(node) = graph.node_weight_mut(source_idx) {
                node.outgoing.insert(id.clone());
                node.incoming.insert(id.clone());
            }
        } else {
            if let Some(source) = graph.node_weight_mut(source_idx) {
                source.outgoing.insert(id.clone());
            }
            if let Some(target) = graph.node_weight_mut(target_idx) {
                target.incoming.insert(id.clone());
            }
        }
        drop(graph);

        self.edge_index.insert(id.clone(), edge_idx);
        Ok(id)
    }

    /// Remove an edge, detaching it from both endpoints' edge sets.
    /// Returns `false` when the id is unknown.
    pub fn remove_edge(&self, id: &str) -> bool {
        let Some(edge_idx) = self.edge_index.get(id).map(|e| *e.value()) else {
            return false;
        };

        let mut graph = self.graph.write().expect("graph lock poisoned");
        if let Some((src, tgt)) = graph.edge_endpoints(edge_idx) {
            for endpoint in [src, tgt] {
                if let Some(node) = graph.node_weight_mut(endpoint) {
                    node.incoming.remove(id);
                    node.outgoing.remove(id);
                }
            }
        }
        graph.remove_edge(edge_idx);
        drop(graph);

        self.edge_index.remove(id);
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up a node by id. Pure lookup, no side effects.
    pub fn get_node(&self, id: &str) -> Option<ReasoningNode> {
        let idx = self.node_index.get(id).map(|e| *e.value())?;
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.node_weight(idx).cloned()
    }

    /// Look up an edge by id.
    pub fn get_edge(&self, id: &str) -> Option<ReasoningEdge> {
        let idx = self.edge_index.get(id).map(|e| *e.value())?;
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.edge_weight(idx).cloned()
    }

    /// All nodes in insertion order.
    pub fn all_nodes(&self) -> Vec<ReasoningNode> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut nodes: Vec<ReasoningNode> = graph.node_weights().cloned().collect();
        nodes.sort_by_key(|n| n.metadata.sequence);
        nodes
    }

    /// All edges in insertion order.
    pub fn all_edges(&self) -> Vec<ReasoningEdge> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut edges: Vec<ReasoningEdge> = graph.edge_weights().cloned().collect();
        edges.sort_by_key(|e| e.metadata.sequence);
        edges
    }

    /// Edges leaving the given node, in insertion order. Empty for unknown ids.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<ReasoningEdge> {
        self.directed_edges(node_id, Direction::Outgoing)
    }

    /// Edges targeting the given node, in insertion order. Empty for unknown ids.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<ReasoningEdge> {
        self.directed_edges(node_id, Direction::Incoming)
    }

    fn directed_edges(&self, node_id: &str, direction: Direction) -> Vec<ReasoningEdge> {
        let Some(idx) = self.node_index.get(node_id).map(|e| *e.value()) else {
            return vec![];
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut edges: Vec<ReasoningEdge> = graph
            .edges_directed(idx, direction)
            .map(|e| e.weight().clone())
            .collect();
        edges.sort_by_key(|e| e.metadata.sequence);
        edges
    }

    /// Check if a node exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Check if an edge exists.
    pub fn has_edge(&self, id: &str) -> bool {
        self.edge_index.contains_key(id)
    }

    /// Check whether any edge connects the two nodes, in either direction.
    pub fn has_edge_between(&self, a: &str, b: &str) -> bool {
        let (Some(a_idx), Some(b_idx)) = (
            self.node_index.get(a).map(|e| *e.value()),
            self.node_index.get(b).map(|e| *e.value()),
        ) else {
            return false;
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.find_edge(a_idx, b_idx).is_some() || graph.find_edge(b_idx, a_idx).is_some()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    /// Resource limits for the active tier.
    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// The deployment tier this graph was opened under.
    pub fn tier(&self) -> DeploymentTier {
        self.tier
    }

    /// The session/graph id this store belongs to.
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Summarize the graph: counts per node type and mean confidence.
    pub fn info(&self) -> GraphInfo {
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut by_type = [0usize; 5];
        let mut confidence_sum = 0.0;
        let node_count = graph.node_count();
        for node in graph.node_weights() {
            let slot = match node.node_type {
                NodeType::Subject => 0,
                NodeType::Concept => 1,
                NodeType::Evidence => 2,
                NodeType::Question => 3,
                NodeType::Insight => 4,
            };
            by_type[slot] += 1;
            confidence_sum += node.scores.confidence;
        }
        GraphInfo {
            graph_id: self.graph_id.clone(),
            tier: self.tier,
            nodes: node_count,
            edges: graph.edge_count(),
            subjects: by_type[0],
            concepts: by_type[1],
            evidence: by_type[2],
            questions: by_type[3],
            insights: by_type[4],
            mean_confidence: if node_count == 0 {
                0.0
            } else {
                confidence_sum / node_count as f64
            },
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Read access to the underlying structure for in-crate analyses.
    pub(crate) fn read_graph(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, StableDiGraph<ReasoningNode, ReasoningEdge>> {
        self.graph.read().expect("graph lock poisoned")
    }

    /// Resolve a node id to its structural index.
    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).map(|e| *e.value())
    }

    /// Install a fully-formed node during snapshot restore. The caller has
    /// already validated ids, parent links, and set consistency.
    pub(crate) fn install_node(&self, node: ReasoningNode) {
        let seq = node.metadata.sequence;
        let id = node.id.clone();
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let idx = graph.add_node(node);
        drop(graph);
        self.node_index.insert(id, idx);
        self.sequence.fetch_max(seq + 1, Ordering::Relaxed);
    }

    /// Install a fully-formed edge during snapshot restore. Endpoints must
    /// already be installed.
    pub(crate) fn install_edge(&self, edge: ReasoningEdge) -> GraphResult<()> {
        let seq = edge.metadata.sequence;
        let id = edge.id.clone();
        let source_idx = self.index_of(&edge.source_id).ok_or_else(|| GraphError::OrphanEdge {
            edge_id: id.clone(),
            node_id: edge.source_id.clone(),
        })?;
        let target_idx = self.index_of(&edge.target_id).ok_or_else(|| GraphError::OrphanEdge {
            edge_id: id.clone(),
            node_id: edge.target_id.clone(),
        })?;
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let edge_idx = graph.add_edge(source_idx, target_idx, edge);
        drop(graph);
        self.edge_index.insert(id, edge_idx);
        self.sequence.fetch_max(seq + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Validate a reparent request without mutating.
    ///
    /// Returns the old parent's index, the resolved new parent, and the
    /// node's new depth.
    #[allow(clippy::type_complexity)]
    fn validate_reparent(
        &self,
        graph: &StableDiGraph<ReasoningNode, ReasoningEdge>,
        id: &str,
        idx: NodeIndex,
        new_parent: Option<&str>,
    ) -> GraphResult<(Option<NodeIndex>, Option<(String, NodeIndex)>, u32)> {
        let old_parent_idx = graph
            .node_weight(idx)
            .and_then(|n| n.parent_id.as_ref())
            .and_then(|pid| self.node_index.get(pid).map(|e| *e.value()));

        let resolved = match new_parent {
            None => None,
            Some(pid) => {
                if pid == id {
                    return Err(GraphError::CircularParent { node_id: id.into() });
                }
                let parent_idx = self
                    .node_index
                    .get(pid)
                    .map(|e| *e.value())
                    .ok_or_else(|| GraphError::NodeNotFound { id: pid.into() })?;

                // The new parent must not descend from the node being moved.
                let mut cursor = graph.node_weight(parent_idx).and_then(|n| n.parent_id.clone());
                while let Some(ancestor) = cursor {
                    if ancestor == id {
                        return Err(GraphError::CircularParent { node_id: id.into() });
                    }
                    cursor = self
                        .node_index
                        .get(&ancestor)
                        .map(|e| *e.value())
                        .and_then(|a| graph.node_weight(a))
                        .and_then(|n| n.parent_id.clone());
                }
                Some((pid.to_string(), parent_idx))
            }
        };

        let new_depth = match &resolved {
            Some((_, parent_idx)) => {
                graph
                    .node_weight(*parent_idx)
                    .map(|n| n.depth)
                    .ok_or_else(|| GraphError::NodeNotFound {
                        id: new_parent.unwrap_or_default().into(),
                    })?
                    + 1
            }
            None => 0,
        };

        // The deepest descendant after the move must stay under the ceiling.
        let deepest = new_depth + self.subtree_height(graph, idx);
        if deepest > self.limits.max_depth {
            return Err(GraphError::InvalidDepth {
                node_id: id.into(),
                depth: deepest,
                max_depth: self.limits.max_depth,
            });
        }

        Ok((old_parent_idx, resolved, new_depth))
    }

    /// Height of the subtree rooted at `idx` (0 for a leaf).
    fn subtree_height(
        &self,
        graph: &StableDiGraph<ReasoningNode, ReasoningEdge>,
        idx: NodeIndex,
    ) -> u32 {
        let mut height = 0;
        let mut frontier = vec![(idx, 0u32)];
        while let Some((cursor, level)) = frontier.pop() {
            height = height.max(level);
            if let Some(node) = graph.node_weight(cursor) {
                for child_id in &node.children {
                    if let Some(child_idx) = self.node_index.get(child_id).map(|e| *e.value()) {
                        frontier.push((child_idx, level + 1));
                    }
                }
            }
        }
        height
    }

    /// Set `idx`'s depth and re-derive every descendant as parent + 1.
    fn rebase_depths(
        &self,
        graph: &mut StableDiGraph<ReasoningNode, ReasoningEdge>,
        idx: NodeIndex,
        depth: u32,
    ) {
        let mut frontier = vec![(idx, depth)];
        while let Some((cursor, level)) = frontier.pop() {
            let children: Vec<String> = match graph.node_weight_mut(cursor) {
                Some(node) => {
                    node.depth = level;
                    node.children.iter().cloned().collect()
                }
                None => continue,
            };
            for child_id in children {
                if let Some(child_idx) = self.node_index.get(&child_id).map(|e| *e.value()) {
                    frontier.push((child_idx, level + 1));
                }
            }
        }
    }
}

impl std::fmt::Debug for ReasoningGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningGraph")
            .field("graph_id", &self.graph_id)
            .field("tier", &self.tier)
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

/// Summary information about a graph's contents.
#[derive(Debug, Clone)]
pub struct GraphInfo {
    pub graph_id: String,
    pub tier: DeploymentTier,
    pub nodes: usize,
    pub edges: usize,
    pub subjects: usize,
    pub concepts: usize,
    pub evidence: usize,
    pub questions: usize,
    pub insights: usize,
    pub mean_confidence: f64,
}

impl std::fmt::Display for GraphInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "reasoning graph {}", self.graph_id)?;
        writeln!(f, "  tier:         {}", self.tier)?;
        writeln!(f, "  nodes:        {}", self.nodes)?;
        writeln!(f, "  edges:        {}", self.edges)?;
        writeln!(
            f,
            "  by type:      {} subject / {} concept / {} evidence / {} question / {} insight",
            self.subjects, self.concepts, self.evidence, self.questions, self.insights
        )?;
        writeln!(f, "  confidence:   {:.3} mean", self.mean_confidence)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeType;

    fn dev_graph() -> ReasoningGraph {
        ReasoningGraph::new("test-session", DeploymentTier::Development)
    }

    fn node(g: &ReasoningGraph, id: &str) -> String {
        g.create_node(NodeDraft::new(format!("content of {id}")).with_id(id))
            .unwrap()
    }

    #[test]
    fn create_and_get() {
        let g = dev_graph();
        let id = g
            .create_node(
                NodeDraft::new("the ocean stores most excess heat")
                    .with_type(NodeType::Evidence)
                    .with_confidence(0.9),
            )
            .unwrap();

        assert!(id.starts_with("node-"));
        let fetched = g.get_node(&id).unwrap();
        assert_eq!(fetched.node_type, NodeType::Evidence);
        assert_eq!(fetched.depth, 0);
        assert!((fetched.scores.confidence - 0.9).abs() < f64::EPSILON);
        assert!(g.has_node(&id));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn defaults_applied() {
        let g = dev_graph();
        let id = g.create_node(NodeDraft::new("bare")).unwrap();
        let n = g.get_node(&id).unwrap();
        assert_eq!(n.node_type, NodeType::Concept);
        assert_eq!(n.depth, 0);
        assert!((n.scores.confidence - 0.5).abs() < f64::EPSILON);
        assert!(n.parent_id.is_none());
        assert!(n.children.is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let g = dev_graph();
        node(&g, "a");
        let err = g.create_node(NodeDraft::new("again").with_id("a")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId { .. }));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn parent_child_sync() {
        let g = dev_graph();
        node(&g, "root");
        let child = g
            .create_node(NodeDraft::new("child").with_parent("root"))
            .unwrap();

        let root = g.get_node("root").unwrap();
        assert!(root.children.contains(&child));
        let child = g.get_node(&child).unwrap();
        assert_eq!(child.parent_id.as_deref(), Some("root"));
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn missing_parent_rejected() {
        let g = dev_graph();
        let err = g
            .create_node(NodeDraft::new("x").with_parent("ghost"))
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn depth_ceiling_enforced() {
        let g = dev_graph();
        let mut parent = node(&g, "d0");
        // Development allows depth up to 10.
        for level in 1..=10 {
            parent = g
                .create_node(NodeDraft::new(format!("d{level}")).with_parent(&parent))
                .unwrap();
        }
        let err = g
            .create_node(NodeDraft::new("too deep").with_parent(&parent))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidDepth { depth: 11, .. }));
    }

    #[test]
    fn node_capacity_strict() {
        let g = dev_graph();
        let max = g.limits().max_nodes;
        for i in 0..max {
            g.create_node(NodeDraft::new(format!("n{i}"))).unwrap();
        }
        let err = g.create_node(NodeDraft::new("one too many")).unwrap_err();
        assert!(matches!(
            err,
            GraphError::CapacityExceeded { operation: "create_node", .. }
        ));
        assert_eq!(g.node_count(), max);
    }

    #[test]
    fn edge_weight_domain() {
        let g = dev_graph();
        node(&g, "a");
        node(&g, "b");
        for bad in [0.0, -0.4, 1.2, f64::NAN] {
            let err = g
                .create_edge(EdgeDraft::new("a", "b", EdgeType::Supports, bad))
                .unwrap_err();
            assert!(matches!(err, GraphError::InvalidWeight { .. }), "weight {bad}");
        }
        assert_eq!(g.edge_count(), 0);

        // Boundary: exactly 1.0 is valid.
        g.create_edge(EdgeDraft::new("a", "b", EdgeType::Supports, 1.0))
            .unwrap();
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn orphan_edge_rejected() {
        let g = dev_graph();
        node(&g, "a");
        let err = g
            .create_edge(EdgeDraft::new("a", "ghost", EdgeType::RelatesTo, 0.5))
            .unwrap_err();
        assert!(matches!(err, GraphError::OrphanEdge { .. }));
        let err = g
            .create_edge(EdgeDraft::new("ghost", "a", EdgeType::RelatesTo, 0.5))
            .unwrap_err();
        assert!(matches!(err, GraphError::OrphanEdge { .. }));
    }

    #[test]
    fn edge_updates_endpoint_sets() {
        let g = dev_graph();
        node(&g, "a");
        node(&g, "b");
        let e = g
            .create_edge(EdgeDraft::new("a", "b", EdgeType::LeadsTo, 0.8))
            .unwrap();

        assert!(g.get_node("a").unwrap().outgoing.contains(&e));
        assert!(g.get_node("b").unwrap().incoming.contains(&e));
        assert_eq!(g.outgoing_edges("a").len(), 1);
        assert_eq!(g.incoming_edges("b").len(), 1);
        assert!(g.has_edge_between("a", "b"));
        assert!(g.has_edge_between("b", "a")); // either direction
    }

    #[test]
    fn remove_edge_detaches() {
        let g = dev_graph();
        node(&g, "a");
        node(&g, "b");
        let e = g
            .create_edge(EdgeDraft::new("a", "b", EdgeType::Supports, 0.7))
            .unwrap();

        assert!(g.remove_edge(&e));
        assert!(!g.remove_edge(&e)); // already gone: no-op, not an error
        assert!(g.get_node("a").unwrap().outgoing.is_empty());
        assert!(g.get_node("b").unwrap().incoming.is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn remove_node_cascades() {
        let g = dev_graph();
        node(&g, "hub");
        node(&g, "x");
        let child = g
            .create_node(NodeDraft::new("child").with_parent("hub"))
            .unwrap();
        let grandchild = g
            .create_node(NodeDraft::new("grandchild").with_parent(&child))
            .unwrap();
        g.create_edge(EdgeDraft::new("hub", "x", EdgeType::LeadsTo, 0.8))
            .unwrap();
        g.create_edge(EdgeDraft::new("x", "hub", EdgeType::Supports, 0.6))
            .unwrap();

        assert!(g.remove_node("hub"));
        assert!(!g.remove_node("hub"));
        assert_eq!(g.edge_count(), 0);
        assert!(g.get_node("x").unwrap().incoming.is_empty());
        assert!(g.get_node("x").unwrap().outgoing.is_empty());

        // The former child is now a depth-0 orphan, its subtree re-based.
        let child = g.get_node(&child).unwrap();
        assert!(child.parent_id.is_none());
        assert_eq!(child.depth, 0);
        assert_eq!(g.get_node(&grandchild).unwrap().depth, 1);
    }

    #[test]
    fn update_merges_fields() {
        let g = dev_graph();
        node(&g, "a");
        g.update_node(
            "a",
            NodePatch::new()
                .content("revised")
                .node_type(NodeType::Insight)
                .confidence(2.0) // clamped
                .selected(true)
                .pass_score("synthesis", 0.72),
        )
        .unwrap();

        let n = g.get_node("a").unwrap();
        assert_eq!(n.content, "revised");
        assert_eq!(n.node_type, NodeType::Insight);
        assert!((n.scores.confidence - 1.0).abs() < f64::EPSILON);
        assert!(n.metadata.selected);
        assert_eq!(n.scores.pass_scores.get("synthesis"), Some(&0.72));
    }

    #[test]
    fn update_unknown_is_hard_failure() {
        let g = dev_graph();
        let err = g.update_node("ghost", NodePatch::new().selected(true)).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
    }

    #[test]
    fn reparent_moves_subtree() {
        let g = dev_graph();
        node(&g, "old-root");
        node(&g, "new-root");
        let mid = g
            .create_node(NodeDraft::new("mid").with_parent("old-root"))
            .unwrap();
        let leaf = g
            .create_node(NodeDraft::new("leaf").with_parent(&mid))
            .unwrap();

        g.update_node(&mid, NodePatch::new().reparent("new-root")).unwrap();

        assert!(!g.get_node("old-root").unwrap().children.contains(&mid));
        assert!(g.get_node("new-root").unwrap().children.contains(&mid));
        assert_eq!(g.get_node(&mid).unwrap().depth, 1);
        assert_eq!(g.get_node(&leaf).unwrap().depth, 2);

        g.update_node(&mid, NodePatch::new().detach()).unwrap();
        assert_eq!(g.get_node(&mid).unwrap().depth, 0);
        assert_eq!(g.get_node(&leaf).unwrap().depth, 1);
        assert!(g.get_node(&mid).unwrap().parent_id.is_none());
    }

    #[test]
    fn circular_parent_rejected() {
        let g = dev_graph();
        node(&g, "a");
        let b = g.create_node(NodeDraft::new("b").with_parent("a")).unwrap();
        let c = g.create_node(NodeDraft::new("c").with_parent(&b)).unwrap();

        let err = g.update_node("a", NodePatch::new().reparent(&c)).unwrap_err();
        assert!(matches!(err, GraphError::CircularParent { .. }));
        let err = g.update_node("a", NodePatch::new().reparent("a")).unwrap_err();
        assert!(matches!(err, GraphError::CircularParent { .. }));
        // State unchanged.
        assert_eq!(g.get_node(&c).unwrap().depth, 2);
    }

    #[test]
    fn insertion_order_listing() {
        let g = dev_graph();
        node(&g, "first");
        node(&g, "second");
        node(&g, "third");
        g.remove_node("second");
        node(&g, "fourth");

        let ids: Vec<String> = g.all_nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["first", "third", "fourth"]);
    }

    #[test]
    fn info_summarizes() {
        let g = dev_graph();
        g.create_node(NodeDraft::new("s").with_type(NodeType::Subject))
            .unwrap();
        g.create_node(NodeDraft::new("e").with_type(NodeType::Evidence))
            .unwrap();
        g.create_node(NodeDraft::new("c")).unwrap();

        let info = g.info();
        assert_eq!(info.nodes, 3);
        assert_eq!(info.subjects, 1);
        assert_eq!(info.evidence, 1);
        assert_eq!(info.concepts, 1);
        assert!((info.mean_confidence - 0.5).abs() < 1e-9);
        assert!(info.to_string().contains("tier"));
    }
}
