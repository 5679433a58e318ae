//! Reasoning graph: data model, bounded store, and analyses.
//!
//! A graph holds [`ReasoningNode`]s (units of reasoning content: subjects,
//! evidence, insights, ...) connected by typed, weighted [`ReasoningEdge`]s.
//!
//! - **Store** ([`store::ReasoningGraph`]): capacity-bounded container with
//!   integrity enforcement and adjacency queries
//! - **Analyses** ([`analytics`], [`gaps`], [`traverse`]): read-only
//!   centrality, clustering, path, gap-detection, and traversal passes
//! - **Snapshots** ([`snapshot`]): complete JSON serialization with strict
//!   re-validation on load

pub mod analytics;
pub mod gaps;
pub mod snapshot;
pub mod store;
pub mod traverse;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Classification of a node in the reasoning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A topic under investigation.
    Subject,
    /// A general concept; the default for untyped nodes.
    Concept,
    /// Supporting or refuting material.
    Evidence,
    /// An open question.
    Question,
    /// A derived conclusion.
    Insight,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Subject => write!(f, "subject"),
            NodeType::Concept => write!(f, "concept"),
            NodeType::Evidence => write!(f, "evidence"),
            NodeType::Question => write!(f, "question"),
            NodeType::Insight => write!(f, "insight"),
        }
    }
}

/// Classification of a directed relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    Supports,
    Contradicts,
    Refines,
    Questions,
    LeadsTo,
    RelatesTo,
    DerivedFrom,
    ClustersWith,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeType::Supports => write!(f, "supports"),
            EdgeType::Contradicts => write!(f, "contradicts"),
            EdgeType::Refines => write!(f, "refines"),
            EdgeType::Questions => write!(f, "questions"),
            EdgeType::LeadsTo => write!(f, "leads-to"),
            EdgeType::RelatesTo => write!(f, "relates-to"),
            EdgeType::DerivedFrom => write!(f, "derived-from"),
            EdgeType::ClustersWith => write!(f, "clusters-with"),
        }
    }
}

/// Numeric scores attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScores {
    /// Caller-supplied confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Last centrality score written back by a caller. Advisory only:
    /// [`analytics::compute_centrality`] output is the source of truth.
    pub centrality: f64,
    /// Per-pass scores, keyed by pass name.
    pub pass_scores: BTreeMap<String, f64>,
}

impl Default for NodeScores {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            centrality: 0.0,
            pass_scores: BTreeMap::new(),
        }
    }
}

/// Bookkeeping metadata attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Reasoning pass that created this node.
    pub created_in_pass: u32,
    /// Last mutation time (seconds since UNIX epoch).
    pub last_modified: u64,
    /// Free-form tags; shared tags drive missing-link gap detection.
    pub tags: BTreeSet<String>,
    /// Reasoning pattern that produced this node, if any.
    pub pattern_used: Option<String>,
    /// Whether a selection pass has marked this node.
    pub selected: bool,
    /// Creation sequence within the owning graph; orders listings.
    pub sequence: u64,
}

/// A unit of reasoning content in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningNode {
    /// Unique id, generated as `node-<ts>-<seq>` unless supplied. Immutable.
    pub id: String,
    /// Opaque text payload.
    pub content: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Distance from a root node; 0 for nodes with no parent.
    pub depth: u32,
    /// Weak back-reference to the owning parent, if any.
    pub parent_id: Option<String>,
    /// Ids of nodes whose `parent_id` is this node. Kept in sync by the store.
    pub children: BTreeSet<String>,
    /// Ids of edges targeting this node. Kept in sync by the store.
    pub incoming: BTreeSet<String>,
    /// Ids of edges leaving this node. Kept in sync by the store.
    pub outgoing: BTreeSet<String>,
    pub scores: NodeScores,
    pub metadata: NodeMetadata,
}

/// Bookkeeping metadata attached to an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Reasoning pass that created this edge.
    pub created_in_pass: u32,
    /// Confidence in the relationship, in [0.0, 1.0].
    pub confidence: f64,
    /// Free-text justification for asserting the relationship.
    pub justification: Option<String>,
    /// Whether the relationship is semantically symmetric. The edge itself
    /// stays directed; analyses that follow both directions do so regardless.
    pub bidirectional: bool,
    /// Creation sequence within the owning graph; orders listings.
    pub sequence: u64,
}

/// A typed, weighted, directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEdge {
    /// Unique id, generated as `edge-<ts>-<seq>` unless supplied. Immutable.
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Strength of the relationship, constrained to (0.0, 1.0].
    pub weight: f64,
    pub metadata: EdgeMetadata,
}

// ---------------------------------------------------------------------------
// Drafts and patches
// ---------------------------------------------------------------------------

/// Input for [`store::ReasoningGraph::create_node`]. Unset fields default.
#[derive(Debug, Clone, Default)]
pub struct NodeDraft {
    /// Explicit id; generated when `None`.
    pub id: Option<String>,
    pub content: String,
    /// Defaults to [`NodeType::Concept`].
    pub node_type: Option<NodeType>,
    /// Must already exist in the graph; the new node becomes its child.
    pub parent_id: Option<String>,
    /// Defaults to 0.5; clamped to [0.0, 1.0] at creation.
    pub confidence: Option<f64>,
    pub tags: BTreeSet<String>,
    pub created_in_pass: u32,
    pub pattern_used: Option<String>,
}

impl NodeDraft {
    /// Start a draft with the given content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Use an explicit id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    /// Attach the new node under an existing parent.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the confidence score (clamped to [0.0, 1.0] at creation).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_pass(mut self, pass: u32) -> Self {
        self.created_in_pass = pass;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern_used = Some(pattern.into());
        self
    }
}

/// Input for [`store::ReasoningGraph::create_edge`].
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    /// Explicit id; generated when `None`.
    pub id: Option<String>,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    /// Must lie in (0.0, 1.0].
    pub weight: f64,
    /// Defaults to the edge weight.
    pub confidence: Option<f64>,
    pub justification: Option<String>,
    pub bidirectional: bool,
    pub created_in_pass: u32,
}

impl EdgeDraft {
    /// Start a draft connecting `source` to `target`.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
        weight: f64,
    ) -> Self {
        Self {
            id: None,
            source_id: source.into(),
            target_id: target.into(),
            edge_type,
            weight,
            confidence: None,
            justification: None,
            bidirectional: false,
            created_in_pass: 0,
        }
    }

    /// Use an explicit id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    /// Mark the relationship as semantically symmetric.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    pub fn with_pass(mut self, pass: u32) -> Self {
        self.created_in_pass = pass;
        self
    }
}

/// Field-wise merge for [`store::ReasoningGraph::update_node`].
///
/// `None` leaves a field untouched. The node id is never patchable.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub content: Option<String>,
    pub node_type: Option<NodeType>,
    /// Clamped to [0.0, 1.0] on apply.
    pub confidence: Option<f64>,
    pub centrality: Option<f64>,
    pub selected: Option<bool>,
    /// Replaces the tag set wholesale when present.
    pub tags: Option<BTreeSet<String>>,
    pub pattern_used: Option<String>,
    /// Merged into the node's pass scores (existing keys overwritten).
    pub pass_scores: BTreeMap<String, f64>,
    /// Reparent: `Some(Some(id))` moves under `id`, `Some(None)` detaches to
    /// a depth-0 root, `None` leaves the parent link untouched.
    pub parent: Option<Option<String>>,
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn centrality(mut self, centrality: f64) -> Self {
        self.centrality = Some(centrality);
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern_used = Some(pattern.into());
        self
    }

    pub fn pass_score(mut self, pass: impl Into<String>, score: f64) -> Self {
        self.pass_scores.insert(pass.into(), score);
        self
    }

    /// Move the node under a new parent.
    pub fn reparent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent = Some(Some(parent_id.into()));
        self
    }

    /// Detach the node from its parent, making it a depth-0 root.
    pub fn detach(mut self) -> Self {
        self.parent = Some(None);
        self
    }
}

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

/// Thread-safe id generator producing `node-<ts>-<seq>` / `edge-<ts>-<seq>`.
///
/// The sequence component is process-wide and monotone, so ids stay unique
/// even when many are minted within the same second.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator that starts from sequence 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next node id.
    pub fn node_id(&self) -> String {
        format!("node-{}-{}", unix_now(), self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate the next edge id.
    pub fn edge_id(&self) -> String {
        format!("edge-{}-{}", unix_now(), self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the UNIX epoch.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_allocator_produces_unique_ids() {
        let alloc = IdAllocator::new();
        let a = alloc.node_id();
        let b = alloc.node_id();
        let e = alloc.edge_id();
        assert_ne!(a, b);
        assert!(a.starts_with("node-"));
        assert!(e.starts_with("edge-"));
    }

    #[test]
    fn node_draft_builders() {
        let draft = NodeDraft::new("climate evidence")
            .with_type(NodeType::Evidence)
            .with_confidence(0.8)
            .with_tag("climate")
            .with_tag("ocean")
            .with_pass(2);

        assert_eq!(draft.content, "climate evidence");
        assert_eq!(draft.node_type, Some(NodeType::Evidence));
        assert_eq!(draft.tags.len(), 2);
        assert_eq!(draft.created_in_pass, 2);
    }

    #[test]
    fn edge_draft_builders() {
        let draft = EdgeDraft::new("node-a", "node-b", EdgeType::Supports, 0.9)
            .with_justification("direct measurement")
            .bidirectional();

        assert_eq!(draft.source_id, "node-a");
        assert!(draft.bidirectional);
        assert!(draft.justification.is_some());
    }

    #[test]
    fn type_display_matches_wire_names() {
        assert_eq!(NodeType::Subject.to_string(), "subject");
        assert_eq!(EdgeType::LeadsTo.to_string(), "leads-to");
        assert_eq!(EdgeType::DerivedFrom.to_string(), "derived-from");
    }

    #[test]
    fn type_serde_matches_display() {
        let json = serde_json::to_string(&EdgeType::ClustersWith).unwrap();
        assert_eq!(json, "\"clusters-with\"");
        let json = serde_json::to_string(&NodeType::Insight).unwrap();
        assert_eq!(json, "\"insight\"");
    }

    #[test]
    fn default_scores() {
        let scores = NodeScores::default();
        assert!((scores.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(scores.centrality, 0.0);
        assert!(scores.pass_scores.is_empty());
    }
}
