//! Knowledge-gap detection: surfaces weak spots in a reasoning graph.
//!
//! Four independent scans, combined into one priority-sorted report:
//!
//! - **Missing links** — tag-sharing node pairs with no edge between them
//! - **Weak evidence** — nodes whose confidence falls below 0.3
//! - **Contradictions** — every `contradicts` edge, weighted by its strength
//! - **Isolated clusters** — clusters with no edge leaving them
//!
//! Gaps are *reported*, not repaired. The caller decides how to proceed
//! (connect, prune, gather more evidence). Gaps from different categories
//! are not deduplicated against each other.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AlgoResult;

use super::EdgeType;
use super::analytics::detect_clusters;
use super::store::ReasoningGraph;

/// Priority contributed per shared tag on an unlinked pair.
const MISSING_LINK_PRIORITY_PER_TAG: f64 = 0.3;
/// Nodes below this confidence are flagged as weak evidence.
const WEAK_EVIDENCE_THRESHOLD: f64 = 0.3;
const WEAK_EVIDENCE_PRIORITY: f64 = 0.5;
const ISOLATED_CLUSTER_PRIORITY: f64 = 0.4;

/// Category of a detected gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapKind {
    MissingLink,
    WeakEvidence,
    Contradiction,
    IsolatedCluster,
}

impl std::fmt::Display for GapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapKind::MissingLink => write!(f, "missing-link"),
            GapKind::WeakEvidence => write!(f, "weak-evidence"),
            GapKind::Contradiction => write!(f, "contradiction"),
            GapKind::IsolatedCluster => write!(f, "isolated-cluster"),
        }
    }
}

/// A detected weak spot in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGap {
    pub kind: GapKind,
    /// Nodes involved in the gap.
    pub node_ids: Vec<String>,
    /// Relative urgency; the report is sorted by this, descending.
    pub priority: f64,
    /// Human-readable summary of what is missing or suspect.
    pub description: String,
}

/// Scan the graph for knowledge gaps across all four categories.
///
/// The missing-link scan compares every node pair and is O(N²); callers
/// running it on graphs near the capacity ceiling should expect that cost.
pub fn identify_gaps(kg: &ReasoningGraph) -> AlgoResult<Vec<KnowledgeGap>> {
    let nodes = kg.all_nodes();
    let mut gaps: Vec<KnowledgeGap> = Vec::new();

    // Missing links: unordered pairs sharing at least one tag, unconnected in
    // either direction. The pairwise scan is the expensive part, so it runs
    // across threads; edge lookups only take shared read locks.
    let missing: Vec<KnowledgeGap> = nodes
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, a)| {
            nodes[i + 1..].iter().filter_map(move |b| {
                if a.metadata.tags.is_empty() {
                    return None;
                }
                let shared = a.metadata.tags.intersection(&b.metadata.tags).count();
                if shared == 0 || kg.has_edge_between(&a.id, &b.id) {
                    return None;
                }
                Some(KnowledgeGap {
                    kind: GapKind::MissingLink,
                    node_ids: vec![a.id.clone(), b.id.clone()],
                    priority: MISSING_LINK_PRIORITY_PER_TAG * shared as f64,
                    description: format!(
                        "nodes share {shared} tag(s) but have no connecting edge"
                    ),
                })
            })
        })
        .collect();
    gaps.extend(missing);

    for node in &nodes {
        if node.scores.confidence < WEAK_EVIDENCE_THRESHOLD {
            gaps.push(KnowledgeGap {
                kind: GapKind::WeakEvidence,
                node_ids: vec![node.id.clone()],
                priority: WEAK_EVIDENCE_PRIORITY,
                description: format!(
                    "confidence {:.2} is below the {WEAK_EVIDENCE_THRESHOLD} evidence threshold",
                    node.scores.confidence
                ),
            });
        }
    }

    for edge in kg.all_edges() {
        if edge.edge_type == EdgeType::Contradicts {
            gaps.push(KnowledgeGap {
                kind: GapKind::Contradiction,
                node_ids: vec![edge.source_id.clone(), edge.target_id.clone()],
                priority: edge.weight,
                description: format!(
                    "unresolved contradiction between {} and {}",
                    edge.source_id, edge.target_id
                ),
            });
        }
    }

    for cluster in detect_clusters(kg)? {
        let mut escapes = false;
        'members: for member in &cluster.node_ids {
            for edge in kg
                .outgoing_edges(member)
                .into_iter()
                .chain(kg.incoming_edges(member))
            {
                let far = if edge.source_id == *member {
                    &edge.target_id
                } else {
                    &edge.source_id
                };
                if !cluster.node_ids.contains(far) {
                    escapes = true;
                    break 'members;
                }
            }
        }
        if !escapes {
            let size = cluster.node_ids.len();
            gaps.push(KnowledgeGap {
                kind: GapKind::IsolatedCluster,
                node_ids: cluster.node_ids.into_iter().collect(),
                priority: ISOLATED_CLUSTER_PRIORITY,
                description: format!(
                    "cluster of {size} node(s) has no edges to the rest of the graph"
                ),
            });
        }
    }

    gaps.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(gaps)
}
