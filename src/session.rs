//! Session binding: one reasoning graph per logical session or graph id.
//!
//! The [`SessionRegistry`] is an explicit context object — construction and
//! teardown belong to whoever owns the session, and nothing here is global.
//! Graphs are created lazily on first access and never evicted automatically;
//! session-level timeouts are the caller's concern.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{SessionError, SessionResult};
use crate::graph::store::ReasoningGraph;
use crate::limits::DeploymentTier;

/// Registry mapping session/graph ids to their graph stores.
pub struct SessionRegistry {
    tier: DeploymentTier,
    graphs: DashMap<String, Arc<ReasoningGraph>>,
}

impl SessionRegistry {
    /// Create a registry whose graphs all open under the given tier.
    pub fn new(tier: DeploymentTier) -> Self {
        tracing::info!(tier = %tier, "creating session registry");
        Self {
            tier,
            graphs: DashMap::new(),
        }
    }

    /// Get the graph for an id, creating it on first access.
    ///
    /// Idempotent per id: repeated calls return the same store.
    pub fn open(&self, id: &str) -> Arc<ReasoningGraph> {
        self.graphs
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(ReasoningGraph::new(id, self.tier)))
            .clone()
    }

    /// Get the graph for an id without creating it.
    pub fn get(&self, id: &str) -> Option<Arc<ReasoningGraph>> {
        self.graphs.get(id).map(|e| e.value().clone())
    }

    /// Swap in a replacement graph under the given id, returning the handle.
    ///
    /// This is the restore half of the snapshot/rollback pattern: callers
    /// doing all-or-nothing batches serialize first, mutate, and on failure
    /// replace the session's graph with one rebuilt from the snapshot.
    pub fn replace(&self, id: &str, graph: ReasoningGraph) -> Arc<ReasoningGraph> {
        let handle = Arc::new(graph);
        self.graphs.insert(id.to_string(), handle.clone());
        handle
    }

    /// Drop the graph registered under an id. Returns `false` when absent.
    pub fn remove(&self, id: &str) -> bool {
        self.graphs.remove(id).is_some()
    }

    /// Serialize the graph registered under an id.
    pub fn serialize_graph(&self, id: &str) -> SessionResult<String> {
        let graph = self
            .get(id)
            .ok_or_else(|| SessionError::UnknownGraph { id: id.into() })?;
        Ok(graph.serialize()?)
    }

    /// Rebuild a graph from a snapshot and register it under the given id.
    ///
    /// The snapshot is validated in full before anything is installed; a
    /// previously registered graph under this id is only replaced on success.
    pub fn restore_graph(&self, id: &str, snapshot: &str) -> SessionResult<Arc<ReasoningGraph>> {
        let graph = ReasoningGraph::deserialize(snapshot)?;
        Ok(self.replace(id, graph))
    }

    /// Ids of all registered graphs.
    pub fn graph_ids(&self) -> Vec<String> {
        self.graphs.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered graphs.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the registry holds no graphs.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// The tier newly opened graphs are bound to.
    pub fn tier(&self) -> DeploymentTier {
        self.tier
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("tier", &self.tier)
            .field("graphs", &self.len())
            .finish()
    }
}
