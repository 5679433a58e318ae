//! Deployment tiers and the resource limits they grant.
//!
//! Every [`ReasoningGraph`](crate::graph::store::ReasoningGraph) is opened
//! under a tier that bounds how many nodes and edges it may hold and how deep
//! its parent/child tree may grow. The table is deterministic: the same tier
//! always yields the same limits.

use serde::{Deserialize, Serialize};

/// A named resource-limit profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentTier {
    /// Small graphs for local experimentation.
    Development,
    /// The default profile for interactive reasoning sessions.
    Standard,
    /// Large long-lived graphs.
    Production,
}

impl Default for DeploymentTier {
    fn default() -> Self {
        DeploymentTier::Standard
    }
}

/// Maximum sizes granted by a [`DeploymentTier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of nodes. The check is strict: a graph already holding
    /// `max_nodes` nodes rejects the next insertion.
    pub max_nodes: usize,
    /// Maximum number of edges, checked the same way.
    pub max_edges: usize,
    /// Maximum parent/child tree depth (root nodes sit at depth 0).
    pub max_depth: u32,
}

impl DeploymentTier {
    /// Resolve this tier's limits.
    pub const fn limits(self) -> ResourceLimits {
        match self {
            DeploymentTier::Development => ResourceLimits {
                max_nodes: 500,
                max_edges: 2_500,
                max_depth: 10,
            },
            DeploymentTier::Standard => ResourceLimits {
                max_nodes: 5_000,
                max_edges: 25_000,
                max_depth: 20,
            },
            DeploymentTier::Production => ResourceLimits {
                max_nodes: 50_000,
                max_edges: 250_000,
                max_depth: 32,
            },
        }
    }
}

impl std::fmt::Display for DeploymentTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentTier::Development => write!(f, "development"),
            DeploymentTier::Standard => write!(f, "standard"),
            DeploymentTier::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for DeploymentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DeploymentTier::Development),
            "standard" => Ok(DeploymentTier::Standard),
            "production" | "prod" => Ok(DeploymentTier::Production),
            other => Err(format!(
                "unknown deployment tier \"{other}\" (expected development, standard, or production)"
            )),
        }
    }
}
