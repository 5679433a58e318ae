//! # noesis
//!
//! Session-scoped reasoning knowledge graphs: capacity-bounded stores with
//! typed, weighted edges, plus read-only analyses (centrality, clustering,
//! shortest paths, gap detection, diversity-aware selection) and complete
//! JSON snapshots.
//!
//! ## Architecture
//!
//! - **Limits** (`limits`): deployment tiers bounding graph size and depth
//! - **Graph** (`graph`): the data model, the bounded store, and the analyses
//! - **Sessions** (`session`): lazy per-id graph registry with
//!   serialize/restore hooks
//!
//! The store is a synchronous data structure with single-writer-at-a-time
//! semantics; analyses never mutate, so they can always run against a live
//! graph or a snapshot-restored copy.
//!
//! ## Library usage
//!
//! ```
//! use noesis::graph::{EdgeDraft, EdgeType, NodeDraft, NodeType};
//! use noesis::limits::DeploymentTier;
//! use noesis::session::SessionRegistry;
//!
//! let sessions = SessionRegistry::new(DeploymentTier::Standard);
//! let graph = sessions.open("demo");
//!
//! let subject = graph
//!     .create_node(NodeDraft::new("ocean heat uptake").with_type(NodeType::Subject))
//!     .unwrap();
//! let evidence = graph
//!     .create_node(NodeDraft::new("ARGO float data").with_type(NodeType::Evidence))
//!     .unwrap();
//! graph
//!     .create_edge(EdgeDraft::new(&evidence, &subject, EdgeType::Supports, 0.9))
//!     .unwrap();
//!
//! let centrality = noesis::graph::analytics::compute_centrality(&graph).unwrap();
//! assert_eq!(centrality.len(), 2);
//! ```

pub mod error;
pub mod graph;
pub mod limits;
pub mod session;

pub use error::{NoesisError, NoesisResult};
