//! Rich diagnostic error types for the noesis graph core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to recover.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the noesis crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum NoesisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Algorithm(#[from] AlgorithmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// Graph store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("capacity exceeded: {operation} would grow the graph past {max} (currently {current})")]
    #[diagnostic(
        code(noesis::graph::capacity_exceeded),
        help(
            "The deployment tier caps how many nodes and edges a graph may hold. \
             Prune entities you no longer need, or open the graph under a larger \
             tier. Nothing was added by the failed operation."
        )
    )]
    CapacityExceeded {
        current: usize,
        max: usize,
        operation: &'static str,
    },

    #[error("node not found: {id}")]
    #[diagnostic(
        code(noesis::graph::node_not_found),
        help(
            "No node with this id exists in the graph. Create it first, or check \
             that the id was not mistyped or removed by an earlier cascade."
        )
    )]
    NodeNotFound { id: String },

    #[error("edge not found: {id}")]
    #[diagnostic(
        code(noesis::graph::edge_not_found),
        help("No edge with this id exists in the graph. Verify the id is correct.")
    )]
    EdgeNotFound { id: String },

    #[error("invalid edge weight: {value} is outside (0, 1]")]
    #[diagnostic(
        code(noesis::graph::invalid_weight),
        help(
            "Edge weights must lie in the half-open interval (0, 1]. A zero or \
             negative weight has no meaning under the inverse-weight distance \
             metric, and weights above 1 are out of domain."
        )
    )]
    InvalidWeight { value: f64 },

    #[error("duplicate id: {id} already exists in the graph")]
    #[diagnostic(
        code(noesis::graph::duplicate_id),
        help(
            "Every node and edge id must be unique within its graph. Omit the id \
             from the draft to have one generated, or pick an unused id."
        )
    )]
    DuplicateId { id: String },

    #[error("orphan edge {edge_id}: references missing node {node_id}")]
    #[diagnostic(
        code(noesis::graph::orphan_edge),
        help(
            "An edge may only reference nodes that exist in the same graph. \
             This usually means a snapshot was hand-edited or truncated."
        )
    )]
    OrphanEdge { edge_id: String, node_id: String },

    #[error("circular parent link involving node {node_id}")]
    #[diagnostic(
        code(noesis::graph::circular_parent),
        help(
            "Parent links must form a forest. Reparenting a node under itself or \
             one of its own descendants is rejected."
        )
    )]
    CircularParent { node_id: String },

    #[error("invalid depth {depth} for node {node_id}: maximum tree depth is {max_depth}")]
    #[diagnostic(
        code(noesis::graph::invalid_depth),
        help(
            "The deployment tier bounds how deep the parent/child tree may grow, \
             and every node's depth must equal its parent's depth plus one. \
             Flatten the tree or open the graph under a larger tier."
        )
    )]
    InvalidDepth {
        node_id: String,
        depth: u32,
        max_depth: u32,
    },

    #[error("snapshot error: {message}")]
    #[diagnostic(
        code(noesis::graph::snapshot),
        help(
            "The snapshot could not be parsed or failed integrity validation. \
             Snapshots are only produced by `serialize()`; if this one was \
             stored externally, check that it was not corrupted in transit."
        )
    )]
    Snapshot { message: String },
}

// ---------------------------------------------------------------------------
// Algorithm errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AlgorithmError {
    #[error("unexpected state in {algorithm}: {message}")]
    #[diagnostic(
        code(noesis::algo::unexpected),
        help(
            "An analysis hit a state the store's invariants should make \
             impossible, most likely because the graph was mutated through a \
             concurrent writer without the single-writer discipline. The graph \
             itself was not modified; re-run the analysis on a quiesced graph."
        )
    )]
    Unexpected {
        algorithm: &'static str,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("unknown graph: {id}")]
    #[diagnostic(
        code(noesis::session::unknown_graph),
        help(
            "No graph with this id is registered in the session. `open()` the \
             graph first, or restore it from a snapshot."
        )
    )]
    UnknownGraph { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

/// Convenience alias for functions returning noesis results.
pub type NoesisResult<T> = std::result::Result<T, NoesisError>;

/// Result type for graph store operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for graph analyses.
pub type AlgoResult<T> = std::result::Result<T, AlgorithmError>;

/// Result type for session registry operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
