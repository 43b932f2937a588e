//! Error types.
//!
//! Tree edits report `TreeError` to the caller. `LayoutError` never leaves
//! the layout engine: `compute_layout` turns it into a fallback result.

use thiserror::Error;

/// A rejected structural edit on a [`MindMap`](crate::tree::MindMap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("duplicate node id: {0}")]
    DuplicateId(String),

    #[error("node id must not be empty")]
    EmptyId,

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    #[error("moving {node} under {target} would create a cycle")]
    Cycle { node: String, target: String },
}

/// An internal layout fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("node under {parent} has an empty id")]
    EmptyId { parent: String },

    #[error("node id {0} appears more than once")]
    DuplicateId(String),

    #[error("non-finite position computed for {id}")]
    NonFinite { id: String },

    #[error("degenerate canvas {width}x{height}")]
    DegenerateCanvas { width: f32, height: f32 },
}
