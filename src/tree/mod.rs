//! Mind map tree model.
//!
//! [`Node`] is the plain nested form exchanged with the host (JSON in, JSON
//! out). [`MindMap`] is the editable arena form backed by a petgraph
//! `StableGraph`, so ids stay valid across edits.

mod arena;
pub mod balance;
mod node;

pub use arena::{MindMap, NodeRef};
pub use balance::{SideWeights, balance, side_weights, weight};
pub use node::{Node, Side};
