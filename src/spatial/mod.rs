//! Spatial indexing for O(log n) hit testing.
//!
//! This module provides an R-tree based spatial index over the node boxes
//! of a computed layout, for point, rectangle and nearest-box queries.

mod rtree;

pub use rtree::{NodeBox, SpatialIndex};
