//! Composition: branch-local positions plus island anchors into one canvas.
//!
//! World space has the root center at (0, 0). The union of every visible
//! node box, grown by the padding, becomes the canvas; positions are then
//! shifted so the canvas starts at (0, 0) and converted to top-left corners.
//!
//! A root with nothing visible around it gets a small fixed canvas instead,
//! root centered, so the padding does not dominate an empty map.

use std::collections::HashMap;

use super::branch::BranchLayout;
use super::geometry::{Point, Rect};
use super::islands::IslandPlacement;
use super::{LayoutResult, NodeDimensions, ROOT_ONLY_CANVAS, size_of};
use crate::error::LayoutError;
use crate::tree::Node;

/// Merge the root, every branch layout and its placement into a normalized
/// [`LayoutResult`].
///
/// `branches` and `placements` are parallel slices in top-level order.
pub fn compose(
    root: &Node,
    dims: &NodeDimensions,
    branches: &[BranchLayout],
    placements: &[IslandPlacement],
    padding: f32,
) -> Result<LayoutResult, LayoutError> {
    if branches.is_empty() {
        return Ok(root_only(root, dims));
    }

    let mut centers: Vec<(&str, Point)> = vec![(root.id.as_str(), Point::ORIGIN)];
    let mut anchors = HashMap::with_capacity(branches.len());
    for (branch, placement) in branches.iter().zip(placements) {
        if let Some((id, _)) = branch.positions.first() {
            anchors.insert(id.clone(), placement.anchor);
        }
        for (id, relative) in &branch.positions {
            let world = placement.anchor.offset(*relative);
            if !world.is_finite() {
                return Err(LayoutError::NonFinite { id: id.clone() });
            }
            centers.push((id.as_str(), world));
        }
    }

    let bounds = centers
        .iter()
        .map(|(id, center)| Rect::from_center(*center, size_of(dims, id)))
        .fold(Rect::EMPTY, |acc, rect| acc.union(&rect));

    let width = bounds.width() + 2.0 * padding;
    let height = bounds.height() + 2.0 * padding;
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(LayoutError::DegenerateCanvas { width, height });
    }

    // Canvas position of the world origin.
    let origin = Point::new(padding - bounds.min_x, padding - bounds.min_y);

    let mut nodes = HashMap::with_capacity(centers.len());
    for (id, center) in centers {
        let top_left = center.offset(origin).minus(size_of(dims, id).half());
        if !top_left.is_finite() {
            return Err(LayoutError::NonFinite { id: id.to_string() });
        }
        if nodes.insert(id.to_string(), top_left).is_some() {
            return Err(LayoutError::DuplicateId(id.to_string()));
        }
    }

    Ok(LayoutResult {
        nodes,
        width,
        height,
        origin,
        anchors,
        degraded: false,
    })
}

fn root_only(root: &Node, dims: &NodeDimensions) -> LayoutResult {
    let size = size_of(dims, &root.id);
    let width = size.width.max(ROOT_ONLY_CANVAS);
    let height = size.height.max(ROOT_ONLY_CANVAS);
    let origin = Point::new(width / 2.0, height / 2.0);
    LayoutResult {
        nodes: HashMap::from([(root.id.clone(), origin.minus(size.half()))]),
        width,
        height,
        origin,
        anchors: HashMap::new(),
        degraded: false,
    }
}
