//! Micro-layout: a compact tidy tree for one top-level branch.
//!
//! The branch root sits at (0, 0) and its subtree grows horizontally
//! towards the branch's side. The visible subtree is flattened in pre-order,
//! so every parent precedes its children, then two loops run over it:
//!
//! 1. **Measure (children first):** each node's block is its own box, widened by
//!    the level gap plus the widest child block and heightened to the stack
//!    of child blocks separated by the sibling gap.
//! 2. **Position (parents first):** children are stacked top to bottom, centered
//!    vertically on their parent, with their left (or right) edges aligned one
//!    level gap past the parent's box.
//!
//! Collapsed nodes contribute only their own box.

use super::geometry::{Point, Rect, Size};
use super::{NodeDimensions, Spacing, size_of};
use crate::tree::{Node, Side};

/// Internal node data used during the two passes.
#[derive(Debug)]
struct BranchNode<'a> {
    id: &'a str,
    /// Measured box of the node itself.
    size: Size,
    /// Children (indices into the flat node list), in document order.
    children: Vec<usize>,
    /// Width/height of the whole visible subtree block.
    total: Size,
    /// Height of the stacked child blocks including sibling gaps.
    child_block_height: f32,
    /// Center, relative to the branch root.
    position: Point,
}

/// Result of laying out one branch.
#[derive(Debug, Clone)]
pub struct BranchLayout {
    /// Node centers relative to the branch root, in pre-order.
    pub positions: Vec<(String, Point)>,
    /// Width of the branch block.
    pub total_width: f32,
    /// Height of the branch block.
    pub total_height: f32,
    /// Union of every node box, relative to the branch root.
    pub bounds: Rect,
}

/// Lay out `branch_root` and its visible subtree growing towards `direction`.
pub fn layout_branch(
    branch_root: &Node,
    direction: Side,
    dims: &NodeDimensions,
    spacing: &Spacing,
) -> BranchLayout {
    let mut nodes = build_branch_tree(branch_root, dims);
    measure(&mut nodes, spacing);
    place(&mut nodes, direction.sign(), spacing);

    let bounds = nodes
        .iter()
        .map(|node| Rect::from_center(node.position, node.size))
        .fold(Rect::EMPTY, |acc, rect| acc.union(&rect));

    let total = nodes[0].total;
    BranchLayout {
        positions: nodes
            .iter()
            .map(|node| (node.id.to_string(), node.position))
            .collect(),
        total_width: total.width,
        total_height: total.height,
        bounds,
    }
}

/// Flatten the visible subtree in pre-order. The branch root lands at index 0.
fn build_branch_tree<'a>(branch_root: &'a Node, dims: &NodeDimensions) -> Vec<BranchNode<'a>> {
    let mut nodes: Vec<BranchNode<'a>> = Vec::new();
    let mut stack: Vec<(&'a Node, Option<usize>)> = vec![(branch_root, None)];

    while let Some((node, parent)) = stack.pop() {
        let index = nodes.len();
        let size = size_of(dims, &node.id);
        nodes.push(BranchNode {
            id: &node.id,
            size,
            children: Vec::new(),
            total: size,
            child_block_height: 0.0,
            position: Point::ORIGIN,
        });
        if let Some(parent) = parent {
            nodes[parent].children.push(index);
        }
        stack.extend(
            node.visible_children()
                .iter()
                .rev()
                .map(|child| (child, Some(index))),
        );
    }
    nodes
}

/// Measure pass, children before parents.
fn measure(nodes: &mut [BranchNode<'_>], spacing: &Spacing) {
    for v in (0..nodes.len()).rev() {
        if nodes[v].children.is_empty() {
            nodes[v].total = nodes[v].size;
            nodes[v].child_block_height = 0.0;
            continue;
        }

        let mut block_height = 0.0f32;
        let mut block_width = 0.0f32;
        for (i, &child) in nodes[v].children.iter().enumerate() {
            if i > 0 {
                block_height += spacing.node_sep;
            }
            block_height += nodes[child].total.height;
            block_width = block_width.max(nodes[child].total.width);
        }

        let own = nodes[v].size;
        nodes[v].child_block_height = block_height;
        nodes[v].total = Size::new(
            own.width + spacing.level_sep + block_width,
            own.height.max(block_height),
        );
    }
}

/// Position pass, parents before children. `sign` is +1 for right-growing
/// branches.
fn place(nodes: &mut [BranchNode<'_>], sign: f32, spacing: &Spacing) {
    for v in 0..nodes.len() {
        let at = nodes[v].position;
        let half_width = nodes[v].size.width / 2.0;
        let mut running_y = at.y - nodes[v].child_block_height / 2.0;

        for k in 0..nodes[v].children.len() {
            let child = nodes[v].children[k];
            let child_height = nodes[child].total.height;
            let offset_x = half_width + spacing.level_sep + nodes[child].size.width / 2.0;
            nodes[child].position = Point::new(at.x + sign * offset_x, running_y + child_height / 2.0);
            running_y += child_height + spacing.node_sep;
        }
    }
}
