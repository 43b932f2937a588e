//! Left/right balancing of top-level branches.
//!
//! Each direct child of the root is weighed by its subtree size and handed
//! to the lighter side, heaviest first (greedy partition). Branches that
//! already carry a side keep it and only count towards that side's total.
//!
//! Collapse state is ignored, so folding a branch never moves it to the other
//! side on the next load.

use super::node::{Node, Side};

/// Running weight per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideWeights {
    pub left: usize,
    pub right: usize,
}

impl SideWeights {
    fn add(&mut self, side: Side, weight: usize) {
        match side {
            Side::Left => self.left += weight,
            Side::Right => self.right += weight,
        }
    }

    /// The side with the smaller total. Ties go left.
    fn lighter(&self) -> Side {
        if self.left <= self.right {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Absolute difference between the two sides.
    pub fn imbalance(&self) -> usize {
        self.left.abs_diff(self.right)
    }
}

/// Subtree weight: 1 for the node plus the weight of every child.
pub fn weight(node: &Node) -> usize {
    node.count()
}

/// Assign a side to every unassigned top-level branch of `root`.
///
/// Returns `root` for chaining. A root without children is left untouched.
pub fn balance(root: &mut Node) -> &mut Node {
    if root.children.is_empty() {
        return root;
    }

    let mut order: Vec<(usize, usize)> = root
        .children
        .iter()
        .enumerate()
        .map(|(index, child)| (index, weight(child)))
        .collect();
    // Stable sort: equal weights keep document order.
    order.sort_by(|a, b| b.1.cmp(&a.1));

    let mut totals = SideWeights::default();
    let mut assigned = 0usize;

    for (index, child_weight) in order {
        let child = &mut root.children[index];
        match child.side {
            Some(side) => totals.add(side, child_weight),
            None => {
                let side = totals.lighter();
                child.side = Some(side);
                totals.add(side, child_weight);
                assigned += 1;
            }
        }
    }

    tracing::debug!(
        branches = root.children.len(),
        assigned,
        left = totals.left,
        right = totals.right,
        "balanced top-level branches"
    );

    root
}

/// Current per-side totals of a root's top-level branches.
///
/// Branches without a side are not counted.
pub fn side_weights(root: &Node) -> SideWeights {
    let mut totals = SideWeights::default();
    for child in &root.children {
        if let Some(side) = child.side {
            totals.add(side, weight(child));
        }
    }
    totals
}
