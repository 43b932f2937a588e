//! R-tree of laid-out node boxes using the rstar crate.
//!
//! Provides O(log n) queries in canvas coordinates for:
//! - Point hit testing (drop targets while dragging)
//! - Rectangle intersection (marquee selection)
//! - Nearest box

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::layout::{LayoutResult, NodeDimensions, Point, Rect};

/// A node box in the spatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBox {
    /// The node identifier.
    pub id: String,
    /// Canvas-space box.
    pub rect: Rect,
}

impl NodeBox {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self { id: id.into(), rect }
    }

    fn area(&self) -> f32 {
        self.rect.width() * self.rect.height()
    }
}

impl RTreeObject for NodeBox {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min_x, self.rect.min_y],
            [self.rect.max_x, self.rect.max_y],
        )
    }
}

impl PointDistance for NodeBox {
    /// Squared distance to the box edge, zero inside.
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = (self.rect.min_x - point[0]).max(0.0).max(point[0] - self.rect.max_x);
        let dy = (self.rect.min_y - point[1]).max(0.0).max(point[1] - self.rect.max_y);
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        self.rect.contains(Point::new(point[0], point[1]))
    }
}

/// Spatial index over node boxes.
///
/// Uses an R*-tree; rebuilt in bulk after every layout.
pub struct SpatialIndex {
    tree: RTree<NodeBox>,
}

impl SpatialIndex {
    /// Create a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Index every node of `layout`, sized by `dims`.
    pub fn from_layout(layout: &LayoutResult, dims: &NodeDimensions) -> Self {
        let mut index = Self::new();
        index.rebuild(layout, dims);
        index
    }

    /// Replace the contents with the boxes of `layout`.
    pub fn rebuild(&mut self, layout: &LayoutResult, dims: &NodeDimensions) {
        let boxes: Vec<NodeBox> = layout
            .nodes
            .keys()
            .filter_map(|id| Some(NodeBox::new(id.clone(), layout.node_rect(id, dims)?)))
            .collect();
        self.tree = RTree::bulk_load(boxes);
    }

    /// Insert a single box.
    pub fn insert(&mut self, node: NodeBox) {
        self.tree.insert(node);
    }

    /// The top-most node under a point: the smallest box containing it.
    ///
    /// Ties on area resolve by id so the answer does not depend on tree shape.
    pub fn at_point(&self, x: f32, y: f32) -> Option<&str> {
        self.tree
            .locate_all_at_point(&[x, y])
            .min_by(|a, b| a.area().total_cmp(&b.area()).then_with(|| a.id.cmp(&b.id)))
            .map(|node| node.id.as_str())
    }

    /// Ids of all boxes intersecting a rectangle, sorted.
    pub fn in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<String> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        let mut ids: Vec<String> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|node| node.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The box closest to a point (distance zero when inside).
    pub fn nearest(&self, x: f32, y: f32) -> Option<&str> {
        self.tree
            .nearest_neighbor(&[x, y])
            .map(|node| node.id.as_str())
    }

    /// Clear all boxes from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Get the number of boxes in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Size;

    fn boxed(id: &str, x: f32, y: f32, w: f32, h: f32) -> NodeBox {
        NodeBox::new(
            id,
            Rect {
                min_x: x,
                min_y: y,
                max_x: x + w,
                max_y: y + h,
            },
        )
    }

    fn sample() -> SpatialIndex {
        let mut index = SpatialIndex::new();
        index.insert(boxed("big", 0.0, 0.0, 200.0, 200.0));
        index.insert(boxed("small", 50.0, 50.0, 20.0, 20.0));
        index.insert(boxed("far", 500.0, 500.0, 100.0, 40.0));
        index
    }

    #[test]
    fn test_at_point_prefers_smallest_box() {
        let index = sample();
        assert_eq!(index.at_point(60.0, 60.0), Some("small"));
        assert_eq!(index.at_point(10.0, 10.0), Some("big"));
        assert_eq!(index.at_point(300.0, 300.0), None);
    }

    #[test]
    fn test_at_point_includes_edges() {
        let index = sample();
        assert_eq!(index.at_point(600.0, 540.0), Some("far"));
    }

    #[test]
    fn test_in_rect() {
        let index = sample();
        assert_eq!(index.in_rect(40.0, 40.0, 55.0, 55.0), vec!["big", "small"]);
        assert_eq!(index.in_rect(450.0, 450.0, 510.0, 510.0), vec!["far"]);
        assert!(index.in_rect(300.0, 300.0, 310.0, 310.0).is_empty());
    }

    #[test]
    fn test_nearest_measures_to_box_edge() {
        let index = sample();
        assert_eq!(index.nearest(450.0, 520.0), Some("far"));
        assert_eq!(index.nearest(210.0, 100.0), Some("big"));
    }

    #[test]
    fn test_from_layout_uses_dimensions() {
        let mut layout = LayoutResult::default();
        layout.nodes.insert("a".into(), Point::new(10.0, 10.0));
        layout.nodes.insert("b".into(), Point::new(300.0, 10.0));
        let mut dims = NodeDimensions::new();
        dims.insert("a".into(), Size::new(250.0, 60.0));

        let index = SpatialIndex::from_layout(&layout, &dims);
        assert_eq!(index.len(), 2);
        assert_eq!(index.at_point(255.0, 65.0), Some("a"));
        // "b" was never measured and uses the 100x40 fallback.
        assert_eq!(index.at_point(395.0, 45.0), Some("b"));
        assert_eq!(index.at_point(405.0, 45.0), None);
    }

    #[test]
    fn test_clear() {
        let mut index = sample();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.nearest(0.0, 0.0), None);
    }
}
