//! Nested node type exchanged with the editor and the layout engine.
//!
//! This is the wire shape of a mind map: a root `Node` owning its children
//! recursively. It round-trips through serde with camelCase keys so the
//! JavaScript side can pass its tree object straight in. Attributes this
//! crate does not use (style, date, note) are ignored on input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layout::Point;

/// Which side of the root a top-level branch grows towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Horizontal sign of the side: -1 for left, +1 for right.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    /// Parse the editor's side strings. Anything else means "unassigned".
    pub fn parse(value: &str) -> Option<Side> {
        match value {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// A mind map node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable identifier, unique across the whole tree.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub text: String,
    /// Ordered children. Order decides vertical stacking.
    #[serde(default)]
    pub children: Vec<Node>,
    /// When set, descendants are kept but excluded from layout.
    #[serde(default)]
    pub is_collapsed: bool,
    /// Side of a top-level branch; `None` lets the balancer decide.
    #[serde(default)]
    pub side: Option<Side>,
    /// Manual X override (world-space center) for a top-level node.
    #[serde(default)]
    pub x: Option<f32>,
    /// Manual Y override (world-space center) for a top-level node.
    #[serde(default)]
    pub y: Option<f32>,
}

impl Node {
    /// Create a leaf node.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            children: Vec::new(),
            is_collapsed: false,
            side: None,
            x: None,
            y: None,
        }
    }

    /// Builder: append children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Builder: set the side.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    /// Builder: set the collapsed flag.
    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.is_collapsed = collapsed;
        self
    }

    /// Builder: pin the node at a world-space center.
    pub fn pinned_at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// The manual position, only when both coordinates are present and finite.
    pub fn manual_position(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Point::new(x, y)),
            _ => None,
        }
    }

    /// Children that take part in layout (none when collapsed).
    #[inline]
    pub fn visible_children(&self) -> &[Node] {
        if self.is_collapsed {
            &[]
        } else {
            &self.children
        }
    }

    /// Visit this node and every descendant in pre-order, collapsed or not.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Visit this node and every visible descendant in pre-order.
    pub fn walk_visible<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.visible_children().iter().rev());
        }
    }

    /// Total number of nodes in this subtree.
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: &str) -> Option<&Node> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

// Iterative teardown: the derived drop glue recurses once per level.
impl Drop for Node {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_editor_shape() {
        let json = r##"{
            "id": "root",
            "text": "Central Topic",
            "style": { "color": "#fff" },
            "children": [
                { "id": "a", "text": "A", "side": "left", "isCollapsed": true,
                  "children": [ { "id": "a1" } ] },
                { "id": "b", "x": 120.5, "y": -40, "side": null }
            ]
        }"##;

        let root: Node = serde_json::from_str(json).unwrap();
        assert_eq!(root.count(), 4);
        assert_eq!(root.children[0].side, Some(Side::Left));
        assert!(root.children[0].is_collapsed);
        assert_eq!(root.children[0].children[0].text, "");
        assert_eq!(root.children[1].side, None);
        assert_eq!(
            root.children[1].manual_position(),
            Some(Point::new(120.5, -40.0))
        );
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let node = Node::new("n", "N").collapsed(true).with_side(Side::Right);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["isCollapsed"], true);
        assert_eq!(value["side"], "right");
    }

    #[test]
    fn test_manual_position_requires_both_axes() {
        let mut node = Node::new("n", "N");
        node.x = Some(10.0);
        assert_eq!(node.manual_position(), None);

        node.y = Some(f32::NAN);
        assert_eq!(node.manual_position(), None);

        node.y = Some(5.0);
        assert_eq!(node.manual_position(), Some(Point::new(10.0, 5.0)));
    }

    #[test]
    fn test_visible_children_hidden_when_collapsed() {
        let node = Node::new("p", "P")
            .with_children([Node::new("c", "C")])
            .collapsed(true);
        assert!(node.visible_children().is_empty());

        let mut visible = Vec::new();
        node.walk_visible(&mut |n| visible.push(n.id.as_str()));
        assert_eq!(visible, vec!["p"]);

        let mut all = Vec::new();
        node.walk(&mut |n| all.push(n.id.as_str()));
        assert_eq!(all, vec!["p", "c"]);
    }

    #[test]
    fn test_side_parse_and_display() {
        assert_eq!(Side::parse("left"), Some(Side::Left));
        assert_eq!(Side::parse("RIGHT"), None);
        assert_eq!(Side::Right.to_string(), "right");
        assert_eq!(Side::Left.sign(), -1.0);
    }
}
