//! Mind Map Layout - WASM Module
//!
//! This module provides the tree model, left/right balancing and the hybrid
//! branch-island layout engine for a mind map editor. It is compiled to
//! WebAssembly and exposes a JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `tree`: Node model and an editable arena map using petgraph's StableGraph
//! - `layout`: Per-branch tidy trees placed around the root by a small
//!   deterministic force simulation
//! - `spatial`: R-tree spatial indexing over node boxes for hit testing
//! - `error`: Typed errors for edits and internal layout faults

use js_sys::Float32Array;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod layout;
pub mod spatial;
pub mod tree;

use error::TreeError;
use layout::{LayoutConfig, LayoutResult, NodeDimensions, Point, Size, compute_layout};
use spatial::SpatialIndex;
use tree::{MindMap, Node, Side};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Serialize into plain JS objects (maps become objects, not `Map`s).
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

#[cfg(target_arch = "wasm32")]
fn warn_degraded(result: &LayoutResult) {
    web_sys::console::warn_1(&JsValue::from_str(&format!(
        "mind map layout degraded: {} node(s) stacked at a fallback position",
        result.nodes.len()
    )));
}

#[cfg(not(target_arch = "wasm32"))]
fn warn_degraded(_result: &LayoutResult) {}

/// Main entry point for the mind map editor.
///
/// Owns the tree, the measured node sizes and the last layout. The last
/// layout warm-starts the next one and backs hit testing.
#[wasm_bindgen]
pub struct MindMapWasm {
    map: MindMap,
    dims: NodeDimensions,
    config: LayoutConfig,
    last: Option<LayoutResult>,
    index: SpatialIndex,
}

#[wasm_bindgen]
impl MindMapWasm {
    /// Create a map holding only a root node.
    #[wasm_bindgen(constructor)]
    pub fn new(root_text: Option<String>) -> Self {
        let map = root_text.map_or_else(MindMap::default, MindMap::new);
        Self::from_map(map)
    }

    // =========================================================================
    // Tree I/O
    // =========================================================================

    /// Replace the tree with a nested `{ id, text, children, ... }` object.
    ///
    /// Top-level branches without a side are balanced on load.
    #[wasm_bindgen(js_name = loadTree)]
    pub fn load_tree(&mut self, tree: JsValue) -> Result<(), JsError> {
        let root: Node = serde_wasm_bindgen::from_value(tree)?;
        self.load(root)?;
        Ok(())
    }

    /// Snapshot the tree as a nested object.
    #[wasm_bindgen(js_name = toTree)]
    pub fn to_tree(&self) -> Result<JsValue, JsError> {
        to_js(&self.map.to_node())
    }

    /// Get the number of nodes, collapsed ones included.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.map.len() as u32
    }

    // =========================================================================
    // Dimensions & Configuration
    // =========================================================================

    /// Record the measured box of a node.
    #[wasm_bindgen(js_name = reportSize)]
    pub fn report_size(&mut self, id: &str, width: f32, height: f32) {
        self.dims.insert(id.to_string(), Size::new(width, height));
    }

    /// Drop a node's measured box (it falls back to 100x40).
    #[wasm_bindgen(js_name = forgetSize)]
    pub fn forget_size(&mut self, id: &str) {
        self.dims.remove(id);
    }

    /// Set the spacing density (clamped to 0..=10).
    #[wasm_bindgen(js_name = setSpacing)]
    pub fn set_spacing(&mut self, spacing: f32) {
        self.config.spacing = spacing;
    }

    /// Replace the layout configuration with a (partial) config object.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, config: JsValue) -> Result<(), JsError> {
        self.config = serde_wasm_bindgen::from_value(config)?;
        Ok(())
    }

    // =========================================================================
    // Edits
    // =========================================================================

    #[wasm_bindgen(js_name = addChild)]
    pub fn add_child(&mut self, parent: &str, id: &str, text: &str) -> Result<(), JsError> {
        Ok(self.map.add_child(parent, id, text)?)
    }

    #[wasm_bindgen(js_name = addSibling)]
    pub fn add_sibling(&mut self, sibling: &str, id: &str, text: &str) -> Result<(), JsError> {
        Ok(self.map.add_sibling(sibling, id, text)?)
    }

    /// Remove a node and its subtree. Returns the removed subtree.
    #[wasm_bindgen(js_name = removeNode)]
    pub fn remove_node(&mut self, id: &str) -> Result<JsValue, JsError> {
        let removed = self.map.remove(id)?;
        removed.walk(&mut |node| {
            self.dims.remove(&node.id);
        });
        to_js(&removed)
    }

    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&mut self, id: &str, target: &str) -> Result<(), JsError> {
        Ok(self.map.move_node(id, target)?)
    }

    /// Flip a node's collapsed flag. Returns the new state.
    #[wasm_bindgen(js_name = toggleCollapse)]
    pub fn toggle_collapse(&mut self, id: &str) -> Result<bool, JsError> {
        Ok(self.map.toggle_collapse(id)?)
    }

    #[wasm_bindgen(js_name = setText)]
    pub fn set_text(&mut self, id: &str, text: &str) -> Result<(), JsError> {
        Ok(self.map.set_text(id, text)?)
    }

    /// Set `"left"`, `"right"`, or clear with `undefined`.
    #[wasm_bindgen(js_name = setSide)]
    pub fn set_side(&mut self, id: &str, side: Option<String>) -> Result<(), JsError> {
        let side = match side.as_deref() {
            None => None,
            Some(value) => Some(
                Side::parse(value).ok_or_else(|| JsError::new(&format!("unknown side: {value}")))?,
            ),
        };
        Ok(self.map.set_side(id, side)?)
    }

    /// Pin a top-level node at a world-space center, or unpin it when
    /// either coordinate is missing.
    #[wasm_bindgen(js_name = setManualPosition)]
    pub fn set_manual_position(&mut self, id: &str, x: Option<f32>, y: Option<f32>) -> Result<(), JsError> {
        let position = x.zip(y).map(|(x, y)| Point::new(x, y));
        Ok(self.map.set_manual_position(id, position)?)
    }

    /// Assign a side to every top-level branch that lacks one.
    pub fn balance(&mut self) {
        self.map.balance();
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Lay out the visible tree and return `{ nodes, width, height, origin, degraded }`.
    ///
    /// The previous layout, if any, warm-starts this one.
    #[wasm_bindgen(js_name = computeLayout)]
    pub fn compute_layout(&mut self) -> Result<JsValue, JsError> {
        let result = self.relayout();
        to_js(result)
    }

    /// Ids of the laid-out nodes in visible pre-order.
    ///
    /// This is the order used by [`getPositions`](Self::get_positions).
    #[wasm_bindgen(js_name = nodeOrder)]
    pub fn node_order(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(result) = &self.last {
            self.map.to_node().walk_visible(&mut |node| {
                if result.nodes.contains_key(&node.id) {
                    ids.push(node.id.clone());
                }
            });
        }
        ids
    }

    /// Top-left corners of the last layout as `[x0, y0, x1, y1, ...]`.
    #[wasm_bindgen(js_name = getPositions)]
    pub fn get_positions(&self) -> Float32Array {
        Float32Array::from(&self.positions()[..])
    }

    /// Canvas `[width, height]` of the last layout.
    #[wasm_bindgen(js_name = getCanvasSize)]
    pub fn get_canvas_size(&self) -> Option<Vec<f32>> {
        self.last.as_ref().map(|result| vec![result.width, result.height])
    }

    // =========================================================================
    // Hit Testing
    // =========================================================================

    /// The top-most node under a canvas point.
    #[wasm_bindgen(js_name = nodeAt)]
    pub fn node_at(&self, x: f32, y: f32) -> Option<String> {
        self.index.at_point(x, y).map(str::to_string)
    }

    /// Nodes whose boxes intersect a canvas rectangle.
    #[wasm_bindgen(js_name = nodesInRect)]
    pub fn nodes_in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<String> {
        self.index.in_rect(min_x, min_y, max_x, max_y)
    }

    /// The node whose box is closest to a canvas point.
    #[wasm_bindgen(js_name = nearestNode)]
    pub fn nearest_node(&self, x: f32, y: f32) -> Option<String> {
        self.index.nearest(x, y).map(str::to_string)
    }
}

impl MindMapWasm {
    pub fn from_map(map: MindMap) -> Self {
        Self {
            map,
            dims: NodeDimensions::new(),
            config: LayoutConfig::default(),
            last: None,
            index: SpatialIndex::new(),
        }
    }

    /// Balance and install a nested tree, forgetting the previous layout.
    pub fn load(&mut self, mut root: Node) -> Result<(), TreeError> {
        tree::balance(&mut root);
        self.map = MindMap::from_node(&root)?;
        self.last = None;
        self.index.clear();
        Ok(())
    }

    pub fn map(&self) -> &MindMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MindMap {
        &mut self.map
    }

    pub fn config_mut(&mut self) -> &mut LayoutConfig {
        &mut self.config
    }

    pub fn last_layout(&self) -> Option<&LayoutResult> {
        self.last.as_ref()
    }

    /// Run the layout, warm-started from the last one, and refresh the
    /// spatial index.
    pub fn relayout(&mut self) -> &LayoutResult {
        let root = self.map.to_node();
        let result = compute_layout(&root, &self.dims, &self.config, self.last.as_ref());
        if result.degraded {
            warn_degraded(&result);
        }
        self.index.rebuild(&result, &self.dims);
        self.last.insert(result)
    }

    fn positions(&self) -> Vec<f32> {
        let Some(result) = &self.last else {
            return Vec::new();
        };
        self.node_order()
            .iter()
            .filter_map(|id| result.nodes.get(id))
            .flat_map(|p| [p.x, p.y])
            .collect()
    }
}

impl Default for MindMapWasm {
    fn default() -> Self {
        Self::from_map(MindMap::default())
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::layout::{Rect, Spacing, size_of};
    use crate::tree::side_weights;

    fn leaf(id: &str) -> Node {
        Node::new(id, id)
    }

    fn fan(id: &str, descendants: usize) -> Node {
        Node::new(id, id).with_children((0..descendants).map(|i| leaf(&format!("{id}-{i}"))))
    }

    /// Canvas box of every visible node of the given top-level branch.
    fn branch_bounds(result: &LayoutResult, dims: &NodeDimensions, branch: &Node) -> Rect {
        let mut bounds = Rect::EMPTY;
        branch.walk_visible(&mut |node| {
            if let Some(rect) = result.node_rect(&node.id, dims) {
                bounds = bounds.union(&rect);
            }
        });
        bounds
    }

    fn assert_branches_disjoint(result: &LayoutResult, dims: &NodeDimensions, root: &Node) {
        let boxes: Vec<_> = root
            .visible_children()
            .iter()
            .map(|child| (child.id.as_str(), branch_bounds(result, dims, child)))
            .collect();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                assert!(
                    !boxes[i].1.overlaps(&boxes[j].1),
                    "branches {} and {} overlap",
                    boxes[i].0,
                    boxes[j].0
                );
            }
        }
    }

    #[test]
    fn test_four_equal_leaves_symmetric() {
        let mut editor = MindMapWasm::default();
        editor.config_mut().spacing = 0.0;
        editor
            .load(Node::new("root", "Root").with_children([leaf("a"), leaf("b"), leaf("c"), leaf("d")]))
            .unwrap();

        let snapshot = editor.map().to_node();
        let weights = side_weights(&snapshot);
        assert_eq!((weights.left, weights.right), (2, 2));

        let dims = NodeDimensions::new();
        let result = editor.relayout().clone();
        assert!(!result.degraded);
        assert_eq!(result.nodes.len(), 5);
        assert_branches_disjoint(&result, &dims, &snapshot);

        for child in &snapshot.children {
            let center = result.world_center(&child.id, &dims).unwrap();
            let sign = child.side.unwrap().sign();
            assert!(center.x * sign > 0.0, "{} on wrong side: {center:?}", child.id);
        }
    }

    #[test]
    fn test_heavy_and_light_branch_on_opposite_sides() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([fan("heavy", 10), leaf("light")]))
            .unwrap();

        let map = editor.map();
        let heavy = map.get("heavy").and_then(|n| n.side());
        let light = map.get("light").and_then(|n| n.side());
        assert!(heavy.is_some() && light.is_some());
        assert_ne!(heavy, light);

        let weights = side_weights(&map.to_node());
        let mut totals = [weights.left, weights.right];
        totals.sort();
        assert_eq!(totals, [1, 11]);
    }

    #[test]
    fn test_collapse_shrinks_canvas_and_keeps_sides() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([fan("heavy", 10), leaf("light")]))
            .unwrap();

        let open = editor.relayout().clone();
        let sides_before = editor.map().to_node().children.iter().map(|c| c.side).collect::<Vec<_>>();

        assert!(editor.map_mut().toggle_collapse("heavy").unwrap());
        editor.balance();
        let shut = editor.relayout().clone();
        let sides_after = editor.map().to_node().children.iter().map(|c| c.side).collect::<Vec<_>>();

        assert_eq!(sides_before, sides_after);
        assert!(
            shut.height < open.height * 0.75,
            "expected a much shorter canvas: {} vs {}",
            shut.height,
            open.height
        );
        assert_eq!(shut.nodes.len(), 3);
    }

    #[test]
    fn test_manual_pin_survives_other_branches() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([fan("a", 3), fan("b", 8), leaf("c")]))
            .unwrap();
        editor
            .map_mut()
            .set_manual_position("c", Some(Point::new(350.0, -220.0)))
            .unwrap();

        let dims = NodeDimensions::new();
        let result = editor.relayout().clone();
        let c = result.world_center("c", &dims).unwrap();
        assert!((c.x - 350.0).abs() < 1e-3 && (c.y + 220.0).abs() < 1e-3, "{c:?}");
    }

    #[test]
    fn test_layout_is_deterministic() {
        let root = Node::new("root", "Root").with_children([
            fan("a", 4),
            fan("b", 2).with_side(Side::Left),
            leaf("c"),
            fan("d", 6),
        ]);
        let mut dims = NodeDimensions::new();
        dims.insert("a".into(), Size::new(180.0, 52.0));
        dims.insert("d-3".into(), Size::new(60.0, 90.0));
        let config = LayoutConfig::default();

        let first = compute_layout(&root, &dims, &config, None);
        let second = compute_layout(&root, &dims, &config, None);
        assert_eq!(first, second);

        let warm_a = compute_layout(&root, &dims, &config, Some(&first));
        let warm_b = compute_layout(&root, &dims, &config, Some(&first));
        assert_eq!(warm_a, warm_b);
    }

    #[test]
    fn test_warm_start_keeps_unrelated_branches_still() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([fan("a", 3), fan("b", 2), fan("c", 4), leaf("d")]))
            .unwrap();
        editor.report_size("b-1", 100.0, 40.0);

        let before = editor.relayout().clone();
        editor.report_size("b-1", 102.0, 40.0);
        editor.map_mut().set_text("b-1", "renamed").unwrap();
        let after = editor.relayout().clone();

        let dims = NodeDimensions::new();
        let diagonal = before.width.hypot(before.height);
        for id in ["a", "c", "d"] {
            let p = before.world_center(id, &dims).unwrap();
            let q = after.world_center(id, &dims).unwrap();
            let moved = q.minus(p).length();
            assert!(moved < diagonal * 0.05, "{id} moved {moved} (diagonal {diagonal})");
        }
    }

    #[test]
    fn test_extreme_pins_fall_back() {
        let root = Node::new("root", "Root").with_children([
            leaf("a").pinned_at(f32::MAX, 0.0),
            leaf("b").pinned_at(f32::MIN, 0.0),
            leaf("c"),
        ]);
        let result = compute_layout(&root, &NodeDimensions::new(), &LayoutConfig::default(), None);

        assert!(result.degraded);
        assert_eq!((result.width, result.height), (1000.0, 1000.0));
        for id in ["root", "a", "b", "c"] {
            assert_eq!(result.nodes[id], Point::new(500.0, 500.0));
        }
    }

    #[test]
    fn test_positions_follow_node_order() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([fan("a", 2), leaf("b")]))
            .unwrap();
        assert!(editor.node_order().is_empty());

        editor.relayout();
        let order = editor.node_order();
        assert_eq!(order, vec!["root", "a", "a-0", "a-1", "b"]);

        let positions = editor.positions();
        let result = editor.last_layout().unwrap();
        assert_eq!(positions.len(), order.len() * 2);
        for (i, id) in order.iter().enumerate() {
            assert_eq!(positions[2 * i], result.nodes[id].x);
            assert_eq!(positions[2 * i + 1], result.nodes[id].y);
        }
    }

    #[test]
    fn test_hit_testing_after_layout() {
        let mut editor = MindMapWasm::default();
        editor
            .load(Node::new("root", "Root").with_children([leaf("a"), leaf("b")]))
            .unwrap();
        editor.report_size("root", 160.0, 60.0);

        let result = editor.relayout().clone();
        let root_box = result.node_rect("root", &editor.dims).unwrap();
        let center = root_box.center();
        assert_eq!(editor.node_at(center.x, center.y).as_deref(), Some("root"));
        assert_eq!(editor.node_at(1.0, 1.0), None);

        let all = editor.nodes_in_rect(0.0, 0.0, result.width, result.height);
        assert_eq!(all, vec!["a", "b", "root"]);

        let a = result.node_rect("a", &editor.dims).unwrap();
        assert_eq!(editor.nearest_node(a.max_x + 5.0, a.center().y).as_deref(), Some("a"));
    }

    #[test]
    fn test_edits_flow_into_layout() {
        let mut editor = MindMapWasm::default();
        let map = editor.map_mut();
        map.add_child(MindMap::ROOT_ID, "a", "A").unwrap();
        map.add_child("a", "a1", "A1").unwrap();
        map.add_sibling("a", "b", "B").unwrap();
        map.move_node("a1", "b").unwrap();
        editor.balance();

        let result = editor.relayout().clone();
        let dims = NodeDimensions::new();
        assert_eq!(result.nodes.len(), 4);

        let b = result.world_center("b", &dims).unwrap();
        let a1 = result.world_center("a1", &dims).unwrap();
        let side = editor.map().get("b").and_then(|n| n.side()).unwrap();
        // Children grow outward on their branch's side.
        assert!((a1.x - b.x) * side.sign() > 0.0);

        let spacing = Spacing::from_density(LayoutConfig::default().spacing);
        let gap = (a1.x - b.x).abs() - size_of(&dims, "b").width / 2.0 - size_of(&dims, "a1").width / 2.0;
        assert!((gap - spacing.level_sep).abs() < 1e-3);
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let mut editor = MindMapWasm::default();
        let err = editor
            .load(Node::new("root", "Root").with_children([leaf("x"), fan("y", 1), leaf("x")]))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateId("x".into()));
    }
}
