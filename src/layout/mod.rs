//! Hybrid mind map layout.
//!
//! The root sits at the center of the world. Each top-level branch is laid
//! out as a compact tidy tree ([`branch`]), treated as a rigid island and
//! arranged around the root by a short force relaxation ([`islands`]).
//! Finally everything is merged onto one padded canvas ([`compose`]).
//!
//! # Coordinate spaces
//!
//! - **World:** box centers, root center at (0, 0). Manual positions live here.
//! - **Canvas:** box top-left corners, every box at least `padding` away from
//!   the canvas edge. [`LayoutResult::origin`] maps one onto the other.
//!
//! [`compute_layout`] never fails: any internal fault produces a degraded
//! fallback result so the caller can always render something.

pub mod branch;
pub mod compose;
mod geometry;
pub mod islands;

pub use branch::{BranchLayout, layout_branch};
pub use geometry::{Point, Rect, Size};
pub use islands::{Island, IslandPlacement, layout_islands};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::LayoutError;
use crate::tree::{Node, Side};

/// Measured node boxes keyed by node id, as reported by the renderer.
pub type NodeDimensions = HashMap<String, Size>;

/// Default spacing density.
pub const DEFAULT_SPACING: f32 = 5.0;
/// Largest accepted spacing density.
pub const MAX_SPACING: f32 = 10.0;
/// Default canvas padding around the content.
pub const DEFAULT_PADDING: f32 = 200.0;
/// Default number of relaxation ticks.
pub const DEFAULT_ITERATIONS: u32 = 300;
/// Upper bound on relaxation ticks.
pub const MAX_ITERATIONS: u32 = 2000;

/// Canvas position of every node in a fallback result.
pub const FALLBACK_POSITION: Point = Point { x: 500.0, y: 500.0 };
/// Fallback canvas edge length.
pub const FALLBACK_CANVAS: f32 = 1000.0;
/// Canvas edge length for an empty tree.
const EMPTY_CANVAS: f32 = 100.0;
/// Minimum canvas edge length when only the root is visible.
pub const ROOT_ONLY_CANVAS: f32 = 200.0;

/// Box of `id`, falling back to [`Size::FALLBACK`] when it was never measured.
pub(crate) fn size_of(dims: &NodeDimensions, id: &str) -> Size {
    dims.get(id)
        .map(|size| size.sanitized())
        .unwrap_or(Size::FALLBACK)
}

/// Gaps derived from the user-facing spacing density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    /// Clamped density in `[0, 10]`.
    pub density: f32,
    /// Vertical gap between sibling blocks.
    pub node_sep: f32,
    /// Horizontal gap between a parent and its children.
    pub level_sep: f32,
}

impl Spacing {
    /// Non-finite densities mean the default; everything else is clamped.
    pub fn from_density(density: f32) -> Self {
        let density = if density.is_finite() {
            density.clamp(0.0, MAX_SPACING)
        } else {
            DEFAULT_SPACING
        };
        Self {
            density,
            node_sep: 20.0 + density * 2.0,
            level_sep: 40.0 + density * 5.0,
        }
    }

    /// Rest length of the root link for an island `branch_height` tall.
    ///
    /// Height counts up to 600px so huge branches do not drift off.
    pub fn link_distance(&self, branch_height: f32) -> f32 {
        150.0 + branch_height.clamp(0.0, 600.0) * 0.6 + self.density * 15.0
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::from_density(DEFAULT_SPACING)
    }
}

/// Tunable layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Spacing density, `0..=10` (default: 5).
    pub spacing: f32,
    /// Relaxation ticks (default: 300, capped at 2000).
    pub iterations: u32,
    /// Empty margin around the content (default: 200).
    pub padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            iterations: DEFAULT_ITERATIONS,
            padding: DEFAULT_PADDING,
        }
    }
}

impl LayoutConfig {
    fn effective_iterations(&self) -> u32 {
        self.iterations.clamp(1, MAX_ITERATIONS)
    }

    fn effective_padding(&self) -> f32 {
        if self.padding.is_finite() && self.padding >= 0.0 {
            self.padding
        } else {
            DEFAULT_PADDING
        }
    }
}

/// Output of [`compute_layout`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    /// Top-left corner of every visible node on the canvas.
    pub nodes: HashMap<String, Point>,
    /// Canvas width, padding included.
    pub width: f32,
    /// Canvas height, padding included.
    pub height: f32,
    /// Canvas position of the world origin (the root's center).
    pub origin: Point,
    /// World-space center of each top-level branch root. Warm starts seed
    /// from these, so they stay valid when measured sizes change.
    #[serde(default)]
    pub anchors: HashMap<String, Point>,
    /// True when the result is a fallback rather than a real layout.
    pub degraded: bool,
}

impl LayoutResult {
    /// Result for a tree with nothing to lay out.
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
            width: EMPTY_CANVAS,
            height: EMPTY_CANVAS,
            origin: Point::ORIGIN,
            anchors: HashMap::new(),
            degraded: true,
        }
    }

    /// Every node of `root` stacked at one point of a fixed canvas.
    pub fn fallback(root: &Node) -> Self {
        let mut nodes = HashMap::new();
        root.walk(&mut |node| {
            if !node.id.is_empty() {
                nodes.insert(node.id.clone(), FALLBACK_POSITION);
            }
        });
        Self {
            nodes,
            width: FALLBACK_CANVAS,
            height: FALLBACK_CANVAS,
            origin: FALLBACK_POSITION,
            anchors: HashMap::new(),
            degraded: true,
        }
    }

    /// World-space center of `id`, if it was laid out.
    pub fn world_center(&self, id: &str, dims: &NodeDimensions) -> Option<Point> {
        let top_left = self.nodes.get(id)?;
        Some(
            top_left
                .offset(size_of(dims, id).half())
                .minus(self.origin),
        )
    }

    /// Canvas-space box of `id`.
    pub fn node_rect(&self, id: &str, dims: &NodeDimensions) -> Option<Rect> {
        let top_left = *self.nodes.get(id)?;
        let size = size_of(dims, id);
        Some(Rect {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        })
    }
}

/// Lay out the visible part of the tree under `root`.
///
/// `previous` is the last result for (roughly) the same tree; branches it
/// contains resume from their old spot, which keeps incremental edits calm.
/// Never fails: faults are logged and answered with
/// [`LayoutResult::fallback`].
pub fn compute_layout(
    root: &Node,
    dims: &NodeDimensions,
    config: &LayoutConfig,
    previous: Option<&LayoutResult>,
) -> LayoutResult {
    if root.id.is_empty() {
        tracing::warn!("layout requested for a root without id");
        return LayoutResult::empty();
    }

    match try_layout(root, dims, config, previous) {
        Ok(result) => {
            tracing::debug!(
                nodes = result.nodes.len(),
                width = result.width,
                height = result.height,
                "layout computed"
            );
            result
        }
        Err(err) => {
            tracing::warn!(root = %root.id, error = %err, "layout failed, using fallback");
            LayoutResult::fallback(root)
        }
    }
}

/// Fallible core of [`compute_layout`].
pub fn try_layout(
    root: &Node,
    dims: &NodeDimensions,
    config: &LayoutConfig,
    previous: Option<&LayoutResult>,
) -> Result<LayoutResult, LayoutError> {
    validate_ids(root)?;

    let spacing = Spacing::from_density(config.spacing);
    // A fallback result carries no usable geometry.
    let previous = previous.filter(|prev| !prev.degraded);

    let branches = root.visible_children();
    let mut layouts = Vec::with_capacity(branches.len());
    let mut islands = Vec::with_capacity(branches.len());

    for (i, child) in branches.iter().enumerate() {
        let direction = child
            .side
            .unwrap_or(if i % 2 == 0 { Side::Right } else { Side::Left });
        let layout = layout_branch(child, direction, dims, &spacing);
        let seed = previous.and_then(|prev| prev.anchors.get(&child.id).copied());
        islands.push(Island::new(
            child.id.clone(),
            direction,
            &layout,
            child.manual_position(),
            seed,
        ));
        layouts.push(layout);
    }

    let root_box = Rect::from_center(Point::ORIGIN, size_of(dims, &root.id));
    let placements = layout_islands(&islands, root_box, &spacing, config.effective_iterations());

    compose::compose(root, dims, &layouts, &placements, config.effective_padding())
}

/// Reject empty or repeated ids anywhere in the tree.
fn validate_ids(root: &Node) -> Result<(), LayoutError> {
    let mut seen = HashSet::from([root.id.as_str()]);
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        for child in &node.children {
            if child.id.is_empty() {
                return Err(LayoutError::EmptyId {
                    parent: node.id.clone(),
                });
            }
            if !seen.insert(child.id.as_str()) {
                return Err(LayoutError::DuplicateId(child.id.clone()));
            }
            stack.push(child);
        }
    }
    Ok(())
}
