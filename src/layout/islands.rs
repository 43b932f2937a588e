//! Macro-layout: force relaxation of branch islands around the root.
//!
//! Every top-level branch is a rigid box ("island") simulated as a single
//! particle at the box center. The root is a fixed particle at the origin.
//! A fixed number of ticks with d3-force semantics (forces accumulate into
//! velocities, then a damped Euler step moves the particles) combine:
//!
//! - **Link:** spring from the root to each island with a rest length that
//!   grows with the island's height.
//! - **Side bias:** weak pull towards the island's side on X, and towards
//!   the root's row on Y.
//! - **Charge:** pairwise inverse-square repulsion, stronger for big islands.
//! - **Collision:** bounding circles pushed apart, not scaled by alpha.
//!
//! Particle circles only approximate boxes, so a final separation sweep
//! slides islands outward until no two boxes (or an island and the root)
//! overlap. Everything is deterministic: the initial scatter depends only on
//! each island's index within its side.

use std::f32::consts::{FRAC_PI_2, PI};

use super::Spacing;
use super::branch::BranchLayout;
use super::geometry::{Point, Rect, Size};
use crate::tree::Side;

/// Added to half the island's larger dimension to get its radius.
pub const ISLAND_PADDING: f32 = 20.0;
/// Extra clearance between colliding circles.
const COLLIDE_MARGIN: f32 = 30.0;
/// Charge of the root particle.
const ROOT_CHARGE: f32 = -500.0;
const LINK_STRENGTH: f32 = 0.5;
const SIDE_STRENGTH: f32 = 0.05;
const CENTER_STRENGTH: f32 = 0.02;
/// Fraction of velocity kept each tick (d3's 1 - velocityDecay).
const VELOCITY_RETAIN: f32 = 0.6;
const ALPHA_MIN: f32 = 0.001;
/// Starting alpha when every free island resumes from a previous layout.
const WARM_ALPHA: f32 = 0.1;

/// A top-level branch treated as one rigid body.
#[derive(Debug, Clone)]
pub struct Island {
    /// Id of the branch root.
    pub id: String,
    pub total_width: f32,
    pub total_height: f32,
    pub direction: Side,
    /// Collision radius.
    pub radius: f32,
    /// Union of the branch's node boxes, relative to the branch root.
    pub bounds: Rect,
    /// User-dragged position of the branch root (world-space center).
    pub manual_position: Option<Point>,
    /// Branch root position from the previous layout, for warm starts.
    pub previous_position: Option<Point>,
}

impl Island {
    pub fn new(
        id: impl Into<String>,
        direction: Side,
        layout: &BranchLayout,
        manual_position: Option<Point>,
        previous_position: Option<Point>,
    ) -> Self {
        Self {
            id: id.into(),
            total_width: layout.total_width,
            total_height: layout.total_height,
            direction,
            radius: layout.total_width.max(layout.total_height) / 2.0 + ISLAND_PADDING,
            bounds: layout.bounds,
            manual_position,
            previous_position,
        }
    }

    /// Offset from the branch root to the island's box center.
    #[inline]
    fn center_offset(&self) -> Point {
        self.bounds.center()
    }

    #[inline]
    fn box_size(&self) -> Size {
        Size::new(self.bounds.width(), self.bounds.height())
    }

    /// Repulsion strength (negative pushes away).
    #[inline]
    fn charge(&self) -> f32 {
        -500.0 - self.radius * 3.0
    }

    #[inline]
    fn is_pinned(&self) -> bool {
        self.manual_position.is_some()
    }
}

/// Where an island ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandPlacement {
    /// Center of the island's bounding box.
    pub center: Point,
    /// Center of the branch root node.
    pub anchor: Point,
}

/// Simulated body.
#[derive(Debug, Clone)]
struct Particle {
    position: Point,
    velocity: Point,
    radius: f32,
    charge: f32,
    link_distance: f32,
    side_sign: f32,
    fixed: bool,
}

/// Fixed-step particle simulation. Index 0 is the root.
struct Simulation {
    particles: Vec<Particle>,
    alpha: f32,
    alpha_decay: f32,
}

impl Simulation {
    fn tick(&mut self) {
        self.alpha += (0.0 - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;

        self.apply_links(alpha);
        self.apply_side_bias(alpha);
        self.apply_charge(alpha);
        self.apply_collisions();

        for p in &mut self.particles {
            if p.fixed {
                p.velocity = Point::ORIGIN;
                continue;
            }
            p.velocity.x *= VELOCITY_RETAIN;
            p.velocity.y *= VELOCITY_RETAIN;
            p.position = p.position.offset(p.velocity);
        }
    }

    /// Spring between the root (fixed at the origin) and each island.
    fn apply_links(&mut self, alpha: f32) {
        for (i, p) in self.particles.iter_mut().enumerate().skip(1) {
            if p.fixed {
                continue;
            }
            let mut d = p.position.offset(p.velocity);
            let mut l = d.length();
            if l < f32::EPSILON {
                d = Point::new(p.side_sign * 1e-3, jiggle(i));
                l = d.length();
            }
            let k = (l - p.link_distance) / l * alpha * LINK_STRENGTH;
            p.velocity.x -= d.x * k;
            p.velocity.y -= d.y * k;
        }
    }

    fn apply_side_bias(&mut self, alpha: f32) {
        for p in self.particles.iter_mut().skip(1) {
            if p.fixed {
                continue;
            }
            let target_x = p.side_sign * p.link_distance;
            p.velocity.x += (target_x - p.position.x) * SIDE_STRENGTH * alpha;
            p.velocity.y += (0.0 - p.position.y) * CENTER_STRENGTH * alpha;
        }
    }

    /// Exact pairwise many-body repulsion (island counts are small).
    fn apply_charge(&mut self, alpha: f32) {
        let n = self.particles.len();
        let mut deltas = vec![Point::ORIGIN; n];

        for i in 0..n {
            if self.particles[i].fixed {
                continue;
            }
            let pi = self.particles[i].position;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let pj = &self.particles[j];
                let mut d = pj.position.minus(pi);
                let mut l2 = d.x * d.x + d.y * d.y;
                if l2 == 0.0 {
                    d = Point::new(jiggle(i * n + j), jiggle(j * n + i));
                    l2 = d.x * d.x + d.y * d.y;
                }
                if l2 < 1.0 {
                    l2 = l2.sqrt();
                }
                let w = pj.charge * alpha / l2;
                deltas[i].x += d.x * w;
                deltas[i].y += d.y * w;
            }
        }

        for (p, delta) in self.particles.iter_mut().zip(deltas) {
            p.velocity = p.velocity.offset(delta);
        }
    }

    /// Push overlapping circles apart on their predicted positions.
    fn apply_collisions(&mut self) {
        let n = self.particles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.particles[i], &self.particles[j]);
                if a.fixed && b.fixed {
                    continue;
                }
                let r = a.radius + b.radius + COLLIDE_MARGIN;
                let mut d = a.position.offset(a.velocity).minus(b.position.offset(b.velocity));
                let mut l2 = d.x * d.x + d.y * d.y;
                if l2 >= r * r {
                    continue;
                }
                if l2 == 0.0 {
                    d = Point::new(jiggle(i + j), jiggle(i * j + 1));
                    l2 = d.x * d.x + d.y * d.y;
                }
                let l = l2.sqrt();
                let k = (r - l) / l;
                let push = Point::new(d.x * k, d.y * k);

                let (share_a, share_b) = if a.fixed {
                    (0.0, 1.0)
                } else if b.fixed {
                    (1.0, 0.0)
                } else {
                    let (ra2, rb2) = (a.radius * a.radius, b.radius * b.radius);
                    let share = rb2 / (ra2 + rb2);
                    (share, 1.0 - share)
                };

                let a = &mut self.particles[i];
                a.velocity.x += push.x * share_a;
                a.velocity.y += push.y * share_a;
                let b = &mut self.particles[j];
                b.velocity.x -= push.x * share_b;
                b.velocity.y -= push.y * share_b;
            }
        }
    }
}

/// Tiny deterministic nudge used to separate coincident particles.
fn jiggle(seed: usize) -> f32 {
    let magnitude = ((seed % 13) as f32 + 1.0) * 1e-3;
    if seed % 2 == 0 { magnitude } else { -magnitude }
}

/// Deterministic starting centers: each side's islands fan out over its
/// half-plane, top to bottom in document order, at their link distance.
fn initial_scatter(islands: &[Island], link_distances: &[f32]) -> Vec<Point> {
    let mut centers = vec![Point::ORIGIN; islands.len()];
    for side in [Side::Right, Side::Left] {
        let members: Vec<usize> = (0..islands.len())
            .filter(|&i| islands[i].direction == side)
            .collect();
        let m = members.len() as f32;
        for (k, &i) in members.iter().enumerate() {
            let sweep = PI * (k as f32 + 0.5) / m;
            let angle = match side {
                Side::Right => -FRAC_PI_2 + sweep,
                Side::Left => 3.0 * FRAC_PI_2 - sweep,
            };
            let distance = link_distances[i];
            centers[i] = Point::new(angle.cos() * distance, angle.sin() * distance);
        }
    }
    centers
}

/// Place every island around the root.
///
/// Returns one placement per island, in input order. Pinned islands keep
/// their manual anchor exactly.
pub fn layout_islands(
    islands: &[Island],
    root_box: Rect,
    spacing: &Spacing,
    iterations: u32,
) -> Vec<IslandPlacement> {
    if islands.is_empty() {
        return Vec::new();
    }

    let link_distances: Vec<f32> = islands
        .iter()
        .map(|island| spacing.link_distance(island.total_height))
        .collect();
    let scatter = initial_scatter(islands, &link_distances);

    let mut particles = Vec::with_capacity(islands.len() + 1);
    particles.push(Particle {
        position: Point::ORIGIN,
        velocity: Point::ORIGIN,
        radius: root_box.width().max(root_box.height()) / 2.0 + ISLAND_PADDING,
        charge: ROOT_CHARGE,
        link_distance: 0.0,
        side_sign: 0.0,
        fixed: true,
    });

    let mut warm = true;
    for (i, island) in islands.iter().enumerate() {
        let offset = island.center_offset();
        let (position, fixed) = match (island.manual_position, island.previous_position) {
            (Some(manual), _) => (manual.offset(offset), true),
            (None, Some(previous)) => (previous.offset(offset), false),
            (None, None) => {
                warm = false;
                (scatter[i], false)
            }
        };
        particles.push(Particle {
            position,
            velocity: Point::ORIGIN,
            radius: island.radius,
            charge: island.charge(),
            link_distance: link_distances[i],
            side_sign: island.direction.sign(),
            fixed,
        });
    }

    let free = islands.iter().filter(|island| !island.is_pinned()).count();
    let iterations = iterations.max(1);
    let mut simulation = Simulation {
        particles,
        alpha: if warm && free > 0 { WARM_ALPHA } else { 1.0 },
        alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / iterations as f32),
    };
    for _ in 0..iterations {
        simulation.tick();
    }

    let mut centers: Vec<Point> = simulation.particles[1..]
        .iter()
        .map(|p| p.position)
        .collect();
    separate(islands, &mut centers, root_box, COLLIDE_MARGIN);

    tracing::debug!(
        islands = islands.len(),
        pinned = islands.len() - free,
        warm,
        iterations,
        "relaxed branch islands"
    );

    islands
        .iter()
        .zip(centers)
        .map(|(island, center)| IslandPlacement {
            center,
            anchor: island
                .manual_position
                .unwrap_or_else(|| center.minus(island.center_offset())),
        })
        .collect()
}

/// Slide free islands outward until no island box overlaps the root box,
/// a pinned island, or an island placed before it (nearest first).
fn separate(islands: &[Island], centers: &mut [Point], root_box: Rect, gap: f32) {
    let mut obstacles = vec![root_box];
    obstacles.extend(
        islands
            .iter()
            .zip(centers.iter())
            .filter(|(island, _)| island.is_pinned())
            .map(|(island, &center)| Rect::from_center(center, island.box_size())),
    );

    let mut order: Vec<usize> = (0..islands.len())
        .filter(|&i| !islands[i].is_pinned())
        .collect();
    order.sort_by(|&a, &b| {
        centers[a]
            .length()
            .total_cmp(&centers[b].length())
            .then(a.cmp(&b))
    });

    for i in order {
        let center = centers[i];
        let length = center.length();
        let direction = if length < 1e-3 {
            Point::new(islands[i].direction.sign(), 0.0)
        } else {
            Point::new(center.x / length, center.y / length)
        };

        let rect = Rect::from_center(center, islands[i].box_size());
        let t = clearance(&rect, direction, &obstacles, gap);
        let moved = Point::new(center.x + direction.x * t, center.y + direction.y * t);

        centers[i] = moved;
        obstacles.push(Rect::from_center(moved, islands[i].box_size()));
    }
}

/// Smallest `t >= 0` such that `rect` moved by `t * direction` overlaps no
/// obstacle inflated by `gap`.
fn clearance(rect: &Rect, direction: Point, obstacles: &[Rect], gap: f32) -> f32 {
    let blocked: Vec<(f32, f32)> = obstacles
        .iter()
        .filter_map(|obstacle| blocked_interval(rect, direction, &obstacle.inflate(gap)))
        .collect();

    let mut t = 0.0f32;
    // Each pass either stops or jumps past one more interval.
    for _ in 0..=blocked.len() {
        let mut moved = false;
        for &(lo, hi) in &blocked {
            if t > lo && t < hi {
                t = hi;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
    t
}

/// Open interval of `t` for which the moving rect overlaps `obstacle`.
fn blocked_interval(rect: &Rect, direction: Point, obstacle: &Rect) -> Option<(f32, f32)> {
    let (x_lo, x_hi) = axis_interval(rect.min_x, rect.max_x, direction.x, obstacle.min_x, obstacle.max_x)?;
    let (y_lo, y_hi) = axis_interval(rect.min_y, rect.max_y, direction.y, obstacle.min_y, obstacle.max_y)?;
    let lo = x_lo.max(y_lo);
    let hi = x_hi.min(y_hi);
    (lo < hi).then_some((lo, hi))
}

fn axis_interval(min: f32, max: f32, d: f32, other_min: f32, other_max: f32) -> Option<(f32, f32)> {
    if d.abs() < 1e-9 {
        return (min < other_max && max > other_min).then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let t1 = (other_max - min) / d;
    let t2 = (other_min - max) / d;
    Some((t1.min(t2), t1.max(t2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::NodeDimensions;
    use crate::layout::branch::layout_branch;
    use crate::tree::Node;

    fn island(id: &str, direction: Side, children: usize) -> Island {
        let node = Node::new(id, id).with_children((0..children).map(|i| Node::new(format!("{id}-{i}"), "")));
        let layout = layout_branch(&node, direction, &NodeDimensions::new(), &Spacing::from_density(5.0));
        Island::new(id, direction, &layout, None, None)
    }

    fn root_box() -> Rect {
        Rect::from_center(Point::ORIGIN, Size::FALLBACK)
    }

    fn world_box(island: &Island, placement: &IslandPlacement) -> Rect {
        island.bounds.translate(placement.anchor)
    }

    #[test]
    fn test_no_islands() {
        assert!(layout_islands(&[], root_box(), &Spacing::from_density(5.0), 300).is_empty());
    }

    #[test]
    fn test_islands_settle_on_their_side() {
        let islands = vec![
            island("a", Side::Right, 3),
            island("b", Side::Left, 2),
            island("c", Side::Right, 0),
            island("d", Side::Left, 5),
        ];
        let placements = layout_islands(&islands, root_box(), &Spacing::from_density(5.0), 300);

        for (island, placement) in islands.iter().zip(&placements) {
            assert!(
                placement.anchor.x * island.direction.sign() > 0.0,
                "{} should sit on its side, got {:?}",
                island.id,
                placement.anchor
            );
        }
    }

    #[test]
    fn test_islands_never_overlap() {
        let islands: Vec<Island> = (0..8)
            .map(|i| {
                let side = if i % 2 == 0 { Side::Right } else { Side::Left };
                island(&format!("n{i}"), side, (i * 3) % 7)
            })
            .collect();
        let placements = layout_islands(&islands, root_box(), &Spacing::from_density(0.0), 300);

        for i in 0..islands.len() {
            let a = world_box(&islands[i], &placements[i]);
            assert!(!a.overlaps(&root_box()), "island {i} overlaps root");
            assert!(a.center().minus(placements[i].center).length() < 1e-3);
            for j in (i + 1)..islands.len() {
                let b = world_box(&islands[j], &placements[j]);
                assert!(!a.overlaps(&b), "islands {i} and {j} overlap: {a:?} {b:?}");
            }
        }
    }

    #[test]
    fn test_pinned_island_keeps_anchor() {
        let mut islands = vec![island("a", Side::Right, 4), island("b", Side::Right, 4)];
        islands[0].manual_position = Some(Point::new(420.0, -75.0));
        let placements = layout_islands(&islands, root_box(), &Spacing::from_density(5.0), 300);
        assert_eq!(placements[0].anchor, Point::new(420.0, -75.0));
        let pinned = world_box(&islands[0], &placements[0]);
        assert!(pinned.contains(placements[0].center));

        let a = world_box(&islands[0], &placements[0]);
        let b = world_box(&islands[1], &placements[1]);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_deterministic() {
        let islands = vec![
            island("a", Side::Right, 2),
            island("b", Side::Left, 6),
            island("c", Side::Right, 1),
        ];
        let spacing = Spacing::from_density(3.0);
        let first = layout_islands(&islands, root_box(), &spacing, 300);
        let second = layout_islands(&islands, root_box(), &spacing, 300);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clearance_skips_chained_obstacles() {
        let rect = Rect::from_center(Point::ORIGIN, Size::new(10.0, 10.0));
        let obstacles = [
            Rect::from_center(Point::new(5.0, 0.0), Size::new(10.0, 10.0)),
            Rect::from_center(Point::new(18.0, 0.0), Size::new(10.0, 10.0)),
        ];
        let t = clearance(&rect, Point::new(1.0, 0.0), &obstacles, 0.0);
        // Clears the first obstacle at t = 15, which still hits the second,
        // then clears the second at t = 28.
        assert!((t - 28.0).abs() < 1e-4, "t = {t}");
    }

    #[test]
    fn test_clearance_zero_when_free() {
        let rect = Rect::from_center(Point::new(100.0, 0.0), Size::new(10.0, 10.0));
        let obstacles = [Rect::from_center(Point::ORIGIN, Size::new(10.0, 10.0))];
        assert_eq!(clearance(&rect, Point::new(1.0, 0.0), &obstacles, 5.0), 0.0);
    }
}
