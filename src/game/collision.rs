//! Ray queries against the board.
//!
//! The trajectory resolver only talks to a [`CollisionWorld`]. Hosts with a
//! physics engine implement it over their colliders; [`GridColliders`] is the
//! built-in version that treats every placed bubble as a circle and the play
//! field as three walls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    bubble::BubbleId,
    grid::HexGrid,
    hex::{HexCoord, HexLayout},
};

/// Collision layer mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionLayer(pub u32);

impl CollisionLayer {
    /// Walls and placed bubbles: everything a shot can touch.
    pub const HIT: Self = Self(1);
}

/// What a ray ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Wall,
    Bubble(BubbleId),
}

/// First contact along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec2,
    pub normal: Vec2,
    pub target: HitTarget,
}

/// Read-only view of the board used for queries and world positions.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub grid: &'a HexGrid,
    pub layout: &'a HexLayout,
    /// Current world scroll offset.
    pub scroll: Vec2,
}

impl SceneView<'_> {
    /// World position of a cell including the scroll offset.
    pub fn cell_to_world(&self, coord: HexCoord) -> Vec2 {
        self.layout.to_world(coord) + self.scroll
    }
}

/// Collision query service.
pub trait CollisionWorld: Send + Sync {
    fn raycast(
        &self,
        scene: &SceneView,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        layer: CollisionLayer,
    ) -> Option<RayHit>;
}

/// Play-field walls: vertical planes left and right, a horizontal one on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Walls {
    pub left: f32,
    pub right: f32,
    pub top: f32,
}

impl Default for Walls {
    fn default() -> Self {
        Self {
            left: -5.0,
            right: 5.0,
            top: 12.0,
        }
    }
}

/// Built-in collider set derived from the grid itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridColliders {
    pub walls: Walls,
    pub bubble_radius: f32,
}

impl Default for GridColliders {
    fn default() -> Self {
        Self {
            walls: Walls::default(),
            bubble_radius: 0.5,
        }
    }
}

impl GridColliders {
    pub fn new(walls: Walls, bubble_radius: f32) -> Self {
        Self {
            walls,
            bubble_radius,
        }
    }

    fn wall_hits(&self, origin: Vec2, dir: Vec2) -> [Option<(f32, Vec2)>; 3] {
        let left = (dir.x < 0.0).then(|| ((self.walls.left - origin.x) / dir.x, Vec2::X));
        let right = (dir.x > 0.0).then(|| ((self.walls.right - origin.x) / dir.x, Vec2::NEG_X));
        let top = (dir.y > 0.0).then(|| ((self.walls.top - origin.y) / dir.y, Vec2::NEG_Y));
        [left, right, top]
    }
}

/// Distance along a unit ray to a circle's surface, ignoring circles that
/// contain the origin or lie behind it.
fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 || b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    Some(-b - disc.sqrt())
}

impl CollisionWorld for GridColliders {
    fn raycast(
        &self,
        scene: &SceneView,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        layer: CollisionLayer,
    ) -> Option<RayHit> {
        if layer != CollisionLayer::HIT {
            return None;
        }
        let dir = direction.normalize_or_zero();
        if dir == Vec2::ZERO {
            return None;
        }

        let mut best: Option<(f32, RayHit)> = None;
        let mut consider = |t: f32, hit: RayHit| {
            if t < 0.0 || t > max_distance {
                return;
            }
            // Strict: the first candidate wins exact ties.
            if best.as_ref().is_none_or(|(bt, _)| t < *bt) {
                best = Some((t, hit));
            }
        };

        for (t, normal) in self.wall_hits(origin, dir).into_iter().flatten() {
            consider(
                t,
                RayHit {
                    point: origin + dir * t,
                    normal,
                    target: HitTarget::Wall,
                },
            );
        }

        for (node, bubble) in scene.grid.occupied() {
            let center = scene.cell_to_world(node.coord());
            let Some(t) = ray_circle(origin, dir, center, self.bubble_radius) else {
                continue;
            };
            let point = origin + dir * t;
            consider(
                t,
                RayHit {
                    point,
                    normal: (point - center).normalize_or_zero(),
                    target: HitTarget::Bubble(bubble.id()),
                },
            );
        }

        best.map(|(_, hit)| hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::CellKind;

    fn scene_with_bubble(grid: &mut HexGrid, coord: HexCoord) -> BubbleId {
        grid.insert_cell(coord, CellKind::Playable, 0);
        let id = grid.create_bubble(1);
        grid.set_bubble(coord, id);
        id
    }

    #[test]
    fn ray_stops_at_nearest_bubble_surface() {
        let mut grid = HexGrid::new();
        let layout = HexLayout::default();
        let id = scene_with_bubble(&mut grid, HexCoord::new(0, 4));
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };

        let colliders = GridColliders::default();
        let hit = colliders
            .raycast(&scene, Vec2::ZERO, Vec2::Y, 20.0, CollisionLayer::HIT)
            .unwrap();

        assert_eq!(hit.target, HitTarget::Bubble(id));
        let center = layout.to_world(HexCoord::new(0, 4));
        assert!((hit.point.y - (center.y - 0.5)).abs() < 1e-4);
        assert!(hit.normal.distance(Vec2::NEG_Y) < 1e-4);
    }

    #[test]
    fn scroll_moves_colliders() {
        let mut grid = HexGrid::new();
        let layout = HexLayout::default();
        scene_with_bubble(&mut grid, HexCoord::new(0, 4));
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::new(0.0, 2.0),
        };

        let hit = GridColliders::default()
            .raycast(&scene, Vec2::ZERO, Vec2::Y, 20.0, CollisionLayer::HIT)
            .unwrap();
        let center = layout.to_world(HexCoord::new(0, 4)) + Vec2::new(0.0, 2.0);
        assert!((hit.point.y - (center.y - 0.5)).abs() < 1e-4);
    }

    #[test]
    fn angled_ray_hits_side_wall() {
        let grid = HexGrid::new();
        let layout = HexLayout::default();
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };

        let dir = Vec2::new(1.0, 1.0).normalize();
        let hit = GridColliders::default()
            .raycast(&scene, Vec2::ZERO, dir, 20.0, CollisionLayer::HIT)
            .unwrap();
        assert_eq!(hit.target, HitTarget::Wall);
        assert!((hit.point.x - 5.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec2::NEG_X);
    }

    #[test]
    fn nothing_within_range_is_a_miss() {
        let grid = HexGrid::new();
        let layout = HexLayout::default();
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };

        let colliders = GridColliders::default();
        assert!(colliders.raycast(&scene, Vec2::ZERO, Vec2::Y, 5.0, CollisionLayer::HIT).is_none());
        assert!(colliders
            .raycast(&scene, Vec2::ZERO, Vec2::Y, 20.0, CollisionLayer(2))
            .is_none());
    }
}
