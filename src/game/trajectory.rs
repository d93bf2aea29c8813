//! Aim resolution: from a drag direction to a bounce path and landing cell.

use bevy::prelude::*;

use super::{
    collision::{CollisionLayer, CollisionWorld, HitTarget, SceneView},
    config::RoundConfig,
    hex::HexCoord,
};

/// Result of resolving one aim direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    /// Polyline from the shot origin through every bounce.
    pub path: Vec<Vec2>,
    /// Cell the shot settles into, `None` for a miss.
    pub landing: Option<HexCoord>,
}

impl Trajectory {
    pub fn is_miss(&self) -> bool {
        self.landing.is_none()
    }
}

/// Whether `direction` is within the allowed cone around straight up.
pub fn aim_allowed(direction: Vec2, max_angle_deg: f32) -> bool {
    let dir = direction.normalize_or_zero();
    dir != Vec2::ZERO && dir.dot(Vec2::Y) >= max_angle_deg.to_radians().cos()
}

fn reflect(direction: Vec2, normal: Vec2) -> Vec2 {
    direction - 2.0 * direction.dot(normal) * normal
}

/// Resolve the path of a shot fired from `origin` along `direction`.
///
/// Returns `None` when the direction is outside the aim cone; the caller
/// keeps whatever it showed before. Each ray either misses (the path ends at
/// full range), bounces off a wall, or hits a bubble and lands in that
/// bubble's nearest vacant neighbor cell. A bubble with no vacant neighbor
/// uses up the cast and the same ray is cast again.
pub fn resolve(
    colliders: &dyn CollisionWorld,
    scene: &SceneView,
    config: &RoundConfig,
    origin: Vec2,
    direction: Vec2,
) -> Option<Trajectory> {
    if !aim_allowed(direction, config.max_aim_angle_deg) {
        return None;
    }

    let mut dir = direction.normalize_or_zero();
    let mut ray_origin = origin;
    let mut trajectory = Trajectory {
        path: vec![origin],
        landing: None,
    };

    for bounce in 0..config.max_bounces {
        let Some(hit) = colliders.raycast(
            scene,
            ray_origin,
            dir,
            config.ray_range,
            CollisionLayer::HIT,
        ) else {
            trajectory.path.push(ray_origin + dir * config.ray_range);
            break;
        };

        trajectory.path.push(hit.point);

        if let HitTarget::Bubble(id) = hit.target {
            let cell = scene
                .grid
                .bubble(id)
                .and_then(|b| b.node())
                .and_then(|coord| nearest_vacant_neighbor(scene, coord, hit.point));
            if let Some(cell) = cell {
                trajectory.landing = Some(cell);
                break;
            }
            // The next cast repeats the same ray.
            debug!("Bubble {:?} has no vacant neighbor, casting again", id);
            continue;
        }

        debug!("Bounce {} at {:?}", bounce, hit.point);
        ray_origin = hit.point - dir * config.bounce_nudge;
        dir = reflect(dir, hit.normal);
    }

    Some(trajectory)
}

/// Vacant neighbor cell of `coord` closest to `point`.
///
/// Cells with no node yet count as vacant. Exact ties keep the first cell in
/// neighbor-table order.
pub fn nearest_vacant_neighbor(scene: &SceneView, coord: HexCoord, point: Vec2) -> Option<HexCoord> {
    let mut best: Option<(HexCoord, f32)> = None;
    for cell in coord.neighbors() {
        if !scene.grid.is_vacant(cell) {
            continue;
        }
        let d = scene.cell_to_world(cell).distance_squared(point);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((cell, d));
        }
    }
    best.map(|(cell, _)| cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        bubble::BubbleId,
        collision::{GridColliders, RayHit, Walls},
        grid::{CellKind, HexGrid},
        hex::HexLayout,
    };
    use proptest::prelude::*;

    fn far_walls() -> GridColliders {
        GridColliders::new(
            Walls {
                left: -100.0,
                right: 100.0,
                top: 100.0,
            },
            0.5,
        )
    }

    #[test]
    fn clear_shot_is_a_two_point_miss() {
        let grid = HexGrid::new();
        let layout = HexLayout::default();
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };
        let config = RoundConfig::default();
        let origin = config.shot_origin();

        let t = resolve(&far_walls(), &scene, &config, origin, Vec2::Y).unwrap();
        assert!(t.is_miss());
        assert_eq!(t.path, vec![origin, origin + Vec2::Y * 20.0]);
    }

    #[test]
    fn steep_aim_is_rejected() {
        let grid = HexGrid::new();
        let layout = HexLayout::default();
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };
        let config = RoundConfig::default();

        let flat = Vec2::new(1.0, 0.1);
        assert!(resolve(&far_walls(), &scene, &config, Vec2::ZERO, flat).is_none());
        assert!(resolve(&far_walls(), &scene, &config, Vec2::ZERO, Vec2::NEG_Y).is_none());
        assert!(resolve(&far_walls(), &scene, &config, Vec2::ZERO, Vec2::ZERO).is_none());
        assert!(aim_allowed(Vec2::new(1.0, 0.2), 80.0));
    }

    #[test]
    fn bubble_hit_lands_in_nearest_vacant_cell() {
        let mut grid = HexGrid::new();
        let layout = HexLayout::default();
        let target = HexCoord::new(0, 4);
        grid.insert_cell(target, CellKind::Playable, 0);
        let id = grid.create_bubble(1);
        grid.set_bubble(target, id);
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };

        let t = resolve(&far_walls(), &scene, &RoundConfig::default(), Vec2::ZERO, Vec2::Y).unwrap();
        // Hit from straight below: one of the two lower neighbors, the left
        // one by table order on an exact tie.
        assert_eq!(t.landing, Some(HexCoord::new(-1, 3)));
        assert_eq!(t.path.len(), 2);
    }

    #[test]
    fn walls_reflect_the_ray() {
        let grid = HexGrid::new();
        let layout = HexLayout::default();
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };
        let colliders = GridColliders::new(
            Walls {
                left: -1.0,
                right: 1.0,
                top: 1000.0,
            },
            0.5,
        );

        let dir = Vec2::new(1.0, 1.0).normalize();
        let t = resolve(&colliders, &scene, &RoundConfig::default(), Vec2::ZERO, dir).unwrap();
        assert!(t.is_miss());
        // Five casts, each ending on a wall.
        assert_eq!(t.path.len(), 6);
        assert!((t.path[1].x - 1.0).abs() < 1e-4);
        assert!((t.path[2].x + 1.0).abs() < 1e-3);
    }

    #[test]
    fn surrounded_bubble_has_no_landing_cell() {
        let mut grid = HexGrid::new();
        let layout = HexLayout::default();
        let center = HexCoord::new(0, 4);
        for coord in std::iter::once(center).chain(center.neighbors()) {
            grid.insert_cell(coord, CellKind::Playable, 0);
            let id = grid.create_bubble(1);
            grid.set_bubble(coord, id);
        }
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };

        let below = layout.to_world(center) - Vec2::new(0.0, 0.6);
        let hit = nearest_vacant_neighbor(&scene, center, below);
        assert_eq!(hit, None);
    }

    /// Reports a hit on `bubble` for the first cast, then nothing.
    struct HitOnce {
        bubble: BubbleId,
        casts: std::sync::Mutex<Vec<(Vec2, Vec2)>>,
    }

    impl CollisionWorld for HitOnce {
        fn raycast(
            &self,
            _scene: &SceneView,
            origin: Vec2,
            direction: Vec2,
            _max_distance: f32,
            _layer: CollisionLayer,
        ) -> Option<RayHit> {
            let mut casts = self.casts.lock().unwrap();
            casts.push((origin, direction));
            (casts.len() == 1).then(|| RayHit {
                point: Vec2::new(0.0, 3.0),
                normal: Vec2::new(0.6, -0.8),
                target: HitTarget::Bubble(self.bubble),
            })
        }
    }

    #[test]
    fn surrounded_bubble_hit_repeats_the_same_ray() {
        let mut grid = HexGrid::new();
        let layout = HexLayout::default();
        let center = HexCoord::new(0, 4);
        let mut placed = Vec::new();
        for coord in std::iter::once(center).chain(center.neighbors()) {
            grid.insert_cell(coord, CellKind::Playable, 0);
            let id = grid.create_bubble(1);
            grid.set_bubble(coord, id);
            placed.push(id);
        }
        let scene = SceneView {
            grid: &grid,
            layout: &layout,
            scroll: Vec2::ZERO,
        };
        let colliders = HitOnce {
            bubble: placed[0],
            casts: Default::default(),
        };

        let t = resolve(&colliders, &scene, &RoundConfig::default(), Vec2::ZERO, Vec2::Y).unwrap();
        assert!(t.is_miss());
        assert_eq!(t.path, vec![Vec2::ZERO, Vec2::new(0.0, 3.0), Vec2::new(0.0, 20.0)]);
        let casts = colliders.casts.lock().unwrap();
        assert_eq!(casts.as_slice(), &[(Vec2::ZERO, Vec2::Y), (Vec2::ZERO, Vec2::Y)]);
    }

    proptest! {
        #[test]
        fn resolution_is_reproducible(
            angle in -1.3f32..1.3,
            cells in prop::collection::vec((-4i32..4, 2i32..8), 0..20),
        ) {
            let mut grid = HexGrid::new();
            for (col, row) in cells {
                let coord = HexCoord::new(col, row);
                grid.get_or_create(coord);
                let id = grid.create_bubble(1);
                grid.set_bubble(coord, id);
            }
            let layout = HexLayout::default();
            let scene = SceneView { grid: &grid, layout: &layout, scroll: Vec2::ZERO };
            let config = RoundConfig::default();
            let colliders = GridColliders::default();
            let dir = Vec2::new(angle.sin(), angle.cos());

            let first = resolve(&colliders, &scene, &config, config.shot_origin(), dir);
            let second = resolve(&colliders, &scene, &config, config.shot_origin(), dir);
            prop_assert_eq!(first, second);
        }
    }
}
